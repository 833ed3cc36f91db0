//! Weighted aggregation of per-unit responses into the earnings group table.

use super::groups::EarningsGroups;
use serde::{Serialize, Serializer};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

pub const TOTAL_LABEL: &str = "TOTAL";
pub const TITLE: &str = "Response in Charitable Giving by Earnings Group";

/// Per filing unit inputs and outputs of the response model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRow {
    pub weight: f64,
    pub giving: f64,
    pub wages: f64,
    pub price1: f64,
    pub price2: f64,
    pub atinc1: f64,
    pub atinc2: f64,
    pub group: usize,
    pub price_elasticity: f64,
    pub income_elasticity: f64,
    pub response: f64,
}

impl UnitRow {
    /// Giving in billions, weighted.
    pub fn giving_b(&self) -> f64 {
        self.weight * self.giving / 1e9
    }

    pub fn response_b(&self) -> f64 {
        self.weight * self.response / 1e9
    }

    /// Filing units represented, in millions.
    pub fn funits_m(&self) -> f64 {
        self.weight / 1e6
    }
}

/// Summed weighted totals for one earnings group, or for all of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotals {
    pub label: String,
    pub funits_m: f64,
    pub giving_b: f64,
    pub response_b: f64,
}

impl GroupTotals {
    fn empty(label: String) -> Self {
        GroupTotals {
            label,
            funits_m: 0.0,
            giving_b: 0.0,
            response_b: 0.0,
        }
    }

    fn add(&mut self, funits_m: f64, giving_b: f64, response_b: f64) {
        self.funits_m += funits_m;
        self.giving_b += giving_b;
        self.response_b += response_b;
    }

    /// Percentage change in giving. Not finite when the group gives nothing.
    pub fn pct_response(&self) -> f64 {
        100.0 * self.response_b / self.giving_b
    }
}

/// Group rows in ascending earnings order followed by the total row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTable {
    pub groups: Vec<GroupTotals>,
    pub total: GroupTotals,
}

impl ResponseTable {
    /// Sum units into their groups. Groups with no filing units are left out.
    pub fn aggregate(rows: &[UnitRow], groups: &EarningsGroups) -> Self {
        let mut sums: Vec<Option<GroupTotals>> = vec![None; groups.len()];
        for row in rows {
            sums[row.group]
                .get_or_insert_with(|| GroupTotals::empty(groups.label(row.group)))
                .add(row.funits_m(), row.giving_b(), row.response_b());
        }
        let groups: Vec<GroupTotals> = sums.into_iter().flatten().collect();

        let mut total = GroupTotals::empty(TOTAL_LABEL.to_string());
        for g in &groups {
            total.add(g.funits_m, g.giving_b, g.response_b);
        }
        ResponseTable { groups, total }
    }

    pub fn rows(&self) -> impl Iterator<Item = &GroupTotals> {
        self.groups.iter().chain(std::iter::once(&self.total))
    }

    pub fn display_rows(&self) -> Vec<DisplayRow> {
        self.rows().map(DisplayRow::from).collect()
    }

    /// Title line followed by the table.
    pub fn render(&self) -> String {
        let table = Table::new(self.display_rows())
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        format!("{TITLE}\n{table}")
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in self.display_rows() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_json_rows(&self) -> Vec<JsonRow> {
        self.rows()
            .map(|g| JsonRow {
                earnings_group: g.label.clone(),
                funits_m: g.funits_m,
                giving_b: g.giving_b,
                response_b: g.response_b,
                pct_response: g.pct_response(),
            })
            .collect()
    }
}

/// Printed row, values rounded to three decimals.
#[derive(Debug, Clone, PartialEq, Tabled, Serialize)]
pub struct DisplayRow {
    #[tabled(rename = "Earnings Group")]
    #[serde(rename = "Earnings Group")]
    pub earnings_group: String,
    #[tabled(rename = "Num(#M)")]
    #[serde(rename = "Num(#M)")]
    pub funits_m: String,
    #[tabled(rename = "Resp($B)")]
    #[serde(rename = "Resp($B)")]
    pub response_b: String,
    #[tabled(rename = "Resp(%)")]
    #[serde(rename = "Resp(%)")]
    pub pct_response: String,
}

impl From<&GroupTotals> for DisplayRow {
    fn from(g: &GroupTotals) -> Self {
        DisplayRow {
            earnings_group: g.label.clone(),
            funits_m: round3(g.funits_m),
            response_b: round3(g.response_b),
            pct_response: round3(g.pct_response()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRow {
    pub earnings_group: String,
    pub funits_m: f64,
    pub giving_b: f64,
    pub response_b: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub pct_response: f64,
}

fn finite_or_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Format with three decimals; NaN and infinities print as `NaN`, `inf`.
fn round3(value: f64) -> String {
    // avoid printing "-0.000"
    if value.is_finite() && (value * 1000.0).round() == 0.0 {
        return "0.000".to_string();
    }
    format!("{value:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(weight: f64, giving: f64, wages: f64, response: f64, group: usize) -> UnitRow {
        UnitRow {
            weight,
            giving,
            wages,
            price1: 1.0,
            price2: 1.0,
            atinc1: wages,
            atinc2: wages,
            group,
            price_elasticity: -0.1,
            income_elasticity: 0.1,
            response,
        }
    }

    fn sample() -> Vec<UnitRow> {
        vec![
            row(1.5e6, 1000.0, 30_000.0, -10.0, 0),
            row(2.25e6, 2000.0, 60_000.0, -80.0, 1),
            row(0.75e6, 500.0, 80_000.0, 5.0, 1),
            row(3.0e6, 0.0, 10_000.0, 0.0, 0),
        ]
    }

    #[test]
    fn weighted_totals() {
        let r = row(2e6, 1000.0, 0.0, -50.0, 0);
        assert!((r.giving_b() - 2.0).abs() < 1e-12);
        assert!((r.response_b() + 0.1).abs() < 1e-12);
        assert!((r.funits_m() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn total_row_is_the_sum_of_groups() {
        let table = ResponseTable::aggregate(&sample(), &EarningsGroups::default());
        assert_eq!(table.groups.len(), 2);
        let sum = |f: fn(&GroupTotals) -> f64| table.groups.iter().map(f).sum::<f64>();
        assert!((sum(|g| g.funits_m) - table.total.funits_m).abs() < 1e-9);
        assert!((sum(|g| g.giving_b) - table.total.giving_b).abs() < 1e-9);
        assert!((sum(|g| g.response_b) - table.total.response_b).abs() < 1e-9);
        assert_eq!(table.total.label, TOTAL_LABEL);
        assert!((table.total.funits_m - 7.5).abs() < 1e-9);
    }

    #[test]
    fn pct_response() {
        let table = ResponseTable::aggregate(&sample(), &EarningsGroups::default());
        // group 0: -0.015 / 1.5
        assert!((table.groups[0].pct_response() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn groups_without_units_are_omitted() {
        let groups = EarningsGroups::new(vec![50_000.0, 1e6]).unwrap();
        let table = ResponseTable::aggregate(&sample(), &groups);
        let labels: Vec<_> = table.rows().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["[-inf, 50000)", "[50000, 1000000)", "TOTAL"]);
    }

    #[test]
    fn zero_giving_group_prints_non_finite() {
        let rows = vec![
            row(1e6, 0.0, 10_000.0, 0.0, 0),
            row(1e6, 100.0, 90_000.0, -1.0, 1),
        ];
        let table = ResponseTable::aggregate(&rows, &EarningsGroups::default());
        assert!(table.groups[0].pct_response().is_nan());

        let rendered = table.render();
        assert!(rendered.starts_with(TITLE));
        assert!(rendered.contains("NaN"));
        assert!(rendered.contains("-1.000"));

        let json = serde_json::to_string(&table.to_json_rows()).unwrap();
        assert!(json.contains("\"pct_response\":null"));
    }

    #[test]
    fn rendered_columns() {
        let table = ResponseTable::aggregate(&sample(), &EarningsGroups::default());
        let rendered = table.render();
        for header in ["Earnings Group", "Num(#M)", "Resp($B)", "Resp(%)", "TOTAL"] {
            assert!(rendered.contains(header), "missing {header}");
        }
        assert!(!rendered.contains("giving"));
    }

    #[test]
    fn csv_output_uses_display_labels() {
        let table = ResponseTable::aggregate(&sample(), &EarningsGroups::default());
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Earnings Group,Num(#M),Resp($B),Resp(%)")
        );
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn round3_formats() {
        assert_eq!(round3(0.0), "0.000");
        assert_eq!(round3(-0.0), "0.000");
        assert_eq!(round3(-0.0001), "0.000");
        assert_eq!(round3(1.23456), "1.235");
        assert_eq!(round3(f64::NAN), "NaN");
        assert_eq!(round3(f64::INFINITY), "inf");
    }
}

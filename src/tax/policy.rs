use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of filing statuses that per-status parameters carry values for,
/// in `MARS` order.
pub const NUM_STATUSES: usize = 5;
/// First and last year a policy can be resolved for.
pub const START_YEAR: i32 = 2013;
pub const END_YEAR: i32 = 2030;

/// Tax law parameters in force for a single year.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyParams {
    /// Standard deduction, by filing status
    pub std_deduction: [f64; NUM_STATUSES],
    /// Ordinary income tax rates, lowest bracket first
    pub rates: [f64; 7],
    /// Upper thresholds of the first six brackets, by filing status
    pub brackets: [[f64; NUM_STATUSES]; 6],
    /// Cap on itemized state and local taxes, by filing status
    pub salt_cap: [f64; NUM_STATUSES],
    /// Ceiling on cash contributions as a fraction of AGI
    pub charity_ceiling: f64,
    /// Floor on contributions as a fraction of AGI
    pub charity_floor: f64,
    /// Haircut applied to contributions before deduction
    pub charity_haircut: f64,
    /// Combined social security payroll tax rate
    pub fica_ss_rate: f64,
    /// Maximum earnings subject to social security tax
    pub ss_earnings_cap: f64,
    /// Combined medicare payroll tax rate
    pub fica_mc_rate: f64,
}

impl PolicyParams {
    /// Federal current-law values for 2020.
    pub fn current_law() -> Self {
        PolicyParams {
            std_deduction: [12_400.0, 24_800.0, 12_400.0, 18_650.0, 24_800.0],
            rates: [0.10, 0.12, 0.22, 0.24, 0.32, 0.35, 0.37],
            brackets: [
                [9_875.0, 19_750.0, 9_875.0, 14_100.0, 19_750.0],
                [40_125.0, 80_250.0, 40_125.0, 53_700.0, 80_250.0],
                [85_525.0, 171_050.0, 85_525.0, 85_500.0, 171_050.0],
                [163_300.0, 326_600.0, 163_300.0, 163_300.0, 326_600.0],
                [207_350.0, 414_700.0, 207_350.0, 207_350.0, 414_700.0],
                [518_400.0, 622_050.0, 311_025.0, 518_400.0, 622_050.0],
            ],
            salt_cap: [10_000.0, 10_000.0, 5_000.0, 10_000.0, 10_000.0],
            charity_ceiling: 0.6,
            charity_floor: 0.0,
            charity_haircut: 0.0,
            fica_ss_rate: 0.124,
            ss_earnings_cap: 137_700.0,
            fica_mc_rate: 0.029,
        }
    }

    fn apply(&mut self, param: Param, value: &ParamValue) {
        match param {
            Param::StdDeduction => self.std_deduction = value.per_status(),
            Param::Rate(i) => self.rates[i] = value.scalar(),
            Param::Bracket(i) => self.brackets[i] = value.per_status(),
            Param::SaltCap => self.salt_cap = value.per_status(),
            Param::CharityCeiling => self.charity_ceiling = value.scalar(),
            Param::CharityFloor => self.charity_floor = value.scalar(),
            Param::CharityHaircut => self.charity_haircut = value.scalar(),
            Param::FicaSsRate => self.fica_ss_rate = value.scalar(),
            Param::SsEarningsCap => self.ss_earnings_cap = value.scalar(),
            Param::FicaMcRate => self.fica_mc_rate = value.scalar(),
        }
    }
}

/// A policy parameter addressable from a reform file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Param {
    StdDeduction,
    /// `II_rt1`..`II_rt7`, zero based
    Rate(usize),
    /// `II_brk1`..`II_brk6`, zero based
    Bracket(usize),
    SaltCap,
    CharityCeiling,
    CharityFloor,
    CharityHaircut,
    FicaSsRate,
    SsEarningsCap,
    FicaMcRate,
}

impl Param {
    pub fn is_per_status(self) -> bool {
        matches!(
            self,
            Param::StdDeduction | Param::Bracket(_) | Param::SaltCap
        )
    }

    /// Parameters that must lie in `[0, 1]`.
    pub fn is_fraction(self) -> bool {
        matches!(
            self,
            Param::Rate(_)
                | Param::CharityCeiling
                | Param::CharityFloor
                | Param::CharityHaircut
                | Param::FicaSsRate
                | Param::FicaMcRate
        )
    }
}

impl FromStr for Param {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.strip_prefix('_').unwrap_or(s);
        let indexed = |prefix: &str, count: usize| {
            name.strip_prefix(prefix)
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| (1..=count).contains(n))
                .map(|n| n - 1)
        };
        let param = match name {
            "STD" => Param::StdDeduction,
            "ID_AllTaxes_c" => Param::SaltCap,
            "ID_Charity_crt_cash" => Param::CharityCeiling,
            "ID_Charity_frt" => Param::CharityFloor,
            "ID_Charity_hc" => Param::CharityHaircut,
            "FICA_ss_trt" => Param::FicaSsRate,
            "SS_Earnings_c" => Param::SsEarningsCap,
            "FICA_mc_trt" => Param::FicaMcRate,
            _ => {
                if let Some(i) = indexed("II_rt", 7) {
                    Param::Rate(i)
                } else if let Some(i) = indexed("II_brk", 6) {
                    Param::Bracket(i)
                } else {
                    return Err(Error::ReformParse(format!("unknown policy parameter '{s}'")));
                }
            }
        };
        Ok(param)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::StdDeduction => write!(f, "STD"),
            Param::Rate(i) => write!(f, "II_rt{}", i + 1),
            Param::Bracket(i) => write!(f, "II_brk{}", i + 1),
            Param::SaltCap => write!(f, "ID_AllTaxes_c"),
            Param::CharityCeiling => write!(f, "ID_Charity_crt_cash"),
            Param::CharityFloor => write!(f, "ID_Charity_frt"),
            Param::CharityHaircut => write!(f, "ID_Charity_hc"),
            Param::FicaSsRate => write!(f, "FICA_ss_trt"),
            Param::SsEarningsCap => write!(f, "SS_Earnings_c"),
            Param::FicaMcRate => write!(f, "FICA_mc_trt"),
        }
    }
}

/// A validated reform value: one number, or one number per filing status.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(f64),
    PerStatus([f64; NUM_STATUSES]),
}

impl ParamValue {
    fn scalar(&self) -> f64 {
        match self {
            ParamValue::Scalar(v) => *v,
            ParamValue::PerStatus(values) => values[0],
        }
    }

    fn per_status(&self) -> [f64; NUM_STATUSES] {
        match self {
            ParamValue::Scalar(v) => [*v; NUM_STATUSES],
            ParamValue::PerStatus(values) => *values,
        }
    }

    fn values(&self) -> Vec<f64> {
        match self {
            ParamValue::Scalar(v) => vec![*v],
            ParamValue::PerStatus(values) => values.to_vec(),
        }
    }

    fn parse(param: Param, year: i32, raw: &Value) -> Result<Self> {
        let bad = |what: &str| {
            Error::ReformParse(format!("{param} for {year}: {what}"))
        };
        let number = |v: &Value| v.as_f64().ok_or_else(|| bad("expected a number"));
        let per_status = |items: &[Value]| -> Result<ParamValue> {
            if !param.is_per_status() {
                return Err(bad("expected a single value"));
            }
            let values: Vec<f64> = items.iter().map(number).collect::<Result<_>>()?;
            let values: [f64; NUM_STATUSES] = values.try_into().map_err(|v: Vec<f64>| {
                bad(&format!(
                    "expected 1 or {NUM_STATUSES} values, found {}",
                    v.len()
                ))
            })?;
            Ok(ParamValue::PerStatus(values))
        };
        let value = match raw {
            Value::Number(_) => ParamValue::Scalar(number(raw)?),
            Value::Array(items) => match items.as_slice() {
                // `[[single, joint, separate, head, widow]]`
                [Value::Array(inner)] => per_status(inner)?,
                [single] => ParamValue::Scalar(number(single)?),
                items => per_status(items)?,
            },
            _ => return Err(bad("expected a number or an array of numbers")),
        };
        for v in value.values() {
            if !v.is_finite() || v < 0.0 {
                return Err(bad(&format!("{v} is not a non-negative number")));
            }
            if param.is_fraction() && v > 1.0 {
                return Err(bad(&format!("{v} is not a rate between 0 and 1")));
            }
        }
        Ok(value)
    }
}

/// Reform file layout, used only to describe the format.
///
/// `{"policy": {"<param>": {"<year>": <value>}}}`; the `policy` wrapper is
/// optional and `//` comments run to the end of the line.
#[allow(dead_code)]
#[derive(Debug, JsonSchema)]
pub struct ReformFile {
    /// Parameter name to year to new value
    pub policy: BTreeMap<String, BTreeMap<String, ReformValue>>,
}

#[allow(dead_code)]
#[derive(Debug, JsonSchema)]
#[serde(untagged)]
pub enum ReformValue {
    /// Applies to every filing status
    Scalar(f64),
    /// One value, or one value per filing status in `MARS` order
    List(Vec<f64>),
    /// One value per filing status, wrapped in an outer array
    Nested(Vec<Vec<f64>>),
}

/// A set of parameter changes keyed by the first year they apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reform {
    changes: BTreeMap<i32, BTreeMap<Param, ParamValue>>,
}

impl Reform {
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(&strip_comments(json))
            .map_err(|e| Error::ReformParse(format!("malformed JSON: {e}")))?;
        let Value::Object(mut root) = root else {
            return Err(Error::ReformParse("expected a JSON object".into()));
        };
        let params = match root.remove("policy") {
            Some(Value::Object(policy)) => policy,
            Some(_) => return Err(Error::ReformParse("'policy' must be an object".into())),
            None => root,
        };

        let mut reform = Reform::default();
        for (name, by_year) in params {
            let param: Param = name.parse()?;
            let Value::Object(by_year) = by_year else {
                return Err(Error::ReformParse(format!(
                    "{name}: expected an object keyed by year"
                )));
            };
            for (year, raw) in by_year {
                let year: i32 = year
                    .parse()
                    .map_err(|_| Error::ReformParse(format!("{name}: invalid year '{year}'")))?;
                if !(START_YEAR..=END_YEAR).contains(&year) {
                    return Err(Error::ReformParse(format!(
                        "{name}: year {year} outside {START_YEAR}..={END_YEAR}"
                    )));
                }
                let value = ParamValue::parse(param, year, &raw)?;
                reform.changes.entry(year).or_default().insert(param, value);
            }
        }
        Ok(reform)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.values().all(BTreeMap::is_empty)
    }

    /// Number of (year, parameter) changes.
    pub fn len(&self) -> usize {
        self.changes.values().map(BTreeMap::len).sum()
    }
}

/// Remove `//` comments, leaving string literals alone.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut in_string = false;
        let mut escaped = false;
        let mut end = line.len();
        let mut chars = line.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                _ if escaped => escaped = false,
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '/' if !in_string && matches!(chars.peek(), Some((_, '/'))) => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }
        out.push_str(&line[..end]);
        out.push('\n');
    }
    out
}

/// Baseline law plus an ordered list of implemented reforms.
///
/// Values are never mutated in place: `implement_reform` derives a new policy
/// so a baseline and a reform calculator cannot alias each other's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    baseline: PolicyParams,
    reforms: Vec<Reform>,
}

impl Default for Policy {
    fn default() -> Self {
        Policy::new(PolicyParams::current_law())
    }
}

impl Policy {
    pub fn new(baseline: PolicyParams) -> Self {
        Policy {
            baseline,
            reforms: Vec::new(),
        }
    }

    pub fn implement_reform(&self, reform: &Reform) -> Result<Policy> {
        let mut policy = self.clone();
        policy.reforms.push(reform.clone());
        // Surface inconsistent brackets before any calculator uses the policy.
        for year in START_YEAR..=END_YEAR {
            policy.params_for(year)?;
        }
        Ok(policy)
    }

    /// Resolve the parameters in force in `year`.
    ///
    /// A change applies from its year onwards; later reforms override earlier
    /// ones for the same year.
    pub fn params_for(&self, year: i32) -> Result<PolicyParams> {
        if !(START_YEAR..=END_YEAR).contains(&year) {
            return Err(Error::Computation(format!(
                "year {year} outside policy range {START_YEAR}..={END_YEAR}"
            )));
        }
        let mut params = self.baseline.clone();
        let mut changes: Vec<_> = self
            .reforms
            .iter()
            .enumerate()
            .flat_map(|(order, reform)| {
                reform
                    .changes
                    .range(..=year)
                    .map(move |(y, changes)| (*y, order, changes))
            })
            .collect();
        changes.sort_by_key(|(y, order, _)| (*y, *order));
        for (_, _, changes) in changes {
            for (param, value) in changes {
                params.apply(*param, value);
            }
        }
        check_brackets(&params, year)?;
        Ok(params)
    }
}

fn check_brackets(params: &PolicyParams, year: i32) -> Result<()> {
    for status in 0..NUM_STATUSES {
        let ascending = params
            .brackets
            .windows(2)
            .all(|w| w[0][status] <= w[1][status]);
        if !ascending {
            return Err(Error::ReformParse(format!(
                "bracket thresholds for {year} are not ascending"
            )));
        }
    }
    Ok(())
}

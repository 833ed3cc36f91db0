use super::behavior::{quantity_response, ResponseInputs};
use super::groups::ElasticityAssumptions;
use super::table::{ResponseTable, UnitRow};
use crate::error::{Error, Result};
use crate::tax::{Calculator, FilingUnit, MtrVariable, Policy, Records, Reform};

/// Everything needed for one baseline-versus-reform comparison.
#[derive(Debug, Clone)]
pub struct ResponseAnalysis {
    pub year: i32,
    pub baseline: Policy,
    pub reform: Reform,
    pub assumptions: ElasticityAssumptions,
}

/// Per-unit results and the earnings group table.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub units: Vec<UnitRow>,
    pub table: ResponseTable,
}

struct YearResults {
    units: Vec<FilingUnit>,
    mtr: Vec<f64>,
    aftertax_income: Vec<f64>,
}

fn run_calculator(mut calc: Calculator, year: i32, label: &str) -> Result<YearResults> {
    calc.advance_to_year(year)?;
    calc.calc_all();
    let mtr = calc.mtr(MtrVariable::CharityCash, true, false)?;
    let itemizers = calc.results()?.iter().filter(|r| r.itemizes()).count();
    log::info!(
        "{label}: {} filing units in {year}, {itemizers} itemize",
        calc.records().len()
    );
    Ok(YearResults {
        units: calc.records().to_vec(),
        mtr: mtr.combined,
        aftertax_income: calc.aftertax_income()?,
    })
}

impl ResponseAnalysis {
    pub fn run(&self, records: &Records) -> Result<AnalysisOutput> {
        // Validate the reform against the baseline before computing anything.
        let reform_policy = self.baseline.implement_reform(&self.reform)?;

        let baseline = Calculator::new(self.baseline.clone(), records)?;
        let before = run_calculator(baseline, self.year, "baseline")?;

        let reformed = Calculator::new(reform_policy, records)?;
        let after = run_calculator(reformed, self.year, "reform")?;

        // both calculators age the records identically
        let units = &before.units;

        let groups = self.assumptions.groups();
        let n = units.len();
        let group: Vec<usize> = units.iter().map(|u| groups.assign(u.wages)).collect();
        let giving: Vec<f64> = units.iter().map(|u| u.charity_cash).collect();
        // the MTR on charitable giving is non-positive, so 1 + mtr is the
        // after-tax price of giving a dollar
        let price1: Vec<f64> = before.mtr.iter().map(|m| 1.0 + m).collect();
        let price2: Vec<f64> = after.mtr.iter().map(|m| 1.0 + m).collect();
        let price_elasticity: Vec<f64> = group
            .iter()
            .map(|g| self.assumptions.price_elasticity(*g))
            .collect();
        let income_elasticity = vec![self.assumptions.income_elasticity(); n];

        let response = quantity_response(ResponseInputs {
            quantity: &giving,
            price_elasticity: &price_elasticity,
            aftertax_price1: &price1,
            aftertax_price2: &price2,
            income_elasticity: &income_elasticity,
            aftertax_income1: &before.aftertax_income,
            aftertax_income2: &after.aftertax_income,
        })?;
        if response.iter().any(|r| !r.is_finite()) {
            return Err(Error::Computation("non-finite giving response".into()));
        }

        let rows: Vec<UnitRow> = units
            .iter()
            .enumerate()
            .map(|(i, unit)| UnitRow {
                weight: unit.weight,
                giving: unit.charity_cash,
                wages: unit.wages,
                price1: price1[i],
                price2: price2[i],
                atinc1: before.aftertax_income[i],
                atinc2: after.aftertax_income[i],
                group: group[i],
                price_elasticity: price_elasticity[i],
                income_elasticity: income_elasticity[i],
                response: response[i],
            })
            .collect();

        let table = ResponseTable::aggregate(&rows, groups);
        log::info!(
            "total response {:.3}B on giving of {:.3}B",
            table.total.response_b,
            table.total.giving_b
        );
        Ok(AnalysisOutput { units: rows, table })
    }
}

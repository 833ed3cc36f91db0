use super::policy::{Policy, PolicyParams};
use super::records::{FilingUnit, Records};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Change applied to an income item when computing marginal tax rates.
pub const FINITE_DIFF: f64 = 0.01;

/// Income or deduction items a marginal tax rate can be taken with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtrVariable {
    /// `e00200`
    Wages,
    /// `e00300`
    Interest,
    /// `e19800`
    CharityCash,
}

impl MtrVariable {
    fn bump(self, unit: &mut FilingUnit, delta: f64) {
        match self {
            MtrVariable::Wages => unit.wages += delta,
            MtrVariable::Interest => unit.interest += delta,
            MtrVariable::CharityCash => unit.charity_cash += delta,
        }
    }
}

impl FromStr for MtrVariable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "e00200" => Ok(MtrVariable::Wages),
            "e00300" => Ok(MtrVariable::Interest),
            "e19800" => Ok(MtrVariable::CharityCash),
            other => Err(Error::Computation(format!(
                "marginal tax rate not supported for '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MtrVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MtrVariable::Wages => "e00200",
            MtrVariable::Interest => "e00300",
            MtrVariable::CharityCash => "e19800",
        };
        f.write_str(name)
    }
}

/// Tax computation results for one filing unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxUnitResult {
    pub agi: f64,
    pub standard_deduction: f64,
    pub itemized_deductions: f64,
    pub charity_deduction: f64,
    pub taxable_income: f64,
    pub iitax: f64,
    /// Employee and employer shares combined
    pub payrolltax: f64,
    pub expanded_income: f64,
    pub aftertax_income: f64,
}

impl TaxUnitResult {
    pub fn itemizes(&self) -> bool {
        self.itemized_deductions > self.standard_deduction
    }
}

/// Marginal tax rates for every filing unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalRates {
    pub payrolltax: Vec<f64>,
    pub iitax: Vec<f64>,
    pub combined: Vec<f64>,
}

/// Binds a policy to a set of records and computes taxes for one year at a time.
#[derive(Debug, Clone)]
pub struct Calculator {
    policy: Policy,
    records: Records,
    params: PolicyParams,
    results: Option<Vec<TaxUnitResult>>,
}

impl Calculator {
    /// The calculator starts in the records' current year and owns its own copy
    /// of the records, so aging one calculator never affects another.
    pub fn new(policy: Policy, records: &Records) -> Result<Self> {
        let params = policy.params_for(records.current_year())?;
        Ok(Calculator {
            policy,
            records: records.clone(),
            params,
            results: None,
        })
    }

    pub fn current_year(&self) -> i32 {
        self.records.current_year()
    }

    pub fn records(&self) -> &[FilingUnit] {
        self.records.units()
    }

    pub fn advance_to_year(&mut self, year: i32) -> Result<()> {
        let current = self.current_year();
        if year < current {
            return Err(Error::Computation(format!(
                "cannot move calculator back from {current} to {year}"
            )));
        }
        // Fail before aging anything if the policy has no values for the year.
        self.params = self.policy.params_for(year)?;
        while self.records.current_year() < year {
            self.records.increment_year();
        }
        if year != current {
            log::debug!(
                "calculator advanced from {current} to {year} (data year {})",
                self.records.data_year()
            );
            self.results = None;
        }
        Ok(())
    }

    /// Compute taxes for every filing unit in the current year.
    pub fn calc_all(&mut self) {
        let results = self
            .records
            .units()
            .iter()
            .map(|unit| compute_unit(unit, &self.params))
            .collect();
        self.results = Some(results);
        log::debug!("calc_all for {} done", self.current_year());
    }

    pub fn results(&self) -> Result<&[TaxUnitResult]> {
        self.results.as_deref().ok_or_else(|| {
            Error::Computation("calc_all has not been called for the current year".into())
        })
    }

    pub fn aftertax_income(&self) -> Result<Vec<f64>> {
        Ok(self.results()?.iter().map(|r| r.aftertax_income).collect())
    }

    /// Marginal tax rates with respect to `variable`, by finite difference.
    ///
    /// Returns payroll, income and combined rates. When `wrt_full_compensation`
    /// is set and the variable is wages, rates are expressed relative to wages
    /// plus the employer share of payroll tax.
    pub fn mtr(
        &mut self,
        variable: MtrVariable,
        calc_all_already_called: bool,
        wrt_full_compensation: bool,
    ) -> Result<MarginalRates> {
        if !calc_all_already_called {
            self.calc_all();
        }
        let base = self.results()?;
        let n = base.len();
        log::debug!("marginal tax rates wrt {variable} for {n} units");
        let mut rates = MarginalRates {
            payrolltax: Vec::with_capacity(n),
            iitax: Vec::with_capacity(n),
            combined: Vec::with_capacity(n),
        };
        for (unit, before) in self.records.units().iter().zip(base) {
            let mut bumped = unit.clone();
            variable.bump(&mut bumped, FINITE_DIFF);
            let after = compute_unit(&bumped, &self.params);

            let mut divisor = FINITE_DIFF;
            if wrt_full_compensation && variable == MtrVariable::Wages {
                divisor *= 1.0 + employer_payroll_rate(unit, &self.params);
            }
            let payroll = (after.payrolltax - before.payrolltax) / divisor;
            let mut iitax = (after.iitax - before.iitax) / divisor;
            let mut combined = payroll + iitax;
            if variable == MtrVariable::CharityCash {
                // A deduction can save at most the dollar given. Differencing
                // large tax amounts leaves rounding noise past those bounds.
                iitax = iitax.clamp(-1.0, 0.0);
                combined = combined.clamp(-1.0, 0.0);
            }
            rates.payrolltax.push(payroll);
            rates.iitax.push(iitax);
            rates.combined.push(combined);
        }
        Ok(rates)
    }
}

fn employer_payroll_rate(unit: &FilingUnit, params: &PolicyParams) -> f64 {
    let ss = if unit.wages < params.ss_earnings_cap {
        params.fica_ss_rate
    } else {
        0.0
    };
    0.5 * (ss + params.fica_mc_rate)
}

/// Progressive tax on `taxable` for the given filing status column.
fn schedule_tax(taxable: f64, params: &PolicyParams, status: usize) -> f64 {
    let mut tax = 0.0;
    let mut lower = 0.0;
    for (i, rate) in params.rates.iter().enumerate() {
        let upper = params
            .brackets
            .get(i)
            .map_or(f64::INFINITY, |brk| brk[status]);
        if taxable <= lower {
            break;
        }
        tax += rate * (taxable.min(upper) - lower);
        lower = upper;
    }
    tax
}

pub fn compute_unit(unit: &FilingUnit, params: &PolicyParams) -> TaxUnitResult {
    let status = unit.mars.index();
    let agi = unit.wages + unit.interest + unit.dividends;

    let charity_gross = unit.charity_cash * (1.0 - params.charity_haircut);
    let charity_ceiling = (params.charity_ceiling * agi).max(0.0);
    let charity_floor = (params.charity_floor * agi).max(0.0);
    let charity_deduction = (charity_gross.min(charity_ceiling) - charity_floor).max(0.0);

    let salt = unit.state_local_taxes.min(params.salt_cap[status]);
    let itemized_deductions = salt + unit.interest_paid + charity_deduction;
    let standard_deduction = params.std_deduction[status];

    let taxable_income = (agi - itemized_deductions.max(standard_deduction)).max(0.0);
    let iitax = schedule_tax(taxable_income, params, status);

    let wages = unit.wages.max(0.0);
    let payrolltax = params.fica_ss_rate * wages.min(params.ss_earnings_cap)
        + params.fica_mc_rate * wages;
    let expanded_income = agi + 0.5 * payrolltax;
    let aftertax_income = expanded_income - iitax - payrolltax;

    TaxUnitResult {
        agi,
        standard_deduction,
        itemized_deductions,
        charity_deduction,
        taxable_income,
        iitax,
        payrolltax,
        expanded_income,
        aftertax_income,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::policy::Reform;
    use crate::tax::records::{unit, FilingStatus, GrowthFactors};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn itemizer(recid: u64, wages: f64, charity: f64) -> FilingUnit {
        FilingUnit {
            state_local_taxes: 10_000.0,
            interest_paid: 8_000.0,
            ..unit(recid, wages, charity)
        }
    }

    #[test]
    fn schedule_tax_across_brackets() {
        let params = PolicyParams::current_law();
        assert!(approx(schedule_tax(0.0, &params, 0), 0.0));
        assert!(approx(schedule_tax(9_875.0, &params, 0), 987.5));
        // 987.50 + 12% of (40,125 - 9,875)
        assert!(approx(schedule_tax(40_125.0, &params, 0), 4_617.5));
        // joint thresholds are wider
        assert!(approx(schedule_tax(19_750.0, &params, 1), 1_975.0));
        assert!(schedule_tax(1_000_000.0, &params, 0) > 0.3 * 1_000_000.0);
    }

    #[test]
    fn standard_deduction_filer() {
        let params = PolicyParams::current_law();
        let r = compute_unit(&unit(1, 30_000.0, 1_000.0), &params);
        assert!(!r.itemizes());
        assert!(approx(r.taxable_income, 17_600.0));
        assert!(approx(r.payrolltax, 30_000.0 * 0.153));
        assert!(approx(
            r.aftertax_income,
            30_000.0 - r.iitax - 0.5 * r.payrolltax
        ));
    }

    #[test]
    fn itemizer_deducts_charity() {
        let params = PolicyParams::current_law();
        let r = compute_unit(&itemizer(1, 80_000.0, 2_000.0), &params);
        assert!(r.itemizes());
        assert!(approx(r.charity_deduction, 2_000.0));
        assert!(approx(r.taxable_income, 60_000.0));
    }

    #[test]
    fn charity_ceiling_and_haircut() {
        let mut params = PolicyParams::current_law();
        params.charity_ceiling = 0.01;
        let r = compute_unit(&itemizer(1, 100_000.0, 5_000.0), &params);
        assert!(approx(r.charity_deduction, 1_000.0));

        params = PolicyParams::current_law();
        params.charity_haircut = 1.0;
        let r = compute_unit(&itemizer(1, 100_000.0, 5_000.0), &params);
        assert!(approx(r.charity_deduction, 0.0));
    }

    #[test]
    fn charity_mtr_is_never_positive() {
        let records = Records::new(
            vec![
                unit(1, 30_000.0, 1_000.0),
                itemizer(2, 60_000.0, 2_000.0),
                itemizer(3, 80_000.0, 500.0),
                itemizer(4, 600_000.0, 50_000.0),
                unit(5, 0.0, 0.0),
            ],
            2020,
        )
        .unwrap();
        let mut calc = Calculator::new(Policy::default(), &records).unwrap();
        calc.calc_all();
        let mtr = calc.mtr(MtrVariable::CharityCash, true, false).unwrap();
        for (i, rate) in mtr.combined.iter().enumerate() {
            assert!(*rate <= 1e-9, "unit {i} has mtr {rate}");
            assert!(1.0 + rate <= 1.0 + 1e-9);
        }
        // non-itemizer gets no benefit, itemizer in the 22% bracket does
        assert!(approx(mtr.combined[0], 0.0));
        assert!((mtr.combined[2] + 0.22).abs() < 1e-3);
        assert!(mtr.payrolltax.iter().all(|r| approx(*r, 0.0)));
    }

    #[test]
    fn charity_mtr_stays_within_one_dollar_at_a_full_top_rate() {
        let records = Records::new(vec![itemizer(1, 2_000_000.0, 50_000.0)], 2020).unwrap();
        let reform = Reform::from_json(r#"{"II_rt7": {"2020": 1.0}}"#).unwrap();
        let policy = Policy::default().implement_reform(&reform).unwrap();
        let mut calc = Calculator::new(policy, &records).unwrap();
        let mtr = calc.mtr(MtrVariable::CharityCash, false, false).unwrap();
        assert!(mtr.combined[0] >= -1.0, "{}", mtr.combined[0]);
        assert!((mtr.combined[0] + 1.0).abs() < 1e-6);
        assert!(1.0 + mtr.combined[0] >= 0.0);
    }

    #[test]
    fn head_of_household_uses_its_own_schedule() {
        let params = PolicyParams::current_law();
        let head = FilingUnit {
            mars: FilingStatus::HeadOfHousehold,
            ..unit(1, 30_000.0, 0.0)
        };
        let r = compute_unit(&head, &params);
        assert!(approx(r.standard_deduction, 18_650.0));
        assert!(approx(r.taxable_income, 11_350.0));
        // 10% up to 14,100
        assert!(approx(r.iitax, 1_135.0));
    }

    #[test]
    fn wage_mtr_relative_to_full_compensation() {
        let records = Records::new(vec![unit(1, 50_000.0, 0.0)], 2020).unwrap();
        let mut calc = Calculator::new(Policy::default(), &records).unwrap();
        let plain = calc.mtr(MtrVariable::Wages, false, false).unwrap();
        let full = calc.mtr(MtrVariable::Wages, true, true).unwrap();
        assert!((plain.payrolltax[0] - 0.153).abs() < 1e-3);
        assert!((plain.iitax[0] - 0.12).abs() < 1e-3);
        assert!((full.combined[0] - plain.combined[0] / 1.0765).abs() < 1e-3);
    }

    #[test]
    fn mtr_requires_a_calc_pass() {
        let records = Records::new(vec![unit(1, 50_000.0, 0.0)], 2020).unwrap();
        let mut calc = Calculator::new(Policy::default(), &records).unwrap();
        assert!(matches!(
            calc.mtr(MtrVariable::CharityCash, true, false),
            Err(Error::Computation(_))
        ));
        assert!(calc.aftertax_income().is_err());
    }

    #[test]
    fn advancing_ages_only_this_calculator() {
        let records = Records::new(vec![unit(1, 1_000.0, 100.0)], 2018)
            .unwrap()
            .with_growth(GrowthFactors {
                income: 0.1,
                weight: 0.0,
            });
        let mut first = Calculator::new(Policy::default(), &records).unwrap();
        first.advance_to_year(2020).unwrap();
        assert_eq!(first.current_year(), 2020);
        assert!(approx(first.records()[0].wages, 1_210.0));

        let second = Calculator::new(Policy::default(), &records).unwrap();
        assert_eq!(second.current_year(), 2018);
        assert!(approx(second.records()[0].wages, 1_000.0));

        assert!(first.advance_to_year(2019).is_err());
        assert!(first.advance_to_year(2031).is_err());
    }

    #[test]
    fn advancing_invalidates_results() {
        let records = Records::new(vec![unit(1, 1_000.0, 100.0)], 2019).unwrap();
        let mut calc = Calculator::new(Policy::default(), &records).unwrap();
        calc.calc_all();
        calc.advance_to_year(2020).unwrap();
        assert!(calc.results().is_err());
    }

    #[test]
    fn reform_changes_itemizer_price() {
        let records = Records::new(vec![itemizer(1, 80_000.0, 2_000.0)], 2020).unwrap();
        let reform = Reform::from_json(r#"{"ID_Charity_hc": {"2020": 1.0}}"#).unwrap();
        let policy = Policy::default().implement_reform(&reform).unwrap();
        let mut calc = Calculator::new(policy, &records).unwrap();
        calc.calc_all();
        let mtr = calc.mtr(MtrVariable::CharityCash, true, false).unwrap();
        assert!(approx(mtr.combined[0], 0.0));
    }

    #[test]
    fn mtr_variable_names() {
        assert_eq!("e19800".parse::<MtrVariable>().unwrap(), MtrVariable::CharityCash);
        assert_eq!(MtrVariable::Wages.to_string(), "e00200");
        assert!("e99999".parse::<MtrVariable>().is_err());
    }
}

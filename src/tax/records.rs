use crate::error::{Error, Result};
use charitysim_derive::CsvColumns;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Column description generated by `#[derive(CsvColumns)]`.
#[derive(Debug, Clone, Copy)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// Filing status, as coded in the `MARS` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FilingStatus {
    Single,
    Joint,
    Separate,
    HeadOfHousehold,
    Widow,
}

impl FilingStatus {
    /// Position of this status in per-status parameter arrays.
    pub fn index(self) -> usize {
        usize::from(u8::from(self)) - 1
    }
}

impl TryFrom<u8> for FilingStatus {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            1 => Ok(FilingStatus::Single),
            2 => Ok(FilingStatus::Joint),
            3 => Ok(FilingStatus::Separate),
            4 => Ok(FilingStatus::HeadOfHousehold),
            5 => Ok(FilingStatus::Widow),
            other => Err(format!("unsupported MARS code {other}")),
        }
    }
}

impl From<FilingStatus> for u8 {
    fn from(status: FilingStatus) -> u8 {
        match status {
            FilingStatus::Single => 1,
            FilingStatus::Joint => 2,
            FilingStatus::Separate => 3,
            FilingStatus::HeadOfHousehold => 4,
            FilingStatus::Widow => 5,
        }
    }
}

/// One simulated tax filing unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, CsvColumns)]
pub struct FilingUnit {
    /// Record identifier
    #[serde(rename = "RECID")]
    pub recid: u64,
    /// Filing status: 1 single, 2 married filing jointly, 3 married filing
    /// separately, 4 head of household, 5 surviving spouse
    #[serde(rename = "MARS")]
    pub mars: FilingStatus,
    /// Sampling weight (number of filing units represented)
    #[serde(rename = "s006")]
    pub weight: f64,
    /// Wage and salary income
    #[serde(rename = "e00200")]
    pub wages: f64,
    /// Taxable interest income
    #[serde(rename = "e00300", default, deserialize_with = "zero_if_empty")]
    pub interest: f64,
    /// Ordinary dividends
    #[serde(rename = "e00600", default, deserialize_with = "zero_if_empty")]
    pub dividends: f64,
    /// State and local taxes paid
    #[serde(rename = "e18400", default, deserialize_with = "zero_if_empty")]
    pub state_local_taxes: f64,
    /// Interest paid (mortgage)
    #[serde(rename = "e19200", default, deserialize_with = "zero_if_empty")]
    pub interest_paid: f64,
    /// Cash charitable contributions
    #[serde(rename = "e19800")]
    pub charity_cash: f64,
}

impl FilingUnit {
    fn validate(&self) -> Result<()> {
        let amounts = [
            self.weight,
            self.wages,
            self.interest,
            self.dividends,
            self.state_local_taxes,
            self.interest_paid,
            self.charity_cash,
        ];
        if amounts.iter().any(|v| !v.is_finite()) {
            return Err(Error::InputData(format!(
                "RECID {}: non-finite value",
                self.recid
            )));
        }
        if self.weight < 0.0 {
            return Err(Error::InputData(format!(
                "RECID {}: negative weight {}",
                self.recid, self.weight
            )));
        }
        if self.charity_cash < 0.0 {
            return Err(Error::InputData(format!(
                "RECID {}: negative charitable giving {}",
                self.recid, self.charity_cash
            )));
        }
        Ok(())
    }

    fn grow(&mut self, income: f64, weight: f64) {
        let factor = 1.0 + income;
        self.wages *= factor;
        self.interest *= factor;
        self.dividends *= factor;
        self.state_local_taxes *= factor;
        self.interest_paid *= factor;
        self.charity_cash *= factor;
        self.weight *= 1.0 + weight;
    }
}

fn zero_if_empty<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Annual growth rates used to age records beyond their data year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrowthFactors {
    /// Nominal growth of every dollar amount
    pub income: f64,
    /// Growth of the sampling weights
    pub weight: f64,
}

/// A set of filing units observed in `data_year`.
#[derive(Debug, Clone)]
pub struct Records {
    data_year: i32,
    current_year: i32,
    growth: GrowthFactors,
    units: Vec<FilingUnit>,
}

impl Records {
    pub fn new(units: Vec<FilingUnit>, data_year: i32) -> Result<Self> {
        if units.is_empty() {
            return Err(Error::InputData("no filing units".into()));
        }
        for unit in &units {
            unit.validate()?;
        }
        Ok(Records {
            data_year,
            current_year: data_year,
            growth: GrowthFactors::default(),
            units,
        })
    }

    pub fn with_growth(mut self, growth: GrowthFactors) -> Self {
        self.growth = growth;
        self
    }

    pub fn from_csv<R: Read>(reader: R, data_year: i32) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let units = rdr
            .deserialize::<FilingUnit>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        log::debug!("{} filing units read", units.len());
        Self::new(units, data_year)
    }

    pub fn read_path(path: &Path, data_year: i32) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv(file, data_year)
    }

    pub fn data_year(&self) -> i32 {
        self.data_year
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn units(&self) -> &[FilingUnit] {
        &self.units
    }

    /// Age the records by one year.
    pub(crate) fn increment_year(&mut self) {
        let GrowthFactors { income, weight } = self.growth;
        if income != 0.0 || weight != 0.0 {
            for unit in &mut self.units {
                unit.grow(income, weight);
            }
        }
        self.current_year += 1;
    }
}

#[cfg(test)]
pub(crate) fn unit(recid: u64, wages: f64, charity_cash: f64) -> FilingUnit {
    FilingUnit {
        recid,
        mars: FilingStatus::Single,
        weight: 100.0,
        wages,
        interest: 0.0,
        dividends: 0.0,
        state_local_taxes: 0.0,
        interest_paid: 0.0,
        charity_cash,
    }
}

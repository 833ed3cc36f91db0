//! Response command - charitable giving response to a reform by earnings group

use crate::giving::{EarningsGroups, ElasticityAssumptions, ResponseAnalysis};
use crate::reforms::{self, ReformSource};
use crate::tax::{GrowthFactors, Policy, Records, Reform};
use anyhow::Context;
use clap::Args;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ResponseCommand {
    /// CSV file of filing units in the public microdata layout. No dataset
    /// ships with charitysim: supply your own extract, e.g. the `cps.csv`
    /// input file of the tax calculator project (columns: `schema records-csv-fields`)
    #[arg(short, long, default_value = "cps.csv")]
    records: PathBuf,

    /// Year the records describe
    #[arg(long, default_value_t = 2020)]
    data_year: i32,

    /// Year to simulate
    #[arg(short, long, default_value_t = 2020)]
    year: i32,

    /// Reform file name (a local path unless --reform-source is given)
    #[arg(long, default_value = "reformB.json")]
    reform: String,

    /// Fetch the reform from a remote repository instead of local disk
    #[arg(long, value_enum)]
    reform_source: Option<ReformSource>,

    /// Interior wage boundaries between earnings groups
    #[arg(long, value_delimiter = ',', default_value = "50000")]
    earnings_bins: Vec<f64>,

    /// Price elasticity of giving for each earnings group
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "-0.1,-0.4")]
    price_elasticities: Vec<f64>,

    /// Income elasticity of giving, for every filing unit
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.1)]
    income_elasticity: f64,

    /// Annual growth of dollar amounts when aging records past the data year
    #[arg(long, default_value_t = 0.0)]
    income_growth: f64,

    /// Annual growth of sampling weights when aging records
    #[arg(long, default_value_t = 0.0)]
    weight_growth: f64,

    /// Also write per filing unit prices, incomes and responses to this CSV file
    #[arg(long)]
    units_csv: Option<PathBuf>,

    /// Output as CSV instead of formatted table
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

impl ResponseCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        // Parse the reform first: a bad reform must stop the run before any
        // records are read or taxes computed.
        let reform = self.load_reform()?;
        if reform.is_empty() {
            log::warn!("reform {} changes no parameters", self.reform);
        } else {
            log::info!("reform {} has {} parameter changes", self.reform, reform.len());
        }

        let assumptions = ElasticityAssumptions::new(
            EarningsGroups::new(self.earnings_bins.clone())?,
            self.price_elasticities.clone(),
            self.income_elasticity,
        )?;

        let records = Records::read_path(&self.records, self.data_year)
            .with_context(|| format!("loading records from {}", self.records.display()))?
            .with_growth(GrowthFactors {
                income: self.income_growth,
                weight: self.weight_growth,
            });

        let analysis = ResponseAnalysis {
            year: self.year,
            baseline: Policy::default(),
            reform,
            assumptions,
        };
        let output = analysis.run(&records)?;

        if let Some(path) = &self.units_csv {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut wtr = csv::Writer::from_writer(file);
            for row in &output.units {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
            log::info!("{} unit rows written to {}", output.units.len(), path.display());
        }

        if self.json {
            let json = serde_json::to_string_pretty(&output.table.to_json_rows())?;
            println!("{json}");
        } else if self.csv {
            output.table.write_csv(io::stdout())?;
        } else {
            println!("{}", output.table.render());
        }
        Ok(())
    }

    fn load_reform(&self) -> anyhow::Result<Reform> {
        let reform = match self.reform_source {
            None => reforms::read_reform_file(Path::new(&self.reform))?,
            Some(source) => {
                let bytes = match source {
                    ReformSource::Taxcalc => reforms::read_reform_from_taxcalc_github(&self.reform)?,
                    ReformSource::Maxghenis => {
                        reforms::read_reform_from_maxghenis_github(&self.reform)?
                    }
                };
                reforms::parse_reform(&bytes)?
            }
        };
        Ok(reform)
    }
}

//! Schema command - print expected input formats

use crate::tax::policy::ReformFile;
use crate::tax::FilingUnit;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input format to describe
    #[arg(value_enum, default_value = "records-csv-fields")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// CSV header row for the records file
    RecordsCsvHeader,
    /// Records CSV column descriptions
    RecordsCsvFields,
    /// JSON Schema for reform files
    ReformJsonSchema,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::RecordsCsvHeader => println!("{}", FilingUnit::csv_header()),
            SchemaFormat::RecordsCsvFields => self.print_csv_fields(),
            SchemaFormat::ReformJsonSchema => {
                let schema = schema_for!(ReformFile);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
        }
        Ok(())
    }

    fn print_csv_fields(&self) {
        println!("Records CSV Format");
        println!("==================");
        println!();
        for field in FilingUnit::csv_columns() {
            let req = if field.required { "required" } else { "optional" };
            println!("{:8} ({:8})  {}", field.name, req, field.description);
        }
        println!();
        println!("Amounts are annual, in dollars. Empty optional cells read as 0.");
    }
}

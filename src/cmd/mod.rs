pub mod fetch;
pub mod response;
pub mod schema;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Charitable giving response to a reform, by earnings group
    Response(response::ResponseCommand),
    /// Download a reform definition file
    Fetch(fetch::FetchCommand),
    /// Print expected input formats
    Schema(schema::SchemaCommand),
}

impl Command {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self {
            Command::Response(cmd) => cmd.exec(),
            Command::Fetch(cmd) => cmd.exec(),
            Command::Schema(cmd) => cmd.exec(),
        }
    }
}

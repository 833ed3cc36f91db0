use clap::Parser;

mod cmd;
mod error;
mod giving;
mod reforms;
mod tax;

#[derive(Parser, Debug)]
#[command(name = "charitysim", version, author)]
#[command(about = "Estimate the charitable giving response to a tax reform")]
struct Opts {
    #[command(subcommand)]
    command: cmd::Command,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse();
    opts.command.exec()
}

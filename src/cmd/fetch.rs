//! Fetch command - download a reform file and check that it parses

use crate::reforms::{self, ReformFetcher, ReformSource};
use anyhow::Context;
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct FetchCommand {
    /// Reform file name, e.g. reformB.json
    reform: String,

    /// Repository to fetch from
    #[arg(short, long, value_enum, default_value_t = ReformSource::Taxcalc)]
    source: ReformSource,

    /// Base URL overriding the one of --source
    #[arg(long)]
    base_url: Option<String>,

    /// Write the reform here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Request timeout
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Save even if the file is not a valid reform
    #[arg(long)]
    no_validate: bool,
}

impl FetchCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.source.base_url());
        let url = reforms::reform_url(base_url, &self.reform);
        let fetcher = ReformFetcher::new(Duration::from_secs(self.timeout_secs));
        let bytes = fetcher.fetch(&url)?;

        if !self.no_validate {
            let reform = reforms::parse_reform(&bytes)
                .with_context(|| format!("{url} is not a valid reform"))?;
            log::info!("{} parameter changes", reform.len());
        }

        match &self.output {
            Some(path) => std::fs::write(path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?,
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

//! Loading reform definition files from disk or from a remote repository.

use crate::error::{Error, Result};
use crate::tax::Reform;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Reforms shipped with the tax calculator project.
pub const TAXCALC_GITHUB_BASE_URL: &str =
    "https://raw.githubusercontent.com/open-source-economics/Tax-Calculator/master/taxcalc/reforms/";

/// Reforms published alongside the giving notebooks.
pub const MAXGHENIS_GITHUB_BASE_URL: &str =
    "https://raw.githubusercontent.com/MaxGhenis/taxcalc-notebooks/reforms/";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Named remote locations reform files can be fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReformSource {
    Taxcalc,
    Maxghenis,
}

impl ReformSource {
    pub fn base_url(self) -> &'static str {
        match self {
            ReformSource::Taxcalc => TAXCALC_GITHUB_BASE_URL,
            ReformSource::Maxghenis => MAXGHENIS_GITHUB_BASE_URL,
        }
    }
}

/// `base_url` and `reform_name` are joined without adding a separator.
pub fn reform_url(base_url: &str, reform_name: &str) -> String {
    format!("{base_url}{reform_name}")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Blocking HTTP client with a request timeout.
#[derive(Debug, Clone)]
pub struct ReformFetcher {
    agent: ureq::Agent,
}

impl Default for ReformFetcher {
    fn default() -> Self {
        ReformFetcher::new(DEFAULT_TIMEOUT)
    }
}

impl ReformFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        ReformFetcher { agent }
    }

    /// GET `url` and return the raw body.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::info!("fetching {url}");
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => {
                return Err(Error::NotFound {
                    url: url.to_string(),
                })
            }
            Err(ureq::Error::Status(status, _)) => {
                return Err(Error::HttpStatus {
                    url: url.to_string(),
                    status,
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(Error::Network {
                    url: url.to_string(),
                    message: transport.to_string(),
                })
            }
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| Error::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        log::info!("{} bytes, sha256 {}", body.len(), sha256_hex(&body));
        Ok(body)
    }

    pub fn fetch_from(&self, source: ReformSource, reform_name: &str) -> Result<Vec<u8>> {
        self.fetch(&reform_url(source.base_url(), reform_name))
    }
}

pub fn read_reform_from_taxcalc_github(reform_name: &str) -> Result<Vec<u8>> {
    ReformFetcher::default().fetch_from(ReformSource::Taxcalc, reform_name)
}

pub fn read_reform_from_maxghenis_github(reform_name: &str) -> Result<Vec<u8>> {
    ReformFetcher::default().fetch_from(ReformSource::Maxghenis, reform_name)
}

/// Parse reform bytes; non UTF-8 input is a parse error.
pub fn parse_reform(bytes: &[u8]) -> Result<Reform> {
    let json = std::str::from_utf8(bytes)
        .map_err(|e| Error::ReformParse(format!("reform is not UTF-8: {e}")))?;
    Reform::from_json(json)
}

pub fn read_reform_file(path: &Path) -> Result<Reform> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::ReformParse(format!("could not read {}: {e}", path.display()))
    })?;
    log::info!("reform {} sha256 {}", path.display(), sha256_hex(&bytes));
    parse_reform(&bytes)
}

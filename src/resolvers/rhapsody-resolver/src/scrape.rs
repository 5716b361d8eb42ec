//! Extraction of the web client's embedded request credentials.
//!
//! The service has no public contract for these values; they are pulled out
//! of the web client's bundled script. Everything that knows the script's
//! shape lives behind [`CredentialScraper`].

use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Headers the web client sends with every API request.
pub const SCRAPED_HEADERS: [&str; 3] = ["x-rds-devkey", "x-rds-cobrand", "Authorization"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("client script has no value for header {0}")]
    MissingHeader(String),
    #[error("client script has no api key")]
    MissingApiKey,
    #[error("invalid scrape pattern: {0}")]
    Pattern(String),
}

impl From<regex::Error> for ScrapeError {
    fn from(err: regex::Error) -> Self {
        ScrapeError::Pattern(err.to_string())
    }
}

/// Values lifted from the client script. Re-derived on every login.
#[derive(Clone, PartialEq, Eq)]
pub struct ScrapedCredentials {
    /// Header name and value, in [`SCRAPED_HEADERS`] order.
    pub headers: Vec<(String, String)>,
    pub api_key: String,
}

impl fmt::Debug for ScrapedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("ScrapedCredentials")
            .field("headers", &names)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

pub trait CredentialScraper: Send + Sync {
    fn scrape(&self, script: &str) -> Result<ScrapedCredentials, ScrapeError>;
}

/// Matches `"name":"value"` (quotes around the name optional) for each
/// header and `apikey="value"` for the API key.
#[derive(Debug, Clone)]
pub struct RegexScraper {
    headers: Vec<(String, Regex)>,
    api_key: Regex,
}

impl RegexScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_headers(&SCRAPED_HEADERS)
    }

    pub fn with_headers(names: &[&str]) -> Result<Self, ScrapeError> {
        let headers = names
            .iter()
            .map(|name| {
                let pattern = format!(r#""?{}"?:"([^"]+)"#, regex::escape(name));
                Ok((name.to_string(), Regex::new(&pattern)?))
            })
            .collect::<Result<Vec<_>, ScrapeError>>()?;
        Ok(Self {
            headers,
            api_key: Regex::new(r#"apikey="([^"]+)"#)?,
        })
    }
}

impl CredentialScraper for RegexScraper {
    fn scrape(&self, script: &str) -> Result<ScrapedCredentials, ScrapeError> {
        let headers = self
            .headers
            .iter()
            .map(|(name, pattern)| {
                first_capture(pattern, script)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| ScrapeError::MissingHeader(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let api_key = first_capture(&self.api_key, script).ok_or(ScrapeError::MissingApiKey)?;
        Ok(ScrapedCredentials { headers, api_key })
    }
}

fn first_capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

//! HTTP calls against the service's private web API.

use crate::models::{AuthBundle, Media, PlaybackSession, SearchEntry, TrackMediaResponse};
use crate::scrape::{CredentialScraper, ScrapeError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ORIGIN};
use reqwest::{Client, RequestBuilder, Response};
use resolver_core::config::ServiceConfig;
use resolver_core::models::Credentials;
use resolver_core::redact::{is_sensitive_header, redact_header_value, redact_secrets};
use resolver_core::resolver::ResolverError;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CLIENT_SCRIPT_URL: &str = "http://app.rhapsody.com/assets/webclient-cli.js";
pub const DEFAULT_DIRECT_BASE_URL: &str = "https://direct.rhapsody.com/";
pub const DEFAULT_API_BASE_URL: &str = "http://api.rhapsody.com/";
pub const DEFAULT_ORIGIN: &str = "http://app.rhapsody.com";

const PASSWORD_HEADER: &str = "x-rds-authentication";
const ACCESS_TOKEN_HEADER: &str = "x-rhapsody-access-token-v2";
const CLIENT_TYPE: &str = "rhap-web";
const SEARCH_LIMIT: &str = "10";

/// Which API call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ClientScript,
    UserAccount,
    Sessions,
    Track,
    Typeahead,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::ClientScript => "client script",
            Endpoint::UserAccount => "user account",
            Endpoint::Sessions => "playback sessions",
            Endpoint::Track => "track media",
            Endpoint::Typeahead => "typeahead search",
        };
        f.write_str(name)
    }
}

/// API failure. `Clone` so a single login outcome can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: Endpoint, status: u16 },
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: Endpoint, message: String },
    #[error("unexpected {endpoint} response: {message}")]
    Decode { endpoint: Endpoint, message: String },
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error("scraped header {name} is not a valid HTTP header")]
    InvalidHeader { name: String },
    #[error("invalid service url {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<ApiError> for ResolverError {
    fn from(err: ApiError) -> Self {
        if err.is_unauthorized() {
            return ResolverError::AuthenticationFailed {
                message: err.to_string(),
            };
        }
        ResolverError::Communication {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Service locations. Base URLs always end in `/` so relative joins keep
/// their path.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub client_script: Url,
    pub direct_base: Url,
    pub api_base: Url,
    pub origin: String,
}

impl Endpoints {
    pub fn from_config(service: &ServiceConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client_script: parse_url(
                service
                    .client_script_url
                    .as_deref()
                    .unwrap_or(DEFAULT_CLIENT_SCRIPT_URL),
            )?,
            direct_base: base_url(
                service
                    .direct_base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_DIRECT_BASE_URL),
            )?,
            api_base: base_url(service.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL))?,
            origin: service
                .origin
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
        })
    }

    /// Points every endpoint at one server, e.g. a local mock.
    pub fn at(server: &str) -> Result<Self, ApiError> {
        let base = base_url(server)?;
        let client_script = base
            .join("assets/webclient-cli.js")
            .map_err(|e| invalid_url(server, e))?;
        Ok(Self {
            client_script,
            direct_base: base.clone(),
            api_base: base,
            origin: DEFAULT_ORIGIN.to_string(),
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|e| invalid_url(raw, e))
}

fn base_url(raw: &str) -> Result<Url, ApiError> {
    let mut url = parse_url(raw)?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl {
            url: raw.to_string(),
            message: "not a base url".into(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn invalid_url(raw: &str, err: impl fmt::Display) -> ApiError {
    ApiError::InvalidUrl {
        url: raw.to_string(),
        message: err.to_string(),
    }
}

/// Result of a successful login: the token bundle plus the request
/// credentials scraped for it.
#[derive(Clone)]
pub struct Account {
    pub bundle: AuthBundle,
    pub headers: HeaderMap,
    pub api_key: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("bundle", &self.bundle)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

pub struct RhapsodyApi {
    client: Client,
    endpoints: Endpoints,
    scraper: Arc<dyn CredentialScraper>,
}

impl RhapsodyApi {
    pub fn new(client: Client, endpoints: Endpoints, scraper: Arc<dyn CredentialScraper>) -> Self {
        Self {
            client,
            endpoints,
            scraper,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Scrapes fresh request headers and exchanges the credentials for an
    /// account bundle. Touches no shared state.
    pub async fn login(&self, credentials: &Credentials) -> Result<Account, ApiError> {
        let script = self.fetch_client_script().await?;
        let scraped = self.scraper.scrape(&script)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &scraped.headers {
            tracing::trace!(header = %name, value = redact_header_value(name, value), "scraped header");
            insert_header(&mut headers, name, value)?;
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        insert_header(&mut headers, ORIGIN.as_str(), &self.endpoints.origin)?;

        let bundle = self.authenticate(&headers, credentials).await?;
        tracing::debug!(user_id = %bundle.user_id, country = %bundle.country, "account authenticated");
        Ok(Account {
            bundle,
            headers,
            api_key: scraped.api_key,
        })
    }

    async fn fetch_client_script(&self) -> Result<String, ApiError> {
        let endpoint = Endpoint::ClientScript;
        let request = self.client.get(self.endpoints.client_script.clone());
        let response = self.send(endpoint, request).await?;
        response.text().await.map_err(|e| ApiError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }

    async fn authenticate(
        &self,
        headers: &HeaderMap,
        credentials: &Credentials,
    ) -> Result<AuthBundle, ApiError> {
        let endpoint = Endpoint::UserAccount;
        let url = self.direct_url(endpoint, &["authserver", "v3", "useraccounts"])?;
        let mut headers = headers.clone();
        insert_header(&mut headers, PASSWORD_HEADER, &credentials.password)?;
        let request = self
            .client
            .get(url)
            .query(&[("userName", credentials.email.as_str())])
            .headers(headers);
        self.send_json(endpoint, request).await
    }

    pub async fn create_session(&self, account: &Account) -> Result<PlaybackSession, ApiError> {
        let endpoint = Endpoint::Sessions;
        let url = self.direct_url(
            endpoint,
            &[
                "playbackserver",
                "v1",
                "users",
                &account.bundle.user_id,
                "sessions",
            ],
        )?;
        let request = self
            .client
            .post(url)
            .headers(account.headers.clone())
            .json(&json!({ "clientType": CLIENT_TYPE }));
        self.send_json(endpoint, request).await
    }

    pub async fn track_media(
        &self,
        account: &Account,
        session: &PlaybackSession,
        track_id: &str,
    ) -> Result<Vec<Media>, ApiError> {
        let endpoint = Endpoint::Track;
        let url = self.direct_url(
            endpoint,
            &[
                "playbackserver",
                "v1",
                "users",
                &account.bundle.user_id,
                "sessions",
                &session.id,
                "track",
                track_id,
            ],
        )?;
        let mut headers = account.headers.clone();
        insert_header(&mut headers, ACCESS_TOKEN_HEADER, &account.bundle.access_token)?;
        let request = self
            .client
            .get(url)
            .query(&[("context", "ON_DEMAND")])
            .headers(headers);
        let body: TrackMediaResponse = self.send_json(endpoint, request).await?;
        Ok(body.station_track.medias)
    }

    pub async fn typeahead(
        &self,
        account: &Account,
        query: &str,
    ) -> Result<Vec<SearchEntry>, ApiError> {
        let endpoint = Endpoint::Typeahead;
        let url = self
            .endpoints
            .api_base
            .join("v1/search/typeahead")
            .map_err(|e| invalid_url(self.endpoints.api_base.as_str(), e))?;
        let request = self.client.get(url).query(&[
            ("type", "track"),
            ("limit", SEARCH_LIMIT),
            ("offset", "0"),
            ("apikey", account.api_key.as_str()),
            ("catalog", account.bundle.country.as_str()),
            ("q", query),
        ]);
        self.send_json(endpoint, request).await
    }

    /// Each segment is percent-encoded on its own, so a track id containing
    /// `/` stays one path segment (`a/b` becomes `a%2Fb`).
    fn direct_url(&self, endpoint: Endpoint, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.endpoints.direct_base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl {
                url: self.endpoints.direct_base.to_string(),
                message: format!("cannot build {endpoint} url"),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, endpoint: Endpoint, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Transport {
            endpoint,
            message: redact_secrets(&e.to_string()).into_owned(),
        })?;
        let status = response.status();
        tracing::debug!(
            %endpoint,
            url = %redact_secrets(response.url().as_str()),
            status = status.as_u16(),
            "api response"
        );
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, request).await?;
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            endpoint,
            message: redact_secrets(&e.to_string()).into_owned(),
        })
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::InvalidHeader {
        name: name.to_string(),
    };
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let mut value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    if is_sensitive_header(name.as_str()) {
        value.set_sensitive(true);
    }
    headers.insert(name, value);
    Ok(())
}

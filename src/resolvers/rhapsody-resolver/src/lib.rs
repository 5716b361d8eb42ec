//! Rhapsody resolver: searches the Rhapsody catalogue and turns
//! `rhap://track/<id>` URLs into playable stream locations.

pub mod api;
mod mapping;
pub mod models;
pub mod scrape;
pub mod session;

pub use api::{Account, ApiError, Endpoint, Endpoints, RhapsodyApi};
pub use mapping::URL_SCHEME;
pub use scrape::{CredentialScraper, RegexScraper, ScrapeError, ScrapedCredentials};
pub use session::{LoginStatus, SessionManager};

use reqwest::Client;
use resolver_core::config::HttpConfig;
use resolver_core::models::{Credentials, ResolverUrl, StreamUrl, TrackRecord};
use resolver_core::resolver::{
    Capability, ConfigTestResult, Resolver, ResolverError, ResolverHost, ResolverResult,
    ResolverSettings,
};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub const RESOLVER_ID: &str = "rhapsody";

pub struct RhapsodyResolver {
    settings: ResolverSettings,
    host: Arc<dyn ResolverHost>,
    credentials: RwLock<Credentials>,
    session: SessionManager,
}

impl RhapsodyResolver {
    pub fn new(
        host: Arc<dyn ResolverHost>,
        endpoints: Endpoints,
        http: &HttpConfig,
    ) -> Result<Self, ResolverError> {
        let scraper = RegexScraper::new().map_err(|e| ResolverError::Communication {
            status: None,
            message: e.to_string(),
        })?;
        Self::with_scraper(host, endpoints, http, Arc::new(scraper))
    }

    /// Like [`new`](Self::new) with a custom client-script extraction strategy.
    pub fn with_scraper(
        host: Arc<dyn ResolverHost>,
        endpoints: Endpoints,
        http: &HttpConfig,
        scraper: Arc<dyn CredentialScraper>,
    ) -> Result<Self, ResolverError> {
        let client = Client::builder()
            .connect_timeout(http.connect_timeout())
            .timeout(http.timeout())
            .build()
            .map_err(|e| ResolverError::Communication {
                status: None,
                message: e.to_string(),
            })?;
        let api = RhapsodyApi::new(client, endpoints, scraper);
        Ok(Self {
            settings: Self::settings_for(http),
            host,
            credentials: RwLock::new(Credentials::default()),
            session: SessionManager::new(Arc::new(api)),
        })
    }

    fn settings_for(http: &HttpConfig) -> ResolverSettings {
        ResolverSettings {
            name: "Rhapsody".into(),
            weight: 90,
            timeout: http.timeout(),
            cache_time: Duration::from_secs(300),
            icon: Some("../images/logo.png".into()),
        }
    }

    pub fn login_status(&self) -> LoginStatus {
        self.session.status()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopts `config` and, when it is complete, starts a background login.
    fn apply(&self, config: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config.clone();

        if !config.is_complete() {
            self.host.report_capabilities(Capability::NullCapability);
            tracing::info!("invalid configuration, email and password are required");
            return;
        }

        self.host.report_capabilities(Capability::UrlLookup);
        let pending = self.session.login(&config);
        tokio::spawn(async move {
            let _ = pending.await;
        });
    }
}

#[async_trait::async_trait]
impl Resolver for RhapsodyResolver {
    fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    async fn init(&self) {
        self.apply(self.host.user_config());
    }

    async fn new_config_saved(&self, config: Credentials) {
        if self.credentials() == config {
            return;
        }
        tracing::info!(quality = %config.quality, "configuration changed, logging in again");
        self.session.reset();
        self.apply(config);
    }

    async fn test_config(&self, config: &Credentials) -> ConfigTestResult {
        self.session.test_configuration(config).await
    }

    async fn get_stream_url(&self, url: &str) -> ResolverResult<StreamUrl> {
        let Some(parsed) = ResolverUrl::parse(url, URL_SCHEME) else {
            return Ok(StreamUrl::new(url));
        };
        let quality = self.credentials().quality;
        self.session.stream_url(&parsed.id, quality).await
    }

    async fn search(&self, query: &str) -> ResolverResult<Vec<TrackRecord>> {
        let quality = self.credentials().quality;
        self.session.search(query, quality).await
    }
}

//! Line-delimited JSON server that exposes a [`Resolver`] to an external host.

use crate::host::PluginHost;
use crate::protocol::{
    PluginError, PluginErrorKind, PluginInfo, PluginMethod, PluginRequest, PluginResponse,
    PluginResult,
};
use resolver_core::resolver::Resolver;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Errors that stop the serve loop. Resolver failures are answered on the
/// wire instead.
#[derive(Debug, Error)]
pub enum PluginServerError {
    #[error("failed to read request: {0}")]
    Read(std::io::Error),
    #[error("failed to write response: {0}")]
    Write(std::io::Error),
    #[error("failed to encode response: {0}")]
    Encode(serde_json::Error),
}

/// Serves one resolver. Requests are handled one at a time, so responses
/// leave in the order requests arrived.
pub struct PluginServer<R> {
    info: PluginInfo,
    resolver: R,
    host: Arc<PluginHost>,
}

impl<R: Resolver> PluginServer<R> {
    /// `host` must be the same host the resolver was built with.
    pub fn new(id: &str, version: &str, resolver: R, host: Arc<PluginHost>) -> Self {
        let info = PluginInfo::new(id, version, resolver.settings());
        Self {
            info,
            resolver,
            host,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Reads requests until EOF or `Shutdown`.
    pub async fn serve<I, O>(&self, input: I, mut output: O) -> Result<(), PluginServerError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        tracing::info!(plugin_id = %self.info.id, "plugin server started");
        while let Some(line) = lines.next_line().await.map_err(PluginServerError::Read)? {
            if line.trim().is_empty() {
                continue;
            }
            let (response, keep_going) = self.handle_line(&line).await;
            let mut encoded = serde_json::to_string(&response).map_err(PluginServerError::Encode)?;
            encoded.push('\n');
            output
                .write_all(encoded.as_bytes())
                .await
                .map_err(PluginServerError::Write)?;
            output.flush().await.map_err(PluginServerError::Write)?;
            if !keep_going {
                tracing::info!("plugin server shutting down");
                return Ok(());
            }
        }
        tracing::info!("input closed, plugin server stopping");
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> (PluginResponse, bool) {
        match serde_json::from_str::<PluginRequest>(line) {
            Ok(request) => {
                let keep_going = !matches!(request.method, PluginMethod::Shutdown);
                (self.handle(request).await, keep_going)
            }
            Err(err) => {
                tracing::warn!(error = %err, "malformed plugin request");
                let error = PluginError::new(PluginErrorKind::InvalidRequest, err.to_string());
                (PluginResponse::error(0, error), true)
            }
        }
    }

    /// Answers a single request.
    pub async fn handle(&self, request: PluginRequest) -> PluginResponse {
        let PluginRequest { id, method } = request;
        tracing::debug!(id, method = method.name(), "plugin request");
        let result = match method {
            PluginMethod::Initialize => PluginResult::Initialized(self.info.clone()),
            PluginMethod::Init { config } => {
                self.host.set_config(config);
                self.resolver.init().await;
                self.capability()
            }
            PluginMethod::NewConfigSaved { config } => {
                self.host.set_config(config.clone());
                self.resolver.new_config_saved(config).await;
                self.capability()
            }
            PluginMethod::TestConfig { config } => PluginResult::ConfigTest {
                result: self.resolver.test_config(&config).await,
            },
            PluginMethod::Search { query } => match self.resolver.search(&query).await {
                Ok(tracks) => PluginResult::Tracks { tracks },
                Err(err) => PluginResult::Error(err.into()),
            },
            PluginMethod::Resolve { query } => match self.resolver.resolve(&query).await {
                Ok(tracks) => PluginResult::Tracks { tracks },
                Err(err) => PluginResult::Error(err.into()),
            },
            PluginMethod::GetStreamUrl { url } => match self.resolver.get_stream_url(&url).await {
                Ok(stream) => PluginResult::StreamUrl { url: stream.0 },
                Err(err) => PluginResult::Error(err.into()),
            },
            PluginMethod::Shutdown => PluginResult::ShutdownAck,
        };
        if let PluginResult::Error(err) = &result {
            tracing::warn!(id, kind = ?err.kind, message = %err.message, "plugin request failed");
        }
        PluginResponse { id, result }
    }

    fn capability(&self) -> PluginResult {
        match self.host.capability() {
            Some(capability) => PluginResult::Capability { capability },
            None => PluginResult::Ack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver_core::models::{Credentials, Quality, StreamUrl, TrackRecord};
    use resolver_core::resolver::{
        Capability, ConfigTestResult, ResolverError, ResolverHost, ResolverResult,
        ResolverSettings,
    };
    use std::time::Duration;

    struct EchoResolver {
        settings: ResolverSettings,
        host: Arc<PluginHost>,
    }

    impl EchoResolver {
        fn new(host: Arc<PluginHost>) -> Self {
            Self {
                settings: ResolverSettings {
                    name: "Echo".into(),
                    weight: 40,
                    timeout: Duration::from_secs(5),
                    cache_time: Duration::from_secs(60),
                    icon: None,
                },
                host,
            }
        }
    }

    #[async_trait::async_trait]
    impl Resolver for EchoResolver {
        fn settings(&self) -> &ResolverSettings {
            &self.settings
        }

        async fn init(&self) {
            let capability = if self.host.user_config().is_complete() {
                Capability::UrlLookup
            } else {
                Capability::NullCapability
            };
            self.host.report_capabilities(capability);
        }

        async fn new_config_saved(&self, _config: Credentials) {
            self.init().await;
        }

        async fn test_config(&self, config: &Credentials) -> ConfigTestResult {
            if config.password == "secret" {
                ConfigTestResult::Success
            } else {
                ConfigTestResult::InvalidCredentials
            }
        }

        async fn get_stream_url(&self, url: &str) -> ResolverResult<StreamUrl> {
            match url.strip_prefix("echo://track/") {
                Some("missing") => Err(ResolverError::LookupFailed {
                    message: "no media".into(),
                }),
                Some(id) => Ok(StreamUrl::new(format!("http://stream.example.com/{id}"))),
                None => Ok(StreamUrl::new(url)),
            }
        }

        async fn search(&self, query: &str) -> ResolverResult<Vec<TrackRecord>> {
            Ok(vec![TrackRecord {
                artist: "Echo".into(),
                album: String::new(),
                title: query.to_string(),
                bitrate: self.host.user_config().quality.bitrate(),
                duration_seconds: None,
                url: format!("echo://track/{query}"),
            }])
        }
    }

    fn server() -> PluginServer<EchoResolver> {
        let host = Arc::new(PluginHost::default());
        let resolver = EchoResolver::new(Arc::clone(&host));
        PluginServer::new("echo", "0.1.0", resolver, host)
    }

    async fn run(server: &PluginServer<EchoResolver>, input: &str) -> Vec<serde_json::Value> {
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn initialize_reports_settings() {
        let server = server();
        let responses = run(&server, "{\"id\":1,\"method\":{\"type\":\"Initialize\"}}\n").await;
        let result = &responses[0]["result"];
        assert_eq!(result["status"], "Initialized");
        assert_eq!(result["name"], "Echo");
        assert_eq!(result["weight"], 40);
        assert_eq!(result["protocol_version"], 1);
    }

    #[tokio::test]
    async fn answers_in_arrival_order_until_shutdown() {
        let server = server();
        let input = [
            r#"{"id":1,"method":{"type":"Init","params":{"config":{"email":"a@b.c","password":"secret","quality":0}}}}"#,
            r#"{"id":2,"method":{"type":"Search","params":{"query":"song"}}}"#,
            r#"{"id":3,"method":{"type":"GetStreamUrl","params":{"url":"echo://track/song"}}}"#,
            r#"{"id":4,"method":{"type":"Shutdown"}}"#,
            r#"{"id":5,"method":{"type":"Search","params":{"query":"ignored"}}}"#,
        ]
        .join("\n");

        let responses = run(&server, &input).await;
        let ids: Vec<_> = responses.iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(responses[0]["result"]["capability"], "UrlLookup");
        assert_eq!(responses[1]["result"]["tracks"][0]["bitrate"], 64);
        assert_eq!(
            responses[2]["result"]["url"],
            "http://stream.example.com/song"
        );
        assert_eq!(responses[3]["result"]["status"], "ShutdownAck");
    }

    #[tokio::test]
    async fn malformed_lines_are_answered_and_skipped() {
        let server = server();
        let input = "not json\n\n{\"id\":9,\"method\":{\"type\":\"Search\",\"params\":{\"query\":\"x\"}}}\n";
        let responses = run(&server, input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 0);
        assert_eq!(responses[0]["result"]["status"], "Error");
        assert_eq!(responses[0]["result"]["kind"], "invalid_request");
        assert_eq!(responses[1]["id"], 9);
    }

    #[tokio::test]
    async fn resolver_errors_become_error_results() {
        let server = server();
        let response = server
            .handle(PluginRequest {
                id: 4,
                method: PluginMethod::GetStreamUrl {
                    url: "echo://track/missing".into(),
                },
            })
            .await;
        match response.result {
            PluginResult::Error(err) => assert_eq!(err.kind, PluginErrorKind::NotFound),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn config_changes_update_host_and_capability() {
        let server = server();
        let response = server
            .handle(PluginRequest {
                id: 1,
                method: PluginMethod::NewConfigSaved {
                    config: Credentials::new("a@b.c", "", Quality::High),
                },
            })
            .await;
        assert!(matches!(
            response.result,
            PluginResult::Capability {
                capability: Capability::NullCapability
            }
        ));

        let response = server
            .handle(PluginRequest {
                id: 2,
                method: PluginMethod::TestConfig {
                    config: Credentials::new("a@b.c", "secret", Quality::High),
                },
            })
            .await;
        assert!(matches!(
            response.result,
            PluginResult::ConfigTest {
                result: ConfigTestResult::Success
            }
        ));
    }
}

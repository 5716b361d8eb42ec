use crate::models::{ResolveQuery, ResolverUrl};
use crate::resolver::Resolver;
use thiserror::Error;

/// Expectations supplied by a resolver implementation to run the shared contract suite.
#[derive(Debug, Clone)]
pub struct ResolverContractExpectations {
    /// URL scheme every returned track must use (e.g. "rhap").
    pub url_scheme: String,
    /// Required search expectation; validates ordering and metadata.
    pub search: SearchExpectation,
    /// Resolve expectation; the query should find the same first track.
    pub resolve: Option<ResolveQuery>,
    /// Bitrate every track should advertise for the configured quality.
    pub bitrate: u32,
}

/// Search expectation used to validate resolver search behavior.
#[derive(Debug, Clone)]
pub struct SearchExpectation {
    /// Query text to send to the resolver.
    pub query: String,
    /// The first track URL expected for the query (service order is preserved).
    pub expected_first_url: String,
}

/// Errors surfaced by the resolver contract test harness.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolverContractError {
    #[error("search returned no tracks for query: {query}")]
    EmptySearch { query: String },
    #[error("search returned wrong first track: expected {expected}, got {actual}")]
    SearchWrongFirstTrack { expected: String, actual: String },
    #[error("track url {url} does not use the {scheme}:// scheme")]
    ForeignTrackUrl { url: String, scheme: String },
    #[error("track {url} advertises {actual} kbps, expected {expected}")]
    BitrateMismatch {
        url: String,
        expected: u32,
        actual: u32,
    },
    #[error("resolve did not return the search result first: expected {expected}, got {actual:?}")]
    ResolveMismatch {
        expected: String,
        actual: Option<String>,
    },
    #[error("stream URL was empty for {url}")]
    EmptyStreamUrl { url: String },
    #[error("stream URL for {url} was returned unresolved")]
    UnresolvedStreamUrl { url: String },
    #[error("foreign URL {url} was not passed through unchanged")]
    ForeignUrlRewritten { url: String },
    #[error("resolver error while running contract: {0}")]
    ResolverFailure(String),
}

/// Run the shared resolver contract suite against a resolver implementation.
///
/// Resolvers should call this from their crate-level tests with fixtures
/// served by their test setup. The resolver must already be initialized.
pub async fn run_resolver_contract<R: Resolver>(
    resolver: &R,
    expectations: &ResolverContractExpectations,
) -> Result<(), ResolverContractError> {
    let first = verify_search(resolver, expectations).await?;
    verify_resolve(resolver, expectations, &first).await?;
    verify_stream(resolver, &first).await?;
    verify_passthrough(resolver).await?;
    Ok(())
}

async fn verify_search<R: Resolver>(
    resolver: &R,
    expectations: &ResolverContractExpectations,
) -> Result<String, ResolverContractError> {
    let tracks = resolver
        .search(&expectations.search.query)
        .await
        .map_err(|e| ResolverContractError::ResolverFailure(e.to_string()))?;

    let first = tracks
        .first()
        .ok_or_else(|| ResolverContractError::EmptySearch {
            query: expectations.search.query.clone(),
        })?;
    if first.url != expectations.search.expected_first_url {
        return Err(ResolverContractError::SearchWrongFirstTrack {
            expected: expectations.search.expected_first_url.clone(),
            actual: first.url.clone(),
        });
    }

    for track in &tracks {
        if ResolverUrl::parse(&track.url, &expectations.url_scheme).is_none() {
            return Err(ResolverContractError::ForeignTrackUrl {
                url: track.url.clone(),
                scheme: expectations.url_scheme.clone(),
            });
        }
        if track.bitrate != expectations.bitrate {
            return Err(ResolverContractError::BitrateMismatch {
                url: track.url.clone(),
                expected: expectations.bitrate,
                actual: track.bitrate,
            });
        }
    }

    Ok(first.url.clone())
}

async fn verify_resolve<R: Resolver>(
    resolver: &R,
    expectations: &ResolverContractExpectations,
    first_url: &str,
) -> Result<(), ResolverContractError> {
    let Some(query) = &expectations.resolve else {
        return Ok(());
    };
    let tracks = resolver
        .resolve(query)
        .await
        .map_err(|e| ResolverContractError::ResolverFailure(e.to_string()))?;
    let actual = tracks.first().map(|t| t.url.clone());
    if actual.as_deref() != Some(first_url) {
        return Err(ResolverContractError::ResolveMismatch {
            expected: first_url.to_string(),
            actual,
        });
    }
    Ok(())
}

async fn verify_stream<R: Resolver>(
    resolver: &R,
    url: &str,
) -> Result<(), ResolverContractError> {
    let stream = resolver
        .get_stream_url(url)
        .await
        .map_err(|e| ResolverContractError::ResolverFailure(e.to_string()))?;
    if stream.as_ref().is_empty() {
        return Err(ResolverContractError::EmptyStreamUrl {
            url: url.to_string(),
        });
    }
    if stream.as_ref() == url {
        return Err(ResolverContractError::UnresolvedStreamUrl {
            url: url.to_string(),
        });
    }
    Ok(())
}

async fn verify_passthrough<R: Resolver>(resolver: &R) -> Result<(), ResolverContractError> {
    let foreign = "https://cdn.example.com/audio/track.mp3";
    let stream = resolver
        .get_stream_url(foreign)
        .await
        .map_err(|e| ResolverContractError::ResolverFailure(e.to_string()))?;
    if stream.as_ref() != foreign {
        return Err(ResolverContractError::ForeignUrlRewritten {
            url: foreign.to_string(),
        });
    }
    Ok(())
}

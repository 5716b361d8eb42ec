//! Login, playback session and token lifecycle.
//!
//! State machine: `Unattempted | Failed -> Pending -> Authenticated | Failed`,
//! and `reset` returns to `Unattempted`. A pending login is a shared future
//! stored in the state; every caller awaits a clone of it, so concurrent
//! callers observe one HTTP login sequence and one outcome. The future
//! records its own outcome, so the state leaves `Pending` even when the
//! caller that started it goes away.

use crate::api::{Account, ApiError, RhapsodyApi};
use crate::mapping::{map_track, rewrite_location, select_media};
use crate::models::PlaybackSession;
use futures::future::{BoxFuture, FutureExt, Shared};
use resolver_core::models::{Credentials, Quality, StreamUrl, TrackRecord};
use resolver_core::resolver::{ConfigTestResult, ResolverError, ResolverResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type LoginOutcome = Result<Arc<Account>, ApiError>;

/// Handle on an in-flight login. Cloning joins the same attempt.
pub type PendingLogin = Shared<BoxFuture<'static, LoginOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Unattempted,
    Pending,
    Authenticated,
    Failed,
}

enum LoginState {
    Unattempted,
    Pending(PendingLogin),
    Authenticated(Arc<Account>),
    Failed(ApiError),
}

struct SessionState {
    login: LoginState,
    /// Bumped on every login start and reset; results tagged with an older
    /// epoch are discarded.
    epoch: u64,
    playback: Option<PlaybackSession>,
}

#[derive(Clone)]
pub struct SessionManager {
    api: Arc<RhapsodyApi>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    pub fn new(api: Arc<RhapsodyApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(SessionState {
                login: LoginState::Unattempted,
                epoch: 0,
                playback: None,
            })),
        }
    }

    pub fn status(&self) -> LoginStatus {
        match self.lock().login {
            LoginState::Unattempted => LoginStatus::Unattempted,
            LoginState::Pending(_) => LoginStatus::Pending,
            LoginState::Authenticated(_) => LoginStatus::Authenticated,
            LoginState::Failed(_) => LoginStatus::Failed,
        }
    }

    /// Starts a login, or joins the one already in flight.
    ///
    /// Nothing is sent until the returned handle is polled.
    pub fn login(&self, credentials: &Credentials) -> PendingLogin {
        let mut state = self.lock();
        if let LoginState::Pending(pending) = &state.login {
            tracing::debug!("login already in progress, joining it");
            return pending.clone();
        }

        state.epoch += 1;
        let epoch = state.epoch;
        let api = Arc::clone(&self.api);
        let shared_state = Arc::clone(&self.state);
        let credentials = credentials.clone();

        let pending = async move {
            let outcome = api.login(&credentials).await.map(Arc::new);
            let mut state = lock_state(&shared_state);
            if state.epoch != epoch {
                tracing::debug!("discarding login outcome from a previous configuration");
                return outcome;
            }
            state.playback = None;
            state.login = match &outcome {
                Ok(account) => {
                    tracing::info!(country = %account.bundle.country, "Rhapsody successfully logged in");
                    LoginState::Authenticated(Arc::clone(account))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Rhapsody failed login");
                    LoginState::Failed(err.clone())
                }
            };
            outcome
        }
        .boxed()
        .shared();

        state.login = LoginState::Pending(pending.clone());
        pending
    }

    /// Current login outcome, waiting for a pending attempt. `None` when no
    /// login has been started since the last reset.
    pub async fn outcome(&self) -> Option<LoginOutcome> {
        let pending = {
            let state = self.lock();
            match &state.login {
                LoginState::Unattempted => return None,
                LoginState::Pending(pending) => pending.clone(),
                LoginState::Authenticated(account) => return Some(Ok(Arc::clone(account))),
                LoginState::Failed(err) => return Some(Err(err.clone())),
            }
        };
        Some(pending.await)
    }

    async fn account(&self) -> ResolverResult<Arc<Account>> {
        match self.outcome().await {
            Some(Ok(account)) => Ok(account),
            Some(Err(_)) | None => Err(ResolverError::NotAuthenticated),
        }
    }

    /// Cached playback session, created on first use.
    pub async fn session(&self) -> ResolverResult<PlaybackSession> {
        let account = self.account().await?;
        self.session_for(&account).await
    }

    async fn session_for(&self, account: &Account) -> ResolverResult<PlaybackSession> {
        let epoch = {
            let state = self.lock();
            if let Some(session) = &state.playback {
                return Ok(session.clone());
            }
            state.epoch
        };

        let session = self.api.create_session(account).await?;
        tracing::debug!(session_id = %session.id, "created playback session");

        let mut state = self.lock();
        if state.epoch == epoch {
            match &state.playback {
                Some(existing) => return Ok(existing.clone()),
                None => state.playback = Some(session.clone()),
            }
        }
        Ok(session)
    }

    /// Resolves a track id to a stream URL at exactly `quality`.
    pub async fn stream_url(&self, track_id: &str, quality: Quality) -> ResolverResult<StreamUrl> {
        let account = self.account().await?;
        let session = self.session_for(&account).await?;
        let medias = self.api.track_media(&account, &session, track_id).await?;
        let media = select_media(&medias, quality)?;
        let url = rewrite_location(&media.location)?;
        tracing::debug!(track_id, bitrate = quality.bitrate(), "resolved stream url");
        Ok(StreamUrl::new(url))
    }

    /// Typeahead search. Yields an empty list while unauthenticated.
    pub async fn search(&self, query: &str, quality: Quality) -> ResolverResult<Vec<TrackRecord>> {
        let account = match self.outcome().await {
            Some(Ok(account)) => account,
            Some(Err(_)) | None => {
                tracing::debug!("search while not logged in, returning no results");
                return Ok(Vec::new());
            }
        };
        let entries = self.api.typeahead(&account, query).await?;
        Ok(entries.iter().map(|entry| map_track(entry, quality)).collect())
    }

    /// Runs the login sequence for `candidate` without touching this
    /// manager's state.
    pub async fn test_configuration(&self, candidate: &Credentials) -> ConfigTestResult {
        match self.api.login(candidate).await {
            Ok(_) => ConfigTestResult::Success,
            Err(err) if err.is_unauthorized() => ConfigTestResult::InvalidCredentials,
            Err(err) => {
                tracing::warn!(error = %err, "configuration test failed");
                ConfigTestResult::CommunicationError
            }
        }
    }

    /// Forgets the account and playback session.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.login = LoginState::Unattempted;
        state.playback = None;
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

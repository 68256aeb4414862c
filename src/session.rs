//! Session state machine.
//!
//! ```text
//!                 login()                 ok
//! Unauthenticated ───────► Authenticating ───► Authenticated ◄──┐
//!        ▲                      │ err              │ refresh()  │ ok
//!        │◄─────────────────────┘                  ▼            │
//!        │◄────────────── err (store cleared) ── Refreshing ────┘
//!        │
//!        └──── logout() from any state
//! ```
//!
//! A [`SessionManager`] is a cheap handle; clones share one session. Only one
//! refresh is ever in flight: concurrent callers await the same shared future
//! and observe the same outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;

use crate::backend::AuthBackend;
use crate::error::Error;
use crate::store::{Slot, TokenStore};
use crate::types::{AccessToken, Credentials, RefreshToken, UserProfile};

/// Message shown when the backend gives no reason for a failed login.
pub const LOGIN_FAILED_MESSAGE: &str = "Erro ao fazer login";

/// Message for a login response lacking the profile or the access token.
pub const INCOMPLETE_LOGIN_MESSAGE: &str = "Dados de autenticação incompletos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Why the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Explicit [`SessionManager::logout`].
    LoggedOut,
    /// Refresh failed; the host should send the user to the login view.
    Expired,
}

/// Credentials and profile of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub user: Option<UserProfile>,
}

/// Point-in-time view of the session, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AuthState,
    /// `false` until the startup restore has run.
    pub settled: bool,
    pub authenticated: bool,
    pub user: Option<UserProfile>,
    pub end: Option<SessionEnd>,
}

type RefreshFlight = Shared<BoxFuture<'static, Result<AccessToken, Error>>>;

enum RefreshCause<'a> {
    Requested,
    /// A request carrying this token (or none) got a 401.
    Rejected(Option<&'a AccessToken>),
}

struct Core {
    state: AuthState,
    session: Option<Session>,
    /// Bumped whenever a session starts or ends. Responses that come back
    /// under an older epoch are discarded.
    epoch: u64,
    settled: bool,
    end: Option<SessionEnd>,
    refresh: Option<RefreshFlight>,
}

impl Core {
    fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated | AuthState::Refreshing)
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.user.is_some() && !s.access_token.as_str().is_empty())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            settled: self.settled,
            authenticated: self.is_authenticated(),
            user: self.session.as_ref().and_then(|s| s.user.clone()),
            end: self.end,
        }
    }
}

struct Inner<B> {
    backend: B,
    store: Box<dyn TokenStore>,
    core: Mutex<Core>,
    events: watch::Sender<SessionSnapshot>,
}

/// Owner of the "is a user logged in" state.
pub struct SessionManager<B> {
    inner: Arc<Inner<B>>,
}

// Manual Clone: avoid derive adding a `B: Clone` bound.
impl<B> Clone for SessionManager<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AuthBackend> SessionManager<B> {
    /// Create an unsettled manager. Call [`restore`](Self::restore) before
    /// routing decisions are made.
    pub fn new(backend: B, store: impl TokenStore + 'static) -> Self {
        let core = Core {
            state: AuthState::Unauthenticated,
            session: None,
            epoch: 0,
            settled: false,
            end: None,
            refresh: None,
        };
        let (events, _) = watch::channel(core.snapshot());
        Self {
            inner: Arc::new(Inner {
                backend,
                store: Box::new(store),
                core: Mutex::new(core),
                events,
            }),
        }
    }

    /// [`new`](Self::new) followed by [`restore`](Self::restore).
    pub fn restored(backend: B, store: impl TokenStore + 'static) -> Self {
        let manager = Self::new(backend, store);
        manager.restore();
        manager
    }

    /// Load the persisted session without contacting the backend.
    ///
    /// A stored access token plus a readable profile yields `Authenticated`
    /// straight away. Any partial or unreadable combination is treated as
    /// unauthenticated and the store is cleared. Runs once; later calls are
    /// ignored.
    pub fn restore(&self) {
        let mut core = self.inner.lock();
        if core.settled {
            return;
        }

        let store = &self.inner.store;
        let access = store.get(Slot::AccessToken);
        let refresh = store.get(Slot::RefreshToken);
        let user_raw = store.get(Slot::UserData);

        let user = user_raw
            .as_deref()
            .and_then(|raw| match serde_json::from_str::<UserProfile>(raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored user data is unreadable");
                    None
                }
            });

        match (access, user) {
            (Some(access), Some(user)) if !access.is_empty() => {
                tracing::info!(admin_id = %user.id, "Session restored from store");
                core.session = Some(Session {
                    access_token: AccessToken::new(access),
                    refresh_token: refresh.map(RefreshToken::new),
                    user: Some(user),
                });
                core.state = AuthState::Authenticated;
            }
            (None, None) if refresh.is_none() && user_raw.is_none() => {}
            _ => {
                tracing::warn!("Stored session is incomplete; clearing it");
                store.clear_all();
            }
        }

        core.settled = true;
        self.inner.publish(&core);
    }

    /// Authenticate with the backend and persist the new session.
    ///
    /// Any existing session is discarded first. On failure the manager is
    /// left `Unauthenticated` and the error is an [`Error::Login`] carrying
    /// the backend's message, or [`LOGIN_FAILED_MESSAGE`] when it sent none.
    pub async fn login(&self, credentials: Credentials) -> Result<UserProfile, Error> {
        let epoch = {
            let mut core = self.inner.lock();
            // The previous session is gone from here on, even if this login fails.
            core.epoch += 1;
            core.state = AuthState::Authenticating;
            core.session = None;
            core.refresh = None;
            core.end = None;
            self.inner.store.clear_all();
            self.inner.publish(&core);
            core.epoch
        };

        let result = self.inner.backend.login(&credentials).await;

        let mut core = self.inner.lock();
        if core.epoch != epoch {
            tracing::debug!("Login response arrived after the session changed; discarding");
            return Err(Error::Login(LOGIN_FAILED_MESSAGE.into()));
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, login = %credentials.login, "Login rejected");
                core.state = AuthState::Unauthenticated;
                self.inner.publish(&core);
                return Err(Error::Login(login_failure_message(&e)));
            }
        };

        let (Some(user), Some(access_token)) = (response.administrador, response.access_token)
        else {
            tracing::warn!(login = %credentials.login, "Login response is missing required fields");
            core.state = AuthState::Unauthenticated;
            self.inner.publish(&core);
            return Err(Error::Login(INCOMPLETE_LOGIN_MESSAGE.into()));
        };

        let store = &self.inner.store;
        store.set(Slot::AccessToken, access_token.as_str());
        match &response.refresh_token {
            Some(token) => store.set(Slot::RefreshToken, token.as_str()),
            None => store.clear(Slot::RefreshToken),
        }
        match serde_json::to_string(&user) {
            Ok(json) => store.set(Slot::UserData, &json),
            Err(e) => tracing::warn!(error = %e, "Could not serialize user data"),
        }

        core.session = Some(Session {
            access_token,
            refresh_token: response.refresh_token,
            user: Some(user.clone()),
        });
        core.state = AuthState::Authenticated;
        self.inner.publish(&core);

        tracing::info!(admin_id = %user.id, "Login successful");
        Ok(user)
    }

    /// End the session.
    ///
    /// The backend is told to invalidate the refresh token, but its answer
    /// is ignored: the store is cleared and the state reset regardless.
    pub async fn logout(&self) {
        let tokens = {
            let core = self.inner.lock();
            core.session
                .as_ref()
                .and_then(|s| Some((s.refresh_token.clone()?, s.access_token.clone())))
        };

        if let Some((refresh_token, access_token)) = tokens {
            if let Err(e) = self
                .inner
                .backend
                .logout(&refresh_token, Some(&access_token))
                .await
            {
                tracing::warn!(error = %e, "Logout request failed; clearing session anyway");
            }
        }

        let mut core = self.inner.lock();
        self.inner.teardown(&mut core, SessionEnd::LoggedOut);
        tracing::info!("Logged out");
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// If a refresh is already running, waits for it instead of starting a
    /// second one. On failure the session is torn down and every waiter
    /// gets [`Error::SessionExpired`].
    pub async fn refresh(&self) -> Result<AccessToken, Error> {
        self.start_or_join_refresh(RefreshCause::Requested).await
    }

    /// Refresh because a request sent with `sent_with` was rejected.
    ///
    /// If the session now holds a different token (another caller's refresh
    /// finished in the meantime, or a login happened after an anonymous
    /// request went out), that token is returned without contacting the
    /// backend.
    pub(crate) async fn refresh_after(
        &self,
        sent_with: Option<&AccessToken>,
    ) -> Result<AccessToken, Error> {
        self.start_or_join_refresh(RefreshCause::Rejected(sent_with))
            .await
    }

    async fn start_or_join_refresh(&self, cause: RefreshCause<'_>) -> Result<AccessToken, Error> {
        let flight = {
            let mut core = self.inner.lock();
            if let Some(flight) = &core.refresh {
                flight.clone()
            } else {
                if let (AuthState::Authenticated, Some(session), RefreshCause::Rejected(sent_with)) =
                    (core.state, &core.session, &cause)
                {
                    if *sent_with != Some(&session.access_token) {
                        return Ok(session.access_token.clone());
                    }
                }

                let refresh_token = match (&core.state, &core.session) {
                    (AuthState::Authenticated, Some(session)) => session.refresh_token.clone(),
                    _ => return Err(Error::SessionExpired),
                };
                let Some(refresh_token) = refresh_token else {
                    tracing::warn!("No refresh token available; ending session");
                    self.inner.teardown(&mut core, SessionEnd::Expired);
                    return Err(Error::SessionExpired);
                };

                let epoch = core.epoch;
                let inner = Arc::clone(&self.inner);
                let flight = async move { inner.run_refresh(epoch, refresh_token).await }
                    .boxed()
                    .shared();

                core.state = AuthState::Refreshing;
                core.refresh = Some(flight.clone());
                self.inner.publish(&core);
                flight
            }
        };

        flight.await
    }

    /// Replace the cached profile of the live session, e.g. after the
    /// administrator edited their own record. The `userData` slot is
    /// rewritten and a snapshot published.
    ///
    /// # Errors
    ///
    /// [`Error::SessionExpired`] when no session is held; nothing is stored.
    pub fn set_user(&self, user: UserProfile) -> Result<(), Error> {
        let mut core = self.inner.lock();
        let live = matches!(core.state, AuthState::Authenticated | AuthState::Refreshing);
        let Some(session) = core.session.as_mut().filter(|_| live) else {
            return Err(Error::SessionExpired);
        };

        match serde_json::to_string(&user) {
            Ok(json) => self.inner.store.set(Slot::UserData, &json),
            Err(e) => tracing::warn!(error = %e, "Could not serialize user data"),
        }
        tracing::debug!(admin_id = %user.id, "Profile updated");
        session.user = Some(user);
        self.inner.publish(&core);
        Ok(())
    }

    /// True iff the state is `Authenticated` or `Refreshing` and both an
    /// access token and a user profile are held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().is_authenticated()
    }

    /// Whether the startup restore has run.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.lock().settled
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.lock().state
    }

    /// Current bearer credential, if a session is live.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        let core = self.inner.lock();
        match core.state {
            AuthState::Authenticated | AuthState::Refreshing => {
                core.session.as_ref().map(|s| s.access_token.clone())
            }
            AuthState::Unauthenticated | AuthState::Authenticating => None,
        }
    }

    /// Profile of the logged-in administrator.
    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.inner
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.user.clone())
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot()
    }

    /// Watch session transitions. The receiver starts at the current snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.events.subscribe()
    }
}

/// Top-level `message` first, then any other payload message, then
/// [`LOGIN_FAILED_MESSAGE`].
fn login_failure_message(error: &Error) -> String {
    error
        .payload()
        .and_then(|payload| {
            payload
                .get_str("message")
                .map(str::to_owned)
                .or_else(|| payload.message())
        })
        .unwrap_or_else(|| LOGIN_FAILED_MESSAGE.into())
}

impl<B: AuthBackend> Inner<B> {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, core: &Core) {
        self.events.send_replace(core.snapshot());
    }

    /// Drop the session, clear the store and start a new epoch.
    fn teardown(&self, core: &mut Core, end: SessionEnd) {
        core.epoch += 1;
        core.state = AuthState::Unauthenticated;
        core.session = None;
        core.refresh = None;
        core.end = Some(end);
        self.store.clear_all();
        self.publish(core);
    }

    async fn run_refresh(
        self: Arc<Self>,
        epoch: u64,
        refresh_token: RefreshToken,
    ) -> Result<AccessToken, Error> {
        let result = self.backend.refresh(&refresh_token).await;

        let mut core = self.lock();
        if core.epoch != epoch {
            tracing::debug!("Refresh finished after the session ended; discarding");
            return Err(Error::SessionExpired);
        }
        core.refresh = None;

        let pair = match result {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed; ending session");
                self.teardown(&mut core, SessionEnd::Expired);
                return Err(Error::SessionExpired);
            }
        };

        let Some(session) = core.session.as_mut() else {
            self.teardown(&mut core, SessionEnd::Expired);
            return Err(Error::SessionExpired);
        };
        session.access_token = pair.access_token.clone();
        self.store.set(Slot::AccessToken, pair.access_token.as_str());
        if let Some(rotated) = pair.refresh_token {
            self.store.set(Slot::RefreshToken, rotated.as_str());
            session.refresh_token = Some(rotated);
        }

        core.state = AuthState::Authenticated;
        self.publish(&core);
        tracing::info!("Access token refreshed");
        Ok(pair.access_token)
    }
}

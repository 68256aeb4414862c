use crate::backend::AuthBackend;
use crate::session::SessionManager;

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session restore has not run yet. Show a placeholder and decide later.
    Pending,
    /// Not logged in. `to` is the login view with the requested location
    /// attached as `?from=`.
    Redirect { to: String },
    /// Render the requested view as-is.
    Allow,
}

/// Gate for protected views, driven by a [`SessionManager`].
///
/// ```rust,ignore
/// let guard = RouteGuard::new(api.session().clone(), "/login");
/// match guard.resolve("/clientes?page=2").await {
///     GuardDecision::Allow => render(),
///     GuardDecision::Redirect { to } => navigate(&to),
///     GuardDecision::Pending => show_placeholder(),
/// }
/// ```
pub struct RouteGuard<B> {
    session: SessionManager<B>,
    login_path: String,
}

impl<B> Clone for RouteGuard<B> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            login_path: self.login_path.clone(),
        }
    }
}

impl<B: AuthBackend> RouteGuard<B> {
    #[must_use]
    pub fn new(session: SessionManager<B>, login_path: impl Into<String>) -> Self {
        Self {
            session,
            login_path: login_path.into(),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decide without waiting. Returns [`GuardDecision::Pending`] while the
    /// startup restore has not run.
    #[must_use]
    pub fn evaluate(&self, requested: &str) -> GuardDecision {
        let snapshot = self.session.snapshot();
        if !snapshot.settled {
            return GuardDecision::Pending;
        }
        if snapshot.authenticated {
            GuardDecision::Allow
        } else {
            tracing::debug!(requested, "Protected view requested without a session");
            GuardDecision::Redirect {
                to: self.login_redirect(requested),
            }
        }
    }

    /// Wait for the session to settle, then decide. Never returns
    /// [`GuardDecision::Pending`].
    pub async fn resolve(&self, requested: &str) -> GuardDecision {
        let mut events = self.session.subscribe();
        if let Err(e) = events.wait_for(|s| s.settled).await {
            tracing::warn!(error = %e, "Session events closed before restore settled");
        }
        match self.evaluate(requested) {
            GuardDecision::Pending => GuardDecision::Redirect {
                to: self.login_redirect(requested),
            },
            decision => decision,
        }
    }

    /// Login view location remembering `from`.
    #[must_use]
    pub fn login_redirect(&self, from: &str) -> String {
        if from.is_empty() {
            return self.login_path.clone();
        }
        let encoded = urlencoding::encode(from);
        format!("{}?from={encoded}", self.login_path)
    }
}

/// Where to go after a successful login.
///
/// `from` is the value carried by the login redirect. Only same-site
/// relative paths are honoured; anything else lands on `/`.
#[must_use]
pub fn post_login_destination(from: Option<&str>) -> String {
    match from {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_owned()
        }
        _ => "/".to_owned(),
    }
}

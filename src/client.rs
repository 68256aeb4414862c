use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::{AuthBackend, HttpBackend};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::guard::RouteGuard;
use crate::session::SessionManager;
use crate::store::TokenStore;
use crate::transport::{PendingRequest, Transport, decode};

/// HTTP client for every call the admin front end makes.
///
/// Attaches the session's access token as a bearer credential. A 401 gets
/// exactly one recovery attempt: the session is refreshed (sharing any
/// refresh already in flight) and the original request is replayed once
/// with the new token. Whatever the replay returns is final.
///
/// ```rust,ignore
/// let api = ApiClient::connect(ClientConfig::default(), FileStore::new(dir));
/// api.session().login(Credentials::new("admin", "12345")).await?;
/// let clientes: Vec<Cliente> = api.get("/clientes").await?;
/// ```
pub struct ApiClient<B = HttpBackend> {
    transport: Transport,
    session: SessionManager<B>,
}

// Manual Clone: avoid derive adding a `B: Clone` bound.
impl<B> Clone for ApiClient<B> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            session: self.session.clone(),
        }
    }
}

impl ApiClient<HttpBackend> {
    /// Build the transport, the HTTP auth backend and a restored session
    /// from one configuration.
    pub fn connect(config: ClientConfig, store: impl TokenStore + 'static) -> Self {
        let transport = Transport::new(config);
        let session = SessionManager::restored(HttpBackend::new(transport.clone()), store);
        Self::new(transport, session)
    }
}

impl<B: AuthBackend> ApiClient<B> {
    #[must_use]
    pub fn new(transport: Transport, session: SessionManager<B>) -> Self {
        Self { transport, session }
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager<B> {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    /// Route guard over this client's session, redirecting to the
    /// configured login view.
    #[must_use]
    pub fn guard(&self) -> RouteGuard<B> {
        RouteGuard::new(self.session.clone(), self.config().login_path())
    }

    /// Send `request` and decode the JSON response body.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] if the 401 could not be recovered (no
    ///   session, refresh failed, or the replay was rejected too). A failed
    ///   refresh also ends the session.
    /// - [`Error::Validation`], [`Error::Server`], [`Error::Network`] as
    ///   returned by the backend, with no retry.
    /// - [`Error::Decode`] if a 2xx body does not match `T`.
    pub async fn request<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T, Error> {
        let sent_with = self.session.access_token();

        let payload = match self.transport.send(&request, sent_with.as_ref()).await {
            Ok(body) => return decode(&body),
            Err(Error::Unauthorized(payload)) => payload,
            Err(e) => return Err(e),
        };

        let token = match self.session.refresh_after(sent_with.as_ref()).await {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(error = %e, path = %request.path(), "Could not recover from 401");
                return Err(Error::Unauthorized(payload));
            }
        };

        tracing::debug!(method = %request.method(), path = %request.path(), "Replaying request after refresh");
        let body = self.transport.send(&request, Some(&token)).await?;
        decode(&body)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(PendingRequest::get(path)).await
    }

    pub async fn post<T, Body>(&self, path: &str, body: &Body) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Body: Serialize + ?Sized,
    {
        self.request(PendingRequest::post(path).with_json(body)?)
            .await
    }

    pub async fn put<T, Body>(&self, path: &str, body: &Body) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Body: Serialize + ?Sized,
    {
        self.request(PendingRequest::put(path).with_json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request(PendingRequest::delete(path)).await
    }
}

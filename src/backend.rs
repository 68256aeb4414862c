use std::future::Future;

use crate::error::Error;
use crate::types::{AccessToken, Credentials, LoginResponse, RefreshToken, TokenPair};

/// The three authentication endpoints the session talks to.
///
/// [`HttpBackend`] is the production implementation. Tests and alternative
/// hosts can provide their own.
///
/// # Example
///
/// ```rust,ignore
/// impl AuthBackend for MyBackend {
///     async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, Error> {
///         self.rpc.call("auth.login", credentials).await
///     }
///     // ...
/// }
/// ```
pub trait AuthBackend: Send + Sync + 'static {
    /// `POST /auth/login` with `{login, senha}`.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, Error>> + Send;

    /// `POST /auth/refresh` with `{refreshToken}`. The refresh token is
    /// single-use; the response carries its replacement.
    fn refresh(
        &self,
        refresh_token: &RefreshToken,
    ) -> impl Future<Output = Result<TokenPair, Error>> + Send;

    /// `POST /auth/logout` with `{refreshToken}`, invalidating it server-side.
    fn logout(
        &self,
        refresh_token: &RefreshToken,
        access_token: Option<&AccessToken>,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

#[cfg(feature = "http")]
pub use http::HttpBackend;

#[cfg(feature = "http")]
mod http {
    use serde::Serialize;

    use super::AuthBackend;
    use crate::error::Error;
    use crate::transport::{PendingRequest, Transport, decode};
    use crate::types::{AccessToken, Credentials, LoginResponse, RefreshToken, TokenPair};

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RefreshTokenBody<'a> {
        refresh_token: &'a RefreshToken,
    }

    /// [`AuthBackend`] over the GuinchoLink REST API.
    ///
    /// Requests go straight through the [`Transport`], never through the
    /// retrying [`ApiClient`](crate::ApiClient), so a failing refresh cannot
    /// trigger another refresh.
    #[derive(Debug, Clone)]
    pub struct HttpBackend {
        transport: Transport,
    }

    impl HttpBackend {
        #[must_use]
        pub fn new(transport: Transport) -> Self {
            Self { transport }
        }
    }

    impl AuthBackend for HttpBackend {
        async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, Error> {
            let request = PendingRequest::post("/auth/login").with_json(credentials)?;
            let body = self.transport.send(&request, None).await?;
            decode(&body)
        }

        async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, Error> {
            let request =
                PendingRequest::post("/auth/refresh").with_json(&RefreshTokenBody { refresh_token })?;
            let body = self.transport.send(&request, None).await?;
            decode(&body)
        }

        async fn logout(
            &self,
            refresh_token: &RefreshToken,
            access_token: Option<&AccessToken>,
        ) -> Result<(), Error> {
            let request =
                PendingRequest::post("/auth/logout").with_json(&RefreshTokenBody { refresh_token })?;
            self.transport.send(&request, access_token).await?;
            Ok(())
        }
    }

}

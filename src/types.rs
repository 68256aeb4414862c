use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Short-lived bearer credential. Opaque to this crate.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(String);

/// Rotating credential exchanged at `/auth/refresh`. Opaque to this crate.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct RefreshToken(String);

macro_rules! opaque_token {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        // Never print token material.
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "(<{} bytes>)"), self.0.len())
            }
        }
    };
}

opaque_token!(AccessToken);
opaque_token!(RefreshToken);

/// Administrator identifier assigned by the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct AdminId(pub i64);

/// Logged-in administrator, as returned in the login response's
/// `administrador` field and cached in the `userData` slot.
///
/// Fields the backend omits stay absent when serialized back, so the cached
/// copy mirrors what the backend sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserProfile {
    pub id: AdminId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nascimento: Option<String>,
}

impl UserProfile {
    /// Create a profile with only the required `id`.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id: AdminId(id),
            nome: None,
            login: None,
            cpf: None,
            nascimento: None,
        }
    }

    #[must_use]
    pub fn with_nome(mut self, nome: impl Into<String>) -> Self {
        self.nome = Some(nome.into());
        self
    }

    #[must_use]
    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Name to show in the header: `nome`, else `login`, else the id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.nome
            .as_deref()
            .or(self.login.as_deref())
            .map_or_else(|| format!("#{}", self.id), str::to_owned)
    }
}

/// Login form input, posted as `{login, senha}`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub login: String,
    pub senha: String,
}

impl Credentials {
    #[must_use]
    pub fn new(login: impl Into<String>, senha: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            senha: senha.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("senha", &"<redacted>")
            .finish()
    }
}

/// Body of a successful `/auth/login`.
///
/// Accepts either the bare object or one wrapped in `{"data": {...}}`.
/// Every field is optional here; completeness is checked by the session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "LoginEnvelope")]
#[non_exhaustive]
pub struct LoginResponse {
    pub administrador: Option<UserProfile>,
    pub access_token: Option<AccessToken>,
    pub refresh_token: Option<RefreshToken>,
}

impl LoginResponse {
    #[must_use]
    pub fn new(
        administrador: Option<UserProfile>,
        access_token: Option<AccessToken>,
        refresh_token: Option<RefreshToken>,
    ) -> Self {
        Self {
            administrador,
            access_token,
            refresh_token,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogin {
    /// Decoded separately: an unreadable profile counts as missing.
    #[serde(default)]
    administrador: Option<JsonValue>,
    #[serde(default)]
    access_token: Option<AccessToken>,
    #[serde(default)]
    refresh_token: Option<RefreshToken>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoginEnvelope {
    Wrapped { data: RawLogin },
    Bare(RawLogin),
}

impl From<LoginEnvelope> for LoginResponse {
    fn from(envelope: LoginEnvelope) -> Self {
        let (LoginEnvelope::Wrapped { data: raw } | LoginEnvelope::Bare(raw)) = envelope;
        let administrador = raw
            .administrador
            .filter(|value| !value.is_null())
            .and_then(|value| match serde_json::from_value(value) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(error = %e, "Login response carries an unreadable profile");
                    None
                }
            });
        Self {
            administrador,
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
        }
    }
}

/// Body of a successful `/auth/refresh`. The refresh token is rotated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct TokenPair {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: AccessToken, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }
}

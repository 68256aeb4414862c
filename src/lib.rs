#![doc = include_str!("../README.md")]

pub mod backend;
#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
#[cfg(feature = "http")]
pub mod resources;
pub mod session;
pub mod store;
#[cfg(feature = "http")]
pub mod transport;
pub mod types;

// Re-exports for convenient access
pub use backend::AuthBackend;
#[cfg(feature = "http")]
pub use backend::HttpBackend;
#[cfg(feature = "http")]
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{Error, ErrorPayload, FieldError};
pub use guard::{GuardDecision, RouteGuard, post_login_destination};
#[cfg(feature = "http")]
pub use reqwest::Method;
#[cfg(feature = "http")]
pub use resources::{Resource, ResourceClient};
pub use session::{
    AuthState, INCOMPLETE_LOGIN_MESSAGE, LOGIN_FAILED_MESSAGE, Session, SessionEnd,
    SessionManager, SessionSnapshot,
};
pub use store::{DisabledStore, FileStore, MemoryStore, Slot, TokenStore};
#[cfg(feature = "http")]
pub use transport::{PendingRequest, Transport};
pub use types::{
    AccessToken, AdminId, Credentials, LoginResponse, RefreshToken, TokenPair, UserProfile,
};

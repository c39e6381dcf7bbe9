//! crates/tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) the tracker core depends on.
//! These traits form the boundary of the hexagonal architecture: the academic
//! backend, the token format and the HTTP transport all live behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AuthContext, Entity, EntityId, Notification, User, UserRole, UserSettings};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, codec).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rejected by the backend: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// CRUD access to one entity collection, always on behalf of a signed-in user.
#[async_trait]
pub trait EntityService<T: Entity>: Send + Sync {
    /// Creates the entity and returns it with its server-assigned id.
    async fn create(&self, ctx: &AuthContext, entity: &T) -> PortResult<T>;

    async fn get_by_id(&self, ctx: &AuthContext, id: &str) -> PortResult<T>;

    async fn update(&self, ctx: &AuthContext, id: &str, entity: &T) -> PortResult<T>;

    async fn delete(&self, ctx: &AuthContext, id: &str) -> PortResult<()>;

    async fn list_all(&self, ctx: &AuthContext) -> PortResult<Vec<T>>;

    /// Lists the records owned by `user_id`.
    async fn list_by_user(&self, ctx: &AuthContext, user_id: &str) -> PortResult<Vec<T>>;
}

#[async_trait]
pub trait NotificationInbox: Send + Sync {
    async fn mark_as_read(&self, ctx: &AuthContext, notification_id: &str)
        -> PortResult<Notification>;
}

#[async_trait]
pub trait SettingsService: Send + Sync {
    async fn get_settings(&self, ctx: &AuthContext, user_id: &str) -> PortResult<UserSettings>;

    /// Creates the settings record or replaces the existing one.
    async fn save_settings(&self, ctx: &AuthContext, settings: &UserSettings)
        -> PortResult<UserSettings>;

    async fn delete_settings(&self, ctx: &AuthContext, user_id: &str) -> PortResult<()>;
}

/// Credentials submitted at sign-in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// A new account submitted at sign-up.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchanges credentials for a raw bearer token.
    async fn sign_in(&self, credentials: &Credentials) -> PortResult<String>;

    async fn sign_up(&self, request: &SignUp) -> PortResult<User>;

    async fn sign_out(&self, ctx: &AuthContext) -> PortResult<()>;
}

/// Claims read from a bearer token without contacting the server.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    pub user_id: EntityId,
    pub display_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> PortResult<TokenClaims>;
}

//! services/dashboard/src/adapters/backend.rs
//!
//! This module contains the academic backend adapter, the concrete
//! implementation of the core's entity, inbox, settings and auth ports over
//! HTTP. Every call carries the caller's bearer token explicitly.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use tracker_core::domain::{AuthContext, Entity, Notification, User, UserSettings};
use tracker_core::ports::{
    AuthService, Credentials, EntityService, NotificationInbox, PortError, PortResult,
    SettingsService, SignUp,
};

use crate::adapters::records::{
    role_to_wire, NotificationRecord, SettingsRecord, SignInRecord, SignUpRecord, TokenRecord,
    UserRecord,
};

//=========================================================================================
// Resource Schemas
//=========================================================================================

/// Where an entity collection lives on the backend.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePaths {
    /// `POST` target for new records (singular noun).
    pub create: &'static str,
    /// Collection root (plural noun); items live at `{collection}/{id}`.
    pub collection: &'static str,
    /// Whether `{collection}/user/{id}` exists.
    pub by_user: bool,
}

/// An entity the backend stores, with its wire record and endpoints.
pub trait Resource: Entity {
    type Record: Serialize + DeserializeOwned + Send + Sync;
    const PATHS: ResourcePaths;

    fn from_record(record: Self::Record) -> Self;
    fn to_record(&self) -> Self::Record;
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements the core ports against the academic backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Appends `segments` to `path`, percent-encoding each one so that ids
    /// cannot add segments or a query of their own.
    fn endpoint(&self, path: &str, segments: &[&str]) -> PortResult<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| PortError::Unexpected(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Backend URL cannot carry a path".to_string()))?
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder, ctx: &AuthContext) -> RequestBuilder {
        request.bearer_auth(ctx.token.expose())
    }

    /// Sends the request and decodes a JSON body.
    async fn fetch<R: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<R> {
        let response = self.checked(request).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed backend response: {}", e)))
    }

    /// Sends the request and discards the body.
    async fn execute(&self, request: RequestBuilder) -> PortResult<()> {
        self.checked(request).await.map(|_| ())
    }

    async fn checked(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = request.send().await.map_err(|e| {
            error!("Backend request failed: {:?}", e);
            PortError::Unexpected(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!("Backend answered {} for {}: {}", status, url, body);
        Err(status_error(status, &url, body))
    }
}

fn status_error(status: StatusCode, path: &str, body: String) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(path.to_string()),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            PortError::Invalid(if body.is_empty() {
                status.to_string()
            } else {
                body
            })
        }
        _ => PortError::Unexpected(format!("Backend answered {} for {}", status, path)),
    }
}

//=========================================================================================
// `EntityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl<T: Resource> EntityService<T> for HttpBackend {
    async fn create(&self, ctx: &AuthContext, entity: &T) -> PortResult<T> {
        let request = self
            .client
            .post(self.url(T::PATHS.create))
            .json(&entity.to_record());
        let record: T::Record = self.fetch(self.authorized(request, ctx)).await?;
        Ok(T::from_record(record))
    }

    async fn get_by_id(&self, ctx: &AuthContext, id: &str) -> PortResult<T> {
        let url = self.endpoint(T::PATHS.collection, &[id])?;
        let record: T::Record = self.fetch(self.authorized(self.client.get(url), ctx)).await?;
        Ok(T::from_record(record))
    }

    async fn update(&self, ctx: &AuthContext, id: &str, entity: &T) -> PortResult<T> {
        let url = self.endpoint(T::PATHS.collection, &[id])?;
        let request = self.client.put(url).json(&entity.to_record());
        let record: T::Record = self.fetch(self.authorized(request, ctx)).await?;
        Ok(T::from_record(record))
    }

    async fn delete(&self, ctx: &AuthContext, id: &str) -> PortResult<()> {
        let url = self.endpoint(T::PATHS.collection, &[id])?;
        self.execute(self.authorized(self.client.delete(url), ctx))
            .await
    }

    async fn list_all(&self, ctx: &AuthContext) -> PortResult<Vec<T>> {
        let url = self.url(T::PATHS.collection);
        let records: Vec<T::Record> = self.fetch(self.authorized(self.client.get(url), ctx)).await?;
        Ok(records.into_iter().map(T::from_record).collect())
    }

    async fn list_by_user(&self, ctx: &AuthContext, user_id: &str) -> PortResult<Vec<T>> {
        if !T::PATHS.by_user {
            let all = <Self as EntityService<T>>::list_all(self, ctx).await?;
            return Ok(all
                .into_iter()
                .filter(|e| e.owner_id() == Some(user_id))
                .collect());
        }
        let url = self.endpoint(T::PATHS.collection, &["user", user_id])?;
        let records: Vec<T::Record> = self.fetch(self.authorized(self.client.get(url), ctx)).await?;
        Ok(records.into_iter().map(T::from_record).collect())
    }
}

//=========================================================================================
// Inbox, Settings and Auth Implementations
//=========================================================================================

#[async_trait]
impl NotificationInbox for HttpBackend {
    async fn mark_as_read(
        &self,
        ctx: &AuthContext,
        notification_id: &str,
    ) -> PortResult<Notification> {
        let url = self.endpoint(Notification::PATHS.collection, &[notification_id, "read"])?;
        let record: NotificationRecord =
            self.fetch(self.authorized(self.client.put(url), ctx)).await?;
        Ok(record.to_domain())
    }
}

const SETTINGS_PATH: &str = "/api/user-settings";

#[async_trait]
impl SettingsService for HttpBackend {
    async fn get_settings(&self, ctx: &AuthContext, user_id: &str) -> PortResult<UserSettings> {
        let url = self.endpoint(SETTINGS_PATH, &[user_id])?;
        let record: SettingsRecord = self.fetch(self.authorized(self.client.get(url), ctx)).await?;
        Ok(record.to_domain())
    }

    async fn save_settings(
        &self,
        ctx: &AuthContext,
        settings: &UserSettings,
    ) -> PortResult<UserSettings> {
        let request = self
            .client
            .post(self.url(SETTINGS_PATH))
            .json(&SettingsRecord::from_domain(settings));
        let record: SettingsRecord = self.fetch(self.authorized(request, ctx)).await?;
        Ok(record.to_domain())
    }

    async fn delete_settings(&self, ctx: &AuthContext, user_id: &str) -> PortResult<()> {
        let url = self.endpoint(SETTINGS_PATH, &[user_id])?;
        self.execute(self.authorized(self.client.delete(url), ctx))
            .await
    }
}

#[async_trait]
impl AuthService for HttpBackend {
    async fn sign_in(&self, credentials: &Credentials) -> PortResult<String> {
        let request = self
            .client
            .post(self.url("/api/auth/signin"))
            .json(&SignInRecord {
                email: &credentials.email,
                password: &credentials.password,
            });
        let record: TokenRecord = self.fetch(request).await?;
        record
            .token
            .filter(|t| !t.is_empty())
            .ok_or(PortError::Unauthorized)
    }

    async fn sign_up(&self, request: &SignUp) -> PortResult<User> {
        let body = SignUpRecord {
            first_name: &request.first_name,
            last_name: &request.last_name,
            email: &request.email,
            password: &request.password,
            role: role_to_wire(request.role),
        };
        let request = self.client.post(self.url("/api/auth/signup")).json(&body);
        let record: UserRecord = self.fetch(request).await?;
        Ok(record.to_domain())
    }

    async fn sign_out(&self, ctx: &AuthContext) -> PortResult<()> {
        let request = self.client.get(self.url("/api/auth/signout"));
        self.execute(self.authorized(request, ctx)).await
    }
}

//! Authenticated HTTP client for the Bazaar admin API.
//!
//! Every request goes through [`ApiClient::send`], which attaches the bearer
//! token held by the [`SessionStore`] and reacts to a 401 with exactly one
//! refresh attempt. Domain methods (upload, resource CRUD) live in [`api`].

pub mod api;
pub mod cache;
pub mod error;
pub mod request;
pub mod session;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bazaar_core::{
    ClientConfig, LoginRequest, RefreshRequest, ReplayPolicy, SessionCredential, TokenPair,
};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use validator::Validate;

pub use cache::{QueryCache, Tag};
pub use error::ClientError;
pub use request::{ApiResponse, MultipartFile, RequestBody, RequestSpec};
pub use session::SessionStore;

/// HTTP client for the admin API.
///
/// Cheap to clone; clones share the session store and the query cache.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    session: SessionStore,
    cache: Arc<QueryCache>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| ClientError::Config("cache capacity must be non-zero".to_string()))?;

        Ok(Self {
            client,
            config,
            session,
            cache: Arc::new(QueryCache::new(capacity)),
        })
    }

    /// Create client from environment: config from `BAZAAR_*` variables, session
    /// from `BAZAAR_ACCESS_TOKEN` / `BAZAAR_REFRESH_TOKEN`.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = ClientConfig::from_env().context("Failed to load client configuration")?;
        let client = Self::new(config, SessionStore::from_env())
            .context("Failed to create HTTP client")?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    /// Path under the configured API prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_prefix, path)
    }

    /// Send a request with the current credential.
    ///
    /// A 401 triggers one refresh with the stored refresh token. On success the
    /// new credential is committed and the request is replayed once; with
    /// [`ReplayPolicy::ReturnOriginal`] the replay's outcome is discarded and
    /// the original 401 is returned. On refresh failure the session is cleared
    /// and the original 401 is returned. Concurrent 401s each refresh on their
    /// own; there is no shared in-flight refresh.
    ///
    /// Transport failures and non-401 statuses are returned unchanged.
    pub async fn send(&self, spec: &RequestSpec) -> Result<ApiResponse, ClientError> {
        let response = self.execute(spec).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        tracing::warn!(
            method = %spec.method,
            path = %spec.path,
            "Request unauthorized, attempting token refresh"
        );

        match self.refresh().await {
            Ok(_) => {
                let replay = self.execute(spec).await;
                match self.config.replay_policy {
                    ReplayPolicy::ReturnReplay => replay,
                    ReplayPolicy::ReturnOriginal => {
                        match &replay {
                            Ok(r) => tracing::debug!(
                                status = %r.status,
                                path = %spec.path,
                                "Replay after refresh completed, result discarded"
                            ),
                            Err(e) => tracing::debug!(
                                error = %e,
                                path = %spec.path,
                                "Replay after refresh failed, result discarded"
                            ),
                        }
                        Ok(response)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, logging out");
                self.logout();
                Ok(response)
            }
        }
    }

    /// One HTTP round trip, no refresh handling.
    async fn execute(&self, spec: &RequestSpec) -> Result<ApiResponse, ClientError> {
        let url = self.build_url(&spec.path);
        tracing::debug!(method = %spec.method, path = %spec.path, "Sending request");

        let mut request = self.client.request(spec.method.clone(), &url);
        if let Some(token) = self.session.access_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        request = match &spec.body {
            Some(RequestBody::Json(body)) => request.json(body),
            Some(RequestBody::Multipart(file)) => request.multipart(file.to_form()?),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(ApiResponse { status, body })
    }

    /// Exchange the stored refresh token for a new credential and commit it.
    pub async fn refresh(&self) -> Result<SessionCredential, ClientError> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or_else(|| ClientError::Unauthorized {
                message: "No refresh token available".to_string(),
            })?;

        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let spec = RequestSpec::post(self.endpoint(&self.config.refresh_path)).json(body);

        let pair: TokenPair = self.execute(&spec).await?.into_data()?;
        let credential = SessionCredential::from(pair);
        self.session.set(credential.clone());

        tracing::info!("Session token refreshed");
        Ok(credential)
    }

    /// Log in with staff credentials and commit the returned session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionCredential, ClientError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        request.validate()?;

        let spec = RequestSpec::post(self.endpoint(&self.config.login_path))
            .json(serde_json::to_value(&request)?);

        let pair: TokenPair = self.execute(&spec).await?.into_data()?;
        let credential = SessionCredential::from(pair);
        self.session.set(credential.clone());
        self.cache.clear();

        tracing::info!(email = %request.email, "Logged in");
        Ok(credential)
    }

    /// Drop the local session and every cached query.
    pub fn logout(&self) {
        if self.session.clear().is_some() {
            tracing::info!("Logged out");
        }
        self.cache.clear();
    }

    /// GET request with optional query parameters. Unwraps the response envelope.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ClientError> {
        self.send(&RequestSpec::get(path).query(query))
            .await?
            .into_data()
    }

    /// POST JSON body and unwrap the response envelope.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.send(&RequestSpec::post(path).json(body))
            .await?
            .into_data()
    }

    /// PUT JSON body and unwrap the response envelope.
    pub async fn put_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.send(&RequestSpec::put(path).json(body))
            .await?
            .into_data()
    }

    /// POST a single file as multipart and unwrap the response envelope.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        file: MultipartFile,
    ) -> Result<T, ClientError> {
        self.send(&RequestSpec::post(path).multipart(file))
            .await?
            .into_data()
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(&RequestSpec::delete(path))
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// Re-export domain types for convenience.
pub use bazaar_core::{ApiEnvelope, ListQuery, Page, Resource};

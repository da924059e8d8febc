//! Identity service HTTP client.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use palaver_types::provider::IdentityFuture;
use palaver_types::{
    ApiError, AuthResponse, AuthUser, IdentityProvider, LoginRequest, RegisterRequest,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

const LOGIN_PATH: &str = "/api/auth/local";
const REGISTER_PATH: &str = "/api/auth/local/register";
const ME_PATH: &str = "/api/users/me";

/// Client for the identity service's local-auth endpoints.
///
/// Clones share the attached bearer token.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl IdentityClient {
    /// Create a new client. `timeout` bounds every request end to end.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer token is currently attached.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Exchange an identifier (username or email) and password for a token.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.post_json(LOGIN_PATH, request).await
    }

    /// Create an account and receive a token for it.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.post_json(REGISTER_PATH, request).await
    }

    /// Fetch the profile the attached token belongs to.
    pub async fn me(&self) -> Result<AuthUser, ApiError> {
        let url = format!("{}{ME_PATH}", self.base_url);
        tracing::debug!("GET {url}");
        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(classify_transport_error)?;
        read_json(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!("POST {url}");
        let response = self
            .http
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        read_json(response).await
    }

    fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = token.as_deref() {
            let value =
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ApiError::Auth {
                    message: "Invalid token format".into(),
                })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

impl IdentityProvider for IdentityClient {
    fn login<'a>(&'a self, request: &'a LoginRequest) -> IdentityFuture<'a, AuthResponse> {
        Box::pin(IdentityClient::login(self, request))
    }

    fn register<'a>(&'a self, request: &'a RegisterRequest) -> IdentityFuture<'a, AuthResponse> {
        Box::pin(IdentityClient::register(self, request))
    }

    fn fetch_me(&self) -> IdentityFuture<'_, AuthUser> {
        Box::pin(self.me())
    }

    fn set_bearer_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Decode a successful body or turn the error status into a typed ApiError.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()));
    }

    let body_text = response.text().await.unwrap_or_default();
    Err(classify_error(status.as_u16(), &body_text))
}

fn classify_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: u16, body: &str) -> ApiError {
    // {"data": null, "error": {"status": 400, "name": "ValidationError", "message": "..."}}
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.to_string()
            }
        });

    match status {
        400 => ApiError::BadRequest { message },
        401 => ApiError::Auth { message },
        403 => ApiError::Forbidden { message },
        _ => ApiError::Server { status, message },
    }
}

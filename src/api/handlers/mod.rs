//! Route handlers and the plumbing they share.
//!
//! Handlers never build error bodies themselves; they return [`ApiError`],
//! which owns the mapping from domain failures to status codes.

pub mod health;
pub mod jwt;
pub mod password_recoveries;
pub mod root;
pub mod users;

use axum::{
    extract::rejection::JsonRejection,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use utoipa::{OpenApi, ToSchema};

use crate::auth::{AuthError, BAD_AUTHORIZATION};
use crate::identity::ProviderError;
use crate::token::TokenError;

pub const MALFORMED_JSON: &str = "Malformed JSON";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    Conflict(&'static str),
    Unprocessable(&'static str),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            Self::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, HeaderValue::from_static("Basic, Bearer"))],
                reason,
            )
                .into_response(),
            Self::Forbidden(reason) => (StatusCode::FORBIDDEN, reason).into_response(),
            Self::Conflict(reason) => (StatusCode::CONFLICT, reason).into_response(),
            Self::Unprocessable(reason) => {
                (StatusCode::UNPROCESSABLE_ENTITY, reason).into_response()
            }
            Self::Internal(err) => {
                error!("Failed to handle request: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized(reason) => Self::Unauthorized(reason),
            AuthError::Forbidden(reason) => Self::Forbidden(reason),
            AuthError::Provider(err) => err.into(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UserAlreadyExist => Self::Conflict("User already exists"),
            ProviderError::UsernameTooShort { .. } => Self::BadRequest("Username too short"),
            ProviderError::MissingCredentials => {
                Self::BadRequest("Missing username or password.")
            }
            err => Self::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Unwrap a JSON body, reporting any rejection as a plain 400.
pub(crate) fn json_body<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(rejection) => {
            debug!("rejected request body: {}", rejection.body_text());
            Err(ApiError::BadRequest(MALFORMED_JSON))
        }
    }
}

/// Raw `Authorization` header value.
///
/// A header that is present but not visible ASCII is a bad credential, not a
/// missing one.
pub(crate) fn authorization(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(AUTHORIZATION)
        .map(|value| {
            value.to_str().map_err(|_| {
                debug!("authorization header is not visible ASCII");
                ApiError::Unauthorized(BAD_AUTHORIZATION)
            })
        })
        .transpose()
}

/// Hypermedia link describing an action a client may take next.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub action: String,
    pub title: String,
    pub fields: Vec<Field>,
}

impl Link {
    pub(crate) fn new(
        url: impl Into<String>,
        action: &str,
        title: &str,
        fields: Vec<Field>,
    ) -> Self {
        Self {
            url: url.into(),
            action: action.to_string(),
            title: title.to_string(),
            fields,
        }
    }
}

#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub required: bool,
}

impl Field {
    pub(crate) fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
        }
    }

    pub(crate) fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
        }
    }
}

// axum handler for the generated OpenAPI document
pub async fn openapi_json() -> impl IntoResponse {
    Json(super::ApiDoc::openapi())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, Response},
        Router,
    };
    use base64ct::{Base64, Encoding};
    use tower::ServiceExt;

    use crate::api::{app, AppState, TokenPolicy};
    use crate::identity::{MemoryBackend, PasswordHasher, UsernamePolicy};
    use crate::token::{TokenIssuer, TokenVerifier};

    pub const PRIVATE_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/ec256-private.pem"
    ));
    pub const PUBLIC_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/ec256-public.pem"
    ));
    pub const ISSUER: &str = "tessera.test";

    pub struct TestApp {
        pub backend: Arc<MemoryBackend>,
        pub state: Arc<AppState>,
        pub router: Router,
    }

    impl TestApp {
        pub fn new() -> Result<Self> {
            let hasher = PasswordHasher::with_params(1024, 1, 1)?;
            let backend = Arc::new(MemoryBackend::new(hasher, UsernamePolicy::default()));
            let state = Arc::new(AppState {
                backend: backend.clone(),
                issuer: TokenIssuer::from_pem(PRIVATE_PEM.as_bytes())?,
                verifier: TokenVerifier::from_pem(PUBLIC_PEM.as_bytes())?.with_issuer(ISSUER),
                policy: TokenPolicy {
                    issuer: ISSUER.to_string(),
                    session_ttl: Duration::from_secs(3600),
                    password_reset_ttl: Duration::from_secs(3600),
                },
            });
            let router = app(state.clone(), None);
            Ok(Self {
                backend,
                state,
                router,
            })
        }

        pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
            Ok(self.router.clone().oneshot(request).await?)
        }
    }

    pub fn basic(username: &str, password: &str) -> String {
        format!(
            "Basic {}",
            Base64::encode_string(format!("{username}:{password}").as_bytes())
        )
    }

    pub fn json_request(method: &str, uri: &str, body: &str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?)
    }

    pub async fn body_json(response: Response<Body>) -> Result<serde_json::Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn body_text(response: Response<Body>) -> Result<String> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

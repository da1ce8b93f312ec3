use super::{json_body, ApiError, Field, Link};
use crate::api::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

const MISSING_CREDENTIALS: &str = "Missing username or password.";
const INVALID_CREDENTIALS: &str = "Invalid username or password.";

#[derive(ToSchema, Deserialize, Debug)]
pub struct TokenRequest {
    /// `login` is accepted for older clients.
    #[serde(default, alias = "login")]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Tokens {
    tokens: Vec<String>,
    add_token: Link,
}

fn add_token() -> Link {
    Link::new(
        "/jwt/",
        "post",
        "Create a new JWT",
        vec![Field::required("username"), Field::required("password")],
    )
}

#[utoipa::path(
    get,
    path = "/jwt/",
    responses(
        (status = 200, description = "Describes how to create a token", body = Tokens),
    ),
    tag = "jwt"
)]
// axum handler for GET /jwt/
pub async fn get_jwts() -> impl IntoResponse {
    Json(Tokens {
        tokens: Vec::new(),
        add_token: add_token(),
    })
}

#[utoipa::path(
    post,
    path = "/jwt/",
    request_body = TokenRequest,
    responses(
        (status = 201, description = "Session token created", body = Tokens),
        (status = 400, description = "Malformed JSON"),
        (status = 403, description = "Invalid username or password."),
        (status = 422, description = "Missing username or password."),
    ),
    tag = "jwt"
)]
#[instrument(skip(state, payload))]
pub async fn post_jwt(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;

    let (Some(username), Some(password)) = (
        request.username.filter(|u| !u.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Unprocessable(MISSING_CREDENTIALS));
    };

    let Some(user) = state.backend.identify(&username, &password).await? else {
        debug!("token request with bad credentials");
        return Err(ApiError::Forbidden(INVALID_CREDENTIALS));
    };

    let issued = state.issuer.issue_session_token(
        &state.policy.issuer,
        &user.user_id,
        state.policy.session_ttl,
    )?;

    info!(username = %user.username, jti = %issued.claims.jti, "session token issued");

    let location = HeaderValue::from_str(&format!("/jwt/{}", issued.claims.jti))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, location)],
        Json(Tokens {
            tokens: vec![issued.token],
            add_token: add_token(),
        }),
    ))
}

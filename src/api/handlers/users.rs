use super::{authorization, json_body, ApiError, Field, Link};
use crate::api::AppState;
use crate::auth::{authenticate, Intent};
use crate::identity::valid_email;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

const MISSING_FIELDS: &str = "Missing username, email or password.";
const INVALID_EMAIL: &str = "Invalid email";
const ONLY_PASSWORD: &str = "Only password can be patched.";
const MISSING_PASSWORD: &str = "Missing password.";
const WRONG_USER: &str = "Token does not apply to this user.";

#[derive(ToSchema, Deserialize, Debug)]
pub struct UserRegister {
    #[serde(default, alias = "login")]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// One JSON-patch operation; only a password replacement is honoured.
#[derive(ToSchema, Deserialize, Debug)]
pub struct PatchOperation {
    op: String,
    path: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Users {
    add_user: Link,
}

#[utoipa::path(
    get,
    path = "/users/",
    responses(
        (status = 200, description = "Describes how to register", body = Users),
    ),
    tag = "users"
)]
// axum handler for GET /users/
pub async fn get_users() -> impl IntoResponse {
    Json(Users {
        add_user: Link::new(
            "/users/",
            "post",
            "Create a user",
            vec![
                Field::required("username"),
                Field::required("email"),
                Field::required("password"),
            ],
        ),
    })
}

#[utoipa::path(
    post,
    path = "/users/",
    request_body = UserRegister,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Missing field, invalid email or username too short"),
        (status = 409, description = "User already exists"),
    ),
    tag = "users"
)]
#[instrument(skip(state, payload))]
pub async fn post_users(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<UserRegister>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = json_body(payload)?;

    let (Some(username), Some(email), Some(password)) = (
        user.username.filter(|u| !u.is_empty()),
        user.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        user.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(MISSING_FIELDS));
    };

    if !valid_email(&email) {
        return Err(ApiError::BadRequest(INVALID_EMAIL));
    }

    state
        .backend
        .register_user(&username, &password, &email, false)
        .await?;

    info!(username = %username, "user registered");

    let location = HeaderValue::from_str(&format!("/users/{username}/"))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((StatusCode::CREATED, [(LOCATION, location)], "User created"))
}

#[utoipa::path(
    patch,
    path = "/users/{username}/",
    params(("username" = String, Path, description = "User whose password changes")),
    request_body = [PatchOperation],
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Only password can be patched."),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 403, description = "Credential cannot change this user's password"),
    ),
    security(("basic" = []), ("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(state, headers, payload))]
pub async fn patch_user(
    Path(username): Path<String>,
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Vec<PatchOperation>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let authenticated = authenticate(
        authorization(&headers)?,
        state.backend.as_ref(),
        &state.verifier,
        Intent::PasswordModification,
    )
    .await?;

    let password = new_password(json_body(payload)?)?;

    if authenticated.user.username != username {
        debug!(
            authenticated = %authenticated.user.username,
            "password change for another user refused"
        );
        return Err(ApiError::Forbidden(WRONG_USER));
    }

    state
        .backend
        .set_password_for_user(&authenticated.user, &password)
        .await?;

    info!(username = %username, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

/// Pull the new password out of a patch list holding exactly one
/// `replace /password` operation.
fn new_password(operations: Vec<PatchOperation>) -> Result<String, ApiError> {
    let [operation] = <[PatchOperation; 1]>::try_from(operations)
        .map_err(|_| ApiError::BadRequest(ONLY_PASSWORD))?;

    if operation.op != "replace" || operation.path != "/password" {
        return Err(ApiError::BadRequest(ONLY_PASSWORD));
    }

    operation
        .value
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::BadRequest(MISSING_PASSWORD))
}

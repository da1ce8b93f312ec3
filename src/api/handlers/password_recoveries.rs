//! Password recovery: request a reset challenge, then follow the `recover`
//! link with the token it delivered.
//!
//! The POST handler answers before anything is looked up, so the response
//! never reveals whether an account exists.

use super::{authorization, json_body, ApiError, Field, Link};
use crate::api::AppState;
use crate::auth::{authenticate, Grant, Intent};
use crate::identity::{ProviderError, User};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use utoipa::ToSchema;

const MISSING_IDENTIFIER: &str = "Missing email or username.";

#[derive(ToSchema, Deserialize, Debug)]
pub struct RecoveryRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "login")]
    username: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct PasswordRecoveries {
    add_recovery: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    recover: Option<Link>,
}

#[derive(Debug, Error)]
enum RecoveryError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Token(#[from] crate::token::TokenError),
}

#[derive(Debug, Clone)]
enum Lookup {
    Email(String),
    Username(String),
}

#[utoipa::path(
    get,
    path = "/password_recoveries/",
    responses(
        (status = 200, description = "Describes recovery; adds a `recover` link for a valid password-reset bearer", body = PasswordRecoveries),
    ),
    tag = "password_recoveries"
)]
#[instrument(skip(state, headers))]
pub async fn get_password_recoveries(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let recover = match authorization(&headers) {
        Ok(Some(value)) => match authenticate(
            Some(value),
            state.backend.as_ref(),
            &state.verifier,
            Intent::PasswordModification,
        )
        .await
        {
            Ok(authenticated) if matches!(authenticated.grant, Grant::Bearer(_)) => {
                Some(recover_link(&authenticated.user))
            }
            Ok(_) => None,
            Err(err) => {
                debug!("no recover link: {}", err);
                None
            }
        },
        Ok(None) | Err(_) => None,
    };

    Json(PasswordRecoveries {
        add_recovery: add_recovery(),
        recover,
    })
}

#[utoipa::path(
    post,
    path = "/password_recoveries/",
    request_body = RecoveryRequest,
    responses(
        (status = 201, description = "Recovery requested; a challenge is sent if the account exists"),
        (status = 400, description = "Missing email or username."),
    ),
    tag = "password_recoveries"
)]
#[instrument(skip(state, payload))]
pub async fn post_password_recoveries(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<RecoveryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;

    let lookup = match (
        request.email.filter(|e| !e.is_empty()),
        request.username.filter(|u| !u.is_empty()),
    ) {
        (Some(email), _) => Lookup::Email(email),
        (None, Some(username)) => Lookup::Username(username),
        (None, None) => return Err(ApiError::BadRequest(MISSING_IDENTIFIER)),
    };

    // Detached: the response must not wait for, or reflect, delivery.
    let state = Arc::clone(&state.0);
    let span = info_span!("password_recovery.challenge");
    tokio::spawn(
        async move {
            if let Err(err) = send_challenge(&state, lookup).await {
                warn!("Failed to send password reset challenge: {}", err);
            }
        }
        .instrument(span),
    );

    Ok((StatusCode::CREATED, "Password recovery requested"))
}

async fn send_challenge(state: &AppState, lookup: Lookup) -> Result<(), RecoveryError> {
    let user = match &lookup {
        Lookup::Email(email) => state.backend.get_user_by_email(email).await?,
        Lookup::Username(username) => state.backend.get_user_by_username(username).await?,
    };

    let Some(user) = user else {
        debug!("password recovery for unknown account");
        return Ok(());
    };

    let issued = state.issuer.issue_password_reset_token(
        &state.policy.issuer,
        &user.username,
        state.policy.password_reset_ttl,
    )?;

    state
        .backend
        .send_reset_password_challenge(&user, &issued.token)
        .await?;

    info!(username = %user.username, jti = %issued.claims.jti, "password reset challenge sent");

    Ok(())
}

fn add_recovery() -> Link {
    Link::new(
        "/password_recoveries/",
        "post",
        "Request a password reset challenge",
        vec![Field::optional("email"), Field::optional("username")],
    )
}

fn recover_link(user: &User) -> Link {
    Link::new(
        format!("/users/{}/", user.username),
        "patch",
        "Set a new password",
        vec![Field::required("password")],
    )
}

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

const JSON_HOME: &str = "application/json-home";

fn resource(href: &str, allow: &[&str]) -> Value {
    json!({
        "href": href,
        "hints": {
            "allow": allow,
            "formats": { "application/json": {} },
        },
    })
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "JSON home document listing the resources"),
    ),
    tag = "tessera"
)]
// axum handler for the json-home document
pub async fn root() -> impl IntoResponse {
    let home = json!({
        "api": {
            "title": "Identification Provider",
            "links": {
                "describedBy": "/openapi.json",
            },
        },
        "resources": {
            "jwt": resource("/jwt/", &["GET", "POST"]),
            "users": resource("/users/", &["GET", "POST"]),
            "user": {
                "hrefTemplate": "/users/{username}/",
                "hrefVars": { "username": "/users/" },
                "hints": { "allow": ["PATCH"] },
            },
            "password_recoveries": resource("/password_recoveries/", &["GET", "POST"]),
            "health": resource("/health", &["GET"]),
        },
    });

    (
        [(CONTENT_TYPE, HeaderValue::from_static(JSON_HOME))],
        Json(home),
    )
}

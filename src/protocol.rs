use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Result};

pub const LOGIN_PATH: &str = "login";
pub const LOGOUT_PATH: &str = "logout";
pub const SETUP_PATH: &str = "setup";
pub const ACTION_GROUPS_PATH: &str = "actionGroups";
pub const REGISTER_LISTENER_PATH: &str = "events/register";

pub const ATLANTIC_TOKEN_PATH: &str = "/token";
pub const ATLANTIC_JWT_PATH: &str = "/magellan/accounts/jwt";

/// Prefix the Atlantic identity service expects in front of the account email.
const ATLANTIC_USER_PREFIX: &str = "GA-PRIVATEPERSON/";

pub fn fetch_events_path(listener_id: &str) -> String {
    format!("events/{listener_id}/fetch")
}

pub fn unregister_listener_path(listener_id: &str) -> String {
    format!("events/{listener_id}/unregister")
}

pub fn password_login_form<'a>(
    username: &'a str,
    password: &'a str,
) -> [(&'static str, &'a str); 2] {
    [("userId", username), ("userPassword", password)]
}

pub fn atlantic_token_form(username: &str, password: &str) -> [(&'static str, String); 3] {
    [
        ("grant_type", "password".to_string()),
        ("username", format!("{ATLANTIC_USER_PREFIX}{username}")),
        ("password", password.to_string()),
    ]
}

/// Pulls the access token out of the Atlantic token response.
pub fn parse_atlantic_token(body: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(body)?;
    if let Some(token) = parsed.get("access_token").and_then(Value::as_str) {
        return Ok(token.to_string());
    }
    match parsed.get("error").and_then(Value::as_str) {
        Some("invalid_grant") => Err(Error::BadCredentials),
        Some(other) => Err(Error::Protocol(format!("token request failed: {other}"))),
        None => Err(Error::Protocol("token response without access_token".to_string())),
    }
}

/// The JWT endpoint answers with a bare JSON string.
pub fn parse_jwt(body: &str) -> Result<String> {
    let jwt = body.trim().trim_matches('"');
    if jwt.is_empty() {
        return Err(Error::Protocol("empty JWT".to_string()));
    }
    Ok(jwt.to_string())
}

pub fn parse_listener_id(body: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(body)?;
    parsed
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Protocol("listener registration without id".to_string()))
}

/// Login answers `{"success": true, ...}`.
pub fn parse_login(body: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(body)?;
    match parsed.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(()),
        Some(false) => Err(Error::BadCredentials),
        None => Err(Error::Protocol("login response without success flag".to_string())),
    }
}

/// An empty body on a list endpoint means an empty list.
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let body = if body.trim().is_empty() { "[]" } else { body };
    Ok(serde_json::from_str(body)?)
}

/// Maps a non-success response to the matching error kind.
pub fn classify_error(status: u16, body: &str) -> Error {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = parsed
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or(body)
        .trim()
        .to_string();
    let code = parsed.get("errorCode").and_then(Value::as_str).unwrap_or("");

    if message.contains("Too many requests") {
        Error::TooManyRequests
    } else if message.contains("Bad credentials") || message.contains("invalid_grant") {
        Error::BadCredentials
    } else if message.contains("Server is down for maintenance") {
        Error::Maintenance
    } else if message.contains("No registered event listener") {
        Error::NoRegisteredEventListener
    } else if message.contains("Not authenticated") {
        Error::NotAuthenticated
    } else if code == "AUTHENTICATION_ERROR" {
        Error::BadCredentials
    } else if status == 429 {
        Error::TooManyRequests
    } else if status == 503 {
        Error::Maintenance
    } else {
        Error::Api { status, message }
    }
}

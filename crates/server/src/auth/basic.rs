use base64::Engine;
use http::{header::AUTHORIZATION, request::Parts};
use secrecy::{ExposeSecret, SecretString};

use super::error::AuthError;

pub(super) fn authenticate(parts: &Parts, username: &str, password: &SecretString) -> Result<String, AuthError> {
    let header = parts.headers.get(AUTHORIZATION).ok_or(AuthError::Unauthorized)?;
    let value = header.to_str().map_err(|_| AuthError::Unauthorized)?;

    let encoded = value.strip_prefix("Basic ").ok_or(AuthError::InvalidToken("expected 'Basic' scheme"))?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::InvalidToken("invalid base64"))?;

    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidToken("invalid utf-8"))?;

    let (presented_user, presented_pass) =
        decoded.split_once(':').ok_or(AuthError::InvalidToken("missing ':' separator"))?;

    if presented_user == username && presented_pass == password.expose_secret() {
        Ok(presented_user.to_string())
    } else {
        Err(AuthError::Unauthorized)
    }
}

use http::request::Parts;
use secrecy::{ExposeSecret, SecretString};

use super::error::AuthError;

pub(super) fn authenticate(parts: &Parts, header: &str, key: &SecretString) -> Result<String, AuthError> {
    let presented = parts
        .headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    if presented == key.expose_secret() {
        Ok(format!("apikey:{header}"))
    } else {
        Err(AuthError::Unauthorized)
    }
}

use context::{BearerToken, Claims};
use http::{header::AUTHORIZATION, request::Parts};
use jwt_compact::{Algorithm, AlgorithmExt, TimeOptions, UntrustedToken, alg::Hs256Key};
use secrecy::{ExposeSecret, SecretString};

use super::error::AuthError;

const BEARER_PREFIX_LEN: usize = 6;

pub(super) fn authenticate(
    parts: &Parts,
    secret: &SecretString,
    issuer: Option<&str>,
    audience: Option<&str>,
) -> Result<(String, BearerToken), AuthError> {
    let header = parts.headers.get(AUTHORIZATION).ok_or(AuthError::Unauthorized)?;
    let value = header.to_str().map_err(|_| AuthError::Unauthorized)?;

    if value.len() <= BEARER_PREFIX_LEN || !value[..BEARER_PREFIX_LEN].eq_ignore_ascii_case("bearer ") {
        return Err(AuthError::InvalidToken("expected 'Bearer' scheme"));
    }

    let raw = value[BEARER_PREFIX_LEN..].trim();
    if raw.is_empty() {
        return Err(AuthError::Unauthorized);
    }

    let untrusted = UntrustedToken::new(raw).map_err(|_| AuthError::InvalidToken("malformed token"))?;
    let key = Hs256Key::new(secret.expose_secret().as_bytes());

    let token = jwt_compact::alg::Hs256
        .validator::<Claims>(&key)
        .validate(&untrusted)
        .map_err(|_| AuthError::InvalidToken("signature verification failed"))?;

    let claims = token.claims();
    let time_options = TimeOptions::default();

    claims
        .validate_expiration(&time_options)
        .map_err(|_| AuthError::InvalidToken("token has expired"))?;

    if let Some(expected) = issuer
        && claims.custom.issuer.as_deref() != Some(expected)
    {
        return Err(AuthError::InvalidToken("issuer claim mismatch"));
    }

    if let Some(expected) = audience
        && !claims.custom.audience.as_ref().is_some_and(|auds| auds.iter().any(|a| a == expected))
    {
        return Err(AuthError::InvalidToken("audience claim mismatch"));
    }

    let client_id = claims.custom.subject.clone().unwrap_or_else(|| "jwt-subject-unknown".to_string());
    let bearer = BearerToken { raw: SecretString::from(raw.to_string()), token };

    Ok((client_id, bearer))
}

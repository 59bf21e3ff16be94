#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("invalid token: {0}")]
    InvalidToken(&'static str),
}

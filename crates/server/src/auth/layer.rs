use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use config::AuthMode;
use context::ClientIdentity;
use http::{Request, Response, StatusCode};
use serde::Serialize;
use tower::Layer;

use super::{apikey, basic, error::AuthError, jwt};

/// Enforces `[server.auth]` on the `http`/`websocket` transports. The
/// `pipe` transport never constructs this layer — `config::loader` rejects
/// a `pipe` config that carries a non-`None` auth mode.
#[derive(Clone)]
pub struct AuthLayer {
    mode: Arc<AuthMode>,
}

impl AuthLayer {
    pub fn new(mode: AuthMode) -> Self {
        Self { mode: Arc::new(mode) }
    }
}

impl<Service> Layer<Service> for AuthLayer
where
    Service: Send + Clone,
{
    type Service = AuthService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AuthService { next, mode: self.mode.clone() }
    }
}

#[derive(Clone)]
pub struct AuthService<Service> {
    next: Service,
    mode: Arc<AuthMode>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AuthService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let mode = self.mode.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            let outcome = match mode.as_ref() {
                AuthMode::None => Ok(ClientIdentity { client_id: "anonymous".to_string(), group: None }),
                AuthMode::ApiKey { header, key } => {
                    apikey::authenticate(&parts, header, key).map(|client_id| ClientIdentity { client_id, group: None })
                }
                AuthMode::Basic { username, password } => {
                    basic::authenticate(&parts, username, password).map(|client_id| ClientIdentity { client_id, group: None })
                }
                AuthMode::JwtHs256 { secret, issuer, audience } => {
                    match jwt::authenticate(&parts, secret, issuer.as_deref(), audience.as_deref()) {
                        Ok((client_id, bearer)) => {
                            parts.extensions.insert(bearer);
                            Ok(ClientIdentity { client_id, group: None })
                        }
                        Err(err) => Err(err),
                    }
                }
            };

            match outcome {
                Ok(identity) => {
                    parts.extensions.insert(identity);
                    next.call(Request::from_parts(parts, body)).await
                }
                Err(err) => Ok(error_response(err)),
            }
        })
    }
}

fn error_response(err: AuthError) -> Response<Body> {
    #[derive(Serialize)]
    struct ErrorBody {
        error: String,
    }

    let body = serde_json::to_string(&ErrorBody { error: err.to_string() })
        .unwrap_or_else(|_| r#"{"error":"unauthorized"}"#.to_string());

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("WWW-Authenticate", "Bearer")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

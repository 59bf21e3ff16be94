//! `[server.cors]` enforcement for the `http` transport.
//! Preflight and simple requests from an origin outside `allowed_origins`
//! receive a `403`; allowed origins get the usual `Access-Control-Allow-*`
//! headers echoed back. Self-contained rather than built on
//! `tower_http::cors::CorsLayer` because that layer never rejects a
//! disallowed origin outright — it just omits the headers and leaves
//! enforcement to the browser, and a disallowed origin should be rejected
//! by the server itself.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use config::CorsConfig;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use tower::Layer;

#[derive(Clone)]
pub struct CorsLayer {
    config: Arc<CorsConfig>,
}

impl CorsLayer {
    pub fn new(config: CorsConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl<Service> Layer<Service> for CorsLayer
where
    Service: Send + Clone,
{
    type Service = CorsService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        CorsService { next, config: self.config.clone() }
    }
}

#[derive(Clone)]
pub struct CorsService<Service> {
    next: Service,
    config: Arc<CorsConfig>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for CorsService<Service>
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
        let config = self.config.clone();

        let origin = req.headers().get(header::ORIGIN).and_then(|v| v.to_str().ok()).map(str::to_owned);

        let Some(origin) = origin else {
            return Box::pin(async move { next.call(req).await });
        };

        if !origin_allowed(&config, &origin) {
            return Box::pin(async move { Ok(forbidden()) });
        }

        let is_preflight = req.method() == Method::OPTIONS;
        let allow_credentials = config.allow_credentials;

        if is_preflight {
            return Box::pin(async move { Ok(preflight_response(&origin, allow_credentials)) });
        }

        Box::pin(async move {
            let mut response = next.call(req).await?;
            apply_cors_headers(response.headers_mut(), &origin, allow_credentials);
            Ok(response)
        })
    }
}

fn origin_allowed(config: &CorsConfig, origin: &str) -> bool {
    config.allowed_origins.iter().any(|allowed| allowed == "*" || allowed == origin)
}

fn apply_cors_headers(headers: &mut http::HeaderMap, origin: &str, allow_credentials: bool) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    if allow_credentials {
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }
}

fn preflight_response(origin: &str, allow_credentials: bool) -> Response<Body> {
    let mut response = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "content-type, authorization, x-api-key")
        .body(Body::empty())
        .unwrap();

    apply_cors_headers(response.headers_mut(), origin, allow_credentials);
    response
}

fn forbidden() -> Response<Body> {
    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("origin not allowed"))
        .unwrap()
}

//! HTTP surface: `POST /api/contentful/{store_id}` with the entry as body and the
//! topic in the `X-Contentful-Topic` header.
use crate::classify::TOPIC_HEADER;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::errors::WebhookError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use routing::{Resolution, Route, RouteActions};
use serde::Serialize;
use shared::http::{make_error_response, make_json_response};
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WEBHOOK_PATH: &str = "/api/contentful/{store_id}";

#[derive(Debug)]
enum Action {
    ContentfulWebhook,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error_message: &'a str,
}

pub struct WebhookService {
    dispatcher: Arc<Dispatcher>,
    routes: Arc<RouteActions<Action>>,
    request_timeout: Duration,
}

impl WebhookService {
    pub fn new(dispatcher: Arc<Dispatcher>, request_timeout: Duration) -> Self {
        let routes = RouteActions::new(vec![
            Route::new(WEBHOOK_PATH, Action::ContentfulWebhook).with_method(Method::POST),
        ]);

        WebhookService {
            dispatcher,
            routes: Arc::new(routes),
            request_timeout,
        }
    }
}

impl Service<Request<Incoming>> for WebhookService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = WebhookError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let routes = self.routes.clone();
        let request_timeout = self.request_timeout;

        Box::pin(async move {
            let start = Instant::now();
            gauge!(REQUESTS_INFLIGHT).increment(1.0);

            let response = handle_request(&routes, &dispatcher, request_timeout, req).await;

            gauge!(REQUESTS_INFLIGHT).decrement(1.0);
            histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_string())
                .record(start.elapsed().as_secs_f64());
            Ok(response)
        })
    }
}

async fn handle_request(
    routes: &RouteActions<Action>,
    dispatcher: &Dispatcher,
    request_timeout: Duration,
    req: Request<Incoming>,
) -> Response<BoxBody<Bytes, WebhookError>> {
    let store_id = match routes.resolve(&req) {
        Resolution::Matched(route) => {
            tracing::debug!(action = ?route.action, "matched route");
            match route.params.get("store_id") {
                Some(store_id) => store_id.to_string(),
                None => return make_error_response(StatusCode::NOT_FOUND),
            }
        }
        Resolution::MethodNotAllowed => return make_error_response(StatusCode::METHOD_NOT_ALLOWED),
        Resolution::NotFound => {
            tracing::debug!(method = %req.method(), path = %req.uri().path(), "no route matched");
            return make_error_response(StatusCode::NOT_FOUND);
        }
    };

    let topic = req
        .headers()
        .get(TOPIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let result = match req.into_body().collect().await {
        Ok(body) => {
            let body = body.to_bytes();
            match tokio::time::timeout(
                request_timeout,
                dispatcher.handle(&body, &topic, &store_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(WebhookError::Timeout(request_timeout)),
            }
        }
        Err(e) => Err(WebhookError::RequestBody(e.to_string())),
    };

    match result {
        Ok(outcome) => outcome_response(&outcome),
        Err(e) => error_response(&store_id, &e),
    }
}

fn status_for(error: &WebhookError) -> StatusCode {
    match error {
        WebhookError::Decode(_) | WebhookError::RequestBody(_) => StatusCode::BAD_REQUEST,
        WebhookError::StoreNotFound(_) => StatusCode::NOT_FOUND,
        WebhookError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        WebhookError::MissingField(_)
        | WebhookError::CatalogNotFound(_)
        | WebhookError::Catalog(_)
        | WebhookError::Blob(_)
        | WebhookError::StoreDirectory(_)
        | WebhookError::FrontMatter(_)
        | WebhookError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn outcome_response(outcome: &Outcome) -> Response<BoxBody<Bytes, WebhookError>> {
    match serde_json::to_vec(outcome) {
        Ok(body) => make_json_response(StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize outcome");
            make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_response(store_id: &str, error: &WebhookError) -> Response<BoxBody<Bytes, WebhookError>> {
    let status = status_for(error);
    let message = error.to_string();

    if status.is_server_error() {
        tracing::error!(store_id, error = %message, status = status.as_u16(), "webhook failed");
    } else {
        tracing::info!(store_id, error = %message, status = status.as_u16(), "webhook rejected");
    }

    match serde_json::to_vec(&ErrorBody {
        error_message: &message,
    }) {
        Ok(body) => make_json_response(status, body),
        Err(_) => make_error_response(status),
    }
}

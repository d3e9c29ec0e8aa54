//! HTTP and WebSocket adapter
//!
//! Routes:
//! - `GET    /api/webhook`          list registered webhooks
//! - `POST   /api/webhook`          create a webhook
//! - `GET    /api/webhook/{id}`     request history, newest first
//! - `DELETE /api/webhook/{id}`     remove a webhook
//! - `GET    /api/ws/webhook/{id}`  live feed over WebSocket
//! - `ANY    /hooks/{id}`           inbound call recorded against a webhook

use crate::config::HooksConfig;
use crate::error::{ErrorKind, HookError};
use crate::relay::{LiveRelay, Observer, Subscription};
use crate::service::HookService;
use crate::types::WebhookRequest;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Path, State,
    },
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct AppState {
    hooks: HookService,
    history_limit: Option<usize>,
}

/// Build the router for a hook service
pub fn router(hooks: HookService, config: &HooksConfig) -> Router {
    let state = AppState {
        hooks,
        history_limit: config.history_limit,
    };

    Router::new()
        .route("/api/webhook", get(list).post(create))
        .route("/api/webhook/{id}", get(retrieve).delete(remove))
        .route("/api/ws/webhook/{id}", get(subscribe))
        .route("/hooks/{id}", any(ingest))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Wire types ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListWebhooksResponse {
    pub webhooks: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookIdResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveWebhookResponse {
    pub id: String,
    pub requests: Vec<RequestView>,
    pub total: usize,
}

/// A stored request as rendered to clients
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: String,
    /// UTF-8 payload text, or base64 when `encoding` says so
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl From<WebhookRequest> for RequestView {
    fn from(request: WebhookRequest) -> Self {
        let (payload, encoding) = match request.payload_str() {
            Some(text) => (text.to_string(), None),
            None => (STANDARD.encode(&request.payload), Some("base64".to_string())),
        };
        Self {
            id: request.id,
            payload,
            encoding,
            received_at: request.received_at,
        }
    }
}

/// Maps core errors onto HTTP statuses
pub struct ApiError(HookError);

impl From<HookError> for ApiError {
    fn from(e: HookError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ConnectionLost | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            errors: vec![self.0.to_string()],
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ─── Registry & history ──────────────────────────────────────────

async fn list(State(state): State<AppState>) -> ApiResult<Json<ListWebhooksResponse>> {
    let webhooks = state.hooks.registry().list().await?;
    Ok(Json(ListWebhooksResponse { webhooks }))
}

async fn create(State(state): State<AppState>) -> ApiResult<Json<WebhookIdResponse>> {
    let id = state.hooks.registry().create().await?;
    Ok(Json(WebhookIdResponse { id }))
}

async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RetrieveWebhookResponse>> {
    let requests = state
        .hooks
        .requests()
        .retrieve_recent(&id, state.history_limit)
        .await?;
    let requests: Vec<RequestView> = requests.into_iter().map(RequestView::from).collect();
    Ok(Json(RetrieveWebhookResponse {
        total: requests.len(),
        id,
        requests,
    }))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WebhookIdResponse>> {
    let id = state.hooks.registry().remove(&id).await?;
    Ok(Json(WebhookIdResponse { id }))
}

// ─── Inbound calls ───────────────────────────────────────────────

/// Capture an inbound call as a JSON document
///
/// JSON bodies are embedded as-is, other UTF-8 bodies as a string, and
/// binary bodies as base64.
fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> Vec<u8> {
    let header_map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|s| (k.to_string(), serde_json::Value::String(s.to_string())))
        })
        .collect();

    let (body_value, body_encoding) = match std::str::from_utf8(body) {
        Ok(text) => (
            serde_json::from_str(text)
                .unwrap_or_else(|_| serde_json::Value::String(text.to_string())),
            None,
        ),
        Err(_) => (serde_json::Value::String(STANDARD.encode(body)), Some("base64")),
    };

    let mut captured = serde_json::json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": header_map,
        "body": body_value,
    });
    if let Some(encoding) = body_encoding {
        captured["bodyEncoding"] = serde_json::Value::from(encoding);
    }
    captured.to_string().into_bytes()
}

async fn ingest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookIdResponse>> {
    if !state.hooks.registry().exists(&id).await? {
        return Err(HookError::NotFound(id).into());
    }

    let payload = capture(&method, &uri, &headers, &body);
    let request = state.hooks.requests().append(&id, payload).await?;
    Ok(Json(WebhookIdResponse { id: request.id }))
}

// ─── Live feed ───────────────────────────────────────────────────

async fn subscribe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    // Subscribe before upgrading: unknown ids get a plain 404, and nothing
    // published during the handshake is missed.
    let subscription = state.hooks.relay().subscribe(&id).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let relay = state.hooks.relay().clone();
    Ok(ws.on_upgrade(move |socket| relay_socket(socket, relay, subscription)))
}

async fn relay_socket(socket: WebSocket, relay: LiveRelay, subscription: Subscription) {
    let (sink, stream) = socket.split();
    let mut observer = SocketObserver { sink, stream };

    relay.forward(subscription, &mut observer).await;
    let _ = observer.sink.close().await;
}

/// WebSocket connection seen as a relay observer
struct SocketObserver {
    sink: SplitSink<WebSocket, Message>,
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl Observer for SocketObserver {
    async fn send(&mut self, payload: &Bytes) -> crate::Result<()> {
        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(payload.clone()),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| HookError::ConnectionLost(e.to_string()))
    }

    async fn closed(&mut self) {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_view_text_payload() {
        let view = RequestView::from(WebhookRequest::new("w1", "hello"));
        assert_eq!(view.payload, "hello");
        assert!(view.encoding.is_none());
    }

    #[test]
    fn test_request_view_binary_payload() {
        let view = RequestView::from(WebhookRequest::new("w1", vec![0xffu8, 0xfe]));
        assert_eq!(view.payload, "//4=");
        assert_eq!(view.encoding.as_deref(), Some("base64"));
    }

    #[test]
    fn test_capture_json_body() {
        let mut headers = HeaderMap::new();
        headers.insert("x-github-event", "push".parse().unwrap());
        let uri: Uri = "/hooks/w1?delivery=7".parse().unwrap();

        let payload = capture(
            &Method::POST,
            &uri,
            &headers,
            &Bytes::from_static(br#"{"ref": "main"}"#),
        );
        let captured: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(captured["method"], "POST");
        assert_eq!(captured["path"], "/hooks/w1");
        assert_eq!(captured["query"], "delivery=7");
        assert_eq!(captured["headers"]["x-github-event"], "push");
        assert_eq!(captured["body"]["ref"], "main");
        assert!(captured.get("bodyEncoding").is_none());
    }

    #[test]
    fn test_capture_text_and_binary_bodies() {
        let uri: Uri = "/hooks/w1".parse().unwrap();

        let text = capture(&Method::PUT, &uri, &HeaderMap::new(), &Bytes::from("plain"));
        let text: serde_json::Value = serde_json::from_slice(&text).unwrap();
        assert_eq!(text["body"], "plain");
        assert!(text["query"].is_null());

        let binary = capture(
            &Method::POST,
            &uri,
            &HeaderMap::new(),
            &Bytes::from_static(&[0xff, 0xfe]),
        );
        let binary: serde_json::Value = serde_json::from_slice(&binary).unwrap();
        assert_eq!(binary["body"], "//4=");
        assert_eq!(binary["bodyEncoding"], "base64");
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = ApiError(HookError::NotFound("w1".into())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let down = ApiError(HookError::StoreUnavailable("down".into())).into_response();
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

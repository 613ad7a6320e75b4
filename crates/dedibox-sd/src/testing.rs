//! In-process stand-in for the provider API, served on `127.0.0.1:0`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value as JsonValue, json};

type Canned = (StatusCode, String);

/// Canned responses for the listing and detail endpoints under `/api/v1`.
#[derive(Clone)]
pub struct MockUpstream {
    listing: Canned,
    details: HashMap<String, Canned>,
    delay: Duration,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub pretty: Option<String>,
}

struct MockState {
    canned: MockUpstream,
    detail_calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    fn record(&self, path: String, headers: &HeaderMap) {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            path,
            authorization: get("authorization"),
            pretty: get("x-pretty-json"),
        });
    }
}

/// Handle to a running mock; `base` is the API base URL to hand to the client.
pub struct MockServer {
    pub base: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub fn detail_calls(&self) -> usize {
        self.state.detail_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl MockUpstream {
    /// Listing that returns `/api/v1/server/<id>` for each id.
    pub fn listing(ids: &[&str]) -> Self {
        let paths: Vec<String> = ids.iter().map(|id| format!("/api/v1/server/{id}")).collect();
        Self::listing_body(json!(paths))
    }

    pub fn listing_body(body: JsonValue) -> Self {
        Self {
            listing: (StatusCode::OK, body.to_string()),
            details: HashMap::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn listing_status(status: StatusCode) -> Self {
        Self {
            listing: (status, r#"{"error":"upstream unhappy"}"#.to_string()),
            details: HashMap::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn detail(self, id: &str, body: JsonValue) -> Self {
        self.detail_raw(id, StatusCode::OK, &body.to_string())
    }

    pub fn detail_raw(mut self, id: &str, status: StatusCode, body: &str) -> Self {
        self.details
            .insert(id.to_string(), (status, body.to_string()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn spawn(self) -> MockServer {
        let state = Arc::new(MockState {
            canned: self,
            detail_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/api/v1/server", get(list))
            .route("/api/v1/server/{id}", get(detail))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock upstream");
        });

        MockServer {
            base: format!("http://{addr}/api/v1"),
            state,
        }
    }
}

async fn list(State(st): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    st.record("/api/v1/server".to_string(), &headers);
    tokio::time::sleep(st.canned.delay).await;
    reply(&st.canned.listing)
}

async fn detail(
    State(st): State<Arc<MockState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    st.record(format!("/api/v1/server/{id}"), &headers);
    st.detail_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(st.canned.delay).await;
    match st.canned.details.get(&id) {
        Some(canned) => reply(canned),
        None => (StatusCode::NOT_FOUND, "no such server").into_response(),
    }
}

fn reply((status, body): &Canned) -> Response {
    (
        *status,
        [(header::CONTENT_TYPE, "application/json")],
        body.clone(),
    )
        .into_response()
}

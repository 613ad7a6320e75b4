//! HTTP surface: the Prometheus `http_sd_configs` endpoint.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;

use crate::discovery::discover;
use crate::synth::Synthesizer;
use crate::upstream::ServerApi;

/// Immutable per-process state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn ServerApi>,
    pub synthesizer: Arc<Synthesizer>,
    pub detail_concurrency: usize,
}

/// Router exposing the discovery endpoint at `path`.
pub fn router(path: &str, state: AppState) -> Router {
    Router::new().route(path, get(handle_sd)).with_state(state)
}

/// `200` with a JSON target array, or `502` with the error text when the
/// server listing could not be fetched.
pub async fn handle_sd(State(state): State<AppState>) -> Response {
    match discover(
        state.api.as_ref(),
        &state.synthesizer,
        state.detail_concurrency,
    )
    .await
    {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "server listing failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelPolicy;
    use crate::synth::DEFAULT_SCRAPE_PORT;
    use crate::testing::{MockServer, MockUpstream};
    use crate::upstream::{UpstreamClient, UpstreamSettings};
    use axum::http::header;
    use serde_json::{Value as JsonValue, json};
    use std::time::Duration;

    fn state_for(mock: &MockServer, policy: LabelPolicy) -> AppState {
        let client = UpstreamClient::new(&UpstreamSettings {
            api_base: mock.base.clone(),
            token: "tok".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("client");
        AppState {
            api: Arc::new(client),
            synthesizer: Arc::new(Synthesizer {
                scrape_port: DEFAULT_SCRAPE_PORT,
                policy,
                sanitize_labels: false,
            }),
            detail_concurrency: 1,
        }
    }

    async fn body_of(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body")
            .to_vec()
    }

    #[tokio::test]
    async fn addressless_server_is_left_out() {
        let mock = MockUpstream::listing(&["111", "222"])
            .detail("111", json!({"network": {"ip": ["10.0.0.1"]}, "tags": ["ssd"]}))
            .detail("222", json!({"network": {"ip": []}, "tags": ["paris"]}))
            .spawn()
            .await;

        let resp = handle_sd(State(state_for(&mock, LabelPolicy::Tags))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        let body: JsonValue = serde_json::from_slice(&body_of(resp).await).expect("json");
        assert_eq!(
            body,
            json!([{"targets": ["10.0.0.1:9100"], "labels": {"server_id": "111", "tag_ssd": "1"}}])
        );
        assert_eq!(mock.detail_calls(), 2);
    }

    #[tokio::test]
    async fn tag_names_pass_through_verbatim_by_default() {
        let mock = MockUpstream::listing(&["5"])
            .detail(
                "5",
                json!({"network": {"ip": ["10.0.0.5"]}, "tags": ["rack-12", "rack_12", "dc.paris"]}),
            )
            .spawn()
            .await;

        let resp = handle_sd(State(state_for(&mock, LabelPolicy::default()))).await;
        let body: JsonValue = serde_json::from_slice(&body_of(resp).await).expect("json");
        assert_eq!(
            body[0]["labels"],
            json!({
                "server_id": "5",
                "tag_rack-12": "1",
                "tag_rack_12": "1",
                "tag_dc.paris": "1"
            })
        );
    }

    #[tokio::test]
    async fn listing_failure_is_bad_gateway() {
        let mock = MockUpstream::listing_status(StatusCode::INTERNAL_SERVER_ERROR)
            .spawn()
            .await;

        let resp = handle_sd(State(state_for(&mock, LabelPolicy::Tags))).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = String::from_utf8(body_of(resp).await).expect("utf8");
        assert!(body.contains("/server"), "{body}");
        assert_eq!(mock.detail_calls(), 0);
    }

    #[tokio::test]
    async fn no_servers_is_an_empty_array() {
        let mock = MockUpstream::listing(&[]).spawn().await;
        let resp = handle_sd(State(state_for(&mock, LabelPolicy::Tags))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, b"[]");
    }

    #[tokio::test]
    async fn flatten_policy_end_to_end() {
        let mock = MockUpstream::listing(&["7"])
            .detail(
                "7",
                json!({"network": {"ip": ["10.0.0.7"]}, "location": {"dc": "DC5", "rack": null}}),
            )
            .spawn()
            .await;
        let policy = LabelPolicy::Flatten {
            prefix: "meta".into(),
            max_depth: 3,
        };
        let resp = handle_sd(State(state_for(&mock, policy))).await;
        let body: JsonValue = serde_json::from_slice(&body_of(resp).await).expect("json");
        let labels = &body[0]["labels"];
        assert_eq!(labels["server_id"], "7");
        assert_eq!(labels["meta_location_dc"], "DC5");
        assert_eq!(labels["meta_network_ip_0"], "10.0.0.7");
        assert!(labels.get("meta_location_rack").is_none());
    }

    #[tokio::test]
    async fn router_serves_configured_path() {
        let mock = MockUpstream::listing(&["111"])
            .detail("111", json!({"network": {"ip": ["10.0.0.1"]}}))
            .spawn()
            .await;
        let app = router("/scw-sd", state_for(&mock, LabelPolicy::Tags));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("http client");
        let ok = http
            .get(format!("http://{addr}/scw-sd"))
            .send()
            .await
            .expect("request");
        assert_eq!(ok.status(), reqwest::StatusCode::OK);
        let body: JsonValue =
            serde_json::from_slice(&ok.bytes().await.expect("body")).expect("json");
        assert_eq!(body[0]["targets"], json!(["10.0.0.1:9100"]));

        let missing = http
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .expect("request");
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }
}

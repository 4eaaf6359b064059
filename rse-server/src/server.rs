//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::router())
        .merge(api::events::router())
        .with_state(state)
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::config::file::FileConfig;
    use crate::config::runtime::RuntimeConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use rse_core::auth::{AuthCache, KeyFormat, MemoryAuthCache};
    use rse_core::store::{EventStore, MemoryEventStore};
    use rse_sdk::objects::PollResponse;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const PUBLISHER: &str = "svc/1.0 uuid/aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
    const SUBSCRIBER: &str = "app/1.0 uuid/bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";
    const TOKEN: &str = "secret-token";

    fn runtime_config(test_mode: bool) -> RuntimeConfig {
        let mut config = ConfigLoader::new("unused.toml", None)
            .build(FileConfig::default())
            .unwrap();
        config.test_mode = test_mode;
        config
    }

    async fn app(test_mode: bool) -> (Router, AppState) {
        let config = runtime_config(test_mode);
        let cache = Arc::new(MemoryAuthCache::new());
        cache
            .set(&config.key_format.cache_key(TOKEN), Duration::from_secs(60))
            .await
            .unwrap();
        let state = AppState::new(&config, Arc::new(MemoryEventStore::new()), cache);
        (build_router(state.clone()), state)
    }

    fn request(method: Method, uri: &str, user_agent: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, user_agent)
            .header("X-Auth-Token", TOKEN)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn heartbeat_scenario() {
        let (router, _) = app(false).await;

        let response = router
            .clone()
            .oneshot(request(
                Method::POST,
                "/svc/heartbeat",
                PUBLISHER,
                r#"{"Event":"ping"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(request(Method::GET, "/svc/heartbeat", SUBSCRIBER, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        let body: PollResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.channel, "/svc/heartbeat");
        assert_eq!(body.events.len(), 1);
        assert_eq!(body.events[0].data.get(), r#"{"Event":"ping"}"#);
        assert_eq!(body.events[0].user_agent, PUBLISHER);
        let last = body.last_id().unwrap();

        let response = router
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/svc/heartbeat?last-known-id={last}"),
                SUBSCRIBER,
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // The publisher never sees its own event.
        let response = router
            .oneshot(request(Method::GET, "/svc/heartbeat", PUBLISHER, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_unauthorized() {
        let (router, _) = app(false).await;

        let no_token = Request::builder()
            .uri("/svc/heartbeat")
            .header(header::USER_AGENT, SUBSCRIBER)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(no_token).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/svc/heartbeat")
            .header(header::USER_AGENT, SUBSCRIBER)
            .header("X-Auth-Token", "nope")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected() {
        let (router, _) = app(false).await;

        let response = router
            .clone()
            .oneshot(request(Method::POST, "/c", PUBLISHER, "{oops"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Invalid JSON");

        let response = router
            .oneshot(request(Method::POST, "/c", "no-uuid/1.0", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_string(response).await,
            "Missing UUID in User-Agent header"
        );
    }

    #[tokio::test]
    async fn jsonp_publish_and_poll() {
        let (router, _) = app(false).await;

        let response = router
            .clone()
            .oneshot(request(
                Method::GET,
                "/room?method=POST&post-data=%7B%22a%22%3A1%7D&callback=done",
                PUBLISHER,
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/javascript");
        assert_eq!(body_string(response).await, "done({});");

        let response = router
            .clone()
            .oneshot(request(Method::GET, "/room?callback=cb", SUBSCRIBER, ""))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.starts_with(r#"cb({"channel":"/room","events":[{"id":"#));
        assert!(body.ends_with(r#""data":{"a":1}}]});"#));

        let response = router
            .clone()
            .oneshot(request(
                Method::GET,
                "/empty?callback=cb",
                SUBSCRIBER,
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            r#"cb({"channel":"/empty","events":[]});"#
        );

        let response = router
            .oneshot(request(Method::GET, "/room?callback=x.y", SUBSCRIBER, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn parent_mode_over_http() {
        let (router, _) = app(false).await;
        for channel in ["/org", "/org/team", "/org/team/alice", "/other"] {
            let response = router
                .clone()
                .oneshot(request(Method::POST, channel, PUBLISHER, "1"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = router
            .oneshot(request(
                Method::GET,
                "/org/team/alice?events=parent&sort=-1",
                SUBSCRIBER,
                "",
            ))
            .await
            .unwrap();
        let body: PollResponse = serde_json::from_str(&body_string(response).await).unwrap();
        let ids: Vec<i64> = body.events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_mode_relaxes_auth_and_enables_dump() {
        let (router, _) = app(true).await;

        let publish = Request::builder()
            .method(Method::POST)
            .uri("/t")
            .body(Body::from("[1,2]"))
            .unwrap();
        let response = router.clone().oneshot(publish).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let dump = Request::builder().uri("/all").body(Body::empty()).unwrap();
        let response = router.oneshot(dump).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let events: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(events.as_array().unwrap().len(), 1);
        assert_eq!(events[0]["data"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn health_endpoints() {
        let (router, state) = app(false).await;

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK\n");

        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(head).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.is_empty());

        state.stats.record_auth_lookup(true);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health?verbose=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let report: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(report["test_mode"], false);
        assert_eq!(report["events"], 0);
        assert_eq!(report["stats"]["auth_cache"]["lookups"], 1);
        assert_eq!(report["stats"]["auth_cache"]["hit_rate"], 1.0);
        assert_eq!(report["stats"]["id_generator"]["attempts"], 0);
        assert_eq!(report["event_range"], serde_json::json!({"first": null, "last": null}));
    }

    #[tokio::test]
    async fn verbose_health_reports_event_range_and_filters_fields() {
        let (router, _) = app(false).await;
        for (channel, body) in [("/old", "{}"), ("/new", r#"{"Event":"deploy"}"#)] {
            router
                .clone()
                .oneshot(request(Method::POST, channel, PUBLISHER, body))
                .await
                .unwrap();
        }

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health?verbose=true&fields=events,event_range")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let report: Value = serde_json::from_str(&body_string(response).await).unwrap();
        let sections: Vec<&str> = report.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(sections, vec!["event_range", "events"]);
        assert_eq!(report["events"], 2);
        assert_eq!(report["event_range"]["first"]["channel"], "/old");
        assert_eq!(report["event_range"]["first"]["name"], Value::Null);
        assert_eq!(report["event_range"]["last"]["channel"], "/new");
        assert_eq!(report["event_range"]["last"]["name"], "deploy");
        assert_eq!(report["event_range"]["last"]["id"], 2);
    }

    #[tokio::test]
    async fn health_check_does_not_authorize_any_token() {
        let mut config = runtime_config(false);
        config.key_format = KeyFormat {
            prefix: String::new(),
            hashing_threshold: 250,
        };
        let state = AppState::new(
            &config,
            Arc::new(MemoryEventStore::new()),
            Arc::new(MemoryAuthCache::new()),
        );
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for token in ["health", "ok"] {
            let poll = Request::builder()
                .uri("/c")
                .header(header::USER_AGENT, SUBSCRIBER)
                .header("X-Auth-Token", token)
                .body(Body::empty())
                .unwrap();
            let response = router.clone().oneshot(poll).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn nul_in_channel_is_a_bad_request() {
        let (router, state) = app(false).await;
        let response = router
            .oneshot(request(Method::POST, "/svc/a%00b", PUBLISHER, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Invalid channel");
        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reload_changes_page_size() {
        let (router, state) = app(false).await;
        for _ in 0..5 {
            router
                .clone()
                .oneshot(request(Method::POST, "/p", PUBLISHER, "{}"))
                .await
                .unwrap();
        }

        let mut config = runtime_config(false);
        config.poll.default_max_events = 2;
        config.key_format = KeyFormat {
            prefix: "ignored-".into(),
            hashing_threshold: 1,
        };
        state.apply_reload(&config);

        let response = router
            .oneshot(request(Method::GET, "/p", SUBSCRIBER, ""))
            .await
            .unwrap();
        let body: PollResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.events.len(), 2);
    }
}

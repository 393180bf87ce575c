use crate::{controller::health_check_controller, sse::handler::sse_handler, AppState};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use log::*;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;

pub fn define_routes(app_state: AppState) -> Router {
    let router = Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(event_routes(app_state.clone()))
        .fallback_service(static_routes(app_state.config.static_dir()));

    match cors_layer(&app_state.config.allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", get(sse_handler))
        .with_state(app_state)
}

// Everything that isn't an API route is looked up in the static asset directory
pub fn static_routes(static_dir: &str) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::overriding(
        ServeDir::new(static_dir),
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    )
}

fn cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use events::Event;
    use futures::StreamExt;
    use service::config::Config;
    use sse::codec::{encode, KEEP_ALIVE_FRAME};
    use sse::{Hub, HubConfig};
    use std::time::Duration;
    use tokio::time::timeout;
    use tower::ServiceExt;

    const WAIT: Duration = Duration::from_secs(5);

    // Defaults apply only to flags the test doesn't set; clap rejects a flag given twice.
    fn config(args: &[&str]) -> Config {
        let defaults = [("--keep-alive-secs", "0"), ("--static-dir", "does-not-exist")];

        let mut argv = vec!["sse-hub"];
        for (flag, value) in defaults {
            if !args.contains(&flag) {
                argv.extend([flag, value]);
            }
        }
        argv.extend_from_slice(args);
        Config::parse_from(argv)
    }

    fn app_state(config: Config) -> AppState {
        let hub = Hub::spawn(HubConfig {
            replay_buffer_size: 0,
            subscriber_capacity: 8,
        });
        AppState::new(config, hub)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_healthy_while_hub_is_running() {
        let app_state = app_state(config(&[]));
        let router = define_routes(app_state.clone());

        let response = router.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        app_state.hub().shutdown().await;

        let response = router.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn event_stream_sets_sse_headers() {
        let app_state = app_state(config(&[]));

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        let start_id = headers["last-event-id"].to_str().unwrap();
        assert!(start_id.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn event_stream_writes_one_frame_per_published_event() {
        let app_state = app_state(config(&[]));
        let hub = app_state.hub().clone();

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        let first = Event::new(r#"{"set1":{"val1":"hello"}}"#, "test-host");
        let second = Event::new(r#"{"set2":{"val1":"foo"}}"#, "test-host");
        assert_eq!(hub.publish(first.clone()).await.unwrap(), 1);
        assert_eq!(hub.publish(second.clone()).await.unwrap(), 1);

        let chunk = timeout(WAIT, body.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(chunk.to_vec(), encode(&first));
        let chunk = timeout(WAIT, body.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(chunk.to_vec(), encode(&second));
    }

    #[tokio::test]
    async fn event_stream_ends_when_hub_shuts_down() {
        let app_state = app_state(config(&[]));
        let hub = app_state.hub().clone();

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        hub.shutdown().await;

        assert!(timeout(WAIT, body.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disconnecting_client_is_unsubscribed() {
        let app_state = app_state(config(&[]));
        let hub = app_state.hub().clone();

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);

        drop(response);

        assert_eq!(hub.subscriber_count().await.unwrap(), 0);
        assert_eq!(hub.publish(Event::new("nobody", "test")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn event_stream_after_shutdown_is_unavailable() {
        let app_state = app_state(config(&[]));
        app_state.hub().shutdown().await;

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn idle_stream_sends_keep_alive_comments() {
        let app_state = app_state(config(&["--keep-alive-secs", "1"]));

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        let chunk = timeout(WAIT, body.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(chunk.to_vec(), KEEP_ALIVE_FRAME.to_vec());
    }

    #[tokio::test]
    async fn busy_stream_sends_no_keep_alive_comments() {
        let app_state = app_state(config(&["--keep-alive-secs", "1"]));
        let hub = app_state.hub().clone();

        let response = define_routes(app_state)
            .oneshot(get_request("/events"))
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        // Poll once so the stream's keep-alive timer starts before publishing.
        assert!(timeout(Duration::from_millis(100), body.next()).await.is_err());

        let publisher = tokio::spawn(async move {
            for n in 0..8 {
                hub.publish(Event::new(n.to_string(), "test-host"))
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        });

        for n in 0..8 {
            let chunk = timeout(WAIT, body.next()).await.unwrap().unwrap().unwrap();
            assert_ne!(chunk.to_vec(), KEEP_ALIVE_FRAME.to_vec(), "frame {n}");
        }
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn allowed_origin_receives_cors_headers() {
        let app_state = app_state(config(&["--allowed-origins", "http://client.test"]));

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://client.test")
            .body(Body::empty())
            .unwrap();
        let response = define_routes(app_state).oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://client.test"
        );
    }

    #[tokio::test]
    async fn static_assets_are_served_uncached() {
        let dir = std::env::temp_dir().join(format!("sse-hub-static-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<p>hello</p>").unwrap();
        let app_state = app_state(config(&["--static-dir", dir.to_str().unwrap()]));

        let response = define_routes(app_state)
            .oneshot(get_request("/index.html"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_origins_are_skipped() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_none());
        assert!(cors_layer(&["http://ok.test".to_string()]).is_some());
    }
}

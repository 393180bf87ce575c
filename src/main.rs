use events::source::DemoSource;
use events::EventPublisher;
use log::{error, info};
use service::{config::Config, logging::Logger, AppState};
use sse::relay::Relay;
use sse::{Hub, HubEventHandler};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!("Starting SSE broadcast hub...");

    let hub = Hub::spawn(config.hub_config());
    let publisher =
        EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone())));

    let source_name = config.source_name();
    let source = match config.upstream_url() {
        Some(url) => {
            let relay = match config.upstream_reconnect() {
                Some(delay) => Relay::new(url, source_name).with_reconnect(delay),
                None => Relay::new(url, source_name),
            };
            tokio::spawn(async move {
                match relay.run(publisher).await {
                    Ok(relayed) => info!("Upstream relay stopped after {relayed} event(s)"),
                    Err(e) => error!("Upstream relay stopped, no events will be published: {e}"),
                }
            })
        }
        None => tokio::spawn(DemoSource::new(config.demo_interval(), source_name).run(publisher)),
    };

    let app_state = AppState::new(config, hub.clone());

    if let Err(e) = web::init_server(app_state).await {
        error!("Server error: {e}");
        hub.shutdown().await;
        source.abort();
        std::process::exit(1);
    }

    // The hub is closed by now, so the source stops on its next publish.
    source.abort();
    info!("Server stopped");
}

use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::HubConfig;
use std::time::Duration;

/// Fallback for `source_name` when the host name can't be determined.
const DEFAULT_SOURCE_NAME: &str = "localhost";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to open event streams.
    /// When empty, no CORS headers are added.
    #[arg(long, env, value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Directory of static assets served for any path that isn't an API route
    #[arg(long, env, default_value = "static")]
    static_dir: String,

    /// Number of recent events replayed to each newly connected client (0 disables replay)
    #[arg(long, env, default_value_t = 4)]
    pub replay_buffer_size: usize,

    /// Number of events that may be queued for one client before further events are dropped for it
    #[arg(long, env, default_value_t = 32)]
    pub subscriber_capacity: usize,

    /// Seconds between keep-alive comments on an idle event stream (0 disables keep-alives)
    #[arg(long, env, default_value_t = 15)]
    pub keep_alive_secs: u64,

    /// Milliseconds between events produced by the demo source
    #[arg(long, env, default_value_t = 1000)]
    pub demo_interval_ms: u64,

    /// URL of an upstream event stream to relay instead of running the demo source
    #[arg(long, env)]
    upstream_url: Option<String>,

    /// Seconds to wait before reconnecting to the upstream after it closes or fails,
    /// doubling while it stays down (0 disables reconnects)
    #[arg(long, env, default_value_t = 1)]
    pub upstream_reconnect_secs: u64,

    /// Name stamped into the `source` field of produced events. Defaults to the host name.
    #[arg(long, env)]
    source_name: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn static_dir(&self) -> &str {
        &self.static_dir
    }

    pub fn upstream_url(&self) -> Option<&str> {
        self.upstream_url.as_deref()
    }

    /// Initial reconnect delay for the upstream relay, or `None` when disabled.
    pub fn upstream_reconnect(&self) -> Option<Duration> {
        (self.upstream_reconnect_secs > 0)
            .then(|| Duration::from_secs(self.upstream_reconnect_secs))
    }

    /// The configured source name, or this machine's host name.
    pub fn source_name(&self) -> String {
        if let Some(name) = &self.source_name {
            return name.clone();
        }

        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string())
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            replay_buffer_size: self.replay_buffer_size,
            subscriber_capacity: self.subscriber_capacity,
        }
    }

    /// Keep-alive period for event streams, or `None` when disabled.
    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs))
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo_interval_ms.max(1))
    }
}

//! Prometheus metrics for the game server.
//!
//! Metrics are exposed in Prometheus text format on their own listener for
//! scraping by monitoring systems.
//!
//! # Metrics
//!
//! - `games_created_total`, `games_active`: hosted games
//! - `actions_submitted_total`: human decisions received, by channel
//! - `events_published_total`: game events, by type
//! - `http_requests_total`, `websocket_connections_active`: the API surface
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pt_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::games_created_total();
//! metrics::games_active(1);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`. Without an
/// installed exporter every recording below is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Increment games created counter.
pub fn games_created_total() {
    metrics::counter!("games_created_total").increment(1);
}

/// Set current unfinished games count.
pub fn games_active(count: usize) {
    metrics::gauge!("games_active").set(count as f64);
}

/// Record a human decision arriving over `channel` (`http` or `websocket`).
pub fn actions_submitted_total(channel: &'static str, accepted: bool) {
    metrics::counter!("actions_submitted_total",
        "channel" => channel,
        "accepted" => accepted.to_string()
    )
    .increment(1);
}

/// Record one published game event.
pub fn events_published_total(event_type: &str) {
    metrics::counter!("events_published_total",
        "event_type" => event_type.to_string()
    )
    .increment(1);
}

// ============================================================================
// API Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Adjust the open WebSocket connection gauge.
pub fn websocket_connections_active(delta: f64) {
    metrics::gauge!("websocket_connections_active").increment(delta);
}

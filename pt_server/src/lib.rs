//! Tournament server: configuration, logging, metrics and the HTTP/WebSocket
//! surface over the `poker_tourney` game manager.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

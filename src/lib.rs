//! nvmemon: NVMe SMART health monitoring
//!
//! Folds an append-only health log into per-device rolling statistics and a
//! temperature-occurrence histogram, serves them to an interactive terminal
//! session, and runs a deduplicated email alert loop.
//!
//! ## Architecture
//!
//! - **Ingest**: one-shot decode of the JSON-lines health log
//! - **Aggregation Engine**: per-device histogram and temperature summary
//! - **Alert Engine**: directional thresholds plus interval/regression
//!   suppression, with a durable per-(device, metric) history snapshot
//! - **Session Navigator**: cyclic device browsing with toggleable display
//!   options, driven by timed keyboard reads

pub mod aggregate;
pub mod alert;
pub mod app;
pub mod config;
pub mod ingest;
pub mod input;
pub mod render;
pub mod session;

// Re-export the core data model
pub use aggregate::{
    Aggregator, DeviceAggregate, DeviceAggregates, HistogramBucket, TemperatureSummary,
};
pub use ingest::{read_log, DecodeError, HealthRecord};

// Re-export alerting
pub use alert::{
    AlertEngine, AlertHistory, AlertHistoryEntry, AlertTransport, Metric, TransportError,
};

// Re-export configuration
pub use config::{AlertSettings, ConfigError, MonitorConfig};

// Re-export the session state machine
pub use session::{
    build_view, DeviceView, InputSource, Key, ResultsScope, Session, SortKey, Transition,
};

pub use app::Monitor;

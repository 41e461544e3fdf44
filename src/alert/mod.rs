//! Alerting: threshold evaluation, deduplication history, and transport.
//!
//! The evaluator decides per (device, metric) whether a new notification is
//! warranted given prior alert history; the history store persists that
//! decision record across restarts; the transport seam hands finished alert
//! bodies to an external mailer.

pub mod evaluator;
pub mod history;
pub mod transport;

pub use evaluator::{AlertEngine, Metric, MetricDirection, evaluate};
pub use history::{AlertHistory, AlertHistoryEntry, HistoryError};
pub use transport::{AlertTransport, LogTransport, SmtpAlertTransport, SmtpConfig, TransportError};

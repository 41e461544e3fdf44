//! Alert transport seam
//!
//! The evaluation engine hands finished (subject, body) pairs to an
//! [`AlertTransport`]; delivery itself is an external concern. The SMTP
//! implementation wraps lettre's blocking transport, configured entirely from
//! environment variables so credentials stay out of the config file.
//!
//! The sender side may be externally rate-limited (hourly cap); a rate-limit
//! rejection surfaces as an ordinary transport error and is handled the same
//! way - logged, history untouched, implicit retry next cycle.

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),
}

/// Accepts a finished alert; succeeds or raises a transport error.
pub trait AlertTransport {
    fn send(&self, subject: &str, body: &str) -> Result<(), TransportError>;
}

/// Default SMTP submission port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP delivery configuration, loaded from environment variables.
///
/// | Variable        | Required | Default |
/// |-----------------|----------|---------|
/// | `SMTP_SERVER`   | yes      | -       |
/// | `SMTP_PORT`     | no       | `587`   |
/// | `EMAIL_ADDRESS` | yes      | -       |
/// | `EMAIL_PASSWORD`| no       | -       |
/// | `RECIPIENT`     | yes      | -       |
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub from_address: String,
    pub password: Option<String>,
    pub recipient: String,
}

impl SmtpConfig {
    /// Load from environment variables. Returns `None` when any required
    /// variable is absent, signalling that email delivery is unconfigured.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            server: std::env::var("SMTP_SERVER").ok()?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("EMAIL_ADDRESS").ok()?,
            password: std::env::var("EMAIL_PASSWORD").ok(),
            recipient: std::env::var("RECIPIENT").ok()?,
        })
    }
}

/// Sends alert emails over blocking SMTP with STARTTLS.
pub struct SmtpAlertTransport {
    config: SmtpConfig,
}

impl SmtpAlertTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

impl AlertTransport for SmtpAlertTransport {
    fn send(&self, subject: &str, body: &str) -> Result<(), TransportError> {
        use lettre::message::header::ContentType;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{Message, SmtpTransport, Transport};

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(self.config.recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| TransportError::Build(e.to_string()))?;

        let mut builder = SmtpTransport::starttls_relay(&self.config.server)?
            .port(self.config.port);
        if let Some(password) = &self.config.password {
            builder = builder.credentials(Credentials::new(
                self.config.from_address.clone(),
                password.clone(),
            ));
        }

        let mailer = builder.build();
        mailer.send(&email)?;
        Ok(())
    }
}

/// Fallback transport when SMTP is unconfigured: alerts land in the process
/// log and count as delivered, so the history dedup still applies.
pub struct LogTransport;

impl AlertTransport for LogTransport {
    fn send(&self, subject: &str, body: &str) -> Result<(), TransportError> {
        info!(subject = %subject, "alert (no SMTP configured)\n{body}");
        Ok(())
    }
}

//! Admin verification-code delivery over SMTP.
//!
//! Wraps the `lettre` async transport. When SMTP is not configured (dev),
//! [`Mailer::send_verification_code`] logs the code instead of sending it.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};

/// Sends admin login codes by email, or logs them when SMTP is disabled.
pub struct Mailer {
    smtp: Option<SmtpConfig>,
}

impl Mailer {
    pub fn new(smtp: Option<SmtpConfig>) -> Self {
        Self { smtp }
    }

    /// True when a configured SMTP relay backs this mailer.
    pub fn is_configured(&self) -> bool {
        self.smtp.is_some()
    }

    /// Deliver a six-digit verification code to an admin address.
    pub async fn send_verification_code(&self, to_email: &str, code: &str) -> AppResult<()> {
        let Some(smtp) = &self.smtp else {
            // Dev fallback: surface the code in the server log.
            tracing::debug!(to = to_email, code = code, "SMTP disabled; verification code logged");
            return Ok(());
        };

        let body = format!(
            "Your Fusion admin verification code is: {}\n\nIt expires in 5 minutes. \
             If you did not request this code, you can ignore this email.",
            code
        );

        let email = Message::builder()
            .from(
                smtp.from_address
                    .parse()
                    .map_err(|e| AppError::Email(format!("invalid sender address: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| AppError::Email(format!("invalid recipient address: {}", e)))?)
            .subject("Your Fusion admin verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Email(format!("could not build message: {}", e)))?;

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| AppError::Email(format!("SMTP relay setup failed: {}", e)))?
            .port(smtp.port);

        if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
            transport = transport
                .credentials(Credentials::new(user.clone(), pass.expose_secret().to_string()));
        }

        transport
            .build()
            .send(email)
            .await
            .map_err(|e| AppError::Email(format!("SMTP send failed: {}", e)))?;

        tracing::info!(to = to_email, "verification code email sent");
        Ok(())
    }
}

//! Verification codes and links.
//!
//! There is no server holding the secret: the issuer hands the generated code
//! back to the caller, which stores it on the user record for later comparison.

use rand::Rng;
use reqwest::Url;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::email::{MailError, Mailer, VerificationMail};

/// Number of digits in a verification code
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Invalid email address: {0}")]
    Validation(String),
    #[error("Email service is not properly configured: {0}")]
    Config(String),
    #[error("Failed to deliver verification email: {0}")]
    Delivery(String),
}

impl From<MailError> for VerificationError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::NotConfigured(msg) => VerificationError::Config(msg),
            other => VerificationError::Delivery(other.to_string()),
        }
    }
}

/// Generate a numeric code; every digit is uniform over 0-9, leading zeros allowed.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub struct VerificationCodeIssuer<M> {
    mailer: M,
    app_name: String,
    app_url: String,
}

impl<M: Mailer> VerificationCodeIssuer<M> {
    pub fn new(mailer: M, email: &EmailConfig) -> Self {
        Self {
            mailer,
            app_name: email.app_name.clone(),
            app_url: email.app_url.trim_end_matches('/').to_string(),
        }
    }

    /// Generate a code, mail it to `email`, and return it.
    pub async fn issue(&self, email: &str, name: &str) -> Result<String, VerificationError> {
        validate_email(email)?;

        let code = generate_code();
        let verify_link = self.link("/verify", &[("code", code.as_str()), ("email", email)])?;

        self.mailer
            .send(&VerificationMail {
                to_email: email.to_string(),
                user_name: name.to_string(),
                code: Some(code.clone()),
                app: self.app_name.clone(),
                verify_link,
            })
            .await?;

        tracing::info!(email, "verification code issued");
        Ok(code)
    }

    /// Generate a verification token, mail a link carrying it, and return it.
    pub async fn issue_link(&self, email: &str, name: &str) -> Result<String, VerificationError> {
        validate_email(email)?;

        let token = uuid::Uuid::new_v4().to_string();
        let verify_link = self.link("/api/auth/verify", &[("token", token.as_str())])?;

        self.mailer
            .send(&VerificationMail {
                to_email: email.to_string(),
                user_name: name.to_string(),
                code: None,
                app: self.app_name.clone(),
                verify_link,
            })
            .await?;

        tracing::info!(email, "verification link issued");
        Ok(token)
    }

    fn link(&self, path: &str, params: &[(&str, &str)]) -> Result<String, VerificationError> {
        let base = format!("{}{}", self.app_url, path);
        Url::parse_with_params(&base, params)
            .map(|url| url.to_string())
            .map_err(|e| VerificationError::Config(format!("invalid app_url '{}': {}", self.app_url, e)))
    }
}

fn validate_email(email: &str) -> Result<(), VerificationError> {
    if email.is_empty() || !email.contains('@') {
        return Err(VerificationError::Validation(email.to_string()));
    }
    Ok(())
}

//! Outbound verification mail.
//!
//! [`Mailer`] is the delivery seam. [`EmailJsMailer`] talks to the EmailJS REST
//! API, which renders the template configured on the EmailJS side with the
//! parameters in [`VerificationMail`].

use std::future::Future;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email service is not configured: {0}")]
    NotConfigured(String),
    #[error("Email service returned status {0}")]
    Rejected(u16),
    #[error("Email transport error: {0}")]
    Transport(String),
}

/// Template parameters for one verification mail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationMail {
    pub to_email: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub app: String,
    pub verify_link: String,
}

pub trait Mailer {
    fn send(&self, mail: &VerificationMail) -> impl Future<Output = Result<(), MailError>> + Send;
}

#[derive(Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a VerificationMail,
}

/// Mailer backed by the EmailJS REST API.
///
/// Missing credentials are reported on each send rather than at construction,
/// so the rest of the application works without an email account configured.
#[derive(Debug, Clone)]
pub struct EmailJsMailer {
    client: Client,
    config: EmailConfig,
}

impl EmailJsMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn credentials(&self) -> Result<(&str, &str, &str), MailError> {
        let service_id = self.config.service_id.as_deref().filter(|s| !s.is_empty());
        let template_id = self.config.template_id.as_deref().filter(|s| !s.is_empty());
        let public_key = self.config.public_key.as_deref().filter(|s| !s.is_empty());

        match (service_id, template_id, public_key) {
            (Some(s), Some(t), Some(k)) => Ok((s, t, k)),
            _ => {
                tracing::error!(
                    has_service_id = service_id.is_some(),
                    has_template_id = template_id.is_some(),
                    has_public_key = public_key.is_some(),
                    "EmailJS configuration missing"
                );
                Err(MailError::NotConfigured(
                    "service_id, template_id and public_key are required".to_string(),
                ))
            }
        }
    }
}

impl Mailer for EmailJsMailer {
    async fn send(&self, mail: &VerificationMail) -> Result<(), MailError> {
        let (service_id, template_id, public_key) = self.credentials()?;

        let request = EmailJsRequest {
            service_id,
            template_id,
            user_id: public_key,
            access_token: self.config.private_key.as_deref(),
            template_params: mail,
        };

        tracing::debug!(to = %mail.to_email, template_id, "sending verification email");

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() != 200 {
            tracing::warn!(status = status.as_u16(), "EmailJS rejected the request");
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::info!(to = %mail.to_email, "verification email sent");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> VerificationMail {
        VerificationMail {
            to_email: "alice@example.com".into(),
            user_name: "Alice".into(),
            code: Some("012345".into()),
            app: "Inkly".into(),
            verify_link: "http://localhost:3000/verify?code=012345".into(),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_request() {
        let mailer = EmailJsMailer::new(EmailConfig::default());
        let result = mailer.send(&mail()).await;
        assert!(matches!(result, Err(MailError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_blank_credentials_count_as_missing() {
        let config = EmailConfig {
            service_id: Some("service".into()),
            template_id: Some("".into()),
            public_key: Some("key".into()),
            ..EmailConfig::default()
        };
        let result = EmailJsMailer::new(config).send(&mail()).await;
        assert!(matches!(result, Err(MailError::NotConfigured(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let m = mail();
        let request = EmailJsRequest {
            service_id: "svc",
            template_id: "tpl",
            user_id: "pub",
            access_token: None,
            template_params: &m,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["user_id"], "pub");
        assert_eq!(json["template_params"]["code"], "012345");
        assert_eq!(json["template_params"]["to_email"], "alice@example.com");
        assert!(json.get("accessToken").is_none());
    }
}

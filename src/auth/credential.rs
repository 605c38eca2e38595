//! External identity-provider credentials.
//!
//! The login widget hands back a JWT-shaped `header.payload.signature` blob.
//! Only the payload is read; the signature is not checked.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{AuthProvider, UserRecord};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential is not a three-part token")]
    Malformed,
    #[error("Credential payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Credential payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Credential carries no email address")]
    MissingEmail,
}

/// Profile fields read from a decoded credential payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExternalProfile {
    #[serde(rename = "sub", default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl ExternalProfile {
    /// Display name, falling back to the local part of the email.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

pub fn decode_credential(credential: &str) -> Result<ExternalProfile, CredentialError> {
    let parts: Vec<&str> = credential.trim().split('.').collect();
    let [_, payload, _] = parts.as_slice() else {
        return Err(CredentialError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let profile: ExternalProfile = serde_json::from_slice(&bytes)?;
    if profile.email.trim().is_empty() {
        return Err(CredentialError::MissingEmail);
    }
    Ok(profile)
}

/// Where a new account's details came from.
#[derive(Debug, Clone)]
pub enum Identity {
    Local {
        name: String,
        email: String,
        password_hash: String,
    },
    External(ExternalProfile),
}

impl Identity {
    /// Build the unverified record stored for this identity.
    pub fn into_record(self) -> UserRecord {
        match self {
            Identity::Local {
                name,
                email,
                password_hash,
            } => {
                let mut record = UserRecord::new(name, email);
                record.password_hash = Some(password_hash);
                record
            }
            Identity::External(profile) => {
                let mut record = UserRecord::new(profile.display_name(), profile.email);
                record.picture = profile.picture;
                record.provider = AuthProvider::Google;
                record
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_test_credential(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.signature", header, body)
}

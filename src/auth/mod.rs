//! Session and email-verification state machine.
//!
//! ```text
//! Anonymous --sign_up / new external--> PendingVerification --verify_code--> Authenticated
//! Anonymous --sign_in (verified)------------------------------------------> Authenticated
//! any ------sign_out------------------> Anonymous
//! ```
//!
//! The machine owns no state of its own beyond the current [`AuthState`]; every
//! transition is a read-modify-write of the [`UserStore`].

pub mod credential;
pub mod password;

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::email::Mailer;
use crate::models::{AuthProvider, SessionRecord, UserRecord};
use crate::store::{KeyValueStore, StoreError};
use crate::users::UserStore;
use crate::verification::{VerificationCodeIssuer, VerificationError};

pub use credential::{CredentialError, ExternalProfile, Identity, decode_credential};
pub use password::PasswordStrength;

pub const DEFAULT_RESEND_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("User not found: {0}")]
    NotFound(String),
    #[error("An account with email {0} already exists")]
    AlreadyExists(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Password must contain {0}")]
    PasswordPolicy(String),
    #[error("Please wait {remaining_secs}s before requesting another code")]
    CooldownActive { remaining_secs: u64 },
    #[error("User is already verified")]
    AlreadyVerified,
    #[error("Failed to send verification email: {0}")]
    Delivery(String),
    #[error("Email service is not properly configured: {0}")]
    Config(String),
    #[error("Invalid credential: {0}")]
    Credential(#[from] CredentialError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("{0}")]
    PasswordHash(String),
}

impl From<VerificationError> for AuthError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Validation(email) => {
                AuthError::Validation(format!("Invalid email address: {}", email))
            }
            VerificationError::Config(msg) => AuthError::Config(msg),
            VerificationError::Delivery(msg) => AuthError::Delivery(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    PendingVerification { email: String },
    Authenticated { email: String },
}

impl AuthState {
    fn from_session(session: Option<&SessionRecord>) -> Self {
        match session {
            None => AuthState::Anonymous,
            Some(s) if s.verified => AuthState::Authenticated {
                email: s.email.clone(),
            },
            Some(s) => AuthState::PendingVerification {
                email: s.email.clone(),
            },
        }
    }
}

pub struct AuthSessionMachine<S, M> {
    users: UserStore<S>,
    issuer: VerificationCodeIssuer<M>,
    state: AuthState,
    resend_cooldown: Duration,
}

impl<S: KeyValueStore, M: Mailer> AuthSessionMachine<S, M> {
    /// Build a machine whose state reflects the persisted session.
    pub fn new(users: UserStore<S>, issuer: VerificationCodeIssuer<M>) -> Result<Self, AuthError> {
        let state = AuthState::from_session(users.get_session()?.as_ref());
        Ok(Self {
            users,
            issuer,
            state,
            resend_cooldown: DEFAULT_RESEND_COOLDOWN,
        })
    }

    pub fn with_resend_cooldown(mut self, cooldown: Duration) -> Self {
        self.resend_cooldown = cooldown;
        self
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn users(&self) -> &UserStore<S> {
        &self.users
    }

    pub fn current_user(&self) -> Result<Option<SessionRecord>, AuthError> {
        Ok(self.users.get_session()?)
    }

    pub async fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthState, AuthError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }

        let strength = PasswordStrength::evaluate(password);
        if !strength.is_satisfied() {
            return Err(AuthError::PasswordPolicy(strength.missing().join(", ")));
        }

        if self.users.find_by_email(email)?.is_some() {
            return Err(AuthError::AlreadyExists(email.to_string()));
        }

        let password_hash = password::hash_password(password).map_err(AuthError::PasswordHash)?;
        let identity = Identity::Local {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
        };
        self.register(identity).await
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthState, AuthError> {
        let Some(user) = self.users.find_by_email(email.trim())? else {
            tracing::debug!(email, "sign-in for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        if !password::verify_password(password, hash).map_err(AuthError::PasswordHash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.start_session(user.to_session())
    }

    /// Sign in with a credential blob emitted by the identity provider widget.
    pub async fn sign_in_with_external_credential(
        &mut self,
        credential: &str,
    ) -> Result<AuthState, AuthError> {
        let profile = decode_credential(credential)?;

        match self.users.find_by_email(&profile.email)? {
            Some(mut user) => {
                if user.provider == AuthProvider::Google && !user.verified {
                    user.verified = true;
                    user.verification_code = None;
                    user.code_issued_at = None;
                    self.users.upsert(&user)?;
                }
                tracing::info!(email = %user.email, provider = ?user.provider, "external sign-in");
                self.start_session(user.to_session())
            }
            None => self.register(Identity::External(profile)).await,
        }
    }

    pub fn verify_code(&mut self, email: &str, code: &str) -> Result<AuthState, AuthError> {
        let mut user = self
            .users
            .find_by_email(email)?
            .ok_or_else(|| AuthError::NotFound(email.to_string()))?;

        if user.verification_code.as_deref() != Some(code) {
            tracing::debug!(email, "verification code mismatch");
            return Err(AuthError::InvalidCode);
        }

        user.verified = true;
        user.verification_code = None;
        user.code_issued_at = None;
        self.users.upsert(&user)?;
        tracing::info!(email, "email verified");

        // Only the session already pointing at this user is promoted.
        match self.users.get_session()? {
            Some(session) if session.email == user.email => self.start_session(user.to_session()),
            _ => Ok(self.state.clone()),
        }
    }

    /// Issue a fresh code, replacing the stored one.
    pub async fn resend_code(&mut self, email: &str, name: &str) -> Result<(), AuthError> {
        let mut user = self
            .users
            .find_by_email(email)?
            .ok_or_else(|| AuthError::NotFound(email.to_string()))?;
        if user.verified {
            return Err(AuthError::AlreadyVerified);
        }
        if let Some(remaining) = self.cooldown_remaining(&user) {
            return Err(AuthError::CooldownActive {
                remaining_secs: ceil_secs(remaining),
            });
        }

        let name = if name.trim().is_empty() { user.name.as_str() } else { name };
        let code = self.issuer.issue(&user.email, name).await?;
        user.verification_code = Some(code);
        user.code_issued_at = Some(Utc::now());
        self.users.upsert(&user)?;
        Ok(())
    }

    /// Time left before [`resend_code`](Self::resend_code) will issue again.
    pub fn resend_cooldown_remaining(&self, email: &str) -> Result<Option<Duration>, AuthError> {
        let user = self
            .users
            .find_by_email(email)?
            .ok_or_else(|| AuthError::NotFound(email.to_string()))?;
        Ok(self.cooldown_remaining(&user))
    }

    pub fn sign_out(&mut self) -> Result<(), AuthError> {
        self.users.clear_session()?;
        self.state = AuthState::Anonymous;
        Ok(())
    }

    /// Issue a code for a new identity, then persist it and start a pending session.
    async fn register(&mut self, identity: Identity) -> Result<AuthState, AuthError> {
        let mut record: UserRecord = identity.into_record();
        let code = self.issuer.issue(&record.email, &record.name).await?;
        record.verification_code = Some(code);
        record.code_issued_at = Some(Utc::now());
        self.users.upsert(&record)?;
        tracing::info!(email = %record.email, provider = ?record.provider, "account created");

        self.start_session(record.to_session())
    }

    fn start_session(&mut self, session: SessionRecord) -> Result<AuthState, AuthError> {
        self.users.set_session(&session)?;
        self.state = AuthState::from_session(Some(&session));
        Ok(self.state.clone())
    }

    fn cooldown_remaining(&self, user: &UserRecord) -> Option<Duration> {
        let issued_at = user.code_issued_at?;
        let elapsed = (Utc::now() - issued_at).to_std().unwrap_or(Duration::ZERO);
        let remaining = self.resend_cooldown.saturating_sub(elapsed);
        (!remaining.is_zero()).then_some(remaining)
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

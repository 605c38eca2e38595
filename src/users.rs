//! Repository of user records and the current session.
//!
//! Users live as one JSON array under [`USERS_KEY`]; the signed-in user's
//! projection lives under [`SESSION_KEY`]. The two keys are written
//! independently, so a crash between writes can leave them out of step.

use crate::models::{ProfileUpdate, SessionRecord, UserRecord};
use crate::store::{KeyValueStore, StoreError};

pub const USERS_KEY: &str = "users";
pub const SESSION_KEY: &str = "currentUser";

#[derive(Clone, Debug)]
pub struct UserStore<S> {
    store: S,
}

impl<S: KeyValueStore> UserStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store, for repositories that share it.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.store.get_json(USERS_KEY)?.unwrap_or_default())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.list_users()?.into_iter().find(|u| u.email == email))
    }

    pub fn find_by_verification_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .list_users()?
            .into_iter()
            .find(|u| u.verification_token.as_deref() == Some(token)))
    }

    /// Insert the record, or replace the existing one with the same email.
    pub fn upsert(&self, record: &UserRecord) -> Result<(), StoreError> {
        let mut users = self.list_users()?;
        match users.iter_mut().find(|u| u.email == record.email) {
            Some(existing) => *existing = record.clone(),
            None => users.push(record.clone()),
        }
        self.store.set_json(USERS_KEY, &users)
    }

    pub fn get_session(&self) -> Result<Option<SessionRecord>, StoreError> {
        self.store.get_json(SESSION_KEY)
    }

    pub fn set_session(&self, session: &SessionRecord) -> Result<(), StoreError> {
        self.store.set_json(SESSION_KEY, session)
    }

    pub fn clear_session(&self) -> Result<(), StoreError> {
        self.store.remove(SESSION_KEY)
    }

    /// Forget every user and the session. Per-user note keys are left alone.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.store.remove(USERS_KEY)?;
        self.store.remove(SESSION_KEY)
    }

    /// Apply profile edits. Returns `None` when no such user exists.
    pub fn update_profile(
        &self,
        email: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let Some(mut user) = self.find_by_email(email)? else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(location) = &update.location {
            user.location = Some(location.clone());
        }
        if let Some(picture) = &update.picture {
            user.picture = Some(picture.clone());
        }
        self.upsert(&user)?;

        if let Some(session) = self.get_session()? {
            if session.email == user.email {
                self.set_session(&user.to_session())?;
            }
        }

        Ok(Some(user))
    }

    /// Bump the per-user note counter shown on the profile page.
    pub fn record_note_created(&self, email: &str) -> Result<(), StoreError> {
        if let Some(mut user) = self.find_by_email(email)? {
            user.total_notes += 1;
            self.upsert(&user)?;
        }
        Ok(())
    }
}

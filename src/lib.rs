pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod database;
pub mod email;
pub mod models;
pub mod notes;
pub mod preferences;
pub mod server;
pub mod store;
pub mod users;
pub mod utils;
pub mod verification;

pub use auth::{AuthError, AuthSessionMachine, AuthState};
pub use chat::ChatLog;
pub use config::Config;
pub use database::Database;
pub use models::{Category, NoteRecord, SessionRecord, UserRecord};
pub use notes::NotesRepository;
pub use preferences::Preferences;
pub use store::{KeyValueStore, MemoryStore};
pub use users::UserStore;
pub use utils::Profile;
pub use verification::VerificationCodeIssuer;

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::auth::{AuthError, AuthSessionMachine, AuthState};
use crate::chat::ChatLog;
use crate::config::ConfigError;
use crate::email::Mailer;
use crate::models::{
    Category, CategoryFilter, ChatRole, NoteDraft, NoteFilter, NotePatch, NoteRecord,
    ProfileUpdate, SessionRecord, ViewMode,
};
use crate::notes::NotesRepository;
use crate::preferences::Preferences;
use crate::store::{KeyValueStore, StoreError};
use crate::users::UserStore;
use crate::utils::parse_tags;
use crate::verification::VerificationCodeIssuer;

#[derive(Parser)]
#[command(name = "inkly")]
#[command(about = "Inkly - personal notes with email-verified accounts")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show who is signed in (default if no subcommand)
    Status,
    /// Create an account and send a verification code
    SignUp {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with email and password
    SignIn {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with a credential issued by the identity provider
    SignInExternal {
        #[arg(long)]
        credential: String,
    },
    /// Enter the 6-digit code from the verification email
    Verify {
        code: String,
        /// Defaults to the signed-in user
        #[arg(long)]
        email: Option<String>,
    },
    /// Send a throwaway verification code to check the email setup
    TestEmail { email: String },
    /// Send a new verification code
    Resend {
        /// Defaults to the signed-in user
        #[arg(long)]
        email: Option<String>,
    },
    SignOut,
    /// Show the profile, or update it when any field is given
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// Picture URL
        #[arg(long)]
        picture: Option<String>,
    },
    /// Manage notes
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
    /// Quick-notes chat
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
    /// Show or set how notes are listed (grid or list)
    ViewMode { mode: Option<ViewMode> },
    /// Remove every stored user, session, note and preference
    ClearData {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
    /// Run the HTTP server
    Serve {
        /// Overrides server.bind_addr from the config
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NotesAction {
    /// List notes, optionally filtered
    List {
        #[arg(short, long)]
        query: Option<String>,
        /// Category name or "All"
        #[arg(short, long)]
        category: Option<CategoryFilter>,
    },
    Show { id: i64 },
    Add {
        title: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        favorite: bool,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        /// Comma-separated tags, replacing the current ones
        #[arg(long)]
        tags: Option<String>,
    },
    /// Toggle the favorite flag
    Favorite { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ChatAction {
    /// Post a message and wait for the reply
    Send { message: String },
    History,
    Clear,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Not signed in. Run `inkly sign-in` or `inkly sign-up` first")]
    NotSignedIn,
}

fn require_session<S: KeyValueStore>(users: &UserStore<S>) -> Result<SessionRecord, CliError> {
    users.get_session()?.ok_or(CliError::NotSignedIn)
}

fn print_state(state: &AuthState) {
    match state {
        AuthState::Anonymous => println!("Not signed in"),
        AuthState::PendingVerification { email } => {
            println!("Signed in as {} (email not verified)", email);
            println!("Check your inbox and run `inkly verify <code>`");
        }
        AuthState::Authenticated { email } => println!("Signed in as {}", email),
    }
}

/// Handle the status command
pub fn handle_status<S: KeyValueStore, M: Mailer>(
    machine: &AuthSessionMachine<S, M>,
) -> Result<(), CliError> {
    print_state(machine.state());
    if let Some(session) = machine.current_user()? {
        println!("Name: {}", session.name);
    }
    Ok(())
}

pub async fn handle_sign_up<S: KeyValueStore, M: Mailer>(
    machine: &mut AuthSessionMachine<S, M>,
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), CliError> {
    let state = machine.sign_up(name, email, password).await?;
    println!("Account created. A verification code was sent to {}", email);
    print_state(&state);
    Ok(())
}

pub fn handle_sign_in<S: KeyValueStore, M: Mailer>(
    machine: &mut AuthSessionMachine<S, M>,
    email: &str,
    password: &str,
) -> Result<(), CliError> {
    let state = machine.sign_in(email, password)?;
    print_state(&state);
    Ok(())
}

pub async fn handle_sign_in_external<S: KeyValueStore, M: Mailer>(
    machine: &mut AuthSessionMachine<S, M>,
    credential: &str,
) -> Result<(), CliError> {
    let state = machine.sign_in_with_external_credential(credential).await?;
    print_state(&state);
    Ok(())
}

/// Resolve an explicit email, falling back to the signed-in user
fn target_email<S: KeyValueStore>(
    users: &UserStore<S>,
    email: Option<String>,
) -> Result<String, CliError> {
    match email {
        Some(email) => Ok(email),
        None => Ok(require_session(users)?.email),
    }
}

pub fn handle_verify<S: KeyValueStore, M: Mailer>(
    machine: &mut AuthSessionMachine<S, M>,
    code: &str,
    email: Option<String>,
) -> Result<(), CliError> {
    let email = target_email(machine.users(), email)?;
    let state = machine.verify_code(&email, code.trim())?;
    println!("Email verified");
    print_state(&state);
    Ok(())
}

/// Send a code that is not stored anywhere, to check mail delivery
pub async fn handle_test_email<M: Mailer>(
    issuer: &VerificationCodeIssuer<M>,
    email: &str,
) -> Result<(), CliError> {
    issuer
        .issue(email.trim(), "Test User")
        .await
        .map_err(AuthError::from)?;
    println!("Verification code has been sent to {}", email.trim());
    Ok(())
}

pub async fn handle_resend<S: KeyValueStore, M: Mailer>(
    machine: &mut AuthSessionMachine<S, M>,
    email: Option<String>,
) -> Result<(), CliError> {
    let email = target_email(machine.users(), email)?;
    machine.resend_code(&email, "").await?;
    println!("A new verification code was sent to {}", email);
    Ok(())
}

pub fn handle_sign_out<S: KeyValueStore, M: Mailer>(
    machine: &mut AuthSessionMachine<S, M>,
) -> Result<(), CliError> {
    machine.sign_out()?;
    println!("Signed out");
    Ok(())
}

/// Handle the profile command
pub fn handle_profile<S: KeyValueStore>(
    users: &UserStore<S>,
    update: ProfileUpdate,
) -> Result<(), CliError> {
    let session = require_session(users)?;

    let user = if update == ProfileUpdate::default() {
        users.find_by_email(&session.email)?
    } else {
        users.update_profile(&session.email, &update)?
    };
    let Some(user) = user else {
        return Err(AuthError::NotFound(session.email).into());
    };

    println!("Name:     {}", user.name);
    println!("Email:    {}{}", user.email, if user.verified { "" } else { " (unverified)" });
    if let Some(bio) = &user.bio {
        println!("Bio:      {}", bio);
    }
    if let Some(location) = &user.location {
        println!("Location: {}", location);
    }
    if let Some(picture) = &user.picture {
        println!("Picture:  {}", picture);
    }
    println!("Notes:    {}", user.total_notes);
    println!("Joined:   {}", user.created_at.format("%Y-%m-%d"));
    Ok(())
}

fn print_note(note: &NoteRecord, mode: ViewMode) {
    let star = if note.is_favorite { "* " } else { "" };
    match mode {
        ViewMode::List => {
            println!("{:>4}  {}{}  [{}]  {}", note.id, star, note.title, note.category, note.created_at);
        }
        ViewMode::Grid => {
            println!("#{} {}{}", note.id, star, note.title);
            println!("   {} | {}", note.category, note.created_at);
            if !note.tags.is_empty() {
                println!("   tags: {}", note.tags.join(", "));
            }
            if !note.content.is_empty() {
                println!("   {}", note.content);
            }
            println!();
        }
    }
}

/// Handle the notes subcommands for the signed-in user
pub fn handle_notes<S: KeyValueStore + Clone>(
    users: &UserStore<S>,
    action: NotesAction,
) -> Result<(), CliError> {
    let session = require_session(users)?;
    let notes = NotesRepository::new(users.store().clone(), &session.email);

    match action {
        NotesAction::List { query, category } => {
            let filter = NoteFilter {
                query: query.unwrap_or_default(),
                category: category.unwrap_or_default(),
            };
            let found = notes.list(&filter)?;
            if found.is_empty() {
                println!("No notes found");
                return Ok(());
            }
            let mode = Preferences::new(users.store().clone(), &session.email).view_mode()?;
            for note in &found {
                print_note(note, mode);
            }
        }
        NotesAction::Show { id } => match notes.get(id)? {
            Some(note) => print_note(&note, ViewMode::Grid),
            None => println!("No note with ID {}", id),
        },
        NotesAction::Add {
            title,
            content,
            category,
            tags,
            favorite,
        } => {
            let draft = NoteDraft {
                content: content.unwrap_or_default(),
                category: category.unwrap_or(Category::Personal),
                tags: tags.as_deref().map(parse_tags).unwrap_or_default(),
                is_favorite: favorite,
                ..NoteDraft::new(title)
            };
            let note = notes.create(draft)?;
            users.record_note_created(&session.email)?;
            println!("Note created successfully (ID: {})", note.id);
        }
        NotesAction::Edit {
            id,
            title,
            content,
            category,
            tags,
        } => {
            let patch = NotePatch {
                title,
                content,
                category,
                tags: tags.as_deref().map(parse_tags),
                is_favorite: None,
            };
            match notes.update(id, patch)? {
                Some(_) => println!("Note {} updated", id),
                None => println!("No note with ID {}", id),
            }
        }
        NotesAction::Favorite { id } => match notes.toggle_favorite(id)? {
            Some(note) if note.is_favorite => println!("Note {} added to favorites", id),
            Some(_) => println!("Note {} removed from favorites", id),
            None => println!("No note with ID {}", id),
        },
        NotesAction::Delete { id } => {
            if notes.delete(id)? {
                println!("Note {} deleted", id);
            } else {
                println!("No note with ID {}", id);
            }
        }
    }
    Ok(())
}

/// Handle the chat subcommands; `reply_delay` is the simulated thinking time
pub async fn handle_chat<S: KeyValueStore + Clone>(
    users: &UserStore<S>,
    action: ChatAction,
    reply_delay: Duration,
) -> Result<(), CliError> {
    let session = require_session(users)?;
    let chat = ChatLog::new(users.store().clone(), &session.email);

    match action {
        ChatAction::Send { message } => {
            if chat.post(&message)?.is_none() {
                println!("Nothing to send");
                return Ok(());
            }
            tokio::time::sleep(reply_delay).await;
            let reply = chat.reply()?;
            println!("{}", reply.content);
        }
        ChatAction::History => {
            for message in chat.history()? {
                let who = match message.role {
                    ChatRole::User => "you",
                    ChatRole::Assistant => "inkly",
                };
                println!("[{}] {}: {}", message.timestamp.format("%H:%M"), who, message.content);
            }
        }
        ChatAction::Clear => {
            chat.clear()?;
            println!("Chat history cleared");
        }
    }
    Ok(())
}

pub fn handle_view_mode<S: KeyValueStore + Clone>(
    users: &UserStore<S>,
    mode: Option<ViewMode>,
) -> Result<(), CliError> {
    let session = require_session(users)?;
    let prefs = Preferences::new(users.store().clone(), &session.email);
    if let Some(mode) = mode {
        prefs.set_view_mode(mode)?;
    }
    println!("View mode: {}", prefs.view_mode()?.as_str());
    Ok(())
}

pub fn handle_clear_data<S: KeyValueStore>(store: &S, yes: bool) -> Result<(), CliError> {
    if !yes {
        println!("This removes all accounts, notes and settings. Re-run with --yes to confirm");
        return Ok(());
    }
    store.clear()?;
    tracing::warn!("all stored data cleared");
    println!("All data cleared");
    Ok(())
}

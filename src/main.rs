use std::net::SocketAddr;
use std::path::Path;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use inkly::{
    AuthSessionMachine, Config, Database, Profile, UserStore, VerificationCodeIssuer,
    cli::{self, Cli, Commands},
    email::EmailJsMailer,
    models::ProfileUpdate,
    server::{self, AppState},
};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,inkly=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    let config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from_path(Path::new(path))?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => Config::load_with_profile(profile)?,
    };

    // Initialize database
    let db_path = config.get_database_path();
    let db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| eyre!("Database path contains invalid UTF-8"))?,
    )?;

    let issuer = || {
        VerificationCodeIssuer::new(EmailJsMailer::new(config.email.clone()), &config.email)
    };
    let mut machine = AuthSessionMachine::new(UserStore::new(db.clone()), issuer())?
        .with_resend_cooldown(config.resend_cooldown());

    // Dispatch to appropriate command handler
    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => cli::handle_status(&machine)?,
        Commands::SignUp {
            name,
            email,
            password,
        } => cli::handle_sign_up(&mut machine, &name, &email, &password).await?,
        Commands::SignIn { email, password } => cli::handle_sign_in(&mut machine, &email, &password)?,
        Commands::SignInExternal { credential } => {
            cli::handle_sign_in_external(&mut machine, &credential).await?
        }
        Commands::Verify { code, email } => cli::handle_verify(&mut machine, &code, email)?,
        Commands::TestEmail { email } => cli::handle_test_email(&issuer(), &email).await?,
        Commands::Resend { email } => cli::handle_resend(&mut machine, email).await?,
        Commands::SignOut => cli::handle_sign_out(&mut machine)?,
        Commands::Profile {
            name,
            bio,
            location,
            picture,
        } => {
            let update = ProfileUpdate {
                name,
                bio,
                location,
                picture,
            };
            cli::handle_profile(machine.users(), update)?
        }
        Commands::Notes { action } => cli::handle_notes(machine.users(), action)?,
        Commands::Chat { action } => {
            cli::handle_chat(machine.users(), action, config.chat_reply_delay()).await?
        }
        Commands::ViewMode { mode } => cli::handle_view_mode(machine.users(), mode)?,
        Commands::ClearData { yes } => cli::handle_clear_data(&db, yes)?,
        Commands::Serve { bind } => {
            let addr: SocketAddr = match bind {
                Some(bind) => bind.parse().map_err(|_| eyre!("Invalid bind address '{}'", bind))?,
                None => config.bind_addr()?,
            };
            let state = AppState::new(UserStore::new(db.clone()), issuer());
            server::serve(addr, server::build_router(state)).await?;
        }
    }

    Ok(())
}

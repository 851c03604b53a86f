//! Keyward CLI - account administration
//!
//! Usage:
//!   keyward create-superuser <login> <password> [--first-name] [--last-name]
//!   keyward grant-superuser <login>
//!   keyward revoke-superuser <login>
//!   keyward hash-password <password>

use anyhow::Context;
use clap::{Parser, Subcommand};
use keyward_core::memory::MemoryRevocationStore;
use keyward_core::password::hash_password;
use keyward_core::{AppConfig, AuthEngine, NewUser, User};
use keyward_store::PgStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "keyward")]
#[command(about = "Keyward account administration")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true, env = "KEYWARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account with the superuser flag set
    CreateSuperuser {
        login: String,
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Set the superuser flag on an existing account
    GrantSuperuser { login: String },
    /// Clear the superuser flag on an existing account
    RevokeSuperuser { login: String },
    /// Print the Argon2id hash of a password
    HashPassword { password: String },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?
            .with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

/// Engine over PostgreSQL. Admin commands never revoke, so the revocation
/// cache stays in-process.
async fn connect_engine(config: &AppConfig) -> anyhow::Result<AuthEngine> {
    let store = Arc::new(
        PgStore::connect(&config.database)
            .await
            .context("connecting to PostgreSQL")?,
    );
    Ok(AuthEngine::new(
        config,
        store.clone(),
        store,
        Arc::new(MemoryRevocationStore::new()),
    )?)
}

fn print_user(user: &User) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::CreateSuperuser {
            login,
            password,
            first_name,
            last_name,
        } => {
            let engine = connect_engine(&config).await?;
            let user = engine
                .create_superuser(NewUser {
                    login,
                    password,
                    first_name,
                    last_name,
                })
                .await?;
            tracing::info!(login = %user.login, "superuser created");
            print_user(&user)?;
        }
        Commands::GrantSuperuser { login } => {
            let engine = connect_engine(&config).await?;
            print_user(&engine.set_superuser(&login, true).await?)?;
        }
        Commands::RevokeSuperuser { login } => {
            let engine = connect_engine(&config).await?;
            print_user(&engine.set_superuser(&login, false).await?)?;
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password, &config.password)?);
        }
    }

    Ok(())
}

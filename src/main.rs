use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use perch::auth::{TokenGenerator, hash_password};
use perch::config::ServerConfig;
use perch::server::{AppState, create_router};
use perch::store::{SqliteStore, Store};
use perch::types::{Account, Plan, Role, Token};

fn create_token(generator: &TokenGenerator, account_id: &str) -> anyhow::Result<(Token, String)> {
    let (raw_token, lookup, hash) = generator.generate()?;
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        account_id: account_id.to_string(),
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    Ok((token, raw_token))
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "perch")]
#[command(about = "A static-site hosting server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and site files
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Base domain the platform answers on (e.g. "perch.dev").
        /// Repeat for multiple domains; the first is primary. Hosts under
        /// a base domain resolve to site subdomains.
        #[arg(long = "base-domain", default_value = "localhost")]
        base_domains: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin account)
    Init {
        /// Data directory for database and site files
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("perch.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let token_file = data_path.join(".admin_token");

    if store.has_admin_account()? {
        bail!(
            "Server already initialized. Admin token was written to: {}",
            token_file.display()
        );
    }

    let (username, email, password) = if non_interactive {
        (
            "admin".to_string(),
            "admin@localhost".to_string(),
            Uuid::new_v4().to_string(),
        )
    } else {
        prompt_admin_details()?
    };

    let now = Utc::now();
    let admin = Account {
        id: Uuid::new_v4().to_string(),
        username,
        email,
        password_hash: hash_password(&password)?,
        role: Role::Admin,
        plan: Plan::Admin,
        created_at: now,
        updated_at: now,
    };
    store.create_account(&admin)?;

    let generator = TokenGenerator::new();
    let (token, raw_token) = create_token(&generator, &admin.id)?;
    store.create_token(&token)?;

    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin account '{}' created.", admin.username);
    println!();
    println!("API token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

fn prompt_admin_details() -> anyhow::Result<(String, String, String)> {
    let username = inquire::Text::new("Admin username:")
        .with_default("admin")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let email = inquire::Text::new("Admin email:")
        .with_default("admin@localhost")
        .prompt()?;

    let password = inquire::Password::new("Admin password:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()?;

    Ok((username, email, password))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("perch=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            base_domains,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                base_domains,
            };

            let store = SqliteStore::new(config.db_path())?;
            if !store.has_admin_account()? {
                bail!(
                    "Server not initialized. Run 'perch admin init' first to create the database and admin account."
                );
            }

            let state = Arc::new(AppState::new(
                Arc::new(store),
                config.data_dir.clone(),
                config.base_domains.clone(),
            ));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Serving sites for {}", config.base_domains.join(", "));
            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

//! Kesif - account command-line driver

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kesif::{config::Config, services::AuthRequest, AppContext};

#[derive(Parser, Debug)]
#[command(name = "kesif", about = "Kesif account and profile tool")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "KESIF_CONFIG", default_value = "kesif.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long, env = "KESIF_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the session
    SignIn(Credentials),
    /// Create an account with its profile document
    SignUp {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Sign in, then save a new first/last name
    EditProfile {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kesif=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load_with_env(&cli.config)?;
    tracing::debug!("Configuration loaded from {}", cli.config.display());

    let ctx = AppContext::firebase(&config)?;
    let accounts = ctx.accounts();

    let snapshot = match cli.command {
        Command::SignIn(Credentials { email, password }) => {
            accounts
                .authenticate(AuthRequest::sign_in(email, password))
                .await?
        }
        Command::SignUp {
            credentials: Credentials { email, password },
            first_name,
            last_name,
        } => {
            accounts
                .authenticate(AuthRequest::sign_up(email, password, first_name, last_name))
                .await?
        }
        Command::EditProfile {
            credentials: Credentials { email, password },
            first_name,
            last_name,
        } => {
            accounts
                .authenticate(AuthRequest::sign_in(email, password))
                .await?;
            let draft = accounts.begin_profile_edit()?;
            tracing::info!(
                "Renaming {} {} to {} {}",
                draft.first_name,
                draft.last_name,
                first_name,
                last_name
            );
            accounts.save_profile_edit(&first_name, &last_name).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

//! SiteVault CLI - Command-line client
//!
//! Usage:
//!   sitevault login <email>
//!   sitevault whoami
//!   sitevault logout
//!   sitevault passwd --current <pw> --new <pw>
//!   sitevault profile --set company="Northside Civils"
//!   sitevault media <id> --output clip.mp4 [--range bytes=0-1023]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use sitevault_cli::{ApiClient, FileSessionStore, SessionContext};
use sitevault_core::ByteRange;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sitevault")]
#[command(about = "SiteVault document management client")]
#[command(version)]
struct Cli {
    /// API base URL
    #[arg(long, env = "SITEVAULT_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Session cache file
    #[arg(long, env = "SITEVAULT_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and cache the session token
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "SITEVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show the logged-in user after re-checking the token
    Whoami,
    /// Forget the cached session
    Logout,
    /// Change a password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        /// Another user's id (admin only)
        #[arg(long)]
        user_id: Option<Uuid>,
    },
    /// Update profile fields
    Profile {
        /// Field assignment, repeatable
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Download a media object or a byte range of it
    Media {
        id: Uuid,
        #[arg(short, long)]
        output: PathBuf,
        /// e.g. bytes=0-1023
        #[arg(long, value_parser = parse_range)]
        range: Option<ByteRange>,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected FIELD=VALUE, got '{raw}'")),
    }
}

fn parse_range(raw: &str) -> Result<ByteRange, String> {
    let header = if raw.starts_with("bytes=") {
        raw.to_string()
    } else {
        format!("bytes={raw}")
    };
    ByteRange::parse(&header).ok_or_else(|| format!("invalid range '{raw}'"))
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let path = cli
        .session_file
        .unwrap_or_else(FileSessionStore::default_path);
    let store = FileSessionStore::open(&path)
        .with_context(|| format!("Failed to open session cache {}", path.display()))?;
    let session = SessionContext::load(store)?;
    let mut client = ApiClient::new(cli.api_url, session)?;

    match cli.command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let user = client.login(&email, &password).await?;
            println!("Logged in as {} ({})", user.display_name(), user.role.as_str());
        }
        Commands::Whoami => {
            if client.session().current().is_none() {
                bail!("Not logged in");
            }
            let user = client.verify().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Commands::Passwd {
            current,
            new,
            user_id,
        } => {
            let message = client.update_password(user_id, &current, &new).await?;
            println!("{message}");
        }
        Commands::Profile { set } => {
            let fields: Map<String, Value> = set
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            let user = client.update_profile(fields).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::Media { id, output, range } => {
            let download = client.fetch_media(id, range, &output).await?;
            match (&download.content_range, download.total_size()) {
                (Some(range), Some(total)) => println!(
                    "Wrote {} bytes to {} ({range}, object size {total})",
                    download.bytes_written,
                    output.display()
                ),
                _ => println!(
                    "Wrote {} bytes to {}",
                    download.bytes_written,
                    output.display()
                ),
            }
        }
    }

    Ok(())
}

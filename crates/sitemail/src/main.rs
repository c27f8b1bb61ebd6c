//! `sitemail` - send contact-form mail from the command line
//!
//! Reads SMTP settings from the environment (optionally a `.env` file) and
//! delivers one message through the STARTTLS submission client.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitemail_core::{
    AdminSettings, ContactRequest, ContactService, ENV_FILE, Error, SmtpSettings, load_env_file,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sitemail")]
#[command(about = "Deliver contact-form messages over SMTP with STARTTLS", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Environment file to load before reading settings
    #[arg(long, global = true, value_name = "FILE", default_value = ENV_FILE)]
    env_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one contact message
    Send {
        /// Visitor's name, used in the subject line
        #[arg(long)]
        name: String,

        /// Visitor's email, used as Reply-To
        #[arg(long)]
        email: String,

        /// Visitor's phone number
        #[arg(long)]
        phone: String,

        /// Message text
        #[arg(long)]
        message: Option<String>,
    },

    /// Report missing variables and the effective SMTP settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sitemail=info,sitemail_core=info,sitemail_smtp=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let loaded = load_env_file(&cli.env_file)
        .with_context(|| format!("Failed to load {}", cli.env_file.display()))?;
    debug!(path = %cli.env_file.display(), loaded, "environment file");

    match cli.command {
        Commands::Send {
            name,
            email,
            phone,
            message,
        } => send(ContactRequest {
            name: Some(name),
            email: Some(email),
            phone: Some(phone),
            message,
        })
        .await,
        Commands::CheckConfig => check_config(),
    }
}

async fn send(request: ContactRequest) -> anyhow::Result<()> {
    let settings = SmtpSettings::from_env().context("SMTP is not configured")?;
    let service = ContactService::new(&settings)?;

    info!(host = %settings.host, port = settings.port, "sending contact message");
    service.submit(request).await?;
    println!("Message sent to {}", settings.rcpt_to);
    Ok(())
}

fn check_config() -> anyhow::Result<()> {
    let admin = AdminSettings::from_env();
    println!(
        "Admin login: {}",
        if admin.password.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    match SmtpSettings::from_env() {
        Ok(settings) => {
            settings
                .connection_config()
                .context("SMTP settings are present but unusable")?;
            println!("{settings:#?}");
            Ok(())
        }
        Err(Error::MissingEnv(names)) => {
            for name in &names {
                println!("missing: {name}");
            }
            anyhow::bail!("{} required variable(s) missing", names.len())
        }
        Err(e) => Err(e.into()),
    }
}

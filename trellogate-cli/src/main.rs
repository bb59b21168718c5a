//! Trellogate CLI
//!
//! Command-line host for the Trello REST client.
//!
//! # Usage
//!
//! ```bash
//! # Print the consent URL, then paste back the URL the browser lands on
//! trellogate authorize --scope read,write --expiration 1day
//!
//! # Call the API with the stored token
//! trellogate get members/me -p fields=username
//!
//! # Forget the token
//! trellogate deauthorize
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use trellogate_cli::commands::{self, ConsentArgs};
use trellogate_cli::config::{self, CliConfig, API_KEY_ENV};
use trellogate_cli::terminal::{parse_param, TerminalLocation};
use trellogate_core::{create_store, AuthOutcome, SecretStore, TrelloClient};

#[derive(Parser)]
#[command(name = "trellogate")]
#[command(about = "Authorize against Trello and call its REST API")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Application key, overriding the environment and the config file
    #[arg(short, long, global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct Consent {
    /// Scope flags to grant (comma-separated, e.g. read,write)
    #[arg(short, long)]
    scope: Option<String>,

    /// Token lifetime (e.g. 1hour, 1day, 30days, never)
    #[arg(short, long)]
    expiration: Option<String>,

    /// Application name shown on the consent screen
    #[arg(short, long)]
    name: Option<String>,
}

impl From<Consent> for ConsentArgs {
    fn from(consent: Consent) -> Self {
        Self {
            scope: consent.scope,
            expiration: consent.expiration,
            name: consent.name,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a token through the consent screen
    Authorize {
        /// URL the browser was sent back to, token fragment included
        #[arg(long)]
        callback: Option<String>,

        #[command(flatten)]
        consent: Consent,

        /// Keep the token in memory only
        #[arg(long)]
        no_persist: bool,

        /// Fail instead of showing the consent URL when no token is stored
        #[arg(long)]
        non_interactive: bool,

        /// Do not wait for the callback URL to be pasted
        #[arg(long)]
        no_prompt: bool,
    },

    /// Print the consent URL without navigating
    AuthorizeUrl {
        /// URL the consent screen sends the browser back to
        #[arg(long)]
        callback: Option<String>,

        #[command(flatten)]
        consent: Consent,
    },

    /// Forget the stored token
    Deauthorize,

    /// Show whether a token is stored
    Status {
        /// Also fetch the member the token belongs to
        #[arg(long)]
        verify: bool,
    },

    /// GET a path
    Get(CallArgs),

    /// PUT to a path
    Put(CallArgs),

    /// POST to a path
    Post(CallArgs),

    /// DELETE a path
    Delete(CallArgs),
}

#[derive(Args, Debug, Clone)]
struct CallArgs {
    /// API path without the version segment (e.g. members/me)
    path: String,

    /// Request parameter (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    config.apply_key_override(cli.key, std::env::var(API_KEY_ENV).ok());
    init_logging(&config.log_level, cli.verbose);
    info!("Loaded configuration from {:?}", config.config_path);

    let store = create_store(config.prefer_keyring, &config.keyring_service);

    match cli.command {
        Commands::Authorize {
            callback,
            consent,
            no_persist,
            non_interactive,
            no_prompt,
        } => {
            run_authorize(
                &config,
                store,
                callback,
                consent.into(),
                !no_persist,
                !non_interactive,
                !no_prompt,
            )
            .await
        }
        Commands::AuthorizeUrl { callback, consent } => {
            let callback = callback.unwrap_or_else(|| config.callback_url.clone());
            let client = client_at(&config, store, &callback)?;
            println!("{}", commands::consent_url(&client, &callback, &consent.into()));
            Ok(())
        }
        Commands::Deauthorize => {
            let client = client_at(&config, store, &config.callback_url)?;
            client.deauthorize().await;
            println!("Token removed");
            Ok(())
        }
        Commands::Status { verify } => run_status(&config, store, verify).await,
        Commands::Get(args) => run_call(&config, store, "GET", args).await,
        Commands::Put(args) => run_call(&config, store, "PUT", args).await,
        Commands::Post(args) => run_call(&config, store, "POST", args).await,
        Commands::Delete(args) => run_call(&config, store, "DELETE", args).await,
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn client_at(config: &CliConfig, store: Arc<dyn SecretStore>, href: &str) -> Result<TrelloClient> {
    commands::build_client(config, store, Arc::new(TerminalLocation::new(href)))
}

async fn run_authorize(
    config: &CliConfig,
    store: Arc<dyn SecretStore>,
    callback: Option<String>,
    consent: ConsentArgs,
    persist: bool,
    interactive: bool,
    prompt: bool,
) -> Result<()> {
    let href = callback.unwrap_or_else(|| config.callback_url.clone());
    let client = client_at(config, store.clone(), &href)?;
    let options = consent.to_options().persist(persist).interactive(interactive);

    match commands::authorize(&client, options.clone()).await? {
        AuthOutcome::Authorized(source) => {
            println!("Authorized ({:?})", source);
            Ok(())
        }
        AuthOutcome::Redirected { .. } if prompt => {
            eprint!("Paste the URL your browser was sent back to: ");
            let pasted = read_line().await?;

            // The pasted URL carries the token in its fragment.
            let client = client_at(config, store, pasted.trim())?;
            match commands::authorize(&client, options.interactive(false)).await? {
                AuthOutcome::Authorized(source) => {
                    println!("Authorized ({:?})", source);
                    Ok(())
                }
                AuthOutcome::Redirected { .. } => bail!("no token in the pasted URL"),
            }
        }
        AuthOutcome::Redirected { .. } => {
            println!("Then run: trellogate authorize --callback '<url the browser lands on>'");
            Ok(())
        }
    }
}

async fn read_line() -> Result<String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await? {
        Some(line) => Ok(line),
        None => bail!("no callback URL given"),
    }
}

async fn run_status(config: &CliConfig, store: Arc<dyn SecretStore>, verify: bool) -> Result<()> {
    let client = client_at(config, store, &config.callback_url)?;

    if !commands::restore_session(&client).await? {
        println!("Not authorized");
        return Ok(());
    }
    println!("Authorized");

    if verify {
        let me = client
            .get("members/me")
            .param("fields", "username,fullName")
            .await?;
        println!(
            "  Member: {} ({})",
            me["username"].as_str().unwrap_or("?"),
            me["fullName"].as_str().unwrap_or("?")
        );
    }
    Ok(())
}

async fn run_call(
    config: &CliConfig,
    store: Arc<dyn SecretStore>,
    method: &str,
    args: CallArgs,
) -> Result<()> {
    let client = client_at(config, store, &config.callback_url)?;
    let value = commands::call(&client, method, &args.path, args.params).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

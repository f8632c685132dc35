//! PushKit CLI
//!
//! Diagnostics and host tooling for PushKit: key generation, the
//! notification decryption pipeline, stored subscriptions and device
//! registration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

use commands::Context;

#[derive(Parser)]
#[command(name = "pushkit")]
#[command(about = "PushKit CLI - push subscriptions and notification decryption", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory (can also be set via PUSHKIT_DIR env var)
    #[arg(long, global = true)]
    storage_dir: Option<String>,

    /// Config file (defaults to config.json in the storage directory)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an X25519 key pair and print its response topic
    Keygen,

    /// Run the notification pipeline on a push payload and print the content
    Decrypt {
        /// Payload JSON file, or '-' for stdin
        #[arg(short, long, default_value = "-")]
        payload: String,
    },

    /// Encrypt a message under a stored topic key and print the push payload
    Encrypt {
        /// Subscription topic
        #[arg(short, long)]
        topic: String,

        /// Plaintext JSON message
        #[arg(short, long)]
        message: String,

        /// Relay tag to put in the payload
        #[arg(long, default_value = "4002")]
        tag: u32,
    },

    /// Inspect stored subscriptions
    Subscriptions {
        #[command(subcommand)]
        action: SubscriptionAction,
    },

    /// Register a device token with the push server
    Register {
        /// Relay client id
        #[arg(long)]
        client_id: String,

        /// APNs device token
        #[arg(long)]
        token: String,

        /// Project id (overrides the config)
        #[arg(long)]
        project_id: Option<String>,
    },

    /// Remove a device registration from the push server
    Unregister {
        /// Relay client id
        #[arg(long)]
        client_id: String,

        /// Project id (overrides the config)
        #[arg(long)]
        project_id: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SubscriptionAction {
    /// List all active subscriptions
    List,

    /// Show one subscription
    Show {
        /// Subscription topic
        topic: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so piped JSON stays clean. RUST_LOG wins over the
    // built-in filter.
    let filter = if cli.verbose {
        "pushkit_cli=debug,pushkit_lib=debug,pushkit_subscriptions=debug,pushkit_decryption=debug"
    } else {
        "pushkit_cli=info,pushkit_lib=warn,pushkit_subscriptions=warn,pushkit_decryption=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage_dir = cli
        .storage_dir
        .map(std::path::PathBuf::from)
        .or_else(|| std::env::var_os("PUSHKIT_DIR").map(std::path::PathBuf::from))
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join("pushkit")
        });
    // decrypt stands in for the notification extension and must always
    // print content, so a bad config only degrades it to defaults.
    let ctx = match cli.command {
        Commands::Decrypt { .. } => Context::load_or_default(storage_dir, cli.config.as_deref()),
        _ => Context::load(storage_dir, cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Keygen => {
            commands::keys::keygen(&ctx)?;
        }
        Commands::Decrypt { payload } => {
            commands::decrypt::run(&ctx, &payload).await?;
        }
        Commands::Encrypt {
            topic,
            message,
            tag,
        } => {
            commands::keys::encrypt(&ctx, &topic, &message, tag)?;
        }
        Commands::Subscriptions { action } => match action {
            SubscriptionAction::List => {
                commands::subscriptions::list(&ctx)?;
            }
            SubscriptionAction::Show { topic } => {
                commands::subscriptions::show(&ctx, &topic)?;
            }
        },
        Commands::Register {
            client_id,
            token,
            project_id,
        } => {
            commands::register::register(&ctx, &client_id, &token, project_id).await?;
        }
        Commands::Unregister {
            client_id,
            project_id,
            yes,
        } => {
            commands::register::unregister(&ctx, &client_id, project_id, yes).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config::show(&ctx)?;
            }
        },
    }

    Ok(())
}

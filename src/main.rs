use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gator::commands::{self, Session, DEFAULT_BROWSE_LIMIT};
use gator::config::default_config_path;
use gator::storage::DatabaseError;

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "RSS aggregator for the command line")]
struct Args {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, global = true, env = "GATOR_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch to an existing user
    Login { name: String },
    /// Delete all users, feeds and posts
    Reset,
    /// List users
    Users,
    /// Add a feed and follow it
    Addfeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an existing feed
    Follow { url: String },
    /// List the feeds you follow
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: i64,
    },
    /// Poll feeds forever, e.g. `gator agg 1m`
    Agg {
        /// Time between fetches such as 30s, 1m or 1h30m (default: from config)
        interval: Option<String>,
    },
}

/// Completes on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl-C, shutting down gracefully");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path().context("Cannot locate config file")?,
    };

    let mut session = match Session::open(config_path).await {
        Ok(session) => session,
        Err(e)
            if matches!(
                e.root_cause().downcast_ref::<DatabaseError>(),
                Some(DatabaseError::InstanceLocked)
            ) =>
        {
            eprintln!("Error: the gator database is locked by another process.");
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    let mut stdout = std::io::stdout().lock();
    let out = &mut stdout;

    match args.command {
        Command::Register { name } => commands::register(&mut session, &name, out).await?,
        Command::Login { name } => commands::login(&mut session, &name, out).await?,
        Command::Reset => commands::reset(&mut session, out).await?,
        Command::Users => commands::users(&session, out).await?,
        Command::Addfeed { name, url } => commands::addfeed(&session, &name, &url, out).await?,
        Command::Feeds => commands::feeds(&session, out).await?,
        Command::Follow { url } => commands::follow(&session, &url, out).await?,
        Command::Following => commands::following(&session, out).await?,
        Command::Unfollow { url } => commands::unfollow(&session, &url, out).await?,
        Command::Browse { limit } => commands::browse(&session, limit, out).await?,
        Command::Agg { interval } => {
            commands::agg(&session, interval.as_deref(), shutdown_signal(), out).await?;
        }
    }

    Ok(())
}

mod cli;
mod config;
mod error;
mod form;
mod service;
mod store;
mod transcript;
mod user;
mod validation;
mod view;

use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "userdesk", about = "Manage users of a remote REST collection")]
pub struct Args {
    #[arg(short = 'c', long, help = "Run one command and exit (e.g. \"/delete 3\")")]
    pub command: Option<String>,

    #[arg(long, env = "USERDESK_BASE_URL", help = "Service base URL (overrides config)")]
    pub base_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Confirm deletes without prompting")]
    pub yes: bool,

    #[arg(long, help = "Session transcripts directory")]
    pub transcripts_dir: Option<PathBuf>,

    #[arg(long, help = "Do not write a session transcript")]
    pub no_transcript: bool,

    #[arg(long, help = "Debug output (HTTP requests and settings)")]
    pub debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("userdesk=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.debug);

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "ignoring unreadable config");
            config::Config::default()
        })
    };

    // CLI flags take priority over every config file
    if let Some(base_url) = &args.base_url {
        cfg.api.base_url = Some(base_url.clone());
    }
    if let Some(dir) = &args.transcripts_dir {
        cfg.session.transcripts_dir = Some(dir.clone());
    }
    if args.no_transcript {
        cfg.session.transcripts = Some(false);
    }

    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error {}", e);
        }
        return Err(anyhow::anyhow!(
            "Invalid configuration ({} error{})",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
    }

    debug!(
        base_url = cfg.api.base_url(),
        collection = cfg.api.collection(),
        timeout_ms = ?cfg.api.timeout_ms,
        confirm_delete = cfg.ui.confirm_delete(),
        "settings"
    );

    let root = std::env::current_dir()?;
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut transcript = if cfg.session.transcripts_enabled() {
        let transcripts_dir = cfg.session.transcripts_dir(&root);
        std::fs::create_dir_all(&transcripts_dir).with_context(|| {
            format!(
                "Failed to create transcripts directory {}",
                transcripts_dir.display()
            )
        })?;
        let transcript_path = transcripts_dir.join(format!("{}.jsonl", session_id));
        transcript::Transcript::new(&transcript_path, &session_id)?
    } else {
        transcript::Transcript::disabled(&session_id)
    };

    let service = service::HttpUserService::new(
        cfg.api.base_url(),
        cfg.api.collection(),
        cfg.api.timeout(),
    );
    transcript.session_start(service.collection_url())?;

    let ctx = cli::Context::new(args, cfg, Rc::new(service), transcript, session_id);

    if let Some(command) = ctx.args.command.clone() {
        cli::run_once(&ctx, &command)
    } else {
        cli::run_repl(ctx)
    }
}

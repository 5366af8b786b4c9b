//! Command-line interface for ilprobe.

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analyzer::{self, is_failure, Analyzer};
use crate::dispatch::Dispatcher;
use crate::metadata::{SelectionFile, SelectionSource};
use crate::prompt::AnalysisMode;
use crate::report::{self, Speaker};
use crate::settings::{Settings, SettingsStore, API_KEY_ENV};
use crate::tokens;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Ask a remote model about decompiled .NET code.
///
/// ilprobe turns a selection of methods, types, fields and other metadata
/// (exported by a decompiler as JSON) into a complete IL-level description,
/// wraps it in a cheat-exposure or vulnerability analysis prompt, and sends
/// it to an OpenAI-compatible completion endpoint.
#[derive(Parser)]
#[command(name = "ilprobe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: platform config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a free-form message, with the selection (if any) as context
    #[command(visible_alias = "chat")]
    Ask(AskArgs),
    /// Analyze the selection for the mode's findings
    Analyze(AnalyzeArgs),
    /// Print the description that would be sent for a selection
    Preview(PreviewArgs),
    /// Show or change settings
    Config(ConfigArgs),
}

/// Options shared by commands that call the remote service.
#[derive(Parser)]
pub struct RequestArgs {
    /// Selection export (JSON) from the decompiler
    #[arg(short, long)]
    pub selection: Option<PathBuf>,

    /// Analysis mode: cheat (default) or vulnerability
    #[arg(short, long, default_value = "cheat")]
    pub mode: String,

    /// Give up after this many seconds (default: 600)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Parser)]
pub struct AskArgs {
    /// The message to send
    pub message: String,

    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Parser)]
pub struct PreviewArgs {
    /// Selection export (JSON) from the decompiler
    #[arg(short, long)]
    pub selection: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print current settings (API key masked)
    Show,
    /// Set a value: api_key, model, max_tokens, temperature, base_url
    Set { key: String, value: String },
    /// Print the settings file location
    Path,
}

fn settings_store(cli: &Cli) -> anyhow::Result<SettingsStore> {
    match &cli.settings {
        Some(path) => Ok(SettingsStore::new(path.clone())),
        None => Ok(SettingsStore::default_location()?),
    }
}

/// Stored settings with the environment key applied.
fn load_settings(store: &SettingsStore) -> anyhow::Result<Settings> {
    let settings = store.load()?;
    Ok(settings.with_fallback_key(std::env::var(API_KEY_ENV).ok()))
}

/// Load the selection, treating a missing flag as "nothing selected".
fn load_selection(path: Option<&PathBuf>) -> anyhow::Result<SelectionFile> {
    match path {
        Some(p) => {
            let selection = SelectionFile::load(p)?;
            debug!(path = %p.display(), items = selection.len(), "loaded selection");
            Ok(selection)
        }
        None => Ok(SelectionFile::empty()),
    }
}

fn parse_mode(mode: &str) -> Option<AnalysisMode> {
    match mode.parse() {
        Ok(m) => Some(m),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn build_analyzer(mode: AnalysisMode, timeout_secs: Option<u64>) -> Analyzer {
    match timeout_secs {
        Some(secs) => Analyzer::with_dispatcher(
            mode,
            Dispatcher::new().with_timeout(Duration::from_secs(secs)),
        ),
        None => Analyzer::new(mode),
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, canceling request");
            token.cancel();
        }
    });
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

async fn run_request(
    cli: &Cli,
    request: &RequestArgs,
    message: Option<&str>,
) -> anyhow::Result<i32> {
    let Some(mode) = parse_mode(&request.mode) else {
        return Ok(EXIT_ERROR);
    };

    let settings = load_settings(&settings_store(cli)?)?;
    let selection = match load_selection(request.selection.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let nodes = selection.current_selection();
    let analyzer = build_analyzer(mode, request.timeout_secs);
    debug!(mode = %analyzer.mode(), nodes = nodes.len(), "starting analysis");

    let user_message = match message {
        Some(m) => {
            report::write_entry(Speaker::User, m);
            m.to_string()
        }
        None => {
            let m = analyzer.selection_request();
            let preview = analyzer::preview(&nodes);
            report::write_entry(Speaker::User, &format!("{}: {}", m, preview));
            m
        }
    };

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let bar = spinner("Analyzing...");
    let output = analyzer
        .analyze(&user_message, &nodes, &settings, Some(cancel))
        .await;
    bar.finish_and_clear();

    report::write_entry(Speaker::Assistant, &output);

    if is_failure(&output) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the ask command.
pub async fn run_ask(cli: &Cli, args: &AskArgs) -> anyhow::Result<i32> {
    if args.message.trim().is_empty() {
        eprintln!("Error: message must not be empty");
        return Ok(EXIT_ERROR);
    }
    run_request(cli, &args.request, Some(&args.message)).await
}

/// Run the analyze command.
pub async fn run_analyze(cli: &Cli, args: &AnalyzeArgs) -> anyhow::Result<i32> {
    run_request(cli, &args.request, None).await
}

/// Run the preview command.
pub fn run_preview(args: &PreviewArgs) -> anyhow::Result<i32> {
    let selection = match load_selection(args.selection.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let preview = analyzer::preview(&selection.current_selection());
    println!("{}", preview);
    if !tokens::within_ceiling(&preview) {
        eprintln!(
            "{} this selection alone is estimated at {} tokens, above the {} token limit",
            "warning:".yellow().bold(),
            tokens::estimate(&preview),
            tokens::REQUEST_TOKEN_CEILING
        );
    }
    Ok(EXIT_SUCCESS)
}

/// Run the config command.
pub fn run_config(cli: &Cli, args: &ConfigArgs) -> anyhow::Result<i32> {
    let store = settings_store(cli)?;

    match &args.action {
        ConfigAction::Show => {
            let settings = load_settings(&store)?;
            report::write_settings(&settings, store.path());
        }
        ConfigAction::Set { key, value } => {
            let mut settings = store.load()?;
            if let Err(e) = settings.set(key, value) {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
            store.save(&settings)?;
            println!("Updated {} in {}", key, store.path().display());
        }
        ConfigAction::Path => println!("{}", store.path().display()),
    }

    Ok(EXIT_SUCCESS)
}

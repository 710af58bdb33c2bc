//! pstop - an interactive process explorer
//!
//! Runs the live terminal view by default, or a one-shot subcommand
//! (`list`, `top`, `find`, `tree`, `info`, `kill`, `dev`, `watch`, `crashes`).

mod app;
mod cli;
mod core;
mod platform;
mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal as NixSignal};
use tracing::{info, warn, Level};

use crate::app::Controller;
use crate::cli::CliCommand;
use crate::core::{Settings, SortKey, Tab};
use crate::ui::{Crt, ScreenManager};

/// Static flag for clean shutdown
static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// pstop - an interactive process explorer
#[derive(Parser, Debug)]
#[command(name = "pstop", version)]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,

    /// Print subcommand output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Set the delay between updates, in tenths of seconds
    #[arg(short = 'd', long = "delay", value_name = "DELAY")]
    delay: Option<u32>,

    /// Sort by COLUMN: cpu, mem, pid, name
    #[arg(short = 's', long = "sort-key", value_name = "COLUMN")]
    sort_key: Option<String>,

    /// Start in the tree view
    #[arg(short = 't', long = "tree")]
    tree: bool,

    /// Use a monochrome color scheme
    #[arg(short = 'C', long = "no-color")]
    no_color: bool,

    /// Show only processes matching the given filter
    #[arg(short = 'F', long = "filter", value_name = "FILTER")]
    filter: Option<String>,

    /// Tab to open on: all, top, dev
    #[arg(long = "tab", value_name = "TAB")]
    tab: Option<String>,

    /// Disable killing processes from the interactive view
    #[arg(long = "readonly")]
    readonly: bool,

    /// Write logs of the interactive view to this file
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log verbosity
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Print a shell completion script and exit
    #[arg(long = "generate-completion", hide = true, value_enum, value_name = "SHELL")]
    generate_completion: Option<Shell>,
}

/// Subcommands log to stderr. The interactive view owns the terminal, so it
/// only logs when a log file is configured.
fn setup_logging(level: Level, interactive: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let result = if interactive {
        let Some(path) = log_file else {
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let subscriber = builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = builder.with_writer(std::io::stderr).finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    result.context("failed to set tracing subscriber")?;
    info!(?level, "logging initialized");
    Ok(())
}

extern "C" fn stop_running(_: std::ffi::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

/// SIGINT and SIGTERM clear `RUNNING` so the view or `watch` can exit cleanly
fn install_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(stop_running),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe
    unsafe {
        sigaction(NixSignal::SIGINT, &action)?;
        sigaction(NixSignal::SIGTERM, &action)?;
    }
    Ok(())
}

fn apply_args(settings: &mut Settings, args: &Args) -> Result<()> {
    if let Some(delay) = args.delay {
        settings.delay = delay.clamp(1, 100);
    }
    if let Some(ref key) = args.sort_key {
        settings.sort_key = SortKey::from_name(key)
            .with_context(|| format!("unknown sort key: {} (use cpu, mem, pid, name)", key))?;
    }
    if let Some(ref tab) = args.tab {
        settings.start_tab = Tab::from_name(tab)
            .with_context(|| format!("unknown tab: {} (use all, top, dev)", tab))?;
    }
    if args.tree {
        settings.tree_view = true;
    }
    if args.no_color {
        settings.color = false;
    }
    if args.readonly {
        settings.readonly = true;
    }
    if args.log_file.is_some() {
        settings.log_file = args.log_file.clone();
    }
    Ok(())
}

fn write_completion(shell: Shell, out: &mut dyn std::io::Write) {
    clap_complete::generate(shell, &mut Args::command(), "pstop", out);
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(shell) = args.generate_completion {
        write_completion(shell, &mut std::io::stdout());
        return Ok(());
    }

    if let Err(e) = install_signal_handlers() {
        eprintln!("Warning: Failed to install signal handlers: {}", e);
    }

    let mut settings = Settings::new();
    let load_result = settings.load();
    apply_args(&mut settings, &args)?;

    let interactive = args.command.is_none();
    setup_logging(args.log_level.into(), interactive, settings.log_file.as_ref())?;
    if let Err(e) = load_result {
        warn!(error = %e, "failed to load settings");
    }

    let provider = platform::native();

    if let Some(command) = args.command {
        return cli::run(command, args.json, &*provider, &RUNNING);
    }

    let mut crt = Crt::new(&settings)?;

    let mut controller = Controller::new(settings);
    if let Some(ref filter) = args.filter {
        controller.set_filter(filter);
    }

    let mut screen_manager = ScreenManager::new(controller, provider);
    let result = screen_manager.run(&mut crt, &RUNNING);
    let settings = screen_manager.into_settings();

    // Restore the terminal before anything else is printed
    drop(crt);

    if settings.changed && !settings.readonly {
        if let Err(e) = settings.write() {
            eprintln!("Warning: Failed to save settings: {}", e);
        }
    }

    result
}

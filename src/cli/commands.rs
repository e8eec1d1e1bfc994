use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use http::Method;
use tracing::{info, warn};

use crate::descriptor::load_descriptor;
use crate::dispatcher::Dispatcher;
use crate::hot_reload::watch_descriptor;
use crate::middleware::TracingMiddleware;
use crate::runtime_config::RuntimeConfig;

/// Command-line interface for the sub-resource dispatcher
#[derive(Parser)]
#[command(name = "subrouter")]
#[command(about = "Sub-resource locator dispatcher", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch one request and print the outcome
    Dispatch {
        /// Path to the descriptor file (YAML or JSON)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// HTTP method, e.g. GET
        method: String,

        /// Request path, e.g. /users/42
        path: String,
    },
    /// List the routes of every registered class
    Routes {
        /// Path to the descriptor file (YAML or JSON)
        #[arg(short, long)]
        descriptor: PathBuf,
    },
    /// Dispatch `METHOD PATH` lines read from stdin
    Serve {
        /// Path to the descriptor file (YAML or JSON)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Watch the descriptor and redeploy on change
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
}

/// Parse the process arguments and run the command against stdio.
///
/// # Errors
///
/// Returns an error if the descriptor cannot be loaded or built, a request
/// line is malformed, or writing the output fails.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_command(&cli.command, stdin.lock(), &mut stdout.lock())
}

/// Run `command`, reading request lines from `input` and writing JSON to `out`.
pub fn run_command(
    command: &Commands,
    input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Dispatch {
            descriptor,
            method,
            path,
        } => {
            let dispatcher = build_dispatcher(descriptor)?;
            let method = parse_method(method)?;
            let outcome = dispatcher.dispatch(method, path);
            writeln!(out, "{}", serde_json::to_string_pretty(&outcome.to_json())?)?;
            Ok(())
        }
        Commands::Routes { descriptor } => {
            let dispatcher = build_dispatcher(descriptor)?;
            let routes = dispatcher.deployment().dump_routes();
            writeln!(out, "{}", serde_json::to_string_pretty(&routes)?)?;
            Ok(())
        }
        Commands::Serve { descriptor, watch } => {
            let dispatcher = Arc::new(build_dispatcher(descriptor)?);
            let _watcher = if *watch {
                let watcher = watch_descriptor(descriptor, Arc::clone(&dispatcher))
                    .with_context(|| format!("failed to watch {}", descriptor.display()))?;
                info!(path = %descriptor.display(), "Watching descriptor for changes");
                Some(watcher)
            } else {
                None
            };
            serve_lines(&dispatcher, input, out)
        }
    }
}

fn build_dispatcher(descriptor: &Path) -> anyhow::Result<Dispatcher> {
    let deployment = load_descriptor(descriptor)?.into_deployment(RuntimeConfig::from_env())?;
    let mut dispatcher = Dispatcher::new(deployment);
    dispatcher.add_middleware(Arc::new(TracingMiddleware::new()));
    Ok(dispatcher)
}

fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method '{method}'"))
}

fn parse_request_line(line: &str) -> anyhow::Result<(Method, String)> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), None) => Ok((parse_method(method)?, path.to_owned())),
        _ => Err(anyhow!("expected 'METHOD PATH', got '{line}'")),
    }
}

fn serve_lines(
    dispatcher: &Arc<Dispatcher>,
    input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (method, path) = match parse_request_line(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Skipping malformed request line");
                continue;
            }
        };
        // SAFETY: may::coroutine spawning is marked unsafe by the may runtime.
        // The dispatch closure owns its context and invokers hold no
        // thread-local state across yields.
        let pending = unsafe { dispatcher.spawn(method, &path) }?;
        let outcome = pending.join()?;
        writeln!(out, "{}", serde_json::to_string(&outcome.to_json())?)?;
    }
    Ok(())
}

#[cfg(test)]
pub(super) fn request_line(line: &str) -> anyhow::Result<(Method, String)> {
    parse_request_line(line)
}

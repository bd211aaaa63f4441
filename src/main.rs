//! shellmux - drive prompt-based shell processes from the command line
//!
//! Reads lines from stdin and types them into the current session. Lines
//! starting with `:` are manager commands that exercise the background
//! request path the explorer and editor panels use.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use shellmux::config::loader::ConfigLoader;
use shellmux::events::{SessionEvent, SessionEventSubscription};
use shellmux::listing::parse_listing;
use shellmux::models::{RequestKind, SessionId};
use shellmux::process::ChildProcessSpawner;
use shellmux::runtime::{self, ManagerHandle};
use shellmux::Config;

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Override for the session executable
    executable: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Print events as JSON lines
    json: bool,
}

impl AppArgs {
    fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut app_args = AppArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let path = args.get(i + 1).ok_or_else(|| anyhow!("Missing config file path"))?;
                    app_args.config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--executable" | "-e" => {
                    let path = args.get(i + 1).ok_or_else(|| anyhow!("Missing executable path"))?;
                    app_args.executable = Some(PathBuf::from(path));
                    i += 1;
                }
                "--debug" | "-d" => app_args.debug = true,
                "--json" => app_args.json = true,
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("{} v{}", shellmux::NAME, shellmux::VERSION);
                    process::exit(0);
                }
                arg => return Err(anyhow!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        Ok(app_args)
    }
}

fn print_help() {
    println!("shellmux - session multiplexer for prompt-based shells");
    println!();
    println!("USAGE:");
    println!("    shellmux [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>      Path to configuration file");
    println!("    -e, --executable <PATH>  Executable started for each session");
    println!("    -d, --debug              Enable debug logging");
    println!("        --json               Print session events as JSON lines");
    println!("    -h, --help               Print this help message");
    println!("    -v, --version            Print version information");
    println!();
    println!("COMMANDS (typed on stdin):");
    println!("    :ls                 List the current directory in the background");
    println!("    :cd <path>          Change directory in the background");
    println!("    :cat <path>         Read a file in the background");
    println!("    :write <path> <text>  Write a file (\\n in text starts a new line)");
    println!("    :run <command>      Run any command in the background");
    println!("    :new | :close       Open or close a tab");
    println!("    :tab <n>            Switch to tab n (1-based)");
    println!("    :restart            Restart the current tab's process");
    println!("    :refresh            Ask collaborators to list the directory again");
    println!("    :tabs               Show all tabs");
    println!("    :quit               Exit");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG            Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_configuration(args: &AppArgs) -> Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => ConfigLoader::new()
            .load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => shellmux::init().context("loading configuration")?,
    };
    if let Some(executable) = &args.executable {
        config.process.executable = executable.clone();
    }
    config.validate().context("validating configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("{}", e);
        print_help();
        process::exit(2);
    });
    init_logging(args.debug);
    info!("Starting {} v{}", shellmux::NAME, shellmux::VERSION);

    let config = load_configuration(&args)?;
    let spawner = Arc::new(ChildProcessSpawner::new(config.process.clone()));
    let (handle, dispatcher) = runtime::start(&config, spawner)?;

    let printer = tokio::spawn(print_events(handle.subscribe(), handle.clone(), args.json));
    if let Some(id) = handle.current_session().await? {
        if let Some(transcript) = handle.transcript(&id).await? {
            print!("{}", transcript);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match handle_line(&handle, &line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{}", e),
        }
    }

    handle.shutdown().await?;
    if let Err(e) = dispatcher.await {
        error!("Dispatcher task failed: {}", e);
    }
    printer.abort();
    Ok(())
}

/// Apply one stdin line; returns false on `:quit`
async fn handle_line(handle: &ManagerHandle, line: &str) -> shellmux::Result<bool> {
    let Some(meta) = line.strip_prefix(':') else {
        handle.send_line(&current_id(handle).await?, line).await?;
        return Ok(true);
    };

    let (command, rest) = meta.split_once(' ').unwrap_or((meta, ""));
    let rest = rest.trim();
    match command {
        "ls" => handle.list_directory().await?,
        "cd" => handle.change_directory(rest).await?,
        "cat" => handle.read_file(rest).await?,
        "write" => {
            let (path, text) = rest.split_once(' ').unwrap_or((rest, ""));
            handle.write_file(path, &text.replace("\\n", "\n")).await?;
        }
        "run" => handle.execute_background_command(rest, RequestKind::Other).await?,
        "new" => {
            handle.create_session().await?;
        }
        "close" => handle.destroy_session(&current_id(handle).await?).await?,
        "restart" => handle.restart_session(&current_id(handle).await?).await?,
        "refresh" => handle.request_directory_refresh().await?,
        "tab" => {
            let index: usize = rest.parse().unwrap_or(0);
            let snapshots = handle.snapshots().await?;
            match index.checked_sub(1).and_then(|i| snapshots.get(i)) {
                Some(snapshot) => handle.set_current_session(&snapshot.id).await?,
                None => eprintln!("No tab {}", rest),
            }
        }
        "tabs" => {
            let current = handle.current_session().await?;
            for (i, snapshot) in handle.snapshots().await?.iter().enumerate() {
                let marker = if Some(&snapshot.id) == current.as_ref() { "*" } else { " " };
                println!(
                    "{}{} {} {} {}",
                    marker,
                    i + 1,
                    snapshot.id.short(),
                    snapshot.mode,
                    snapshot.current_path
                );
            }
        }
        "quit" | "q" => return Ok(false),
        other => eprintln!("Unknown command :{}", other),
    }
    Ok(true)
}

async fn current_id(handle: &ManagerHandle) -> shellmux::Result<SessionId> {
    handle
        .current_session()
        .await?
        .ok_or(shellmux::Error::NoActiveSession)
}

/// Print transcript output of the current tab and background results
async fn print_events(mut events: SessionEventSubscription, handle: ManagerHandle, json: bool) {
    let mut current: Option<SessionId> = handle.current_session().await.ok().flatten();

    while let Some(event) = events.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Could not serialize event: {}", e),
            }
            continue;
        }

        match event {
            SessionEvent::CurrentChanged { session_id } => {
                println!("--- tab {} ---", session_id.short());
                current = Some(session_id);
            }
            SessionEvent::Output { session_id, text, .. }
                if Some(&session_id) == current.as_ref() =>
            {
                print!("{}", text);
            }
            SessionEvent::Notice {
                session_id,
                message,
            } if Some(&session_id) == current.as_ref() => {
                println!("[shellmux] {}", message);
            }
            SessionEvent::RequestCompleted(completion) => {
                if !completion.success {
                    println!(
                        "[{}] failed: {}",
                        completion.kind,
                        completion.error_message.unwrap_or_default()
                    );
                } else if completion.kind == RequestKind::ListDirectory {
                    for entry in parse_listing(&completion.text) {
                        let marker = if entry.is_directory() { "/" } else { "" };
                        println!("  {}{}  {}  {}", entry.name, marker, entry.owner, entry.modified);
                    }
                } else {
                    println!("[{}] {}", completion.target, completion.text.trim_end());
                }
            }
            SessionEvent::DirectoryRefreshRequested => {
                debug!("Directory refresh requested");
                if let Err(e) = handle.list_directory().await {
                    warn!("Refresh listing rejected: {}", e);
                }
            }
            _ => {}
        }
        let _ = std::io::stdout().flush();
    }
}

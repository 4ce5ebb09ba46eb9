//! lql - answer Livestatus queries about a monitoring core

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use lql::cli::{init_logging, Args, SubCommand};
use lql::config::Config;
use lql::engine::ExecutionContext;
use lql::eventconsole::EventConsoleClient;
use lql::monitoring::{LiveCore, PipeCommandSink, Snapshot};
use lql::server::{ResponseCode, Server, SnapshotWatcher, Store};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the command succeeded
fn run(args: Args) -> anyhow::Result<bool> {
    let config = args.load_config().context("cannot load configuration")?;
    match &args.command {
        SubCommand::Serve { .. } => serve(config).map(|_| true),
        SubCommand::Query { request } => {
            let text = match request {
                Some(text) => text.clone(),
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("cannot read request from stdin")?;
                    text
                }
            };
            answer_once(&config, &text)
        }
        SubCommand::Tables { table } => {
            let mut text = String::from("GET columns\nColumns: table name type description\nColumnHeaders: on\n");
            if let Some(table) = table {
                text.push_str(&format!("Filter: table = {}\n", table));
            }
            answer_once(&config, &text)
        }
    }
}

fn load_core(config: &Config) -> anyhow::Result<LiveCore> {
    let Some(path) = &config.snapshot else {
        bail!("no snapshot file configured, use --snapshot or set `snapshot` in the configuration file");
    };
    let snapshot = Snapshot::load(path)
        .with_context(|| format!("cannot load snapshot {}", path.display()))?;
    let core = LiveCore::new(snapshot);
    Ok(match &config.command_pipe {
        Some(pipe) => core.with_command_sink(PipeCommandSink::new(pipe.clone())),
        None => core,
    })
}

fn make_store(config: &Config, core: Arc<LiveCore>, shutdown: Arc<AtomicBool>) -> Store {
    let ctx = ExecutionContext {
        authorization: config.authorization.clone(),
        max_response_size: config.max_response_size,
        shutdown,
    };
    Store::new(core, ctx, EventConsoleClient::from_config(&config.event_console))
}

/// Answer a single request against the snapshot and print the response
fn answer_once(config: &Config, text: &str) -> anyhow::Result<bool> {
    let core = Arc::new(load_core(config)?);
    let store = make_store(config, core, Arc::new(AtomicBool::new(false)));
    let answer = store.answer_request(text, &|| false);
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(answer.output.as_bytes())
        .and_then(|_| stdout.flush())
        .context("cannot write response")?;
    Ok(answer.code == ResponseCode::Ok)
}

fn serve(config: Config) -> anyhow::Result<()> {
    info!("lql {} starting", env!("CARGO_PKG_VERSION"));
    let core = Arc::new(load_core(&config)?);
    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let shutdown = Arc::clone(&shutdown);
        let core = Arc::clone(&core);
        ctrlc::set_handler(move || {
            info!("shutting down");
            shutdown.store(true, Ordering::SeqCst);
            core.triggers().notify_all_kinds();
        })
        .context("cannot install Ctrl+C handler")?;
    }

    let reloader = match &config.snapshot {
        Some(path) => Some(
            SnapshotWatcher::new(Arc::clone(&core), path.clone())
                .spawn(
                    Duration::from_secs(config.reload_interval_secs.max(1)),
                    Arc::clone(&shutdown),
                )
                .context("cannot start snapshot watcher")?,
        ),
        None => None,
    };

    let store = Arc::new(make_store(&config, core, Arc::clone(&shutdown)));
    let server = Server::bind(store, &config, shutdown)
        .with_context(|| format!("cannot listen on {}", config.socket_path.display()))?;
    server.run().context("server failed")?;

    if let Some(reloader) = reloader {
        if reloader.join().is_err() {
            warn!("snapshot watcher panicked");
        }
    }
    info!("lql stopped");
    Ok(())
}

//! # clrtree - Main Entry Point
//!
//! Probes the target for loaded CLR versions, runs the rundown sessions on a
//! worker thread and prints the resulting runtime tree as text or JSON.
//!
//! The worker blocks inside the trace pump, so it runs on a plain thread
//! and hands its result back over a oneshot channel. Ctrl+C and `--timeout`
//! cancel the pump at the next record, or stop the `PhDnLogger` session if
//! no record arrives within the grace period.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use std::io::{self, BufWriter};
use std::time::Duration;
use tokio::sync::oneshot;

use clrtree::cli::{Args, OutputFormat};
use clrtree::domain::{Pid, ProbeError, TraceError};
use clrtree::export::{write_json, write_text};
use clrtree::inspect::{Inspection, Inspector};
use clrtree::probe::NativeModuleSource;
use clrtree::processor::Progress;
use clrtree::session::{stop_session_by_name, CancelToken, NativeBackend, TraceSessionController};
use clrtree_common::LOGGER_NAME;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_UNAVAILABLE: i32 = 69;
const EXIT_NOPERM: i32 = 77;

/// How long a cancelled worker gets to hand back a partial tree
const CANCEL_GRACE: Duration = Duration::from_secs(2);

type WorkerResult = Result<Inspection, ProbeError>;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TraceError>() {
        Some(TraceError::Unsupported) => EXIT_UNAVAILABLE,
        Some(TraceError::AccessDenied) => EXIT_NOPERM,
        _ => EXIT_ERROR,
    }
}

/// Print progress notifications until the worker drops its sender
fn spawn_progress_printer(rx: crossbeam_channel::Receiver<Progress>, quiet: bool) {
    std::thread::spawn(move || {
        for progress in rx {
            match progress {
                Progress::SessionStarted(generation) if !quiet => {
                    eprintln!("tracing: {generation}");
                }
                Progress::SessionFinished(summary) if !quiet => {
                    eprintln!("  {} records", summary.records);
                }
                Progress::NodeCreated(text) => debug!("+ {text}"),
                _ => {}
            }
        }
    });
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let pid = Pid(args.pid);
    let quiet = args.quiet;

    if !quiet {
        eprintln!("clrtree v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("pid: {}", pid.0);
    }

    let cancel = CancelToken::new();
    let (progress_tx, progress_rx) = bounded(256);
    spawn_progress_printer(progress_rx, quiet);

    // ── Worker: probe + sessions ───────────────────────────────────────
    let (result_tx, mut result_rx) = oneshot::channel();
    let worker_cancel = cancel.clone();
    std::thread::spawn(move || {
        let controller = TraceSessionController::new(NativeBackend::default());
        let mut inspector = Inspector::new(controller, NativeModuleSource::default())
            .with_cancel(worker_cancel)
            .with_progress(progress_tx);
        let _ = result_tx.send(inspector.run(pid));
    });

    let deadline = async {
        if args.timeout == 0 {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(Duration::from_secs(args.timeout)).await;
        }
    };

    let outcome = tokio::select! {
        result = &mut result_rx => result.context("Inspection worker exited unexpectedly")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling rundown");
            cancel_worker(&cancel, &mut result_rx)
                .await
                .context("Interrupted before any rundown data arrived")?
        }
        () = deadline => {
            info!("Timeout reached, cancelling rundown");
            cancel_worker(&cancel, &mut result_rx)
                .await
                .with_context(|| format!("No rundown completed within {}s", args.timeout))?
        }
    };

    let inspection = outcome.with_context(|| format!("Failed to inspect {pid}"))?;
    report(&inspection, &args)
}

/// Cancel the worker and collect whatever it gathered
///
/// A worker still running after the grace period is blocked on a session
/// that delivers no records; stopping that session makes its pump return.
async fn cancel_worker(
    cancel: &CancelToken,
    result_rx: &mut oneshot::Receiver<WorkerResult>,
) -> Result<WorkerResult> {
    cancel.cancel();
    if let Ok(result) = tokio::time::timeout(CANCEL_GRACE, &mut *result_rx).await {
        return result.context("Inspection worker exited unexpectedly");
    }

    warn!("Rundown worker still blocked, stopping session {LOGGER_NAME}");
    if let Err(e) = stop_session_by_name(&mut NativeBackend::default(), LOGGER_NAME) {
        warn!("Failed to stop session {LOGGER_NAME}: {e}");
    }
    tokio::time::timeout(CANCEL_GRACE, result_rx)
        .await
        .context("Rundown worker did not stop")?
        .context("Inspection worker exited unexpectedly")
}

fn report(inspection: &Inspection, args: &Args) -> Result<()> {
    if !args.quiet {
        let stats = &inspection.stats;
        eprintln!("CLR versions: {}", inspection.versions);
        eprintln!(
            "{} sessions, {} events (created: {}, duplicates: {}, orphans: {}, malformed: {}, foreign: {}, other provider: {})",
            inspection.sessions.len(),
            stats.events,
            stats.created,
            stats.duplicates,
            stats.orphans,
            stats.malformed,
            stats.foreign,
            stats.other_provider,
        );
    }

    let stdout = BufWriter::new(io::stdout().lock());
    match args.format {
        OutputFormat::Json => write_json(inspection, stdout).context("Failed to write JSON")?,
        // The error replaces the tree and is reported on stderr
        OutputFormat::Text if inspection.error.is_some() => {}
        OutputFormat::Text => write_text(inspection, stdout).context("Failed to write tree")?,
    }

    match &inspection.error {
        Some(error) => Err(error.clone().into()),
        None => Ok(()),
    }
}

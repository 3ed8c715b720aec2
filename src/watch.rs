//! Watch mode: regenerate whenever a source file under the Convex directory changes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::errors::ConfectTypegenError;
use crate::scan::{in_excluded_dir, is_source_file};
use crate::{generate, Configuration};

/// Quiet period after the last change before regenerating.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Runs the pipeline once, then again after every burst of source changes
/// until Ctrl+C.
///
/// # Errors
/// Fails if the Convex directory is missing or the watcher cannot be
/// registered. Failed regenerations are logged and watching continues.
pub async fn watch(config: &Configuration) -> Result<(), ConfectTypegenError>
{
    if !config.convex_dir.is_dir() {
        return Err(ConfectTypegenError::MissingConvexDir(config.convex_dir.clone()));
    }
    let root = config
        .convex_dir
        .canonicalize()
        .map_err(|e| ConfectTypegenError::from(e).with_file_context(config.convex_dir.display().to_string()))?;

    regenerate(config);

    let (tx, rx) = mpsc::channel(100);
    let watch_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => forward_event(&event, &watch_root, &tx),
            Err(e) => error!("Watch error: {e}"),
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("👀 Watching {} for changes (Ctrl+C to stop)", root.display());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
    };
    let runs = debounce(rx, DEBOUNCE_DELAY, shutdown, || regenerate(config)).await;

    if let Err(e) = watcher.unwatch(&root) {
        warn!("⚠️  Failed to release watch on {}: {e}", root.display());
    }
    drop(watcher);

    info!("Stopped watching after {runs} regeneration(s)");
    Ok(())
}

/// Coalesces change notifications and calls `run` once per burst.
///
/// The deadline is pushed back by `delay` on every event, so `run` fires
/// `delay` after the last event of a burst. `run` executes inline, so runs
/// never overlap. Returns when `shutdown` resolves (a pending burst is
/// dropped) or the channel closes (a pending burst is flushed). Returns
/// the number of runs.
pub async fn debounce<S, F>(mut rx: mpsc::Receiver<PathBuf>, delay: Duration, shutdown: S, mut run: F) -> usize
where
    S: Future<Output = ()>,
    F: FnMut(),
{
    tokio::pin!(shutdown);
    let mut deadline: Option<Instant> = None;
    let mut runs = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Shutdown requested");
                break;
            }
            event = rx.recv() => match event {
                Some(path) => {
                    debug!("Change detected: {}", path.display());
                    deadline = Some(Instant::now() + delay);
                }
                None => {
                    if deadline.take().is_some() {
                        run();
                        runs += 1;
                    }
                    break;
                }
            },
            _ = wait_for(deadline) => {
                deadline = None;
                run();
                runs += 1;
            }
        }
    }

    runs
}

async fn wait_for(deadline: Option<Instant>)
{
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn regenerate(config: &Configuration)
{
    if let Err(e) = generate(config) {
        error!("❌ Generation failed: {e}");
    }
}

fn forward_event(event: &Event, root: &Path, tx: &mpsc::Sender<PathBuf>)
{
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
        return;
    }

    for path in &event.paths {
        if is_relevant_change(path, root) {
            let _ = tx.blocking_send(path.clone());
        }
    }
}

/// Source files under `root` that are not inside an excluded directory.
fn is_relevant_change(path: &Path, root: &Path) -> bool
{
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    is_source_file(path) && !in_excluded_dir(relative)
}

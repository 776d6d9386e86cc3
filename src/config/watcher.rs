//! Hot reload for the admission config file.

use crate::config::PolicyCache;
use crate::config::loader::load_admission_config_from_file;
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Watch the admission config file and swap in new snapshots as it changes.
///
/// Modify/Create events trigger a reload; a file that fails to load or
/// validate leaves the current snapshot in place. The swap is atomic:
/// in-flight requests finish against the old snapshot, later ones see the
/// new one.
pub async fn watch_config_file(
    path: PathBuf,
    shared_cache: Arc<ArcSwap<PolicyCache>>,
) -> Result<(), notify::Error> {
    let (tx, mut rx) = mpsc::channel::<Event>(8);

    // notify runs its callback on a dedicated thread; forward only the
    // events worth acting on.
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                let _ = tx.blocking_send(event);
            }
            Ok(event) => debug!("Ignoring filesystem event: {:?}", event.kind),
            Err(e) => {
                crate::metrics::record_config_reload(false);
                error!("Config watch error: {}", e);
            }
        },
        notify::Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    info!("Watching config file for changes: {}", path.display());

    while let Some(event) = rx.recv().await {
        debug!("Config file change detected: {:?}", event.kind);
        reload(&path, &shared_cache).await;
    }

    Ok(())
}

/// Reload, validate, and atomically publish a new snapshot.
async fn reload(path: &Path, shared_cache: &Arc<ArcSwap<PolicyCache>>) {
    match load_admission_config_from_file(path).await {
        Ok(config) => {
            // Buckets created under the old policies keep them until the
            // idle sweep retires them.
            shared_cache.store(Arc::new(PolicyCache::new(config)));
            crate::metrics::record_config_reload(true);
            info!("Configuration hot-reloaded from {}", path.display());
        }
        Err(e) => {
            crate::metrics::record_config_reload(false);
            error!(
                "Rejected new configuration from '{}': {}. Keeping old config.",
                path.display(),
                e
            );
        }
    }
}

//! # Hot Reload Module
//!
//! Watches a descriptor file and swaps a freshly built deployment into a
//! running [`Dispatcher`] when the file changes.
//!
//! ```rust,ignore
//! use subrouter::hot_reload::watch_descriptor;
//!
//! let dispatcher = Arc::new(Dispatcher::new(deployment));
//! let _watcher = watch_descriptor("routes.yaml", Arc::clone(&dispatcher))?;
//! // keep `_watcher` alive for as long as reloads are wanted
//! ```
//!
//! If the new descriptor fails to parse or build, the error is logged and
//! the previous deployment stays active. Requests already in flight finish
//! on the deployment they started with.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::descriptor::load_descriptor;
use crate::dispatcher::Dispatcher;
use crate::runtime_config::RuntimeConfig;

/// Reload `path` and redeploy it into `dispatcher`.
///
/// Returns the number of registered classes in the new deployment.
pub fn reload_descriptor(path: &Path, dispatcher: &Dispatcher) -> anyhow::Result<usize> {
    let deployment = load_descriptor(path)?.into_deployment(RuntimeConfig::from_env())?;
    let classes = deployment.table().registered_classes().len();
    dispatcher.redeploy(deployment);
    Ok(classes)
}

/// Watch a descriptor file and redeploy into `dispatcher` whenever it changes.
pub fn watch_descriptor<P>(
    descriptor_path: P,
    dispatcher: Arc<Dispatcher>,
) -> notify::Result<RecommendedWatcher>
where
    P: AsRef<Path>,
{
    let path: PathBuf = descriptor_path.as_ref().to_path_buf();
    let watch_path = path.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    match reload_descriptor(&watch_path, &dispatcher) {
                        Ok(classes) => info!(
                            path = %watch_path.display(),
                            classes,
                            "hot-reload: deployment replaced"
                        ),
                        Err(e) => error!(
                            path = %watch_path.display(),
                            error = %format!("{e:#}"),
                            "hot-reload: keeping previous deployment"
                        ),
                    }
                }
            }
            Err(e) => error!(error = %e, "hot-reload: watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::io::Write;

    const V1: &str = "roots: [Root]\nclasses:\n  - name: Root\n    resources:\n      - { method: GET, path: /one, id: one }\n";
    const V2: &str = "roots: [Root]\nclasses:\n  - name: Root\n    resources:\n      - { method: GET, path: /two, id: two }\n";

    fn write(path: &Path, text: &str) {
        let mut file = std::fs::File::create(path).expect("create");
        file.write_all(text.as_bytes()).expect("write");
    }

    #[test]
    fn test_reload_swaps_deployment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("routes.yaml");
        write(&path, V1);
        let deployment = load_descriptor(&path)
            .and_then(|d| d.into_deployment(RuntimeConfig::default()))
            .expect("v1");
        let dispatcher = Dispatcher::new(deployment);
        assert_eq!(dispatcher.dispatch(Method::GET, "/one").status(), 200);

        write(&path, V2);
        assert_eq!(reload_descriptor(&path, &dispatcher).expect("v2"), 1);
        assert_eq!(dispatcher.dispatch(Method::GET, "/one").status(), 404);
        assert_eq!(dispatcher.dispatch(Method::GET, "/two").status(), 200);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("routes.yaml");
        write(&path, V1);
        let deployment = load_descriptor(&path)
            .and_then(|d| d.into_deployment(RuntimeConfig::default()))
            .expect("v1");
        let dispatcher = Dispatcher::new(deployment);

        write(&path, "roots: [\n");
        assert!(reload_descriptor(&path, &dispatcher).is_err());
        assert_eq!(dispatcher.dispatch(Method::GET, "/one").status(), 200);
    }
}

//! Resource scope: cleanup registry and temp arena for one invocation.
//!
//! The scope owns a private temp directory (the arena) and an ordered list of
//! cleanup actions. `drain` runs the actions last-registered-first, exactly
//! once, and never stops at a failing action. Removing the arena is the first
//! action registered, so it always runs last.
//!
//! If the scope is dropped without draining, the arena is still removed by
//! the `TempDir` captured in its cleanup action; other pending actions are
//! skipped with a warning.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tempfile::{Builder, NamedTempFile, TempDir};

use crate::domain::env::{EnvPatch, TEMP_ROOT_VAR};
use crate::infra::fs::{PRIVATE_FILE_MODE, set_permissions};

/// Boxed future returned by a cleanup action.
pub type CleanupFuture = Pin<Box<dyn Future<Output = Result<()>>>>;

type CleanupAction = Box<dyn FnOnce() -> CleanupFuture + Send>;

/// Label of the arena removal action.
pub const ARENA_CLEANUP: &str = "remove temp arena";

const ARENA_PREFIX: &str = "opskit.";

struct Cleanup {
    label: String,
    action: CleanupAction,
}

/// A cleanup action that failed during `drain`.
#[derive(Debug)]
pub struct CleanupFailure {
    pub label: String,
    pub error: anyhow::Error,
}

/// What `drain` did, in execution order.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub executed: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Creation options passed through to the temp file builder.
#[derive(Debug, Clone, Default)]
pub struct TempOptions {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Unix permission bits applied after creation.
    pub mode: Option<u32>,
}

impl TempOptions {
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Cleanup registry plus temp arena, shared by everything in one invocation.
pub struct ResourceScope {
    root: PathBuf,
    actions: Mutex<Vec<Cleanup>>,
    claims: Mutex<BTreeSet<String>>,
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceScope")
            .field("root", &self.root)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl ResourceScope {
    /// Creates a scope with its arena under the system temp directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena directory cannot be created.
    pub fn new() -> Result<Arc<Self>> {
        let arena = Builder::new()
            .prefix(ARENA_PREFIX)
            .tempdir()
            .context("cannot create temp arena")?;
        Ok(Self::with_arena(arena))
    }

    /// Creates a scope with its arena under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena directory cannot be created.
    pub fn new_in(parent: &Path) -> Result<Arc<Self>> {
        let arena = Builder::new()
            .prefix(ARENA_PREFIX)
            .tempdir_in(parent)
            .with_context(|| format!("cannot create temp arena in {}", parent.display()))?;
        Ok(Self::with_arena(arena))
    }

    fn with_arena(arena: TempDir) -> Arc<Self> {
        let root = arena.path().to_path_buf();
        tracing::debug!(root = %root.display(), "temp arena created");
        let scope = Arc::new(Self {
            root,
            actions: Mutex::new(Vec::new()),
            claims: Mutex::new(BTreeSet::new()),
        });
        scope.trigger(ARENA_CLEANUP, move || async move {
            arena.close().context("cannot remove temp arena")
        });
        scope
    }

    /// The arena directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Environment pointing children's temp files into the arena.
    #[must_use]
    pub fn env(&self) -> EnvPatch {
        EnvPatch::new().with(TEMP_ROOT_VAR, self.root.to_string_lossy())
    }

    /// Registers a cleanup action to run at drain time.
    pub fn trigger<F, Fut>(&self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let label = label.into();
        tracing::debug!(cleanup = %label, "cleanup registered");
        let action: CleanupAction = Box::new(move || -> CleanupFuture { Box::pin(action()) });
        self.lock_actions().push(Cleanup { label, action });
    }

    /// Registers a synchronous cleanup action.
    pub fn trigger_sync<F>(&self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.trigger(label, move || std::future::ready(action()));
    }

    /// Number of actions waiting for `drain`.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock_actions().len()
    }

    /// Runs every registered action in reverse registration order.
    ///
    /// Failures are collected, never propagated. Actions registered while
    /// draining run after the current batch. Draining again runs only what
    /// was registered since.
    pub async fn drain(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        loop {
            let batch = std::mem::take(&mut *self.lock_actions());
            if batch.is_empty() {
                break;
            }
            for Cleanup { label, action } in batch.into_iter().rev() {
                tracing::debug!(cleanup = %label, "running cleanup");
                if let Err(error) = action().await {
                    tracing::warn!(cleanup = %label, error = %format!("{error:#}"), "cleanup failed");
                    report.failures.push(CleanupFailure {
                        label: label.clone(),
                        error,
                    });
                }
                report.executed.push(label);
            }
        }
        report
    }

    /// Allocates a uniquely named file inside the arena and keeps it until
    /// the arena is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or its mode set.
    pub fn temp_file(&self, opts: &TempOptions) -> Result<PathBuf> {
        let file = builder(opts)
            .tempfile_in(&self.root)
            .context("cannot create temp file")?;
        let path = file
            .into_temp_path()
            .keep()
            .context("cannot keep temp file")?;
        if let Some(mode) = opts.mode {
            set_permissions(&path, mode)?;
        }
        Ok(path)
    }

    /// Allocates a uniquely named directory inside the arena.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or its mode set.
    pub fn temp_dir(&self, opts: &TempOptions) -> Result<PathBuf> {
        let path = builder(opts)
            .tempdir_in(&self.root)
            .context("cannot create temp dir")?
            .keep();
        if let Some(mode) = opts.mode {
            set_permissions(&path, mode)?;
        }
        Ok(path)
    }

    /// A single-use file (mode 600) that is deleted when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or its mode set.
    pub fn scratch_file(&self) -> Result<NamedTempFile> {
        let file = Builder::new()
            .prefix("scratch.")
            .tempfile_in(&self.root)
            .context("cannot create scratch file")?;
        set_permissions(file.path(), PRIVATE_FILE_MODE)?;
        Ok(file)
    }

    /// Claims a per-scope singleton slot. Returns `false` if already held.
    pub fn claim(&self, resource: &str) -> bool {
        self.lock_claims().insert(resource.to_string())
    }

    /// Releases a slot taken with `claim`.
    pub fn release(&self, resource: &str) {
        self.lock_claims().remove(resource);
    }

    #[must_use]
    pub fn is_claimed(&self, resource: &str) -> bool {
        self.lock_claims().contains(resource)
    }

    fn lock_actions(&self) -> MutexGuard<'_, Vec<Cleanup>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_claims(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        let actions = self
            .actions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        let skipped: Vec<&str> = actions
            .iter()
            .map(|c| c.label.as_str())
            .filter(|label| *label != ARENA_CLEANUP)
            .collect();
        if !skipped.is_empty() {
            tracing::warn!(?skipped, "resource scope dropped without drain");
        }
    }
}

fn builder(opts: &TempOptions) -> Builder<'_, '_> {
    let mut builder = Builder::new();
    builder.prefix(opts.prefix.as_deref().unwrap_or("tmp."));
    if let Some(suffix) = opts.suffix.as_deref() {
        builder.suffix(suffix);
    }
    builder
}

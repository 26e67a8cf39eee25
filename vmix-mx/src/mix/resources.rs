//! Scoped temporary resources for one mix request
//!
//! Every file a request creates (downloaded inputs, the engine output) is
//! registered with the request's `ResourceScope` before any I/O touches it.
//! The scope releases each registered file exactly once: explicitly through
//! `release`/`release_all`, or on drop when the request future is cancelled.
//!
//! Release failures are logged and counted, never propagated. A file that was
//! registered but never created counts as released.
//!
//! A killed engine may still finish creating its output after the scope has
//! unlinked it, since `kill_on_drop` does not wait for the child to exit.
//! `sweep_scratch_dir` removes such leftovers at startup.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use super::plan::TrackRole;

/// File-name prefix of every scratch file a scope allocates
const RESOURCE_PREFIX: &str = "vmix_";

/// What a temporary resource holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRole {
    /// Downloaded source for a track
    Input(TrackRole),
    /// Mixed result written by the engine
    Output,
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRole::Input(role) => write!(f, "{}", role),
            ResourceRole::Output => f.write_str("output"),
        }
    }
}

/// Registered, uniquely named scratch file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    id: Uuid,
    role: ResourceRole,
    path: PathBuf,
}

impl ResourceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> ResourceRole {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A materialized resource: handle plus the number of bytes it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryResource {
    pub handle: ResourceHandle,
    pub byte_length: u64,
}

impl TemporaryResource {
    pub fn role(&self) -> ResourceRole {
        self.handle.role
    }

    pub fn path(&self) -> &Path {
        &self.handle.path
    }
}

/// Outcome of releasing a batch of resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: usize,
    pub failed: usize,
}

/// Owner of every temporary resource created during one request
pub struct ResourceScope {
    scratch_dir: PathBuf,
    registered: Mutex<Vec<ResourceHandle>>,
}

impl ResourceScope {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Allocate a unique path and record it. Nothing is written yet.
    pub fn register(&self, role: ResourceRole, extension: &str) -> ResourceHandle {
        let id = Uuid::new_v4();
        let path = self
            .scratch_dir
            .join(format!("{}{}_{}{}", RESOURCE_PREFIX, role, id.simple(), extension));
        let handle = ResourceHandle { id, role, path };

        debug!(resource = %id, role = %role, path = %handle.path.display(), "Registered temporary resource");
        self.lock().push(handle.clone());
        handle
    }

    /// Number of resources registered and not yet released
    pub fn registered_count(&self) -> usize {
        self.lock().len()
    }

    /// Release one resource ahead of scope exit. Returns `false` if it was
    /// not registered (already released).
    pub fn release(&self, id: Uuid) -> bool {
        let handle = {
            let mut registered = self.lock();
            match registered.iter().position(|h| h.id == id) {
                Some(pos) => registered.remove(pos),
                None => return false,
            }
        };
        release_handle(&handle);
        true
    }

    /// Release everything still registered, attempting every resource even
    /// when some fail.
    pub fn release_all(&self) -> ReleaseReport {
        let handles = std::mem::take(&mut *self.lock());
        let mut report = ReleaseReport::default();
        for handle in &handles {
            if release_handle(handle) {
                report.released += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ResourceHandle>> {
        // The list stays consistent even if a holder panicked
        self.registered.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        let remaining = self.registered_count();
        if remaining > 0 {
            warn!(
                remaining = remaining,
                "Resource scope dropped with registered resources, releasing"
            );
            self.release_all();
        }
    }
}

/// Remove leftover `vmix_*` files from a previous run. Only call this before
/// any request is being served.
pub fn sweep_scratch_dir(scratch_dir: &Path) -> std::io::Result<ReleaseReport> {
    let mut report = ReleaseReport::default();
    for entry in std::fs::read_dir(scratch_dir)? {
        let entry = entry?;
        let is_ours = entry.file_name().to_string_lossy().starts_with(RESOURCE_PREFIX);
        if !is_ours || !entry.file_type()?.is_file() {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => report.released += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => report.released += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Could not remove stale scratch file");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Delete the file behind a handle. `true` when the file is gone afterwards.
fn release_handle(handle: &ResourceHandle) -> bool {
    match std::fs::remove_file(&handle.path) {
        Ok(()) => {
            debug!(resource = %handle.id, role = %handle.role, "Released temporary resource");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!(
                resource = %handle.id,
                role = %handle.role,
                path = %handle.path.display(),
                error = %e,
                "LifecycleCleanupFailed: could not release temporary resource"
            );
            false
        }
    }
}

//! Per-tenant distribution lease using the `flock(2)` syscall directly.
//! Independent crate with no internal rota dependencies.
//!
//! A lease is an exclusive advisory lock on `{lease_dir}/{tenant_id}.lease`.
//! Holding the `File` keeps the lock; `Drop` calls `flock(fd, LOCK_UN)`.
//! Because `flock` locks belong to the open file description, two
//! independent opens conflict even inside one process, so a manual run and
//! a scheduled run in the same process exclude each other too.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Diagnostic information written to lease files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseDiagnostic {
    pub pid: u32,
    pub tenant_id: String,
    pub acquired_at: DateTime<Utc>,
    pub reason: String,
}

impl std::fmt::Display for LeaseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PID {} (reason: {}, acquired: {})",
            self.pid, self.reason, self.acquired_at
        )
    }
}

/// Tenant lease guard backed by `flock(2)`.
pub struct TenantLease {
    file: File,
    lease_path: PathBuf,
    tenant_id: String,
}

impl std::fmt::Debug for TenantLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantLease")
            .field("tenant_id", &self.tenant_id)
            .field("lease_path", &self.lease_path)
            .finish()
    }
}

impl Drop for TenantLease {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is a valid file descriptor owned by `self.file`.
        // `LOCK_UN` releases the advisory lock. If it fails, the lock is
        // still released when the fd is closed moments later.
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }
    }
}

impl TenantLease {
    pub fn lease_path(&self) -> &Path {
        &self.lease_path
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Delete the lease file, then release the lock.
    ///
    /// For tenants that are going away. The file is unlinked while still
    /// locked, so no other holder can own it in between.
    pub fn remove(self) -> Result<()> {
        fs::remove_file(&self.lease_path)
            .with_context(|| format!("Failed to remove lease file: {}", self.lease_path.display()))
    }
}

/// Result of a non-blocking lease attempt.
#[derive(Debug)]
pub enum LeaseAttempt {
    Acquired(TenantLease),
    /// Another run holds the lease. Carries the holder's diagnostic when readable.
    Held(Option<LeaseDiagnostic>),
}

impl LeaseAttempt {
    /// Human-readable description of the holder for logs.
    pub fn holder_description(diagnostic: &Option<LeaseDiagnostic>) -> String {
        match diagnostic {
            Some(d) => d.to_string(),
            None => "unknown holder".to_string(),
        }
    }
}

/// Try to take the distribution lease for a tenant without blocking.
///
/// Lease path: `{lease_dir}/{tenant_id}.lease`. On success the diagnostic
/// JSON (pid, tenant, reason, acquired_at) is written into the file.
pub fn try_acquire_lease(lease_dir: &Path, tenant_id: &str, reason: &str) -> Result<LeaseAttempt> {
    validate_tenant_key(tenant_id)?;
    fs::create_dir_all(lease_dir)
        .with_context(|| format!("Failed to create lease directory: {}", lease_dir.display()))?;

    let lease_path = lease_dir.join(format!("{tenant_id}.lease"));

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lease_path)
        .with_context(|| format!("Failed to open lease file: {}", lease_path.display()))?;

    let fd = file.as_raw_fd();

    // SAFETY: `fd` is a valid file descriptor from the `File` we just opened.
    // `LOCK_EX | LOCK_NB` requests an exclusive non-blocking lock.
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::WouldBlock {
            return Err(err)
                .with_context(|| format!("Failed to lock lease file: {}", lease_path.display()));
        }
        return Ok(LeaseAttempt::Held(read_diagnostic(&lease_path)));
    }

    let mut lease = TenantLease {
        file,
        lease_path,
        tenant_id: tenant_id.to_string(),
    };

    let diagnostic = LeaseDiagnostic {
        pid: std::process::id(),
        tenant_id: tenant_id.to_string(),
        acquired_at: Utc::now(),
        reason: reason.to_string(),
    };
    let json = serde_json::to_string(&diagnostic).context("Failed to serialize lease diagnostic")?;

    lease
        .file
        .set_len(0)
        .context("Failed to truncate lease file")?;
    lease
        .file
        .write_all(json.as_bytes())
        .context("Failed to write lease diagnostic")?;
    lease.file.flush().context("Failed to flush lease file")?;

    Ok(LeaseAttempt::Acquired(lease))
}

fn read_diagnostic(lease_path: &Path) -> Option<LeaseDiagnostic> {
    let mut contents = String::new();
    File::open(lease_path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .ok()?;
    serde_json::from_str(&contents).ok()
}

fn validate_tenant_key(tenant_id: &str) -> Result<()> {
    let ok = !tenant_id.is_empty()
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        bail!("Invalid tenant id for lease: '{tenant_id}'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn acquired(attempt: LeaseAttempt) -> TenantLease {
        match attempt {
            LeaseAttempt::Acquired(lease) => lease,
            LeaseAttempt::Held(d) => panic!("expected lease, held by {d:?}"),
        }
    }

    #[test]
    fn test_acquire_lease_succeeds() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let lease = acquired(try_acquire_lease(temp_dir.path(), "T1", "scheduled").unwrap());
        assert_eq!(lease.lease_path(), temp_dir.path().join("T1.lease"));
        assert_eq!(lease.tenant_id(), "T1");
        assert!(lease.lease_path().exists());
    }

    #[test]
    fn test_lease_diagnostic_written() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let _lease = acquired(try_acquire_lease(temp_dir.path(), "T1", "manual").unwrap());

        let contents = fs::read_to_string(temp_dir.path().join("T1.lease")).unwrap();
        let diagnostic: LeaseDiagnostic = serde_json::from_str(&contents).unwrap();
        assert_eq!(diagnostic.pid, std::process::id());
        assert_eq!(diagnostic.tenant_id, "T1");
        assert_eq!(diagnostic.reason, "manual");
    }

    #[test]
    fn test_second_lease_reports_holder() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let _first = acquired(try_acquire_lease(temp_dir.path(), "T1", "scheduled").unwrap());

        match try_acquire_lease(temp_dir.path(), "T1", "manual").unwrap() {
            LeaseAttempt::Held(Some(holder)) => {
                assert_eq!(holder.reason, "scheduled");
                assert_eq!(holder.pid, std::process::id());
                let text = LeaseAttempt::holder_description(&Some(holder));
                assert!(text.contains("reason: scheduled"));
            }
            other => panic!("expected held lease, got {other:?}"),
        }
    }

    #[test]
    fn test_lease_reacquired_after_drop() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        {
            let _lease = acquired(try_acquire_lease(temp_dir.path(), "T1", "first").unwrap());
        }
        // The only fd was closed, so the open file description is gone.
        let lease = acquired(try_acquire_lease(temp_dir.path(), "T1", "second").unwrap());
        let contents = fs::read_to_string(lease.lease_path()).unwrap();
        assert!(contents.contains("second"));
    }

    #[test]
    fn test_remove_deletes_lease_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let lease = acquired(try_acquire_lease(temp_dir.path(), "T1", "deprovision").unwrap());
        let path = lease.lease_path().to_path_buf();

        lease.remove().unwrap();
        assert!(!path.exists());
        // A later run starts from a fresh file.
        let again = acquired(try_acquire_lease(temp_dir.path(), "T1", "r").unwrap());
        assert!(again.lease_path().exists());
    }

    #[test]
    fn test_different_tenants_do_not_conflict() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let a = acquired(try_acquire_lease(temp_dir.path(), "TA", "r").unwrap());
        let b = acquired(try_acquire_lease(temp_dir.path(), "TB", "r").unwrap());
        assert_ne!(a.lease_path(), b.lease_path());
    }

    #[test]
    fn test_lease_dir_created_automatically() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let lease_dir = temp_dir.path().join("deep").join("leases");
        let _lease = acquired(try_acquire_lease(&lease_dir, "T1", "r").unwrap());
        assert!(lease_dir.is_dir());
    }

    #[test]
    fn test_path_like_tenant_id_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        assert!(try_acquire_lease(temp_dir.path(), "../etc", "r").is_err());
        assert!(try_acquire_lease(temp_dir.path(), "", "r").is_err());
    }

    #[test]
    fn test_invalid_lease_dir() {
        // /dev/null is a file, so creating a directory under it fails.
        let result = try_acquire_lease(&Path::new("/dev/null").join("leases"), "T1", "r");
        assert!(result.is_err());
    }

    #[test]
    fn test_lease_debug_format() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let lease = acquired(try_acquire_lease(temp_dir.path(), "T1", "r").unwrap());
        let debug = format!("{lease:?}");
        assert!(debug.contains("TenantLease"));
        assert!(debug.contains("lease_path"));
    }
}

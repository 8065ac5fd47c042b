//! In-memory implementation of `LedgerStore`.
//!
//! `MemoryLedgerStore` keeps every ledger file as a `Vec<String>` behind an
//! `RwLock`. It backs unit tests and embedded setups that do not need the
//! ledger to outlive the process. It can be switched into an unavailable
//! mode, or given an append latency, to exercise the failure and timeout
//! paths of callers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use notary_contracts::error::{NotaryError, NotaryResult};
use notary_core::traits::LedgerStore;

use crate::store::{DEFAULT_ACTIVE_FILE, DEFAULT_QUARANTINE_PREFIX};

/// Ledger files held in process memory, keyed by file name.
#[derive(Debug)]
pub struct MemoryLedgerStore {
    files: RwLock<BTreeMap<String, Vec<String>>>,
    unavailable: AtomicBool,
    /// Delay applied to every `append`, in milliseconds.
    latency_ms: AtomicU64,
    rotations: AtomicU64,
}

impl MemoryLedgerStore {
    /// An empty store holding only the active file.
    pub fn new() -> Self {
        let mut files = BTreeMap::new();
        files.insert(DEFAULT_ACTIVE_FILE.to_string(), Vec::new());
        Self {
            files: RwLock::new(files),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    /// While set, every `append` fails with `StorageUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Block every subsequent `append` for `latency`, simulating a stalled disk.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Overwrite one stored line in place, simulating an out-of-band edit.
    pub fn replace_line(&self, file: &str, index: usize, line: impl Into<String>) -> NotaryResult<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))?;
        let slot = files
            .get_mut(file)
            .and_then(|lines| lines.get_mut(index))
            .ok_or_else(|| NotaryError::InvalidLedgerFile {
                name: file.to_string(),
            })?;
        *slot = line.into();
        Ok(())
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn active_file(&self) -> &str {
        DEFAULT_ACTIVE_FILE
    }

    fn append(&self, line: &str) -> NotaryResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NotaryError::storage("ledger store offline"));
        }
        let mut files = self
            .files
            .write()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))?;
        files
            .entry(DEFAULT_ACTIVE_FILE.to_string())
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    fn read_all(&self, file: &str) -> NotaryResult<Vec<String>> {
        let files = self
            .files
            .read()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))?;
        files
            .get(file)
            .cloned()
            .ok_or_else(|| NotaryError::InvalidLedgerFile {
                name: file.to_string(),
            })
    }

    fn read_raw(&self, file: &str) -> NotaryResult<Vec<u8>> {
        let lines = self.read_all(file)?;
        let mut raw = Vec::new();
        for line in lines {
            raw.extend_from_slice(line.as_bytes());
            raw.push(b'\n');
        }
        Ok(raw)
    }

    fn rotate(&self) -> NotaryResult<String> {
        let mut files = self
            .files
            .write()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))?;

        let n = self.rotations.fetch_add(1, Ordering::SeqCst) + 1;
        let quarantined = format!("{DEFAULT_QUARANTINE_PREFIX}-{n:04}.log");

        let old = files.remove(DEFAULT_ACTIVE_FILE).unwrap_or_default();
        files.insert(quarantined.clone(), old);
        files.insert(DEFAULT_ACTIVE_FILE.to_string(), Vec::new());
        Ok(quarantined)
    }

    fn list(&self) -> NotaryResult<Vec<String>> {
        let files = self
            .files
            .read()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))?;
        Ok(files.keys().cloned().collect())
    }
}

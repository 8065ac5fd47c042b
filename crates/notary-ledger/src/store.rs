//! File-backed `LedgerStore`.
//!
//! One directory holds the active ledger file plus any quarantined files:
//!
//! ```text
//! <dir>/audit.log
//! <dir>/audit-corrupted-2026-01-01_10-00-00.log
//! <dir>/audit-corrupted-2026-01-01_10-00-00-1.log
//! ```
//!
//! Writers (`append`, `rotate`) take the write half of an `RwLock`; readers
//! take the read half, so a reader never sees a line that is still being
//! written and no append can land between a rotation's rename and the
//! creation of the fresh file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info};

use notary_contracts::error::{NotaryError, NotaryResult};
use notary_core::traits::LedgerStore;

pub const DEFAULT_ACTIVE_FILE: &str = "audit.log";
pub const DEFAULT_QUARANTINE_PREFIX: &str = "audit-corrupted";
const LEDGER_EXTENSION: &str = ".log";

/// Ledger files kept in one directory on disk.
#[derive(Debug)]
pub struct FileLedgerStore {
    /// Directory holding the active and quarantined files.
    dir: PathBuf,
    /// Name of the file records are appended to.
    active_file: String,
    /// Prefix of quarantine file names, before the timestamp.
    quarantine_prefix: String,
    /// Serialises writers against readers.
    lock: RwLock<()>,
}

impl FileLedgerStore {
    /// Open a store in `dir` with the default file names.
    pub fn open(dir: impl Into<PathBuf>) -> NotaryResult<Self> {
        Self::with_names(dir, DEFAULT_ACTIVE_FILE, DEFAULT_QUARANTINE_PREFIX)
    }

    /// Open a store in `dir`, creating the directory and an empty active
    /// file if they do not exist yet.
    pub fn with_names(
        dir: impl Into<PathBuf>,
        active_file: impl Into<String>,
        quarantine_prefix: impl Into<String>,
    ) -> NotaryResult<Self> {
        let dir = dir.into();
        let active_file = active_file.into();
        let quarantine_prefix = quarantine_prefix.into();

        if !is_bare_name(&active_file) || !is_bare_name(&quarantine_prefix) {
            return Err(NotaryError::ConfigError {
                reason: "ledger file names must not contain path components".to_string(),
            });
        }

        fs::create_dir_all(&dir).map_err(|e| {
            NotaryError::storage(format!(
                "cannot create ledger directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let active_path = dir.join(&active_file);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active_path)
            .map_err(|e| write_error(&active_file, e))?;

        debug!(dir = %dir.display(), active_file = %active_file, "ledger store opened");

        Ok(Self {
            dir,
            active_file,
            quarantine_prefix,
            lock: RwLock::new(()),
        })
    }

    /// Directory this store writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `name` is the active file or a quarantine file of this store.
    fn follows_convention(&self, name: &str) -> bool {
        name == self.active_file
            || (name.starts_with(&format!("{}-", self.quarantine_prefix))
                && name.ends_with(LEDGER_EXTENSION))
    }

    fn resolve(&self, file: &str) -> NotaryResult<PathBuf> {
        if !is_bare_name(file) || !self.follows_convention(file) {
            return Err(NotaryError::InvalidLedgerFile {
                name: file.to_string(),
            });
        }
        Ok(self.dir.join(file))
    }

    fn read_guard(&self) -> NotaryResult<RwLockReadGuard<'_, ()>> {
        self.lock
            .read()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))
    }

    fn write_guard(&self) -> NotaryResult<RwLockWriteGuard<'_, ()>> {
        self.lock
            .write()
            .map_err(|_| NotaryError::storage("ledger lock poisoned"))
    }

    /// First free quarantine name for the current second.
    fn quarantine_name(&self) -> String {
        let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let base = format!("{}-{}", self.quarantine_prefix, stamp);
        let mut candidate = format!("{base}{LEDGER_EXTENSION}");
        let mut n = 1;
        while self.dir.join(&candidate).exists() {
            candidate = format!("{base}-{n}{LEDGER_EXTENSION}");
            n += 1;
        }
        candidate
    }
}

impl LedgerStore for FileLedgerStore {
    fn active_file(&self) -> &str {
        &self.active_file
    }

    fn append(&self, line: &str) -> NotaryResult<()> {
        let _guard = self.write_guard()?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let path = self.dir.join(&self.active_file);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| write_error(&self.active_file, e))?;

        // A single write keeps the line contiguous; sync makes it durable
        // before the caller treats the action as committed.
        file.write_all(buf.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| write_error(&self.active_file, e))
    }

    fn read_all(&self, file: &str) -> NotaryResult<Vec<String>> {
        let path = self.resolve(file)?;
        let _guard = self.read_guard()?;

        let content = fs::read(&path).map_err(|e| io_error(file, e))?;
        Ok(split_lines(&content))
    }

    fn read_raw(&self, file: &str) -> NotaryResult<Vec<u8>> {
        let path = self.resolve(file)?;
        let _guard = self.read_guard()?;
        fs::read(&path).map_err(|e| io_error(file, e))
    }

    fn rotate(&self) -> NotaryResult<String> {
        let _guard = self.write_guard()?;

        let quarantined = self.quarantine_name();
        let active_path = self.dir.join(&self.active_file);

        fs::rename(&active_path, self.dir.join(&quarantined))
            .map_err(|e| write_error(&self.active_file, e))?;
        File::create(&active_path)
            .and_then(|f| f.sync_all())
            .map_err(|e| write_error(&self.active_file, e))?;

        info!(
            active_file = %self.active_file,
            quarantined_as = %quarantined,
            "ledger file quarantined"
        );
        Ok(quarantined)
    }

    fn list(&self) -> NotaryResult<Vec<String>> {
        let _guard = self.read_guard()?;

        let entries = fs::read_dir(&self.dir).map_err(NotaryError::storage)?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(NotaryError::storage)?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.follows_convention(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Split raw file content on `\n`. A trailing terminator does not produce an
/// empty final line; an unterminated final segment is kept as-is so a torn
/// write shows up as corruption instead of disappearing.
///
/// Lines are decoded lossily. A line holding invalid UTF-8 still comes back
/// at its own index, and the replacement characters make it fail its hash.
pub(crate) fn split_lines(content: &[u8]) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    body.split(|b| *b == b'\n')
        .map(|l| String::from_utf8_lossy(l).into_owned())
        .collect()
}

fn is_bare_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn write_error(file: &str, e: io::Error) -> NotaryError {
    NotaryError::storage(format!("ledger file '{file}': {e}"))
}

fn io_error(file: &str, e: io::Error) -> NotaryError {
    if e.kind() == io::ErrorKind::NotFound {
        NotaryError::InvalidLedgerFile {
            name: file.to_string(),
        }
    } else {
        write_error(file, e)
    }
}

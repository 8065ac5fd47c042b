//! The hash-chain engine.
//!
//! `HashChainLedger` turns audited actions into chained `LedgerRecord`s on
//! top of any `LedgerStore`, and verifies whole ledger files for tampering.
//!
//! The chain head (last sequence number and hash) is read once when the
//! ledger opens and then carried forward in memory, so appending never
//! rescans the file. The head mutex is the single-writer gate: it is held
//! across building and appending a record, and across quarantining the
//! active file, so the in-memory head always matches the file on disk.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, warn};

use notary_contracts::{
    error::{NotaryError, NotaryResult},
    ledger::{AuditEntry, LedgerRecord, VerificationResult, GENESIS_HASH},
};
use notary_core::traits::{AuditTrail, LedgerStore};

use crate::{chain, line};

/// Position of the newest record in the active file.
#[derive(Debug)]
struct ChainHead {
    sequence: u64,
    last_hash: String,
}

impl ChainHead {
    fn genesis() -> Self {
        Self {
            sequence: 0,
            last_hash: GENESIS_HASH.to_string(),
        }
    }
}

/// Hash-chained audit ledger over a `LedgerStore`.
///
/// Appends are serialised through the in-memory chain head; verification
/// of the active file takes the same lock.
pub struct HashChainLedger {
    /// Backing storage for the active and quarantined files.
    store: Arc<dyn LedgerStore>,
    /// Where the next record chains from.
    head: Mutex<ChainHead>,
}

impl HashChainLedger {
    /// Open a ledger over `store`, deriving the chain head from the current
    /// contents of the active file.
    pub fn open(store: Arc<dyn LedgerStore>) -> NotaryResult<Self> {
        let lines = store.read_all(store.active_file())?;
        let (sequence, last_hash) = chain::head_of(&lines);

        debug!(
            active_file = %store.active_file(),
            sequence,
            "ledger opened"
        );

        Ok(Self {
            store,
            head: Mutex::new(ChainHead {
                sequence,
                last_hash,
            }),
        })
    }

    /// Name of the file new records are appended to.
    pub fn active_file(&self) -> &str {
        self.store.active_file()
    }

    fn lock_head(&self) -> NotaryResult<MutexGuard<'_, ChainHead>> {
        self.head
            .lock()
            .map_err(|_| NotaryError::storage("ledger head lock poisoned"))
    }

    /// Append one chained record for `entry`.
    ///
    /// Each call is a distinct event: recording the same entry twice yields
    /// two records. When the store append fails the head does not move and
    /// the action must be treated as not having happened.
    pub fn record_action(&self, entry: AuditEntry) -> NotaryResult<LedgerRecord> {
        let mut head = self.lock_head()?;

        let mut record = LedgerRecord {
            sequence: head.sequence + 1,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            actor_id: line::sanitize_field(entry.actor.user_id.as_str()),
            actor_name: line::sanitize_field(&entry.actor.user_name),
            service: line::sanitize_field(&entry.service),
            action: line::sanitize_field(&entry.action),
            detail: line::sanitize_detail(&entry.detail),
            outcome: entry.outcome,
            previous_hash: head.last_hash.clone(),
            current_hash: String::new(),
        };
        record.current_hash = chain::hash_link(&record.previous_hash, &line::canonical_fields(&record));

        if let Err(e) = self.store.append(&line::format_line(&record)) {
            warn!(
                action = %record.action,
                sequence = record.sequence,
                error = %e,
                "audit append failed"
            );
            return Err(e);
        }

        head.sequence = record.sequence;
        head.last_hash = record.current_hash.clone();

        debug!(
            sequence = record.sequence,
            action = %record.action,
            outcome = %record.outcome,
            "audit record appended"
        );
        Ok(record)
    }

    /// Verify every record of `file` against the chain.
    ///
    /// On the first mismatch the 1-based line is reported; if `file` is the
    /// active ledger it is quarantined first and a fresh, empty active file
    /// takes its place. Unreadable or missing files yield `TechnicalError`.
    pub fn verify(&self, file: &str) -> VerificationResult {
        let is_active = file == self.store.active_file();

        // Writers wait while the active file is checked, so the verdict and
        // any quarantine apply to exactly the bytes that were read.
        let head = if is_active {
            match self.lock_head() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    return VerificationResult::TechnicalError {
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            None
        };

        let lines = match self.store.read_all(file) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(file = %file, error = %e, "ledger file could not be read for verification");
                return VerificationResult::TechnicalError {
                    reason: e.to_string(),
                };
            }
        };

        let Some(line) = chain::first_broken_line(&lines) else {
            debug!(file = %file, records = lines.len(), "ledger verified intact");
            return VerificationResult::Intact;
        };

        warn!(file = %file, line, "ledger chain broken");

        let quarantined_as = match head {
            Some(mut head) => match self.store.rotate() {
                Ok(name) => {
                    *head = ChainHead::genesis();
                    Some(name)
                }
                Err(e) => {
                    error!(file = %file, error = %e, "corrupted ledger could not be quarantined");
                    None
                }
            },
            None => None,
        };

        VerificationResult::CorruptedAtLine {
            line,
            quarantined_as,
        }
    }

    /// Identifiers of the active and every quarantined ledger file.
    pub fn list_files(&self) -> NotaryResult<Vec<String>> {
        self.store.list()
    }

    /// Raw bytes of a ledger file, for export.
    pub fn read_file(&self, file: &str) -> NotaryResult<Vec<u8>> {
        self.store.read_raw(file)
    }

    /// Parsed records of a ledger file. A line that does not parse is
    /// reported as an `IntegrityViolation` at that line.
    pub fn records(&self, file: &str) -> NotaryResult<Vec<LedgerRecord>> {
        self.store
            .read_all(file)?
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                line::parse_line(raw).ok_or_else(|| NotaryError::IntegrityViolation {
                    file: file.to_string(),
                    line: idx + 1,
                })
            })
            .collect()
    }

    /// Sequence number and hash the next record will chain from.
    pub fn head(&self) -> NotaryResult<(u64, String)> {
        let head = self.lock_head()?;
        Ok((head.sequence, head.last_hash.clone()))
    }
}

impl AuditTrail for HashChainLedger {
    fn record_action(&self, entry: AuditEntry) -> NotaryResult<LedgerRecord> {
        HashChainLedger::record_action(self, entry)
    }
}

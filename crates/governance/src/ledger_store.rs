use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use hiveguard_core::{LedgerEntry, LedgerEntryType, GENESIS_HASH};
use serde_json::Value;

use crate::error::GovernanceError;

/// The append-only, hash-chained audit ledger, persisted as JSON-lines with
/// an fsync after every append (spec.md §6).
pub struct LedgerFile {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl LedgerFile {
    /// Load an existing ledger file, or start a fresh empty one if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GovernanceError> {
        let path = path.into();
        let entries = match std::fs::File::open(&path) {
            Ok(file) => BufReader::new(file)
                .lines()
                .map(|line| {
                    let line = line.map_err(|source| GovernanceError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    Ok(serde_json::from_str(&line)?)
                })
                .collect::<Result<Vec<LedgerEntry>, GovernanceError>>()?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(GovernanceError::Io {
                    path: path.clone(),
                    source,
                });
            }
        };
        Ok(Self { path, entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn last_hash(&self) -> String {
        self.entries.last().map_or_else(|| GENESIS_HASH.to_owned(), |e| e.entry_hash.clone())
    }

    /// Verify the full chain: gapless sequence ids and each entry's
    /// `prev_hash`/`entry_hash` linkage (spec.md §8).
    #[must_use]
    pub fn verify_chain(&self) -> bool {
        let mut expected_prev = GENESIS_HASH.to_owned();
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.seq != (i as u64) + 1 {
                return false;
            }
            if entry.prev_hash != expected_prev {
                return false;
            }
            if !entry.verify() {
                return false;
            }
            expected_prev = entry.entry_hash.clone();
        }
        true
    }

    /// Append a new entry, refusing if the chain is already broken (spec.md
    /// §7: a chain-invalid ledger is fatal to governance).
    pub fn append(&mut self, entry_type: LedgerEntryType, payload: Value) -> Result<&LedgerEntry, GovernanceError> {
        if !self.verify_chain() {
            let bad_seq = (self.entries.len() as u64) + 1;
            return Err(GovernanceError::ChainInvalid(bad_seq));
        }
        let seq = (self.entries.len() as u64) + 1;
        let entry = LedgerEntry::next(seq, entry_type, Utc::now(), payload, &self.last_hash());

        let line = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| GovernanceError::Io {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| GovernanceError::Io {
            path: self.path.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| GovernanceError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.entries.push(entry);
        Ok(self.entries.last().expect("just pushed"))
    }
}

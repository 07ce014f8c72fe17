// journal.rs — Append-only JSONL journal with chain verification.
//
// One JSON object per line. Append takes an exclusive advisory lock on the
// journal file, recovers the chain head from the last line, assigns the next
// sequence number, writes a single canonical-JSON line, and fsyncs before
// releasing the lock. Readers take a shared lock. The journal never rewrites
// a line in place; sealing appends a terminal SEAL entry after which every
// append is refused until a successor file is opened via `succeed_sealed`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::entry::{AuditEntry, EntryDraft, GENESIS_HASH};
use crate::error::AuditError;

/// Result of a full chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// True when every line parses, hashes, and links correctly.
    pub valid: bool,
    /// Number of entries inspected.
    pub entries: u64,
    /// Sequence of the first entry that failed verification.
    pub first_bad_sequence: Option<u64>,
    /// Hash of the last entry, when the chain is non-empty and valid.
    pub final_hash: Option<String>,
    /// True when the last entry is a SEAL marker.
    pub sealed: bool,
}

/// A hash-chained append-only journal backed by a JSONL file.
///
/// The struct holds only the path; every operation opens, locks, and closes
/// the file so multiple processes can share the journal safely.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Create a handle for the journal at `path`. The file itself is created
    /// on first append.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a draft entry, assigning its chain position.
    ///
    /// Returns the materialized entry, hash included. Fails with
    /// [`AuditError::Sealed`] once a SEAL entry terminates the file.
    pub fn append(&self, draft: EntryDraft) -> Result<AuditEntry, AuditError> {
        let file = self.open_append()?;
        file.lock_exclusive()
            .map_err(|source| AuditError::LockFailed {
                path: self.path.clone(),
                source,
            })?;

        // Lock held from here; released when `file` drops. The chain head
        // is read through the locked handle itself — taking a second lock
        // on another descriptor of the same file would block on our own
        // exclusive lock.
        let last = Self::last_entry_in(&file)?;
        if let Some(ref last) = last {
            if last.is_seal() {
                return Err(AuditError::Sealed {
                    path: self.path.clone(),
                });
            }
        }
        let (sequence, prev_hash) = match last {
            Some(entry) => (entry.sequence + 1, entry.hash),
            None => (1, GENESIS_HASH.to_string()),
        };

        self.write_line(&file, draft, sequence, prev_hash)
    }

    /// Append a terminal SEAL entry and return its hash (the sealing hash).
    ///
    /// The draft's tool field is overridden; callers supply the session and
    /// reason context.
    pub fn seal(&self, mut draft: EntryDraft) -> Result<String, AuditError> {
        draft.tool = crate::entry::SEAL_TOOL.to_string();
        let entry = self.append(draft)?;
        tracing::warn!(path = %self.path.display(), hash = %entry.hash, "audit journal sealed");
        Ok(entry.hash)
    }

    /// Read the last `limit` entries, oldest first. Zero means everything.
    pub fn read_tail(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let mut entries = self.read_all()?;
        if limit > 0 && entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    /// Read every entry in order. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let mut entries = Vec::new();
        for (_, line) in self.read_lines()? {
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Hash of the last entry, if any.
    pub fn last_hash(&self) -> Result<Option<String>, AuditError> {
        Ok(self.read_last_entry()?.map(|e| e.hash))
    }

    /// True when the journal ends in a SEAL entry.
    pub fn is_sealed(&self) -> Result<bool, AuditError> {
        Ok(self
            .read_last_entry()?
            .map(|e| e.is_seal())
            .unwrap_or(false))
    }

    /// Verify the whole chain: every line must parse, its recomputed hash
    /// must match the stored one, `prev_hash` must repeat the predecessor's
    /// hash, and sequences must increase by exactly one.
    ///
    /// The first entry's `prev_hash` is GENESIS for a fresh journal; a
    /// successor journal instead opens with the sealing hash of its
    /// predecessor, so the first link is accepted as presented and only the
    /// entry's own hash is checked.
    pub fn verify_chain(&self) -> Result<ChainReport, AuditError> {
        let mut report = ChainReport {
            valid: true,
            entries: 0,
            first_bad_sequence: None,
            final_hash: None,
            sealed: false,
        };
        let mut previous: Option<AuditEntry> = None;

        for (line_number, line) in self.read_lines()? {
            let expected_sequence = previous.as_ref().map(|p| p.sequence + 1);
            let entry: AuditEntry = match serde_json::from_str(&line) {
                Ok(entry) => entry,
                Err(_) => {
                    report.valid = false;
                    report.first_bad_sequence =
                        Some(expected_sequence.unwrap_or(line_number as u64));
                    return Ok(report);
                }
            };
            report.entries += 1;

            let recomputed = entry.compute_hash()?;
            let link_ok = match previous {
                Some(ref prev) => {
                    entry.prev_hash == prev.hash && entry.sequence == prev.sequence + 1
                }
                None => true,
            };
            if recomputed != entry.hash || !link_ok {
                report.valid = false;
                report.first_bad_sequence = Some(entry.sequence);
                return Ok(report);
            }

            previous = Some(entry);
        }

        if let Some(last) = previous {
            report.sealed = last.is_seal();
            report.final_hash = Some(last.hash);
        }
        Ok(report)
    }

    /// Retire a sealed journal and open its successor.
    ///
    /// The sealed file is renamed to `<stem>.<halt_id>.sealed.jsonl` in the
    /// same directory — its bytes are untouched — and `draft` becomes the
    /// first entry of a fresh file at the original path, with `prev_hash`
    /// set to the sealing hash and the sequence continuing past it.
    pub fn succeed_sealed(
        &self,
        halt_id: &str,
        draft: EntryDraft,
    ) -> Result<AuditEntry, AuditError> {
        let seal = match self.read_last_entry()? {
            Some(entry) if entry.is_seal() => entry,
            _ => {
                return Err(AuditError::NotSealed {
                    path: self.path.clone(),
                })
            }
        };

        let retired = self.sealed_sibling(halt_id);
        std::fs::rename(&self.path, &retired).map_err(|source| AuditError::RotateFailed {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(
            from = %self.path.display(),
            to = %retired.display(),
            "sealed journal retired"
        );

        let file = self.open_append()?;
        file.lock_exclusive()
            .map_err(|source| AuditError::LockFailed {
                path: self.path.clone(),
                source,
            })?;
        self.write_line(&file, draft, seal.sequence + 1, seal.hash)
    }

    /// Name the retired file for a halt: `audit-log.<halt_id>.sealed.jsonl`.
    fn sealed_sibling(&self, halt_id: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audit-log".to_string());
        self.path
            .with_file_name(format!("{}.{}.sealed.jsonl", stem, halt_id))
    }

    /// Materialize a draft at a chain position and persist it durably.
    fn write_line(
        &self,
        mut file: &File,
        draft: EntryDraft,
        sequence: u64,
        prev_hash: String,
    ) -> Result<AuditEntry, AuditError> {
        let entry = draft.into_entry(sequence, prev_hash)?;
        let line = entry.to_line()?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(entry)
    }

    /// Open the journal read+append, creating it if needed. Append mode
    /// pins writes to the end of the file; reads still start at offset 0.
    fn open_append(&self) -> Result<File, AuditError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: self.path.clone(),
                source,
            })?;
        }
        OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| AuditError::OpenFailed {
                path: self.path.clone(),
                source,
            })
    }

    /// Parse the last non-empty line of an already-open (and locked) handle.
    fn last_entry_in(mut file: &File) -> Result<Option<AuditEntry>, AuditError> {
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))?;
        let reader = BufReader::new(file);
        let mut last_line: Option<String> = None;
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        match last_line {
            Some(line) => Ok(Some(serde_json::from_str(&line)?)),
            None => Ok(None),
        }
    }

    /// Read all non-empty lines with their 1-based line numbers, under a
    /// shared lock. A missing file yields no lines.
    fn read_lines(&self) -> Result<Vec<(usize, String)>, AuditError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::OpenFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        file.lock_shared().map_err(|source| AuditError::LockFailed {
            path: self.path.clone(),
            source,
        })?;

        let reader = BufReader::new(&file);
        let mut lines = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push((idx + 1, line));
            }
        }
        Ok(lines)
    }

    /// Parse the last non-empty line, if any.
    fn read_last_entry(&self) -> Result<Option<AuditEntry>, AuditError> {
        let lines = self.read_lines()?;
        match lines.last() {
            Some((_, line)) => Ok(Some(serde_json::from_str(line)?)),
            None => Ok(None),
        }
    }
}

// action_log.rs — Append-only, hash-chained JSONL action log.
//
// Every atomic action or decision the agent takes lands here as one JSON
// line. Records are never mutated. Each record carries the SHA-256 of the
// previous line, so insertion, deletion, or edits anywhere in the file are
// detectable with `verify_chain`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::LedgerError;

/// SHA-256 of a string, lowercase hex.
pub fn hash_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// What kind of atomic action a record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A side effect against the platform (entity created/updated,
    /// notification enqueued).
    ApiCall,
    /// A policy decision was made.
    Decision,
    /// An Exception was raised.
    Escalation,
    MemoryRead,
    MemoryWrite,
}

/// One immutable line in the action log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub kind: ActionKind,
    /// What happened, in one line.
    pub description: String,

    /// Policy decision attached to Decision records ("allow" / "approval" /
    /// "block").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_reason: Option<String>,

    /// SHA-256 of the action's payload, when one exists. The payload itself
    /// lives with the entity; the log only needs to prove what it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<String>,

    /// Hash of the previous log line. None only for the first record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,

    /// Arbitrary additional context.
    #[serde(default)]
    pub metadata: Value,
}

impl ActionRecord {
    pub fn new(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id: None,
            kind,
            description: description.into(),
            policy_decision: None,
            policy_reason: None,
            payload_hash: None,
            previous_hash: None,
            metadata: Value::Null,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_policy(
        mut self,
        decision: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.policy_decision = Some(decision.into());
        self.policy_reason = Some(reason.into());
        self
    }

    /// Hash and attach an action payload.
    pub fn with_payload(mut self, payload: &Value) -> Self {
        self.payload_hash = Some(hash_str(&payload.to_string()));
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The append-only JSONL log. Flushes after every record.
pub struct ActionLog {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written, for chaining the next record.
    last_hash: Option<String>,
}

impl ActionLog {
    /// Open (or create) the log, recovering chain state from any existing
    /// content so new records link correctly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LedgerError::IoError {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
        })
    }

    /// Append one record, linking it to the previous line.
    pub fn append(&mut self, record: &mut ActionRecord) -> Result<(), LedgerError> {
        record.previous_hash = self.last_hash.clone();

        let json = serde_json::to_string(record)?;
        self.last_hash = Some(hash_str(&json));

        writeln!(self.writer, "{}", json).map_err(|source| LedgerError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        self.writer.flush().map_err(|source| LedgerError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Read all records, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<ActionRecord>, LedgerError> {
        let file = File::open(path.as_ref()).map_err(|source| LedgerError::IoError {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|source| LedgerError::IoError {
                path: path.as_ref().display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Verify the hash chain of a log file. Hashes the raw lines, not
    /// re-serialized records, so field ordering cannot break verification.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<bool, LedgerError> {
        let file = File::open(path.as_ref()).map_err(|source| LedgerError::IoError {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| LedgerError::IoError {
                path: path.as_ref().display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ActionRecord = serde_json::from_str(&line)?;
            if record.previous_hash != previous_hash {
                return Err(LedgerError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: record.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            previous_hash = Some(hash_str(&line));
        }

        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash of the last line in an existing log file.
    fn read_last_hash(path: &Path) -> Result<Option<String>, LedgerError> {
        let file = File::open(path).map_err(|source| LedgerError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut last = None;
        for line in reader.lines() {
            let line = line.map_err(|source| LedgerError::IoError {
                path: path.display().to_string(),
                source,
            })?;
            if !line.trim().is_empty() {
                last = Some(hash_str(&line));
            }
        }
        Ok(last)
    }
}

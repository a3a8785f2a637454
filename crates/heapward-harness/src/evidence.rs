//! JSONL evidence records with a trailing SHA-256 seal.
//!
//! Every record is one JSON object per line. When the log is sealed, a
//! final line carries the hex digest of everything above it, so a reader
//! can detect a truncated or edited report.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

/// One line of the evidence log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub timestamp: String,
    pub scenario: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Seal {
    digest: String,
}

/// Accumulates records and hashes them as they arrive.
pub struct EvidenceLog {
    lines: Vec<String>,
    hasher: Sha256,
}

impl EvidenceLog {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            hasher: Sha256::new(),
        }
    }

    pub fn push(&mut self, record: &EvidenceRecord) -> serde_json::Result<()> {
        let line = serde_json::to_string(record)?;
        self.hasher.update(line.as_bytes());
        self.hasher.update(b"\n");
        self.lines.push(line);
        Ok(())
    }

    /// Consumes the log and returns all lines with the seal appended.
    pub fn seal(self) -> Vec<String> {
        let digest = format!("sha256:{:x}", self.hasher.finalize());
        let mut lines = self.lines;
        // The seal line always serializes; a plain string field cannot fail.
        if let Ok(seal) = serde_json::to_string(&Seal { digest }) {
            lines.push(seal);
        }
        lines
    }

    /// Seals the log and appends it to `path`, one line per record.
    pub fn write_to(self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for line in self.seal() {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

impl Default for EvidenceLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that the last line of a sealed log matches the digest of the
/// lines above it.
pub fn verify(lines: &[String]) -> bool {
    let Some((seal_line, records)) = lines.split_last() else {
        return false;
    };
    let Ok(seal) = serde_json::from_str::<Seal>(seal_line) else {
        return false;
    };
    let mut hasher = Sha256::new();
    for line in records {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    seal.digest == format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(scenario: &str, outcome: Outcome) -> EvidenceRecord {
        EvidenceRecord {
            timestamp: "unix:1700000000".to_owned(),
            scenario: scenario.to_owned(),
            outcome,
            detail: None,
        }
    }

    #[test]
    fn sealed_log_verifies() {
        let mut log = EvidenceLog::new();
        log.push(&record("stats", Outcome::Pass)).unwrap();
        log.push(&record("double-free", Outcome::Pass)).unwrap();
        let lines = log.seal();
        assert_eq!(lines.len(), 3);
        assert!(verify(&lines));
    }

    #[test]
    fn tampered_log_fails_verification() {
        let mut log = EvidenceLog::new();
        log.push(&record("stats", Outcome::Pass)).unwrap();
        let mut lines = log.seal();
        lines[0] = lines[0].replace("pass", "fail");
        assert!(!verify(&lines));
    }

    #[test]
    fn truncated_log_fails_verification() {
        let mut log = EvidenceLog::new();
        log.push(&record("stats", Outcome::Pass)).unwrap();
        log.push(&record("leaks", Outcome::Fail)).unwrap();
        let mut lines = log.seal();
        lines.remove(0);
        assert!(!verify(&lines));
    }

    #[test]
    fn records_round_trip_through_json() {
        let rec = EvidenceRecord {
            timestamp: "unix:1700000000".to_owned(),
            scenario: "wild-write".to_owned(),
            outcome: Outcome::Fail,
            detail: Some("canary mismatch".to_owned()),
        };
        let line = serde_json::to_string(&rec).unwrap();
        let back: EvidenceRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn sealed_empty_log_verifies_but_no_lines_do_not() {
        assert!(!verify(&[]));
        assert!(verify(&EvidenceLog::new().seal()));
    }
}

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("opening audit log `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("audit logger task is no longer running")]
    Closed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub profile: String,
    pub tool: String,
    pub argument_fingerprint: String,
    pub request_id: String,
    pub target: String,
    pub outcome: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub duration_ms: u64,
}

impl AuditRecord {
    pub fn fingerprint(args: &serde_json::Value) -> String {
        fnv1a64_hex(&serde_json::to_vec(args).unwrap_or_default())
    }
}

fn fnv1a64_hex(bytes: &[u8]) -> String {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{hash:016x}")
}

/// Single background task owning the append-only audit file. Every call to
/// [`AuditLogger::record`] flushes the write before acknowledging, so a
/// crash between the two events never leaves the audit trail ahead of what
/// the client actually saw (§4.4).
#[derive(Clone)]
pub struct AuditLogger {
    sender: mpsc::Sender<(AuditRecord, oneshot::Sender<()>)>,
}

impl AuditLogger {
    pub fn spawn(path: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::Open { path: path.to_path_buf(), source })?;

        let (sender, mut receiver) = mpsc::channel::<(AuditRecord, oneshot::Sender<()>)>(256);
        tokio::task::spawn_blocking(move || {
            while let Some((record, ack)) = receiver.blocking_recv() {
                if let Ok(line) = serde_json::to_string(&record) {
                    let _ = writeln!(file, "{line}");
                    let _ = file.flush();
                }
                let _ = ack.send(());
            }
        });

        Ok(Self { sender })
    }

    pub async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender
            .send((record, ack_tx))
            .await
            .map_err(|_| AuditError::Closed)?;
        ack_rx.await.map_err(|_| AuditError::Closed)
    }
}

pub fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_flushed_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let logger = AuditLogger::spawn(&path).unwrap();

        logger
            .record(AuditRecord {
                timestamp: Utc::now(),
                profile: "staging".into(),
                tool: "ssh_execute".into(),
                argument_fingerprint: "abc".into(),
                request_id: "3".into(),
                target: "h1".into(),
                outcome: "0".into(),
                bytes_in: 1,
                bytes_out: 2,
                duration_ms: 5,
            })
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("ssh_execute"));
    }

    #[test]
    fn fingerprint_is_stable_for_equal_arguments() {
        let a = serde_json::json!({"server": "h1", "command": "echo ok"});
        let b = serde_json::json!({"server": "h1", "command": "echo ok"});
        assert_eq!(AuditRecord::fingerprint(&a), AuditRecord::fingerprint(&b));
    }
}

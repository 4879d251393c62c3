//! SQLite-backed alert store. The full alert payload (event, verdict, action
//! record) is AES-GCM encrypted at rest; indexed columns carry only what
//! queries need. A SHA-256 hash of the plaintext makes tampering detectable.

use crate::error::{Result, TriageError};
use crate::event::LogEvent;
use crate::fusion::Verdict;
use crate::response::ActionRecord;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| TriageError::Crypto(format!("bad key: {e:?}")))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|e| TriageError::Crypto(format!("{e:?}")))?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| TriageError::Crypto(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(TriageError::Crypto("payload too short".to_string()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| TriageError::Crypto(format!("bad key: {e:?}")))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|e| TriageError::Crypto(format!("{e:?}")))
}

fn payload_hash(plaintext: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    BASE64.encode(hasher.finalize())
}

/// Decrypted alert as stored: the event that triggered it, the fused verdict,
/// and the action record at persistence time.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredAlert {
    pub event: LogEvent,
    pub verdict: Verdict,
    pub record: ActionRecord,
}

pub struct AlertStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AlertStore {
    /// Open or create the store at `path`. The key is derived from `secret`;
    /// deployment is expected to source it from the host key store.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                event_id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                severity TEXT NOT NULL,
                tier TEXT NOT NULL,
                confidence REAL NOT NULL,
                threat_type TEXT NOT NULL,
                record_id TEXT NOT NULL,
                status TEXT NOT NULL,
                payload_enc TEXT NOT NULL,
                payload_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_ts ON alerts(ts);
            CREATE INDEX IF NOT EXISTS idx_alerts_tier ON alerts(tier);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    /// Persist one alert, replacing any earlier row for the same event.
    pub fn insert_alert(
        &self,
        verdict: &Verdict,
        record: &ActionRecord,
        event: &LogEvent,
    ) -> Result<()> {
        let payload = StoredAlert {
            event: event.clone(),
            verdict: verdict.clone(),
            record: record.clone(),
        };
        let plain = serde_json::to_vec(&payload)
            .map_err(|e| TriageError::Crypto(format!("serialize: {e}")))?;
        let hash = payload_hash(&plain);
        let enc = encrypt(&self.key, &plain)?;

        self.conn.lock().expect("lock").execute(
            "INSERT OR REPLACE INTO alerts
             (event_id, ts, severity, tier, confidence, threat_type, record_id, status,
              payload_enc, payload_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                verdict.event_id,
                event.ts.timestamp(),
                format!("{:?}", verdict.severity).to_lowercase(),
                format!("{:?}", verdict.tier).to_uppercase(),
                verdict.confidence,
                verdict.threat_type,
                record.id.to_string(),
                format!("{:?}", record.status),
                enc,
                hash,
            ],
        )?;
        Ok(())
    }

    /// Decrypt and verify the alert for an event id.
    pub fn get_alert(&self, event_id: &str) -> Result<Option<StoredAlert>> {
        let conn = self.conn.lock().expect("lock");
        let mut stmt =
            conn.prepare("SELECT payload_enc, payload_hash FROM alerts WHERE event_id = ?1")?;
        let mut rows = stmt.query(params![event_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let enc: String = row.get(0)?;
        let stored_hash: String = row.get(1)?;

        let plain = decrypt(&self.key, &enc)?;
        if payload_hash(&plain) != stored_hash {
            return Err(TriageError::Crypto("payload hash mismatch".to_string()));
        }
        let alert = serde_json::from_slice(&plain)
            .map_err(|e| TriageError::Crypto(format!("deserialize: {e}")))?;
        Ok(Some(alert))
    }

    /// Retention: delete alerts with an event timestamp before `ts`.
    pub fn prune_before(&self, ts: i64) -> Result<u64> {
        let n = self
            .conn
            .lock()
            .expect("lock")
            .execute("DELETE FROM alerts WHERE ts < ?1", params![ts])?;
        Ok(n as u64)
    }

    pub fn alert_count(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("lock");
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogSource, Outcome};
    use crate::fusion::{Severity, Tier};
    use crate::response::{ActionStatus, ResponseMachine};

    fn fixture() -> (LogEvent, Verdict) {
        let event = LogEvent::new(
            LogSource::Cloudtrail,
            "svc_backup",
            "api_call",
            "/admin/keys",
            Outcome::Denied,
        );
        let verdict = Verdict {
            event_id: event.id.clone(),
            severity: Severity::High,
            tier: Tier::Red,
            confidence: 0.85,
            anomaly: 0.9,
            threat_type: "credential_access".to_string(),
        };
        (event, verdict)
    }

    async fn record_for(verdict: &Verdict) -> ActionRecord {
        let machine = ResponseMachine::new(std::sync::Arc::new(crate::response::LogOnlyExecutor));
        machine.submit(verdict).await
    }

    #[tokio::test]
    async fn round_trips_an_alert() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(&dir.path().join("alerts.db"), b"test-secret").unwrap();
        let (event, verdict) = fixture();
        let record = record_for(&verdict).await;

        store.insert_alert(&verdict, &record, &event).unwrap();
        let stored = store.get_alert(&event.id).unwrap().unwrap();
        assert_eq!(stored.verdict.threat_type, "credential_access");
        assert_eq!(stored.record.status, ActionStatus::PendingApproval);
        assert_eq!(stored.event.subject, "svc_backup");
    }

    #[tokio::test]
    async fn payload_is_not_plaintext_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(&dir.path().join("alerts.db"), b"test-secret").unwrap();
        let (event, verdict) = fixture();
        let record = record_for(&verdict).await;
        store.insert_alert(&verdict, &record, &event).unwrap();

        let enc: String = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT payload_enc FROM alerts", [], |row| row.get(0))
            .unwrap();
        assert!(!enc.contains("svc_backup"));
    }

    #[tokio::test]
    async fn wrong_key_fails_decryption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.db");
        let store = AlertStore::open(&path, b"secret-a").unwrap();
        let (event, verdict) = fixture();
        let record = record_for(&verdict).await;
        store.insert_alert(&verdict, &record, &event).unwrap();
        drop(store);

        let reopened = AlertStore::open(&path, b"secret-b").unwrap();
        assert!(matches!(
            reopened.get_alert(&event.id),
            Err(TriageError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn prune_removes_old_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(&dir.path().join("alerts.db"), b"test-secret").unwrap();
        let (event, verdict) = fixture();
        let record = record_for(&verdict).await;
        store.insert_alert(&verdict, &record, &event).unwrap();

        let removed = store.prune_before(event.ts.timestamp() + 1).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.alert_count().unwrap(), 0);
    }

    #[test]
    fn missing_alert_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(&dir.path().join("alerts.db"), b"test-secret").unwrap();
        assert!(store.get_alert("nope").unwrap().is_none());
    }
}

//! Backup-record types for the local-first backup tier (C1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of trying to upload a backed-up record to the external
/// `DataStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Success,
    Failed,
}

/// A single backed-up analysis run, persisted to disk before (and
/// independent of) any attempt to upload it to the external data store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub saved_at: DateTime<Utc>,
    pub company_name: String,
    /// Independent of `upload_status`: tracks specifically whether the
    /// external `DataStore` acknowledged the write, which is what
    /// `archive_old_backups` gates on. A record can be `upload_status:
    /// success` the instant the upload call returns but this flag is
    /// what a reader trusts for "safe to archive."
    pub uploaded_to_db: bool,
    pub upload_status: UploadStatus,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub upload_error: Option<String>,
    /// Opaque payload — the `AnalysisResult` plus whatever envelope the
    /// caller wants preserved. Kept as `Value` because the backup tier
    /// must round-trip records it never needs to interpret.
    pub data: Value,
}

impl BackupRecord {
    pub fn new(company_name: impl Into<String>, saved_at: DateTime<Utc>, data: Value) -> Self {
        Self {
            saved_at,
            company_name: company_name.into(),
            uploaded_to_db: false,
            upload_status: UploadStatus::Pending,
            uploaded_at: None,
            failed_at: None,
            upload_error: None,
            data,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.upload_status == UploadStatus::Success
    }

    pub fn mark_uploaded(&mut self, at: DateTime<Utc>) {
        self.uploaded_to_db = true;
        self.upload_status = UploadStatus::Success;
        self.uploaded_at = Some(at);
        self.failed_at = None;
        self.upload_error = None;
    }

    pub fn mark_failed(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.uploaded_to_db = false;
        self.upload_status = UploadStatus::Failed;
        self.failed_at = Some(at);
        self.upload_error = Some(error.into());
    }
}

/// Summary counts returned by `BackupStore::stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupStats {
    pub total: usize,
    pub pending: usize,
    pub uploaded: usize,
    pub failed: usize,
    /// `uploaded / total`, as a percentage in `[0, 100]`; `0.0` when
    /// `total` is zero.
    pub success_rate: f32,
    pub storage_bytes: u64,
    pub oldest_failed: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_pending() {
        let rec = BackupRecord::new("acme", Utc::now(), Value::Null);
        assert_eq!(rec.upload_status, UploadStatus::Pending);
        assert!(!rec.uploaded_to_db);
        assert!(!rec.is_uploaded());
    }

    #[test]
    fn mark_uploaded_clears_failure_fields() {
        let mut rec = BackupRecord::new("acme", Utc::now(), Value::Null);
        rec.mark_failed(Utc::now(), "timeout");
        assert_eq!(rec.upload_status, UploadStatus::Failed);
        assert!(!rec.uploaded_to_db);
        rec.mark_uploaded(Utc::now());
        assert!(rec.uploaded_to_db);
        assert!(rec.is_uploaded());
        assert!(rec.upload_error.is_none());
        assert!(rec.failed_at.is_none());
    }
}

//! Local-first backup tier (C1).
//!
//! Every engine gets its own subdirectory under a shared root; within an
//! engine, a `primary` area (organized into caller-chosen `subdir`s) and a
//! `failed-uploads/` area are independent. Writes are atomic (write to a
//! `.tmp` file in the same directory, then rename) so the retrier never
//! observes a partially written record; `tempfile::NamedTempFile` makes
//! this straightforward to get right.

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{BackupIOError, BackupResult};
use crate::types::backup::{BackupRecord, BackupStats, UploadStatus};

const FAILED_UPLOADS_DIR: &str = "failed-uploads";

/// Lowercase, replace runs of non-alphanumerics with a single dash, trim
/// leading/trailing dashes. Deterministic so two engines validating the
/// same company can't collide across subdirectories (the engine name is
/// always part of the path, not the filename).
pub fn slug(input: &str) -> String {
    let lower = input.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_dash = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

fn filename_for(company_name: &str, saved_at: DateTime<Utc>) -> String {
    format!("{}-{}.json", slug(company_name), saved_at.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// The two-tier, per-engine local backup store.
pub struct BackupStore {
    root: PathBuf,
    engine: String,
}

impl BackupStore {
    /// `root` is the shared `local-backups/` directory; `engine` names
    /// this store's subdirectory under it.
    pub fn new(root: impl Into<PathBuf>, engine: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            engine: engine.into(),
        }
    }

    fn primary_dir(&self, subdir: &str) -> PathBuf {
        self.root.join(&self.engine).join(subdir)
    }

    fn failed_dir(&self) -> PathBuf {
        self.root.join(&self.engine).join(FAILED_UPLOADS_DIR)
    }

    fn io_err(path: &Path, source: std::io::Error) -> BackupIOError {
        BackupIOError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    async fn write_atomic(path: &Path, record: &BackupRecord) -> BackupResult<()> {
        let dir = path.parent().expect("backup path always has a parent");
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Self::io_err(dir, e))?;

        let mut json = serde_json::to_vec(record)?;
        json.push(b'\n');

        let dir_owned = dir.to_path_buf();
        let path_owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> BackupResult<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir_owned)
                .map_err(|e| Self::io_err(&dir_owned, e))?;
            use std::io::Write;
            tmp.write_all(&json).map_err(|e| Self::io_err(&dir_owned, e))?;
            tmp.flush().map_err(|e| Self::io_err(&dir_owned, e))?;
            tmp.persist(&path_owned)
                .map_err(|e| Self::io_err(&path_owned, e.error))?;
            Ok(())
        })
        .await
        .expect("backup write task panicked")
    }

    async fn read_record(path: &Path) -> BackupResult<BackupRecord> {
        let bytes = tokio::fs::read(path).await.map_err(|e| Self::io_err(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write `record` as a newly created, pending file under `subdir` in
    /// the primary area.
    pub async fn save(&self, company_name: &str, data: Value, subdir: &str) -> BackupResult<PathBuf> {
        let saved_at = Utc::now();
        let record = BackupRecord::new(company_name, saved_at, data);
        let path = self.primary_dir(subdir).join(filename_for(company_name, saved_at));
        Self::write_atomic(&path, &record).await?;
        Ok(path)
    }

    /// Rewrite the record at `path` as successfully uploaded, in place.
    pub async fn mark_uploaded(&self, path: &Path) -> BackupResult<()> {
        let mut record = Self::read_record(path).await?;
        record.mark_uploaded(Utc::now());
        Self::write_atomic(path, &record).await
    }

    /// Rewrite the record as failed and atomically relocate it into
    /// `failed-uploads/`. Returns the new path.
    pub async fn mark_failed(&self, path: &Path, error: impl Into<String>) -> BackupResult<PathBuf> {
        let mut record = Self::read_record(path).await?;
        record.mark_failed(Utc::now(), error);

        let failed_dir = self.failed_dir();
        tokio::fs::create_dir_all(&failed_dir)
            .await
            .map_err(|e| Self::io_err(&failed_dir, e))?;
        let new_path = failed_dir.join(path.file_name().expect("backup path has a filename"));

        Self::write_atomic(&new_path, &record).await?;
        if new_path != path {
            tokio::fs::remove_file(path).await.map_err(|e| Self::io_err(path, e))?;
        }
        Ok(new_path)
    }

    /// Retry every file currently in `failed-uploads/`, sequentially (so
    /// upstream rate limits stay predictable), moving successes back into
    /// the primary directory under `subdir`.
    pub async fn retry_failed<F, Fut>(&self, subdir: &str, upload_fn: F) -> BackupResult<RetryStats>
    where
        F: Fn(Value) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let failed_dir = self.failed_dir();
        let mut stats = RetryStats::default();

        let mut entries = match tokio::fs::read_dir(&failed_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(Self::io_err(&failed_dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::io_err(&failed_dir, e))? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(entry.path());
            }
        }
        paths.sort();

        for path in paths {
            let record = Self::read_record(&path).await?;
            match upload_fn(record.data.clone()).await {
                Ok(()) => {
                    let new_path = self.primary_dir(subdir).join(path.file_name().unwrap());
                    let mut record = record;
                    record.mark_uploaded(Utc::now());
                    Self::write_atomic(&new_path, &record).await?;
                    tokio::fs::remove_file(&path).await.map_err(|e| Self::io_err(&path, e))?;
                    stats.succeeded += 1;
                }
                Err(error) => {
                    let mut record = record;
                    record.mark_failed(Utc::now(), error);
                    Self::write_atomic(&path, &record).await?;
                    stats.still_failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Delete primary-area files uploaded at least `days_old` days ago.
    /// Re-checks the predicate on the freshly re-read record immediately
    /// before deleting each file, closing the race where a concurrent
    /// retry could mark a file failed between the scan and the delete.
    pub async fn archive_old_backups(&self, days_old: i64) -> BackupResult<ArchiveStats> {
        let engine_dir = self.root.join(&self.engine);
        let mut stats = ArchiveStats::default();

        let mut dirs = match tokio::fs::read_dir(&engine_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(Self::io_err(&engine_dir, e)),
        };

        let mut subdirs = Vec::new();
        while let Some(entry) = dirs.next_entry().await.map_err(|e| Self::io_err(&engine_dir, e))? {
            let path = entry.path();
            if path.is_dir() && path.file_name().and_then(|n| n.to_str()) != Some(FAILED_UPLOADS_DIR) {
                subdirs.push(path);
            }
        }

        let cutoff = Utc::now() - chrono::Duration::days(days_old);

        for subdir in subdirs {
            let mut entries = tokio::fs::read_dir(&subdir).await.map_err(|e| Self::io_err(&subdir, e))?;
            let mut paths = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(|e| Self::io_err(&subdir, e))? {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                    paths.push(entry.path());
                }
            }

            for path in paths {
                // Re-read immediately before deciding, so a file marked
                // failed by a concurrent retry after the directory scan
                // is never deleted.
                let record = match Self::read_record(&path).await {
                    Ok(r) => r,
                    Err(_) => continue,
                };
                let eligible = record.uploaded_to_db && record.uploaded_at.map(|at| at <= cutoff).unwrap_or(false);
                if eligible {
                    stats.bytes_freed += tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        stats.deleted += 1;
                    }
                } else {
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Scan both areas once and summarize.
    pub async fn stats(&self) -> BackupResult<BackupStats> {
        let engine_dir = self.root.join(&self.engine);
        let mut out = BackupStats::default();

        let mut dirs = match tokio::fs::read_dir(&engine_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(Self::io_err(&engine_dir, e)),
        };

        let mut all_dirs = Vec::new();
        while let Some(entry) = dirs.next_entry().await.map_err(|e| Self::io_err(&engine_dir, e))? {
            if entry.path().is_dir() {
                all_dirs.push(entry.path());
            }
        }

        for dir in all_dirs {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| Self::io_err(&dir, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| Self::io_err(&dir, e))? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let record = match Self::read_record(&path).await {
                    Ok(r) => r,
                    Err(_) => continue,
                };
                out.total += 1;
                out.storage_bytes += tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                match record.upload_status {
                    UploadStatus::Pending => out.pending += 1,
                    UploadStatus::Success => out.uploaded += 1,
                    UploadStatus::Failed => {
                        out.failed += 1;
                        if let Some(failed_at) = record.failed_at {
                            out.oldest_failed = Some(match out.oldest_failed {
                                Some(oldest) => oldest.min(failed_at),
                                None => failed_at,
                            });
                        }
                    }
                }
            }
        }

        out.success_rate = if out.total == 0 {
            0.0
        } else {
            (out.uploaded as f32 / out.total as f32) * 100.0
        };

        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub succeeded: usize,
    pub still_failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveStats {
    pub deleted: usize,
    pub skipped: usize,
    pub bytes_freed: u64,
}

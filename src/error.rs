//! Typed errors for the audit pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling, matching the failure
//! taxonomy the pipeline's partial-failure policy depends on.

use thiserror::Error;

/// Top-level error returned by fatal pipeline stages.
#[derive(Debug, Error)]
pub enum Error {
    /// The crawl stage produced zero successful pages, or no homepage
    /// could be identified among the successes.
    #[error("crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    /// The persist stage failed against the data store AND the backup
    /// store also failed to record the attempt.
    #[error("persist failed: {0}")]
    Persist(#[from] PersistError),

    /// A backup store write/move/rename failed.
    #[error("backup I/O error: {0}")]
    BackupIO(#[from] BackupIOError),

    /// Security validation of a caller- or crawl-discovered URL failed.
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// JSON parsing of a model response failed where a well-formed
    /// fallback could not be substituted.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Result type alias for top-level pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during crawl operations.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Security validation failed for the starting URL or a discovered link.
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// The capture capability itself failed to respond (transport error).
    #[error("capture transport error: {0}")]
    Transport(String),

    /// Zero pages were captured successfully.
    #[error("zero pages captured")]
    NoPagesSucceeded,

    /// A homepage could not be identified among the successfully
    /// captured pages.
    #[error("homepage could not be identified")]
    NoHomepage,
}

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://).
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, internal IPs).
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8).
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host.
    #[error("URL has no host")]
    NoHost,

    /// DNS resolution failed.
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Errors that can occur persisting a record to the data store.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The data store operation itself failed.
    #[error("data store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The data store failed AND the backup store failed to record the
    /// attempt either — this is the only truly unrecoverable persist path.
    #[error("data store failed ({store_error}) and backup also failed: {backup_error}")]
    StoreAndBackupFailed {
        store_error: String,
        backup_error: String,
    },
}

/// Errors raised by the local-first backup store.
#[derive(Debug, Error)]
pub enum BackupIOError {
    /// The filesystem rejected a write, rename, or create-dir operation.
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A backup record failed to serialize.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for backup store operations.
pub type BackupResult<T> = std::result::Result<T, BackupIOError>;

/// Raised by a single analyzer invocation; always caught by the
/// `AnalyzerRuntime` and converted into a degraded, well-formed
/// `AnalyzerResult` rather than unwinding the pipeline.
#[derive(Debug, Error)]
#[error("analyzer {analyzer} failed: {reason}")]
pub struct DegradedAnalyzerError {
    pub analyzer: String,
    pub reason: String,
}

/// Raised by any AI-assisted stage (selection, dedup, ranking, validation,
/// benchmark matching) that has a documented deterministic fallback.
#[derive(Debug, Error)]
#[error("AI call failed, falling back: {0}")]
pub struct RecoverableAIError(pub String);

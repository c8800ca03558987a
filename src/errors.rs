#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("an error occurred with the database connection")]
    Database(#[from] diesel::result::Error),

    #[error("an error occurred getting a database connection")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("an error occurred parsing a csv record")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parsing(#[from] ParseError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// A run was canceled cooperatively. Carries no data; the orchestrator
    /// uses this to distinguish a clean cancel (exit 130) from a failure.
    #[error("run canceled")]
    Canceled,
}

/// Mirrors the `MalformedDocument` error kind from the parser contract.
/// Carries the offending path so the orchestrator can quarantine the file.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("malformed document {path}: {detail}")]
    MalformedDocument { path: String, detail: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    DateFormat(#[from] chrono::ParseError),

    #[error("expected element not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Int(#[from] std::num::ParseIntError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration key: {0}")]
    Missing(String),

    #[error("invalid value for configuration key {key}: {detail}")]
    Invalid { key: String, detail: String },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Errors surfaced by a `Loader` implementation's lifecycle operations.
/// The variant names line up with spec §7's error-kind table so the
/// orchestrator can decide a run's final status without inspecting strings.
#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error("writer failed for table {table}: {detail}")]
    Writer { table: String, detail: String },

    #[error("bulk ingest into staging failed: {0}")]
    Staging(String),

    #[error("merge from staging failed: {0}")]
    Merge(String),

    #[error("post-merge integrity check failed: {0}")]
    Integrity(String),

    #[error("transient database error after {attempts} attempts: {detail}")]
    Transient { attempts: u32, detail: String },

    #[error("a run is already in progress (run_id={0})")]
    AlreadyRunning(uuid::Uuid),
}

#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("no archive source is configured; pass --source or register an AcquisitionSource")]
    NotConfigured,

    #[error("fetching archives failed after retries: {0}")]
    RequestFailed(String),
}

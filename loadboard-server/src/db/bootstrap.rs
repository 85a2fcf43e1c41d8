use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use shared::config::server::DatabaseConfig;

/// Script folders under the bootstrap root, applied in this order.
const STAGES: &[ScriptStage] = &[ScriptStage::Schema, ScriptStage::Indexes, ScriptStage::Seed];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptStage {
    Schema,
    Indexes,
    Seed,
}

impl ScriptStage {
    const fn label(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Indexes => "indexes",
            Self::Seed => "seed",
        }
    }

    const fn required(self) -> bool {
        matches!(self, Self::Schema)
    }
}

impl std::fmt::Display for ScriptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure while applying the bootstrap scripts.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database bootstrap directory does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("database bootstrap stage '{stage}' missing at {path}")]
    MissingStage { stage: &'static str, path: PathBuf },
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error executing {path}: {source}")]
    Sql {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
}

/// Every script to run, in stage order then file name order.
///
/// # Errors
/// Fails when the root or the `schema` stage is missing, or a directory cannot be read.
pub fn plan(root: &Path) -> Result<Vec<PathBuf>, BootstrapError> {
    if !root.exists() {
        return Err(BootstrapError::MissingRoot(root.to_path_buf()));
    }

    let mut scripts = Vec::new();
    for stage in STAGES {
        let stage_path = root.join(stage.label());
        if !stage_path.exists() {
            if stage.required() {
                return Err(BootstrapError::MissingStage {
                    stage: stage.label(),
                    path: stage_path,
                });
            }
            debug!(stage = %stage, "optional bootstrap stage absent");
            continue;
        }

        let files = collect_sql_files(&stage_path)?;
        debug!(stage = %stage, count = files.len(), "bootstrap scripts found");
        scripts.extend(files);
    }

    Ok(scripts)
}

/// Execute all bootstrap SQL scripts in the configured order.
///
/// # Errors
/// Returns the first planning or execution failure.
pub async fn run(pool: &PgPool, config: &DatabaseConfig) -> Result<(), BootstrapError> {
    let root = &config.bootstrap_path;
    info!(path = %root.display(), "running database bootstrap");

    for path in plan(root)? {
        apply_script(pool, &path).await?;
    }

    Ok(())
}

/// Simple liveness check used during startup.
///
/// # Errors
/// Returns the driver error when the database cannot be reached.
pub async fn ensure_liveness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Readiness probe: the chat tables exist and answer queries.
///
/// # Errors
/// Returns the driver error when the schema is missing or the database is down.
pub async fn ensure_readiness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1 FROM messages LIMIT 1")
        .execute(pool)
        .await
        .map(|_| ())
}

fn collect_sql_files(dir: &Path) -> Result<Vec<PathBuf>, BootstrapError> {
    let read_dir = fs::read_dir(dir).map_err(|source| BootstrapError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| BootstrapError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
        {
            entries.push(path);
        }
    }

    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}

async fn apply_script(pool: &PgPool, path: &Path) -> Result<(), BootstrapError> {
    let sql = fs::read_to_string(path).map_err(|source| BootstrapError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let trimmed = sql.trim();
    if trimmed.is_empty() {
        warn!(path = %path.display(), "skipping empty bootstrap script");
        return Ok(());
    }

    let sql_error = |source: sqlx::Error| BootstrapError::Sql {
        path: path.to_path_buf(),
        source,
    };

    let mut transaction = pool.begin().await.map_err(sql_error)?;
    info!(script = %path.display(), "executing bootstrap script");
    sqlx::raw_sql(trimmed)
        .execute(&mut *transaction)
        .await
        .map_err(sql_error)?;
    transaction.commit().await.map_err(sql_error)
}

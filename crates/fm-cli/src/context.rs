//! Runtime context for CLI commands

use anyhow::{Context, Result};
use fm_core::{Config, SourceConfig};
use fm_db::{run_migrations, Database, DuckDbBackend};
use fm_migrate::{new_run_id, AuditLog, JsonIdentityDirectory, LocalBlobStore, MigrateError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;
use crate::commands::common::ExitCode;

/// Runtime context containing loaded configuration and the migrated store
pub struct RuntimeContext {
    /// The loaded configuration
    pub config: Config,

    /// Project root every relative config path resolves against
    pub root: PathBuf,

    /// Canonical store connection
    pub db: Arc<dyn Database>,

    /// Verbose output enabled
    pub verbose: bool,
}

impl RuntimeContext {
    /// Load configuration, open the store, and apply pending migrations.
    ///
    /// Failing to open or migrate the store exits with code 4.
    pub async fn new(args: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&args.project_dir);

        let config = if let Some(config_path) = &args.config {
            Config::load(Path::new(config_path)).context("Failed to load configuration file")?
        } else {
            Config::load_from_dir(&root).context("Failed to load project configuration")?
        };

        let db_path = args
            .target
            .clone()
            .unwrap_or_else(|| config.database_path_absolute(&root));
        let db = match open_store(&db_path).await {
            Ok(db) => db,
            Err(e) => {
                eprintln!("✗ Failed to open store {}: {:#}", db_path, e);
                return Err(ExitCode(4).into());
            }
        };

        let ctx = Self {
            config,
            root,
            db,
            verbose: args.verbose,
        };
        ctx.verbose(&format!("Using store {}", db_path));
        Ok(ctx)
    }

    /// Print verbose output if enabled
    pub fn verbose(&self, msg: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", msg);
        }
    }

    /// One named source, or every source in config order.
    pub fn select_sources(&self, name: Option<&str>) -> Result<Vec<&SourceConfig>> {
        match name {
            Some(name) => {
                let source = self.source(name)?;
                Ok(vec![source])
            }
            None => Ok(self.config.sources.iter().collect()),
        }
    }

    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.config.source(name).ok_or_else(|| {
            MigrateError::UnknownSource {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn blob_store(&self) -> LocalBlobStore {
        LocalBlobStore::new(self.config.blob_root_absolute(&self.root))
    }

    /// Audit log for a new run, writing under the configured log directory.
    pub fn open_audit(&self) -> Result<AuditLog> {
        let log_dir = self.config.log_dir_absolute(&self.root);
        let audit = AuditLog::open(self.db.clone(), new_run_id(), &log_dir)
            .context("Failed to open the migration log")?;
        self.verbose(&format!(
            "Audit run {} logging to {}",
            audit.run_id(),
            log_dir.display()
        ));
        Ok(audit)
    }

    /// The identity export at `override_path`, or the configured one.
    pub fn identity_directory(
        &self,
        override_path: Option<&str>,
    ) -> Result<Option<JsonIdentityDirectory>> {
        let path = match override_path {
            Some(p) => Some(PathBuf::from(p)),
            None => self.config.identity_directory_absolute(&self.root),
        };
        match path {
            Some(path) => {
                let directory = JsonIdentityDirectory::load(&path)
                    .with_context(|| format!("Failed to load identity export {}", path.display()))?;
                Ok(Some(directory))
            }
            None => Ok(None),
        }
    }
}

async fn open_store(db_path: &str) -> Result<Arc<dyn Database>> {
    if db_path != ":memory:" {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
    }

    let db: Arc<dyn Database> =
        Arc::new(DuckDbBackend::new(db_path).context("Failed to connect to database")?);
    let applied = run_migrations(&*db)
        .await
        .context("Failed to migrate the store schema")?;
    if applied > 0 {
        log::info!("Applied {} store migration(s)", applied);
    }
    Ok(db)
}

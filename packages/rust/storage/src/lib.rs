//! libSQL persistence for pipeline runs (offline mode).
//!
//! The [`RunStore`] keeps one row per [`PipelineResult`] plus one row per stage
//! outcome. The pipeline itself never writes here; callers persist the result
//! they get back from a run.

mod migrations;

use std::path::Path;

use chrono::Utc;
use entitygraph_shared::{EntityGraphError, PipelineResult, Result, RunId};
use libsql::{Connection, Database, params};
use serde::Serialize;

fn storage_err(e: impl std::fmt::Display) -> EntityGraphError {
    EntityGraphError::Storage(e.to_string())
}

/// Storage handle wrapping a libSQL database.
pub struct RunStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// One line of `list_runs` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub subject_url: String,
    pub subject_name: Option<String>,
    pub overall_succeeded: bool,
    pub is_notable: Option<bool>,
    pub published: Option<bool>,
    pub total_duration_ms: u64,
    pub created_at: String,
}

/// A stored stage outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub status: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl RunStore {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EntityGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self {
            db,
            conn,
            readonly: false,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing database at `path` for inspection only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    EntityGraphError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(EntityGraphError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Persist a finished run and its stage outcomes.
    pub async fn insert_run(&self, result: &PipelineResult) -> Result<()> {
        self.check_writable()?;

        let run_id = result.run_id.to_string();
        let result_json = serde_json::to_string(result)
            .map_err(|e| EntityGraphError::Storage(format!("serialize run: {e}")))?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        if let Err(e) = write_run(&tx, result, &run_id, &result_json, &now).await {
            tx.rollback().await.map_err(storage_err)?;
            return Err(e);
        }
        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(run_id = %result.run_id, "run persisted");
        Ok(())
    }

    /// Load a run's full result.
    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<PipelineResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT result_json FROM pipeline_runs WHERE id = ?1",
                params![run_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let json: String = row.get(0).map_err(storage_err)?;
                let result = serde_json::from_str(&json)
                    .map_err(|e| EntityGraphError::Storage(format!("corrupt run {run_id}: {e}")))?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, subject_url, subject_name, overall_succeeded, is_notable, published,
                        total_duration_ms, created_at
                 FROM pipeline_runs ORDER BY created_at DESC, id DESC LIMIT ?1",
                params![i64::from(limit)],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(RunSummary {
                run_id: row.get(0).map_err(storage_err)?,
                subject_url: row.get(1).map_err(storage_err)?,
                subject_name: row.get(2).ok(),
                overall_succeeded: row.get::<i64>(3).map_err(storage_err)? != 0,
                is_notable: row.get::<i64>(4).ok().map(|v| v != 0),
                published: row.get::<i64>(5).ok().map(|v| v != 0),
                total_duration_ms: row.get::<i64>(6).map_err(storage_err)?.max(0) as u64,
                created_at: row.get(7).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Stage outcomes of a run, in pipeline order.
    pub async fn stage_outcomes(&self, run_id: &RunId) -> Result<Vec<StageRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stage, status, duration_ms, error FROM stage_outcomes
                 WHERE run_id = ?1 ORDER BY position",
                params![run_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(StageRecord {
                stage: row.get(0).map_err(storage_err)?,
                status: row.get(1).map_err(storage_err)?,
                duration_ms: row.get::<i64>(2).map_err(storage_err)?.max(0) as u64,
                error: row.get(3).ok(),
            });
        }
        Ok(results)
    }
}

/// Insert the run row and its stage rows on `conn`.
async fn write_run(
    conn: &Connection,
    result: &PipelineResult,
    run_id: &str,
    result_json: &str,
    now: &str,
) -> Result<()> {
    let subject_name = result.subject.as_ref().map(|s| s.name.as_str());
    let is_notable = result.notability.as_ref().map(|v| i64::from(v.is_notable));
    let published = result.publish_outcome.as_ref().map(|p| i64::from(p.succeeded));

    conn.execute(
        "INSERT INTO pipeline_runs (id, subject_url, subject_name, overall_succeeded,
             total_duration_ms, terminal_error, result_json, created_at, is_notable, published)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            run_id,
            result.subject_url.as_str(),
            subject_name,
            i64::from(result.overall_succeeded),
            result.total_duration_ms as i64,
            result.terminal_error.as_deref(),
            result_json,
            now,
            is_notable,
            published
        ],
    )
    .await
    .map_err(storage_err)?;

    for (position, outcome) in result.stages.iter().enumerate() {
        let error = outcome.error();
        conn.execute(
            "INSERT INTO stage_outcomes (run_id, position, stage, status, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                position as i64,
                outcome.stage.as_str(),
                outcome.status.label(),
                outcome.duration_ms as i64,
                error.as_deref()
            ],
        )
        .await
        .map_err(storage_err)?;
    }
    Ok(())
}

//! SQL migration definitions for the Entitygraph run database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: pipeline_runs, stage_outcomes",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per pipeline run; the full result is kept as JSON
CREATE TABLE IF NOT EXISTS pipeline_runs (
    id                TEXT PRIMARY KEY,
    subject_url       TEXT NOT NULL,
    subject_name      TEXT,
    overall_succeeded INTEGER NOT NULL,
    total_duration_ms INTEGER NOT NULL,
    terminal_error    TEXT,
    result_json       TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_created_at ON pipeline_runs(created_at);
CREATE INDEX IF NOT EXISTS idx_runs_subject_url ON pipeline_runs(subject_url);

-- Per-stage outcome rows for querying without decoding result_json
CREATE TABLE IF NOT EXISTS stage_outcomes (
    run_id      TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    stage       TEXT NOT NULL,
    status      TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    error       TEXT,
    PRIMARY KEY (run_id, stage)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Notability and publish summary columns",
            sql: r#"
ALTER TABLE pipeline_runs ADD COLUMN is_notable INTEGER;
ALTER TABLE pipeline_runs ADD COLUMN published INTEGER;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

//! Database schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The current schema
//! version is tracked in the SQLite `user_version` pragma.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
/// Versions start at 1.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial schema",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id           TEXT    NOT NULL UNIQUE,
            name                TEXT    NOT NULL,
            description         TEXT,
            owner_id            TEXT    NOT NULL,
            parent_project_id   INTEGER REFERENCES projects (id) ON DELETE SET NULL,
            is_public           INTEGER NOT NULL DEFAULT 1,
            tags                TEXT    NOT NULL DEFAULT '[]',
            created_at          TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects (owner_id);

        CREATE TABLE IF NOT EXISTS commits (
            hash            TEXT PRIMARY KEY,
            project_id      INTEGER NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
            author_id       TEXT    NOT NULL,
            message         TEXT    NOT NULL,
            -- parent links and branch HEADs are validated at write time by the
            -- engine rather than by FK constraints, so project cascade deletes
            -- are not order-sensitive
            parent_hash     TEXT,
            asset_snapshot  TEXT    NOT NULL DEFAULT '{}',
            created_at      TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_commits_project ON commits (project_id);
        CREATE INDEX IF NOT EXISTS idx_commits_parent ON commits (parent_hash);

        CREATE TABLE IF NOT EXISTS branches (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id           TEXT    NOT NULL UNIQUE,
            project_id          INTEGER NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
            name                TEXT    NOT NULL,
            head_commit_hash    TEXT,
            creator_id          TEXT    NOT NULL,
            description         TEXT,
            tags                TEXT    NOT NULL DEFAULT '[]',
            parent_branch_id    INTEGER REFERENCES branches (id) ON DELETE SET NULL,
            workspace_data      TEXT,
            created_at          TEXT    NOT NULL,
            UNIQUE (project_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_branches_project ON branches (project_id);
        CREATE INDEX IF NOT EXISTS idx_branches_creator ON branches (creator_id);

        CREATE TABLE IF NOT EXISTS clip_segments (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id       TEXT    NOT NULL UNIQUE,
            project_id      INTEGER NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
            -- branch references are plain ids: clips and merge requests may
            -- outlive nothing (branches are never deleted on their own), and
            -- keeping them unconstrained keeps project cascade deletes
            -- order-insensitive
            branch_id       INTEGER,
            owner_id        TEXT    NOT NULL,
            title           TEXT,
            summary         TEXT,
            input_artifacts TEXT,
            assets_ref      TEXT,
            status          TEXT    NOT NULL DEFAULT 'pending',
            result          TEXT,
            error           TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_clip_segments_branch ON clip_segments (project_id, branch_id);
        CREATE INDEX IF NOT EXISTS idx_clip_segments_status ON clip_segments (status);

        CREATE TABLE IF NOT EXISTS merge_requests (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id           TEXT    NOT NULL UNIQUE,
            project_id          INTEGER NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
            creator_id          TEXT    NOT NULL,
            source_branch_id    INTEGER NOT NULL,
            target_branch_id    INTEGER NOT NULL,
            title               TEXT,
            description         TEXT,
            clip_ids            TEXT    NOT NULL DEFAULT '[]',
            merged_clip_ids     TEXT,
            status              TEXT    NOT NULL DEFAULT 'open',
            merged_by           TEXT,
            merged_at           TEXT,
            created_at          TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_merge_requests_project ON merge_requests (project_id);
        CREATE INDEX IF NOT EXISTS idx_merge_requests_status ON merge_requests (status);

        CREATE TABLE IF NOT EXISTS fork_requests (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            public_id           TEXT    NOT NULL UNIQUE,
            project_id          INTEGER NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
            requester_id        TEXT    NOT NULL,
            commit_hash         TEXT,
            status              TEXT    NOT NULL DEFAULT 'pending',
            reviewer_id         TEXT,
            reviewed_at         TEXT,
            approved_project_id INTEGER REFERENCES projects (id) ON DELETE SET NULL,
            created_at          TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_fork_requests_project ON fork_requests (project_id);
        CREATE INDEX IF NOT EXISTS idx_fork_requests_status ON fork_requests (status);
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking database migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

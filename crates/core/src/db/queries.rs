//! Typed query helpers for every table in the ReelVC database.
//!
//! Helpers that must run inside a multi-statement transaction (commit +
//! HEAD update, merge finalization, fork approval) are exposed as `*_tx`
//! free functions taking a raw [`Connection`]; everything else is a method
//! on [`Database`].

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;

// ---------------------------------------------------------------------------
// Row structs returned by queries
// ---------------------------------------------------------------------------

/// A row from the `projects` table.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub public_id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub parent_project_id: Option<i64>,
    pub is_public: bool,
    pub tags: String,
    pub created_at: String,
}

/// A row from the `branches` table.
#[derive(Debug, Clone)]
pub struct BranchRow {
    pub id: i64,
    pub public_id: String,
    pub project_id: i64,
    pub name: String,
    pub head_commit_hash: Option<String>,
    pub creator_id: String,
    pub description: Option<String>,
    pub tags: String,
    pub parent_branch_id: Option<i64>,
    pub workspace_data: Option<String>,
    pub created_at: String,
}

/// A row from the `commits` table.
#[derive(Debug, Clone)]
pub struct CommitRow {
    pub hash: String,
    pub project_id: i64,
    pub author_id: String,
    pub message: String,
    pub parent_hash: Option<String>,
    pub asset_snapshot: String,
    pub created_at: String,
}

/// A row from the `clip_segments` table.
#[derive(Debug, Clone)]
pub struct ClipRow {
    pub id: i64,
    pub public_id: String,
    pub project_id: i64,
    pub branch_id: Option<i64>,
    pub owner_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub input_artifacts: Option<String>,
    pub assets_ref: Option<String>,
    pub status: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Field set for inserting a clip segment.
#[derive(Debug, Clone, Default)]
pub struct NewClip {
    pub public_id: String,
    pub project_id: i64,
    pub branch_id: Option<i64>,
    pub owner_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub input_artifacts: Option<String>,
    pub assets_ref: Option<String>,
    pub status: String,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// A row from the `merge_requests` table.
#[derive(Debug, Clone)]
pub struct MergeRequestRow {
    pub id: i64,
    pub public_id: String,
    pub project_id: i64,
    pub creator_id: String,
    pub source_branch_id: i64,
    pub target_branch_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub clip_ids: String,
    pub merged_clip_ids: Option<String>,
    pub status: String,
    pub merged_by: Option<String>,
    pub merged_at: Option<String>,
    pub created_at: String,
}

/// A row from the `fork_requests` table.
#[derive(Debug, Clone)]
pub struct ForkRequestRow {
    pub id: i64,
    pub public_id: String,
    pub project_id: i64,
    pub requester_id: String,
    pub commit_hash: Option<String>,
    pub status: String,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<String>,
    pub approved_project_id: Option<i64>,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn map_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        public_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        owner_id: row.get(4)?,
        parent_project_id: row.get(5)?,
        is_public: row.get::<_, i64>(6)? != 0,
        tags: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_branch(row: &rusqlite::Row<'_>) -> rusqlite::Result<BranchRow> {
    Ok(BranchRow {
        id: row.get(0)?,
        public_id: row.get(1)?,
        project_id: row.get(2)?,
        name: row.get(3)?,
        head_commit_hash: row.get(4)?,
        creator_id: row.get(5)?,
        description: row.get(6)?,
        tags: row.get(7)?,
        parent_branch_id: row.get(8)?,
        workspace_data: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn map_commit(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommitRow> {
    Ok(CommitRow {
        hash: row.get(0)?,
        project_id: row.get(1)?,
        author_id: row.get(2)?,
        message: row.get(3)?,
        parent_hash: row.get(4)?,
        asset_snapshot: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_clip(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClipRow> {
    Ok(ClipRow {
        id: row.get(0)?,
        public_id: row.get(1)?,
        project_id: row.get(2)?,
        branch_id: row.get(3)?,
        owner_id: row.get(4)?,
        title: row.get(5)?,
        summary: row.get(6)?,
        input_artifacts: row.get(7)?,
        assets_ref: row.get(8)?,
        status: row.get(9)?,
        result: row.get(10)?,
        error: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn map_merge_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<MergeRequestRow> {
    Ok(MergeRequestRow {
        id: row.get(0)?,
        public_id: row.get(1)?,
        project_id: row.get(2)?,
        creator_id: row.get(3)?,
        source_branch_id: row.get(4)?,
        target_branch_id: row.get(5)?,
        title: row.get(6)?,
        description: row.get(7)?,
        clip_ids: row.get(8)?,
        merged_clip_ids: row.get(9)?,
        status: row.get(10)?,
        merged_by: row.get(11)?,
        merged_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn map_fork_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ForkRequestRow> {
    Ok(ForkRequestRow {
        id: row.get(0)?,
        public_id: row.get(1)?,
        project_id: row.get(2)?,
        requester_id: row.get(3)?,
        commit_hash: row.get(4)?,
        status: row.get(5)?,
        reviewer_id: row.get(6)?,
        reviewed_at: row.get(7)?,
        approved_project_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const PROJECT_COLS: &str =
    "id, public_id, name, description, owner_id, parent_project_id, is_public, tags, created_at";
const BRANCH_COLS: &str = "id, public_id, project_id, name, head_commit_hash, creator_id, \
     description, tags, parent_branch_id, workspace_data, created_at";
const COMMIT_COLS: &str =
    "hash, project_id, author_id, message, parent_hash, asset_snapshot, created_at";
const CLIP_COLS: &str = "id, public_id, project_id, branch_id, owner_id, title, summary, \
     input_artifacts, assets_ref, status, result, error, created_at, updated_at";
const MR_COLS: &str = "id, public_id, project_id, creator_id, source_branch_id, \
     target_branch_id, title, description, clip_ids, merged_clip_ids, status, merged_by, \
     merged_at, created_at";
const FR_COLS: &str = "id, public_id, project_id, requester_id, commit_hash, status, \
     reviewer_id, reviewed_at, approved_project_id, created_at";

/// Whether an error is a SQLite UNIQUE-constraint violation.
///
/// Branch-name uniqueness and fork-name de-duplication rely on this rather
/// than in-memory locking, since multiple callers may race on the same name.
pub fn is_unique_violation(err: &DatabaseError) -> bool {
    match err {
        DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _)) => {
            // Extended codes distinguish UNIQUE from FOREIGN KEY / NOT NULL
            // failures, which must not be treated as name conflicts.
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Transaction-scoped helpers
// ---------------------------------------------------------------------------

/// Insert a project row. Used inside fork-approval transactions.
#[allow(clippy::too_many_arguments)]
pub fn insert_project_tx(
    conn: &Connection,
    public_id: &str,
    name: &str,
    description: Option<&str>,
    owner_id: &str,
    parent_project_id: Option<i64>,
    is_public: bool,
    tags_json: &str,
) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO projects (public_id, name, description, owner_id, parent_project_id, is_public, tags, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![public_id, name, description, owner_id, parent_project_id, is_public as i64, tags_json, now],
    )?;
    let id = conn.last_insert_rowid();
    debug!(id, public_id, name, "inserted project");
    Ok(id)
}

/// Insert a branch row. Fails with a UNIQUE violation if (project, name)
/// already exists; callers doing name de-duplication retry on that error.
#[allow(clippy::too_many_arguments)]
pub fn insert_branch_tx(
    conn: &Connection,
    public_id: &str,
    project_id: i64,
    name: &str,
    head_commit_hash: Option<&str>,
    creator_id: &str,
    description: Option<&str>,
    tags_json: &str,
    parent_branch_id: Option<i64>,
) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO branches (public_id, project_id, name, head_commit_hash, creator_id, description, tags, parent_branch_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![public_id, project_id, name, head_commit_hash, creator_id, description, tags_json, parent_branch_id, now],
    )?;
    let id = conn.last_insert_rowid();
    debug!(id, project_id, name, "inserted branch");
    Ok(id)
}

/// Insert a commit row. Runs inside the same transaction as the branch
/// HEAD update so both writes commit or fail together.
pub fn insert_commit_tx(
    conn: &Connection,
    hash: &str,
    project_id: i64,
    author_id: &str,
    message: &str,
    parent_hash: Option<&str>,
    asset_snapshot_json: &str,
    created_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO commits (hash, project_id, author_id, message, parent_hash, asset_snapshot, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![hash, project_id, author_id, message, parent_hash, asset_snapshot_json, created_at],
    )?;
    debug!(hash, project_id, "inserted commit");
    Ok(())
}

/// Point a branch's HEAD at a commit.
pub fn update_branch_head_tx(
    conn: &Connection,
    branch_id: i64,
    head_commit_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE branches SET head_commit_hash = ?1 WHERE id = ?2",
        params![head_commit_hash, branch_id],
    )?;
    Ok(())
}

/// Resolve a branch by (project, name) inside a transaction.
pub fn get_branch_by_name_tx(
    conn: &Connection,
    project_id: i64,
    name: &str,
) -> Result<Option<BranchRow>, DatabaseError> {
    let sql = format!(
        "SELECT {BRANCH_COLS} FROM branches WHERE project_id = ?1 AND name = ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![project_id, name], map_branch)?;
    match rows.next() {
        Some(Ok(branch)) => Ok(Some(branch)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

/// Insert a clip segment inside a transaction (merge copies clips this way).
pub fn insert_clip_tx(conn: &Connection, clip: &NewClip) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO clip_segments (public_id, project_id, branch_id, owner_id, title, summary, input_artifacts, assets_ref, status, result, error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            clip.public_id,
            clip.project_id,
            clip.branch_id,
            clip.owner_id,
            clip.title,
            clip.summary,
            clip.input_artifacts,
            clip.assets_ref,
            clip.status,
            clip.result,
            clip.error,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finalize a merge request: status, reviewer stamp, and copied clip ids.
pub fn finalize_merge_tx(
    conn: &Connection,
    mr_id: i64,
    merged_by: &str,
    merged_at: &str,
    merged_clip_ids_json: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE merge_requests SET status = 'merged', merged_by = ?1, merged_at = ?2, merged_clip_ids = ?3 WHERE id = ?4",
        params![merged_by, merged_at, merged_clip_ids_json, mr_id],
    )?;
    Ok(())
}

/// Record a fork-request review (approve or reject).
pub fn review_fork_request_tx(
    conn: &Connection,
    fr_id: i64,
    status: &str,
    reviewer_id: &str,
    reviewed_at: &str,
    approved_project_id: Option<i64>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE fork_requests SET status = ?1, reviewer_id = ?2, reviewed_at = ?3, approved_project_id = ?4 WHERE id = ?5",
        params![status, reviewer_id, reviewed_at, approved_project_id, fr_id],
    )?;
    Ok(())
}

/// Resolve a commit by hash within a project, inside a transaction.
pub fn get_commit_tx(
    conn: &Connection,
    project_id: i64,
    hash: &str,
) -> Result<Option<CommitRow>, DatabaseError> {
    let sql = format!("SELECT {COMMIT_COLS} FROM commits WHERE project_id = ?1 AND hash = ?2");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![project_id, hash], map_commit)?;
    match rows.next() {
        Some(Ok(commit)) => Ok(Some(commit)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- projects -------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn insert_project(
        &self,
        public_id: &str,
        name: &str,
        description: Option<&str>,
        owner_id: &str,
        parent_project_id: Option<i64>,
        is_public: bool,
        tags_json: &str,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        insert_project_tx(
            &conn,
            public_id,
            name,
            description,
            owner_id,
            parent_project_id,
            is_public,
            tags_json,
        )
    }

    pub fn get_project_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<ProjectRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!("SELECT {PROJECT_COLS} FROM projects WHERE public_id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![public_id], map_project)?;
        match rows.next() {
            Some(Ok(project)) => Ok(Some(project)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    pub fn get_project_by_internal_id(
        &self,
        id: i64,
    ) -> Result<Option<ProjectRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], map_project)?;
        match rows.next() {
            Some(Ok(project)) => Ok(Some(project)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Projects owned by `owner_id`, newest first.
    pub fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<ProjectRow>, DatabaseError> {
        let conn = self.conn();
        let sql =
            format!("SELECT {PROJECT_COLS} FROM projects WHERE owner_id = ?1 ORDER BY id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id], map_project)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Projects where `user_id` created a branch without owning the project.
    pub fn list_branch_participations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ProjectRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT DISTINCT p.id, p.public_id, p.name, p.description, p.owner_id, \
             p.parent_project_id, p.is_public, p.tags, p.created_at \
             FROM projects p JOIN branches b ON b.project_id = p.id \
             WHERE b.creator_id = ?1 AND p.owner_id != ?1 ORDER BY p.id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], map_project)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a project. Branches and commits cascade.
    pub fn delete_project(&self, id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        debug!(id, "deleted project");
        Ok(())
    }

    // -- branches -------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn insert_branch(
        &self,
        public_id: &str,
        project_id: i64,
        name: &str,
        head_commit_hash: Option<&str>,
        creator_id: &str,
        description: Option<&str>,
        tags_json: &str,
        parent_branch_id: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        insert_branch_tx(
            &conn,
            public_id,
            project_id,
            name,
            head_commit_hash,
            creator_id,
            description,
            tags_json,
            parent_branch_id,
        )
    }

    pub fn get_branch_by_name(
        &self,
        project_id: i64,
        name: &str,
    ) -> Result<Option<BranchRow>, DatabaseError> {
        let conn = self.conn();
        get_branch_by_name_tx(&conn, project_id, name)
    }

    pub fn get_branch_by_internal_id(&self, id: i64) -> Result<Option<BranchRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!("SELECT {BRANCH_COLS} FROM branches WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], map_branch)?;
        match rows.next() {
            Some(Ok(branch)) => Ok(Some(branch)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    pub fn list_branches(&self, project_id: i64) -> Result<Vec<BranchRow>, DatabaseError> {
        let conn = self.conn();
        let sql =
            format!("SELECT {BRANCH_COLS} FROM branches WHERE project_id = ?1 ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id], map_branch)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace a branch's workspace document.
    pub fn set_branch_workspace(
        &self,
        branch_id: i64,
        workspace_json: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE branches SET workspace_data = ?1 WHERE id = ?2",
            params![workspace_json, branch_id],
        )?;
        Ok(())
    }

    // -- commits --------------------------------------------------------------

    pub fn get_commit(
        &self,
        project_id: i64,
        hash: &str,
    ) -> Result<Option<CommitRow>, DatabaseError> {
        let conn = self.conn();
        get_commit_tx(&conn, project_id, hash)
    }

    /// All commits of a project, oldest first.
    pub fn list_commits(&self, project_id: i64) -> Result<Vec<CommitRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {COMMIT_COLS} FROM commits WHERE project_id = ?1 ORDER BY created_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id], map_commit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- clip segments ----------------------------------------------------------

    pub fn insert_clip(&self, clip: &NewClip) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        insert_clip_tx(&conn, clip)
    }

    /// Resolve a clip by public id, scoped to a project and branch.
    ///
    /// Merge uses the scoped lookup so clips that moved off the recorded
    /// source branch silently drop out of the merge set.
    pub fn get_clip_on_branch(
        &self,
        project_id: i64,
        branch_id: i64,
        public_id: &str,
    ) -> Result<Option<ClipRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {CLIP_COLS} FROM clip_segments WHERE project_id = ?1 AND branch_id = ?2 AND public_id = ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![project_id, branch_id, public_id], map_clip)?;
        match rows.next() {
            Some(Ok(clip)) => Ok(Some(clip)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Clips on a branch, newest first.
    pub fn list_clips(
        &self,
        project_id: i64,
        branch_id: i64,
        limit: u32,
    ) -> Result<Vec<ClipRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {CLIP_COLS} FROM clip_segments WHERE project_id = ?1 AND branch_id = ?2 ORDER BY id DESC LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id, branch_id, limit], map_clip)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Public ids of the most recent clips on a branch (merge-request default).
    pub fn recent_clip_ids(
        &self,
        project_id: i64,
        branch_id: i64,
        limit: u32,
    ) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT public_id FROM clip_segments WHERE project_id = ?1 AND branch_id = ?2 ORDER BY id DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![project_id, branch_id, limit], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    /// Reconcile a clip's lifecycle status from the external job queue.
    pub fn update_clip_status(
        &self,
        public_id: &str,
        status: &str,
        result_json: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE clip_segments SET status = ?1, result = ?2, error = ?3, updated_at = ?4 WHERE public_id = ?5",
            params![status, result_json, error, now, public_id],
        )?;
        Ok(changed > 0)
    }

    // -- merge requests ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn insert_merge_request(
        &self,
        public_id: &str,
        project_id: i64,
        creator_id: &str,
        source_branch_id: i64,
        target_branch_id: i64,
        title: Option<&str>,
        description: Option<&str>,
        clip_ids_json: &str,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO merge_requests (public_id, project_id, creator_id, source_branch_id, target_branch_id, title, description, clip_ids, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'open', ?9)",
            params![public_id, project_id, creator_id, source_branch_id, target_branch_id, title, description, clip_ids_json, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, public_id, "inserted merge request");
        Ok(id)
    }

    pub fn get_merge_request(
        &self,
        public_id: &str,
    ) -> Result<Option<MergeRequestRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!("SELECT {MR_COLS} FROM merge_requests WHERE public_id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![public_id], map_merge_request)?;
        match rows.next() {
            Some(Ok(mr)) => Ok(Some(mr)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Merge requests on a project, newest first, optionally filtered to one
    /// creator (non-owners only see their own).
    pub fn list_merge_requests(
        &self,
        project_id: i64,
        creator_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MergeRequestRow>, DatabaseError> {
        let conn = self.conn();
        let rows = match creator_id {
            Some(creator) => {
                let sql = format!(
                    "SELECT {MR_COLS} FROM merge_requests WHERE project_id = ?1 AND creator_id = ?2 ORDER BY id DESC LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![project_id, creator, limit], map_merge_request)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {MR_COLS} FROM merge_requests WHERE project_id = ?1 ORDER BY id DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![project_id, limit], map_merge_request)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    pub fn close_merge_request(&self, mr_id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE merge_requests SET status = 'closed' WHERE id = ?1",
            params![mr_id],
        )?;
        Ok(())
    }

    // -- fork requests ------------------------------------------------------------

    pub fn insert_fork_request(
        &self,
        public_id: &str,
        project_id: i64,
        requester_id: &str,
        commit_hash: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO fork_requests (public_id, project_id, requester_id, commit_hash, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![public_id, project_id, requester_id, commit_hash, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, public_id, "inserted fork request");
        Ok(id)
    }

    pub fn get_fork_request(
        &self,
        public_id: &str,
    ) -> Result<Option<ForkRequestRow>, DatabaseError> {
        let conn = self.conn();
        let sql = format!("SELECT {FR_COLS} FROM fork_requests WHERE public_id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![public_id], map_fork_request)?;
        match rows.next() {
            Some(Ok(fr)) => Ok(Some(fr)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Whether `requester_id` already has a pending request on this project
    /// for the same commit hash (NULL hashes compare equal).
    pub fn has_pending_fork_request(
        &self,
        project_id: i64,
        requester_id: &str,
        commit_hash: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fork_requests
             WHERE project_id = ?1 AND requester_id = ?2 AND status = 'pending'
               AND commit_hash IS ?3",
            params![project_id, requester_id, commit_hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fork requests on a project, newest first.
    pub fn list_fork_requests(
        &self,
        project_id: i64,
    ) -> Result<Vec<ForkRequestRow>, DatabaseError> {
        let conn = self.conn();
        let sql =
            format!("SELECT {FR_COLS} FROM fork_requests WHERE project_id = ?1 ORDER BY id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id], map_fork_request)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_project_round_trip() {
        let db = test_db();
        let id = db
            .insert_project("p-1", "My Film", Some("desc"), "user-1", None, true, "[]")
            .unwrap();
        assert!(id > 0);

        let row = db.get_project_by_public_id("p-1").unwrap().unwrap();
        assert_eq!(row.name, "My Film");
        assert_eq!(row.owner_id, "user-1");
        assert!(row.is_public);
        assert!(row.parent_project_id.is_none());
    }

    #[test]
    fn test_branch_unique_violation_detected() {
        let db = test_db();
        let pid = db
            .insert_project("p-1", "p", None, "u-1", None, true, "[]")
            .unwrap();
        db.insert_branch("b-1", pid, "main", None, "u-1", None, "[]", None)
            .unwrap();

        let err = db
            .insert_branch("b-2", pid, "main", None, "u-1", None, "[]", None)
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_foreign_key_violation_is_not_a_unique_violation() {
        let db = test_db();

        // No project with internal id 999: this trips the FK, not a UNIQUE
        // index, and must not be mistaken for a name conflict.
        let err = db
            .insert_branch("b-1", 999, "main", None, "u-1", None, "[]", None)
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn test_commit_and_head_update_atomic() {
        let db = test_db();
        let pid = db
            .insert_project("p-1", "p", None, "u-1", None, true, "[]")
            .unwrap();
        let bid = db
            .insert_branch("b-1", pid, "main", None, "u-1", None, "[]", None)
            .unwrap();

        db.transaction::<_, _, DatabaseError>(|conn| {
            insert_commit_tx(conn, "abc123", pid, "u-1", "init", None, "{}", "2026-01-01T00:00:00Z")?;
            update_branch_head_tx(conn, bid, "abc123")?;
            Ok(())
        })
        .unwrap();

        let branch = db.get_branch_by_internal_id(bid).unwrap().unwrap();
        assert_eq!(branch.head_commit_hash.as_deref(), Some("abc123"));
        let commit = db.get_commit(pid, "abc123").unwrap().unwrap();
        assert_eq!(commit.message, "init");
    }

    #[test]
    fn test_pending_fork_request_null_hash_match() {
        let db = test_db();
        let pid = db
            .insert_project("p-1", "p", None, "owner", None, true, "[]")
            .unwrap();
        db.insert_fork_request("fr-1", pid, "u-2", None).unwrap();

        assert!(db.has_pending_fork_request(pid, "u-2", None).unwrap());
        assert!(!db.has_pending_fork_request(pid, "u-2", Some("abc")).unwrap());
        assert!(!db.has_pending_fork_request(pid, "u-3", None).unwrap());
    }

    #[test]
    fn test_cascade_delete_project() {
        let db = test_db();
        let pid = db
            .insert_project("p-1", "p", None, "u-1", None, true, "[]")
            .unwrap();
        let bid = db
            .insert_branch("b-1", pid, "main", None, "u-1", None, "[]", None)
            .unwrap();
        db.transaction::<_, _, DatabaseError>(|conn| {
            insert_commit_tx(conn, "c1", pid, "u-1", "m", None, "{}", "2026-01-01T00:00:00Z")?;
            update_branch_head_tx(conn, bid, "c1")?;
            Ok(())
        })
        .unwrap();

        db.delete_project(pid).unwrap();
        assert!(db.get_branch_by_internal_id(bid).unwrap().is_none());
        assert!(db.get_commit(pid, "c1").unwrap().is_none());
    }
}

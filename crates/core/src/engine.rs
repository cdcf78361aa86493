//! The repository engine: projects, branches, commits, clips, workspaces.
//!
//! [`RepoEngine`] is stateless business logic layered over the transactional
//! store. Every operation is a synchronous call; multi-write operations run
//! inside a single SQLite transaction so partial states never persist.
//! Merge-request and fork-request state machines live in [`crate::review`]
//! as further `impl RepoEngine` blocks.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache::GraphCache;
use crate::canonical::commit_hash;
use crate::config::AppConfig;
use crate::db::queries::{
    self, is_unique_violation, BranchRow, ClipRow, CommitRow, NewClip, ProjectRow,
};
use crate::db::Database;
use crate::errors::{DatabaseError, RepoError, WorkspaceError};
use crate::graph::{GraphAssembler, ProjectGraph};
use crate::models::{Branch, ClipSegment, ClipStatus, Commit, HeadState, Project};
use crate::workspace::enforce_boundary_lock;

/// Timestamp format used as commit-hash input: ISO-8601 UTC with
/// microseconds and no offset suffix, matching the historical store.
const HASH_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub(crate) fn new_public_id() -> String {
    Uuid::new_v4().to_string()
}

fn hash_timestamp() -> String {
    Utc::now().format(HASH_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Commit rows carry the hash-input format;
/// everything else is RFC3339. Unparseable values collapse to the epoch
/// rather than failing the whole read.
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
        })
        .unwrap_or_default()
}

pub(crate) fn parse_json_column(
    entity: &str,
    column: &str,
    raw: &str,
) -> Result<Value, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::CorruptJson {
        entity: entity.to_string(),
        column: column.to_string(),
        detail: e.to_string(),
    })
}

pub(crate) fn parse_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Result of forking a project inside a transaction.
pub(crate) struct ForkedProject {
    pub internal_id: i64,
    pub public_id: String,
}

/// Create an independent copy of `source` owned by `new_owner`.
///
/// The new project gets a fresh `main` branch and, when `state` carries a
/// source commit, one new root commit with the copied asset snapshot and no
/// parent: history intentionally does not chain across project forks.
///
/// Runs inside the caller's transaction so the fork-approval state machine
/// can stamp the request in the same unit of work.
pub(crate) fn fork_project_tx(
    conn: &Connection,
    source: &ProjectRow,
    new_owner: &str,
    state: Option<&CommitRow>,
) -> Result<ForkedProject, RepoError> {
    let project_public_id = new_public_id();
    let name = format!("{} (fork)", source.name);
    let project_id = queries::insert_project_tx(
        conn,
        &project_public_id,
        &name,
        source.description.as_deref(),
        new_owner,
        Some(source.id),
        source.is_public,
        &source.tags,
    )?;

    let branch_id = queries::insert_branch_tx(
        conn,
        &new_public_id(),
        project_id,
        "main",
        None,
        new_owner,
        None,
        "[]",
        None,
    )?;

    if let Some(commit) = state {
        let snapshot = parse_json_column("commit", "asset_snapshot", &commit.asset_snapshot)
            .map_err(RepoError::DatabaseError)?;
        let message = format!("Forked from {}", source.name);
        let timestamp = hash_timestamp();
        let hash = commit_hash(&message, None, &snapshot, &timestamp);
        queries::insert_commit_tx(
            conn,
            &hash,
            project_id,
            new_owner,
            &message,
            None,
            &commit.asset_snapshot,
            &timestamp,
        )?;
        queries::update_branch_head_tx(conn, branch_id, &hash)?;
    }

    info!(source = %source.public_id, fork = %project_public_id, owner = new_owner, "forked project");
    Ok(ForkedProject {
        internal_id: project_id,
        public_id: project_public_id,
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Handle bundling the store, configuration, and graph cache.
pub struct RepoEngine {
    pub(crate) db: Database,
    pub(crate) config: AppConfig,
    pub(crate) graph: GraphAssembler,
}

impl RepoEngine {
    pub fn new(db: Database, config: AppConfig, cache: Arc<dyn GraphCache>) -> Self {
        let graph = GraphAssembler::new(cache, &config.graph);
        Self { db, config, graph }
    }

    // -- projects -------------------------------------------------------------

    /// Create a project together with its `main` branch, atomically.
    #[instrument(skip(self, description, tags))]
    pub fn create_project(
        &self,
        owner: &str,
        name: &str,
        description: Option<&str>,
        tags: &[String],
        is_public: bool,
    ) -> Result<Project, RepoError> {
        let public_id = new_public_id();
        let branch_public_id = new_public_id();
        let tags_json = tags_json(tags);
        self.db.transaction::<_, _, RepoError>(|conn| {
            let project_id = queries::insert_project_tx(
                conn,
                &public_id,
                name,
                description,
                owner,
                None,
                is_public,
                &tags_json,
            )
            .map_err(RepoError::DatabaseError)?;
            queries::insert_branch_tx(
                conn,
                &branch_public_id,
                project_id,
                "main",
                None,
                owner,
                None,
                "[]",
                None,
            )
            .map_err(RepoError::DatabaseError)?;
            Ok(())
        })?;
        info!(project = %public_id, owner, "created project");
        self.get_project(&public_id)
    }

    pub fn get_project(&self, project_id: &str) -> Result<Project, RepoError> {
        let row = self.resolve_project(project_id)?;
        self.project_model(&row)
    }

    /// Projects owned by `owner`, newest first.
    pub fn list_projects(&self, owner: &str) -> Result<Vec<Project>, RepoError> {
        self.db
            .list_projects_by_owner(owner)?
            .iter()
            .map(|row| self.project_model(row))
            .collect()
    }

    /// Projects where `user` created a branch without owning the project.
    pub fn list_branch_participations(&self, user: &str) -> Result<Vec<Project>, RepoError> {
        self.db
            .list_branch_participations(user)?
            .iter()
            .map(|row| self.project_model(row))
            .collect()
    }

    /// Delete a project and everything it owns. Owner only, and the caller
    /// must repeat the project name as a confirmation string.
    #[instrument(skip(self))]
    pub fn delete_project(
        &self,
        project_id: &str,
        caller: &str,
        confirm_name: &str,
    ) -> Result<(), RepoError> {
        let project = self.resolve_project(project_id)?;
        if project.owner_id != caller {
            return Err(RepoError::Forbidden(
                "only the project owner can delete a project".into(),
            ));
        }
        if confirm_name != project.name {
            return Err(RepoError::ConfirmationMismatch {
                expected: project.name,
            });
        }
        self.db.delete_project(project.id)?;
        self.graph.invalidate(project_id);
        info!(project = project_id, "deleted project");
        Ok(())
    }

    // -- commits --------------------------------------------------------------

    /// Create a commit and advance the branch HEAD, atomically.
    ///
    /// `parent_hash` defaults to the branch's current HEAD; supplying a
    /// different hash is a deliberate rebase-style primitive and creates
    /// divergent history. A missing branch named `main` is auto-created for
    /// legacy callers; `create_project` always creates `main`, so new data
    /// never hits that path.
    #[instrument(skip(self, message, asset_snapshot))]
    pub fn create_commit(
        &self,
        project_id: &str,
        author: &str,
        message: &str,
        asset_snapshot: &Value,
        branch_name: &str,
        parent_hash: Option<&str>,
    ) -> Result<Commit, RepoError> {
        let project = self.resolve_project(project_id)?;
        let branch = match self.db.get_branch_by_name(project.id, branch_name)? {
            Some(branch) => branch,
            None if branch_name == "main" => self.auto_create_main(&project, author)?,
            None => {
                return Err(RepoError::BranchNotFound {
                    project: project_id.to_string(),
                    name: branch_name.to_string(),
                })
            }
        };

        let parent = match parent_hash {
            Some(hash) => {
                if self.db.get_commit(project.id, hash)?.is_none() {
                    return Err(RepoError::CommitNotFound(hash.to_string()));
                }
                Some(hash.to_string())
            }
            None => branch.head_commit_hash.clone(),
        };

        let timestamp = hash_timestamp();
        let hash = commit_hash(message, parent.as_deref(), asset_snapshot, &timestamp);
        let snapshot_json = asset_snapshot.to_string();

        let result = self.db.transaction::<_, _, RepoError>(|conn| {
            queries::insert_commit_tx(
                conn,
                &hash,
                project.id,
                author,
                message,
                parent.as_deref(),
                &snapshot_json,
                &timestamp,
            )
            .map_err(RepoError::DatabaseError)?;
            queries::update_branch_head_tx(conn, branch.id, &hash)
                .map_err(RepoError::DatabaseError)?;
            Ok(())
        });
        if let Err(err) = result {
            // Identical content at identical sub-second timestamps.
            if let RepoError::DatabaseError(ref db_err) = err {
                if is_unique_violation(db_err) {
                    return Err(RepoError::HashCollision(hash));
                }
            }
            return Err(err);
        }

        self.graph.invalidate(project_id);
        debug!(project = project_id, branch = branch_name, %hash, "created commit");

        let row = self
            .db
            .get_commit(project.id, &hash)?
            .ok_or_else(|| RepoError::CommitNotFound(hash.clone()))?;
        self.commit_model(&project, &row)
    }

    fn auto_create_main(
        &self,
        project: &ProjectRow,
        creator: &str,
    ) -> Result<BranchRow, RepoError> {
        let result = self.db.insert_branch(
            &new_public_id(),
            project.id,
            "main",
            None,
            creator,
            None,
            "[]",
            None,
        );
        match result {
            Ok(_) => {}
            // Lost a race to another caller; the branch exists now.
            Err(ref e) if is_unique_violation(e) => {}
            Err(e) => return Err(e.into()),
        }
        self.db
            .get_branch_by_name(project.id, "main")?
            .ok_or_else(|| RepoError::BranchNotFound {
                project: project.public_id.clone(),
                name: "main".to_string(),
            })
    }

    pub fn get_commit(&self, project_id: &str, hash: &str) -> Result<Commit, RepoError> {
        let project = self.resolve_project(project_id)?;
        let row = self
            .db
            .get_commit(project.id, hash)?
            .ok_or_else(|| RepoError::CommitNotFound(hash.to_string()))?;
        self.commit_model(&project, &row)
    }

    /// The resolved state at a branch HEAD; empty for a branch with no commits.
    pub fn get_head_state(
        &self,
        project_id: &str,
        branch_name: &str,
    ) -> Result<HeadState, RepoError> {
        let project = self.resolve_project(project_id)?;
        let branch = self.resolve_branch(&project, branch_name)?;
        match branch.head_commit_hash.as_deref() {
            Some(hash) => {
                let commit = self
                    .db
                    .get_commit(project.id, hash)?
                    .ok_or_else(|| RepoError::CommitNotFound(hash.to_string()))?;
                let snapshot =
                    parse_json_column("commit", "asset_snapshot", &commit.asset_snapshot)?;
                Ok(HeadState {
                    commit_id: Some(commit.hash),
                    message: Some(commit.message),
                    asset_snapshot: snapshot,
                })
            }
            None => Ok(HeadState {
                commit_id: None,
                message: None,
                asset_snapshot: Value::Object(serde_json::Map::new()),
            }),
        }
    }

    // -- branches -------------------------------------------------------------

    #[instrument(skip(self))]
    pub fn create_branch(
        &self,
        project_id: &str,
        creator: &str,
        name: &str,
        from_commit_hash: Option<&str>,
    ) -> Result<Branch, RepoError> {
        let project = self.resolve_project(project_id)?;
        if let Some(hash) = from_commit_hash {
            if self.db.get_commit(project.id, hash)?.is_none() {
                return Err(RepoError::CommitNotFound(hash.to_string()));
            }
        }
        let public_id = new_public_id();
        let result = self.db.insert_branch(
            &public_id,
            project.id,
            name,
            from_commit_hash,
            creator,
            None,
            "[]",
            None,
        );
        match result {
            Ok(_) => {}
            Err(ref e) if is_unique_violation(e) => {
                return Err(RepoError::BranchAlreadyExists {
                    project: project_id.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
        self.graph.invalidate(project_id);
        info!(project = project_id, branch = name, "created branch");
        let row = self.resolve_branch(&project, name)?;
        self.branch_model(&project, &row)
    }

    /// Fork a branch within the same project: the collaborate-without-forking
    /// path. Non-owners may only fork branches of public projects.
    ///
    /// The branch name defaults to `fork/<creator>` and is de-duplicated by
    /// appending `_1`, `_2`, ... on unique-constraint conflict, so concurrent
    /// forks by the same user race safely.
    #[instrument(skip(self, description, tags))]
    #[allow(clippy::too_many_arguments)]
    pub fn fork_as_branch(
        &self,
        project_id: &str,
        creator: &str,
        source_branch_name: &str,
        from_commit_hash: Option<&str>,
        name: Option<&str>,
        description: Option<&str>,
        tags: &[String],
    ) -> Result<Branch, RepoError> {
        let project = self.resolve_project(project_id)?;
        if project.owner_id != creator && !project.is_public {
            // Private projects are invisible to non-owners.
            return Err(RepoError::ProjectNotFound(project_id.to_string()));
        }
        let source = self.resolve_branch(&project, source_branch_name)?;

        let head = match from_commit_hash {
            Some(hash) => {
                if self.db.get_commit(project.id, hash)?.is_none() {
                    return Err(RepoError::CommitNotFound(hash.to_string()));
                }
                Some(hash.to_string())
            }
            None => source.head_commit_hash.clone(),
        };

        let base = match name {
            Some(n) => n.to_string(),
            None => format!("fork/{creator}"),
        };
        let tags_json = tags_json(tags);

        let mut suffix = 0u32;
        let branch_name = loop {
            let candidate = if suffix == 0 {
                base.clone()
            } else {
                format!("{base}_{suffix}")
            };
            let result = self.db.insert_branch(
                &new_public_id(),
                project.id,
                &candidate,
                head.as_deref(),
                creator,
                description,
                &tags_json,
                Some(source.id),
            );
            match result {
                Ok(_) => break candidate,
                Err(ref e) if is_unique_violation(e) => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        };

        self.graph.invalidate(project_id);
        info!(project = project_id, source = source_branch_name, branch = %branch_name, "forked branch");
        let row = self.resolve_branch(&project, &branch_name)?;
        self.branch_model(&project, &row)
    }

    pub fn list_branches(&self, project_id: &str) -> Result<Vec<Branch>, RepoError> {
        let project = self.resolve_project(project_id)?;
        self.db
            .list_branches(project.id)?
            .iter()
            .map(|row| self.branch_model(&project, row))
            .collect()
    }

    // -- project forks ----------------------------------------------------------

    /// Fork a whole project directly. Owner only; everyone else goes through
    /// the fork-request approval flow.
    #[instrument(skip(self))]
    pub fn fork_project(
        &self,
        project_id: &str,
        user: &str,
        commit_hash: Option<&str>,
    ) -> Result<Project, RepoError> {
        let source = self.resolve_project(project_id)?;
        if source.owner_id != user {
            return Err(RepoError::Forbidden(
                "only the project owner can fork directly; submit a fork request instead".into(),
            ));
        }
        let forked = self.fork_project_as(&source, user, commit_hash)?;
        self.get_project(&forked.public_id)
    }

    /// Shared fork implementation, also invoked by fork-request approval.
    pub(crate) fn fork_project_as(
        &self,
        source: &ProjectRow,
        new_owner: &str,
        commit_hash: Option<&str>,
    ) -> Result<ForkedProject, RepoError> {
        let state = self.resolve_fork_state(source, commit_hash)?;
        self.db
            .transaction::<_, _, RepoError>(|conn| fork_project_tx(conn, source, new_owner, state.as_ref()))
    }

    /// The commit whose snapshot a fork copies: the given hash, or the
    /// source's `main` HEAD, or nothing for an empty project.
    pub(crate) fn resolve_fork_state(
        &self,
        source: &ProjectRow,
        commit_hash: Option<&str>,
    ) -> Result<Option<CommitRow>, RepoError> {
        match commit_hash {
            Some(hash) => {
                let commit = self
                    .db
                    .get_commit(source.id, hash)?
                    .ok_or_else(|| RepoError::CommitNotFound(hash.to_string()))?;
                Ok(Some(commit))
            }
            None => {
                let main = self.db.get_branch_by_name(source.id, "main")?;
                match main.and_then(|b| b.head_commit_hash) {
                    Some(hash) => Ok(self.db.get_commit(source.id, &hash)?),
                    None => Ok(None),
                }
            }
        }
    }

    // -- graph ----------------------------------------------------------------

    pub fn get_project_graph(&self, project_id: &str) -> Result<ProjectGraph, RepoError> {
        let project = self.resolve_project(project_id)?;
        self.graph.project_graph(&self.db, &project)
    }

    // -- workspace --------------------------------------------------------------

    pub fn get_workspace(
        &self,
        project_id: &str,
        branch_name: &str,
    ) -> Result<Value, RepoError> {
        let project = self.resolve_project(project_id)?;
        let branch = self.resolve_branch(&project, branch_name)?;
        match branch.workspace_data.as_deref() {
            Some(raw) => Ok(parse_json_column("branch", "workspace_data", raw)?),
            None => Ok(Value::Object(serde_json::Map::new())),
        }
    }

    /// Replace a branch's workspace document.
    ///
    /// The caller must be the project owner or the branch creator. The
    /// boundary lock check runs after the permission check and before
    /// anything is persisted; a failed validation writes nothing.
    #[instrument(skip(self, document))]
    pub fn put_workspace(
        &self,
        project_id: &str,
        branch_name: &str,
        caller: &str,
        document: &Value,
    ) -> Result<(), WorkspaceError> {
        let project = self.resolve_project(project_id)?;
        let branch = self.resolve_branch(&project, branch_name)?;
        if project.owner_id != caller && branch.creator_id != caller {
            return Err(WorkspaceError::Forbidden(
                "only the project owner or branch creator can edit this workspace".into(),
            ));
        }

        let previous = match branch.workspace_data.as_deref() {
            Some(raw) => parse_json_column("branch", "workspace_data", raw)
                .map_err(RepoError::DatabaseError)?,
            None => Value::Object(serde_json::Map::new()),
        };
        enforce_boundary_lock(&previous, document)?;

        self.db
            .set_branch_workspace(branch.id, &document.to_string())?;
        debug!(project = project_id, branch = branch_name, "workspace updated");
        Ok(())
    }

    // -- clip segments ------------------------------------------------------------

    #[instrument(skip(self, title, summary, input_artifacts, assets_ref))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_clip(
        &self,
        project_id: &str,
        branch_name: &str,
        owner: &str,
        title: Option<&str>,
        summary: Option<&str>,
        input_artifacts: Option<&Value>,
        assets_ref: Option<&Value>,
    ) -> Result<ClipSegment, RepoError> {
        let project = self.resolve_project(project_id)?;
        let branch = self.resolve_branch(&project, branch_name)?;
        let public_id = new_public_id();
        let clip = NewClip {
            public_id: public_id.clone(),
            project_id: project.id,
            branch_id: Some(branch.id),
            owner_id: owner.to_string(),
            title: title.map(str::to_string),
            summary: summary.map(str::to_string),
            input_artifacts: input_artifacts.map(Value::to_string),
            assets_ref: assets_ref.map(Value::to_string),
            status: ClipStatus::Pending.to_string(),
            ..NewClip::default()
        };
        self.db.insert_clip(&clip)?;
        debug!(project = project_id, branch = branch_name, clip = %public_id, "created clip");
        let row = self
            .db
            .get_clip_on_branch(project.id, branch.id, &public_id)?
            .ok_or_else(|| {
                RepoError::DatabaseError(DatabaseError::NotFound {
                    entity: "clip".into(),
                    id: public_id.clone(),
                })
            })?;
        self.clip_model(&project, &row)
    }

    pub fn list_clips(
        &self,
        project_id: &str,
        branch_name: &str,
        limit: u32,
    ) -> Result<Vec<ClipSegment>, RepoError> {
        let project = self.resolve_project(project_id)?;
        let branch = self.resolve_branch(&project, branch_name)?;
        self.db
            .list_clips(project.id, branch.id, limit)?
            .iter()
            .map(|row| self.clip_model(&project, row))
            .collect()
    }

    /// Reconcile a clip's lifecycle status from the external job queue.
    pub fn update_clip_status(
        &self,
        clip_id: &str,
        status: ClipStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> Result<(), RepoError> {
        let changed = self.db.update_clip_status(
            clip_id,
            &status.to_string(),
            result.map(Value::to_string).as_deref(),
            error,
        )?;
        if !changed {
            return Err(RepoError::DatabaseError(DatabaseError::NotFound {
                entity: "clip".into(),
                id: clip_id.to_string(),
            }));
        }
        debug!(clip = clip_id, %status, "clip status updated");
        Ok(())
    }

    // -- row resolution and model conversion --------------------------------------

    pub(crate) fn resolve_project(&self, project_id: &str) -> Result<ProjectRow, RepoError> {
        self.db
            .get_project_by_public_id(project_id)?
            .ok_or_else(|| RepoError::ProjectNotFound(project_id.to_string()))
    }

    pub(crate) fn resolve_branch(
        &self,
        project: &ProjectRow,
        name: &str,
    ) -> Result<BranchRow, RepoError> {
        self.db
            .get_branch_by_name(project.id, name)?
            .ok_or_else(|| RepoError::BranchNotFound {
                project: project.public_id.clone(),
                name: name.to_string(),
            })
    }

    pub(crate) fn project_model(&self, row: &ProjectRow) -> Result<Project, RepoError> {
        let parent_project_id = match row.parent_project_id {
            Some(pid) => self
                .db
                .get_project_by_internal_id(pid)?
                .map(|p| p.public_id),
            None => None,
        };
        Ok(Project {
            id: row.public_id.clone(),
            name: row.name.clone(),
            description: row.description.clone(),
            owner_id: row.owner_id.clone(),
            parent_project_id,
            is_public: row.is_public,
            tags: parse_tags(&row.tags),
            created_at: parse_timestamp(&row.created_at),
        })
    }

    pub(crate) fn branch_model(
        &self,
        project: &ProjectRow,
        row: &BranchRow,
    ) -> Result<Branch, RepoError> {
        let parent_branch_id = match row.parent_branch_id {
            Some(bid) => self
                .db
                .get_branch_by_internal_id(bid)?
                .map(|b| b.public_id),
            None => None,
        };
        Ok(Branch {
            id: row.public_id.clone(),
            project_id: project.public_id.clone(),
            name: row.name.clone(),
            head_commit_hash: row.head_commit_hash.clone(),
            creator_id: row.creator_id.clone(),
            description: row.description.clone(),
            tags: parse_tags(&row.tags),
            parent_branch_id,
            created_at: parse_timestamp(&row.created_at),
        })
    }

    pub(crate) fn commit_model(
        &self,
        project: &ProjectRow,
        row: &CommitRow,
    ) -> Result<Commit, RepoError> {
        let snapshot = parse_json_column("commit", "asset_snapshot", &row.asset_snapshot)?;
        Ok(Commit {
            hash: row.hash.clone(),
            project_id: project.public_id.clone(),
            author_id: row.author_id.clone(),
            message: row.message.clone(),
            parent_hash: row.parent_hash.clone(),
            asset_snapshot: snapshot,
            created_at: parse_timestamp(&row.created_at),
        })
    }

    pub(crate) fn clip_model(
        &self,
        project: &ProjectRow,
        row: &ClipRow,
    ) -> Result<ClipSegment, RepoError> {
        let branch_id = match row.branch_id {
            Some(bid) => self
                .db
                .get_branch_by_internal_id(bid)?
                .map(|b| b.public_id),
            None => None,
        };
        let parse_opt = |column: &str, raw: &Option<String>| -> Result<Option<Value>, RepoError> {
            match raw.as_deref() {
                Some(s) => Ok(Some(parse_json_column("clip", column, s)?)),
                None => Ok(None),
            }
        };
        Ok(ClipSegment {
            id: row.public_id.clone(),
            project_id: project.public_id.clone(),
            branch_id,
            owner_id: row.owner_id.clone(),
            title: row.title.clone(),
            summary: row.summary.clone(),
            input_artifacts: parse_opt("input_artifacts", &row.input_artifacts)?,
            assets_ref: parse_opt("assets_ref", &row.assets_ref)?,
            status: ClipStatus::from_str_val(&row.status),
            result: parse_opt("result", &row.result)?,
            error: row.error.clone(),
            created_at: parse_timestamp(&row.created_at),
            updated_at: row.updated_at.as_deref().map(parse_timestamp),
        })
    }
}

//! Merge-request and fork-request state machines.
//!
//! Both machines have exactly one non-terminal state (`open` / `pending`).
//! Every transition is validated against the stored state before any write,
//! and each review operation that performs side effects (merge copies clips,
//! approval forks the project) runs the side effects and the state stamp in
//! one transaction.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::db::queries::{self, MergeRequestRow, NewClip, ProjectRow};
use crate::engine::{new_public_id, parse_json_column, parse_timestamp, RepoEngine};
use crate::errors::{RepoError, ReviewError};
use crate::models::{ForkRequest, ForkStatus, MergeRequest, MergeStatus};

impl RepoEngine {
    // -- merge requests ---------------------------------------------------------

    /// Open a merge request proposing to copy clips from one branch to
    /// another. The caller must be the project owner or the source branch's
    /// creator. When no explicit clip list is supplied, the request carries
    /// the most recent clips on the source branch (configurable limit,
    /// default 200).
    #[instrument(skip(self, title, description, clip_ids))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_merge_request(
        &self,
        project_id: &str,
        caller: &str,
        source_branch_name: &str,
        target_branch_name: &str,
        title: Option<&str>,
        description: Option<&str>,
        clip_ids: Option<&[String]>,
    ) -> Result<MergeRequest, ReviewError> {
        let project = self.resolve_project(project_id)?;
        let source = self.resolve_branch(&project, source_branch_name)?;
        let target = self.resolve_branch(&project, target_branch_name)?;
        if source.id == target.id {
            return Err(ReviewError::SameBranch);
        }
        if project.owner_id != caller && source.creator_id != caller {
            return Err(ReviewError::Forbidden(
                "only the project owner or the source branch creator can open a merge request"
                    .into(),
            ));
        }

        let clip_ids: Vec<String> = match clip_ids {
            Some(ids) => ids.to_vec(),
            None => self.db.recent_clip_ids(
                project.id,
                source.id,
                self.config.merge.default_clip_limit,
            )?,
        };

        let public_id = new_public_id();
        let clip_ids_json = serde_json::to_string(&clip_ids).unwrap_or_else(|_| "[]".into());
        self.db.insert_merge_request(
            &public_id,
            project.id,
            caller,
            source.id,
            target.id,
            title,
            description,
            &clip_ids_json,
        )?;
        info!(project = project_id, mr = %public_id, clips = clip_ids.len(), "opened merge request");

        let row = self.resolve_merge_request(&public_id)?;
        self.merge_request_model(&project, &row)
    }

    /// Fetch a merge request. Callers who are neither the project owner nor
    /// the request creator get `NotFound`, hiding its existence.
    pub fn get_merge_request(
        &self,
        mr_id: &str,
        caller: &str,
    ) -> Result<MergeRequest, ReviewError> {
        let row = self.resolve_merge_request(mr_id)?;
        let project = self.project_row_for(row.project_id, mr_id)?;
        if project.owner_id != caller && row.creator_id != caller {
            return Err(ReviewError::MergeRequestNotFound(mr_id.to_string()));
        }
        self.merge_request_model(&project, &row)
    }

    /// Merge requests on a project, newest first. The owner sees all of
    /// them; anyone else sees only their own.
    pub fn list_merge_requests(
        &self,
        project_id: &str,
        caller: &str,
        limit: u32,
    ) -> Result<Vec<MergeRequest>, ReviewError> {
        let project = self.resolve_project(project_id)?;
        let creator_filter = if project.owner_id == caller {
            None
        } else {
            Some(caller)
        };
        self.db
            .list_merge_requests(project.id, creator_filter, limit)?
            .iter()
            .map(|row| self.merge_request_model(&project, row))
            .collect()
    }

    /// Close an open merge request without merging. Owner or creator only.
    #[instrument(skip(self))]
    pub fn close_merge_request(
        &self,
        mr_id: &str,
        caller: &str,
    ) -> Result<MergeRequest, ReviewError> {
        let row = self.resolve_merge_request(mr_id)?;
        let project = self.project_row_for(row.project_id, mr_id)?;
        if project.owner_id != caller && row.creator_id != caller {
            return Err(ReviewError::Forbidden(
                "only the project owner or the request creator can close a merge request".into(),
            ));
        }
        if MergeStatus::from_str_val(&row.status) != MergeStatus::Open {
            return Err(ReviewError::InvalidMergeState {
                action: "close",
                state: row.status,
            });
        }
        self.db.close_merge_request(row.id)?;
        info!(mr = mr_id, "closed merge request");
        let row = self.resolve_merge_request(mr_id)?;
        self.merge_request_model(&project, &row)
    }

    /// Merge an open merge request. Owner only.
    ///
    /// Merge is a copy, not a move: each listed clip that still resolves on
    /// the recorded source branch is duplicated onto the target branch with
    /// its lineage recorded in `input_artifacts`; clips that moved or
    /// disappeared silently drop out. Copies and the status stamp commit in
    /// one transaction.
    #[instrument(skip(self))]
    pub fn merge_merge_request(
        &self,
        mr_id: &str,
        caller: &str,
    ) -> Result<MergeRequest, ReviewError> {
        let row = self.resolve_merge_request(mr_id)?;
        let project = self.project_row_for(row.project_id, mr_id)?;
        if project.owner_id != caller {
            return Err(ReviewError::Forbidden(
                "only the project owner can merge".into(),
            ));
        }
        if MergeStatus::from_str_val(&row.status) != MergeStatus::Open {
            return Err(ReviewError::InvalidMergeState {
                action: "merge",
                state: row.status,
            });
        }

        let source_branch = self
            .db
            .get_branch_by_internal_id(row.source_branch_id)?
            .ok_or_else(|| ReviewError::MergeRequestNotFound(mr_id.to_string()))?;
        let clip_ids: Vec<String> =
            serde_json::from_str(&row.clip_ids).unwrap_or_default();

        let mut copies = Vec::new();
        for clip_id in &clip_ids {
            let Some(clip) =
                self.db
                    .get_clip_on_branch(project.id, row.source_branch_id, clip_id)?
            else {
                debug!(mr = mr_id, clip = %clip_id, "clip no longer on source branch, skipping");
                continue;
            };
            let original: Value = match clip.input_artifacts.as_deref() {
                Some(raw) => parse_json_column("clip", "input_artifacts", raw)
                    .map_err(ReviewError::DatabaseError)?,
                None => Value::Null,
            };
            let lineage = json!({
                "merged_from_clip_id": clip.public_id,
                "merged_from_branch_id": source_branch.public_id,
                "merged_from_mr_id": row.public_id,
                "original": original,
            });
            copies.push(NewClip {
                public_id: new_public_id(),
                project_id: project.id,
                branch_id: Some(row.target_branch_id),
                owner_id: clip.owner_id,
                title: clip.title,
                summary: clip.summary,
                input_artifacts: Some(lineage.to_string()),
                assets_ref: clip.assets_ref,
                status: clip.status,
                result: clip.result,
                error: clip.error,
            });
        }

        let merged_at = Utc::now().to_rfc3339();
        let merged_clip_ids: Vec<&str> = copies.iter().map(|c| c.public_id.as_str()).collect();
        let merged_clip_ids_json =
            serde_json::to_string(&merged_clip_ids).unwrap_or_else(|_| "[]".into());
        self.db.transaction::<_, _, ReviewError>(|conn| {
            for clip in &copies {
                queries::insert_clip_tx(conn, clip).map_err(ReviewError::DatabaseError)?;
            }
            queries::finalize_merge_tx(conn, row.id, caller, &merged_at, &merged_clip_ids_json)
                .map_err(ReviewError::DatabaseError)?;
            Ok(())
        })?;
        info!(mr = mr_id, copied = copies.len(), "merged merge request");

        let row = self.resolve_merge_request(mr_id)?;
        self.merge_request_model(&project, &row)
    }

    // -- fork requests ------------------------------------------------------------

    /// File a request to fork a project, pending owner approval.
    ///
    /// The owner forks directly instead; a requester may hold only one
    /// pending request per (project, commit hash) pair.
    #[instrument(skip(self))]
    pub fn create_fork_request(
        &self,
        project_id: &str,
        requester: &str,
        commit_hash: Option<&str>,
    ) -> Result<ForkRequest, ReviewError> {
        let project = self.resolve_project(project_id)?;
        if !project.is_public {
            // Private projects are invisible to non-owners.
            return Err(RepoError::ProjectNotFound(project_id.to_string()).into());
        }
        if project.owner_id == requester {
            return Err(ReviewError::OwnerRequest);
        }
        if let Some(hash) = commit_hash {
            if self.db.get_commit(project.id, hash)?.is_none() {
                return Err(RepoError::CommitNotFound(hash.to_string()).into());
            }
        }
        if self
            .db
            .has_pending_fork_request(project.id, requester, commit_hash)?
        {
            return Err(ReviewError::DuplicatePending);
        }

        let public_id = new_public_id();
        self.db
            .insert_fork_request(&public_id, project.id, requester, commit_hash)?;
        info!(project = project_id, fr = %public_id, requester, "filed fork request");
        self.get_fork_request_unchecked(&public_id)
    }

    /// Fetch a fork request. Visible to the project owner and the requester.
    pub fn get_fork_request(
        &self,
        fr_id: &str,
        caller: &str,
    ) -> Result<ForkRequest, ReviewError> {
        let row = self.resolve_fork_request(fr_id)?;
        let project = self.project_row_for(row.project_id, fr_id)?;
        if project.owner_id != caller && row.requester_id != caller {
            return Err(ReviewError::ForkRequestNotFound(fr_id.to_string()));
        }
        self.fork_request_model(&project, &row)
    }

    /// Fork requests on a project, newest first. Owner only.
    pub fn list_fork_requests(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<Vec<ForkRequest>, ReviewError> {
        let project = self.resolve_project(project_id)?;
        if project.owner_id != caller {
            return Err(ReviewError::Forbidden(
                "only the project owner can list fork requests".into(),
            ));
        }
        self.db
            .list_fork_requests(project.id)?
            .iter()
            .map(|row| self.fork_request_model(&project, row))
            .collect()
    }

    /// Approve a pending fork request: forks the project on the requester's
    /// behalf and stamps the new project id onto the request, atomically.
    #[instrument(skip(self))]
    pub fn approve_fork_request(
        &self,
        fr_id: &str,
        caller: &str,
    ) -> Result<ForkRequest, ReviewError> {
        let row = self.resolve_fork_request(fr_id)?;
        let project = self.project_row_for(row.project_id, fr_id)?;
        if project.owner_id != caller {
            return Err(ReviewError::Forbidden(
                "only the project owner can approve fork requests".into(),
            ));
        }
        if ForkStatus::from_str_val(&row.status) != ForkStatus::Pending {
            return Err(ReviewError::InvalidForkState {
                action: "approve",
                state: row.status,
            });
        }

        let state = self.resolve_fork_state(&project, row.commit_hash.as_deref())?;
        let reviewed_at = Utc::now().to_rfc3339();
        let forked = self.db.transaction::<_, _, ReviewError>(|conn| {
            let forked =
                crate::engine::fork_project_tx(conn, &project, &row.requester_id, state.as_ref())?;
            queries::review_fork_request_tx(
                conn,
                row.id,
                "approved",
                caller,
                &reviewed_at,
                Some(forked.internal_id),
            )
            .map_err(ReviewError::DatabaseError)?;
            Ok(forked)
        })?;
        info!(fr = fr_id, project = %forked.public_id, "approved fork request");
        self.get_fork_request_unchecked(fr_id)
    }

    /// Reject a pending fork request. No side effect beyond the status.
    #[instrument(skip(self))]
    pub fn reject_fork_request(
        &self,
        fr_id: &str,
        caller: &str,
    ) -> Result<ForkRequest, ReviewError> {
        let row = self.resolve_fork_request(fr_id)?;
        let project = self.project_row_for(row.project_id, fr_id)?;
        if project.owner_id != caller {
            return Err(ReviewError::Forbidden(
                "only the project owner can reject fork requests".into(),
            ));
        }
        if ForkStatus::from_str_val(&row.status) != ForkStatus::Pending {
            return Err(ReviewError::InvalidForkState {
                action: "reject",
                state: row.status,
            });
        }
        let reviewed_at = Utc::now().to_rfc3339();
        self.db.transaction::<_, _, ReviewError>(|conn| {
            queries::review_fork_request_tx(conn, row.id, "rejected", caller, &reviewed_at, None)
                .map_err(ReviewError::DatabaseError)
        })?;
        info!(fr = fr_id, "rejected fork request");
        self.get_fork_request_unchecked(fr_id)
    }

    // -- resolution and model conversion --------------------------------------

    fn resolve_merge_request(&self, mr_id: &str) -> Result<MergeRequestRow, ReviewError> {
        self.db
            .get_merge_request(mr_id)?
            .ok_or_else(|| ReviewError::MergeRequestNotFound(mr_id.to_string()))
    }

    fn resolve_fork_request(
        &self,
        fr_id: &str,
    ) -> Result<queries::ForkRequestRow, ReviewError> {
        self.db
            .get_fork_request(fr_id)?
            .ok_or_else(|| ReviewError::ForkRequestNotFound(fr_id.to_string()))
    }

    fn project_row_for(&self, project_id: i64, request_id: &str) -> Result<ProjectRow, ReviewError> {
        self.db
            .get_project_by_internal_id(project_id)?
            .ok_or_else(|| ReviewError::MergeRequestNotFound(request_id.to_string()))
    }

    fn get_fork_request_unchecked(&self, fr_id: &str) -> Result<ForkRequest, ReviewError> {
        let row = self.resolve_fork_request(fr_id)?;
        let project = self.project_row_for(row.project_id, fr_id)?;
        self.fork_request_model(&project, &row)
    }

    fn merge_request_model(
        &self,
        project: &ProjectRow,
        row: &MergeRequestRow,
    ) -> Result<MergeRequest, ReviewError> {
        let source = self
            .db
            .get_branch_by_internal_id(row.source_branch_id)?
            .ok_or_else(|| ReviewError::MergeRequestNotFound(row.public_id.clone()))?;
        let target = self
            .db
            .get_branch_by_internal_id(row.target_branch_id)?
            .ok_or_else(|| ReviewError::MergeRequestNotFound(row.public_id.clone()))?;
        let clip_ids: Vec<String> = serde_json::from_str(&row.clip_ids).unwrap_or_default();
        let merged_clip_ids: Option<Vec<String>> = row
            .merged_clip_ids
            .as_deref()
            .map(|raw| serde_json::from_str(raw).unwrap_or_default());
        Ok(MergeRequest {
            id: row.public_id.clone(),
            project_id: project.public_id.clone(),
            creator_id: row.creator_id.clone(),
            source_branch_id: source.public_id.clone(),
            target_branch_id: target.public_id.clone(),
            source_branch_name: source.name,
            target_branch_name: target.name,
            title: row.title.clone(),
            description: row.description.clone(),
            clip_ids,
            merged_clip_ids,
            status: MergeStatus::from_str_val(&row.status),
            merged_by: row.merged_by.clone(),
            merged_at: row.merged_at.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&row.created_at),
        })
    }

    fn fork_request_model(
        &self,
        project: &ProjectRow,
        row: &queries::ForkRequestRow,
    ) -> Result<ForkRequest, ReviewError> {
        let approved_project_id = match row.approved_project_id {
            Some(pid) => self
                .db
                .get_project_by_internal_id(pid)?
                .map(|p| p.public_id),
            None => None,
        };
        Ok(ForkRequest {
            id: row.public_id.clone(),
            project_id: project.public_id.clone(),
            requester_id: row.requester_id.clone(),
            commit_hash: row.commit_hash.clone(),
            status: ForkStatus::from_str_val(&row.status),
            reviewer_id: row.reviewer_id.clone(),
            reviewed_at: row.reviewed_at.as_deref().map(parse_timestamp),
            approved_project_id,
            created_at: parse_timestamp(&row.created_at),
        })
    }
}

//! Domain model types used throughout ReelVC.
//!
//! These types bridge the engine, database layer, and any outer API surface.
//! Identifiers exposed here are stable opaque public ids; internal row ids
//! never leave the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A collaborative video project.
///
/// Every project owns exactly one branch named `"main"`, created atomically
/// with the project. `parent_project_id` records fork lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub parent_project_id: Option<String>,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// A named mutable pointer to a commit, scoped to one project.
///
/// `parent_branch_id` is set when the branch was created by forking another
/// branch. The branch also carries a mutable workspace document, which is
/// not content-addressed; see [`crate::workspace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub head_commit_hash: Option<String>,
    pub creator_id: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parent_branch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// An immutable, content-addressed snapshot of a project's media-asset state.
///
/// The hash is computed over `{message, parent_hash, asset_snapshot,
/// timestamp}`; see [`crate::canonical::commit_hash`]. Parent links form a
/// DAG per project. Merge reconciliation creates new root commits, so in
/// practice the DAG is a forest of chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// SHA1 hex digest, the commit's identity.
    pub hash: String,
    pub project_id: String,
    pub author_id: String,
    pub message: String,
    pub parent_hash: Option<String>,
    /// Named asset slots mapped to URLs/metadata. Opaque to the engine
    /// except for slot counting in contributor scoring.
    pub asset_snapshot: Value,
    pub created_at: DateTime<Utc>,
}

/// The resolved state at a branch HEAD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadState {
    pub commit_id: Option<String>,
    pub message: Option<String>,
    pub asset_snapshot: Value,
}

// ---------------------------------------------------------------------------
// Clip segments
// ---------------------------------------------------------------------------

/// A derived artifact record belonging to a project and branch.
///
/// Clip segments carry generation inputs/outputs and a lifecycle status.
/// They are the unit moved (copied) by merge requests. Not content-addressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipSegment {
    pub id: String,
    pub project_id: String,
    pub branch_id: Option<String>,
    pub owner_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub input_artifacts: Option<Value>,
    pub assets_ref: Option<Value>,
    pub status: ClipStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of a clip segment's generation job.
///
/// Transitions are `pending → started → succeeded | failed`, reconciled by
/// short synchronous update calls; the job itself runs outside this core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Pending,
    Started,
    Succeeded,
    Failed,
}

impl ClipStatus {
    /// Parse a status string, defaulting to `Pending`.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "started" => Self::Started,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Started => write!(f, "started"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge requests
// ---------------------------------------------------------------------------

/// A proposal to copy specific clips from one branch to another.
///
/// Created by the project owner or the source branch's creator; merged by
/// the owner only. Merge is a copy, not a move: originals stay on the
/// source branch and new clips record their lineage in `input_artifacts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: String,
    pub project_id: String,
    pub creator_id: String,
    pub source_branch_id: String,
    pub target_branch_id: String,
    pub source_branch_name: String,
    pub target_branch_name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub clip_ids: Vec<String>,
    pub merged_clip_ids: Option<Vec<String>>,
    pub status: MergeStatus,
    pub merged_by: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Merge-request status. `open` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Open,
    Closed,
    Merged,
}

impl MergeStatus {
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "closed" => Self::Closed,
            "merged" => Self::Merged,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fork requests
// ---------------------------------------------------------------------------

/// A request by a non-owner to fork a project, pending owner approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkRequest {
    pub id: String,
    pub project_id: String,
    pub requester_id: String,
    pub commit_hash: Option<String>,
    pub status: ForkStatus,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub approved_project_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fork-request status. `pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForkStatus {
    Pending,
    Approved,
    Rejected,
}

impl ForkStatus {
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for ForkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_round_trip() {
        for s in [ClipStatus::Pending, ClipStatus::Started, ClipStatus::Succeeded, ClipStatus::Failed] {
            assert_eq!(ClipStatus::from_str_val(&s.to_string()), s);
        }
        for s in [MergeStatus::Open, MergeStatus::Closed, MergeStatus::Merged] {
            assert_eq!(MergeStatus::from_str_val(&s.to_string()), s);
        }
        for s in [ForkStatus::Pending, ForkStatus::Approved, ForkStatus::Rejected] {
            assert_eq!(ForkStatus::from_str_val(&s.to_string()), s);
        }
    }

    #[test]
    fn test_unknown_status_defaults() {
        assert_eq!(ClipStatus::from_str_val("bogus"), ClipStatus::Pending);
        assert_eq!(MergeStatus::from_str_val("bogus"), MergeStatus::Open);
        assert_eq!(ForkStatus::from_str_val("bogus"), ForkStatus::Pending);
    }
}

//! Comprehensive error types for the ReelVC core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Repository errors (projects, branches, commits)
// ---------------------------------------------------------------------------

/// Errors from project, branch, and commit operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested project does not exist or is not visible to the caller.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// The named branch does not exist within the project.
    #[error("branch '{name}' not found in project {project}")]
    BranchNotFound {
        project: String,
        name: String,
    },

    /// The referenced commit hash does not resolve within the project.
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// A branch with this name already exists in the project.
    #[error("branch '{name}' already exists in project {project}")]
    BranchAlreadyExists {
        project: String,
        name: String,
    },

    /// The caller lacks ownership or creatorship for the requested mutation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Confirmation string mismatch on a destructive operation.
    #[error("confirmation mismatch: expected project name '{expected}'")]
    ConfirmationMismatch {
        expected: String,
    },

    /// A commit with identical content already exists (hash collision).
    #[error("commit hash collision: {0}")]
    HashCollision(String),

    /// Database error during a repository operation.
    #[error("repository database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Review errors (merge requests, fork requests)
// ---------------------------------------------------------------------------

/// Errors from the merge-request and fork-request state machines.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The requested merge request was not found (or hidden from the caller).
    #[error("merge request not found: {0}")]
    MergeRequestNotFound(String),

    /// The requested fork request was not found.
    #[error("fork request not found: {0}")]
    ForkRequestNotFound(String),

    /// A state-machine transition was attempted from a non-source state.
    #[error("invalid state: cannot {action} a merge request in state '{state}'")]
    InvalidMergeState {
        action: &'static str,
        state: String,
    },

    /// A fork-request transition was attempted from a terminal state.
    #[error("invalid state: cannot {action} a fork request in state '{state}'")]
    InvalidForkState {
        action: &'static str,
        state: String,
    },

    /// Source and target branches of a merge request must differ.
    #[error("source and target branch must differ")]
    SameBranch,

    /// The requester already has a pending fork request for this commit.
    #[error("a pending fork request for this commit already exists")]
    DuplicatePending,

    /// The project owner must fork directly instead of filing a request.
    #[error("project owner should use direct fork instead of a fork request")]
    OwnerRequest,

    /// The caller lacks the required role for this transition.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Underlying repository error (branch/project resolution).
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Database error during a review operation.
    #[error("review database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Workspace errors (boundary lock enforcer)
// ---------------------------------------------------------------------------

/// Errors from workspace writes and the boundary lock enforcer.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The new document moves the lock boundary backward.
    #[error("lock boundary cannot move backward (was {previous}, got {next})")]
    LockBoundaryRegression {
        previous: i64,
        next: i64,
    },

    /// A node below the configured boundary was modified or removed.
    #[error("locked node '{node_id}' is immutable below boundary {boundary}")]
    LockedNodeMutated {
        node_id: String,
        boundary: i64,
    },

    /// A beat referenced by a locked node was modified or removed.
    #[error("locked beat '{beat_id}' is immutable")]
    LockedBeatMutated {
        beat_id: String,
    },

    /// A boundary is configured but the new document carries no story workflow.
    #[error("storyWorkflow is required while a lock boundary is configured")]
    MissingWorkflow,

    /// The caller may not write this branch's workspace.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The workspace document failed to parse.
    #[error("invalid workspace document: {0}")]
    InvalidDocument(String),

    /// Underlying repository error (branch/project resolution).
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Database error during a workspace operation.
    #[error("workspace database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// A stored JSON column failed to deserialize.
    #[error("corrupt JSON in {entity} column {column}: {detail}")]
    CorruptJson {
        entity: String,
        column: String,
        detail: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RepoError::BranchNotFound {
            project: "p-123".into(),
            name: "dev".into(),
        };
        assert_eq!(err.to_string(), "branch 'dev' not found in project p-123");

        let err = ReviewError::InvalidMergeState {
            action: "merge",
            state: "closed".into(),
        };
        assert!(err.to_string().contains("closed"));

        let err = WorkspaceError::LockBoundaryRegression {
            previous: 2,
            next: 1,
        };
        assert!(err.to_string().contains("backward"));

        let err = ConfigError::InvalidValue {
            field: "cache_ttl_secs".into(),
            detail: "must be positive".into(),
        };
        assert!(err.to_string().contains("cache_ttl_secs"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let repo_err = RepoError::CommitNotFound("abc".into());
        let core_err: CoreError = repo_err.into();
        assert!(matches!(core_err, CoreError::Repo(_)));

        let db_err = DatabaseError::NotFound {
            entity: "commit".into(),
            id: "abc".into(),
        };
        let core_err: CoreError = CoreError::Database(db_err);
        assert!(matches!(core_err, CoreError::Database(_)));
    }
}

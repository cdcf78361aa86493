//! Project graph assembly and contributor scoring.
//!
//! The graph view is the read model for a whole project: every branch, the
//! commit chain reachable from each branch HEAD, and per-branch contributor
//! statistics. Assembly walks parent links in memory, so it reads each
//! project's commit set exactly once per call.
//!
//! Reads go through a [`GraphCache`] keyed `project_graph:<project-id>`.
//! Cache failures are logged and ignored; the view is always recomputable
//! from the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::GraphCache;
use crate::config::GraphConfig;
use crate::db::queries::{CommitRow, ProjectRow};
use crate::db::Database;
use crate::errors::{DatabaseError, RepoError};

// ---------------------------------------------------------------------------
// Graph view types
// ---------------------------------------------------------------------------

/// The assembled read model for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectGraph {
    pub project_id: String,
    pub branches: Vec<GraphBranch>,
    /// Every commit in the project, oldest first. Includes commits no branch
    /// HEAD reaches any more (a parent-override commit leaves the old tip
    /// behind, but it stays visible here).
    pub commits: Vec<GraphCommit>,
    /// Sum of all branch scores, the denominator for `project_percent`.
    pub total_score: f64,
}

/// One branch with its reachable commit chain and contributor stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphBranch {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub head_commit_hash: Option<String>,
    pub parent_branch_id: Option<String>,
    /// Commits reachable from HEAD, newest first.
    pub commits: Vec<GraphCommit>,
    pub contributors: Vec<ContributorStat>,
    pub total_score: f64,
    /// This branch's share of the project total, percent with one decimal.
    pub project_percent: f64,
}

/// A commit as it appears in the graph view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphCommit {
    pub hash: String,
    pub author_id: String,
    pub message: String,
    pub parent_hash: Option<String>,
    pub created_at: String,
    /// Number of named asset slots in the snapshot.
    pub slot_count: usize,
    /// `1 + 0.5 * slot_count`.
    pub score: f64,
}

/// Per-author contribution within one branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorStat {
    pub user_id: String,
    pub score: f64,
    /// Share of the branch total, percent with one decimal.
    pub percent: f64,
}

/// Cache key for a project's graph view.
pub fn graph_cache_key(project_public_id: &str) -> String {
    format!("project_graph:{project_public_id}")
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn commit_score(snapshot: &Value) -> (usize, f64) {
    let slot_count = snapshot.as_object().map(|m| m.len()).unwrap_or(0);
    (slot_count, 1.0 + 0.5 * slot_count as f64)
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Assembles [`ProjectGraph`] views, with read-through caching.
pub struct GraphAssembler {
    cache: Arc<dyn GraphCache>,
    cache_enabled: bool,
    ttl: Duration,
}

impl GraphAssembler {
    pub fn new(cache: Arc<dyn GraphCache>, config: &GraphConfig) -> Self {
        Self {
            cache,
            cache_enabled: config.cache_enabled,
            ttl: Duration::from_secs(config.cache_ttl_secs),
        }
    }

    /// The graph view for `project`, from cache when fresh.
    pub fn project_graph(
        &self,
        db: &Database,
        project: &ProjectRow,
    ) -> Result<ProjectGraph, RepoError> {
        let key = graph_cache_key(&project.public_id);

        if self.cache_enabled {
            match self.cache.get(&key) {
                Ok(Some(json)) => match serde_json::from_str(&json) {
                    Ok(graph) => {
                        debug!(project = %project.public_id, "graph cache hit");
                        return Ok(graph);
                    }
                    Err(e) => {
                        warn!(project = %project.public_id, error = %e, "discarding unreadable cached graph");
                        if let Err(e) = self.cache.delete(&key) {
                            warn!(error = %e, "graph cache delete failed");
                        }
                    }
                },
                Ok(None) => {}
                Err(e) => warn!(project = %project.public_id, error = %e, "graph cache read failed"),
            }
        }

        let graph = assemble(db, project)?;

        if self.cache_enabled {
            match serde_json::to_string(&graph) {
                Ok(json) => {
                    if let Err(e) = self.cache.set(&key, &json, self.ttl) {
                        warn!(project = %project.public_id, error = %e, "graph cache write failed");
                    }
                }
                Err(e) => warn!(error = %e, "graph serialization for cache failed"),
            }
        }

        Ok(graph)
    }

    /// Drop the cached view for a project after any history mutation.
    pub fn invalidate(&self, project_public_id: &str) {
        if !self.cache_enabled {
            return;
        }
        let key = graph_cache_key(project_public_id);
        if let Err(e) = self.cache.delete(&key) {
            warn!(project = project_public_id, error = %e, "graph cache invalidation failed");
        }
    }
}

/// Assemble the graph view from the store.
fn assemble(db: &Database, project: &ProjectRow) -> Result<ProjectGraph, RepoError> {
    let branches = db.list_branches(project.id)?;
    let commits = db.list_commits(project.id)?;

    // Hash -> (row, parsed snapshot). Snapshots are parsed once up front.
    let mut by_hash: HashMap<&str, (&CommitRow, Value)> = HashMap::with_capacity(commits.len());
    for row in &commits {
        let snapshot: Value = serde_json::from_str(&row.asset_snapshot).map_err(|e| {
            RepoError::DatabaseError(DatabaseError::CorruptJson {
                entity: "commit".into(),
                column: "asset_snapshot".into(),
                detail: format!("{}: {e}", row.hash),
            })
        })?;
        by_hash.insert(row.hash.as_str(), (row, snapshot));
    }

    let all_commits: Vec<GraphCommit> = commits
        .iter()
        .map(|row| {
            let (_, snapshot) = &by_hash[row.hash.as_str()];
            let (slot_count, score) = commit_score(snapshot);
            GraphCommit {
                hash: row.hash.clone(),
                author_id: row.author_id.clone(),
                message: row.message.clone(),
                parent_hash: row.parent_hash.clone(),
                created_at: row.created_at.clone(),
                slot_count,
                score,
            }
        })
        .collect();

    let mut graph_branches = Vec::with_capacity(branches.len());
    let mut project_total = 0.0;

    for branch in &branches {
        let mut chain = Vec::new();
        let mut scores: HashMap<&str, f64> = HashMap::new();
        let mut branch_total = 0.0;

        // Walk parent links from HEAD. The visited set guards against
        // malformed cyclic chains; well-formed history never cycles.
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cursor = branch.head_commit_hash.as_deref();
        while let Some(hash) = cursor {
            if !visited.insert(hash) {
                warn!(branch = %branch.public_id, hash, "cycle in commit chain, stopping walk");
                break;
            }
            let Some((row, snapshot)) = by_hash.get(hash) else {
                warn!(branch = %branch.public_id, hash, "dangling parent link, stopping walk");
                break;
            };
            let (slot_count, score) = commit_score(snapshot);
            branch_total += score;
            *scores.entry(row.author_id.as_str()).or_insert(0.0) += score;
            chain.push(GraphCommit {
                hash: row.hash.clone(),
                author_id: row.author_id.clone(),
                message: row.message.clone(),
                parent_hash: row.parent_hash.clone(),
                created_at: row.created_at.clone(),
                slot_count,
                score,
            });
            cursor = row.parent_hash.as_deref();
        }

        let mut contributors: Vec<ContributorStat> = scores
            .into_iter()
            .map(|(user_id, score)| ContributorStat {
                user_id: user_id.to_string(),
                score,
                percent: if branch_total > 0.0 {
                    round1(score / branch_total * 100.0)
                } else {
                    0.0
                },
            })
            .collect();
        // Deterministic ordering: biggest contributor first, ties by id.
        contributors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        project_total += branch_total;

        let parent_branch_id = match branch.parent_branch_id {
            Some(pid) => db.get_branch_by_internal_id(pid)?.map(|b| b.public_id),
            None => None,
        };

        graph_branches.push(GraphBranch {
            id: branch.public_id.clone(),
            name: branch.name.clone(),
            creator_id: branch.creator_id.clone(),
            description: branch.description.clone(),
            tags: crate::engine::parse_tags(&branch.tags),
            head_commit_hash: branch.head_commit_hash.clone(),
            parent_branch_id,
            commits: chain,
            contributors,
            total_score: branch_total,
            project_percent: 0.0,
        });
    }

    for branch in &mut graph_branches {
        branch.project_percent = if project_total > 0.0 {
            round1(branch.total_score / project_total * 100.0)
        } else {
            0.0
        };
    }

    debug!(
        project = %project.public_id,
        branches = graph_branches.len(),
        total_score = project_total,
        "assembled project graph"
    );

    Ok(ProjectGraph {
        project_id: project.public_id.clone(),
        branches: graph_branches,
        commits: all_commits,
        total_score: project_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NullCache};
    use crate::db::queries::{insert_commit_tx, update_branch_head_tx};

    fn test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn seed_project(db: &Database) -> ProjectRow {
        db.insert_project("p-1", "film", None, "owner", None, true, "[]")
            .unwrap();
        db.get_project_by_public_id("p-1").unwrap().unwrap()
    }

    fn add_commit(
        db: &Database,
        project: &ProjectRow,
        branch_id: i64,
        hash: &str,
        author: &str,
        parent: Option<&str>,
        snapshot: &str,
        created_at: &str,
    ) {
        db.transaction::<_, _, DatabaseError>(|conn| {
            insert_commit_tx(conn, hash, project.id, author, "m", parent, snapshot, created_at)?;
            update_branch_head_tx(conn, branch_id, hash)?;
            Ok(())
        })
        .unwrap();
    }

    fn assembler(cache: Arc<dyn GraphCache>) -> GraphAssembler {
        GraphAssembler::new(cache, &GraphConfig::default())
    }

    #[test]
    fn test_commit_score_counts_slots() {
        let (slots, score) = commit_score(&serde_json::json!({"a": "x", "b": "y"}));
        assert_eq!(slots, 2);
        assert_eq!(score, 2.0);

        let (slots, score) = commit_score(&serde_json::json!({}));
        assert_eq!(slots, 0);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_graph_walks_parent_chain() {
        let db = test_db();
        let project = seed_project(&db);
        let bid = db
            .insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();
        add_commit(&db, &project, bid, "c1", "owner", None, "{}", "2026-01-01T00:00:00");
        add_commit(&db, &project, bid, "c2", "alice", Some("c1"), r#"{"a": "x"}"#, "2026-01-02T00:00:00");

        let graph = assembler(Arc::new(NullCache)).project_graph(&db, &project).unwrap();
        assert_eq!(graph.branches.len(), 1);
        let branch = &graph.branches[0];
        assert_eq!(branch.commits.len(), 2);
        // Newest first.
        assert_eq!(branch.commits[0].hash, "c2");
        assert_eq!(branch.commits[1].hash, "c1");
        // c1 scores 1.0, c2 scores 1.5.
        assert_eq!(branch.total_score, 2.5);
        assert_eq!(branch.project_percent, 100.0);
    }

    #[test]
    fn test_contributor_percentages_sum_per_branch() {
        let db = test_db();
        let project = seed_project(&db);
        let bid = db
            .insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();
        add_commit(&db, &project, bid, "c1", "owner", None, "{}", "2026-01-01T00:00:00");
        add_commit(&db, &project, bid, "c2", "alice", Some("c1"), r#"{"a": 1, "b": 2}"#, "2026-01-02T00:00:00");

        let graph = assembler(Arc::new(NullCache)).project_graph(&db, &project).unwrap();
        let branch = &graph.branches[0];
        // owner: 1.0 of 3.0 = 33.3; alice: 2.0 of 3.0 = 66.7.
        assert_eq!(branch.contributors[0].user_id, "alice");
        assert_eq!(branch.contributors[0].percent, 66.7);
        assert_eq!(branch.contributors[1].user_id, "owner");
        assert_eq!(branch.contributors[1].percent, 33.3);
    }

    #[test]
    fn test_branch_project_percent_split() {
        let db = test_db();
        let project = seed_project(&db);
        let main = db
            .insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();
        let dev = db
            .insert_branch("b-dev", project.id, "dev", None, "alice", None, "[]", Some(main))
            .unwrap();
        add_commit(&db, &project, main, "c1", "owner", None, "{}", "2026-01-01T00:00:00");
        add_commit(&db, &project, dev, "c2", "alice", None, r#"{"a": 1, "b": 2, "c": 3, "d": 4}"#, "2026-01-02T00:00:00");

        let graph = assembler(Arc::new(NullCache)).project_graph(&db, &project).unwrap();
        assert_eq!(graph.total_score, 4.0);
        let by_name: HashMap<_, _> = graph
            .branches
            .iter()
            .map(|b| (b.name.as_str(), b))
            .collect();
        assert_eq!(by_name["main"].project_percent, 25.0);
        assert_eq!(by_name["dev"].project_percent, 75.0);
        assert_eq!(by_name["dev"].parent_branch_id.as_deref(), Some("b-main"));
    }

    #[test]
    fn test_shared_prefix_counted_on_both_branches() {
        // A forked branch sees the shared ancestor commits too.
        let db = test_db();
        let project = seed_project(&db);
        let main = db
            .insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();
        add_commit(&db, &project, main, "c1", "owner", None, "{}", "2026-01-01T00:00:00");
        let dev = db
            .insert_branch("b-dev", project.id, "dev", Some("c1"), "alice", None, "[]", Some(main))
            .unwrap();
        add_commit(&db, &project, dev, "c2", "alice", Some("c1"), "{}", "2026-01-02T00:00:00");

        let graph = assembler(Arc::new(NullCache)).project_graph(&db, &project).unwrap();
        let by_name: HashMap<_, _> = graph
            .branches
            .iter()
            .map(|b| (b.name.as_str(), b))
            .collect();
        assert_eq!(by_name["main"].commits.len(), 1);
        assert_eq!(by_name["dev"].commits.len(), 2);
    }

    #[test]
    fn test_cache_round_trip_and_invalidation() {
        let db = test_db();
        let project = seed_project(&db);
        let bid = db
            .insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();
        add_commit(&db, &project, bid, "c1", "owner", None, "{}", "2026-01-01T00:00:00");

        let cache = Arc::new(MemoryCache::new());
        let assembler = assembler(cache.clone());

        let first = assembler.project_graph(&db, &project).unwrap();
        assert_eq!(first.branches[0].commits.len(), 1);
        assert!(cache.get(&graph_cache_key("p-1")).unwrap().is_some());

        // A stale cache hides new commits until invalidated.
        add_commit(&db, &project, bid, "c2", "owner", Some("c1"), "{}", "2026-01-02T00:00:00");
        let stale = assembler.project_graph(&db, &project).unwrap();
        assert_eq!(stale.branches[0].commits.len(), 1);

        assembler.invalidate("p-1");
        let fresh = assembler.project_graph(&db, &project).unwrap();
        assert_eq!(fresh.branches[0].commits.len(), 2);
    }

    #[test]
    fn test_flat_commit_list_keeps_unreachable_tips() {
        // Re-parenting HEAD onto c1 leaves c2 off every branch chain, but it
        // still belongs to the project and stays in the flat commit list.
        let db = test_db();
        let project = seed_project(&db);
        let bid = db
            .insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();
        add_commit(&db, &project, bid, "c1", "owner", None, "{}", "2026-01-01T00:00:00");
        add_commit(&db, &project, bid, "c2", "owner", Some("c1"), "{}", "2026-01-02T00:00:00");
        add_commit(&db, &project, bid, "c3", "owner", Some("c1"), "{}", "2026-01-03T00:00:00");

        let graph = assembler(Arc::new(NullCache)).project_graph(&db, &project).unwrap();
        let chain: Vec<_> = graph.branches[0].commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(chain, vec!["c3", "c1"]);

        let flat: Vec<_> = graph.commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(flat, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_empty_project_graph() {
        let db = test_db();
        let project = seed_project(&db);
        db.insert_branch("b-main", project.id, "main", None, "owner", None, "[]", None)
            .unwrap();

        let graph = assembler(Arc::new(NullCache)).project_graph(&db, &project).unwrap();
        assert_eq!(graph.total_score, 0.0);
        assert_eq!(graph.branches[0].project_percent, 0.0);
        assert!(graph.branches[0].commits.is_empty());
        assert!(graph.branches[0].contributors.is_empty());
    }
}

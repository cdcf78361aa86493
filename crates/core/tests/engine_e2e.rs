//! End-to-end tests exercising the whole engine through its public API,
//! from project creation through branching, merging, forking, and the
//! graph view.

use std::sync::Arc;

use serde_json::json;
use reelvc_core::models::{ClipStatus, ForkStatus, MergeStatus};
use reelvc_core::{AppConfig, Database, MemoryCache, NullCache, RepoEngine};

fn engine_with_cache(cache: Arc<dyn reelvc_core::GraphCache>) -> RepoEngine {
    let db = Database::in_memory().expect("in-memory db");
    db.initialize().expect("schema");
    RepoEngine::new(db, AppConfig::default(), cache)
}

fn engine() -> RepoEngine {
    engine_with_cache(Arc::new(NullCache))
}

#[test]
fn test_commit_branch_head_scenario() {
    let engine = engine();

    let project = engine
        .create_project("alice", "Short Film", Some("a short film"), &[], true)
        .unwrap();

    let m1 = engine
        .create_commit(&project.id, "alice", "first cut", &json!({"a": "x"}), "main", None)
        .unwrap();
    assert!(m1.parent_hash.is_none());

    let dev = engine
        .create_branch(&project.id, "alice", "dev", Some(&m1.hash))
        .unwrap();
    assert_eq!(dev.head_commit_hash.as_deref(), Some(m1.hash.as_str()));

    let m2 = engine
        .create_commit(
            &project.id,
            "alice",
            "second cut",
            &json!({"a": "x", "b": "y"}),
            "dev",
            None,
        )
        .unwrap();
    assert_eq!(m2.parent_hash.as_deref(), Some(m1.hash.as_str()));

    // main still points at m1, dev advanced to m2.
    let main_head = engine.get_head_state(&project.id, "main").unwrap();
    assert_eq!(main_head.commit_id.as_deref(), Some(m1.hash.as_str()));
    assert_eq!(main_head.asset_snapshot, json!({"a": "x"}));

    let dev_head = engine.get_head_state(&project.id, "dev").unwrap();
    assert_eq!(dev_head.commit_id.as_deref(), Some(m2.hash.as_str()));
    assert_eq!(dev_head.asset_snapshot, json!({"a": "x", "b": "y"}));
}

#[test]
fn test_head_atomicity_parent_is_prior_head() {
    let engine = engine();
    let project = engine.create_project("alice", "p", None, &[], true).unwrap();

    let mut prior: Option<String> = None;
    for i in 0..5 {
        let commit = engine
            .create_commit(&project.id, "alice", &format!("c{i}"), &json!({}), "main", None)
            .unwrap();
        assert_eq!(commit.parent_hash, prior);
        let head = engine.get_head_state(&project.id, "main").unwrap();
        assert_eq!(head.commit_id.as_deref(), Some(commit.hash.as_str()));
        prior = Some(commit.hash);
    }
}

#[test]
fn test_fork_name_uniqueness() {
    let engine = engine();
    let project = engine.create_project("owner", "p", None, &[], true).unwrap();
    engine
        .create_commit(&project.id, "owner", "m", &json!({"a": 1}), "main", None)
        .unwrap();

    let f1 = engine
        .fork_as_branch(&project.id, "alice", "main", None, None, None, &[])
        .unwrap();
    let f2 = engine
        .fork_as_branch(&project.id, "alice", "main", None, None, None, &[])
        .unwrap();
    assert_eq!(f1.name, "fork/alice");
    assert_eq!(f2.name, "fork/alice_1");
}

#[test]
fn test_merge_request_full_flow() {
    let engine = engine();
    let project = engine.create_project("owner", "p", None, &[], true).unwrap();
    engine
        .create_commit(&project.id, "owner", "base", &json!({"a": 1}), "main", None)
        .unwrap();

    let fork = engine
        .fork_as_branch(&project.id, "alice", "main", None, None, None, &[])
        .unwrap();

    let clip = engine
        .create_clip(
            &project.id,
            &fork.name,
            "alice",
            Some("opening"),
            None,
            Some(&json!({"prompt": "dawn"})),
            None,
        )
        .unwrap();
    engine
        .update_clip_status(&clip.id, ClipStatus::Succeeded, Some(&json!({"url": "u"})), None)
        .unwrap();

    let mr = engine
        .create_merge_request(&project.id, "alice", &fork.name, "main", Some("merge opening"), None, None)
        .unwrap();
    assert_eq!(mr.status, MergeStatus::Open);
    assert_eq!(mr.clip_ids, vec![clip.id.clone()]);

    let merged = engine.merge_merge_request(&mr.id, "owner").unwrap();
    assert_eq!(merged.status, MergeStatus::Merged);

    // Copy-not-move: the source keeps its clip, the target gains a lineage copy.
    let source_clips = engine.list_clips(&project.id, &fork.name, 10).unwrap();
    assert_eq!(source_clips.len(), 1);
    let target_clips = engine.list_clips(&project.id, "main", 10).unwrap();
    assert_eq!(target_clips.len(), 1);
    let lineage = target_clips[0].input_artifacts.as_ref().unwrap();
    assert_eq!(lineage["merged_from_clip_id"], json!(clip.id));
    assert_eq!(lineage["merged_from_branch_id"], json!(fork.id));
    assert_eq!(lineage["original"], json!({"prompt": "dawn"}));
}

#[test]
fn test_fork_request_approval_flow() {
    let engine = engine();
    let project = engine.create_project("owner", "p", None, &[], true).unwrap();
    let commit = engine
        .create_commit(&project.id, "owner", "m", &json!({"a": "x"}), "main", None)
        .unwrap();

    let fr = engine
        .create_fork_request(&project.id, "bob", Some(&commit.hash))
        .unwrap();
    assert_eq!(fr.status, ForkStatus::Pending);

    let approved = engine.approve_fork_request(&fr.id, "owner").unwrap();
    assert_eq!(approved.status, ForkStatus::Approved);
    let forked_id = approved.approved_project_id.unwrap();

    let forked = engine.get_project(&forked_id).unwrap();
    assert_eq!(forked.owner_id, "bob");
    assert_eq!(forked.parent_project_id.as_deref(), Some(project.id.as_str()));

    // History is severed: the fork has one root commit with no parent.
    let head = engine.get_head_state(&forked_id, "main").unwrap();
    let root = engine
        .get_commit(&forked_id, head.commit_id.as_deref().unwrap())
        .unwrap();
    assert!(root.parent_hash.is_none());
    assert_eq!(root.asset_snapshot, json!({"a": "x"}));
}

#[test]
fn test_graph_percent_conservation() {
    let engine = engine();
    let project = engine.create_project("owner", "p", None, &[], true).unwrap();
    engine
        .create_commit(&project.id, "owner", "m1", &json!({"a": 1}), "main", None)
        .unwrap();
    engine
        .create_branch(&project.id, "alice", "dev", None)
        .unwrap();
    engine
        .create_commit(&project.id, "alice", "m2", &json!({"b": 1, "c": 2}), "dev", None)
        .unwrap();
    engine
        .create_commit(&project.id, "bob", "m3", &json!({}), "dev", None)
        .unwrap();

    let graph = engine.get_project_graph(&project.id).unwrap();
    // Branches are disjoint here, so branch percentages sum to ~100.
    let sum: f64 = graph.branches.iter().map(|b| b.project_percent).sum();
    assert!((sum - 100.0).abs() < 0.2, "sum was {sum}");

    for branch in &graph.branches {
        let contributor_sum: f64 = branch.contributors.iter().map(|c| c.percent).sum();
        if !branch.commits.is_empty() {
            assert!((contributor_sum - 100.0).abs() < 0.2);
        }
    }
}

#[test]
fn test_graph_cache_invalidation_on_commit() {
    let engine = engine_with_cache(Arc::new(MemoryCache::new()));
    let project = engine.create_project("owner", "p", None, &[], true).unwrap();
    engine
        .create_commit(&project.id, "owner", "m1", &json!({}), "main", None)
        .unwrap();

    let first = engine.get_project_graph(&project.id).unwrap();
    assert_eq!(first.branches[0].commits.len(), 1);

    // Creating a commit invalidates the cached view.
    engine
        .create_commit(&project.id, "owner", "m2", &json!({}), "main", None)
        .unwrap();
    let second = engine.get_project_graph(&project.id).unwrap();
    assert_eq!(second.branches[0].commits.len(), 2);
}

#[test]
fn test_workspace_lock_boundary_progression() {
    let engine = engine();
    let project = engine.create_project("owner", "p", None, &[], true).unwrap();

    let doc = |boundary: i64, n0_summary: &str, n2_summary: &str| {
        json!({"editorState": {
            "beats": {},
            "storyWorkflow": {
                "branchPolicy": {"lockBoundaryOrder": boundary},
                "nodes": [
                    {"id": "n0", "order": 0, "locked": true, "beatIds": [], "summary": n0_summary},
                    {"id": "n1", "order": 1, "locked": true, "beatIds": [], "summary": "one"},
                    {"id": "n2", "order": 2, "locked": false, "beatIds": [], "summary": n2_summary},
                ],
            },
        }})
    };

    engine
        .put_workspace(&project.id, "main", "owner", &doc(2, "zero", "two"))
        .unwrap();

    // Boundary regression.
    assert!(engine
        .put_workspace(&project.id, "main", "owner", &doc(1, "zero", "two"))
        .is_err());
    // Locked node mutation.
    assert!(engine
        .put_workspace(&project.id, "main", "owner", &doc(2, "edited", "two"))
        .is_err());
    // Boundary advance over an identical prefix, editing only node 2.
    engine
        .put_workspace(&project.id, "main", "owner", &doc(3, "zero", "rewritten"))
        .unwrap();
}

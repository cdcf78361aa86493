//! Branch workspace documents and the boundary lock enforcer.
//!
//! Each branch carries a mutable `workspace_data` document: arbitrary editor
//! state, not content-addressed. The sections the engine interprets are
//! typed here; everything else round-trips untouched through the flattened
//! `extra` maps, so the engine never destroys editor state it does not model.
//!
//! A branch may declare a lock boundary inside the document
//! (`editorState.storyWorkflow.branchPolicy.lockBoundaryOrder`). Once set,
//! story nodes ordered below the boundary, and the beats they reference, are
//! frozen: every workspace write is validated against the previous document
//! before anything is persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::canonically_equal;
use crate::errors::WorkspaceError;

// ---------------------------------------------------------------------------
// Typed document sections
// ---------------------------------------------------------------------------

/// Root of a branch workspace document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceDoc {
    #[serde(rename = "editorState", skip_serializing_if = "Option::is_none")]
    pub editor_state: Option<EditorState>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The editor-state section holding beats and the story workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorState {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub beats: Map<String, Value>,

    #[serde(rename = "storyWorkflow", skip_serializing_if = "Option::is_none")]
    pub story_workflow: Option<StoryWorkflow>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ordered story nodes plus the branch policy that may declare a boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryWorkflow {
    #[serde(rename = "branchPolicy", skip_serializing_if = "Option::is_none")]
    pub branch_policy: Option<BranchPolicy>,

    #[serde(default)]
    pub nodes: Vec<StoryNode>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-branch workflow policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchPolicy {
    #[serde(rename = "lockBoundaryOrder", skip_serializing_if = "Option::is_none")]
    pub lock_boundary_order: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single story node.
///
/// `locked` is runtime-derived display state, not semantic content; the
/// enforcer strips it before comparing node content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryNode {
    pub id: String,

    #[serde(default)]
    pub order: i64,

    #[serde(default)]
    pub locked: bool,

    #[serde(rename = "beatIds", default)]
    pub beat_ids: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkspaceDoc {
    /// Parse a raw workspace JSON value.
    pub fn from_value(value: &Value) -> Result<Self, WorkspaceError> {
        serde_json::from_value(value.clone())
            .map_err(|e| WorkspaceError::InvalidDocument(e.to_string()))
    }

    /// The declared lock boundary, if any.
    pub fn lock_boundary(&self) -> Option<i64> {
        self.editor_state
            .as_ref()?
            .story_workflow
            .as_ref()?
            .branch_policy
            .as_ref()?
            .lock_boundary_order
    }

    fn workflow(&self) -> Option<&StoryWorkflow> {
        self.editor_state.as_ref()?.story_workflow.as_ref()
    }

    fn beat(&self, beat_id: &str) -> Option<&Value> {
        self.editor_state.as_ref()?.beats.get(beat_id)
    }
}

// ---------------------------------------------------------------------------
// Boundary lock enforcement
// ---------------------------------------------------------------------------

/// Validate a workspace write against the previously stored document.
///
/// Rules:
/// - no boundary previously configured: any write is accepted (opt-in);
/// - the next document must declare a boundary `>=` the previous one;
/// - nodes ordered below the previous boundary must be present and
///   unchanged, compared after stripping the `locked` flag;
/// - beats referenced by those nodes must be unchanged.
///
/// Comparison uses canonical (sorted-key) serialization, so equality is
/// independent of key order. Callers must reject the write before
/// persisting anything if this returns an error.
pub fn enforce_boundary_lock(prev: &Value, next: &Value) -> Result<(), WorkspaceError> {
    let prev_doc = WorkspaceDoc::from_value(prev)?;
    let boundary = match prev_doc.lock_boundary() {
        Some(b) => b,
        None => return Ok(()),
    };

    let next_doc = WorkspaceDoc::from_value(next)?;
    let next_workflow = next_doc.workflow().ok_or(WorkspaceError::MissingWorkflow)?;

    let next_boundary = next_workflow
        .branch_policy
        .as_ref()
        .and_then(|p| p.lock_boundary_order)
        .unwrap_or(-1);
    if next_boundary < boundary {
        return Err(WorkspaceError::LockBoundaryRegression {
            previous: boundary,
            next: next_boundary,
        });
    }

    let prev_workflow = match prev_doc.workflow() {
        Some(w) => w,
        // Boundary declared but no nodes recorded: nothing is frozen yet.
        None => return Ok(()),
    };

    for prev_node in prev_workflow.nodes.iter().filter(|n| n.order < boundary) {
        let next_node = next_workflow
            .nodes
            .iter()
            .find(|n| n.id == prev_node.id)
            .ok_or_else(|| WorkspaceError::LockedNodeMutated {
                node_id: prev_node.id.clone(),
                boundary,
            })?;

        if !canonically_equal(&node_content(prev_node), &node_content(next_node)) {
            return Err(WorkspaceError::LockedNodeMutated {
                node_id: prev_node.id.clone(),
                boundary,
            });
        }

        for beat_id in &prev_node.beat_ids {
            let prev_beat = prev_doc.beat(beat_id);
            let next_beat = next_doc.beat(beat_id);
            let unchanged = match (prev_beat, next_beat) {
                (Some(a), Some(b)) => canonically_equal(a, b),
                (None, None) => true,
                _ => false,
            };
            if !unchanged {
                return Err(WorkspaceError::LockedBeatMutated {
                    beat_id: beat_id.clone(),
                });
            }
        }
    }

    Ok(())
}

/// A node's semantic content: its full serialization minus the `locked` flag.
fn node_content(node: &StoryNode) -> Value {
    let mut value = serde_json::to_value(node).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.remove("locked");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workspace(
        boundary: Option<i64>,
        locked_summary: &str,
        open_summary: &str,
        locked_narration: &str,
        include_workflow: bool,
    ) -> Value {
        let mut editor_state = json!({
            "beats": {
                "beat_locked": {"id": "beat_locked", "narration": locked_narration},
                "beat_open": {"id": "beat_open", "narration": "open narration"},
            }
        });
        if include_workflow {
            editor_state["storyWorkflow"] = json!({
                "branchPolicy": {
                    "branchName": "fork/demo",
                    "lockBoundaryOrder": boundary,
                },
                "nodes": [
                    {
                        "id": "node_locked",
                        "order": 0,
                        "locked": true,
                        "beatIds": ["beat_locked"],
                        "step2": {"summary": locked_summary},
                    },
                    {
                        "id": "node_open",
                        "order": 1,
                        "locked": false,
                        "beatIds": ["beat_open"],
                        "step2": {"summary": open_summary},
                    },
                ],
            });
        }
        json!({"editorState": editor_state})
    }

    fn base(boundary: Option<i64>) -> Value {
        workspace(boundary, "locked-summary", "open-summary", "locked narration", true)
    }

    #[test]
    fn test_allows_any_write_when_no_previous_boundary() {
        let prev = base(None);
        let next = workspace(Some(0), "locked-summary", "changed", "locked narration", true);
        enforce_boundary_lock(&prev, &next).unwrap();
    }

    #[test]
    fn test_rejects_boundary_backward_move() {
        let prev = base(Some(1));
        let next = base(Some(0));
        let err = enforce_boundary_lock(&prev, &next).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::LockBoundaryRegression { previous: 1, next: 0 }
        ));
    }

    #[test]
    fn test_rejects_undeclared_next_boundary() {
        let prev = base(Some(1));
        let next = base(None);
        assert!(matches!(
            enforce_boundary_lock(&prev, &next).unwrap_err(),
            WorkspaceError::LockBoundaryRegression { .. }
        ));
    }

    #[test]
    fn test_rejects_locked_node_change() {
        let prev = base(Some(1));
        let next = workspace(Some(1), "rewritten", "open-summary", "locked narration", true);
        let err = enforce_boundary_lock(&prev, &next).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::LockedNodeMutated { ref node_id, .. } if node_id == "node_locked"
        ));
    }

    #[test]
    fn test_rejects_locked_node_removal() {
        let prev = base(Some(1));
        let mut next = base(Some(1));
        next["editorState"]["storyWorkflow"]["nodes"]
            .as_array_mut()
            .unwrap()
            .remove(0);
        assert!(matches!(
            enforce_boundary_lock(&prev, &next).unwrap_err(),
            WorkspaceError::LockedNodeMutated { .. }
        ));
    }

    #[test]
    fn test_rejects_locked_beat_change() {
        let prev = base(Some(1));
        let next = workspace(Some(1), "locked-summary", "open-summary", "rewritten narration", true);
        let err = enforce_boundary_lock(&prev, &next).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::LockedBeatMutated { ref beat_id } if beat_id == "beat_locked"
        ));
    }

    #[test]
    fn test_allows_unlocked_node_change() {
        let prev = base(Some(1));
        let next = workspace(Some(1), "locked-summary", "rewritten open node", "locked narration", true);
        enforce_boundary_lock(&prev, &next).unwrap();
    }

    #[test]
    fn test_allows_boundary_advance_over_identical_prefix() {
        // Nodes at orders 0 and 1 sit behind the previous boundary of 2;
        // advancing to 3 while editing only the order-2 node is allowed.
        fn with_tail_node(boundary: i64, tail_summary: &str) -> Value {
            let mut doc = base(Some(boundary));
            doc["editorState"]["storyWorkflow"]["nodes"]
                .as_array_mut()
                .unwrap()
                .push(json!({
                    "id": "node_tail",
                    "order": 2,
                    "locked": false,
                    "beatIds": [],
                    "step2": {"summary": tail_summary},
                }));
            doc
        }

        let prev = with_tail_node(2, "draft");
        let next = with_tail_node(3, "rewritten");
        enforce_boundary_lock(&prev, &next).unwrap();
    }

    #[test]
    fn test_locked_flag_is_ignored_in_comparison() {
        let prev = base(Some(1));
        let mut next = base(Some(1));
        next["editorState"]["storyWorkflow"]["nodes"][0]["locked"] = json!(false);
        enforce_boundary_lock(&prev, &next).unwrap();
    }

    #[test]
    fn test_requires_workflow_when_boundary_exists() {
        let prev = base(Some(1));
        let next = workspace(Some(1), "locked-summary", "open-summary", "locked narration", false);
        assert!(matches!(
            enforce_boundary_lock(&prev, &next).unwrap_err(),
            WorkspaceError::MissingWorkflow
        ));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let prev = base(Some(1));
        let mut next = base(Some(1));
        // Same locked content, different key order inside the node extras.
        next["editorState"]["storyWorkflow"]["nodes"][0]["step2"] = serde_json::from_str(
            r#"{"notes": null, "summary": "locked-summary"}"#,
        )
        .unwrap();
        let mut prev2 = prev.clone();
        prev2["editorState"]["storyWorkflow"]["nodes"][0]["step2"] = serde_json::from_str(
            r#"{"summary": "locked-summary", "notes": null}"#,
        )
        .unwrap();
        enforce_boundary_lock(&prev2, &next).unwrap();
    }
}

//! Argo Workflows executor plugin.
//!
//! Argo calls the plugin with `POST /api/v1/template.execute` whenever a
//! workflow step uses the `gogit-executor-plugin` template. The plugin looks
//! up the full `Workflow`, reports its phase as a commit status on the pull
//! request, optionally upserts a summary comment, and answers with a node
//! result envelope.
//!
//! Only the subset of the Argo resources the plugin reads is modelled here.

pub mod comment;
pub mod executor;
pub mod kube;
pub mod outputs;
pub mod server;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use executor::{ClientFactory, Executor, PluginOptions};
pub use kube::{KubeWorkflowSource, WorkflowSource};
pub use server::{AppState, build_router, start_server};

pub const PHASE_SUCCEEDED: &str = "Succeeded";
pub const PHASE_FAILED: &str = "Failed";

/// Request body of `template.execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteTemplateArgs {
    pub workflow: WorkflowRef,
    pub template: PluginTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRef {
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginTemplate {
    #[serde(default)]
    pub name: String,
    pub plugin: PluginSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginSpec {
    #[serde(rename = "gogit-executor-plugin")]
    pub gogit: PluginArgs,
}

/// Per-step settings from the workflow template; every field overrides the server default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginArgs {
    pub provider: Option<String>,
    pub server: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub target: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pr: Option<String>,
    pub status: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub create_comment: Option<bool>,
    pub comment_template: Option<String>,
    pub comment_identity: Option<String>,
}

/// Workflow parameters arrive as strings, but hand-written templates often use bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Response body of `template.execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteTemplateReply {
    pub node: NodeResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResult {
    pub phase: String,
    pub message: String,
}

impl ExecuteTemplateReply {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            node: NodeResult {
                phase: PHASE_SUCCEEDED.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            node: NodeResult {
                phase: PHASE_FAILED.to_string(),
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkflowSpec,
    #[serde(default)]
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub workflow_template_ref: Option<WorkflowTemplateRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplateRef {
    pub name: String,
    #[serde(default)]
    pub cluster_scope: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Keyed by node ID; the root node's ID is the workflow name.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub phase: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outputs: Option<Outputs>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub path: String,
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn template_ref(&self) -> Option<&WorkflowTemplateRef> {
        self.spec.workflow_template_ref.as_ref()
    }

    /// Phase of the whole run: the root node's phase, or the recorded workflow phase
    /// when the root node is missing.
    pub fn phase(&self) -> &str {
        match self.status.nodes.get(self.name()) {
            Some(root) if !root.phase.is_empty() => &root.phase,
            _ => &self.status.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXECUTE_BODY: &str = r#"{
        "workflow": {"metadata": {"name": "build-x7k2p", "namespace": "ci"}},
        "template": {
            "name": "status",
            "plugin": {"gogit-executor-plugin": {
                "owner": "linuxsuren", "repo": "gogit", "pr": "45",
                "createComment": true, "commentIdentity": "<!-- ci -->"
            }}
        }
    }"#;

    #[test]
    fn test_execute_args_decode() {
        let args: ExecuteTemplateArgs = serde_json::from_str(EXECUTE_BODY).unwrap();
        assert_eq!(args.workflow.metadata.name, "build-x7k2p");
        assert_eq!(args.workflow.metadata.namespace, "ci");
        let plugin = &args.template.plugin.gogit;
        assert_eq!(plugin.owner.as_deref(), Some("linuxsuren"));
        assert_eq!(plugin.pr.as_deref(), Some("45"));
        assert_eq!(plugin.create_comment, Some(true));
        assert_eq!(plugin.comment_identity.as_deref(), Some("<!-- ci -->"));
        assert!(plugin.status.is_none());
    }

    #[test]
    fn test_numeric_pr_accepted() {
        let args: PluginArgs = serde_json::from_str(r#"{"pr": 12}"#).unwrap();
        assert_eq!(args.pr.as_deref(), Some("12"));
        let args: PluginArgs = serde_json::from_str(r#"{"pr": null}"#).unwrap();
        assert!(args.pr.is_none());
    }

    #[test]
    fn test_missing_plugin_key_rejected() {
        let body = r#"{"workflow": {"metadata": {"name": "w"}}, "template": {"plugin": {"other": {}}}}"#;
        assert!(serde_json::from_str::<ExecuteTemplateArgs>(body).is_err());
    }

    #[test]
    fn test_reply_shape() {
        let reply = ExecuteTemplateReply::failed("boom");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json, serde_json::json!({"node": {"phase": "Failed", "message": "boom"}}));
    }

    #[test]
    fn test_workflow_decode_and_phase() {
        let wf: Workflow = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "build-x7k2p", "namespace": "ci"},
            "spec": {"workflowTemplateRef": {"name": "build", "clusterScope": true}},
            "status": {
                "phase": "Running",
                "startedAt": "2023-01-06T07:49:07Z",
                "finishedAt": null,
                "nodes": {
                    "build-x7k2p": {"id": "build-x7k2p", "name": "build-x7k2p", "phase": "Succeeded"},
                    "build-x7k2p-1": {
                        "id": "build-x7k2p-1", "name": "build-x7k2p.test", "displayName": "test",
                        "phase": "Succeeded",
                        "outputs": {"parameters": [{"name": "report", "value": "ok"}]}
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(wf.phase(), "Succeeded");
        let tref = wf.template_ref().unwrap();
        assert_eq!(tref.name, "build");
        assert!(tref.cluster_scope);
        assert!(wf.status.started_at.is_some());
        assert!(wf.status.finished_at.is_none());
        let node = &wf.status.nodes["build-x7k2p-1"];
        assert_eq!(node.display_name, "test");
        assert_eq!(node.outputs.as_ref().unwrap().parameters[0].value.as_deref(), Some("ok"));
    }

    #[test]
    fn test_phase_falls_back_without_root_node() {
        let mut wf = Workflow::default();
        wf.metadata.name = "w".into();
        wf.status.phase = "Failed".into();
        assert_eq!(wf.phase(), "Failed");
    }
}

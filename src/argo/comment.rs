//! Pull request comment summarising a finished workflow.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::Workflow;
use super::outputs::{collect_outputs, render_outputs};
use crate::template::{self, TemplateError, Vars, elapsed};

pub const DEFAULT_COMMENT_TEMPLATE: &str = "
[{{ workflow.template }}]({{ workflow.template_link }}) is {{ workflow.phase }}. \
It started from {{ workflow.started }}, and took {{ workflow.duration }}. \
Please check log output from [here]({{ workflow.link }}).

| Stage | Status | Duration |
|---|---|---|
{{ workflow.stages }}
";

pub const LINK_ANNOTATION: &str = "workflow.link";
pub const TEMPLATE_LINK_ANNOTATION: &str = "workflow.templatelink";

const DATE_FORMAT: &str = "%m-%d %H:%M";

static RETRY_NODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d*\)").expect("valid retry node regex"));

/// Drop nodes that should not appear as stages: exit handlers, hooks, the root
/// node and retry attempts. Unfinished nodes get `now` as their finish time.
pub fn prune_nodes(wf: &mut Workflow, now: DateTime<Utc>) {
    let root = wf.name().to_string();
    wf.status.nodes.retain(|key, node| {
        *key != root
            && !node.name.ends_with(".onExit")
            && !node.name.contains(".hooks.")
            && !RETRY_NODE.is_match(&node.display_name)
    });
    for node in wf.status.nodes.values_mut() {
        if node.finished_at.is_none() {
            node.finished_at = Some(now);
        }
    }
    if wf.status.finished_at.is_none() {
        wf.status.finished_at = Some(now);
    }
}

/// Argo UI link to the template a workflow was created from.
pub fn template_link(wf: &Workflow, target: &str) -> String {
    match wf.template_ref() {
        Some(tref) => {
            let kind = if tref.cluster_scope {
                "cluster-workflow-templates"
            } else {
                "workflow-templates"
            };
            format!("{}/{}/{}/{}", target, kind, wf.namespace(), tref.name)
        }
        None => String::new(),
    }
}

/// Record the workflow and template links as annotations.
pub fn annotate_links(wf: &mut Workflow, workflow_link: &str, target: &str) {
    let template_link = template_link(wf, target);
    let annotations = &mut wf.metadata.annotations;
    annotations.insert(LINK_ANNOTATION.to_string(), workflow_link.to_string());
    annotations.insert(TEMPLATE_LINK_ANNOTATION.to_string(), template_link);
}

fn stage_rows(wf: &Workflow) -> String {
    let mut nodes: Vec<_> = wf.status.nodes.values().collect();
    nodes.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.name.cmp(&b.name)));
    nodes
        .iter()
        .map(|node| {
            let duration = match node.started_at {
                Some(start) => elapsed(start, node.finished_at),
                None => "0s".to_string(),
            };
            format!("| {} | {} | {} |", node.display_name, node.phase, duration)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn workflow_vars(wf: &Workflow) -> Vars {
    let annotation = |key: &str| wf.metadata.annotations.get(key).cloned().unwrap_or_default();
    let (started, duration) = match wf.status.started_at {
        Some(start) => (
            start.format(DATE_FORMAT).to_string(),
            elapsed(start, wf.status.finished_at),
        ),
        None => (String::new(), "0s".to_string()),
    };

    let mut vars = Vars::new();
    vars.insert("workflow.name".into(), wf.name().to_string());
    vars.insert(
        "workflow.template".into(),
        wf.template_ref().map(|t| t.name.clone()).unwrap_or_default(),
    );
    vars.insert("workflow.phase".into(), wf.phase().to_string());
    vars.insert("workflow.started".into(), started);
    vars.insert("workflow.duration".into(), duration);
    vars.insert("workflow.link".into(), annotation(LINK_ANNOTATION));
    vars.insert("workflow.template_link".into(), annotation(TEMPLATE_LINK_ANNOTATION));
    vars.insert("workflow.stages".into(), stage_rows(wf));
    vars
}

/// Render the comment body for a pruned, annotated workflow, followed by its outputs table.
pub fn render_comment(
    wf: &Workflow,
    template_text: &str,
    target: &str,
) -> Result<String, TemplateError> {
    let mut message = template::render(template_text, &workflow_vars(wf))?;
    let outputs = collect_outputs(wf, target);
    if !outputs.is_empty() {
        message.push('\n');
        message.push_str(&render_outputs(&outputs));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argo::{NodeStatus, Outputs, Parameter, WorkflowTemplateRef};
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 6, h, m, s).unwrap()
    }

    fn node(
        name: &str,
        display: &str,
        phase: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> NodeStatus {
        NodeStatus {
            id: name.into(),
            name: name.into(),
            display_name: display.into(),
            phase: phase.into(),
            started_at: start,
            finished_at: end,
            outputs: None,
        }
    }

    fn workflow() -> Workflow {
        let mut wf = Workflow::default();
        wf.metadata.name = "build-x7k2p".into();
        wf.metadata.namespace = "ci".into();
        wf.spec.workflow_template_ref = Some(WorkflowTemplateRef {
            name: "build".into(),
            cluster_scope: false,
        });
        wf.status.phase = "Running".into();
        wf.status.started_at = Some(at(7, 49, 7));
        let nodes = [
            node("build-x7k2p", "build-x7k2p", "Succeeded", Some(at(7, 49, 7)), None),
            node("build-x7k2p.test", "test", "Succeeded", Some(at(7, 49, 10)), Some(at(7, 49, 13))),
            node(
                "build-x7k2p.image",
                "image",
                "Succeeded",
                Some(at(7, 49, 14)),
                Some(at(7, 54, 26)),
            ),
            node(
                "build-x7k2p.test(1)",
                "test(1)",
                "Failed",
                Some(at(7, 49, 8)),
                Some(at(7, 49, 9)),
            ),
            node("build-x7k2p.onExit", "build-x7k2p.onExit", "Succeeded", None, None),
            node("build-x7k2p.hooks.running", "hook", "Succeeded", None, None),
            node("build-x7k2p.deploy", "deploy", "Running", Some(at(7, 54, 27)), None),
        ];
        for n in nodes {
            wf.status.nodes.insert(n.name.clone(), n);
        }
        wf
    }

    #[test]
    fn test_prune_nodes() {
        let mut wf = workflow();
        let now = at(8, 0, 0);
        prune_nodes(&mut wf, now);

        let names: Vec<_> = wf.status.nodes.keys().cloned().collect();
        assert_eq!(names, vec!["build-x7k2p.deploy", "build-x7k2p.image", "build-x7k2p.test"]);
        assert_eq!(wf.status.nodes["build-x7k2p.deploy"].finished_at, Some(now));
        assert_eq!(wf.status.nodes["build-x7k2p.test"].finished_at, Some(at(7, 49, 13)));
        assert_eq!(wf.status.finished_at, Some(now));
    }

    #[test]
    fn test_template_link_scopes() {
        let mut wf = workflow();
        assert_eq!(template_link(&wf, "https://argo"), "https://argo/workflow-templates/ci/build");
        wf.spec.workflow_template_ref.as_mut().unwrap().cluster_scope = true;
        assert_eq!(
            template_link(&wf, "https://argo"),
            "https://argo/cluster-workflow-templates/ci/build"
        );
        wf.spec.workflow_template_ref = None;
        assert_eq!(template_link(&wf, "https://argo"), "");
    }

    #[test]
    fn test_render_default_comment() {
        let mut wf = workflow();
        // Phase is read before pruning removes the root node.
        wf.status.phase = wf.phase().to_string();
        prune_nodes(&mut wf, at(8, 0, 0));
        annotate_links(&mut wf, "https://argo/workflows/ci/build-x7k2p", "https://argo");

        let text = render_comment(&wf, DEFAULT_COMMENT_TEMPLATE, "https://argo").unwrap();
        assert!(text.contains(
            "[build](https://argo/workflow-templates/ci/build) is Succeeded. It started from 01-06 07:49, and took 10m53s."
        ), "{}", text);
        assert!(text.contains("[here](https://argo/workflows/ci/build-x7k2p)"));
        let rows = "| test | Succeeded | 3s |\n| image | Succeeded | 5m12s |\n| deploy | Running | 5m33s |";
        assert!(text.contains(rows), "{}", text);
        assert!(!text.contains("test(1)"));
        assert!(!text.contains("Please feel free"));
    }

    #[test]
    fn test_render_comment_appends_outputs() {
        let mut wf = workflow();
        wf.status.nodes.get_mut("build-x7k2p.test").unwrap().outputs = Some(Outputs {
            parameters: vec![Parameter {
                name: "coverage".into(),
                value: Some("87%".into()),
            }],
            artifacts: vec![],
        });
        prune_nodes(&mut wf, at(8, 0, 0));
        let text = render_comment(&wf, "done", "https://argo").unwrap();
        assert!(text.starts_with("done\n\nPlease feel free"), "{}", text);
        assert!(text.contains("| build-x7k2p.test-coverage: 87% |"));
    }

    #[test]
    fn test_render_comment_bad_template() {
        let wf = workflow();
        let err = render_comment(&wf, "{{ workflow.nope }}", "").unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("workflow.nope".into()));
    }
}

//! Step outputs listed under the workflow summary comment.

use std::collections::BTreeMap;

use super::Workflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// An artifact file, linked through the Argo UI.
    File,
    /// A short parameter value shown inline.
    Value,
    /// A parameter whose value is markdown, appended verbatim.
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputObject {
    pub kind: OutputKind,
    pub file_name: String,
    pub file: String,
    pub value: String,
}

/// Collect node outputs keyed by `<node name>-<output name>`.
///
/// Artifacts with a path become file links under `<target>/artifact-files/...`;
/// non-empty parameters become values, or markdown when the key ends in `.md` / `_md`.
pub fn collect_outputs(wf: &Workflow, target: &str) -> BTreeMap<String, OutputObject> {
    let mut outputs = BTreeMap::new();
    for node in wf.status.nodes.values() {
        let Some(node_outputs) = &node.outputs else {
            continue;
        };

        for artifact in node_outputs.artifacts.iter().filter(|a| !a.path.is_empty()) {
            let key = format!("{}-{}", node.name, artifact.name);
            outputs.insert(
                key,
                OutputObject {
                    kind: OutputKind::File,
                    file_name: artifact.path.clone(),
                    file: format!(
                        "{}/artifact-files/{}/workflows/{}/{}/outputs/{}",
                        target,
                        wf.namespace(),
                        wf.name(),
                        node.id,
                        artifact.name
                    ),
                    value: String::new(),
                },
            );
        }

        for param in &node_outputs.parameters {
            let Some(value) = param.value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let key = format!("{}-{}", node.name, param.name);
            let kind = if key.ends_with(".md") || key.ends_with("_md") {
                OutputKind::Markdown
            } else {
                OutputKind::Value
            };
            outputs.insert(
                key,
                OutputObject {
                    kind,
                    file_name: String::new(),
                    file: String::new(),
                    value: value.to_string(),
                },
            );
        }
    }
    outputs
}

/// Markdown block listing the outputs: a table of files and values, then markdown outputs.
pub fn render_outputs(outputs: &BTreeMap<String, OutputObject>) -> String {
    let mut text = String::from("\nPlease feel free to check the following outputs:\n\n| Output |\n|---|");
    for (name, output) in outputs {
        match output.kind {
            OutputKind::File => {
                text.push_str(&format!("\n| [{}]({}) |", output.file_name, output.file))
            }
            OutputKind::Value => text.push_str(&format!("\n| {}: {} |", name, output.value)),
            OutputKind::Markdown => {}
        }
    }
    for output in outputs.values().filter(|o| o.kind == OutputKind::Markdown) {
        text.push('\n');
        text.push_str(&output.value);
    }
    text.push('\n');
    text
}

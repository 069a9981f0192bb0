use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::allocator::Instance;
use crate::prompt::SessionKind;

pub(crate) const HOOK_EVENT_NAME: &str = "UserPromptSubmit";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct HookOutput<'a> {
    #[serde(rename = "hookSpecificOutput")]
    hook_specific_output: HookSpecificOutput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HookSpecificOutput<'a> {
    hook_event_name: &'a str,
    additional_context: &'a str,
}

/// Builds the advisory shown to the assistant once an instance directory is
/// ready. `storage_dir` is the base directory as configured, relative to the
/// project root.
pub(crate) fn render_advisory(
    kind: SessionKind,
    instance: &Instance,
    storage_dir: &str,
    problem: &str,
) -> String {
    let name = &instance.name;
    let reports = format!("{}/{}/", storage_dir.trim_end_matches('/'), name);
    let mut message = match kind {
        SessionKind::Analyze => format!(
            "Directory {name} has been automatically created for this analysis session. \
The investigator, code-flow-mapper, and planner agents will create their reports \
(INVESTIGATION_REPORT.md, FLOW_REPORT.md, and PLAN.md) inside {reports}."
        ),
        SessionKind::Task => format!(
            "Directory {name} has been prepared for this task session. \
The task-router will analyze the complexity and determine the appropriate workflow. \
If complex analysis is needed, reports will be saved to {reports}."
        ),
        SessionKind::Legacy => format!(
            "Directory {name} has been automatically created for this task session. \
The subagents must create the INVESTIGATION_REPORT.md, FLOW_REPORT.md and PLAN.md files \
inside {reports}."
        ),
    };

    if !problem.is_empty() {
        message.push_str("\n\nProblem to solve: ");
        message.push_str(problem);
    }
    message.push_str("\n\nInstance path: ");
    message.push_str(&instance.path.display().to_string());
    message
}

pub(crate) fn render_output(format: OutputFormat, advisory: &str) -> Result<String, String> {
    match format {
        OutputFormat::Text => Ok(advisory.to_string()),
        OutputFormat::Json => {
            let output = HookOutput {
                hook_specific_output: HookSpecificOutput {
                    hook_event_name: HOOK_EVENT_NAME,
                    additional_context: advisory,
                },
            };
            serde_json::to_string(&output)
                .map_err(|err| format!("failed to serialize hook output: {err}"))
        }
    }
}

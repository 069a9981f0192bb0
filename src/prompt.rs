use std::fmt;

/// Session-opening slash commands recognised at the start of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Task,
    Analyze,
    /// `/task_medium`, kept for older command sets.
    Legacy,
}

// `/task_medium` must be tried before its `/task` prefix.
const MATCH_ORDER: [SessionKind; 3] = [
    SessionKind::Analyze,
    SessionKind::Legacy,
    SessionKind::Task,
];

impl SessionKind {
    pub(crate) fn command(self) -> &'static str {
        match self {
            Self::Task => "/task",
            Self::Analyze => "/analyze",
            Self::Legacy => "/task_medium",
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Analyze => "analyze",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the session kind when the prompt opens with a command that needs
/// an instance directory, `None` otherwise.
pub(crate) fn classify_prompt(prompt: &str) -> Option<SessionKind> {
    let trimmed = prompt.trim();
    MATCH_ORDER
        .into_iter()
        .find(|kind| trimmed.starts_with(kind.command()))
}

pub(crate) fn extract_problem_description(prompt: &str, kind: SessionKind) -> String {
    prompt.replacen(kind.command(), "", 1).trim().to_string()
}

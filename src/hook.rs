use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::advisory::{render_advisory, render_output};
use crate::allocator::Allocator;
use crate::config::Config;
use crate::logger::Logger;
use crate::prompt::{classify_prompt, extract_problem_description};

/// Payload the assistant writes to the hook's stdin. Only `prompt` and `cwd`
/// drive behaviour; the rest is logged when present.
#[derive(Debug, Deserialize)]
pub(crate) struct HookInput {
    #[serde(default)]
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) cwd: Option<String>,
    #[serde(default)]
    pub(crate) session_id: Option<String>,
    #[serde(default)]
    pub(crate) hook_event_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HookOutcome {
    /// Nothing to say; the prompt goes through untouched.
    Silent,
    Advisory(String),
    Warning(String),
}

pub(crate) fn parse_hook_input(raw: &str) -> Option<HookInput> {
    serde_json::from_str(raw).ok()
}

pub(crate) fn handle_hook(
    raw_input: &str,
    config: &Config,
    logger: &Logger,
    default_cwd: &Path,
) -> HookOutcome {
    let Some(input) = parse_hook_input(raw_input) else {
        logger.log_event("skip", &[("reason", "invalid_input")]);
        return HookOutcome::Silent;
    };
    logger.log_event(
        "hook_start",
        &[
            ("event", input.hook_event_name.as_deref().unwrap_or("unknown")),
            ("session", input.session_id.as_deref().unwrap_or("unknown")),
        ],
    );

    let Some(kind) = classify_prompt(&input.prompt) else {
        logger.log_event("skip", &[("reason", "no_session_command")]);
        return HookOutcome::Silent;
    };
    logger.log_event("classify", &[("kind", kind.as_str())]);

    let cwd = input
        .cwd
        .as_deref()
        .filter(|cwd| !cwd.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default_cwd.to_path_buf());

    let allocator = match Allocator::new(
        &config.instance_prefix,
        config.strategy,
        config.max_attempts,
    ) {
        Ok(allocator) => allocator,
        Err(message) => {
            logger.log_event("allocate_failed", &[("reason", message.as_str())]);
            return HookOutcome::Warning(message);
        }
    };

    let instance = match allocator.prepare(&cwd, Path::new(&config.storage_dir)) {
        Ok(instance) => instance,
        Err(err) => {
            let message = err.to_string();
            logger.log_event("allocate_failed", &[("reason", message.as_str())]);
            return HookOutcome::Warning(message);
        }
    };
    let id = instance.id.to_string();
    let path = instance.path.display().to_string();
    logger.log_event(
        "allocate",
        &[
            ("id", id.as_str()),
            ("path", path.as_str()),
            ("created", if instance.created { "true" } else { "false" }),
            ("strategy", config.strategy.as_str()),
        ],
    );

    let problem = extract_problem_description(&input.prompt, kind);
    let advisory = render_advisory(kind, &instance, &config.storage_dir, &problem);
    match render_output(config.format, &advisory) {
        Ok(output) => HookOutcome::Advisory(output),
        Err(message) => HookOutcome::Warning(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::OutputFormat;
    use crate::allocator::Strategy;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn payload(prompt: &str, cwd: &Path) -> String {
        json!({
            "session_id": "abc",
            "hook_event_name": "UserPromptSubmit",
            "prompt": prompt,
            "cwd": cwd.display().to_string(),
        })
        .to_string()
    }

    #[test]
    fn malformed_input_is_silent() {
        let temp = TempDir::new().expect("temp dir");
        let logger = Logger::new(None);
        for raw in ["", "not json", "[1, 2]", "{\"prompt\": 7}"] {
            assert_eq!(
                handle_hook(raw, &Config::default(), &logger, temp.path()),
                HookOutcome::Silent,
                "input {raw:?}"
            );
        }
        assert!(!temp.path().join("claude-code-storage").exists());
    }

    #[test]
    fn unrelated_prompt_is_silent() {
        let temp = TempDir::new().expect("temp dir");
        let outcome = handle_hook(
            &payload("hello there", temp.path()),
            &Config::default(),
            &Logger::new(None),
            temp.path(),
        );
        assert_eq!(outcome, HookOutcome::Silent);
        assert!(!temp.path().join("claude-code-storage").exists());
    }

    #[test]
    fn missing_prompt_field_is_silent() {
        let temp = TempDir::new().expect("temp dir");
        let outcome = handle_hook(
            "{\"cwd\": \"/nowhere\"}",
            &Config::default(),
            &Logger::new(None),
            temp.path(),
        );
        assert_eq!(outcome, HookOutcome::Silent);
    }

    #[test]
    fn task_prompt_allocates_and_describes() {
        let temp = TempDir::new().expect("temp dir");
        let outcome = handle_hook(
            &payload("/task fix bug 123", temp.path()),
            &Config::default(),
            &Logger::new(None),
            Path::new("/unused"),
        );
        let HookOutcome::Advisory(message) = outcome else {
            panic!("expected advisory, got {outcome:?}");
        };
        let instance_dir = temp
            .path()
            .join("claude-code-storage")
            .join("claude-instance-1");
        assert!(instance_dir.is_dir());
        assert!(message.contains("Problem to solve: fix bug 123"));
        assert!(message.contains(&format!("Instance path: {}", instance_dir.display())));
    }

    #[test]
    fn missing_cwd_falls_back_to_default() {
        let temp = TempDir::new().expect("temp dir");
        let raw = json!({ "prompt": "/analyze" }).to_string();
        let outcome = handle_hook(&raw, &Config::default(), &Logger::new(None), temp.path());
        assert!(matches!(outcome, HookOutcome::Advisory(_)), "got {outcome:?}");
        assert!(temp
            .path()
            .join("claude-code-storage")
            .join("claude-instance-1")
            .is_dir());
    }

    #[test]
    fn allocation_failure_becomes_warning() {
        let temp = TempDir::new().expect("temp dir");
        let storage = temp.path().join("claude-code-storage");
        fs::create_dir(&storage).expect("create storage");
        fs::write(storage.join("claude-instance-1"), "file").expect("write file");

        let outcome = handle_hook(
            &payload("/task anything", temp.path()),
            &Config::default(),
            &Logger::new(None),
            temp.path(),
        );
        let HookOutcome::Warning(message) = outcome else {
            panic!("expected warning, got {outcome:?}");
        };
        assert!(message.contains("not a directory"), "got: {message}");
    }

    #[test]
    fn configured_layout_and_json_format_are_used() {
        let temp = TempDir::new().expect("temp dir");
        let config = Config {
            storage_dir: "sessions".to_string(),
            instance_prefix: "run".to_string(),
            strategy: Strategy::Exclusive,
            format: OutputFormat::Json,
            ..Config::default()
        };
        fs::create_dir_all(temp.path().join("sessions").join("run-5")).expect("seed");

        let outcome = handle_hook(
            &payload("/analyze cache misses", temp.path()),
            &config,
            &Logger::new(None),
            temp.path(),
        );
        let HookOutcome::Advisory(output) = outcome else {
            panic!("expected advisory, got {outcome:?}");
        };
        let value: serde_json::Value = serde_json::from_str(&output).expect("json output");
        let context = value["hookSpecificOutput"]["additionalContext"]
            .as_str()
            .expect("additionalContext string");
        assert!(context.contains("Directory run-6"), "got: {context}");
        assert!(context.contains("inside sessions/run-6/."), "got: {context}");
        assert!(temp.path().join("sessions").join("run-6").is_dir());
    }

    #[test]
    fn transitions_are_logged() {
        let temp = TempDir::new().expect("temp dir");
        let log_path = temp.path().join("hook.log");
        let logger = Logger::new(Some(log_path.clone()));

        handle_hook(
            &payload("/task log me", temp.path()),
            &Config::default(),
            &logger,
            temp.path(),
        );
        let log = fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("hook_start event=UserPromptSubmit session=abc"));
        assert!(log.contains("classify kind=task"));
        assert!(log.contains("allocate id=1 "));
        assert!(log.contains("created=true strategy=best_effort"));
    }
}

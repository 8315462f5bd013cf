use crate::models::EngineAction;
use regex::Regex;
use std::sync::LazyLock;

static INIT_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:OpenTofu|Terraform) has been successfully initialized!.*$")
        .expect("init summary pattern is valid")
});

static PLAN_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:Plan: \d+ to add, \d+ to change, \d+ to destroy\.|No changes\..*)$")
        .expect("plan summary pattern is valid")
});

static APPLY_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Apply complete! Resources: .*$").expect("apply summary pattern is valid")
});

static DESTROY_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Destroy complete! Resources: .*$").expect("destroy summary pattern is valid")
});

/// Picks the human-readable result line out of the engine's stdout.
pub fn summarize(action: EngineAction, stdout: &str) -> Option<String> {
    let pattern = match action {
        EngineAction::Init => &INIT_SUMMARY,
        EngineAction::Plan => &PLAN_SUMMARY,
        EngineAction::Apply => &APPLY_SUMMARY,
        EngineAction::Destroy => &DESTROY_SUMMARY,
        EngineAction::ShowState => return None,
    };

    if let Some(found) = pattern.find_iter(stdout).last() {
        return Some(found.as_str().trim().to_string());
    }
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

pub fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
    }
}

/// Keeps the last `max_bytes` of `text`; engine errors are printed last.
pub fn truncate_tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[... {} bytes truncated ...]\n{}", start, &text[start..])
}

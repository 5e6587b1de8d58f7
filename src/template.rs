//! Placeholder templates for comment and notification bodies.
//!
//! Templates are plain text with `{{ name }}` placeholders; names may contain
//! letters, digits, `_` and `.`. Rendering fails on an unknown name or an
//! unterminated `{{`, so a typo never reaches a pull request silently.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid placeholder regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{0}'")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Variables available to a template.
pub type Vars = BTreeMap<String, String>;

pub fn render(template: &str, vars: &Vars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        check_unterminated(template, last, whole.start())?;
        out.push_str(&template[last..whole.start()]);
        let name = &caps[1];
        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        out.push_str(value);
        last = whole.end();
    }
    check_unterminated(template, last, template.len())?;
    out.push_str(&template[last..]);
    Ok(out)
}

fn check_unterminated(template: &str, from: usize, to: usize) -> Result<(), TemplateError> {
    match template[from..to].find("{{") {
        Some(offset) => Err(TemplateError::Unterminated(from + offset)),
        None => Ok(()),
    }
}

/// Format a duration the way Go's `time.Duration` prints it (`3s`, `5m19s`, `1h2m3s`, `12ms`).
pub fn format_duration(duration: chrono::Duration) -> String {
    let millis = duration.num_milliseconds();
    if millis == 0 {
        return "0s".to_string();
    }
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    if millis < 1_000 {
        return format!("{}{}ms", sign, millis);
    }

    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let secs = (millis % 60_000) / 1_000;
    let frac = millis % 1_000;

    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if frac == 0 {
        out.push_str(&format!("{}s", secs));
    } else {
        let frac = format!("{:03}", frac);
        out.push_str(&format!("{}.{}s", secs, frac.trim_end_matches('0')));
    }
    out
}

/// Elapsed time between two instants; an unfinished end counts as now.
pub fn elapsed(started: DateTime<Utc>, finished: Option<DateTime<Utc>>) -> String {
    let finished = match finished {
        Some(f) if f >= started => f,
        _ => Utc::now(),
    };
    format_duration(finished - started)
}

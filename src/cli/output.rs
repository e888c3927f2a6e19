//! CLI output formatting utilities.

use crate::agent::ToolCallRecord;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a tool call trace to stderr.
    pub fn tool_call(record: &ToolCallRecord) {
        let mark = if record.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        eprintln!(
            "  {} {}",
            mark,
            style(format!("[{}] {}", record.name, preview(&record.arguments, 120))).dim()
        );
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Render an error with its causes, skipping causes already in the message.
pub fn error_message(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    for cause in error.chain().skip(1) {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    message
}

/// Collapse newlines and truncate with ellipsis.
pub fn preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Mask a secret, keeping a short prefix and suffix.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("a\nb", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_error_message_shows_cause_once() {
        let yaml = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        let cause = yaml.to_string();
        let error = anyhow::Error::from(crate::BqAgentError::from(yaml));

        let message = error_message(&error);
        assert!(message.starts_with("YAML parse error: "));
        assert_eq!(message.matches(cause.as_str()).count(), 1);
    }

    #[test]
    fn test_error_message_keeps_context() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = anyhow::Error::from(crate::BqAgentError::from(io)).context("Loading config");
        assert_eq!(error_message(&error), "Loading config: IO error: no such file");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("sk-abcdefghijklmnop"), "sk-a...mnop");
    }
}

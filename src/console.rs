use crate::backend::BoxError;
use crate::multi::LogWriter;
use crate::record::{value_text, Field, Level, LogRecord};
use async_trait::async_trait;
use colored::{ColoredString, Colorize};

/// Writer that renders records as colored lines on stdout/stderr.
///
/// Error-like levels (error, warn, alert, severe, stack) go to stderr,
/// everything else to stdout. Holds no resources; `close` is a no-op.
#[derive(Clone, Default)]
pub struct ConsoleWriter;

impl ConsoleWriter {
    pub fn new() -> Self {
        ConsoleWriter
    }
}

fn level_paint(level: &str, text: &str) -> ColoredString {
    match level {
        "info" => text.green(),
        "error" => text.red().bold(),
        "alert" | "severe" | "stack" => text.red().bold().on_black(),
        "warn" => text.yellow(),
        "debug" => text.cyan(),
        "slow" => text.magenta(),
        "stat" => text.blue(),
        _ => text.white(),
    }
}

fn is_stderr_level(level: &str) -> bool {
    matches!(level, "error" | "warn" | "alert" | "severe" | "stack")
}

/// One rendered line: colored level tag, dim timestamp, content, then
/// well-known fields and the residual map as cyan `key=value` pairs.
fn render_line(record: &LogRecord) -> String {
    let level = record.level.as_str();
    let mut parts = vec![
        level_paint(level, &format!("[{}]", level.to_uppercase())).to_string(),
        record
            .timestamp
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string()
            .bright_black()
            .to_string(),
        record.content.clone(),
    ];

    let mut push_pair = |key: &str, value: &str| {
        parts.push(format!("{key}={value}").cyan().to_string());
    };
    if let Some(trace) = &record.trace {
        push_pair("trace", trace);
    }
    if let Some(span) = &record.span {
        push_pair("span", span);
    }
    if let Some(duration) = &record.duration {
        push_pair("duration", duration);
    }
    if let Some(log_type) = &record.log_type {
        push_pair("log_type", log_type);
    }
    if let Some(user_id) = record.user_id {
        push_pair("user_id", &user_id.to_string());
    }
    if let Some(fields) = &record.fields {
        for (key, value) in fields {
            push_pair(key, &value_text(value.clone()));
        }
    }

    parts.join(" ")
}

#[async_trait]
impl LogWriter for ConsoleWriter {
    fn log(&self, level: Level, content: String, fields: Vec<Field>) {
        let record = LogRecord::build(level, content, fields);
        let line = render_line(&record);
        if is_stderr_level(record.level.as_str()) {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    async fn close(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::field;

    // Tests run in parallel and the override is process-global, so it is
    // switched off and left off.
    fn plain(record: &LogRecord) -> String {
        colored::control::set_override(false);
        render_line(record)
    }

    #[test]
    fn line_carries_level_content_and_extracted_fields() {
        let record = LogRecord::build(
            Level::Error,
            "payment failed",
            vec![
                field("trace", "t-7"),
                field("user_id", 12),
                field("order", "o-3"),
            ],
        );
        let line = plain(&record);
        assert!(line.starts_with("[ERROR]"));
        assert!(line.contains("payment failed"));
        assert!(line.contains("trace=t-7"));
        assert!(line.contains("user_id=12"));
        assert!(line.contains("order=o-3"));
    }

    #[test]
    fn unset_well_known_fields_are_not_rendered() {
        let record = LogRecord::build(Level::Info, "ok", vec![]);
        let line = plain(&record);
        assert!(!line.contains("trace="));
        assert!(!line.contains("user_id="));
    }

    #[test]
    fn error_like_levels_route_to_stderr() {
        for level in ["error", "warn", "alert", "severe", "stack"] {
            assert!(is_stderr_level(level), "{level} should target stderr");
        }
        for level in ["info", "debug", "slow", "stat"] {
            assert!(!is_stderr_level(level), "{level} should target stdout");
        }
    }

    #[test]
    fn escalated_levels_carry_a_black_background() {
        use colored::Color;
        for level in ["alert", "severe", "stack"] {
            let painted = level_paint(level, "x");
            assert_eq!(painted.fgcolor(), Some(Color::Red), "{level}");
            assert_eq!(painted.bgcolor(), Some(Color::Black), "{level}");
        }
        // Plain error stays red on the default background.
        assert_eq!(level_paint("error", "x").bgcolor(), None);
    }

    #[test]
    fn custom_level_renders_uppercased() {
        let record = LogRecord::build(Level::Custom("slow".into()), "m", vec![]);
        assert!(plain(&record).starts_with("[SLOW]"));
    }
}

//! Display sink — the narrow interface between the core and the console.
//!
//! The engine and chat loop render through this trait so they carry no
//! dependency on a specific terminal library. The real implementation lives
//! in the CLI crate; tests use [`NullSink`] or a capturing sink.

/// Where operator-facing output goes.
pub trait DisplaySink: Send + Sync {
    /// Write a streamed fragment without a trailing newline; flush it
    /// immediately so tokens appear as they arrive.
    fn fragment(&self, text: &str);

    /// Write a full line.
    fn line(&self, text: &str);

    /// Write a bordered panel with a header (plans, tool calls, results).
    fn panel(&self, header: &str, body: &str);

    /// Write de-emphasized diagnostic text (guidance previews, truncated
    /// plan results).
    fn dim(&self, text: &str);
}

/// A sink that swallows everything. Useful in tests and non-interactive runs.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn fragment(&self, _text: &str) {}
    fn line(&self, _text: &str) {}
    fn panel(&self, _header: &str, _body: &str) {}
    fn dim(&self, _text: &str) {}
}

/// Truncate a string for display, marking the cut.
pub fn truncate_for_display(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max_chars).collect();
        format!("{cut}... (cut off due to length)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_string_unchanged() {
        assert_eq!(truncate_for_display("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string_marks_cut() {
        let out = truncate_for_display(&"x".repeat(300), 250);
        assert!(out.starts_with(&"x".repeat(250)));
        assert!(out.ends_with("(cut off due to length)"));
    }

    #[test]
    fn null_sink_is_silent() {
        let sink = NullSink;
        sink.fragment("a");
        sink.line("b");
        sink.panel("h", "c");
        sink.dim("d");
    }
}

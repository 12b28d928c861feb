//! The generated entry point around a snippet, and translation of error
//! positions back into the snippet.

use std::sync::Arc;

use sluice_script::{Frame, ScriptError};

/// Line that precedes the snippet in the generated source.
pub const USER_CODE_MARKER: &str = "// <user-code>";

/// Name of the function the snippet body runs in.
const ENTRY_FUNCTION: &str = "main";

/// Frame name reported for the snippet body.
const SNIPPET_FRAME: &str = "<snippet>";

/// A snippet wrapped in an async entry function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedSource {
    source: String,
    /// 1-based line of [`USER_CODE_MARKER`]
    marker_line: usize,
    snippet_lines: usize,
}

impl WrappedSource {
    /// Wrap `code`, listing `bindings` in the header comment.
    pub fn new(code: &str, bindings: &[String]) -> Self {
        let mut source = String::from("// Generated entry point.\n");
        source.push_str(&format!("// Bound functions: {}\n", bindings.join(", ")));
        source.push_str(&format!("async function {ENTRY_FUNCTION}() {{\n"));
        let marker_line = source.lines().count() + 1;
        source.push_str(USER_CODE_MARKER);
        source.push('\n');
        source.push_str(code);
        source.push_str(&format!("\n}}\nawait {ENTRY_FUNCTION}();\n"));

        Self {
            source,
            marker_line,
            snippet_lines: code.lines().count().max(1),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn marker_line(&self) -> usize {
        self.marker_line
    }

    /// Render `error` in snippet coordinates.
    ///
    /// The first line is the error headline with the snippet line of the
    /// innermost frame, followed by one `at` line per snippet frame. Frames
    /// from the first one outside the snippet onwards are dropped.
    pub fn translate(&self, error: &ScriptError) -> String {
        let frames: Vec<Frame> = if error.frames().is_empty() {
            error
                .span()
                .map(|span| {
                    vec![Frame {
                        function: Arc::from(SNIPPET_FRAME),
                        span,
                    }]
                })
                .unwrap_or_default()
        } else {
            error.frames().to_vec()
        };

        let mut located = Vec::new();
        for frame in frames {
            let (line, col) = frame.span.line_col(&self.source);
            let Some(user_line) = self.user_line(line) else {
                break;
            };
            let function = if &*frame.function == ENTRY_FUNCTION {
                SNIPPET_FRAME
            } else {
                &*frame.function
            };
            located.push((function.to_string(), user_line, col));
        }

        let mut out = error.headline();
        if let Some((_, line, col)) = located.first() {
            out.push_str(&format!(" (line {line}, column {col})"));
        }
        for (function, line, col) in &located {
            out.push_str(&format!("\n    at {function} ({line}:{col})"));
        }
        out
    }

    fn user_line(&self, line: usize) -> Option<usize> {
        let relative = line.checked_sub(self.marker_line)?;
        (1..=self.snippet_lines)
            .contains(&relative)
            .then_some(relative)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use sluice_script::Interpreter;

    use super::*;

    async fn failure(wrapped: &WrappedSource) -> ScriptError {
        match Interpreter::new().eval_source(wrapped.source()).await {
            Ok(value) => panic!("expected an error, got {value:?}"),
            Err(err) => err,
        }
    }

    #[test]
    fn snippet_follows_the_marker() {
        let wrapped = WrappedSource::new("log(1);", &["getUser".into(), "plot".into()]);
        let lines: Vec<_> = wrapped.source().lines().collect();
        assert_eq!(lines[wrapped.marker_line() - 1], USER_CODE_MARKER);
        assert_eq!(lines[wrapped.marker_line()], "log(1);");
        assert_eq!(lines[1], "// Bound functions: getUser, plot");
        assert_eq!(lines.last(), Some(&"await main();"));
    }

    #[tokio::test]
    async fn reports_the_snippet_line() {
        let code = "const a = 1;\nnull.boom;\nconst b = 2;\nconst c = 3;\nconst d = 4;";
        let wrapped = WrappedSource::new(code, &[]);
        let message = wrapped.translate(&failure(&wrapped).await);
        assert_eq!(
            message,
            "TypeError: Cannot read properties of null (reading 'boom') (line 2, column 1)\n    at <snippet> (2:1)"
        );
    }

    #[tokio::test]
    async fn keeps_nested_frames_inside_the_snippet() {
        let code = "function check(x) {\n  if (!x) throw new Error('missing');\n}\ncheck(0);";
        let wrapped = WrappedSource::new(code, &["listIssues".into()]);
        let message = wrapped.translate(&failure(&wrapped).await);
        assert!(message.starts_with("Error: missing (line 2, column"), "{message}");
        assert!(message.contains("\n    at check (2:"), "{message}");
        assert!(message.contains("\n    at <snippet> (4:1)"), "{message}");
        assert!(!message.contains("<top-level>"), "{message}");
    }

    #[tokio::test]
    async fn syntax_errors_are_relative_to_the_snippet() {
        let wrapped = WrappedSource::new("const ok = 1;\nconst = 2;", &[]);
        let message = wrapped.translate(&failure(&wrapped).await);
        assert!(message.starts_with("SyntaxError: "), "{message}");
        assert!(message.contains("(line 2, column"), "{message}");
    }
}

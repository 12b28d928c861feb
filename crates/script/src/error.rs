//! Script errors with a JS-style stack

use std::fmt;
use std::sync::Arc;

use crate::core::span::Span;
use crate::value::Value;

/// Result alias for interpreter operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Error category, rendered as the JS error name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Syntax,
    Reference,
    Type,
    Range,
    /// A value raised by `throw` or by a host function
    Thrown,
    /// Call depth or loop budget exhausted
    Limit,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Syntax => "SyntaxError",
            Self::Reference => "ReferenceError",
            Self::Type => "TypeError",
            Self::Range | Self::Limit => "RangeError",
            Self::Thrown => "Error",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Syntax => "SCRIPT:SYNTAX",
            Self::Reference => "SCRIPT:REFERENCE",
            Self::Type => "SCRIPT:TYPE",
            Self::Range => "SCRIPT:RANGE",
            Self::Thrown => "SCRIPT:THROWN",
            Self::Limit => "SCRIPT:LIMIT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One stack entry: the function and the position inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: Arc<str>,
    pub span: Span,
}

/// An uncaught script error.
///
/// Frames are collected while the error unwinds: the innermost frame is
/// pushed when it leaves the function it was raised in, and each caller adds
/// its call site on the way out.
#[derive(Debug, Clone)]
pub struct ScriptError {
    kind: ErrorKind,
    message: String,
    thrown: Option<Value>,
    frames: Vec<Frame>,
    pending: Option<Span>,
}

impl ScriptError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            thrown: None,
            frames: Vec::new(),
            pending: None,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Syntax, message).at(span)
    }

    /// Early errors detected while running, e.g. a duplicate `let`.
    pub fn syntax_at_runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn reference(name: &str) -> Self {
        Self::new(ErrorKind::Reference, format!("{name} is not defined"))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Limit, message)
    }

    /// Wrap a thrown value. Error-shaped objects keep their `name`/`message`.
    pub fn thrown(value: Value) -> Self {
        let message = match value.error_parts() {
            Some((_, message)) => message,
            None => format!("Uncaught {}", value.to_display_string()),
        };
        Self {
            thrown: Some(value),
            ..Self::new(ErrorKind::Thrown, message)
        }
    }

    /// Record where the error surfaced, unless a position is already known.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        if self.pending.is_none() {
            self.pending = Some(span);
        }
        self
    }

    /// Close the frame of `function` and continue from the caller's call site.
    #[must_use]
    pub fn unwind(mut self, function: Arc<str>, fallback: Span, call_site: Span) -> Self {
        let span = self.pending.take().unwrap_or(fallback);
        self.frames.push(Frame { function, span });
        self.pending = Some(call_site);
        self
    }

    /// Close the outermost frame.
    #[must_use]
    pub fn finish(mut self, top_level: &str) -> Self {
        if let Some(span) = self.pending.take() {
            self.frames.push(Frame {
                function: Arc::from(top_level),
                span,
            });
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Position of the innermost known location.
    pub fn span(&self) -> Option<Span> {
        self.frames.first().map(|f| f.span).or(self.pending)
    }

    /// Name shown in front of the message.
    pub fn name(&self) -> String {
        match (&self.thrown, self.kind) {
            (Some(value), _) => value
                .error_parts()
                .map_or_else(|| "Uncaught".to_string(), |(name, _)| name),
            (None, kind) => kind.name().to_string(),
        }
    }

    /// `Name: message`, or the bare message for non-error thrown values.
    pub fn headline(&self) -> String {
        match &self.thrown {
            Some(value) if value.error_parts().is_none() => self.message.clone(),
            _ => format!("{}: {}", self.name(), self.message),
        }
    }

    /// The value a `catch` clause binds.
    pub fn to_value(&self) -> Value {
        match &self.thrown {
            Some(value) => value.clone(),
            None => Value::error_object(self.kind.name(), &self.message),
        }
    }

    /// Headline followed by `    at <function> (<line>:<col>)` lines.
    pub fn render_stack(&self, source: &str) -> String {
        let mut out = self.headline();
        let mut frames: Vec<Frame> = self.frames.clone();
        if let Some(span) = self.pending {
            frames.push(Frame {
                function: Arc::from("<anonymous>"),
                span,
            });
        }
        for frame in frames {
            let (line, col) = frame.span.line_col(source);
            out.push_str(&format!("\n    at {} ({line}:{col})", frame.function));
        }
        out
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())
    }
}

impl std::error::Error for ScriptError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwinding_builds_frames_inner_first() {
        let source = "function f() {\n  null.x;\n}\nf();\n";
        let err = ScriptError::type_error("Cannot read properties of null (reading 'x')")
            .at(Span::new(17, 23))
            .unwind(Arc::from("f"), Span::new(0, 1), Span::new(27, 30))
            .finish("<top-level>");

        let rendered = err.render_stack(source);
        assert_eq!(
            rendered,
            "TypeError: Cannot read properties of null (reading 'x')\n    at f (2:3)\n    at <top-level> (4:1)"
        );
    }

    #[test]
    fn thrown_strings_render_uncaught() {
        let err = ScriptError::thrown(Value::from("boom"));
        assert_eq!(err.headline(), "Uncaught boom");
        assert_eq!(err.kind().code(), "SCRIPT:THROWN");
    }

    #[test]
    fn thrown_errors_keep_their_name() {
        let err = ScriptError::thrown(Value::error_object("RangeError", "bad size"));
        assert_eq!(err.headline(), "RangeError: bad size");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Source location attached to nodes and selectors by the parser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Arc<str>>,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

impl Span {
    pub const fn dummy() -> Self {
        Self {
            file: None,
            line: 0,
            column: 0,
        }
    }

    pub fn new(file: Option<&str>, line: usize, column: usize) -> Self {
        Self {
            file: file.map(Arc::from),
            line,
            column,
        }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0 || self.column != 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.is_known()) {
            (Some(file), true) => write!(f, "{}:{}:{}", file, self.line, self.column),
            (Some(file), false) => write!(f, "{}", file),
            (None, true) => write!(f, "{}:{}", self.line, self.column),
            (None, false) => write!(f, "<unknown>"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no source is registered for this path")]
    NotFound,
    #[error("recursive import detected")]
    Recursive,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{span}: `{selector}` is undefined")]
    MixinNotFound { selector: String, span: Span },
    #[error("{span}: no matching definition was found for `{selector}` with {arity} argument(s)")]
    ArgumentMismatch {
        selector: String,
        arity: usize,
        span: Span,
    },
    #[error("{span}: could not import `{path}`: {source}")]
    ImportResolution {
        path: String,
        source: ImportError,
        span: Span,
    },
    #[error("{span}: invalid selector `{selector}`: {reason}")]
    SelectorSyntax {
        selector: String,
        reason: String,
        span: Span,
    },
    #[error("{span}: variable {name} is undefined")]
    UndefinedVariable { name: String, span: Span },
    #[error("{span}: recursive variable definition for {name}")]
    RecursiveVariable { name: String, span: Span },
    #[error("{span}: `{selector}` expands mixins more than {limit} levels deep")]
    MixinRecursion {
        selector: String,
        limit: usize,
        span: Span,
    },
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

impl CompileError {
    /// Returns the type name of this error
    pub fn name(&self) -> &'static str {
        match self {
            CompileError::MixinNotFound { .. } => "MixinNotFound",
            CompileError::ArgumentMismatch { .. } => "ArgumentMismatch",
            CompileError::ImportResolution { .. } => "ImportResolution",
            CompileError::SelectorSyntax { .. } => "SelectorSyntax",
            CompileError::UndefinedVariable { .. } => "UndefinedVariable",
            CompileError::RecursiveVariable { .. } => "RecursiveVariable",
            CompileError::MixinRecursion { .. } => "MixinRecursion",
            CompileError::InternalInvariantViolation(_) => "InternalInvariantViolation",
        }
    }

    /// Returns the source location this error originated from, if any.
    pub fn span(&self) -> Option<&Span> {
        match self {
            CompileError::MixinNotFound { span, .. }
            | CompileError::ArgumentMismatch { span, .. }
            | CompileError::ImportResolution { span, .. }
            | CompileError::SelectorSyntax { span, .. }
            | CompileError::UndefinedVariable { span, .. }
            | CompileError::RecursiveVariable { span, .. }
            | CompileError::MixinRecursion { span, .. } => Some(span),
            CompileError::InternalInvariantViolation(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid options in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

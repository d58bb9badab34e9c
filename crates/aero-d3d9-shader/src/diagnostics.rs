use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Broad class of a [`ShaderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Reserved bits, truncation, operand-count mismatches.
    Malformed,
    /// Legal encoding used in a way the shader model forbids.
    Illegal,
    /// Valid input that the active backend cannot express.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("shader bytecode is empty")]
    Empty,
    #[error("shader bytecode length {len} exceeds maximum {max} bytes")]
    TooLarge { len: usize, max: usize },
    #[error("shader bytecode length {0} is not a multiple of 4")]
    UnalignedLength(usize),
    #[error("unsupported shader type 0x{0:04x}")]
    UnsupportedShaderType(u16),
    #[error("shader model {major}.{minor} is not supported")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("unexpected end of token stream")]
    Truncated,
    #[error("missing end token")]
    MissingEnd,
    #[error("data found after end token")]
    TrailingData,
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("wrong token count ({declared}, not {consumed}) for opcode '{opcode}'")]
    TokenCountMismatch {
        opcode: &'static str,
        declared: usize,
        consumed: usize,
    },
    #[error("{0}")]
    Malformed(String),
    #[error("{opcode} must come before any instructions")]
    LiteralAfterInstruction { opcode: &'static str },
    #[error("{opcode} is not allowed in {target}")]
    OpcodeNotAllowed {
        opcode: &'static str,
        target: String,
    },
    #[error("{opcode} write mask must be {expected}")]
    WriteMask {
        opcode: &'static str,
        expected: &'static str,
    },
    #[error("{opcode} source {operand} must use a replicate swizzle")]
    ReplicateSwizzle { opcode: &'static str, operand: usize },
    #[error("{0}")]
    Illegal(String),
    #[error("{open} without {close}")]
    Unbalanced {
        open: &'static str,
        close: &'static str,
    },
    #[error("{close} does not close the open {open}")]
    MismatchedBlock {
        close: &'static str,
        open: &'static str,
    },
    #[error("label l{0} is called but never defined")]
    UndefinedLabel(u32),
    #[error("color output register never written")]
    ColorOutputNeverWritten,
    #[error("{0}")]
    Unsupported(String),
}

impl ShaderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ShaderError::Empty
            | ShaderError::TooLarge { .. }
            | ShaderError::UnalignedLength(_)
            | ShaderError::UnsupportedShaderType(_)
            | ShaderError::Truncated
            | ShaderError::MissingEnd
            | ShaderError::TrailingData
            | ShaderError::UnknownOpcode(_)
            | ShaderError::TokenCountMismatch { .. }
            | ShaderError::Malformed(_) => ErrorCategory::Malformed,
            ShaderError::UnsupportedVersion { .. } | ShaderError::Unsupported(_) => {
                ErrorCategory::Unsupported
            }
            ShaderError::LiteralAfterInstruction { .. }
            | ShaderError::OpcodeNotAllowed { .. }
            | ShaderError::WriteMask { .. }
            | ShaderError::ReplicateSwizzle { .. }
            | ShaderError::Illegal(_)
            | ShaderError::Unbalanced { .. }
            | ShaderError::MismatchedBlock { .. }
            | ShaderError::UndefinedLabel(_)
            | ShaderError::ColorOutputNeverWritten => ErrorCategory::Illegal,
        }
    }
}

/// Where a diagnostic was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticPosition {
    /// Before the version token was read.
    BeforeParse,
    /// During end-of-compile checks, with no single token to blame.
    PostProcess,
    /// Byte offset of the unit being decoded.
    Offset(usize),
}

impl fmt::Display for DiagnosticPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticPosition::BeforeParse => f.write_str("before parse"),
            DiagnosticPosition::PostProcess => f.write_str("post-process"),
            DiagnosticPosition::Offset(off) => write!(f, "offset {off}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub error: ShaderError,
    pub position: DiagnosticPosition,
    /// Bytecode carries no file names; populated by front ends that do.
    pub source_file: Option<String>,
}

impl Diagnostic {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.source_file {
            write!(f, "{file}: ")?;
        }
        write!(f, "{}: {}", self.position, self.error)
    }
}

/// Ordered, append-only diagnostics list. Recording anything marks the compile as failed.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ShaderError, position: DiagnosticPosition) {
        debug!(%position, %error, "shader diagnostic");
        self.entries.push(Diagnostic {
            error,
            position,
            source_file: None,
        });
    }

    pub fn has_failed(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_order_and_marks_failure() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_failed());

        diags.push(ShaderError::Truncated, DiagnosticPosition::Offset(8));
        diags.push(
            ShaderError::ColorOutputNeverWritten,
            DiagnosticPosition::PostProcess,
        );

        assert!(diags.has_failed());
        let all = diags.into_vec();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].position, DiagnosticPosition::Offset(8));
        assert_eq!(all[1].message(), "color output register never written");
        assert_eq!(all[1].error.category(), ErrorCategory::Illegal);
    }

    #[test]
    fn display_includes_position_and_file() {
        let diag = Diagnostic {
            error: ShaderError::UnknownOpcode(0x1234),
            position: DiagnosticPosition::Offset(4),
            source_file: Some("shader.vso".into()),
        };
        assert_eq!(diag.to_string(), "shader.vso: offset 4: unknown opcode 4660");
    }
}

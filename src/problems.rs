//! Internal validation problems, before they are turned into
//! line/column diagnostics.
use lsp_types::DiagnosticSeverity;

pub(crate) const YAML_SOURCE: &str = "YAML";
pub(crate) const YAML_SCHEMA_PREFIX: &str = "yaml-schema: ";

/// Byte span of a problem within the document text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProblemLocation {
    pub offset: usize,
    pub length: usize,
}

/// Stable numeric codes carried on schema-validation diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Undefined,
    EnumValueMismatch,
    Deprecated,
    PropertyExpected,
}

impl ErrorCode {
    pub fn as_number(self) -> i32 {
        match self {
            ErrorCode::Undefined => 0,
            ErrorCode::EnumValueMismatch => 1,
            ErrorCode::Deprecated => 2,
            ErrorCode::PropertyExpected => 3,
        }
    }
}

/// Problem families that alternative-arm ranking is allowed to merge
/// when two arms tie: the merged problem keeps one message composed
/// from the union of the per-arm arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemType {
    MissingRequiredProp,
    TypeMismatch,
    ConstMismatch,
}

impl ProblemType {
    /// Render the canonical message for this family from merged args.
    pub(crate) fn message(self, args: &[String]) -> String {
        match self {
            ProblemType::MissingRequiredProp => {
                format!("Missing property \"{}\".", args.join("\" or \""))
            }
            ProblemType::TypeMismatch => {
                format!("Incorrect type. Expected \"{}\".", args.join(" | "))
            }
            ProblemType::ConstMismatch => format!("Value must be {}.", args.join(" or ")),
        }
    }
}

/// A single validation problem. Offsets are byte offsets into the
/// document text; conversion to line/column happens at the diagnostics
/// surface.
#[derive(Clone, Debug)]
pub struct Problem {
    pub location: ProblemLocation,
    pub severity: DiagnosticSeverity,
    pub code: Option<ErrorCode>,
    pub message: String,
    /// Diagnostic source label: `YAML` for syntax problems,
    /// `yaml-schema: <title-or-url>` for schema problems.
    pub source: String,
    /// URIs of the schemas that produced the problem. Merged when tied
    /// alternative arms report the same problem.
    pub schema_uris: Vec<String>,
    pub problem_type: Option<ProblemType>,
    pub problem_args: Vec<String>,
}

impl Problem {
    pub(crate) fn syntax(offset: usize, length: usize, message: impl Into<String>) -> Problem {
        Problem {
            location: ProblemLocation { offset, length },
            severity: DiagnosticSeverity::ERROR,
            code: None,
            message: message.into(),
            source: YAML_SOURCE.to_string(),
            schema_uris: Vec::new(),
            problem_type: None,
            problem_args: Vec::new(),
        }
    }

    pub(crate) fn warning(offset: usize, length: usize, message: impl Into<String>) -> Problem {
        Problem {
            severity: DiagnosticSeverity::WARNING,
            ..Problem::syntax(offset, length, message)
        }
    }
}

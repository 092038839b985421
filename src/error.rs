use std::fmt::{self, Formatter};

/// An error produced by the schema registry's content-modification
/// operations or by handle bookkeeping.
///
/// The service never lets these cross the request surface as panics;
/// callers receive them as `Result`s, request handlers turn them into
/// diagnostics or log entries.
#[derive(Debug, PartialEq)]
pub enum SchemaError {
    /// A content path addressed a segment that is not an object.
    InvalidSegment(String),
    /// The addressed schema id is not registered.
    UnknownSchema(String),
}

impl SchemaError {
    pub(crate) fn invalid_segment(segment: impl Into<String>) -> SchemaError {
        SchemaError::InvalidSegment(segment.into())
    }
    pub(crate) fn unknown_schema(uri: impl Into<String>) -> SchemaError {
        SchemaError::UnknownSchema(uri.into())
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::InvalidSegment(segment) => {
                write!(f, "schema content path segment '{}' does not address an object", segment)
            }
            SchemaError::UnknownSchema(uri) => write!(f, "no schema registered for '{}'", uri),
        }
    }
}

impl std::error::Error for SchemaError {}

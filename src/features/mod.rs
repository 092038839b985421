//! Editor-facing façades built on the applicable-schema enumeration.
pub mod codelens;
pub mod completion;
pub mod hover;
pub mod symbols;

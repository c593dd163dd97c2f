//! Request extractors.

pub mod validated;
pub use validated::{ValidatedBatch, ValidatedJson};

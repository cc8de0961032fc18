//! Typed errors for engine construction and lookup failures.

use thiserror::Error;

/// Errors that stop startup or surface at the library boundary.
///
/// Transient I/O (event-sink sends) is handled in place and never
/// reaches this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The process-wide simulated-trader allocation is exhausted.
    #[error("maximum of {max} simulated traders exceeded")]
    TraderLimit { max: usize },

    /// Lookup against the instrument catalog failed.
    #[error("unknown instrument id {0}")]
    UnknownInstrument(u32),
}

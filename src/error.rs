//! Error types.
//!
//! A full or empty ring is ordinary control flow and never shows up here.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while configuring, starting or stopping a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Ring needs at least two slots (one is always left unused)
    #[error("ring capacity must be at least 2 slots, got {0}")]
    InvalidCapacity(usize),

    /// Both workers were pinned to the same core
    #[error("producer and consumer are both pinned to core {0}")]
    SharedCore(usize),

    /// The OS refused to create a worker thread
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    /// An order source could not be opened
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors raised while opening an order source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Reasons an inbound message is rejected before it becomes an order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Field missing from the message
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// Message type is not a new order
    #[error("unsupported message type {0:?}")]
    UnsupportedType(String),

    /// Side value not recognised
    #[error("invalid side {0:?}")]
    InvalidSide(String),

    /// Price not parseable or not representable in ticks
    #[error("invalid price {0:?}")]
    InvalidPrice(String),

    /// Quantity not parseable or not positive
    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),

    /// Binary frame of the wrong size
    #[error("expected {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
}

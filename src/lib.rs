//! # LOB Pipeline
//!
//! A pinned producer/consumer order pipeline: a bounded lock-free SPSC ring
//! buffer hands orders from a source thread to a price-level matching core.
//!
//! ## Design Principles
//!
//! - **Single Producer, Single Consumer**: the ring is split into one
//!   `Producer` and one `Consumer` handle; no locks anywhere
//! - **Backpressure, not growth**: a full ring makes `push` return `false`
//!   and the producer spins; storage is allocated once at startup
//! - **Single-Writer Book**: the matching core lives on the consumer thread
//! - **Cooperative Shutdown**: an explicit token, checked every loop round
//!
//! ## Architecture
//!
//! ```text
//! [OrderSource] --> [Producer Thread (Pinned)] --> [SPSC Ring Buffer] --> [Consumer Thread (Pinned)]
//!                                                                                |
//!                                                                         [MatchingCore]
//! ```

pub mod affinity;
pub mod book;
pub mod config;
pub mod error;
pub mod idle;
pub mod order;
pub mod pipeline;
pub mod report;
pub mod ring;
pub mod shutdown;
pub mod source;

// Re-exports for convenience
pub use affinity::CorePin;
pub use book::{BookSnapshot, MatchOutcome, MatchStats, MatchingCore};
pub use config::PipelineConfig;
pub use error::{DecodeError, PipelineError, SourceError};
pub use idle::IdleStrategy;
pub use order::{NewOrder, Order, OrderId, Price, Qty, Side};
pub use pipeline::{Pipeline, RunningPipeline};
pub use report::RunReport;
pub use ring::{Consumer, Producer, RingBuffer};
pub use shutdown::ShutdownToken;
pub use source::{OrderSource, SourcePoll};

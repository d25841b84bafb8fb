//! # Ingestion
//!
//! Bus message ingestion module.
//!
//! Responsibilities:
//! - Register one bus source per configured connection
//! - Queue messages per connection and dispatch them in arrival order
//! - Backpressure management and drop accounting
//! - Drain in-flight messages on shutdown
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{ConnectionOptions, IngestionPipeline, ReplayConfig, ReplaySource};
//!
//! let mut pipeline = IngestionPipeline::new(dispatcher);
//! let source = ReplaySource::load(path, "c1", ReplayConfig::default())?;
//! pipeline.register_source(Box::new(source), ConnectionOptions::default());
//!
//! pipeline.start_all();
//! // ...
//! pipeline.shutdown().await;
//! ```

mod channel;
mod config;
mod connection;
mod error;
mod pipeline;
mod replay;

pub use channel::{ChannelPublisher, ChannelSource};
pub use config::{ConnectionOptions, IngestionMetrics, MetricsSnapshot};
pub use connection::BusConnection;
pub use contracts::{BusSource, Message};
pub use error::{IngestionError, Result};
pub use pipeline::IngestionPipeline;
pub use replay::{ReplayConfig, ReplayRecord, ReplaySource};

//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the bridge.
//! Business crates only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every `Output` carries a UTC wall-clock timestamp (`chrono::DateTime<Utc>`)
//! - The receive time of a `Message` is the default timestamp of its outputs
//! - Truncation to a storage target's precision happens when the output is batched

mod blueprint;
mod bus;
mod converter;
mod error;
mod message;
mod output;
mod route;
mod storage;
mod topic;

pub use blueprint::*;
pub use bus::{BusSource, MessageCallback};
pub use converter::{Converter, Input};
pub use error::*;
pub use message::Message;
pub use output::{truncate_time, FieldValue, Output};
pub use route::OutputRouter;
pub use storage::{LocalStorageWriter, StorageWriter};
pub use topic::{matches as topic_matches, TopicPattern, WILDCARD_MULTI, WILDCARD_SINGLE};

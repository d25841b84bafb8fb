//! # Routing
//!
//! Message → converter routing.
//!
//! Responsibilities:
//! - Build the per-connection subscription index from `BridgeBlueprint`
//! - Resolve the converter instances interested in a concrete topic
//! - Invoke converters in isolation and hand their outputs to an `OutputRouter`
//! - Keep per-converter statistics with once-per-topic diagnostics
//!
//! ## Example
//!
//! ```ignore
//! let registry = ConverterRegistry::with_builtins();
//! let index = Arc::new(SubscriptionIndex::build(&blueprint, &registry)?);
//! let dispatcher = Dispatcher::new(index, router);
//!
//! dispatcher.dispatch("c1", &message);
//! ```

mod dispatcher;
mod error;
mod index;
mod instance;
mod stats;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Result, RoutingError};
pub use index::{Match, SubscriptionIndex};
pub use instance::ConverterInstance;
pub use stats::{ConverterStats, StatsSnapshot};

//! OutputRouter trait - hand-off point between conversion and batching

use crate::Output;

/// Routes converter outputs to storage targets
pub trait OutputRouter: Send + Sync {
    /// Hand `output` to every named target
    ///
    /// Must not block: called from bus workers while converters run.
    fn route(&self, output: Output, targets: &[String]);
}

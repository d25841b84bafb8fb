//! FanoutRouter - copies each output to its targets' batch writers

use std::collections::HashMap;

use contracts::{Output, OutputRouter};
use tracing::debug;

use crate::batch_writer::BatchQueue;

/// Routes outputs to batch writers by target name
#[derive(Clone, Default)]
pub struct FanoutRouter {
    queues: HashMap<String, BatchQueue>,
}

impl FanoutRouter {
    pub fn new(queues: impl IntoIterator<Item = BatchQueue>) -> Self {
        Self {
            queues: queues
                .into_iter()
                .map(|q| (q.name().to_string(), q))
                .collect(),
        }
    }

    /// Configured target names
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }
}

impl OutputRouter for FanoutRouter {
    fn route(&self, output: Output, targets: &[String]) {
        let mut distinct: Vec<&BatchQueue> = Vec::with_capacity(targets.len());
        for target in targets {
            match self.queues.get(target) {
                Some(queue) if !distinct.iter().any(|q| q.name() == target.as_str()) => {
                    distinct.push(queue)
                }
                Some(_) => {}
                None => debug!(target_name = %target, "no batch writer for target, output ignored"),
            }
        }

        let Some((last, rest)) = distinct.split_last() else {
            return;
        };
        for queue in rest {
            queue.enqueue(output.clone());
        }
        last.enqueue(output);
    }
}

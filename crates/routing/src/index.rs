//! Subscription index
//!
//! Per connection, the list of (pattern, converter instance) pairs built once
//! from the blueprint. Lookups are a linear scan with the topic matcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{BridgeBlueprint, TopicPattern};
use converters::ConverterRegistry;
use tracing::{debug, instrument};

use crate::error::{Result, RoutingError};
use crate::ConverterInstance;

#[derive(Debug)]
struct Subscription {
    pattern: TopicPattern,
    instance: Arc<ConverterInstance>,
}

/// A converter selected for a topic, with the segments its pattern's wildcards captured
#[derive(Debug)]
pub struct Match<'a, 't> {
    pub instance: &'a Arc<ConverterInstance>,
    pub wildcards: Vec<&'t str>,
}

/// Read-only after construction; shared by every bus worker.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    connections: BTreeMap<String, Vec<Subscription>>,
    instances: Vec<Arc<ConverterInstance>>,
}

impl SubscriptionIndex {
    /// Build the index for every configured connection
    ///
    /// `%Prefix%` / `%ClientId%` in converter topics are rendered with the
    /// listening connection's settings before the pattern is parsed.
    ///
    /// # Errors
    /// - unknown converter implementation
    /// - converter referencing an unknown connection or target
    /// - invalid topic pattern
    #[instrument(
        name = "subscription_index_build",
        skip(blueprint, registry),
        fields(converters = blueprint.converters.len(), connections = blueprint.mqtt_clients.len())
    )]
    pub fn build(blueprint: &BridgeBlueprint, registry: &ConverterRegistry) -> Result<Self> {
        let mut connections: BTreeMap<String, Vec<Subscription>> = blueprint
            .mqtt_clients
            .keys()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        let mut instances = Vec::with_capacity(blueprint.converters.len());

        for config in blueprint.converters.values() {
            let converter = registry.resolve(config)?;

            let targets = blueprint.influx_db_clients_for(config);
            if let Some(missing) = targets
                .iter()
                .find(|t| !blueprint.influx_db_clients.contains_key(*t))
            {
                return Err(RoutingError::unknown_target(&config.name, missing));
            }

            let instance = Arc::new(ConverterInstance::new(config.clone(), converter, targets));

            for connection in blueprint.mqtt_clients_for(config) {
                let client = blueprint
                    .mqtt_clients
                    .get(&connection)
                    .ok_or_else(|| RoutingError::unknown_connection(&config.name, &connection))?;

                let subscriptions = connections.entry(connection.clone()).or_default();
                for topic in &config.mqtt_topics {
                    let pattern = TopicPattern::parse(client.render_topic(topic))?;
                    debug!(
                        connection = %connection,
                        converter = %config.name,
                        pattern = %pattern,
                        "subscription registered"
                    );
                    subscriptions.push(Subscription {
                        pattern,
                        instance: Arc::clone(&instance),
                    });
                }
            }

            instances.push(instance);
        }

        Ok(Self {
            connections,
            instances,
        })
    }

    /// Converter instances whose patterns on `connection` match `topic`
    ///
    /// Each instance appears at most once, in registration order; the first
    /// matching pattern supplies the wildcard captures. Unknown connections
    /// and unmatched topics yield an empty list.
    pub fn resolve<'a, 't>(&'a self, connection: &str, topic: &'t str) -> Vec<Match<'a, 't>> {
        let Some(subscriptions) = self.connections.get(connection) else {
            return Vec::new();
        };

        let mut matches: Vec<Match<'a, 't>> = Vec::new();
        for sub in subscriptions {
            if matches
                .iter()
                .any(|m| Arc::ptr_eq(m.instance, &sub.instance))
            {
                continue;
            }
            if let Some(wildcards) = sub.pattern.captures(topic) {
                matches.push(Match {
                    instance: &sub.instance,
                    wildcards,
                });
            }
        }
        matches
    }

    /// Rendered patterns a connection must subscribe to, deduplicated
    pub fn topics_for(&self, connection: &str) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for sub in self.connections.get(connection).into_iter().flatten() {
            let topic = sub.pattern.as_str();
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    /// Configured connection names
    pub fn connections(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// Every converter instance, in converter-name order
    pub fn instances(&self) -> &[Arc<ConverterInstance>] {
        &self.instances
    }
}

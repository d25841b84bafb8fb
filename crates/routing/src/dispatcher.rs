//! Dispatcher
//!
//! Resolves the converters for a message, invokes each in isolation and
//! forwards their outputs to the fan-out router.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::{ContractError, Input, Message, Output, OutputRouter};
use tracing::{debug, info, instrument, trace, warn};

use crate::{ConverterInstance, SubscriptionIndex};

/// What one `dispatch` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Converters whose patterns matched
    pub matched: usize,
    /// Outputs forwarded to the router
    pub outputs: usize,
    /// Converter invocations that failed
    pub failed: usize,
}

/// `Input` view over a message plus the captures of the matching pattern
struct MessageInput<'a> {
    message: &'a Message,
    wildcards: &'a [&'a str],
}

impl Input for MessageInput<'_> {
    fn topic(&self) -> &str {
        &self.message.topic
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn received_at(&self) -> DateTime<Utc> {
        self.message.received_at
    }

    fn wildcards(&self) -> &[&str] {
        self.wildcards
    }
}

/// Stateless apart from converter statistics; safe to share across bus workers.
#[derive(Clone)]
pub struct Dispatcher {
    index: Arc<SubscriptionIndex>,
    router: Arc<dyn OutputRouter>,
}

impl Dispatcher {
    pub fn new(index: Arc<SubscriptionIndex>, router: Arc<dyn OutputRouter>) -> Self {
        Self { index, router }
    }

    pub fn index(&self) -> &SubscriptionIndex {
        &self.index
    }

    /// Dispatch one message received on `connection`
    ///
    /// Never fails: conversion errors and converter panics are counted in the
    /// converter's statistics and the invocation's outputs are discarded.
    #[instrument(
        level = "trace",
        name = "dispatcher_dispatch",
        skip(self, message),
        fields(topic = %message.topic)
    )]
    pub fn dispatch(&self, connection: &str, message: &Message) -> DispatchOutcome {
        let matches = self.index.resolve(connection, &message.topic);
        let mut outcome = DispatchOutcome {
            matched: matches.len(),
            ..Default::default()
        };

        if matches.is_empty() {
            observability::record_message_unmatched(connection);
            trace!(connection, topic = %message.topic, "no converter subscribed");
            return outcome;
        }

        for m in matches {
            let input = MessageInput {
                message,
                wildcards: &m.wildcards,
            };
            match self.invoke(m.instance, &input) {
                Ok(outputs) => {
                    outcome.outputs += outputs.len();
                    for output in outputs {
                        self.router.route(output, m.instance.targets());
                    }
                }
                Err(_) => outcome.failed += 1,
            }
        }

        outcome
    }

    /// Run one converter; outputs are only released if the whole invocation succeeds
    fn invoke(
        &self,
        instance: &ConverterInstance,
        input: &MessageInput<'_>,
    ) -> Result<Vec<Output>, ContractError> {
        let topic = input.topic();
        let mut outputs = Vec::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            instance
                .converter()
                .convert(instance.config(), input, &mut |output| outputs.push(output))
        }))
        .unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ContractError::conversion(topic, format!("converter panicked: {reason}")))
        });

        let stats = instance.stats();
        match result {
            Ok(()) => {
                observability::record_conversion(instance.name(), true);
                if stats.record_handled(topic) {
                    if instance.config().log_handle_once {
                        info!(converter = instance.name(), topic, "first message handled");
                    } else {
                        debug!(converter = instance.name(), topic, outputs = outputs.len(), "message handled");
                    }
                }
                for output in &mut outputs {
                    if output.measurement.is_empty() {
                        output.measurement = instance.measurement().to_string();
                    }
                }
                Ok(outputs)
            }
            Err(e) => {
                observability::record_conversion(instance.name(), false);
                // `error_logs` counts exactly the warnings emitted here
                if stats.record_error(topic) {
                    warn!(converter = instance.name(), topic, error = %e, "conversion failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatsSnapshot;
    use chrono::TimeZone;
    use contracts::{
        BridgeBlueprint, Converter, ConverterConfig, FieldValue, InfluxDbClientConfig,
        MqttClientConfig,
    };
    use converters::ConverterRegistry;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct RecordingRouter {
        routed: Mutex<Vec<(Output, Vec<String>)>>,
    }

    impl OutputRouter for RecordingRouter {
        fn route(&self, output: Output, targets: &[String]) {
            self.routed.lock().push((output, targets.to_vec()));
        }
    }

    /// Emits one point, then panics
    struct Exploding;

    impl Converter for Exploding {
        fn implementation(&self) -> &'static str {
            "exploding"
        }

        fn default_measurement(&self) -> &'static str {
            "boom"
        }

        fn convert(
            &self,
            _config: &ConverterConfig,
            input: &dyn Input,
            emit: &mut dyn FnMut(Output),
        ) -> Result<(), ContractError> {
            emit(Output::new("", input.received_at()).with_field("partial", true));
            panic!("bad sensor");
        }
    }

    fn converter(implementation: &str, topic: &str, once: bool) -> ConverterConfig {
        ConverterConfig {
            implementation: implementation.into(),
            mqtt_topics: vec![topic.into()],
            wildcard_tags: vec!["room".into()],
            log_handle_once: once,
            ..Default::default()
        }
    }

    fn blueprint(converters: Vec<(&str, ConverterConfig)>) -> BridgeBlueprint {
        let mqtt: MqttClientConfig = MqttClientConfig {
            name: String::new(),
            broker: "tcp://localhost:1883".into(),
            user: String::new(),
            password: String::new(),
            client_id: "bridge".into(),
            qos: 0,
            availability_topic: String::new(),
            topic_prefix: String::new(),
            log_messages: false,
        };
        let influx = InfluxDbClientConfig {
            name: String::new(),
            address: "http://localhost:8086".into(),
            user: String::new(),
            password: String::new(),
            database: "bridge".into(),
            write_interval: std::time::Duration::from_millis(200),
            time_precision: std::time::Duration::from_secs(1),
            log_line_protocol: false,
            writer: Default::default(),
            max_pending_points: 100,
            params: Default::default(),
        };
        let mut bp = BridgeBlueprint {
            version: 0,
            mqtt_clients: BTreeMap::from([("c1".to_string(), mqtt)]),
            influx_db_clients: BTreeMap::from([
                ("X".to_string(), influx.clone()),
                ("Y".to_string(), influx),
            ]),
            converters: converters
                .into_iter()
                .map(|(name, c)| (name.to_string(), c))
                .collect(),
            log_config: false,
            log_worker_start: false,
            log_mqtt_debug: false,
        };
        bp.assign_names();
        bp
    }

    fn dispatcher(bp: &BridgeBlueprint) -> (Dispatcher, Arc<RecordingRouter>) {
        let mut registry = ConverterRegistry::with_builtins();
        registry.register(Arc::new(Exploding));
        let index = Arc::new(SubscriptionIndex::build(bp, &registry).unwrap());
        let router = Arc::new(RecordingRouter::default());
        (Dispatcher::new(index, router.clone()), router)
    }

    fn message(topic: &str, payload: &'static str) -> Message {
        Message::received_at(
            "c1",
            topic,
            payload,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 15).unwrap(),
        )
    }

    fn stats_of(d: &Dispatcher, name: &str) -> StatsSnapshot {
        d.index()
            .instances()
            .iter()
            .find(|i| i.name() == name)
            .unwrap()
            .stats()
            .snapshot()
    }

    #[test]
    fn test_dispatch_fills_measurement_and_targets() {
        let mut temp = converter("float-to-field", "sensors/+/temp", false);
        temp.target_measurement = Some("temperature".into());
        let bp = blueprint(vec![("temp-conv", temp)]);
        let (d, router) = dispatcher(&bp);

        let outcome = d.dispatch("c1", &message("sensors/kitchen/temp", "21.5"));
        assert_eq!(
            outcome,
            DispatchOutcome {
                matched: 1,
                outputs: 1,
                failed: 0
            }
        );

        let routed = router.routed.lock();
        let (output, targets) = &routed[0];
        assert_eq!(output.measurement, "temperature");
        assert_eq!(output.fields["value"], FieldValue::Float(21.5));
        assert_eq!(output.tags["room"], "kitchen");
        assert_eq!(targets, &vec!["X".to_string(), "Y".to_string()]);
    }

    #[test]
    fn test_dispatch_is_idempotent() {
        let bp = blueprint(vec![("temp-conv", converter("float-to-field", "sensors/+/temp", false))]);
        let (d, router) = dispatcher(&bp);
        let msg = message("sensors/hall/temp", "19");

        d.dispatch("c1", &msg);
        d.dispatch("c1", &msg);

        let routed = router.routed.lock();
        assert_eq!(routed.len(), 2);
        assert_eq!(routed[0], routed[1]);
        assert_eq!(routed[0].0.measurement, "floatValue");
        assert_eq!(stats_of(&d, "temp-conv").handled, 2);
    }

    #[test]
    fn test_unmatched_topic_is_ignored() {
        let bp = blueprint(vec![("temp-conv", converter("float-to-field", "sensors/+/temp", false))]);
        let (d, router) = dispatcher(&bp);

        let outcome = d.dispatch("c1", &message("other/thing", "1"));
        assert_eq!(outcome, DispatchOutcome::default());
        assert!(router.routed.lock().is_empty());
    }

    #[test]
    fn test_dedup_counts_every_error_logs_once() {
        let bp = blueprint(vec![("temp-conv", converter("float-to-field", "sensors/+/temp", true))]);
        let (d, router) = dispatcher(&bp);

        d.dispatch("c1", &message("sensors/kitchen/temp", "warm"));
        d.dispatch("c1", &message("sensors/kitchen/temp", "hot"));

        let snap = stats_of(&d, "temp-conv");
        assert_eq!(snap.errors, 2);
        // one "conversion failed" warning per error_logs increment
        assert_eq!(snap.error_logs, 1);
        assert!(router.routed.lock().is_empty());
    }

    #[test]
    fn test_panicking_converter_is_isolated() {
        let bp = blueprint(vec![
            ("a-exploding", converter("exploding", "sensors/#", false)),
            ("temp-conv", converter("float-to-field", "sensors/+/temp", false)),
        ]);
        let (d, router) = dispatcher(&bp);

        let outcome = d.dispatch("c1", &message("sensors/kitchen/temp", "20"));
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.outputs, 1);

        // partial output of the failed invocation is discarded
        let routed = router.routed.lock();
        assert_eq!(routed.len(), 1);
        assert!(!routed[0].0.fields.contains_key("partial"));
        assert_eq!(stats_of(&d, "a-exploding").errors, 1);
        assert_eq!(stats_of(&d, "temp-conv").handled, 1);
    }
}

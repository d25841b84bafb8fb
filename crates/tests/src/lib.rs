//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端测试：配置 -> 订阅索引 -> 分发 -> 扇出 -> 批量写入（无需 broker）

#[cfg(test)]
mod contract_tests {
    use contracts::{topic_matches, TopicPattern};

    #[test]
    fn test_topic_matching_table() {
        let cases = [
            ("a/+/c", "a/b/c", true),
            ("a/+/c", "a/b/d", false),
            ("a/#", "a", true),
            ("a/#", "a/b/c", true),
            ("+/+", "a/b", true),
            ("+/+", "a/b/c", false),
            ("#", "anything/at/all", true),
            ("sensors/+/temp", "sensors//temp", true),
        ];
        for (pattern, topic, expected) in cases {
            assert_eq!(
                topic_matches(pattern, topic),
                expected,
                "{pattern} vs {topic}"
            );
        }
    }

    #[test]
    fn test_captures_in_order() {
        let pattern = TopicPattern::parse("home/+/+/#").unwrap();
        let captures = pattern.captures("home/kitchen/temp/raw/1").unwrap();
        assert_eq!(captures, vec!["kitchen", "temp", "raw/1"]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BridgeBlueprint, FieldValue, Message};
    use converters::ConverterRegistry;
    use fanout::{BatchSettings, BatchWriterHandle, Fanout, MemoryWriter};
    use ingestion::{ChannelSource, ConnectionOptions, IngestionPipeline};
    use routing::{Dispatcher, SubscriptionIndex};

    const CONFIG: &str = r#"
[mqtt_clients.c1]
broker = "tcp://localhost:1883"

[mqtt_clients.c2]
broker = "tcp://localhost:1884"
topic_prefix = "home/"

[influx_db_clients.X]
address = "http://localhost:8086"
time_precision = "1s"
write_interval = "20ms"

[influx_db_clients.Y]
address = "http://localhost:8087"
time_precision = "1ms"
write_interval = "20ms"

[converters.temp-conv]
implementation = "float-to-field"
target_measurement = "temperature"
mqtt_topics = ["%Prefix%sensors/+/temp"]
mqtt_clients = ["c1"]
influx_db_clients = ["X"]
wildcard_tags = ["room"]

[converters.avail]
implementation = "lwt"
mqtt_topics = ["%Prefix%tele/+/LWT"]
"#;

    struct Bridge {
        dispatcher: Dispatcher,
        fanout: Fanout,
        x: MemoryWriter,
        y: MemoryWriter,
    }

    /// 用内存写入器替换真实目标
    fn bridge(blueprint: &BridgeBlueprint) -> Bridge {
        let x = MemoryWriter::new("X");
        let y = MemoryWriter::new("Y");
        let fanout = Fanout::with_handles(vec![
            BatchWriterHandle::spawn(
                x.clone(),
                BatchSettings::from_config(&blueprint.influx_db_clients["X"]),
            ),
            BatchWriterHandle::spawn(
                y.clone(),
                BatchSettings::from_config(&blueprint.influx_db_clients["Y"]),
            ),
        ]);

        let index =
            SubscriptionIndex::build(blueprint, &ConverterRegistry::with_builtins()).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(index), fanout.router());
        Bridge {
            dispatcher,
            fanout,
            x,
            y,
        }
    }

    fn blueprint() -> BridgeBlueprint {
        ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap()
    }

    #[tokio::test]
    async fn test_float_message_becomes_one_point() {
        let bp = blueprint();
        let bridge = bridge(&bp);
        let received_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(750);

        let outcome = bridge.dispatcher.dispatch(
            "c1",
            &Message::received_at("c1", "sensors/kitchen/temp", "21.5", received_at),
        );
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.outputs, 1);

        bridge.fanout.shutdown().await;

        let points = bridge.x.points();
        assert_eq!(points.len(), 1);
        let point = &points[0];
        assert_eq!(point.measurement, "temperature");
        assert_eq!(point.tags.get("room").map(String::as_str), Some("kitchen"));
        assert_eq!(point.fields.get("value"), Some(&FieldValue::Float(21.5)));
        // X 的精度为 1s，毫秒部分被截断
        assert_eq!(
            point.time,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(bridge.x.precisions(), vec![Duration::from_secs(1)]);
        assert!(bridge.y.points().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_rendered_per_connection() {
        let bp = blueprint();
        let bridge = bridge(&bp);

        // c2 的前缀为 home/，c1 没有前缀
        let on_c2 = bridge
            .dispatcher
            .dispatch("c2", &Message::new("c2", "home/tele/plug/LWT", "online"));
        let wrong_prefix = bridge
            .dispatcher
            .dispatch("c2", &Message::new("c2", "tele/plug/LWT", "online"));
        let on_c1 = bridge
            .dispatcher
            .dispatch("c1", &Message::new("c1", "tele/lamp/LWT", "Offline"));

        assert_eq!(on_c2.outputs, 1);
        assert_eq!(wrong_prefix.matched, 0);
        assert_eq!(on_c1.outputs, 1);

        bridge.fanout.shutdown().await;

        // avail 没有指定目标，写入所有目标
        for writer in [&bridge.x, &bridge.y] {
            let points = writer.points();
            assert_eq!(points.len(), 2);
            assert!(points.iter().all(|p| p.measurement == "lwt"));
        }
    }

    #[tokio::test]
    async fn test_bad_payload_counted_not_written() {
        let bp = blueprint();
        let bridge = bridge(&bp);

        let outcome = bridge
            .dispatcher
            .dispatch("c1", &Message::new("c1", "sensors/hall/temp", "warm"));
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.outputs, 0);

        let temp = bridge
            .dispatcher
            .index()
            .instances()
            .iter()
            .find(|i| i.name() == "temp-conv")
            .unwrap()
            .stats()
            .snapshot();
        assert_eq!(temp.errors, 1);
        assert_eq!(temp.handled, 0);

        let metrics = bridge.fanout.shutdown().await;
        assert!(metrics.iter().all(|(_, m)| m.enqueued == 0));
        assert!(bridge.x.is_closed());
    }

    #[tokio::test]
    async fn test_bus_to_storage() {
        let bp = blueprint();
        let bridge = bridge(&bp);
        let mut pipeline = IngestionPipeline::new(bridge.dispatcher.clone());

        let (source, publisher) = ChannelSource::new("c1");
        pipeline
            .register_source(
                Box::new(source),
                ConnectionOptions::from_config(&bp.mqtt_clients["c1"], &bp),
            )
            .unwrap();
        pipeline.start_all();

        for (room, value) in [("kitchen", "20"), ("hall", "19.5"), ("attic", "31")] {
            publisher
                .publish(format!("sensors/{room}/temp"), value)
                .unwrap();
        }
        drop(publisher);

        while !pipeline.all_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pipeline.shutdown().await;
        let metrics = bridge.fanout.shutdown().await;

        let rooms: Vec<String> = bridge
            .x
            .points()
            .iter()
            .filter_map(|p| p.tags.get("room").cloned())
            .collect();
        assert_eq!(rooms, vec!["kitchen", "hall", "attic"]);
        assert_eq!(pipeline.metrics().messages_dispatched, 3);

        let (name, x_metrics) = &metrics[0];
        assert_eq!(name, "X");
        assert_eq!(x_metrics.points_written, 3);
    }
}

//! `lwt`: availability (last will) messages

use contracts::{ContractError, Converter, ConverterConfig, Input, Output};

use crate::apply_wildcard_tags;

/// Maps `online` / `offline` payloads to a boolean `available` field.
///
/// The `device` tag is the topic segment before the last one, so
/// `tele/plug-1/LWT` yields `device=plug-1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lwt;

impl Converter for Lwt {
    fn implementation(&self) -> &'static str {
        "lwt"
    }

    fn default_measurement(&self) -> &'static str {
        "lwt"
    }

    fn convert(
        &self,
        config: &ConverterConfig,
        input: &dyn Input,
        emit: &mut dyn FnMut(Output),
    ) -> Result<(), ContractError> {
        let payload = String::from_utf8_lossy(input.payload());
        let available = match payload.trim().to_ascii_lowercase().as_str() {
            "online" => true,
            "offline" => false,
            other => {
                return Err(ContractError::conversion(
                    input.topic(),
                    format!("unknown availability '{other}'"),
                ))
            }
        };

        let mut output = Output::new("", input.received_at()).with_field("available", available);
        if let Some(device) = input.topic().rsplit('/').nth(1) {
            output = output.with_tag("device", device);
        }
        emit(apply_wildcard_tags(config, input, output));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{collect, TestInput};
    use contracts::FieldValue;

    fn config() -> ConverterConfig {
        ConverterConfig {
            name: "availability".into(),
            implementation: "lwt".into(),
            mqtt_topics: vec!["tele/+/LWT".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_online_offline() {
        let stimuli = [
            ("tele/plug-1/LWT", "Online", true, "plug-1"),
            ("tele/plug-2/LWT", "offline", false, "plug-2"),
            ("home/tele/sw/LWT", " ONLINE ", true, "sw"),
        ];
        for (topic, payload, available, device) in stimuli {
            let outputs = collect(&Lwt, &config(), &TestInput::new(topic, payload)).unwrap();
            assert_eq!(outputs.len(), 1);
            assert_eq!(outputs[0].fields["available"], FieldValue::Boolean(available));
            assert_eq!(outputs[0].tags["device"], device);
        }
    }

    #[test]
    fn test_single_segment_topic_has_no_device() {
        let outputs = collect(&Lwt, &config(), &TestInput::new("LWT", "online")).unwrap();
        assert!(!outputs[0].tags.contains_key("device"));
    }

    #[test]
    fn test_unknown_payload() {
        let result = collect(&Lwt, &config(), &TestInput::new("tele/x/LWT", "maybe"));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown availability 'maybe'"), "got: {err}");
    }
}

//! `json-fields`: flat JSON objects

use chrono::{DateTime, Utc};
use contracts::{ContractError, Converter, ConverterConfig, FieldValue, Input, Output};
use serde_json::Value;

use crate::apply_wildcard_tags;

/// Turns every member of a flat JSON object into a field or tag.
///
/// Params:
/// - `tag_keys`: comma-separated keys whose string values become tags
/// - `time_key`: key holding an RFC 3339 timestamp that replaces the receive time
///
/// `null` members are skipped; nested objects and arrays are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFields;

impl Converter for JsonFields {
    fn implementation(&self) -> &'static str {
        "json-fields"
    }

    fn default_measurement(&self) -> &'static str {
        "json"
    }

    fn convert(
        &self,
        config: &ConverterConfig,
        input: &dyn Input,
        emit: &mut dyn FnMut(Output),
    ) -> Result<(), ContractError> {
        let topic = input.topic();
        let object = match serde_json::from_slice::<Value>(input.payload()) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(ContractError::conversion(topic, "payload is not a JSON object")),
            Err(e) => return Err(ContractError::conversion(topic, format!("invalid JSON: {e}"))),
        };

        let tag_keys: Vec<&str> = config
            .param("tag_keys")
            .map(|keys| keys.split(',').map(str::trim).filter(|k| !k.is_empty()).collect())
            .unwrap_or_default();
        let time_key = config.param("time_key");

        let mut output = Output::new("", input.received_at());
        for (key, value) in object {
            if Some(key.as_str()) == time_key {
                output.time = parse_time(topic, &key, &value)?;
                continue;
            }
            match value {
                Value::Null => {}
                Value::String(s) if tag_keys.contains(&key.as_str()) => {
                    output.tags.insert(key, s);
                }
                Value::String(s) => {
                    output.fields.insert(key, FieldValue::String(s));
                }
                Value::Bool(b) => {
                    output.fields.insert(key, FieldValue::Boolean(b));
                }
                Value::Number(n) => {
                    let field = if let Some(i) = n.as_i64() {
                        FieldValue::Integer(i)
                    } else if let Some(u) = n.as_u64() {
                        FieldValue::UInteger(u)
                    } else if let Some(f) = n.as_f64() {
                        FieldValue::Float(f)
                    } else {
                        return Err(ContractError::conversion(
                            topic,
                            format!("member '{key}' is not a representable number"),
                        ));
                    };
                    output.fields.insert(key, field);
                }
                Value::Array(_) | Value::Object(_) => {
                    return Err(ContractError::conversion(
                        topic,
                        format!("member '{key}' is not a scalar"),
                    ))
                }
            }
        }

        if output.fields.is_empty() {
            return Err(ContractError::conversion(topic, "object has no field members"));
        }
        emit(apply_wildcard_tags(config, input, output));
        Ok(())
    }
}

fn parse_time(topic: &str, key: &str, value: &Value) -> Result<DateTime<Utc>, ContractError> {
    let raw = value.as_str().ok_or_else(|| {
        ContractError::conversion(topic, format!("time member '{key}' is not a string"))
    })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ContractError::conversion(topic, format!("invalid time '{raw}': {e}")))
}

//! # Converters
//!
//! Built-in payload converters and the implementation registry.
//!
//! Responsibilities:
//! - Map implementation names (`float-to-field`, `lwt`, `json-fields`) to converters
//! - Reject unknown implementation names at startup
//! - Turn raw payloads into `Output` points

pub mod float_to_field;
pub mod json_fields;
pub mod lwt;
pub mod registry;

pub use contracts::{Converter, ConverterConfig, Input, Output};
pub use float_to_field::FloatToField;
pub use json_fields::JsonFields;
pub use lwt::Lwt;
pub use registry::ConverterRegistry;

/// Tag each wildcard capture with the name configured at the same position
///
/// Surplus captures or surplus names are ignored.
pub(crate) fn apply_wildcard_tags(
    config: &ConverterConfig,
    input: &dyn Input,
    mut output: Output,
) -> Output {
    for (name, value) in config.wildcard_tags.iter().zip(input.wildcards()) {
        output.tags.insert(name.clone(), (*value).to_string());
    }
    output
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use contracts::{ContractError, Converter, ConverterConfig, Input, Output};

    pub struct TestInput<'a> {
        pub topic: &'a str,
        pub payload: &'a [u8],
        pub received_at: DateTime<Utc>,
        pub wildcards: Vec<&'a str>,
    }

    impl<'a> TestInput<'a> {
        pub fn new(topic: &'a str, payload: &'a str) -> Self {
            Self {
                topic,
                payload: payload.as_bytes(),
                received_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                wildcards: Vec::new(),
            }
        }

        pub fn with_wildcards(mut self, wildcards: &[&'a str]) -> Self {
            self.wildcards = wildcards.to_vec();
            self
        }
    }

    impl Input for TestInput<'_> {
        fn topic(&self) -> &str {
            self.topic
        }

        fn payload(&self) -> &[u8] {
            self.payload
        }

        fn received_at(&self) -> DateTime<Utc> {
            self.received_at
        }

        fn wildcards(&self) -> &[&str] {
            &self.wildcards
        }
    }

    /// Run a converter and collect everything it emitted
    pub fn collect(
        converter: &dyn Converter,
        config: &ConverterConfig,
        input: &TestInput<'_>,
    ) -> Result<Vec<Output>, ContractError> {
        let mut outputs = Vec::new();
        converter.convert(config, input, &mut |o| outputs.push(o))?;
        Ok(outputs)
    }
}

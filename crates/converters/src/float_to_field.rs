//! `float-to-field`: one decimal number per message

use contracts::{ContractError, Converter, ConverterConfig, Input, Output};

use crate::apply_wildcard_tags;

/// Field name used when the `field` param is absent
pub const DEFAULT_FIELD: &str = "value";

/// Parses the trimmed payload as a float and stores it in a single field.
///
/// Params:
/// - `field`: field name (default `value`)
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatToField;

impl Converter for FloatToField {
    fn implementation(&self) -> &'static str {
        "float-to-field"
    }

    fn default_measurement(&self) -> &'static str {
        "floatValue"
    }

    fn convert(
        &self,
        config: &ConverterConfig,
        input: &dyn Input,
        emit: &mut dyn FnMut(Output),
    ) -> Result<(), ContractError> {
        let text = std::str::from_utf8(input.payload())
            .map_err(|e| ContractError::conversion(input.topic(), format!("payload is not utf-8: {e}")))?
            .trim();

        let value: f64 = text.parse().map_err(|_| {
            ContractError::conversion(input.topic(), format!("cannot parse '{text}' as float"))
        })?;
        if !value.is_finite() {
            return Err(ContractError::conversion(
                input.topic(),
                format!("non-finite value '{text}'"),
            ));
        }

        let field = config.param("field").unwrap_or(DEFAULT_FIELD);
        let output = Output::new("", input.received_at()).with_field(field, value);
        emit(apply_wildcard_tags(config, input, output));
        Ok(())
    }
}

//! InfluxDB line protocol encoding
//!
//! `measurement,tag=v field=1.5,n=3i 1700000000`

use std::fmt::Write;
use std::time::Duration;

use contracts::{FieldValue, Output};

/// Influx precision units, coarsest first
const UNITS: [(&str, u128); 6] = [
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("u", 1_000),
    ("ns", 1),
];

/// Coarsest Influx timestamp unit that divides `precision` evenly
///
/// Returns the `precision=` query value and the unit length in nanoseconds.
pub fn precision_unit(precision: Duration) -> (&'static str, i64) {
    let nanos = precision.as_nanos();
    UNITS
        .iter()
        .find(|(_, unit)| nanos >= *unit && nanos % unit == 0)
        .map(|(name, unit)| (*name, *unit as i64))
        .unwrap_or(("ns", 1))
}

/// Encode one point
///
/// `None` if it has no fields, or if any name or value contains a line break
/// (the point would split into several lines of the request body).
pub fn encode_line(output: &Output, precision: Duration) -> Option<String> {
    if output.fields.is_empty() || has_line_break(output) {
        return None;
    }

    let mut line = String::with_capacity(64);
    escape_into(&mut line, &output.measurement, &[',', ' ']);

    for (key, value) in &output.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        escape_into(&mut line, value, &[',', '=', ' ']);
    }

    let mut sep = ' ';
    for (key, value) in &output.fields {
        line.push(sep);
        sep = ',';
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        match value {
            FieldValue::Boolean(b) => line.push_str(if *b { "true" } else { "false" }),
            FieldValue::Integer(i) => {
                let _ = write!(line, "{i}i");
            }
            FieldValue::UInteger(u) => {
                let _ = write!(line, "{u}u");
            }
            FieldValue::Float(f) => {
                let _ = write!(line, "{f}");
            }
            FieldValue::String(s) => {
                line.push('"');
                escape_into(&mut line, s, &['"', '\\']);
                line.push('"');
            }
        }
    }

    if let Some(nanos) = output.time.timestamp_nanos_opt() {
        let (_, unit) = precision_unit(precision);
        let _ = write!(line, " {}", nanos.div_euclid(unit));
    }

    Some(line)
}

/// Encode a batch, one line per point, skipping points without fields
pub fn encode_batch(batch: &[Output], precision: Duration) -> String {
    let mut body = String::new();
    for line in batch.iter().filter_map(|o| encode_line(o, precision)) {
        body.push_str(&line);
        body.push('\n');
    }
    body
}

fn has_line_break(output: &Output) -> bool {
    fn breaks(s: &str) -> bool {
        s.contains(['\n', '\r'])
    }

    breaks(&output.measurement)
        || output.tags.iter().any(|(k, v)| breaks(k) || breaks(v))
        || output.fields.iter().any(|(k, v)| {
            breaks(k) || matches!(v, FieldValue::String(s) if breaks(s))
        })
}

fn escape_into(buf: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            buf.push('\\');
        }
        buf.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap()
    }

    #[test]
    fn test_precision_unit() {
        assert_eq!(precision_unit(Duration::from_secs(1)), ("s", 1_000_000_000));
        assert_eq!(precision_unit(Duration::from_millis(10)), ("ms", 1_000_000));
        assert_eq!(precision_unit(Duration::from_secs(120)), ("m", 60_000_000_000));
        assert_eq!(precision_unit(Duration::from_micros(1500)), ("u", 1_000));
        assert_eq!(precision_unit(Duration::from_nanos(7)), ("ns", 1));
    }

    #[test]
    fn test_encode_line() {
        let output = Output::new("temperature", time())
            .with_tag("room", "kitchen")
            .with_field("value", 21.5);
        assert_eq!(
            encode_line(&output, Duration::from_secs(1)).unwrap(),
            "temperature,room=kitchen value=21.5 1704067210"
        );
    }

    #[test]
    fn test_field_types_and_escaping() {
        let output = Output::new("my meas,x", time())
            .with_tag("a b", "c=d")
            .with_tag("empty", "")
            .with_field("i", 3i64)
            .with_field("n", 4u64)
            .with_field("ok", true)
            .with_field("s", r#"say "hi" \o/"#);
        assert_eq!(
            encode_line(&output, Duration::from_millis(1)).unwrap(),
            r#"my\ meas\,x,a\ b=c\=d i=3i,n=4u,ok=true,s="say \"hi\" \\o/" 1704067210000"#
        );
    }

    #[test]
    fn test_points_without_fields_are_skipped() {
        let empty = Output::new("m", time());
        assert!(encode_line(&empty, Duration::from_secs(1)).is_none());

        let batch = vec![empty, Output::new("m", time()).with_field("v", 1.0)];
        assert_eq!(encode_batch(&batch, Duration::from_secs(1)), "m v=1 1704067210\n");
    }

    #[test]
    fn test_line_breaks_reject_point() {
        let forged = Output::new("m", time())
            .with_tag("unit", "W\nevil v=9")
            .with_field("p", 1.0);
        assert!(encode_line(&forged, Duration::from_secs(1)).is_none());

        let carriage = Output::new("m", time()).with_field("note", "a\rb");
        assert!(encode_line(&carriage, Duration::from_secs(1)).is_none());

        let field_key = Output::new("m", time()).with_field("p\n", 1.0);
        assert!(encode_line(&field_key, Duration::from_secs(1)).is_none());

        // 其余点不受影响
        let batch = vec![forged, Output::new("m", time()).with_field("p", 2.0)];
        assert_eq!(encode_batch(&batch, Duration::from_secs(1)), "m p=2 1704067210\n");
    }
}

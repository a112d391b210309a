//! JSON S-box records.
//!
//! A record file is a JSON array of objects of the form
//! `{"name": "present", "input": "4", "output": "4", "s-box": {"0": "12", ...}}`.
//! Sizes and table values may be given as strings or integers, and the table
//! may also be a plain array.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::error::SBoxError;
use crate::sbox::SBox;

/// Failures while reading S-box records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The document is not valid JSON for the record layout.
    #[error("malformed S-box records: {0}")]
    Json(#[from] serde_json::Error),
    /// A field could not be interpreted.
    #[error("S-box record `{name}`: {reason}")]
    Field {
        /// Record name.
        name: String,
        /// What was wrong.
        reason: String,
    },
    /// The record decoded but does not describe a valid S-box.
    #[error(transparent)]
    SBox(#[from] SBoxError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Text(String),
}

impl Number {
    fn parse(&self, name: &str, what: &str) -> Result<u64, RecordError> {
        match self {
            Number::Int(value) => Ok(*value),
            Number::Text(text) => {
                let text = text.trim();
                let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => text.parse(),
                };
                parsed.map_err(|_| RecordError::Field {
                    name: name.to_string(),
                    reason: format!("{what} `{text}` is not an integer"),
                })
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Mapping {
    Dict(BTreeMap<String, Number>),
    List(Vec<Number>),
}

#[derive(Deserialize)]
struct RawRecord {
    name: String,
    input: Number,
    output: Number,
    #[serde(rename = "s-box")]
    sbox: Mapping,
}

impl RawRecord {
    fn into_sbox(self) -> Result<SBox, RecordError> {
        let name = self.name;
        let input_bits = self.input.parse(&name, "input size")?;
        let output_bits = self.output.parse(&name, "output size")?;
        let (input_bits, output_bits) = match (u32::try_from(input_bits), u32::try_from(output_bits)) {
            (Ok(m), Ok(k)) if m < 32 && k < 32 => (m, k),
            _ => {
                return Err(RecordError::Field {
                    name,
                    reason: "bit sizes out of range".into(),
                })
            }
        };
        let len = 1usize.checked_shl(input_bits).unwrap_or(usize::MAX);
        let table = match self.sbox {
            Mapping::List(values) => values
                .iter()
                .map(|v| to_u32(v.parse(&name, "value")?, &name))
                .collect::<Result<Vec<_>, _>>()?,
            Mapping::Dict(entries) => {
                if entries.len() != len {
                    return Err(SBoxError::InvalidLength {
                        name,
                        input_bits,
                        expected: len,
                        actual: entries.len(),
                    }
                    .into());
                }
                let mut table = vec![None; len];
                for (key, value) in &entries {
                    let index = key.trim().parse::<usize>().map_err(|_| RecordError::Field {
                        name: name.clone(),
                        reason: format!("input `{key}` is not an integer"),
                    })?;
                    let slot = table.get_mut(index).ok_or_else(|| RecordError::Field {
                        name: name.clone(),
                        reason: format!("input {index} exceeds the {input_bits}-bit domain"),
                    })?;
                    *slot = Some(to_u32(value.parse(&name, "value")?, &name)?);
                }
                table
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| {
                        value.ok_or_else(|| RecordError::Field {
                            name: name.clone(),
                            reason: format!("missing value for input {index}"),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(SBox::new(name, input_bits, output_bits, table)?)
    }
}

fn to_u32(value: u64, name: &str) -> Result<u32, RecordError> {
    u32::try_from(value).map_err(|_| RecordError::Field {
        name: name.to_string(),
        reason: format!("value {value} does not fit in 32 bits"),
    })
}

/// Parses a JSON array of S-box records.
pub fn parse_records(json: &str) -> Result<Vec<SBox>, RecordError> {
    let raw: Vec<RawRecord> = serde_json::from_str(json)?;
    raw.into_iter().map(RawRecord::into_sbox).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_dictionary_records() {
        let json = r#"[{"name": "swap", "input": "2", "output": "2",
                        "s-box": {"0": "1", "1": "0", "2": "3", "3": "2"}}]"#;
        let sboxes = parse_records(json).unwrap();
        assert_eq!(sboxes.len(), 1);
        assert_eq!(sboxes[0].name(), "swap");
        assert_eq!(sboxes[0].table(), &[1, 0, 3, 2]);
    }

    #[test]
    fn parses_integer_list_records() {
        let json = r#"[{"name": "toy", "input": 2, "output": 1, "s-box": [0, 1, 1, "0x0"]}]"#;
        let sboxes = parse_records(json).unwrap();
        assert_eq!(sboxes[0].output_bits(), 1);
        assert_eq!(sboxes[0].table(), &[0, 1, 1, 0]);
    }

    #[test]
    fn missing_entries_are_reported() {
        let json = r#"[{"name": "gap", "input": "2", "output": "2",
                        "s-box": {"0": "1", "1": "0", "2": "3", "7": "2"}}]"#;
        let err = parse_records(json).unwrap_err();
        assert!(matches!(err, RecordError::Field { .. }), "{err}");
    }

    #[test]
    fn out_of_range_values_are_reported() {
        let json = r#"[{"name": "wide", "input": "1", "output": "1", "s-box": ["0", "2"]}]"#;
        let err = parse_records(json).unwrap_err();
        assert!(matches!(
            err,
            RecordError::SBox(SBoxError::ValueOutOfRange { .. })
        ));
    }
}

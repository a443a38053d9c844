//! JSON rendering of ingestion records.
//!
//! Output is indented, multi-line, and deterministic: struct fields render in
//! declaration order and properties in key order, so the same record always
//! produces the same text.

use crate::error::SerializeError;
use crate::measurement::IngestionRecord;

/// Renders a record as indented JSON.
pub fn to_json(record: &IngestionRecord) -> Result<String, SerializeError> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Renders a record as indented JSON, UTF-8 encoded.
pub fn to_json_bytes(record: &IngestionRecord) -> Result<Vec<u8>, SerializeError> {
    Ok(serde_json::to_vec_pretty(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{
        MeasurementChannel, MeasurementGroup, Properties, Samples, UNTITLED,
    };

    fn record() -> IngestionRecord {
        let mut properties = Properties::new();
        properties.insert("wf_increment".into(), 0.001.into());
        properties.insert("unit_string".into(), "degC".into());
        IngestionRecord::Groups(vec![MeasurementGroup {
            group_name: UNTITLED.into(),
            channels: vec![MeasurementChannel {
                name: "Temp".into(),
                data: Samples::F64(vec![0.0, 1.5]),
                properties,
            }],
        }])
    }

    #[test]
    fn renders_indented_pascal_case_document() {
        let json = to_json(&record()).unwrap();
        let expected = r#"[
  {
    "GroupName": "Untitled",
    "Channels": [
      {
        "Name": "Temp",
        "Data": [
          0.0,
          1.5
        ],
        "Properties": {
          "unit_string": "degC",
          "wf_increment": 0.001
        }
      }
    ]
  }
]"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn bytes_match_text() {
        let record = record();
        assert_eq!(to_json_bytes(&record).unwrap(), to_json(&record).unwrap().into_bytes());
    }

    #[test]
    fn single_precision_magnitudes_render_short() {
        let record = IngestionRecord::Channel(MeasurementChannel {
            name: "Accel".into(),
            data: Samples::F32(vec![1.125, 0.5]),
            properties: Properties::new(),
        });
        let json = to_json(&record).unwrap();
        assert!(json.contains("1.125"));
        assert!(json.starts_with("{\n  \"Name\": \"Accel\""));
    }
}

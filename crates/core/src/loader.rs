//! Hospital data loading
//!
//! Records are decoded one at a time so a malformed entry is dropped with a
//! warning instead of failing the whole file. Duplicate ids keep the first
//! occurrence.

use crate::error::MapError;
use crate::model::Hospital;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Errors that make the whole document unusable
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read hospital data: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed hospital data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected an array of hospitals or an object with a \"hospitals\" array")]
    NotAnArray,
}

/// Result of decoding a hospital document
#[derive(Debug, Default)]
pub struct LoadedHospitals {
    /// Decoded records, in document order
    pub hospitals: Vec<Hospital>,

    /// One entry per dropped record
    pub rejected: Vec<MapError>,
}

/// Decode hospitals from a JSON document.
///
/// Accepts either a bare array or `{"hospitals": [...]}`.
pub fn parse_hospitals(json: &str) -> Result<LoadedHospitals, LoadError> {
    let document: Value = serde_json::from_str(json)?;
    let records = match document {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("hospitals") {
            Some(Value::Array(records)) => records,
            _ => return Err(LoadError::NotAnArray),
        },
        _ => return Err(LoadError::NotAnArray),
    };

    let mut loaded = LoadedHospitals::default();
    let mut seen = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let id = record_id(&record, index);
        match serde_json::from_value::<Hospital>(record) {
            Ok(hospital) if !seen.insert(hospital.id.clone()) => {
                tracing::warn!(id = %hospital.id, index, "duplicate hospital id, keeping first");
                loaded.rejected.push(MapError::validation(id, "duplicate id"));
            }
            Ok(hospital) => loaded.hospitals.push(hospital),
            Err(e) => {
                tracing::warn!(id = %id, index, error = %e, "skipping malformed hospital record");
                loaded.rejected.push(MapError::validation(id, e.to_string()));
            }
        }
    }

    tracing::debug!(
        loaded = loaded.hospitals.len(),
        rejected = loaded.rejected.len(),
        "hospital document decoded"
    );
    Ok(loaded)
}

/// Read and decode a hospital file
pub fn load_hospitals_file<P: AsRef<Path>>(path: P) -> Result<LoadedHospitals, LoadError> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_hospitals(&contents)
}

fn record_id(record: &Value, index: usize) -> String {
    match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => format!("#{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    #[test]
    fn test_bare_array() {
        let loaded = parse_hospitals(
            r#"[
                {"id":"1","lat":48.85,"lon":2.35,"status":"Deployed","name":"A","address":"Paris, France"},
                {"id":"2","lat":45.0,"lon":-1.0,"status":"Signed","name":"B","address":"Bordeaux, France"}
            ]"#,
        )
        .unwrap();

        assert_eq!(loaded.hospitals.len(), 2);
        assert_eq!(loaded.hospitals[1].status, Status::Signed);
        assert!(loaded.rejected.is_empty());
    }

    #[test]
    fn test_wrapped_object() {
        let loaded = parse_hospitals(
            r#"{"hospitals": [{"id":"1","lat":0,"lon":0,"status":"In Progress","name":"A","address":"X"}]}"#,
        )
        .unwrap();
        assert_eq!(loaded.hospitals.len(), 1);
    }

    #[test]
    fn test_bad_records_dropped_individually() {
        let loaded = parse_hospitals(
            r#"[
                {"id":"1","lat":48.85,"lon":2.35,"status":"Deployed","name":"A","address":"Paris, France"},
                {"id":"2","lat":"north","lon":2.35,"status":"Deployed","name":"B","address":"X"},
                {"id":"3","lat":1,"lon":2,"status":"Planned","name":"C","address":"X"},
                {"lat":1,"lon":2,"status":"Signed","name":"D","address":"X"},
                {"id":"1","lat":1,"lon":2,"status":"Signed","name":"E","address":"X"}
            ]"#,
        )
        .unwrap();

        assert_eq!(loaded.hospitals.len(), 1);
        assert_eq!(loaded.rejected.len(), 4);
        assert!(matches!(&loaded.rejected[2], MapError::Validation { id, .. } if id == "#3"));
        assert!(matches!(&loaded.rejected[3], MapError::Validation { reason, .. } if reason == "duplicate id"));
    }

    #[test]
    fn test_rejects_non_array_documents() {
        assert!(matches!(parse_hospitals(r#"{"data": []}"#), Err(LoadError::NotAnArray)));
        assert!(matches!(parse_hospitals("42"), Err(LoadError::NotAnArray)));
        assert!(matches!(parse_hospitals("[{"), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hospitals.json");
        fs::write(
            &path,
            r#"[{"id":"1","lat":48.85,"lon":2.35,"status":"Deployed","name":"A","address":"Paris, France"}]"#,
        )
        .unwrap();

        assert_eq!(load_hospitals_file(&path).unwrap().hospitals.len(), 1);
        assert!(matches!(
            load_hospitals_file(dir.path().join("missing.json")),
            Err(LoadError::Io(_))
        ));
    }
}

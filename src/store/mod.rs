use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

use crate::{EnrichError, Result};

/// One dataset entity (a video or a blog post), fields kept in file order.
pub type Record = Map<String, Value>;

/// Load an ordered sequence of records from a JSON array file
pub fn load(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Err(EnrichError::NotFound(path.to_path_buf()));
    }

    // Bytes, not a String, so invalid UTF-8 is reported as malformed content
    let content = fs_err::read(path)?;
    let records: Vec<Record> =
        serde_json::from_slice(&content).map_err(|e| EnrichError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    tracing::debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Overwrite `path` with the full record sequence.
///
/// The JSON is written to a sibling temporary file and renamed into place, so a reader
/// never observes a half-written snapshot. An existing file keeps its permissions.
pub fn save(path: &Path, records: &[Record]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs_err::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, records).map_err(|e| EnrichError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    file.flush()?;
    if let Ok(existing) = fs_err::metadata(path) {
        file.as_file().set_permissions(existing.permissions())?;
    }
    file.persist(path).map_err(|e| EnrichError::Io(e.error))?;

    Ok(())
}

/// Human-readable label of a record, used only for logging
pub fn label<'a>(record: &'a Record, field: &str) -> &'a str {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unnamed")
}

/// Text of a field if it is present and non-empty.
///
/// Numbers and booleans are rendered as text; null, arrays and objects are not text.
pub fn text_field(record: &Record, field: &str) -> Option<String> {
    value_text(record.get(field)?)
}

pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_preserves_order_and_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video-data.json");
        let original = r#"[
  {
    "zeta": "İstanbul'da girişim",
    "alpha": 1,
    "name_video": "日本語のタイトル",
    "nested": {
      "table_of_contents": [
        "b",
        "a"
      ],
      "whole_content": "Ünïcödé — text"
    }
  }
]"#;
        fs_err::write(&path, original).unwrap();

        let records = load(&path).unwrap();
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "name_video", "nested"]);

        save(&path, &records).unwrap();
        let written = fs_err::read_to_string(&path).unwrap();
        assert_eq!(written, original);
        assert!(!written.contains("\\u"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, EnrichError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");

        fs_err::write(&path, r#"{"name_video": "x"}"#).unwrap();
        assert!(matches!(load(&path), Err(EnrichError::Format { .. })));

        fs_err::write(&path, r#"[1, 2, 3]"#).unwrap();
        assert!(matches!(load(&path), Err(EnrichError::Format { .. })));

        fs_err::write(&path, "[{").unwrap();
        assert!(matches!(load(&path), Err(EnrichError::Format { .. })));
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.json");
        fs_err::write(&path, b"[{\"name_video\": \"\xff\xfe\"}]").unwrap();

        assert!(matches!(load(&path), Err(EnrichError::Format { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video-data.json");
        fs_err::write(&path, "[]").unwrap();
        fs_err::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let record = json!({"name_video": "x"}).as_object().cloned().unwrap();
        save(&path, &[record]).unwrap();

        let mode = fs_err::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translation").join("turkish").join("blog-data.json");
        let record = json!({"name_blog": "x"}).as_object().cloned().unwrap();

        save(&path, &[record]).unwrap();
        assert_eq!(load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_text_field() {
        let record = json!({"a": "  ", "b": "text", "c": 42, "d": null, "e": ["x"]})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(text_field(&record, "a"), None);
        assert_eq!(text_field(&record, "b").as_deref(), Some("text"));
        assert_eq!(text_field(&record, "c").as_deref(), Some("42"));
        assert_eq!(text_field(&record, "d"), None);
        assert_eq!(text_field(&record, "e"), None);
        assert_eq!(text_field(&record, "missing"), None);
        assert_eq!(label(&record, "b"), "text");
        assert_eq!(label(&record, "a"), "Unnamed");
    }
}

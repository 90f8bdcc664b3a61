use crate::error::{DedupError, Result};
use crate::hash::ImageHash;
use crate::similarity::Fingerprint;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

const IMAGE_HASH: &str = "image_hash";
const CAPTION: &str = "caption";

/// One (image, caption) record produced by the crawler.
///
/// The record is kept as the JSON object it was read from, so it is written
/// back with the same keys in the same order. Only `image_hash` and `caption`
/// are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Candidate {
    fields: Map<String, Value>,
}

impl Candidate {
    pub fn new(image_hash: Option<&str>, caption: Option<&str>) -> Self {
        let mut fields = Map::new();
        if let Some(hash) = image_hash {
            fields.insert(IMAGE_HASH.to_string(), hash.into());
        }
        if let Some(caption) = caption {
            fields.insert(CAPTION.to_string(), caption.into());
        }
        Self { fields }
    }

    /// Wrap a JSON object. `image_hash` and `caption` must be strings or null.
    pub fn from_object(fields: Map<String, Value>) -> Result<Self> {
        for key in [IMAGE_HASH, CAPTION] {
            match fields.get(key) {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(DedupError::InputMalformed(format!(
                        "{} must be a string or null, got {}",
                        key, other
                    )));
                }
            }
        }
        Ok(Self { fields })
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn image_hash(&self) -> Option<&str> {
        self.get_str(IMAGE_HASH)
    }

    pub fn caption(&self) -> Option<&str> {
        self.get_str(CAPTION)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.get_str("full_img_url")
    }

    pub fn caption_url(&self) -> Option<&str> {
        self.get_str("caption_url")
    }

    pub fn scrape_time(&self) -> Option<&str> {
        self.get_str("scrape_time")
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Parsed signals of this record. A hash that is not valid hex is malformed input.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        let hash = ImageHash::parse_field(self.image_hash()).map_err(|e| {
            DedupError::InputMalformed(format!(
                "invalid image_hash {:?}: {}",
                self.image_hash().unwrap_or_default(),
                e
            ))
        })?;
        Ok(Fingerprint::new(hash, self.caption().map(str::to_string)))
    }

    /// Short human-readable label for log lines.
    pub fn label(&self) -> String {
        self.image_url()
            .or(self.caption())
            .or(self.image_hash())
            .unwrap_or("<empty record>")
            .to_string()
    }
}

/// Pair every record with its parsed signals, failing on the first malformed one.
pub fn fingerprint_batch(batch: Vec<Candidate>) -> Result<Vec<(Candidate, Fingerprint)>> {
    batch
        .into_iter()
        .map(|candidate| {
            let fingerprint = candidate.fingerprint()?;
            Ok((candidate, fingerprint))
        })
        .collect()
}

/// Read a batch file: a JSON array of candidate objects.
pub fn load_batch(path: &Path) -> Result<Vec<Candidate>> {
    let raw = fs::read_to_string(path)?;
    parse_batch(&raw)
}

pub fn parse_batch(raw: &str) -> Result<Vec<Candidate>> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(DedupError::InputMalformed(
            "batch must be a JSON array of records".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let Value::Object(fields) = item else {
                return Err(DedupError::InputMalformed(format!(
                    "record {} is not a JSON object",
                    i
                )));
            };
            Candidate::from_object(fields).map_err(|e| match e {
                DedupError::InputMalformed(reason) => {
                    DedupError::InputMalformed(format!("record {}: {}", i, reason))
                }
                other => other,
            })
        })
        .collect()
}

/// Write a batch back out as pretty-printed JSON.
pub fn save_batch(path: &Path, batch: &[Candidate]) -> Result<()> {
    let json = serde_json::to_string_pretty(batch)?;
    fs::write(path, json + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_passthrough_fields_preserved() {
        let raw = r#"[{
            "full_img_url": "https://example.org/a.jpg",
            "caption_url": "https://example.org/a",
            "caption": "Storm hits coast",
            "scrape_time": "2024-03-01T10:00:00",
            "image_hash": "ffd8c0c0e0f0f8fc",
            "rank": 3
        }]"#;

        let batch = parse_batch(raw).unwrap();
        assert_eq!(batch.len(), 1);
        let record = &batch[0];
        assert_eq!(record.image_url(), Some("https://example.org/a.jpg"));
        assert_eq!(record.caption_url(), Some("https://example.org/a"));
        assert_eq!(record.scrape_time(), Some("2024-03-01T10:00:00"));
        assert_eq!(record.get("rank"), Some(&Value::from(3)));

        let back: Value = serde_json::to_value(&batch).unwrap();
        let original: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_records_written_back_unchanged() {
        let inputs = [
            r#"[{"full_img_url":"https://x/a.jpg","scrape_time":"t"}]"#,
            r#"[{"full_img_url":"u","caption":"c","image_hash":"00ff"}]"#,
            r#"[{"scrape_time":"t","image_hash":null,"caption_url":"v","caption":"Storm hits coast","rank":2}]"#,
        ];

        for raw in inputs {
            let batch = parse_batch(raw).unwrap();
            assert_eq!(serde_json::to_string(&batch).unwrap(), raw);
        }
    }

    #[test]
    fn test_new_omits_absent_signals() {
        let record = Candidate::new(None, Some("only a caption"));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"caption":"only a caption"}"#
        );
        assert_eq!(record.image_hash(), None);
    }

    #[test]
    fn test_missing_signals_are_none() {
        let batch = parse_batch(r#"[{"full_img_url": "x"}]"#).unwrap();
        let fp = batch[0].fingerprint().unwrap();
        assert!(fp.is_empty());
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(matches!(
            parse_batch(r#"{"caption": "x"}"#),
            Err(DedupError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_rejects_non_object_record() {
        assert!(matches!(
            parse_batch(r#"[{"caption": "x"}, 42]"#),
            Err(DedupError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_field_type() {
        assert!(matches!(
            parse_batch(r#"[{"caption": 7}]"#),
            Err(DedupError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_invalid_hash_is_malformed() {
        let record = Candidate::new(Some("not-hex"), Some("caption"));
        assert!(matches!(
            record.fingerprint(),
            Err(DedupError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_save_and_load_batch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batch.json");

        let batch = vec![
            Candidate::new(Some("00ff"), Some("first")).with_field("scrape_time", "t1"),
            Candidate::new(None, Some("second")),
        ];
        save_batch(&path, &batch).unwrap();

        let loaded = load_batch(&path).unwrap();
        assert_eq!(loaded, batch);
    }
}

//! Top-level field removal.
use std::collections::HashSet;

use crate::error::Error;
use crate::io::Record;
use crate::pipelines::RecordContext;

/// Fields kept when none are asked for.
pub const DEFAULT_FEATURES: &[&str] = &["text"];

/// Build a transform keeping only the `features` top-level fields of each record (and its `id`).
pub fn keep_features(
    features: HashSet<String>,
) -> impl Fn(Record, &RecordContext) -> Result<Option<Record>, Error> + Send + Sync {
    move |mut record: Record, _: &RecordContext| {
        record.retain_fields(&features);
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn only_listed_fields_remain() {
        let record = Record::from_line(
            r#"{"id":"1","text":"t","source":"wiki","metadata":{"license":"cc-by"},"url":"http://x"}"#,
        )
        .unwrap();
        let ctx = RecordContext {
            source: Path::new("00000_x.jsonl.gz"),
            line: 0,
        };

        let keep = keep_features(["text", "url"].iter().map(|s| s.to_string()).collect());
        let kept = keep(record, &ctx).unwrap().unwrap();
        assert_eq!(kept.to_line().unwrap(), r#"{"id":"1","text":"t","url":"http://x"}"#);
    }
}

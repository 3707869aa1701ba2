//! Default `GranulePayload` decoder: treats the body as JSON and considers
//! it "no data" only when it decodes to `null`, an empty array, or an empty
//! object — the shape a JSON-speaking granule service would use to report
//! an empty time slice (`downloader.py`'s `None` return for "no valid data
//! for this hour").

use anyhow::Result;

use crate::fetch::GranulePayload;

pub struct NaiveJsonPayload;

impl GranulePayload for NaiveJsonPayload {
    fn has_data(bytes: &[u8]) -> Result<bool> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let empty = match &value {
            serde_json::Value::Null => true,
            serde_json::Value::Array(a) => a.is_empty(),
            serde_json::Value::Object(o) => o.is_empty(),
            _ => false,
        };
        Ok(!empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_body_has_no_data() {
        assert!(!NaiveJsonPayload::has_data(b"null").unwrap());
    }

    #[test]
    fn empty_array_has_no_data() {
        assert!(!NaiveJsonPayload::has_data(b"[]").unwrap());
    }

    #[test]
    fn nonempty_object_has_data() {
        assert!(NaiveJsonPayload::has_data(br#"{"rows": [1, 2]}"#).unwrap());
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(NaiveJsonPayload::has_data(b"not json").is_err());
    }
}

//! Composite resource IDs.
//!
//! Most New Relic resources are identified by one or more integers joined
//! with `:` (for example `policyID:conditionID`). Components are parsed as
//! base-10 integers that must fit in 32 bits.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ProviderError;
use crate::schema::{AttributeType, Schema};

/// Separator between ID components.
pub const ID_SEPARATOR: char = ':';

/// Join integer IDs with `:`.
pub fn serialize_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse exactly `count` integer components.
///
/// The input is split into at most `count` parts, so a trailing component
/// that itself contains `:` fails integer parsing rather than being dropped.
pub fn parse_ids(serialized: &str, count: usize) -> Result<Vec<i64>, ProviderError> {
    let parts: Vec<&str> = serialized.splitn(count.max(1), ID_SEPARATOR).collect();
    if parts.len() != count {
        return Err(ProviderError::InvalidId(format!(
            "unable to parse ID {}",
            serialized
        )));
    }
    parts.into_iter().map(parse_component).collect()
}

/// Parse any number of integer components.
pub fn parse_hashed_ids(serialized: &str) -> Result<Vec<i64>, ProviderError> {
    serialized.split(ID_SEPARATOR).map(parse_component).collect()
}

/// Split an import ID of the form `x:y`.
pub fn parse_composite_id(id: &str) -> Result<(String, String), ProviderError> {
    match id.split_once(ID_SEPARATOR) {
        Some((left, right)) => Ok((left.to_string(), right.to_string())),
        None => Err(ProviderError::InvalidId(
            "Import composite ID requires two parts separated by colon, eg x:y".to_string(),
        )),
    }
}

fn parse_component(part: &str) -> Result<i64, ProviderError> {
    part.parse::<i32>()
        .map(i64::from)
        .map_err(|err| ProviderError::InvalidId(format!("unable to parse ID {}: {}", part, err)))
}

/// Normalise an import ID that may carry one trailing metadata component.
///
/// With `default_count` components the ID is used as is. With one more, the
/// trailing part is written into `attribute` of the returned state skeleton
/// (as an integer when the schema declares `attribute` as int64) and the ID
/// is rebuilt from the leading components. Fewer components is an error.
pub fn import_with_metadata(
    id: &str,
    default_count: usize,
    attribute: &str,
    schema: &Schema,
) -> Result<Value, ProviderError> {
    let mut state = Map::new();
    if default_count == 0 {
        state.insert("id".to_string(), Value::String(id.to_string()));
        return Ok(Value::Object(state));
    }

    let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
    if parts.len() < default_count {
        return Err(ProviderError::InvalidId(
            "compound ID item count cannot be less than expected default ID item count"
                .to_string(),
        ));
    }
    if parts.len() == default_count {
        state.insert("id".to_string(), Value::String(id.to_string()));
        return Ok(Value::Object(state));
    }

    let (leading, metadata) = parts.split_at(parts.len() - 1);
    let metadata = metadata[0];
    let metadata_value = match schema.block.attributes.get(attribute).map(|a| &a.attr_type) {
        Some(AttributeType::Int64) => Value::from(parse_component(metadata)?),
        _ => Value::String(metadata.to_string()),
    };
    state.insert(attribute.to_string(), metadata_value);

    let ids = leading
        .iter()
        .map(|part| parse_component(part))
        .collect::<Result<Vec<_>, _>>()?;
    state.insert("id".to_string(), Value::String(serialize_ids(&ids)));
    Ok(Value::Object(state))
}

/// XOR mask for grant ID lists: the first 16 bytes of SHA-256 of a fixed label.
static GRANT_ID_KEY: Lazy<[u8; 16]> = Lazy::new(|| {
    let digest = Sha256::digest(b"newrelic-fleet-grant-v1");
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
});

fn mask(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .zip(GRANT_ID_KEY.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Pack a list of grant IDs into one opaque ID.
///
/// The IDs are joined with `:`, XOR-masked with a fixed key, hex encoded and
/// then base64 encoded. This hides the list shape; it is not encryption.
pub fn encode_grant_ids<S: AsRef<str>>(ids: &[S]) -> String {
    let joined = ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(":");
    STANDARD.encode(hex::encode(mask(joined.as_bytes())))
}

/// Reverse [`encode_grant_ids`].
pub fn decode_grant_ids(encoded: &str) -> Result<Vec<String>, ProviderError> {
    let hex_encoded = STANDARD
        .decode(encoded)
        .map_err(|err| ProviderError::InvalidId(format!("failed to decode base64: {}", err)))?;
    let masked = hex::decode(&hex_encoded)
        .map_err(|err| ProviderError::InvalidId(format!("failed to decode hex: {}", err)))?;
    let joined = String::from_utf8(mask(&masked))
        .map_err(|err| ProviderError::InvalidId(format!("failed to decode grant IDs: {}", err)))?;
    Ok(joined.split(ID_SEPARATOR).map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_serialize_ids() {
        assert_eq!(serialize_ids(&[123, 456]), "123:456");
        assert_eq!(serialize_ids(&[7]), "7");
        assert_eq!(serialize_ids(&[]), "");
    }

    #[test]
    fn test_parse_ids_round_trip() {
        for (input, count) in [("1", 1), ("123:456", 2), ("1:22:333", 3), ("-5:0", 2)] {
            let ids = parse_ids(input, count).unwrap();
            assert_eq!(serialize_ids(&ids), input);
        }
    }

    #[test]
    fn test_parse_ids_rejects_wrong_count() {
        assert!(parse_ids("12", 2).is_err());
        assert!(parse_ids("a:b", 2).is_err());
        assert!(parse_ids("1:2:3", 2).is_err());

        let err = parse_ids("12", 2).unwrap_err();
        assert_eq!(err.message(), "unable to parse ID 12");
    }

    #[test]
    fn test_parse_ids_rejects_out_of_range() {
        assert!(parse_ids("2147483648", 1).is_err());
        assert_eq!(parse_ids("2147483647", 1).unwrap(), vec![2147483647]);
    }

    #[test]
    fn test_parse_hashed_ids() {
        assert_eq!(parse_hashed_ids("1:2:3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_hashed_ids("42").unwrap(), vec![42]);
        assert!(parse_hashed_ids("123:abc").is_err());
        assert!(parse_hashed_ids("").is_err());
    }

    #[test]
    fn test_parse_composite_id() {
        assert_eq!(
            parse_composite_id("abc:def").unwrap(),
            ("abc".to_string(), "def".to_string())
        );
        assert_eq!(
            parse_composite_id("a:b:c").unwrap(),
            ("a".to_string(), "b:c".to_string())
        );
        let err = parse_composite_id("abc").unwrap_err();
        assert!(err.message().contains("requires two parts"));
    }

    fn account_schema() -> Schema {
        Schema::v0()
            .with_attribute("account_id", Attribute::optional_computed_int64())
            .with_attribute("region", Attribute::optional_string())
    }

    #[test]
    fn test_import_with_metadata_exact_count() {
        let state = import_with_metadata("123", 1, "account_id", &account_schema()).unwrap();
        assert_eq!(state, json!({"id": "123"}));
    }

    #[test]
    fn test_import_with_metadata_trailing_account() {
        let state = import_with_metadata("123:999", 1, "account_id", &account_schema()).unwrap();
        assert_eq!(state, json!({"id": "123", "account_id": 999}));

        let state = import_with_metadata("1:2:us01", 2, "region", &account_schema()).unwrap();
        assert_eq!(state, json!({"id": "1:2", "region": "us01"}));
    }

    #[test]
    fn test_import_with_metadata_too_few_parts() {
        let err = import_with_metadata("123", 2, "account_id", &account_schema()).unwrap_err();
        assert_eq!(
            err.message(),
            "compound ID item count cannot be less than expected default ID item count"
        );
    }

    #[test]
    fn test_import_with_metadata_disabled() {
        let state = import_with_metadata("anything:goes", 0, "account_id", &account_schema())
            .unwrap();
        assert_eq!(state, json!({"id": "anything:goes"}));
    }

    #[test]
    fn test_grant_id_codec_round_trip() {
        for ids in [vec!["1"], vec!["101", "202", "303"], vec!["9876543210", "0"]] {
            let encoded = encode_grant_ids(&ids);
            assert_eq!(decode_grant_ids(&encoded).unwrap(), ids);
        }
    }

    #[test]
    fn test_grant_id_codec_is_opaque() {
        let encoded = encode_grant_ids(&["101", "202"]);
        assert!(!encoded.contains("101"));
        assert!(!encoded.contains(':'));
        // 7 bytes, 14 hex digits, 20 base64 characters
        assert_eq!(encoded.len(), 20);
    }

    #[test]
    fn test_decode_grant_ids_errors() {
        let err = decode_grant_ids("***").unwrap_err();
        assert!(err.message().starts_with("failed to decode base64: "));

        let not_hex = STANDARD.encode("zz");
        let err = decode_grant_ids(&not_hex).unwrap_err();
        assert!(err.message().starts_with("failed to decode hex: "));
    }
}

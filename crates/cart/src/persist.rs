//! Persisted cart format.

use common::ProductId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key under which the cart lines are stored.
pub const CART_STORAGE_KEY: &str = "cart";

/// Key under which the checkout nonce is stored.
pub const CART_NONCE_STORAGE_KEY: &str = "cart_checkout_nonce";

/// One persisted cart entry. Only the product reference and quantity are
/// kept; product details are looked up again on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Parses the stored line array. Anything unreadable is `None`.
pub(crate) fn decode_lines(raw: &str) -> Option<Vec<PersistedLine>> {
    serde_json::from_str(raw).ok()
}

pub(crate) fn encode_lines(lines: &[PersistedLine]) -> Result<String, serde_json::Error> {
    serde_json::to_string(lines)
}

pub(crate) fn decode_nonce(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_lines_use_camel_case() {
        let json = encode_lines(&[PersistedLine {
            product_id: ProductId::new("SKU-001"),
            quantity: 2,
        }])
        .unwrap();
        assert_eq!(json, r#"[{"productId":"SKU-001","quantity":2}]"#);
    }

    #[test]
    fn malformed_input_decodes_to_none() {
        assert!(decode_lines("not json").is_none());
        assert!(decode_lines(r#"{"productId":"A"}"#).is_none());
        assert!(decode_lines(r#"[{"productId":"A","quantity":-1}]"#).is_none());
        assert!(decode_nonce("nope").is_none());
    }
}

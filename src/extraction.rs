//! Parsing of the vision model's output into a normalized extraction.
//!
//! The model's response is untrusted input: missing fields fall back to
//! documented defaults, while non-JSON or mistyped payloads are rejected
//! so the caller can report an extraction error instead of crashing.

use crate::db::{LineItem, NewReceipt};
use serde::Deserialize;

/// Store name used when the model could not read one.
pub const DEFAULT_STORE_NAME: &str = "Unknown";

/// Currency assumed when the receipt does not state one.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Structured data returned by the vision model for one receipt image.
///
/// Transient: this is mapped into a [`NewReceipt`] and never persisted
/// directly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptExtraction {
    #[serde(default = "default_store_name")]
    pub store_name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub ai_summary: String,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl ReceiptExtraction {
    /// Map the extraction into receipt fields ready for insertion.
    pub fn into_new_receipt(self) -> NewReceipt {
        NewReceipt {
            store_name: self.store_name,
            transaction_date: self.date,
            total_amount: self.total_amount,
            currency: self.currency,
            items: self.items,
            ai_summary: self.ai_summary,
        }
    }
}

/// Parse the raw completion text into a [`ReceiptExtraction`].
pub fn parse_extraction(raw: &str) -> Result<ReceiptExtraction, serde_json::Error> {
    serde_json::from_str(raw.trim())
}

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Currency label stamped on every record unless the source says otherwise.
pub const DEFAULT_CURRENCY: &str = "RS";

#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("Receipt payload is not a JSON object")]
    NotAnObject,
    #[error("Receipt payload does not match schema: {0}")]
    Schema(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub description: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total: Option<f64>,
}

impl LineItem {
    /// An item known only by its description and line total.
    pub fn priced(description: impl Into<String>, total: f64) -> Self {
        Self {
            description: description.into(),
            quantity: None,
            unit_price: None,
            total: Some(total),
        }
    }
}

/// Structured financial data for one receipt. Every field is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptRecord {
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub merchant_address: Option<String>,
    /// Kept verbatim as it appeared on the receipt; never interpreted as a calendar date.
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub additional_fields: Map<String, Value>,
}

impl Default for ReceiptRecord {
    fn default() -> Self {
        Self {
            merchant_name: None,
            merchant_address: None,
            purchase_date: None,
            subtotal: None,
            tax: None,
            total: None,
            payment_method: None,
            currency: default_currency(),
            line_items: Vec::new(),
            additional_fields: Map::new(),
        }
    }
}

impl ReceiptRecord {
    /// Shape the JSON object returned by a vision model into a record.
    ///
    /// Numeric fields accept numbers or numeric strings (`"$1,234.50"`);
    /// anything unusable, including negative values, is dropped to `None`.
    pub fn from_payload(payload: Value) -> Result<Self, CoerceError> {
        if !payload.is_object() {
            return Err(CoerceError::NotAnObject);
        }
        Ok(serde_json::from_value(payload)?)
    }

    /// Whether the record carries either of the two fields a reader looks at first.
    pub fn has_headline(&self) -> bool {
        let has_merchant = self.merchant_name.as_deref().is_some_and(|m| !m.is_empty());
        let has_total = self.total.is_some_and(|t| t != 0.0);
        has_merchant || has_total
    }
}

/// Body returned for one analysed upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeResponse {
    pub parsed: Option<ReceiptRecord>,
    /// Cleaned model output the record was decoded from.
    pub raw_text: Option<String>,
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

fn default_currency() -> Option<String> {
    Some(DEFAULT_CURRENCY.to_string())
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let clean = s.trim().trim_start_matches('$').replace(',', "");
            clean.trim().parse::<f64>().ok()
        }
        _ => None,
    };
    Ok(amount.filter(|a| a.is_finite() && *a >= 0.0))
}

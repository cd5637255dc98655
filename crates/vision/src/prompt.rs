/// Instruction sent with every receipt image. The schema mirrors the
/// serialized `ReceiptRecord` so the reply can be decoded directly.
pub const PROMPT: &str = "\
You are an expert OCR post-processor. Given a receipt image, respond with a JSON object
strictly following this schema: {
  \"merchant_name\": string|null,
  \"merchant_address\": string|null,
  \"purchase_date\": string|null,
  \"subtotal\": number|null,
  \"tax\": number|null,
  \"total\": number|null,
  \"payment_method\": string|null,
  \"currency\": string|null,
  \"line_items\": [ {
      \"description\": string,
      \"quantity\": number|null,
      \"unit_price\": number|null,
      \"total\": number|null
    } ],
  \"additional_fields\": object (misc fields)
}.
Return only JSON with no prose.";

/// User turn accompanying the image for chat-style providers.
pub const USER_MESSAGE: &str = "Here is the receipt image. Extract structured data.";

use std::sync::OnceLock;

use regex::Regex;
use tillscan_core::{LineItem, ReceiptRecord};

/// Only the first this-many priced lines make it into a record.
pub const MAX_LINE_ITEMS: usize = 20;

/// The merchant header is looked for in this many leading lines.
const MERCHANT_SCAN_LINES: usize = 5;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_leading_date,
    r"^\d+[/-]\d+");

// Dates may touch letters ("INV12/25/2024", "2024-08-16T14:22") but not
// other digits, so a year-first date is never read as a two-digit-year one.
re!(re_date_numeric,
    r"(?:^|\D)(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})(?:\D|$)");
re!(re_date_year_first,
    r"(?:^|\D)(\d{4}[/-]\d{1,2}[/-]\d{1,2})(?:\D|$)");

re!(re_total,
    r"(?i)total[:\s]*\$?([\d,]+\.?\d*)");
re!(re_amount,
    r"(?i)amount[:\s]*\$?([\d,]+\.?\d*)");
re!(re_grand_total,
    r"(?i)grand\s+total[:\s]*\$?([\d,]+\.?\d*)");
re!(re_subtotal,
    r"(?i)subtotal[:\s]*\$?([\d,]+\.?\d*)");
re!(re_tax,
    r"(?i)tax[:\s]*\$?([\d,]+\.?\d*)");

re!(re_trailing_price,
    r"\$?([\d,]+\.\d{2})\s*$");

re!(re_address,
    r"(?i)(\d+\s+[\w\s]+(?:street|st|avenue|ave|road|rd|boulevard|blvd|drive|dr|lane|ln)[\w\s,]*\d{5})");

// ── Priority tables ──────────────────────────────────────────────────────────

/// Date shapes, tried in order against the original-case text.
const DATE_PATTERNS: [fn() -> &'static Regex; 2] = [re_date_numeric, re_date_year_first];

/// Total labels, tried in order; the first one that yields a number wins.
const TOTAL_PATTERNS: [fn() -> &'static Regex; 3] = [re_total, re_amount, re_grand_total];

/// Keyword → display label. Order is the tie-break when a receipt mentions
/// several (e.g. "credit" beats "visa").
pub const PAYMENT_KEYWORDS: [(&str, &str); 7] = [
    ("cash", "Cash"),
    ("credit", "Credit Card"),
    ("debit", "Debit Card"),
    ("visa", "Visa"),
    ("mastercard", "Mastercard"),
    ("amex", "American Express"),
    ("paypal", "PayPal"),
];

// ── Public extraction API ────────────────────────────────────────────────────

/// OCR text split into the two views every extractor works from.
struct Normalized<'a> {
    raw: &'a str,
    lines: Vec<&'a str>,
    lower: String,
}

impl<'a> Normalized<'a> {
    fn new(raw: &'a str) -> Self {
        let lines = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        Self { raw, lines, lower: raw.to_lowercase() }
    }
}

pub struct Extractor;

impl Extractor {
    /// Heuristically rebuild a receipt from raw OCR text.
    ///
    /// Never fails: a field that cannot be found is simply left empty.
    pub fn extract(ocr_text: &str) -> ReceiptRecord {
        if ocr_text.is_empty() {
            return ReceiptRecord::default();
        }

        let text = Normalized::new(ocr_text);
        let line_items = Self::extract_line_items(&text.lines);

        tracing::debug!(
            lines = text.lines.len(),
            line_items = line_items.len(),
            "Parsed OCR text"
        );

        ReceiptRecord {
            merchant_name: Self::extract_merchant(&text.lines),
            merchant_address: Self::extract_address(text.raw),
            purchase_date: Self::extract_date(text.raw),
            subtotal: labeled_amount(re_subtotal(), &text.lower),
            tax: labeled_amount(re_tax(), &text.lower),
            total: Self::extract_total(&text.lower),
            payment_method: Self::extract_payment_method(&text.lower),
            line_items,
            ..ReceiptRecord::default()
        }
    }

    // ── Merchant ──────────────────────────────────────────────────────────────

    fn extract_merchant(lines: &[&str]) -> Option<String> {
        lines
            .iter()
            .take(MERCHANT_SCAN_LINES)
            .find(|l| l.chars().count() > 2 && !re_leading_date().is_match(l))
            .map(|l| l.to_string())
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    fn extract_date(text: &str) -> Option<String> {
        DATE_PATTERNS.iter().find_map(|pattern| {
            let c = pattern().captures(text)?;
            Some(c.get(1)?.as_str().to_string())
        })
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    fn extract_total(lower: &str) -> Option<f64> {
        TOTAL_PATTERNS
            .iter()
            .find_map(|pattern| labeled_amount(pattern(), lower))
    }

    // ── Payment method ────────────────────────────────────────────────────────

    fn extract_payment_method(lower: &str) -> Option<String> {
        PAYMENT_KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, label)| label.to_string())
    }

    // ── Address ──────────────────────────────────────────────────────────────

    fn extract_address(text: &str) -> Option<String> {
        let c = re_address().captures(text)?;
        Some(c.get(1)?.as_str().trim().to_string())
    }

    // ── Line items ────────────────────────────────────────────────────────────

    fn extract_line_items(lines: &[&str]) -> Vec<LineItem> {
        lines
            .iter()
            .filter(|l| l.chars().count() >= 3)
            .filter_map(|l| line_item(l))
            .take(MAX_LINE_ITEMS)
            .collect()
    }
}

/// A line ending in a price becomes an item: the price is its total and
/// whatever precedes it is the description.
fn line_item(line: &str) -> Option<LineItem> {
    let c = re_trailing_price().captures(line)?;
    let price = parse_amount_str(c.get(1)?.as_str())?;
    let description = line[..c.get(0)?.start()].trim();
    if description.is_empty() || price <= 0.0 {
        return None;
    }
    Some(LineItem::priced(description, price))
}

/// First match of a label pattern, parsed. A token that does not parse
/// leaves the field empty; later matches are not consulted.
fn labeled_amount(pattern: &Regex, text: &str) -> Option<f64> {
    let c = pattern.captures(text)?;
    parse_amount_str(c.get(1)?.as_str())
}

// ── Amount parsing ────────────────────────────────────────────────────────────

fn parse_amount_str(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

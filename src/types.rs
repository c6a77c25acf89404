//! Request/response shapes for the HTTP layer, plus the input normalization
//! they need (request dates, owner names).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const STATUS_FOUND: &str = "PDF_FOUND_SUCCESSFULLY";
pub const STATUS_NOT_FOUND: &str = "DATA_NOT_FOUND";
pub const STATUS_ERROR: &str = "ERROR";

// ── Search by party ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PartySearchRequest {
    pub party_name: Option<String>,
    pub township: Option<String>,
    pub from_date: Option<String>,
    pub file_number: Option<serde_json::Value>,
    pub site_url: Option<String>,
    pub folder_name: Option<String>,
    pub county: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PartySearchResponse {
    pub status: &'static str,
    pub party_name: String,
    pub file_number: String,
    pub from_date: String,
    pub to_date: String,
    pub total_downloaded: usize,
}

// ── Search by town/lot/block ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TownLotBlockRequest {
    pub township: Option<String>,
    pub lot: Option<serde_json::Value>,
    pub block: Option<serde_json::Value>,
    pub party_name: Option<String>,
    pub date: Option<String>,
    pub file_number: Option<serde_json::Value>,
    pub site_url: Option<String>,
    pub county: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TownLotBlockResponse {
    pub status: &'static str,
    pub file_count: usize,
}

// ── Extraction by file number ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub file_number: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR,
            message: message.into(),
        }
    }
}

/// File numbers arrive as JSON strings or numbers; flatten either to a
/// trimmed string.
pub fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Input normalization ─────────────────────────────────────────────────────

/// Normalize a request date to the portal's `MM/DD/YYYY` form.
///
/// Accepts `MM/DD/YYYY`, `MM-DD-YYYY`, `DD/MM/YYYY` and ISO `YYYY-MM-DD`.
pub fn normalize_request_date(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    for fmt in ["%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d.format("%m/%d/%Y").to_string());
        }
    }
    anyhow::bail!("Invalid date format: {raw}")
}

/// Today's date in portal form, used as the default `to_date`.
pub fn today_portal_date() -> String {
    chrono::Local::now().format("%m/%d/%Y").to_string()
}

const ENTITY_KEYWORDS: &[&str] = &[
    "LLC", "INC", "CORP", "COMPANY", "CO", "TRUST", "CHURCH", "FBO", "/",
];

/// Reorder a person's name to the "LAST FIRST" form the portal indexes by.
///
/// Entity names (companies, trusts, multi-party strings with a slash) are
/// left untouched; keyword matching is word-bounded so "VINCENZO" does not
/// count as "INC".
pub fn format_owner_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }

    let upper = name.to_uppercase();
    for keyword in ENTITY_KEYWORDS {
        if *keyword == "/" {
            if upper.contains('/') {
                return name.to_string();
            }
            continue;
        }
        let matched = upper
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == *keyword);
        if matched {
            return name.to_string();
        }
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.len() {
        2 => format!("{} {}", parts[1], parts[0]),
        n if n >= 3 => format!("{} {}", parts[n - 1], parts[0]),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_date_accepts_common_formats() {
        assert_eq!(normalize_request_date("01/05/2024").unwrap(), "01/05/2024");
        assert_eq!(normalize_request_date("1-5-2024").unwrap(), "01/05/2024");
        assert_eq!(normalize_request_date("2024-01-05").unwrap(), "01/05/2024");
    }

    #[test]
    fn request_date_rejects_garbage() {
        assert!(normalize_request_date("not a date").is_err());
        assert!(normalize_request_date("").is_err());
    }

    #[test]
    fn owner_name_flips_person_names() {
        assert_eq!(format_owner_name("John Smith"), "Smith John");
        assert_eq!(format_owner_name("John Michael Smith"), "Smith John");
    }

    #[test]
    fn owner_name_keeps_entities_verbatim() {
        assert_eq!(format_owner_name("ACME HOLDINGS LLC"), "ACME HOLDINGS LLC");
        assert_eq!(format_owner_name("SMITH / JONES"), "SMITH / JONES");
        // Word boundary: VINCENZO must not match INC
        assert_eq!(format_owner_name("Vincenzo Rossi"), "Rossi Vincenzo");
    }

    #[test]
    fn owner_name_single_token_passthrough() {
        assert_eq!(format_owner_name("Madonna"), "Madonna");
    }

    #[test]
    fn value_to_string_handles_numbers_and_strings() {
        assert_eq!(
            value_to_string(&serde_json::json!("12345")),
            Some("12345".to_string())
        );
        assert_eq!(
            value_to_string(&serde_json::json!(12345)),
            Some("12345".to_string())
        );
        assert_eq!(value_to_string(&serde_json::json!(" ")), None);
        assert_eq!(value_to_string(&serde_json::json!(null)), None);
    }
}

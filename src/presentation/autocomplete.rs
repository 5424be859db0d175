//! Bank search behind text lines with an autocomplete action.
//!
//! The search posts `complete-bankcodes` requests through the regular
//! transport. Input that starts like an IBAN is not searched, the user types
//! the IBAN in full instead.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::definitions::{Action, Payload};

/// Country used when no select line on the page carries a selection.
pub const DEFAULT_COUNTRY_ID: &str = "DE";
/// Number of suggestions requested per search.
pub const SUGGESTION_COUNT: u64 = 5;
/// Pause in typing before a search is sent.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(400);
/// Longest input still accepted as an IBAN.
pub const MAX_IBAN_LEN: usize = 36;

static STARTS_AS_IBAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z]{2}[0-9]{2}").unwrap());

static VALID_IBAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{2}\d{2}[a-zA-Z0-9]{12,32}").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("autocomplete response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// How the search field treats what the user typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchInput {
    /// A bank name, code or BIC fragment to search for.
    Query,
    /// Starts like an IBAN but is not complete yet.
    IncompleteIban,
    /// A complete IBAN the user may confirm directly.
    Iban,
    IbanTooLong,
}

impl SearchInput {
    pub fn classify(input: &str) -> Self {
        if !STARTS_AS_IBAN.is_match(input) {
            SearchInput::Query
        } else if !VALID_IBAN.is_match(input) {
            SearchInput::IncompleteIban
        } else if input.chars().count() > MAX_IBAN_LEN {
            SearchInput::IbanTooLong
        } else {
            SearchInput::Iban
        }
    }

    /// Whether a request should be sent for this input.
    pub fn is_searchable(&self) -> bool {
        matches!(self, SearchInput::Query)
    }
}

pub fn request(query: &str, country_id: &str) -> Payload {
    Payload::new()
        .with("bank_code", query)
        .with("country_id", country_id)
        .with("count", SUGGESTION_COUNT)
        .with_action(Action::CompleteBankcodes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub name: String,
    pub city: String,
    pub bank_code: String,
    pub bic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    /// Value the search field takes when the suggestion is picked.
    pub value: String,
    #[serde(rename = "object")]
    pub bank: Bank,
}

#[derive(Deserialize)]
struct Root {
    autocomplete: Data,
}

#[derive(Deserialize)]
struct Data {
    data: Vec<Suggestion>,
}

pub fn parse_suggestions(bytes: &[u8]) -> Result<Vec<Suggestion>, Error> {
    let root: Root = serde_json::from_slice(bytes)?;
    Ok(root.autocomplete.data)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_input() {
        assert_eq!(SearchInput::classify("Sparkasse"), SearchInput::Query);
        assert_eq!(SearchInput::classify("37040044"), SearchInput::Query);
        assert_eq!(SearchInput::classify("DE89"), SearchInput::IncompleteIban);
        assert_eq!(
            SearchInput::classify("DE89370400440532013000"),
            SearchInput::Iban
        );
        assert_eq!(
            SearchInput::classify("DE89370400440532013000123456789012345"),
            SearchInput::IbanTooLong
        );
        assert!(!SearchInput::classify("de89").is_searchable());
    }

    #[test]
    fn request_payload() {
        let payload = request("370", "AT");
        assert_eq!(payload.action(), Some("complete-bankcodes"));
        assert_eq!(payload.get("bank_code"), Some(&"370".into()));
        assert_eq!(payload.get("country_id"), Some(&"AT".into()));
        assert_eq!(payload.get("count"), Some(&5.into()));
    }

    #[test]
    fn suggestions() {
        let body = br#"{"autocomplete": {"data": [{
            "label": "Commerzbank (Koeln)",
            "value": "37040044",
            "object": {"name": "Commerzbank", "city": "Koeln", "bank_code": "37040044", "bic": "COBADEFFXXX"}
        }]}}"#;
        let suggestions = parse_suggestions(body).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].value, "37040044");
        assert_eq!(suggestions[0].bank.bic, "COBADEFFXXX");

        assert!(parse_suggestions(b"{\"form\": []}").is_err());
    }
}

//! Record Parser: turns raw portal responses into structured records.
//!
//! All TL1 deployments speak the same JSON dialect, so the parsing helpers
//! are shared; per-institution knowledge stays in the `Location` tables.
//! Parsing is deterministic and fails with [`KartenError::Parse`] when an
//! expected structural marker is absent, which usually means the portal
//! changed its layout and the adapter needs an update.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::location::Location;
use crate::domain::model::{ApiCredentials, CardInfo, CardStatus};
use crate::utils::error::{KartenError, Result};

/// Decode a TL1 response body into a list of records. The services always
/// wrap their payload in a JSON array, even for single-object answers.
pub fn decode_records<T: DeserializeOwned>(
    location: Location,
    operation: &'static str,
    body: &str,
) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        KartenError::parse(
            location,
            operation,
            format!("response is not JSON ({e}): {}", snippet(body)),
        )
    })?;
    let Value::Array(items) = value else {
        return Err(KartenError::parse(
            location,
            operation,
            format!("expected a JSON array, got: {}", snippet(body)),
        ));
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| {
                KartenError::parse(location, operation, format!("bad record: {e}"))
            })
        })
        .collect()
}

/// Decode the first record of a one-element array response (LOGIN, KARTE).
pub fn decode_first_record<T: DeserializeOwned>(
    location: Location,
    operation: &'static str,
    body: &str,
) -> Result<T> {
    let mut records: Vec<T> = decode_records(location, operation, body)?;
    if records.is_empty() {
        return Err(KartenError::parse(
            location,
            operation,
            "expected a one-element array, got an empty one",
        ));
    }
    Ok(records.remove(0))
}

/// Parse a currency amount as the portals print it: German decimal comma
/// with optional thousands dots and euro sign ("1.234,56 €"), or plain
/// dot-decimal ("-3.50") as the JSON endpoints emit.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw
        .trim()
        .trim_end_matches('€')
        .trim_end_matches("EUR")
        .replace('\u{a0}', " ");
    let cleaned = cleaned.trim();
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.to_string()
    };
    Decimal::from_str(&normalized).ok()
}

/// Parse a portal timestamp (`dd.mm.yyyy HH:MM`, occasionally with
/// seconds, or date-only). The portals report local wall time without an
/// offset, hence the naive type.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%d.%m.%Y %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%d.%m.%Y %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%d.%m.%Y")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Format a date the way the portals expect their query parameters.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Extract the application credentials a portal publishes inside its
/// JavaScript app (`dataprovider.js`). The values are plain object-literal
/// members, so regular expressions are enough; a missing marker means the
/// portal restructured the app.
pub fn extract_api_credentials(location: Location, js_src: &str) -> Result<ApiCredentials> {
    let capture = |name: &'static str, pattern: &str| -> Result<String> {
        let re = Regex::new(pattern).unwrap();
        re.captures(js_src)
            .map(|c| c[1].to_string())
            .ok_or_else(|| {
                KartenError::parse(
                    location,
                    "credential discovery",
                    format!("marker {name} not found in dataprovider.js"),
                )
            })
    };
    Ok(ApiCredentials {
        client_id: capture("authClientId", r"authClientId:\s*([0-9]+),")?,
        reg_key: capture("authRegKey", r#"authRegKey:\s*"([a-zA-Z0-9]+)""#)?,
        header: capture("authHeader", r#"authHeader:\s*"(Basic\s[a-zA-Z0-9=]+)""#)?,
        user: capture("authUsername", r#"authUsername:\s*"([a-zA-Z0-9]+)""#)?,
        password: capture("authPassword", r#"authPassword:\s*"([a-zA-Z0-9]+)""#)?,
    })
}

/// Find a labeled balance ("Saldo: 12,34 €") in a markup body. Fallback
/// for deployments that answer the card query with an HTML fragment
/// instead of JSON.
pub fn extract_labeled_balance(body: &str) -> Option<Decimal> {
    let re = Regex::new(r"(?i)(?:Saldo|Guthaben|Kontostand)\s*:?\s*(-?\d[\d.,]*)\s*€?").unwrap();
    re.captures(body).and_then(|c| parse_amount(&c[1]))
}

/// Wire shape of a KARTE record. The portals never documented this
/// schema, so every field is tolerated as absent and the known German
/// spellings are accepted as aliases.
#[derive(Debug, Deserialize)]
struct CardInfoWire {
    #[serde(default, rename = "karteNr", alias = "kartenNr")]
    card_number: Option<Value>,
    #[serde(default, rename = "inhaber", alias = "name")]
    holder: Option<String>,
    #[serde(default, rename = "kontoStand", alias = "saldo", alias = "guthaben")]
    balance: Option<Value>,
    #[serde(default, rename = "gesperrt", alias = "locked")]
    locked: Option<Value>,
}

/// Decode a card info response: JSON-first, with a defensive fallback
/// that scrapes a labeled balance out of markup bodies.
pub fn decode_card_info(
    location: Location,
    operation: &'static str,
    card_number: &str,
    body: &str,
) -> Result<CardInfo> {
    if let Ok(wire) = decode_first_record::<CardInfoWire>(location, operation, body) {
        let balance = wire
            .balance
            .as_ref()
            .and_then(amount_from_value)
            .or_else(|| extract_labeled_balance(body))
            .ok_or_else(|| {
                KartenError::parse(
                    location,
                    operation,
                    format!("card record carries no balance: {}", snippet(body)),
                )
            })?;
        return Ok(CardInfo {
            card_number: wire
                .card_number
                .as_ref()
                .and_then(string_from_value)
                .unwrap_or_else(|| card_number.to_string()),
            holder: wire.holder.filter(|h| !h.trim().is_empty()),
            balance: balance.round_dp(2),
            status: card_status_from_value(wire.locked.as_ref()),
        });
    }

    // Not the JSON shape; accept a markup body if it shows a balance label.
    match extract_labeled_balance(body) {
        Some(balance) => {
            tracing::warn!(%location, "card info fell back to markup balance scraping");
            Ok(CardInfo {
                card_number: card_number.to_string(),
                holder: None,
                balance: balance.round_dp(2),
                status: CardStatus::Unknown,
            })
        }
        None => Err(KartenError::parse(
            location,
            operation,
            format!("neither a KARTE record nor a balance label: {}", snippet(body)),
        )),
    }
}

fn card_status_from_value(v: Option<&Value>) -> CardStatus {
    match v {
        Some(Value::Bool(locked)) => {
            if *locked {
                CardStatus::Locked
            } else {
                CardStatus::Active
            }
        }
        Some(Value::Number(n)) => {
            if n.as_i64() == Some(0) {
                CardStatus::Active
            } else {
                CardStatus::Locked
            }
        }
        Some(Value::String(s)) => match s.trim() {
            "0" | "false" | "nein" => CardStatus::Active,
            "1" | "true" | "ja" => CardStatus::Locked,
            _ => CardStatus::Unknown,
        },
        _ => CardStatus::Unknown,
    }
}

/// The first chunk of a body, for error context without dumping pages of
/// markup into messages.
pub(crate) fn snippet(body: &str) -> String {
    const LIMIT: usize = 120;
    let trimmed = body.trim();
    let mut end = trimmed.len().min(LIMIT);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    if end < trimmed.len() {
        format!("{:?}...", &trimmed[..end])
    } else {
        format!("{trimmed:?}")
    }
}

fn string_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn amount_from_value(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => parse_amount(s),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

// Serde helpers for the wire structs. The portals are loose about types
// (ids arrive as strings or numbers, amounts as either notation), so the
// deserializers go through `Value` and normalize.

pub(crate) fn de_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    string_from_value(&v).ok_or_else(|| de::Error::custom(format!("expected string or number, got {v}")))
}

pub(crate) fn de_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    match &v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| de::Error::custom(format!("expected integer, got {v}")))
}

pub(crate) fn de_opt_i64<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    match &v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_i64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected integer, got {v}"))),
        _ => Err(de::Error::custom(format!("expected integer, got {v}"))),
    }
}

pub(crate) fn de_decimal<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Decimal, D::Error> {
    let v = Value::deserialize(d)?;
    amount_from_value(&v).ok_or_else(|| de::Error::custom(format!("expected number, got {v}")))
}

pub(crate) fn de_amount<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Decimal, D::Error> {
    de_decimal(d).map(|a| a.round_dp(2))
}

pub(crate) fn de_opt_amount<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<Decimal>, D::Error> {
    let v = Value::deserialize(d)?;
    match &v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        _ => amount_from_value(&v)
            .map(|a| Some(a.round_dp(2)))
            .ok_or_else(|| de::Error::custom(format!("expected amount, got {v}"))),
    }
}

pub(crate) fn de_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<NaiveDateTime, D::Error> {
    let v = Value::deserialize(d)?;
    match &v {
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
    .ok_or_else(|| de::Error::custom(format!("expected dd.mm.yyyy HH:MM timestamp, got {v}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Transaction;

    const JS_FIXTURE: &str = r#"
        var dataProvider = {
            authClientId: 42,
            authRegKey: "regkey123",
            authHeader: "Basic S0FTVkM6dG9rZW4xMjM=",
            authUsername: "KASVC",
            authPassword: "token123",
        };
    "#;

    #[test]
    fn amounts_accept_german_and_dot_notation() {
        assert_eq!(parse_amount("12,34 €"), Some(Decimal::new(1234, 2)));
        assert_eq!(parse_amount("1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("-3.50"), Some(Decimal::new(-350, 2)));
        assert_eq!(parse_amount("7"), Some(Decimal::from(7)));
        assert_eq!(parse_amount("2,50 EUR"), Some(Decimal::new(250, 2)));
        assert_eq!(parse_amount("Mensa"), None);
    }

    #[test]
    fn timestamps_accept_the_portal_variants() {
        let full = parse_timestamp("21.08.2026 12:05").unwrap();
        assert_eq!(full.format("%Y-%m-%d %H:%M").to_string(), "2026-08-21 12:05");
        assert!(parse_timestamp("21.08.2026 12:05:31").is_some());
        let date_only = parse_timestamp("21.08.2026").unwrap();
        assert_eq!(date_only.format("%H:%M").to_string(), "00:00");
        assert!(parse_timestamp("2026-08-21").is_none());
    }

    #[test]
    fn credential_discovery_extracts_all_five_markers() {
        let creds = extract_api_credentials(Location::Dresden, JS_FIXTURE).unwrap();
        assert_eq!(creds.client_id, "42");
        assert_eq!(creds.reg_key, "regkey123");
        assert_eq!(creds.header, "Basic S0FTVkM6dG9rZW4xMjM=");
        assert_eq!(creds.user, "KASVC");
        assert_eq!(creds.password, "token123");
    }

    #[test]
    fn credential_discovery_reports_the_missing_marker() {
        let truncated = JS_FIXTURE.replace("authPassword", "somethingElse");
        let err = extract_api_credentials(Location::Dresden, &truncated).unwrap_err();
        assert!(matches!(err, KartenError::Parse { .. }));
        assert!(err.to_string().contains("authPassword"));
    }

    #[test]
    fn labeled_balance_is_found_in_markup() {
        let body = "<div class=\"saldo\">Saldo: 12,34 €</div>";
        assert_eq!(extract_labeled_balance(body), Some(Decimal::new(1234, 2)));
        assert_eq!(
            extract_labeled_balance("Guthaben 3,20"),
            Some(Decimal::new(320, 2))
        );
        assert_eq!(extract_labeled_balance("<div>Mensa</div>"), None);
    }

    #[test]
    fn card_info_prefers_the_json_record() {
        let body = r#"[{"karteNr": 600123, "inhaber": "Erika Mustermann", "kontoStand": "12,34", "gesperrt": 0}]"#;
        let info = decode_card_info(Location::Dresden, "card info", "600123", body).unwrap();
        assert_eq!(info.card_number, "600123");
        assert_eq!(info.holder.as_deref(), Some("Erika Mustermann"));
        assert_eq!(info.balance, Decimal::new(1234, 2));
        assert_eq!(info.status, CardStatus::Active);
    }

    #[test]
    fn card_info_falls_back_to_markup_balance() {
        let body = "<html><body>Saldo: 12,34 €</body></html>";
        let info = decode_card_info(Location::Freiburg, "card info", "600123", body).unwrap();
        assert_eq!(info.balance, Decimal::new(1234, 2));
        assert_eq!(info.status, CardStatus::Unknown);
        assert_eq!(info.card_number, "600123");
    }

    #[test]
    fn card_info_without_any_balance_is_a_parse_error() {
        let err =
            decode_card_info(Location::Dresden, "card info", "1", "<html>Wartung</html>").unwrap_err();
        assert!(matches!(err, KartenError::Parse { .. }));
    }

    #[test]
    fn truncated_json_is_a_parse_error_not_an_empty_result() {
        let truncated = r#"[{"transFullId": "1", "datum": "01.02.2026 09:0"#;
        let err =
            decode_records::<Transaction>(Location::Leipzig, "transactions", truncated).unwrap_err();
        assert!(matches!(err, KartenError::Parse { .. }));
    }

    #[test]
    fn reparsing_the_same_fixture_is_deterministic() {
        let body = r#"[
            {"transFullId": "2", "datum": "21.08.2026 12:05", "zahlBetrag": "-3,50", "ortName": "Mensa"},
            {"transFullId": "1", "datum": "20.08.2026 08:30", "zahlBetrag": "20.00", "ortName": "Aufwerter"}
        ]"#;
        let first: Vec<Transaction> =
            decode_records(Location::Aachen, "transactions", body).unwrap();
        let second: Vec<Transaction> =
            decode_records(Location::Aachen, "transactions", body).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0].timestamp >= first[1].timestamp);
    }

    #[test]
    fn empty_array_is_rejected_where_one_record_is_required() {
        let err = decode_first_record::<CardInfoWire>(Location::Mannheim, "login", "[]").unwrap_err();
        assert!(matches!(err, KartenError::Parse { .. }));
    }

    #[test]
    fn snippets_truncate_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(&long);
        assert!(s.len() < 140);
        assert!(s.ends_with("..."));
    }
}

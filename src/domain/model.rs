use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cardholder credentials. The card number doubles as the user id on all
/// TL1 deployments.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub card_number: String,
    pub password: String,
}

impl Credentials {
    pub fn new(card_number: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            card_number: card_number.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("card_number", &self.card_number)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Application credentials each portal publishes inside its JavaScript app
/// (`dataprovider.js`). These authenticate the *client application* against
/// the TL1 services, not the cardholder. Discovered automatically on login;
/// callers may cache and re-supply them to skip the discovery round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// `authClientId` of the card service app.
    pub client_id: String,
    /// `authRegKey` of the card service app.
    pub reg_key: String,
    /// The precomputed `Basic ...` header as published in the JavaScript.
    pub header: String,
    /// Basic-auth user for the TL1 services.
    pub user: String,
    /// Basic-auth password for the TL1 services.
    pub password: String,
}

/// Snapshot of one card as reported by the KARTE endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardInfo {
    pub card_number: String,
    pub holder: Option<String>,
    /// Current balance in EUR, two-decimal precision.
    pub balance: Decimal,
    pub status: CardStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardStatus {
    Active,
    Locked,
    /// The portal did not report a usable status flag.
    Unknown,
}

/// One card payment or top-up, in the order the portal reports them
/// (newest first by TL1 convention). Timestamps are portal-local wall time;
/// the deployments do not transmit an offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(
        rename(deserialize = "transFullId"),
        deserialize_with = "crate::parse::de_string"
    )]
    pub id: String,
    #[serde(
        rename(deserialize = "datum"),
        deserialize_with = "crate::parse::de_timestamp"
    )]
    pub timestamp: NaiveDateTime,
    /// Signed amount in EUR; debits are negative.
    #[serde(
        rename(deserialize = "zahlBetrag"),
        deserialize_with = "crate::parse::de_amount"
    )]
    pub amount: Decimal,
    /// Name of the canteen or shop (`ortName`).
    #[serde(default, rename(deserialize = "ortName"))]
    pub location: String,
    /// Transaction kind as displayed by the portal (`typName`).
    #[serde(default, rename(deserialize = "typName"))]
    pub kind: String,
    /// The register the payment went through (`kaName`).
    #[serde(default, rename(deserialize = "kaName"))]
    pub point_of_sale: String,
}

/// One line item of a transaction, joined to its [`Transaction`] via
/// [`TransactionPosition::transaction_id`]. Positions carry no timestamp of
/// their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPosition {
    #[serde(
        rename(deserialize = "transFullId"),
        deserialize_with = "crate::parse::de_string"
    )]
    pub transaction_id: String,
    #[serde(
        rename(deserialize = "posId"),
        deserialize_with = "crate::parse::de_i64"
    )]
    pub position: i64,
    #[serde(default)]
    pub name: String,
    #[serde(
        rename(deserialize = "menge"),
        deserialize_with = "crate::parse::de_decimal"
    )]
    pub quantity: Decimal,
    #[serde(
        rename(deserialize = "epreis"),
        deserialize_with = "crate::parse::de_amount"
    )]
    pub unit_price: Decimal,
    #[serde(
        rename(deserialize = "gpreis"),
        deserialize_with = "crate::parse::de_amount"
    )]
    pub total_price: Decimal,
    /// Meal rating the cardholder left in the app, if any (`bewertung`).
    #[serde(
        default,
        rename(deserialize = "bewertung"),
        deserialize_with = "crate::parse::de_opt_i64"
    )]
    pub rating: Option<i64>,
    #[serde(
        default,
        rename(deserialize = "rabatt"),
        deserialize_with = "crate::parse::de_opt_amount"
    )]
    pub discount: Option<Decimal>,
}

/// UI text resource from the TEXTRES endpoint (unauthenticated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResource {
    #[serde(deserialize_with = "crate::parse::de_string")]
    pub id: String,
    #[serde(default)]
    pub text: String,
}

/// Inclusive date window for transaction queries, passed through to the
/// portal as `datumVon`/`datumBis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }
}

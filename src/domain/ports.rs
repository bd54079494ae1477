use crate::core::session::Session;
use crate::domain::location::Location;
use crate::domain::model::{
    ApiCredentials, CardInfo, Credentials, DateRange, TextResource, Transaction,
    TransactionPosition,
};
use crate::utils::error::Result;

/// The capability set every institution adapter provides. One adapter per
/// backend product; the closed set of institutions it serves is the
/// [`Location`] enum, so adding a university means adding a variant and
/// its URL table row, never touching the facade.
///
/// All calls block until the portal answers or the configured timeout
/// fires. A [`Session`] is only valid with the adapter that produced it.
pub trait Portal {
    /// The institution this adapter instance is bound to.
    fn location(&self) -> Location;

    /// Fetch and extract the application credentials the portal publishes
    /// in its JavaScript app. No cardholder login required.
    fn discover_credentials(&self) -> Result<ApiCredentials>;

    /// Authenticate the cardholder and return the session everything else
    /// hangs off. Rejected credentials surface as `Authentication`,
    /// network trouble as `Transport`.
    fn login(&self, credentials: &Credentials) -> Result<Session>;

    /// Current balance and card status.
    fn fetch_card_info(&self, session: &Session) -> Result<CardInfo>;

    /// Payments and top-ups in the given window, in portal order (newest
    /// first). Without a range the portal's retention window applies.
    fn fetch_transactions(
        &self,
        session: &Session,
        range: Option<DateRange>,
    ) -> Result<Vec<Transaction>>;

    /// Line items of the transactions in the given window, joined to
    /// transactions via their id.
    fn fetch_transaction_positions(
        &self,
        session: &Session,
        range: Option<DateRange>,
    ) -> Result<Vec<TransactionPosition>>;

    /// Register this client with the portal. The upstream app does this
    /// before login although login works without it. Needs no session.
    fn register_client(&self) -> Result<()>;

    /// UI text resources of the portal in the given language. Needs no
    /// session.
    fn fetch_texts(&self, language: &str) -> Result<Vec<TextResource>>;
}

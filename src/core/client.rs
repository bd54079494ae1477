use crate::adapters::tl1::Tl1Portal;
use crate::config::ClientConfig;
use crate::core::session::Session;
use crate::domain::location::Location;
use crate::domain::model::{
    ApiCredentials, CardInfo, Credentials, DateRange, TextResource, Transaction,
    TransactionPosition,
};
use crate::domain::ports::Portal;
use crate::utils::error::Result;

/// The public entry point. A client is bound to one institution at
/// construction; `connect` yields the [`Session`] all data calls take.
///
/// Everything is synchronous blocking I/O, nothing is cached, and no
/// retries happen internally — a retryable failure surfaces as a
/// `Transport` error (`is_retryable()`), retry policy is the caller's.
///
/// ```no_run
/// use kartenservice::{CardClient, Credentials, Location};
///
/// # fn main() -> kartenservice::Result<()> {
/// let client = CardClient::new(Location::Dresden);
/// let session = client.connect(&Credentials::new("600123", "secret"))?;
/// let info = client.get_card_info(&session)?;
/// println!("{} EUR", info.balance);
/// # Ok(())
/// # }
/// ```
pub struct CardClient<P: Portal = Tl1Portal> {
    portal: P,
}

impl CardClient<Tl1Portal> {
    pub fn new(location: Location) -> Self {
        Self::with_config(location, ClientConfig::default())
    }

    pub fn with_config(location: Location, config: ClientConfig) -> Self {
        CardClient {
            portal: Tl1Portal::with_config(location, config),
        }
    }
}

impl<P: Portal> CardClient<P> {
    /// Wrap an already-built adapter. Mostly useful for pointing the TL1
    /// adapter at a test server.
    pub fn from_portal(portal: P) -> Self {
        CardClient { portal }
    }

    pub fn location(&self) -> Location {
        self.portal.location()
    }

    /// Log in and return the session for subsequent calls. Bad
    /// credentials are `Authentication`, network trouble `Transport`.
    pub fn connect(&self, credentials: &Credentials) -> Result<Session> {
        tracing::info!(location = %self.location(), "connecting");
        self.portal.login(credentials)
    }

    /// Current balance, holder and card status.
    pub fn get_card_info(&self, session: &Session) -> Result<CardInfo> {
        self.portal.fetch_card_info(session)
    }

    /// Transactions in the given window (newest first, as the portal
    /// reports them). Without a range, the portal's full retention window
    /// up to today. A lapsed token surfaces as `SessionExpired`; connect
    /// again and retry.
    pub fn get_transactions(
        &self,
        session: &Session,
        range: Option<DateRange>,
    ) -> Result<Vec<Transaction>> {
        self.portal.fetch_transactions(session, range)
    }

    /// Line items of the transactions in the given window, joined via
    /// [`TransactionPosition::transaction_id`].
    pub fn get_transaction_positions(
        &self,
        session: &Session,
        range: Option<DateRange>,
    ) -> Result<Vec<TransactionPosition>> {
        self.portal.fetch_transaction_positions(session, range)
    }

    /// Fetch the application credentials without logging in, for caching
    /// in [`ClientConfig::api_credentials`].
    pub fn discover_credentials(&self) -> Result<ApiCredentials> {
        self.portal.discover_credentials()
    }

    /// Register this client with the portal, as the upstream app does
    /// before login. Login works without it; kept for parity.
    pub fn register_client(&self) -> Result<()> {
        self.portal.register_client()
    }

    /// The portal's UI text resources in the given language ("de", "en").
    pub fn get_texts(&self, language: &str) -> Result<Vec<TextResource>> {
        self.portal.fetch_texts(language)
    }
}

//! Client for the TL1 "KartenService" canteen-card portals several German
//! Studierendenwerke run. Log in with a card number and password, then
//! read the card's balance and transaction history.
//!
//! ```no_run
//! use kartenservice::{CardClient, Credentials, Location};
//!
//! # fn main() -> kartenservice::Result<()> {
//! let client = CardClient::new(Location::Leipzig);
//! let session = client.connect(&Credentials::new("600123", "secret"))?;
//! println!("balance: {} EUR", client.get_card_info(&session)?.balance);
//! for t in client.get_transactions(&session, None)? {
//!     println!("{} {:>8} {}", t.timestamp, t.amount, t.location);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod parse;
pub mod utils;

pub use adapters::tl1::Tl1Portal;
pub use config::ClientConfig;
pub use core::{CardClient, Session};
pub use domain::location::{Location, PortalUrls};
pub use domain::model::{
    ApiCredentials, CardInfo, CardStatus, Credentials, DateRange, TextResource, Transaction,
    TransactionPosition,
};
pub use domain::ports::Portal;
pub use utils::error::{KartenError, Result};

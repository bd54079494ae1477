pub mod client;
pub mod session;

pub use client::CardClient;
pub use session::Session;

pub mod error;
pub mod logger;

#[cfg(feature = "cli")]
pub mod csv_export;

pub mod ai;
pub mod attachments;
pub mod cli;
pub mod db;
pub mod error;
pub mod fmt;
pub mod importer;
pub mod logging;
pub mod models;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod reports;
pub mod retry;
pub mod scan;
pub mod settings;
pub mod state;
pub mod storage;
pub mod store;

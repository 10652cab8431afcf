pub mod api;
pub mod background;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod integrity;
pub mod ledger;
pub mod preflight;
pub mod runner;
pub mod source;

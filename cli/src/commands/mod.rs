pub mod cache;
pub mod catalog;
pub mod cli;
pub mod history;
pub mod preflight;
pub mod run;

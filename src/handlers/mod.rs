//! API Handlers

pub mod documents;
pub mod reports;

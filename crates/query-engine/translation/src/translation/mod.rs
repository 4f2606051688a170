//! Translate an incoming find request to a query plan, and the plan to SQL.

pub mod error;
pub mod helpers;
pub mod models;
pub mod query;

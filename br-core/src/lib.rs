pub mod concurrency;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod health;
pub mod labels;
pub mod planner;
pub mod repository;
pub mod restore;
pub mod schema;
pub mod sql;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{BrError, Result};

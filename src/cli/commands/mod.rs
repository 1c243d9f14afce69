//! CLI command implementations

pub mod category;
pub mod delete;
pub mod import;
pub mod list;
pub mod order;
pub mod show;

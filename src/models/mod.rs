//! Domain model module declarations.

pub mod agent;
pub mod content;
pub mod monitor;
pub mod reminder;

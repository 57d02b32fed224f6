//! Agent lifecycle supervision and background monitoring.
//!
//! Covers the supervisor's termination and I/O operations, the reminder
//! dispatcher, and the recurring monitoring scheduler.

pub mod monitor;
pub mod reminder_dispatcher;
pub mod supervisor;

//! SubAgentic Core - Shared functionality for all SubAgentic tools
//!
//! A coordinating agent supervises mission-scoped sub-units; the tools in
//! this workspace share their filesystem layout and display helpers here.

pub mod format;
pub mod paths;

pub use paths::Paths;

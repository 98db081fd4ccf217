//! Typed endpoint wrappers, one module per API surface.

pub mod chat;
pub mod conversations;
pub mod files;
pub mod knowledge;
pub mod models;
pub mod vision;

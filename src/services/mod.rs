//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own storage and scheduling concerns so route handlers can
//! stay focused on protocol translation and auth plumbing.

pub mod auth;
pub mod autosave;
pub mod drawing;
pub mod session;

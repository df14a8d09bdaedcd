//! Wifidrop - LAN file-drop server for media libraries
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod net;
pub mod server;
pub mod state;
pub mod storage;

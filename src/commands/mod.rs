//! Tauri command handlers
//!
//! IPC handlers the frontend calls through Tauri's invoke system.

pub mod session;
pub mod system;

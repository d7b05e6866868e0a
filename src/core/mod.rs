//! Core module containing the terminal engine
//!
//! This module provides:
//! - Frame codec (hex parsing and formatting, text display) and CRC-16/MODBUS
//! - Port transport with a serial backend and in-memory loopback pairs
//! - The receive gate and the background receiver loop
//! - Request/response emulation table
//! - Per-mode send history
//! - Keyboard input engines and the line editor
//! - Service commands and the session controller

pub mod codec;
pub mod controller;
pub mod gate;
pub mod history;
pub mod input;
pub mod protocol;
pub mod receiver;
pub mod screen;
pub mod service;
pub mod session;
pub mod simulator;
pub mod transport;
pub mod virtual_port;

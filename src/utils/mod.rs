//! Helpers around the engine: port-name ordering and launching another
//! instance of the program

pub mod launcher;
pub mod ports;

pub use launcher::{ProcessLauncher, SelfLauncher};
pub use ports::sort_port_names;

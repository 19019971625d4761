//! Core seams shared by the g19 driver crates.
//!
//! This crate provides:
//! - The `Transport` trait with its endpoint identifiers and the single-lock `SharedTransport`
//! - `Task`, the cooperative periodic worker used by the key receiver and applets

mod task;
mod transport;

pub use task::{run_periodic, Periodic, Step, StopFlag, Task};
pub use transport::{
    ControlRequest, InEndpoint, OutEndpoint, SharedTransport, Transport, TransportError,
};

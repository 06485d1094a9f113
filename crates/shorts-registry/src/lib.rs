//! In-memory job registry with bounded-concurrency dispatch.
//!
//! The registry is the sole shared mutable state of the server. It tracks
//! every job for the process lifetime, admits new jobs against a queue-depth
//! cap, hands queued jobs to workers in FIFO order under a global
//! concurrency semaphore, and serves consistent snapshots to pollers.

pub mod dispatch;
pub mod error;
pub mod progress;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::{JobRegistry, RegistryConfig};

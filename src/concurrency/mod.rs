//! Cancellation primitives shared by the Supervisor and every worker.

pub mod cancel_token;

pub use cancel_token::{CancelScope, CancelToken};

//! Alert records and the hand-off queue that carries them
//!
//! The queue is the only state shared between the monitor loop and the
//! alert loop.

pub mod alert;
pub mod queue;

pub use alert::Alert;
pub use queue::{AlertQueue, QueueError};

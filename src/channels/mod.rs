//! Transport adapters for message I/O.

pub mod telegram;

pub use telegram::{TelegramTransport, UpdateBatch};

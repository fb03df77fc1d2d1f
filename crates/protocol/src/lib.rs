//! Wire types shared by the wsbox client and its test peers.

pub mod constants;
pub mod envelope;

pub use envelope::{Envelope, EnvelopeError};

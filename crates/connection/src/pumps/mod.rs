//! Background pumps that move frames between a connection and its session.

pub(crate) mod read;
pub(crate) mod write;

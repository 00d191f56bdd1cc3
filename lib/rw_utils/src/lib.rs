//! Small helpers shared by the `ResWorks` crates.

pub mod hexlify;
pub mod writers;

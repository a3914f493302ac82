//! Database query modules.

pub mod shares;

//! Route handlers for the HTTP surface.

pub mod health;
pub mod shares;
pub mod stream;

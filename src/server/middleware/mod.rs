//! HTTP middleware and extractors: request ID, admin authentication and
//! client address.

pub mod auth;
pub mod client_ip;
pub mod request_id;

//! Sharegate-Common: shared types, access guard and errors.
//!
//! This crate provides the pieces every other sharegate crate agrees on:
//!
//! - **Share tokens**: opaque, URL-safe identifiers ([`ShareToken`])
//! - **Share records**: the unit of sharing and its tagged origin reference
//! - **Access guard**: the pure admit/deny decision for a request
//! - **Error handling**: the common error taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeSet;
//! use chrono::{Duration, Utc};
//! use sharegate_common::{guard, OriginRef, ShareRecord, StreamResolution};
//!
//! let record = ShareRecord::new(
//!     OriginRef::SceneServer { scene_id: "12".into(), resolution: StreamResolution::Original },
//!     "holiday clip",
//!     Utc::now() + Duration::days(7),
//!     Some(3),
//!     BTreeSet::new(),
//! );
//!
//! assert!(guard::evaluate(&record, Utc::now(), None).is_admit());
//! ```

pub mod error;
pub mod guard;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use guard::{DenyReason, Verdict};
pub use ids::ShareToken;
pub use types::*;

//! sharegate-db: durable share storage.
//!
//! SQLite-backed storage with r2d2 connection pooling and embedded
//! migrations. [`ShareStore`] is the async handle the server holds; the
//! synchronous functions in [`queries`] do the actual work on a blocking
//! thread.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> sharegate_common::Result<()> {
//! use sharegate_db::ShareStore;
//!
//! let store = ShareStore::open("/var/lib/sharegate/shares.db")?;
//! for share in store.list().await? {
//!     println!("{} -> {}", share.token, share.display_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use store::ShareStore;

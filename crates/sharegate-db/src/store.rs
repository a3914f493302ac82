//! Async share store handle.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use sharegate_common::{Error, Result, ShareRecord, ShareToken, Verdict};

use crate::pool::{get_conn, init_memory_pool, init_pool, DbPool};
use crate::queries::shares;

/// Cloneable handle to the share database.
///
/// Every operation checks a connection out of the pool and runs on the
/// blocking thread pool, so async workers never wait on SQLite.
#[derive(Clone)]
pub struct ShareStore {
    pool: DbPool,
}

impl ShareStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file at `db_path`.
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::new(init_pool(db_path)?))
    }

    /// Fresh in-memory store.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(init_memory_pool()?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = get_conn(&pool)?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))?
    }

    /// Persist a new record and return its token.
    pub async fn create(&self, record: ShareRecord) -> Result<ShareToken> {
        record.origin.validate()?;
        self.run(move |conn| {
            shares::insert_share(conn, &record)?;
            Ok(record.token)
        })
        .await
    }

    pub async fn get(&self, token: &ShareToken) -> Result<ShareRecord> {
        let token = token.clone();
        self.run(move |conn| {
            shares::get_share(conn, &token)?.ok_or_else(|| Error::not_found(token.as_str()))
        })
        .await
    }

    pub async fn list(&self) -> Result<Vec<ShareRecord>> {
        self.run(shares::list_shares).await
    }

    /// Edit a record in place. See [`shares::update_share`].
    pub async fn update<F>(&self, token: &ShareToken, mutator: F) -> Result<ShareRecord>
    where
        F: FnOnce(&mut ShareRecord) -> Result<()> + Send + 'static,
    {
        let token = token.clone();
        self.run(move |conn| shares::update_share(conn, &token, mutator))
            .await
    }

    pub async fn delete(&self, token: &ShareToken) -> Result<()> {
        let token = token.clone();
        self.run(move |conn| {
            if shares::delete_share(conn, &token)? {
                Ok(())
            } else {
                Err(Error::not_found(token.as_str()))
            }
        })
        .await
    }

    /// Remove the record if it is dead at `now`.
    pub async fn delete_if_dead(&self, token: &ShareToken, now: DateTime<Utc>) -> Result<bool> {
        let token = token.clone();
        self.run(move |conn| shares::delete_if_dead(conn, &token, now))
            .await
    }

    /// Atomically count one view if the share is neither expired nor out of
    /// views.
    pub async fn consume_view(
        &self,
        token: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<(Verdict, ShareRecord)> {
        let token = token.clone();
        self.run(move |conn| shares::consume_view(conn, &token, now))
            .await
    }

    /// Delete every dead record, returning the purged tokens.
    pub async fn purge_dead(&self, now: DateTime<Utc>) -> Result<Vec<ShareToken>> {
        self.run(move |conn| shares::purge_dead(conn, now)).await
    }
}

impl std::fmt::Debug for ShareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareStore")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use sharegate_common::{DenyReason, OriginRef, StreamResolution};
    use std::collections::BTreeSet;

    fn share(max_views: Option<u32>) -> ShareRecord {
        ShareRecord::new(
            OriginRef::SceneServer {
                scene_id: "9".into(),
                resolution: StreamResolution::Original,
            },
            "clip",
            Utc::now() + Duration::days(1),
            max_views,
            BTreeSet::new(),
        )
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = ShareStore::in_memory().unwrap();
        let token = store.create(share(None)).await.unwrap();

        let fetched = store.get(&token).await.unwrap();
        assert_eq!(fetched.token, token);

        store.delete(&token).await.unwrap();
        assert_matches!(store.get(&token).await, Err(Error::NotFound(_)));
        assert_matches!(store.delete(&token).await, Err(Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_origin() {
        let store = ShareStore::in_memory().unwrap();
        let mut record = share(None);
        record.origin = OriginRef::SceneServer {
            scene_id: "".into(),
            resolution: StreamResolution::Original,
        };
        assert_matches!(store.create(record).await, Err(Error::Validation(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lazy_purge_sequence() {
        let store = ShareStore::in_memory().unwrap();
        let token = store.create(share(Some(1))).await.unwrap();
        let now = Utc::now();

        let (verdict, _) = store.consume_view(&token, now).await.unwrap();
        assert!(verdict.is_admit());

        let (verdict, _) = store.consume_view(&token, now).await.unwrap();
        assert_eq!(verdict, Verdict::Deny(DenyReason::QuotaExhausted));
        assert!(store.delete_if_dead(&token, now).await.unwrap());

        assert_matches!(
            store.consume_view(&token, now).await,
            Err(Error::NotFound(_))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_respects_quota() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shares.db");
        let store = ShareStore::open(path.to_str().unwrap()).unwrap();

        const MAX: u32 = 5;
        let token = store.create(share(Some(MAX))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let store = store.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                store.consume_view(&token, Utc::now()).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            let (verdict, record) = handle.await.unwrap().unwrap();
            assert!(record.views <= MAX);
            if verdict.is_admit() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, MAX);
        assert_eq!(store.get(&token).await.unwrap().views, MAX);
    }

    #[tokio::test]
    async fn test_purge_dead() {
        let store = ShareStore::in_memory().unwrap();
        let live = store.create(share(None)).await.unwrap();
        let mut expired = share(None);
        expired.expires_at = Utc::now() - Duration::seconds(1);
        let expired = store.create(expired).await.unwrap();

        let purged = store.purge_dead(Utc::now()).await.unwrap();
        assert_eq!(purged, vec![expired]);
        assert!(store.get(&live).await.is_ok());
    }
}

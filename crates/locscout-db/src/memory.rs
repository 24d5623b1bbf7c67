use std::collections::HashMap;

use async_trait::async_trait;
use locscout_core::{CandidatePatch, LocationCandidate};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::candidates::{sort_stored, CandidateRepository, StoredCandidate};
use crate::DbError;

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, StoredCandidate>,
    order: Vec<Uuid>,
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryCandidateRepository {
    inner: RwLock<Inner>,
}

impl MemoryCandidateRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CandidateRepository for MemoryCandidateRepository {
    async fn get(&self, id: Uuid) -> Result<StoredCandidate, DbError> {
        self.inner
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound(id))
    }

    async fn create_many(&self, candidates: &[LocationCandidate]) -> Result<usize, DbError> {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for candidate in candidates {
            if inner.records.contains_key(&candidate.id) {
                continue;
            }
            inner.order.push(candidate.id);
            inner.records.insert(
                candidate.id,
                StoredCandidate {
                    candidate: candidate.clone(),
                    version: 1,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &CandidatePatch,
        expected_version: i64,
    ) -> Result<StoredCandidate, DbError> {
        let mut inner = self.inner.write().await;
        let stored = inner.records.get_mut(&id).ok_or(DbError::NotFound(id))?;
        if stored.version != expected_version {
            return Err(DbError::VersionConflict {
                id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        patch.apply(&mut stored.candidate);
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn list_for_scene(&self, scene_id: Uuid) -> Result<Vec<StoredCandidate>, DbError> {
        let inner = self.inner.read().await;
        let mut found: Vec<StoredCandidate> = inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|stored| stored.candidate.scene_id == scene_id)
            .cloned()
            .collect();
        sort_stored(&mut found);
        Ok(found)
    }
}

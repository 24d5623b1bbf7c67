use async_trait::async_trait;
use chrono::{DateTime, Utc};
use locscout_core::{CandidatePatch, LocationCandidate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::candidates::{CandidateRepository, StoredCandidate};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `location_candidates` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub scene_id: Uuid,
    pub project_id: String,
    pub venue_name: String,
    pub status: String,
    pub vapi_call_status: String,
    pub vapi_call_id: Option<String>,
    pub match_score: f64,
    pub data: serde_json::Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateRow {
    /// Decodes the stored record. The `data` column is authoritative; the
    /// scalar columns only mirror it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialize`] if `data` is not a candidate.
    pub fn into_stored(self) -> Result<StoredCandidate, DbError> {
        let candidate: LocationCandidate = serde_json::from_value(self.data)?;
        Ok(StoredCandidate {
            candidate,
            version: self.version,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, scene_id, project_id, venue_name, status, \
     vapi_call_status, vapi_call_id, match_score, data, version, created_at, updated_at \
     FROM location_candidates";

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgCandidateRepository {
    pool: PgPool,
}

impl PgCandidateRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<CandidateRow>, DbError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    async fn get(&self, id: Uuid) -> Result<StoredCandidate, DbError> {
        self.fetch(id)
            .await?
            .ok_or(DbError::NotFound(id))?
            .into_stored()
    }

    async fn create_many(&self, candidates: &[LocationCandidate]) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0_usize;
        for candidate in candidates {
            let data = serde_json::to_value(candidate)?;
            let result = sqlx::query(
                "INSERT INTO location_candidates \
                 (id, scene_id, project_id, venue_name, status, vapi_call_status, vapi_call_id, \
                  match_score, data, version, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1, $10, $11) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(candidate.id)
            .bind(candidate.scene_id)
            .bind(&candidate.project_id)
            .bind(&candidate.venue_name)
            .bind(candidate.status.as_str())
            .bind(candidate.vapi_call_status.as_str())
            .bind(candidate.vapi_call_id.as_deref())
            .bind(candidate.match_score.clamp(0.0, 1.0))
            .bind(data)
            .bind(candidate.created_at)
            .bind(candidate.updated_at)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        tx.commit().await?;
        tracing::debug!(inserted, offered = candidates.len(), "stored location candidates");
        Ok(inserted)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &CandidatePatch,
        expected_version: i64,
    ) -> Result<StoredCandidate, DbError> {
        let row = self.fetch(id).await?.ok_or(DbError::NotFound(id))?;
        if row.version != expected_version {
            return Err(DbError::VersionConflict {
                id,
                expected: expected_version,
                actual: row.version,
            });
        }
        let StoredCandidate { mut candidate, .. } = row.into_stored()?;
        patch.apply(&mut candidate);
        let data = serde_json::to_value(&candidate)?;

        // The version predicate makes the write conditional on nobody having
        // written since the read above.
        let new_version = sqlx::query_scalar::<_, i64>(
            "UPDATE location_candidates \
             SET status = $1, vapi_call_status = $2, vapi_call_id = $3, match_score = $4, \
                 data = $5, version = version + 1, updated_at = $6 \
             WHERE id = $7 AND version = $8 \
             RETURNING version",
        )
        .bind(candidate.status.as_str())
        .bind(candidate.vapi_call_status.as_str())
        .bind(candidate.vapi_call_id.as_deref())
        .bind(candidate.match_score.clamp(0.0, 1.0))
        .bind(data)
        .bind(candidate.updated_at)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match new_version {
            Some(version) => Ok(StoredCandidate { candidate, version }),
            None => {
                let actual = self
                    .fetch(id)
                    .await?
                    .ok_or(DbError::NotFound(id))?
                    .version;
                Err(DbError::VersionConflict {
                    id,
                    expected: expected_version,
                    actual,
                })
            }
        }
    }

    async fn list_for_scene(&self, scene_id: Uuid) -> Result<Vec<StoredCandidate>, DbError> {
        sqlx::query_as::<_, CandidateRow>(&format!(
            "{SELECT_COLUMNS} WHERE scene_id = $1 ORDER BY match_score DESC, created_at, id"
        ))
        .bind(scene_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CandidateRow::into_stored)
        .collect()
    }
}

//! Postgres-backed registry over sqlx.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use mata_model::{
    FeatureSet, FeatureSetJobStatus, FeatureSetRef, FeatureSetStatus, FieldSpec, Job, JobKey,
    JobStatus, Source, SourceConfig, SourceType, Store, StoreConfig, Subscription,
};

use crate::error::RegistryError;
use crate::repository::{FeatureSetRepository, JobRepository, SourceRepository, StoreRepository};

const TERMINAL_STATUSES: [&str; 3] = ["aborted", "error", "completed"];

/// Translate a `*` wildcard pattern into a `LIKE` pattern. Literal `%`,
/// `_` and `\` are escaped so only the wildcard expands.
fn like_pattern(glob: &str) -> String {
    glob.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "%")
}

fn decode<T, E: std::fmt::Display>(result: Result<T, E>) -> Result<T, RegistryError> {
    result.map_err(|e| RegistryError::DecodeFailed(e.to_string()))
}

/// All registry repositories implemented over one connection pool.
///
/// The DDL for the backing tables lives in `schema.sql` next to this
/// crate's manifest.
#[derive(Clone)]
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    pub fn new(pool: PgPool) -> Self {
        PgRegistry { pool }
    }
}

// --- Row types ---

#[derive(sqlx::FromRow)]
struct StoreRow {
    name: String,
    store_type: String,
    config: Json<StoreConfig>,
    subscriptions: Json<Vec<Subscription>>,
}

impl StoreRow {
    fn into_model(self) -> Result<Store, RegistryError> {
        Ok(Store {
            name: self.name,
            store_type: decode(self.store_type.parse())?,
            config: self.config.0,
            subscriptions: self.subscriptions.0,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: i64,
    source_type: String,
    config: Json<SourceConfig>,
}

impl SourceRow {
    fn into_model(self) -> Result<Source, RegistryError> {
        Ok(Source {
            id: Some(self.id),
            source_type: decode(self.source_type.parse())?,
            config: self.config.0,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FeatureSetRow {
    id: i64,
    project: String,
    name: String,
    version: i64,
    status: String,
    source: Json<Source>,
    entities: Json<Vec<FieldSpec>>,
    features: Json<Vec<FieldSpec>>,
    job_statuses: Json<Vec<FeatureSetJobStatus>>,
}

impl FeatureSetRow {
    fn into_model(self) -> Result<FeatureSet, RegistryError> {
        Ok(FeatureSet {
            id: Some(self.id),
            project: self.project,
            name: self.name,
            version: self.version,
            status: decode(self.status.parse())?,
            source: self.source.0,
            entities: self.entities.0,
            features: self.features.0,
            job_statuses: self.job_statuses.0,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    ext_id: String,
    runner: String,
    source_id: Option<i64>,
    source_type: String,
    source_config: Json<SourceConfig>,
    store_name: String,
    status: String,
    feature_sets: Json<std::collections::BTreeSet<FeatureSetRef>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobRow {
    fn into_model(self) -> Result<Job, RegistryError> {
        Ok(Job {
            id: self.id,
            ext_id: self.ext_id,
            runner: decode(self.runner.parse())?,
            source: Source {
                id: self.source_id,
                source_type: decode(self.source_type.parse())?,
                config: self.source_config.0,
            },
            store_name: self.store_name,
            status: decode(self.status.parse())?,
            feature_sets: self.feature_sets.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, ext_id, runner, source_id, source_type, source_config, \
     store_name, status, feature_sets, created_at, updated_at";

// --- Trait implementations ---

#[async_trait]
impl StoreRepository for PgRegistry {
    async fn list_stores(&self) -> Result<Vec<Store>, RegistryError> {
        let rows: Vec<StoreRow> = sqlx::query_as(
            "SELECT name, store_type, config, subscriptions FROM stores ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoreRow::into_model).collect()
    }
}

#[async_trait]
impl SourceRepository for PgRegistry {
    async fn find_canonical(
        &self,
        source_type: SourceType,
        config: &SourceConfig,
    ) -> Result<Option<Source>, RegistryError> {
        let row: Option<SourceRow> = sqlx::query_as(
            "SELECT id, source_type, config FROM sources
             WHERE source_type = $1 AND config = $2
             ORDER BY id ASC
             LIMIT 1",
        )
        .bind(source_type.as_str())
        .bind(Json(config))
        .fetch_optional(&self.pool)
        .await?;

        row.map(SourceRow::into_model).transpose()
    }
}

#[async_trait]
impl FeatureSetRepository for PgRegistry {
    async fn list(
        &self,
        project_glob: &str,
        name_glob: &str,
    ) -> Result<Vec<FeatureSet>, RegistryError> {
        let rows: Vec<FeatureSetRow> = sqlx::query_as(
            "SELECT id, project, name, version, status, source, entities, features, job_statuses
             FROM feature_sets
             WHERE project LIKE $1 AND name LIKE $2
             ORDER BY name ASC",
        )
        .bind(like_pattern(project_glob))
        .bind(like_pattern(name_glob))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeatureSetRow::into_model).collect()
    }

    async fn find_by_status(
        &self,
        status: FeatureSetStatus,
    ) -> Result<Vec<FeatureSet>, RegistryError> {
        let rows: Vec<FeatureSetRow> = sqlx::query_as(
            "SELECT id, project, name, version, status, source, entities, features, job_statuses
             FROM feature_sets
             WHERE status = $1
             ORDER BY project, name",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeatureSetRow::into_model).collect()
    }

    async fn find(&self, project: &str, name: &str) -> Result<Option<FeatureSet>, RegistryError> {
        let row: Option<FeatureSetRow> = sqlx::query_as(
            "SELECT id, project, name, version, status, source, entities, features, job_statuses
             FROM feature_sets
             WHERE project = $1 AND name = $2",
        )
        .bind(project)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeatureSetRow::into_model).transpose()
    }

    async fn save(&self, feature_set: &FeatureSet) -> Result<(), RegistryError> {
        // Only status and delivery links are coordinator-owned; version,
        // schema and source stay whatever the registry last wrote.
        sqlx::query(
            "INSERT INTO feature_sets
                 (project, name, version, status, source, entities, features, job_statuses)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (project, name) DO UPDATE
             SET status = EXCLUDED.status,
                 job_statuses = EXCLUDED.job_statuses",
        )
        .bind(&feature_set.project)
        .bind(&feature_set.name)
        .bind(feature_set.version)
        .bind(feature_set.status.as_str())
        .bind(Json(&feature_set.source))
        .bind(Json(&feature_set.entities))
        .bind(Json(&feature_set.features))
        .bind(Json(&feature_set.job_statuses))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl JobRepository for PgRegistry {
    async fn find_latest_non_terminal(
        &self,
        key: &JobKey,
    ) -> Result<Option<Job>, RegistryError> {
        let sql = format!(
            "SELECT {} FROM jobs
             WHERE source_type = $1 AND source_config = $2 AND store_name = $3
               AND status NOT IN ('{}')
             ORDER BY updated_at DESC
             LIMIT 1",
            JOB_COLUMNS,
            TERMINAL_STATUSES.join("', '")
        );
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(key.source.source_type.as_str())
            .bind(Json(&key.source.config))
            .bind(&key.store_name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRow::into_model).transpose()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RegistryError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE status = $1 ORDER BY updated_at DESC",
            JOB_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_model).collect()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Job>, RegistryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE id = ANY($1)",
            JOB_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_model).collect()
    }

    async fn save_all(&self, jobs: &[Job]) -> Result<(), RegistryError> {
        let mut tx = self.pool.begin().await?;

        for job in jobs {
            sqlx::query(
                "INSERT INTO jobs
                     (id, ext_id, runner, source_id, source_type, source_config,
                      store_name, status, feature_sets, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                 ON CONFLICT (id) DO UPDATE
                 SET ext_id = EXCLUDED.ext_id,
                     status = EXCLUDED.status,
                     feature_sets = EXCLUDED.feature_sets,
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(job.id)
            .bind(&job.ext_id)
            .bind(job.runner.as_str())
            .bind(job.source.id)
            .bind(job.source.source_type.as_str())
            .bind(Json(&job.source.config))
            .bind(&job.store_name)
            .bind(job.status.as_str())
            .bind(Json(&job.feature_sets))
            .bind(job.created_at)
            .bind(job.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Persisted {} jobs", jobs.len());
        Ok(())
    }
}

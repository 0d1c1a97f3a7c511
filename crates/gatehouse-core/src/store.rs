//! Policy persistence with in-memory and PostgreSQL backends.

use crate::error::StoreError;
use crate::policy::{Criteria, Policy, PolicySet};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

/// Policy persistence backend configuration.
#[derive(Debug, Clone)]
pub enum PolicyStoreConfig {
    /// Keep policies in process memory only.
    Memory,
    /// Persist policies in PostgreSQL.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl PolicyStoreConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug)]
enum PolicyStoreBackend {
    Memory(MemoryPolicyStore),
    Postgres(PostgresPolicyStore),
}

/// Store for policies, keyed by id and listed in evaluation order.
///
/// Listing sorts by ascending priority; policies saved earlier win ties, so
/// the sequence handed to the engine is a total order.
#[derive(Debug)]
pub struct PolicyStore {
    backend: PolicyStoreBackend,
}

impl PolicyStore {
    pub async fn bootstrap(config: PolicyStoreConfig) -> Result<Self, StoreError> {
        match config {
            PolicyStoreConfig::Memory => Ok(Self {
                backend: PolicyStoreBackend::Memory(MemoryPolicyStore::default()),
            }),
            PolicyStoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresPolicyStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                Ok(Self {
                    backend: PolicyStoreBackend::Postgres(store),
                })
            }
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            PolicyStoreBackend::Memory(_) => "memory",
            PolicyStoreBackend::Postgres(_) => "postgres",
        }
    }

    /// Insert the policy, or update every mutable column if the id exists.
    pub async fn save(&self, policy: Policy) -> Result<(), StoreError> {
        match &self.backend {
            PolicyStoreBackend::Memory(store) => {
                store.save(policy).await;
                Ok(())
            }
            PolicyStoreBackend::Postgres(store) => store.save(&policy).await,
        }
    }

    /// All policies ordered by ascending priority, ready for evaluation.
    pub async fn policies(&self) -> Result<PolicySet, StoreError> {
        match &self.backend {
            PolicyStoreBackend::Memory(store) => Ok(store.policies().await),
            PolicyStoreBackend::Postgres(store) => store.policies().await,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryPolicyStore {
    policies: RwLock<Vec<Policy>>,
}

impl MemoryPolicyStore {
    async fn save(&self, policy: Policy) {
        let mut policies = self.policies.write().await;
        match policies.iter_mut().find(|existing| existing.id == policy.id) {
            Some(existing) => *existing = policy,
            None => policies.push(policy),
        }
    }

    async fn policies(&self) -> PolicySet {
        let mut policies = self.policies.read().await.clone();
        // Stable sort: equal priorities keep insertion order.
        policies.sort_by_key(|policy| policy.priority);
        PolicySet::from_ordered(policies)
    }
}

#[derive(Debug, Clone)]
struct PostgresPolicyStore {
    pool: PgPool,
}

impl PostgresPolicyStore {
    async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        // seq breaks priority ties by insertion order, keeping the listed
        // order total.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gatehouse_policies (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                criteria TEXT NOT NULL,
                value BIGINT NOT NULL,
                success_case BOOLEAN NOT NULL,
                priority INTEGER NOT NULL,
                seq BIGSERIAL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Schema(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_gatehouse_policies_priority ON gatehouse_policies (priority, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Schema(e.to_string()))?;

        Ok(())
    }

    async fn save(&self, policy: &Policy) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO gatehouse_policies (id, name, criteria, value, success_case, priority)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                criteria = EXCLUDED.criteria,
                value = EXCLUDED.value,
                success_case = EXCLUDED.success_case,
                priority = EXCLUDED.priority,
                updated_at = now()
            "#,
        )
        .bind(policy.id)
        .bind(&policy.name)
        .bind(policy.criteria.as_str())
        .bind(policy.value)
        .bind(policy.success_case)
        .bind(policy.priority)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn policies(&self) -> Result<PolicySet, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, criteria, value, success_case, priority
            FROM gatehouse_policies
            ORDER BY priority ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut policies = Vec::with_capacity(rows.len());
        for row in rows {
            let criteria_text: String = row
                .try_get("criteria")
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            let criteria = criteria_text
                .parse::<Criteria>()
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            policies.push(Policy {
                id: row
                    .try_get("id")
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
                name: row
                    .try_get("name")
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
                criteria,
                value: row
                    .try_get("value")
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
                success_case: row
                    .try_get("success_case")
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
                priority: row
                    .try_get("priority")
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
            });
        }

        Ok(PolicySet::from_ordered(policies))
    }
}

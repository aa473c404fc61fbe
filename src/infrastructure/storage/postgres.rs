//! PostgreSQL store with connection pooling
//!
//! Each entity kind lives in its own table named after `Record::KIND`:
//! `(id TEXT PRIMARY KEY, data JSONB, created_at, updated_at)`. Store-assigned
//! ids come from a `<kind>_id_seq` sequence and are written back into `data`.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, QueryBuilder, Row, Transaction};

use crate::domain::storage::{ColumnFilter, Logic, Operator, QueryParams, Record, RecordKey, RecordPatch, Store};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/world_data".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Opens a connection pool shared by every entity table
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

/// Store for one entity kind backed by a JSONB table
pub struct PostgresStore<E: Record> {
    pool: PgPool,
    table: &'static str,
    _phantom: PhantomData<fn() -> E>,
}

impl<E: Record> Debug for PostgresStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("table", &self.table)
            .finish()
    }
}

impl<E: Record> PostgresStore<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: E::KIND,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Starts a transaction for the `*_by_tx` operations
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))
    }

    /// Creates the kind's table and id sequence when missing
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        let table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        );

        sqlx::query(&table)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        if <E::Key as RecordKey>::STORE_ASSIGNED {
            let sequence = format!("CREATE SEQUENCE IF NOT EXISTS {}_id_seq", self.table);

            sqlx::query(&sequence)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to create sequence: {}", e)))?;
        }

        Ok(())
    }

    fn insert_sql(&self) -> String {
        if <E::Key as RecordKey>::STORE_ASSIGNED {
            format!(
                r#"
                WITH next AS (SELECT nextval('{table}_id_seq') AS id)
                INSERT INTO {table} (id, data)
                SELECT next.id::text, jsonb_set($1::jsonb, '{{id}}', to_jsonb(next.id))
                FROM next
                RETURNING id
                "#,
                table = self.table
            )
        } else {
            format!(
                "INSERT INTO {} (id, data) VALUES ($2, $1::jsonb) RETURNING id",
                self.table
            )
        }
    }

    fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE id = $1", self.table)
    }

    fn update_sql(&self) -> String {
        format!(
            r#"
            UPDATE {}
            SET data = data || $2::jsonb, updated_at = NOW()
            WHERE id = $1
            "#,
            self.table
        )
    }

    fn insert_query<'q>(&self, sql: &'q str, record: &E) -> Result<Query<'q, Postgres, PgArguments>, DomainError> {
        let data = serde_json::to_value(record)
            .map_err(|e| DomainError::storage(format!("Failed to serialize {}: {}", E::KIND, e)))?;

        let query = sqlx::query(sql).bind(data);
        Ok(if <E::Key as RecordKey>::STORE_ASSIGNED {
            query
        } else {
            query.bind(record.id().to_string())
        })
    }

    fn update_query<'q>(
        &self,
        sql: &'q str,
        id: &E::Key,
        patch: &E::Patch,
    ) -> Result<Query<'q, Postgres, PgArguments>, DomainError> {
        let fields = patch.to_fields()?;
        Ok(sqlx::query(sql)
            .bind(id.to_string())
            .bind(Value::Object(fields)))
    }

    fn created_key(&self, record: &E, row: Result<PgRow, sqlx::Error>) -> Result<E::Key, DomainError> {
        let row = row.map_err(|e| {
            if e.to_string().contains("duplicate key") {
                DomainError::conflict(format!(
                    "{} with id '{}' already exists",
                    E::KIND,
                    record.id()
                ))
            } else {
                DomainError::storage(format!("Failed to create {}: {}", E::KIND, e))
            }
        })?;

        let id: String = row
            .try_get("id")
            .map_err(|e| DomainError::storage(format!("Failed to read created id: {}", e)))?;

        id.parse()
            .map_err(|_| DomainError::storage(format!("Store returned malformed id '{}'", id)))
    }

    fn updated(&self, id: &E::Key, rows_affected: u64) -> Result<(), DomainError> {
        if rows_affected == 0 {
            return Err(DomainError::not_found(format!(
                "{} with id '{}' not found",
                E::KIND,
                id
            )));
        }
        Ok(())
    }

    fn decode(row: &PgRow) -> Result<E, DomainError> {
        let data: Value = row
            .try_get("data")
            .map_err(|e| DomainError::storage(format!("Failed to read {}: {}", E::KIND, e)))?;

        serde_json::from_value(data)
            .map_err(|e| DomainError::storage(format!("Failed to deserialize {}: {}", E::KIND, e)))
    }
}

/// Appends the WHERE clause for `filters`, grouping left to right
///
/// Column names are bound as parameters, never spliced into the SQL text.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &[ColumnFilter]) {
    if filters.is_empty() {
        return;
    }

    builder.push(" WHERE ");
    for _ in 1..filters.len() {
        builder.push("(");
    }

    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            builder.push(match filter.logic {
                Logic::And => " AND ",
                Logic::Or => " OR ",
            });
        }

        push_condition(builder, filter);

        if i > 0 {
            builder.push(")");
        }
    }
}

fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, filter: &ColumnFilter) {
    match filter.exp {
        Operator::Like => {
            let pattern = filter.value.as_str().unwrap_or_default().to_string();
            builder
                .push("(data ->> ")
                .push_bind(filter.name.clone())
                .push(") LIKE ")
                .push_bind(pattern);
        }
        Operator::In => {
            let values = filter.value.as_array().cloned().unwrap_or_default();
            if values.is_empty() {
                builder.push("FALSE");
                return;
            }

            builder
                .push("(data -> ")
                .push_bind(filter.name.clone())
                .push(") IN (");
            let mut separated = builder.separated(", ");
            for value in values {
                separated.push_bind(value);
            }
            separated.push_unseparated(")");
        }
        op => {
            builder
                .push("(data -> ")
                .push_bind(filter.name.clone())
                .push(") ")
                .push(op.as_sql())
                .push(" ")
                .push_bind(filter.value.clone());
        }
    }
}

fn count_query<'a>(table: &str, params: &QueryParams) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) AS count FROM {}", table));
    push_filters(&mut builder, &params.columns);
    builder
}

fn select_query<'a>(table: &str, params: &QueryParams) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT data FROM {}", table));
    push_filters(&mut builder, &params.columns);

    builder.push(" ORDER BY ");
    for (i, key) in params.sort_keys().into_iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder
            .push("data -> ")
            .push_bind(key.column)
            .push(if key.descending { " DESC" } else { " ASC" });
    }

    builder
        .push(" LIMIT ")
        .push_bind(i64::from(params.limit))
        .push(" OFFSET ")
        .push_bind(params.offset() as i64);
    builder
}

#[async_trait]
impl<E: Record> Store<E> for PostgresStore<E> {
    type Tx = Transaction<'static, Postgres>;

    async fn create(&self, record: E) -> Result<E::Key, DomainError> {
        let sql = self.insert_sql();
        let row = self.insert_query(&sql, &record)?.fetch_one(&self.pool).await;
        self.created_key(&record, row)
    }

    async fn delete_by_id(&self, id: &E::Key) -> Result<(), DomainError> {
        sqlx::query(&self.delete_sql())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete {}: {}", E::KIND, e)))?;
        Ok(())
    }

    async fn update_by_id(&self, id: &E::Key, patch: &E::Patch) -> Result<(), DomainError> {
        let sql = self.update_sql();
        let result = self
            .update_query(&sql, id, patch)?
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update {}: {}", E::KIND, e)))?;

        self.updated(id, result.rows_affected())
    }

    async fn get_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError> {
        let query = format!("SELECT data FROM {} WHERE id = $1", self.table);

        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get {}: {}", E::KIND, e)))?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn get_by_columns(&self, params: &QueryParams) -> Result<(Vec<E>, u64), DomainError> {
        params.validate(E::COLUMNS)?;

        let mut total = 0;
        if params.counts_total() {
            let row = count_query(self.table, params)
                .build()
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to count {}: {}", E::KIND, e)))?;

            let count: i64 = row
                .try_get("count")
                .map_err(|e| DomainError::storage(format!("Failed to read count: {}", e)))?;
            if count == 0 {
                return Ok((Vec::new(), 0));
            }
            total = count as u64;
        }

        let rows = select_query(self.table, params)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list {}: {}", E::KIND, e)))?;

        let records = rows.iter().map(Self::decode).collect::<Result<Vec<_>, _>>()?;
        Ok((records, total))
    }

    async fn create_by_tx(&self, tx: &mut Self::Tx, record: E) -> Result<E::Key, DomainError> {
        let sql = self.insert_sql();
        let row = self.insert_query(&sql, &record)?.fetch_one(&mut **tx).await;
        self.created_key(&record, row)
    }

    async fn delete_by_tx(&self, tx: &mut Self::Tx, id: &E::Key) -> Result<(), DomainError> {
        sqlx::query(&self.delete_sql())
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete {}: {}", E::KIND, e)))?;
        Ok(())
    }

    async fn update_by_tx(
        &self,
        tx: &mut Self::Tx,
        id: &E::Key,
        patch: &E::Patch,
    ) -> Result<(), DomainError> {
        let sql = self.update_sql();
        let result = self
            .update_query(&sql, id, patch)?
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update {}: {}", E::KIND, e)))?;

        self.updated(id, result.rows_affected())
    }
}

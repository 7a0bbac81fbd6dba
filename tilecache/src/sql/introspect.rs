//! Table column introspection for `!COLUMNS!` expansion.

use sqlx::PgPool;

use super::TemplateError;
use crate::cache::BoxFuture;

/// Lists the columns of a table in declared order.
pub trait ColumnIntrospector: Send + Sync {
    /// Column names of `table`, ordered by ordinal position.
    fn columns<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Vec<String>, TemplateError>>;
}

/// Reads column metadata from PostgreSQL's `information_schema`.
#[derive(Clone)]
pub struct PostgresColumnIntrospector {
    pool: PgPool,
}

impl PostgresColumnIntrospector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ColumnIntrospector for PostgresColumnIntrospector {
    fn columns<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Vec<String>, TemplateError>> {
        Box::pin(async move {
            sqlx::query_scalar::<sqlx::Postgres, String>(
                "SELECT column_name::text FROM information_schema.columns \
                 WHERE table_name = $1 ORDER BY ordinal_position",
            )
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                TemplateError::Introspection(format!("listing columns of '{}': {}", table, e))
            })
        })
    }
}

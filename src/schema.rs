//! Schema introspection.
//!
//! Walks the warehouse catalog (schemas → tables → columns) through the
//! Query Executor and assembles a denormalized schema description. The
//! walk is all-or-nothing: a fault on any step aborts it, and the gateway
//! renders the fault instead of partial results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::decode::ResultRow;
use crate::executor::{QueryError, QueryExecutor};
use crate::sql::quote_literal;

/// Catalog query for user-created schema names. The two system schemas
/// are excluded.
const SCHEMA_QUERY: &str = "SELECT DISTINCT schemaname FROM pg_tables \
     WHERE schemaname NOT IN ('pg_catalog', 'information_schema');";

/// One table's denormalized description.
///
/// `schema` is the column-name → declared-type map, string-encoded the
/// way the agent runtime expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchemaEntry {
    /// Qualified table name, `<schema>.<table>`.
    #[serde(rename = "Table")]
    pub table: String,
    /// String-encoded JSON map of column name → data type.
    #[serde(rename = "Schema")]
    pub schema: String,
}

/// Assembles schema descriptions by walking the catalog.
pub struct SchemaIntrospector {
    executor: Arc<QueryExecutor>,
}

impl SchemaIntrospector {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Describe every user-created table in `database`.
    ///
    /// All three walk steps run through the executor with `user_id` unset;
    /// metadata discovery is never access-controlled. Iteration order is
    /// the catalog's result order, never sorted.
    ///
    /// # Errors
    ///
    /// Any fault on any step aborts the walk; partial schema discovery is
    /// not supported.
    pub async fn describe(&self, database: &str) -> Result<Vec<TableSchemaEntry>, QueryError> {
        let mut entries = Vec::new();

        let schemas = self.run(SCHEMA_QUERY, database).await?;
        for schema_row in &schemas {
            let schema_name = required_text(schema_row, "schemaname")?;

            let table_query = format!(
                "SELECT tablename FROM pg_tables WHERE schemaname = {};",
                quote_literal(schema_name)
            );
            let tables = self.run(&table_query, database).await?;
            debug!(schema = schema_name, tables = tables.len(), "walking schema");

            for table_row in &tables {
                let table_name = required_text(table_row, "tablename")?;
                entries.push(
                    self.describe_table(database, schema_name, table_name)
                        .await?,
                );
            }
        }

        Ok(entries)
    }

    /// Build one table's entry from its column metadata.
    async fn describe_table(
        &self,
        database: &str,
        schema_name: &str,
        table_name: &str,
    ) -> Result<TableSchemaEntry, QueryError> {
        let column_query = format!(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {};",
            quote_literal(schema_name),
            quote_literal(table_name)
        );
        let columns = self.run(&column_query, database).await?;

        let mut column_map = serde_json::Map::new();
        for column_row in &columns {
            let name = required_text(column_row, "column_name")?;
            let data_type = required_text(column_row, "data_type")?;
            column_map.insert(name.to_string(), Value::String(data_type.to_string()));
        }

        Ok(TableSchemaEntry {
            table: format!("{schema_name}.{table_name}"),
            schema: Value::Object(column_map).to_string(),
        })
    }

    async fn run(&self, sql: &str, database: &str) -> Result<Vec<ResultRow>, QueryError> {
        self.executor.execute(sql, database, None, None, None).await
    }
}

/// Read a string column from a catalog row.
fn required_text<'a>(row: &'a ResultRow, column: &str) -> Result<&'a str, QueryError> {
    row.get(column)
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::Catalog(format!("missing column {column}")))
}

//! SQL template rewriting.
//!
//! Rewrites `!TOKEN!` placeholders in a map's SQL into positional-argument
//! PostgreSQL (`$1`, `$2`, ...) using the values bound in [`QueryParams`].
//!
//! # Resolution rules
//!
//! Each distinct token is resolved once per call, in order of first
//! appearance, and every occurrence gets the same replacement:
//!
//! - `!TASKID!` becomes the task's table name, provided it matches
//!   `^[A-Za-z0-9_]+$`. Otherwise the token is left in place and a warning
//!   is logged.
//! - `!COLUMNS!` becomes the quoted column list of that table, minus the
//!   geometry column and `id`. Only [`QueryParams::replace_params_with_columns`]
//!   resolves it.
//! - Any other bound token pushes its value onto the argument list once and
//!   is replaced by its fragment with `?` turned into `$N`.
//! - Unbound tokens are left untouched.
//!
//! # Example
//!
//! ```
//! use tilecache::sql::{QueryParameterValue, QueryParams, SqlValue};
//!
//! let mut params = QueryParams::new();
//! params.set_task_id("task_42");
//! params.insert(QueryParameterValue {
//!     token: "!CLASS!".to_string(),
//!     sql: "class = ?".to_string(),
//!     value: SqlValue::Text("road".to_string()),
//!     raw_param: "class".to_string(),
//!     raw_value: "road".to_string(),
//! });
//!
//! let mut args = Vec::new();
//! let sql = params.replace_params("SELECT * FROM !TASKID! WHERE !CLASS!", &mut args);
//! assert_eq!(sql, "SELECT * FROM task_42 WHERE class = $1");
//! assert_eq!(args, vec![SqlValue::Text("road".to_string())]);
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::warn;

use super::introspect::ColumnIntrospector;
use super::params::{QueryParams, SqlValue, COLUMNS_TOKEN, TASK_ID_TOKEN};
use super::TemplateError;

/// Columns never included in a `!COLUMNS!` expansion besides the geometry.
const ID_COLUMN: &str = "id";

/// Pattern matching any `!TOKEN!` in a template.
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"![a-zA-Z0-9_-]+!").unwrap())
}

/// Pattern a table name must match before it is spliced into SQL.
fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap())
}

/// Whether `value` is safe to use as a bare SQL identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    identifier_pattern().is_match(value)
}

/// Whether `value` is exactly one `!TOKEN!`.
pub fn is_valid_token(value: &str) -> bool {
    token_pattern()
        .find(value)
        .is_some_and(|m| m.start() == 0 && m.end() == value.len())
}

/// Quote and join column names, skipping the geometry column and `id`.
pub fn column_list(columns: &[String], geometry_field: &str) -> String {
    columns
        .iter()
        .filter(|c| c.as_str() != geometry_field && c.as_str() != ID_COLUMN)
        .map(|c| format!("\"{}\"", c.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(", ")
}

impl QueryParams {
    /// Rewrite `sql`, appending positional arguments to `args`.
    ///
    /// `!COLUMNS!` is left untouched; use
    /// [`replace_params_with_columns`](Self::replace_params_with_columns)
    /// when the template needs it.
    pub fn replace_params(&self, sql: &str, args: &mut Vec<SqlValue>) -> String {
        self.rewrite(sql, None, args)
    }

    /// Rewrite `sql`, resolving `!COLUMNS!` through `introspector`.
    ///
    /// # Errors
    ///
    /// `TemplateError::Introspection` if the column lookup fails. No
    /// arguments are appended in that case.
    pub async fn replace_params_with_columns(
        &self,
        sql: &str,
        introspector: &dyn ColumnIntrospector,
        geometry_field: &str,
        args: &mut Vec<SqlValue>,
    ) -> Result<String, TemplateError> {
        let columns = if sql.contains(COLUMNS_TOKEN) {
            match self.task_table() {
                Some(table) => {
                    let columns = introspector.columns(table).await?;
                    Some(column_list(&columns, geometry_field))
                }
                None => {
                    warn!(
                        token = COLUMNS_TOKEN,
                        "No valid task table bound, leaving column token in place"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(self.rewrite(sql, columns.as_deref(), args))
    }

    fn rewrite(&self, sql: &str, columns: Option<&str>, args: &mut Vec<SqlValue>) -> String {
        // Call-local memo: argument positions depend on `args` as it stood
        // when the token was first seen.
        let mut memo: HashMap<&str, Option<String>> = HashMap::new();

        for found in token_pattern().find_iter(sql) {
            let token = found.as_str();
            if memo.contains_key(token) {
                continue;
            }
            let resolved = self.resolve(token, columns, args);
            memo.insert(token, resolved);
        }

        token_pattern()
            .replace_all(sql, |caps: &Captures<'_>| {
                let token = &caps[0];
                match memo.get(token) {
                    Some(Some(replacement)) => replacement.clone(),
                    _ => token.to_string(),
                }
            })
            .into_owned()
    }

    fn resolve(&self, token: &str, columns: Option<&str>, args: &mut Vec<SqlValue>) -> Option<String> {
        match token {
            TASK_ID_TOKEN => {
                let bound = self.get(token)?;
                if !is_valid_identifier(&bound.raw_value) {
                    warn!(
                        token,
                        value = %bound.raw_value,
                        "Task id is not a valid identifier, skipping substitution"
                    );
                    return None;
                }
                Some(bound.raw_value.clone())
            }
            COLUMNS_TOKEN => columns.map(str::to_string),
            _ => {
                let bound = self.get(token)?;
                args.push(bound.value.clone());
                Some(bound.sql.replace('?', &format!("${}", args.len())))
            }
        }
    }
}

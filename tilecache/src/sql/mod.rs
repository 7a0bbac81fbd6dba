//! SQL parameter templating.
//!
//! Map queries are written as templates with `!TOKEN!` placeholders. Before
//! a query runs, the tokens are rewritten against the values bound for that
//! request: reserved tokens become task-scoped identifiers, every other
//! bound token becomes a fragment with a `$N` positional argument.
//!
//! ```text
//! SELECT !COLUMNS! FROM !TASKID! WHERE !CLASS!
//!        │           │              │
//!        │           │              └─ "class = ?"  ──► class = $1, args = ["road"]
//!        │           └─ task id, validated ──────────► task_42
//!        └─ information_schema lookup ───────────────► "name", "class"
//! ```

mod introspect;
mod params;
mod template;

pub use introspect::{ColumnIntrospector, PostgresColumnIntrospector};
pub use params::{
    ParamKind, QueryParameter, QueryParameterValue, QueryParams, SqlValue, COLUMNS_TOKEN,
    TASK_ID_TOKEN, X_TOKEN, Y_TOKEN, ZOOM_TOKEN,
};
pub use template::{column_list, is_valid_identifier, is_valid_token};

use thiserror::Error;

/// Errors raised while binding or rewriting a query template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// A request value could not be parsed for its parameter type.
    #[error("invalid value '{value}' for parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// A parameter definition is malformed.
    #[error("invalid parameter definition: {0}")]
    InvalidDefinition(String),

    /// The column lookup for `!COLUMNS!` failed.
    #[error("column introspection failed: {0}")]
    Introspection(String),
}

//! Query parameter definitions and resolved values.
//!
//! A [`QueryParameter`] is configuration: "the `zoom_min` request parameter
//! fills token `!MINZ!` with fragment `min_zoom >= ?`, parsed as an int".
//! A [`QueryParameterValue`] is that definition bound to a concrete value
//! for one request. [`QueryParams`] holds the bound values by token.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::template::{is_valid_identifier, is_valid_token};
use super::TemplateError;

/// Reserved token replaced by the task's table name.
pub const TASK_ID_TOKEN: &str = "!TASKID!";

/// Reserved token replaced by the task table's column list.
pub const COLUMNS_TOKEN: &str = "!COLUMNS!";

/// Tile address tokens bound automatically by the PostGIS generator.
pub const ZOOM_TOKEN: &str = "!ZOOM!";
pub const X_TOKEN: &str = "!X!";
pub const Y_TOKEN: &str = "!Y!";

const RESERVED_TOKENS: [&str; 5] = [TASK_ID_TOKEN, COLUMNS_TOKEN, ZOOM_TOKEN, X_TOKEN, Y_TOKEN];

/// A value bound to a positional SQL argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
        }
    }
}

/// How a raw request value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    String,
}

impl ParamKind {
    /// Parse a raw request value into a typed SQL value.
    pub fn parse(&self, raw: &str) -> Result<SqlValue, String> {
        match self {
            ParamKind::Int => raw
                .trim()
                .parse()
                .map(SqlValue::Int)
                .map_err(|_| "expected an integer".to_string()),
            ParamKind::Float => raw
                .trim()
                .parse()
                .map(SqlValue::Float)
                .map_err(|_| "expected a number".to_string()),
            ParamKind::Bool => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(SqlValue::Bool(true)),
                "false" | "0" | "no" => Ok(SqlValue::Bool(false)),
                _ => Err("expected true or false".to_string()),
            },
            ParamKind::String => Ok(SqlValue::Text(raw.to_string())),
        }
    }
}

impl FromStr for ParamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int" | "integer" => Ok(ParamKind::Int),
            "float" | "number" => Ok(ParamKind::Float),
            "bool" | "boolean" => Ok(ParamKind::Bool),
            "string" | "text" => Ok(ParamKind::String),
            other => Err(format!(
                "unknown parameter type '{}': expected int, float, bool or string",
                other
            )),
        }
    }
}

/// Configured mapping from a request parameter to a SQL token.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    /// Request parameter name.
    pub name: String,
    /// Token in the SQL template, e.g. `!MINZ!`.
    pub token: String,
    /// Fragment substituted for the token; `?` marks the argument position.
    pub sql: String,
    pub kind: ParamKind,
    /// Raw value used when the request omits the parameter.
    pub default: Option<String>,
}

impl QueryParameter {
    /// Create a definition, checking the token shape and the fragment.
    pub fn new(
        name: impl Into<String>,
        token: impl Into<String>,
        sql: impl Into<String>,
        kind: ParamKind,
    ) -> Result<Self, TemplateError> {
        let param = Self {
            name: name.into(),
            token: token.into(),
            sql: sql.into(),
            kind,
            default: None,
        };

        if !is_valid_token(&param.token) {
            return Err(TemplateError::InvalidDefinition(format!(
                "token '{}' must look like !NAME!",
                param.token
            )));
        }
        if RESERVED_TOKENS.contains(&param.token.as_str()) {
            return Err(TemplateError::InvalidDefinition(format!(
                "token '{}' is reserved",
                param.token
            )));
        }
        if param.sql.matches('?').count() != 1 {
            return Err(TemplateError::InvalidDefinition(format!(
                "fragment for '{}' must contain exactly one '?'",
                param.token
            )));
        }

        Ok(param)
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// One token bound to a value for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameterValue {
    pub token: String,
    /// Fragment with a single `?` placeholder.
    pub sql: String,
    pub value: SqlValue,
    /// Request parameter name the value came from.
    pub raw_param: String,
    /// Value as it appeared in the request.
    pub raw_value: String,
}

/// Bound parameter values keyed by token. Each token appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: HashMap<String, QueryParameterValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind values for `definitions` from decoded request pairs.
    ///
    /// Parameters absent from the request fall back to their default; a
    /// parameter with neither is left unbound and its token stays inert.
    /// `task_id`, when present, is bound to [`TASK_ID_TOKEN`].
    ///
    /// # Errors
    ///
    /// `TemplateError::InvalidParameter` if a value does not parse for its kind.
    pub fn from_request(
        definitions: &[QueryParameter],
        pairs: &[(String, String)],
        task_id: Option<&str>,
    ) -> Result<Self, TemplateError> {
        let mut params = Self::new();

        for def in definitions {
            let raw = pairs
                .iter()
                .find(|(name, _)| *name == def.name)
                .map(|(_, value)| value.clone())
                .or_else(|| def.default.clone());

            let Some(raw) = raw else {
                continue;
            };

            let value = def
                .kind
                .parse(&raw)
                .map_err(|reason| TemplateError::InvalidParameter {
                    name: def.name.clone(),
                    value: raw.clone(),
                    reason,
                })?;

            params.insert(QueryParameterValue {
                token: def.token.clone(),
                sql: def.sql.clone(),
                value,
                raw_param: def.name.clone(),
                raw_value: raw,
            });
        }

        if let Some(task_id) = task_id.filter(|t| !t.is_empty()) {
            params.set_task_id(task_id);
        }

        Ok(params)
    }

    /// Bind the task id to [`TASK_ID_TOKEN`].
    pub fn set_task_id(&mut self, task_id: &str) {
        self.insert(QueryParameterValue {
            token: TASK_ID_TOKEN.to_string(),
            sql: String::new(),
            value: SqlValue::Text(task_id.to_string()),
            raw_param: "task_id".to_string(),
            raw_value: task_id.to_string(),
        });
    }

    /// Bind an integer to a built-in token with a bare `?` fragment.
    pub fn set_int(&mut self, token: &str, value: i64) {
        self.insert(QueryParameterValue {
            token: token.to_string(),
            sql: "?".to_string(),
            value: SqlValue::Int(value),
            raw_param: token.trim_matches('!').to_lowercase(),
            raw_value: value.to_string(),
        });
    }

    /// Insert a bound value, replacing any previous binding of its token.
    pub fn insert(&mut self, value: QueryParameterValue) -> Option<QueryParameterValue> {
        self.values.insert(value.token.clone(), value)
    }

    pub fn get(&self, token: &str) -> Option<&QueryParameterValue> {
        self.values.get(token)
    }

    /// Validated table name bound to [`TASK_ID_TOKEN`], if any.
    pub fn task_table(&self) -> Option<&str> {
        self.get(TASK_ID_TOKEN)
            .map(|v| v.raw_value.as_str())
            .filter(|table| is_valid_identifier(table))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(ParamKind::Int.parse(" 42 "), Ok(SqlValue::Int(42)));
        assert_eq!(ParamKind::Float.parse("1.5"), Ok(SqlValue::Float(1.5)));
        assert_eq!(ParamKind::Bool.parse("TRUE"), Ok(SqlValue::Bool(true)));
        assert_eq!(ParamKind::Bool.parse("0"), Ok(SqlValue::Bool(false)));
        assert_eq!(
            ParamKind::String.parse("a b"),
            Ok(SqlValue::Text("a b".to_string()))
        );
        assert!(ParamKind::Int.parse("4.2").is_err());
        assert!(ParamKind::Bool.parse("maybe").is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("integer".parse::<ParamKind>(), Ok(ParamKind::Int));
        assert_eq!("TEXT".parse::<ParamKind>(), Ok(ParamKind::String));
        assert!("date".parse::<ParamKind>().is_err());
    }

    #[test]
    fn test_definition_validation() {
        assert!(QueryParameter::new("class", "!CLASS!", "class = ?", ParamKind::String).is_ok());
        assert!(QueryParameter::new("class", "CLASS", "class = ?", ParamKind::String).is_err());
        assert!(QueryParameter::new("t", "!TASKID!", "x = ?", ParamKind::String).is_err());
        assert!(QueryParameter::new("class", "!CLASS!", "class = 1", ParamKind::String).is_err());
        assert!(
            QueryParameter::new("class", "!CLASS!", "class IN (?, ?)", ParamKind::String).is_err()
        );
    }

    #[test]
    fn test_from_request_binds_values_and_defaults() {
        let defs = vec![
            QueryParameter::new("class", "!CLASS!", "class = ?", ParamKind::String).unwrap(),
            QueryParameter::new("minarea", "!MINAREA!", "area >= ?", ParamKind::Float)
                .unwrap()
                .with_default("0"),
            QueryParameter::new("limit", "!LIMIT!", "LIMIT ?", ParamKind::Int).unwrap(),
        ];

        let params =
            QueryParams::from_request(&defs, &pairs(&[("class", "road")]), Some("task_1")).unwrap();

        assert_eq!(params.len(), 3);
        assert_eq!(
            params.get("!CLASS!").unwrap().value,
            SqlValue::Text("road".to_string())
        );
        assert_eq!(params.get("!MINAREA!").unwrap().value, SqlValue::Float(0.0));
        assert!(params.get("!LIMIT!").is_none());
        assert_eq!(params.task_table(), Some("task_1"));
    }

    #[test]
    fn test_from_request_rejects_unparseable_value() {
        let defs =
            vec![QueryParameter::new("limit", "!LIMIT!", "LIMIT ?", ParamKind::Int).unwrap()];

        let err = QueryParams::from_request(&defs, &pairs(&[("limit", "ten")]), None).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidParameter { ref name, .. } if name == "limit"));
    }

    #[test]
    fn test_task_table_requires_valid_identifier() {
        let mut params = QueryParams::new();
        params.set_task_id("t1; DROP TABLE x");
        assert!(params.task_table().is_none());

        params.set_task_id("task_2024");
        assert_eq!(params.task_table(), Some("task_2024"));
    }

    #[test]
    fn test_empty_task_id_not_bound() {
        let params = QueryParams::from_request(&[], &[], Some("")).unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_insert_replaces_same_token() {
        let mut params = QueryParams::new();
        params.set_int(ZOOM_TOKEN, 3);
        let previous = params.insert(QueryParameterValue {
            token: ZOOM_TOKEN.to_string(),
            sql: "?".to_string(),
            value: SqlValue::Int(4),
            raw_param: "zoom".to_string(),
            raw_value: "4".to_string(),
        });

        assert_eq!(previous.map(|p| p.value), Some(SqlValue::Int(3)));
        assert_eq!(params.len(), 1);
    }
}

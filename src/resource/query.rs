//! Translate list query parameters into a filtered SQL query.

use std::collections::HashMap;

use rusqlite::types::Value as SqlValue;

use super::ResourceError;

pub type QueryParams = HashMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Integer,
    Text,
    Boolean,
}

/// A query parameter a resource accepts and the column it filters on.
#[derive(Clone, Copy, Debug)]
pub struct Filter {
    pub param: &'static str,
    pub column: &'static str,
    pub kind: FilterKind,
}

impl Filter {
    pub const fn integer(param: &'static str, column: &'static str) -> Self {
        Self {
            param,
            column,
            kind: FilterKind::Integer,
        }
    }

    pub const fn text(param: &'static str, column: &'static str) -> Self {
        Self {
            param,
            column,
            kind: FilterKind::Text,
        }
    }

    pub const fn boolean(param: &'static str, column: &'static str) -> Self {
        Self {
            param,
            column,
            kind: FilterKind::Boolean,
        }
    }

    fn parse(&self, raw: &str) -> Result<SqlValue, ResourceError> {
        let invalid = || ResourceError::validation(format!("Invalid value for {}", self.param));
        match self.kind {
            FilterKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|_| invalid()),
            FilterKind::Text => Ok(SqlValue::Text(raw.to_string())),
            FilterKind::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(SqlValue::Integer(1)),
                "false" | "0" => Ok(SqlValue::Integer(0)),
                _ => Err(invalid()),
            },
        }
    }
}

/// Conjunction of `column = ?` clauses and their bound values.
#[derive(Debug, Default)]
pub struct Query {
    clauses: Vec<String>,
    values: Vec<SqlValue>,
}

impl Query {
    /// Apply every filter present in `params`, in the order the filters
    /// are declared. Unknown parameters are ignored.
    pub fn from_params(params: &QueryParams, filters: &[Filter]) -> Result<Self, ResourceError> {
        let mut query = Self::default();
        for filter in filters {
            if let Some(raw) = params.get(filter.param) {
                let value = filter.parse(raw)?;
                query = query.and(format!("{} = ?", filter.column), value);
            }
        }
        Ok(query)
    }

    pub fn and(mut self, clause: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.clauses.push(clause.into());
        self.values.push(value.into());
        self
    }

    /// Either an empty string or ` WHERE ...` ready to append to a
    /// `SELECT`.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

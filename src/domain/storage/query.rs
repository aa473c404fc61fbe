//! Filtered and paginated listing parameters

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

/// Sort value that disables the total count query
pub const IGNORE_COUNT: &str = "ignore count";

/// Upper bound for a page size
pub const MAX_LIMIT: u32 = 1000;

const DEFAULT_LIMIT: u32 = 10;
const DEFAULT_SORT: &str = "-id";

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_sort() -> String {
    DEFAULT_SORT.to_string()
}

/// Comparison operator of a column filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "=", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "neq")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "in")]
    In,
}

impl Operator {
    /// SQL spelling of the operator for the comparison operators
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
        }
    }
}

/// How a filter joins the filters before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    #[serde(alias = "&&")]
    And,
    #[serde(alias = "||")]
    Or,
}

/// A single `column <exp> value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub name: String,
    #[serde(default)]
    pub exp: Operator,
    pub value: Value,
    #[serde(default)]
    pub logic: Logic,
}

impl ColumnFilter {
    pub fn new(name: impl Into<String>, exp: Operator, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            exp,
            value: value.into(),
            logic: Logic::And,
        }
    }

    /// Equality filter
    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Eq, value)
    }

    /// Joins this filter to the previous ones with OR
    pub fn or(mut self) -> Self {
        self.logic = Logic::Or;
        self
    }

    /// Evaluates the filter against a record's JSON object
    pub fn matches(&self, record: &Value) -> bool {
        self.test(record, self.like_pattern().as_ref())
    }

    fn like_pattern(&self) -> Option<Regex> {
        match self.exp {
            Operator::Like => self.value.as_str().and_then(like_to_regex),
            _ => None,
        }
    }

    fn test(&self, record: &Value, pattern: Option<&Regex>) -> bool {
        let field = record.get(&self.name).unwrap_or(&Value::Null);

        match self.exp {
            Operator::Eq => json_eq(field, &self.value),
            Operator::Ne => !json_eq(field, &self.value),
            Operator::Gt => compare_json(field, &self.value) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare_json(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => compare_json(field, &self.value) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare_json(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Like => match (field.as_str(), pattern) {
                (Some(text), Some(re)) => re.is_match(text),
                _ => false,
            },
            Operator::In => self
                .value
                .as_array()
                .map(|values| values.iter().any(|v| json_eq(field, v)))
                .unwrap_or(false),
        }
    }
}

/// One `ORDER BY` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Listing parameters: page, page size, sort expression and column filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Zero-based page number
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Comma separated columns, `-` prefix for descending, or `ignore count`
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub columns: Vec<ColumnFilter>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: 0,
            limit: DEFAULT_LIMIT,
            sort: default_sort(),
            columns: Vec::new(),
        }
    }
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn with_column(mut self, filter: ColumnFilter) -> Self {
        self.columns.push(filter);
        self
    }

    /// Whether the total count should be computed
    pub fn counts_total(&self) -> bool {
        self.sort.trim() != IGNORE_COUNT
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.limit)
    }

    /// Parsed sort terms; falls back to `-id` when empty or `ignore count`
    pub fn sort_keys(&self) -> Vec<SortKey> {
        let sort = self.sort.trim();
        let sort = if sort.is_empty() || sort == IGNORE_COUNT {
            DEFAULT_SORT
        } else {
            sort
        };

        sort.split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| match term.strip_prefix('-') {
                Some(column) => SortKey {
                    column: column.trim().to_string(),
                    descending: true,
                },
                None => SortKey {
                    column: term.trim_start_matches('+').to_string(),
                    descending: false,
                },
            })
            .collect()
    }

    /// Checks page bounds and that every referenced column is whitelisted
    pub fn validate(&self, whitelist: &[&str]) -> Result<(), DomainError> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        for key in self.sort_keys() {
            if !whitelist.contains(&key.column.as_str()) {
                return Err(DomainError::validation(format!(
                    "sort column '{}' is not allowed",
                    key.column
                )));
            }
        }

        for filter in &self.columns {
            if !whitelist.contains(&filter.name.as_str()) {
                return Err(DomainError::validation(format!(
                    "filter column '{}' is not allowed",
                    filter.name
                )));
            }

            match filter.exp {
                Operator::In if !filter.value.is_array() => {
                    return Err(DomainError::validation(format!(
                        "'in' filter on '{}' requires an array value",
                        filter.name
                    )));
                }
                Operator::Like if !filter.value.is_string() => {
                    return Err(DomainError::validation(format!(
                        "'like' filter on '{}' requires a string value",
                        filter.name
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Prepares the filters for evaluation over many records
    pub fn matcher(&self) -> RecordMatcher<'_> {
        RecordMatcher {
            filters: self
                .columns
                .iter()
                .map(|filter| (filter, filter.like_pattern()))
                .collect(),
        }
    }

    /// Evaluates all filters left to right against a record's JSON object
    pub fn matches(&self, record: &Value) -> bool {
        self.matcher().matches(record)
    }
}

/// Column filters with their `like` patterns compiled once
#[derive(Debug)]
pub struct RecordMatcher<'a> {
    filters: Vec<(&'a ColumnFilter, Option<Regex>)>,
}

impl RecordMatcher<'_> {
    /// Evaluates all filters left to right against a record's JSON object
    pub fn matches(&self, record: &Value) -> bool {
        let mut filters = self.filters.iter();

        let Some((first, pattern)) = filters.next() else {
            return true;
        };

        filters.fold(
            first.test(record, pattern.as_ref()),
            |acc, (filter, pattern)| match filter.logic {
                Logic::And => acc && filter.test(record, pattern.as_ref()),
                Logic::Or => acc || filter.test(record, pattern.as_ref()),
            },
        )
    }
}

fn json_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// Orders two JSON scalars of the same type; `None` for mixed or non-scalar values
pub fn compare_json(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn like_to_regex(pattern: &str) -> Option<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');

    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }

    expr.push('$');
    Regex::new(&expr).ok()
}

//! Filter expression language.
//!
//! Expressions such as `active:eq:Y and admin:eq:Y` are parsed into a [`FilterNode`]
//! tree and compiled into parameterised SQL for a [`FilterTarget`] table.

pub mod ast;
mod lexer;
pub mod parser;
pub mod sql;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{CacheStats, ExpiringLruCache};

pub use ast::FilterNode;
pub use sql::{push_filter, FilterTarget};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("empty filter expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("filter nested too deeply at position {pos}")]
    TooDeep { pos: usize },

    #[error("filter has too many conditions at position {pos}")]
    TooLarge { pos: usize },

    #[error("unexpected end of filter expression")]
    UnexpectedEnd,

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("{operator} operator requires {expected}, got {found}")]
    Arity {
        operator: String,
        expected: &'static str,
        found: usize,
    },

    #[error("unknown field '{field}' for {table}")]
    UnknownField { field: String, table: &'static str },
}

/// Parses filter expressions, memoising successful parses.
#[derive(Debug)]
pub struct FilterCache {
    cache: ExpiringLruCache<String, Arc<FilterNode>>,
}

impl FilterCache {
    pub fn new(max_size: usize, lifetime: Duration) -> Self {
        Self {
            cache: ExpiringLruCache::new(max_size, lifetime),
        }
    }

    /// Parse `expr`. Blank or absent expressions mean "no filter".
    pub fn parse(&self, expr: Option<&str>) -> Result<Option<Arc<FilterNode>>, FilterError> {
        let Some(expr) = expr.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(None);
        };

        let key = expr.to_string();
        self.cache
            .get_or_try_insert_with(&key, || parser::parse(expr).map(Arc::new))
            .map(Some)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new(128, Duration::from_secs(200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_means_no_filter() {
        let cache = FilterCache::default();
        assert_eq!(cache.parse(None).unwrap(), None);
        assert_eq!(cache.parse(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_repeated_parse_hits_cache() {
        let cache = FilterCache::default();
        let first = cache.parse(Some("active:eq:Y")).unwrap().unwrap();
        let second = cache.parse(Some("active:eq:Y")).unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_failed_parse_is_not_cached() {
        let cache = FilterCache::default();
        assert!(cache.parse(Some("active:eq")).is_err());
        assert_eq!(cache.stats().entries, 0);
    }
}

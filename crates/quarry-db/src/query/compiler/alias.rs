//! Per-pass table alias allocation.

use std::collections::HashMap;

/// Maps alias tokens to table aliases for one compilation pass.
///
/// Aliases are minted on first request as `t0`, `t1`, ... so the numbering
/// follows the order in which the compiler first touches each table. A cache
/// is created by every assembler call and dropped when it returns.
///
/// # Examples
///
/// ```
/// use quarry_db::query::compiler::AliasCache;
///
/// let mut cache = AliasCache::new();
/// assert_eq!(cache.alias("17"), "t0");
/// assert_eq!(cache.alias("4"), "t1");
/// assert_eq!(cache.alias("17"), "t0");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AliasCache {
    aliases: HashMap<String, String>,
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the alias of `token`, minting the next one if it is new.
    pub fn alias(&mut self, token: &str) -> String {
        let next = self.aliases.len();
        self.aliases
            .entry(token.to_string())
            .or_insert_with(|| format!("t{next}"))
            .clone()
    }

    /// Returns the alias of `token` without minting one.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.aliases.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

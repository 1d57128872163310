//! Cache key schema
//!
//! Post entries: `post{id}`
//! Search result pages: `search:{from}:{size}:{query}`
//!
//! The two families never share a prefix, so pattern invalidation of one
//! cannot touch the other.

/// Prefix shared by every single-post key.
const POST_PREFIX: &str = "post";

/// Prefix shared by every cached search page.
const SEARCH_PREFIX: &str = "search:";

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Single post entry
    /// Format: post{id}
    pub fn post(post_id: i64) -> String {
        format!("{}{}", POST_PREFIX, post_id)
    }

    /// Cached page of search results. Pagination is part of the key so
    /// different pages of the same query do not overwrite each other.
    /// Format: search:{from}:{size}:{query}
    pub fn search(query: &str, from: i64, size: i64) -> String {
        format!("{}{}:{}:{}", SEARCH_PREFIX, from, size, query.trim())
    }

    /// Pattern matching every cached search page
    pub fn search_pattern() -> String {
        format!("{}*", SEARCH_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_key_format() {
        assert_eq!(CacheKey::post(42), "post42");
    }

    #[test]
    fn test_search_key_includes_pagination() {
        let first = CacheKey::search("rust async", 0, 10);
        let second = CacheKey::search("rust async", 10, 10);

        assert_eq!(first, "search:0:10:rust async");
        assert_ne!(first, second);
    }

    #[test]
    fn test_search_keys_do_not_collide_with_posts() {
        let key = CacheKey::search("7", 0, 10);
        assert!(!key.starts_with(POST_PREFIX));
        assert_ne!(key, CacheKey::post(7));
    }

    #[test]
    fn test_search_pattern_covers_only_search_pages() {
        let pattern = CacheKey::search_pattern();
        let prefix = pattern.trim_end_matches('*');

        assert_eq!(pattern, "search:*");
        assert!(CacheKey::search("rust", 0, 10).starts_with(prefix));
        assert!(!CacheKey::post(1).starts_with(prefix));
    }
}

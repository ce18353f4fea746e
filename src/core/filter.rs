//! Environment allow/block filter.
//!
//! Decides whether runs from an environment are blocked from notifying.
//! Patterns are shell globs (`*`, `?`, `[...]`) matched against the whole
//! environment name.

use regex::Regex;

use crate::error::{Result, SnowgateError};

/// Sentinel list entry matching every environment.
pub const ALL: &str = "all";

/// Sentinel list entry matching no environment.
pub const NONE: &str = "none";

/// Allow and block lists from operator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFilter {
    allow: Vec<String>,
    block: Vec<String>,
}

impl EnvironmentFilter {
    pub fn new(allow: Vec<String>, block: Vec<String>) -> Self {
        Self { allow, block }
    }

    /// Whether runs from `environment` must not notify.
    pub fn is_blocked(&self, environment: &str) -> Result<bool> {
        is_blocked(environment, &self.allow, &self.block)
    }
}

fn is_sentinel(patterns: &[String], sentinel: &str) -> bool {
    patterns.len() == 1 && patterns[0] == sentinel
}

/// Whether runs from `environment` are blocked by the allow/block lists.
///
/// Sentinels are checked first, in this order: allow `["all"]`, block
/// `["all"]`, block `["none"]`, allow `["none"]`. Otherwise the two lists
/// are walked position by position: a block match at a position sets the
/// result to blocked, then an allow match at the same position clears it.
/// Positions where neither matches leave the result alone, so the last
/// matching position decides. A position missing from the shorter list
/// never matches.
///
// NOTE: an allow match at an early position is overridden by any later
// block match, and vice versa. Whether position should matter at all is
// an open question; existing deployments rely on it.
pub fn is_blocked(
    environment: &str,
    allow_patterns: &[String],
    block_patterns: &[String],
) -> Result<bool> {
    if is_sentinel(allow_patterns, ALL) {
        return Ok(false);
    }
    if is_sentinel(block_patterns, ALL) {
        return Ok(true);
    }
    if is_sentinel(block_patterns, NONE) {
        return Ok(false);
    }
    if is_sentinel(allow_patterns, NONE) {
        return Ok(true);
    }

    let compile_all = |patterns: &[String]| -> Result<Vec<Regex>> {
        patterns
            .iter()
            .map(|p| {
                compile_glob(p).map_err(|reason| {
                    SnowgateError::config(format!(
                        "invalid environment pattern '{}' ({}); allow_list: {:?}, block_list: {:?}",
                        p, reason, allow_patterns, block_patterns
                    ))
                })
            })
            .collect()
    };
    let allow = compile_all(allow_patterns)?;
    let block = compile_all(block_patterns)?;

    let matches = |list: &[Regex], i: usize| list.get(i).is_some_and(|re| re.is_match(environment));

    let mut blocked = false;
    for i in 0..allow.len().max(block.len()) {
        if matches(&block, i) {
            blocked = true;
        }
        if matches(&allow, i) {
            blocked = false;
        }
    }

    tracing::debug!(environment, blocked, "environment filter evaluated");
    Ok(blocked)
}

/// Translate a shell glob into an anchored regex.
fn compile_glob(pattern: &str) -> std::result::Result<Regex, String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => return Err("trailing escape".to_string()),
            },
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                let mut empty = true;
                for inner in chars.by_ref() {
                    match inner {
                        ']' if !empty => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | '&' | '~' => {
                            out.push('\\');
                            out.push(inner);
                        }
                        _ => out.push(inner),
                    }
                    empty = false;
                }
                if !closed {
                    return Err("unterminated character class".to_string());
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Regex::new(&out).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_allow_all_never_blocks() {
        assert!(!is_blocked("prod", &list(&["all"]), &[]).unwrap());
        assert!(!is_blocked("prod", &list(&["all"]), &list(&["all"])).unwrap());
    }

    #[test]
    fn test_block_all_always_blocks() {
        assert!(is_blocked("prod", &[], &list(&["all"])).unwrap());
    }

    #[test]
    fn test_block_none_never_blocks() {
        assert!(!is_blocked("prod", &list(&["none"]), &list(&["none"])).unwrap());
    }

    #[test]
    fn test_allow_none_always_blocks() {
        assert!(is_blocked("dev", &list(&["none"]), &list(&["env_filter"])).unwrap());
    }

    #[test]
    fn test_wildcard_allow_match() {
        assert!(!is_blocked("prod", &list(&["prod*"]), &[]).unwrap());
    }

    #[test]
    fn test_wildcard_block_match() {
        assert!(is_blocked("production", &[], &list(&["prod*"])).unwrap());
        assert!(is_blocked("dev1", &[], &list(&["dev?"])).unwrap());
        assert!(!is_blocked("dev12", &[], &list(&["dev?"])).unwrap());
    }

    #[test]
    fn test_allow_in_same_position_unblocks() {
        assert!(!is_blocked("prod", &list(&["prod"]), &list(&["p*"])).unwrap());
    }

    #[test]
    fn test_any_block_match_blocks() {
        assert!(is_blocked("production", &list(&["dev"]), &list(&["*tion", "*od"])).unwrap());
        assert!(is_blocked("prod", &[], &list(&["prod", "dev"])).unwrap());
    }

    #[test]
    fn test_last_matching_position_wins() {
        // block at position 0, allow at position 1
        assert!(!is_blocked("prod", &list(&["x", "prod"]), &list(&["prod", "y"])).unwrap());
        // allow at position 0 is overridden by a block at position 1
        assert!(is_blocked("prod", &list(&["prod", "x"]), &list(&["y", "prod"])).unwrap());
    }

    #[test]
    fn test_uneven_lists() {
        // allow has no entry at position 1, so the block match there stands
        assert!(is_blocked("prod", &list(&["prod"]), &list(&["x", "prod"])).unwrap());
        // block has no entry at position 1, the allow match there clears it
        assert!(!is_blocked("prod", &list(&["x", "prod"]), &list(&["prod"])).unwrap());
    }

    #[test]
    fn test_empty_lists_do_not_block() {
        assert!(!is_blocked("prod", &[], &[]).unwrap());
    }

    #[test]
    fn test_character_class() {
        assert!(is_blocked("dev1", &[], &list(&["dev[0-9]"])).unwrap());
        assert!(!is_blocked("devx", &[], &list(&["dev[0-9]"])).unwrap());
        assert!(is_blocked("devx", &[], &list(&["dev[!0-9]"])).unwrap());
    }

    #[test]
    fn test_literal_metacharacters() {
        assert!(is_blocked("a.b", &[], &list(&["a.b"])).unwrap());
        assert!(!is_blocked("axb", &[], &list(&["a.b"])).unwrap());
        assert!(is_blocked("a*b", &[], &list(&["a\\*b"])).unwrap());
    }

    #[test]
    fn test_malformed_glob_is_config_error() {
        let err = is_blocked("prod", &list(&["prod"]), &list(&["[prod"])).unwrap_err();
        assert!(err.is_config());
        let msg = err.to_string();
        assert!(msg.contains("allow_list"));
        assert!(msg.contains("block_list"));
        assert!(msg.contains("[prod"));
    }

    #[test]
    fn test_sentinel_short_circuits_before_glob_compilation() {
        assert!(!is_blocked("prod", &list(&["all"]), &list(&["[bad"])).unwrap());
    }

    #[test]
    fn test_filter_struct() {
        let filter = EnvironmentFilter::new(list(&["none"]), list(&["env_filter"]));
        assert!(filter.is_blocked("production").unwrap());
    }
}

//! Symbol universe resolution.
//!
//! Membership strategies are tried in order; the first one that yields at
//! least one symbol wins. Reference pages write class shares as `BRK.B`
//! while the price provider expects `BRK-B`, so every symbol is rewritten.

use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

use super::provider::MembershipProvider;

/// Separator used by reference pages for share classes.
pub const CLASS_SEPARATOR: char = '.';
/// Separator the price provider expects instead.
pub const PROVIDER_SEPARATOR: &str = "-";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no membership source produced symbols ({})", describe(.failures))]
    Unavailable { failures: Vec<(String, String)> },
}

fn describe(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "no sources configured".into();
    }
    failures
        .iter()
        .map(|(source, reason)| format!("{source}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Rewrite one raw symbol into provider form.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim()
        .replace(CLASS_SEPARATOR, PROVIDER_SEPARATOR)
}

/// Normalize, drop blanks, and de-duplicate keeping first occurrences.
pub fn normalize_symbols<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|s| normalize_symbol(s.as_ref()))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Resolve the symbol universe from the first strategy that yields symbols.
pub fn resolve_identifiers(
    strategies: &[&dyn MembershipProvider],
) -> Result<Vec<String>, SourceError> {
    let mut failures = Vec::new();

    for strategy in strategies {
        match strategy.members() {
            Ok(raw) => {
                let symbols = normalize_symbols(&raw);
                if symbols.is_empty() {
                    warn!(source = strategy.name(), "membership list is empty");
                    failures.push((strategy.name().to_string(), "empty list".to_string()));
                    continue;
                }
                info!(source = strategy.name(), count = symbols.len(), "resolved symbols");
                return Ok(symbols);
            }
            Err(e) => {
                warn!(source = strategy.name(), error = %e, "membership source failed");
                failures.push((strategy.name().to_string(), e.to_string()));
            }
        }
    }

    Err(SourceError::Unavailable { failures })
}

//! Identifier allocation
//!
//! Turns arbitrary labels into LookML-safe identifiers. A label yields a
//! finite sequence of candidates; the owning registry takes the first one
//! that is still free.

use crate::RegistryError;

/// Only this many leading characters of a label contribute to an identifier.
pub const MAX_LABEL_CHARS: usize = 60;

/// Upper bound on candidates per label (`base`, `base_1` .. `base_999`).
pub const MAX_CANDIDATES: usize = 1000;

/// Stands in for labels with no usable characters.
pub const BLANK_LABEL: &str = "unnamed";

/// Lazy, restartable sequence of identifier candidates for one label.
///
/// Clone it before consuming to walk the sequence a second time.
#[derive(Debug, Clone)]
pub struct Candidates {
    first: String,
    base: String,
    next: usize,
}

/// Build the candidate sequence for `label`. A label that maps to nothing
/// but underscores is allocated as [`BLANK_LABEL`].
pub fn candidates(label: &str) -> Candidates {
    let mut first = String::with_capacity(label.len().min(MAX_LABEL_CHARS));
    for ch in label.chars().take(MAX_LABEL_CHARS) {
        let mapped = map_char(ch);
        // runs of '_' collapse into one
        if mapped == '_' && first.ends_with('_') {
            continue;
        }
        first.push(mapped);
    }

    if first.trim_matches('_').is_empty() {
        return candidates(BLANK_LABEL);
    }
    let base = first.strip_suffix('_').unwrap_or(&first).to_string();

    Candidates {
        first,
        base,
        next: 0,
    }
}

fn map_char(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    if let (Some(l), None) = (lower.next(), lower.next()) {
        if l.is_ascii_lowercase() || l.is_ascii_digit() || l == '_' {
            return l;
        }
    }
    match ch {
        ' ' | '\'' | '"' | '(' | ')' | '-' | ':' => '_',
        _ => 'X',
    }
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let n = self.next;
        if n >= MAX_CANDIDATES {
            return None;
        }
        self.next += 1;
        if n == 0 {
            Some(self.first.clone())
        } else {
            Some(format!("{}_{}", self.base, n))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = MAX_CANDIDATES.saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Candidates {}

/// Pick the first candidate for `label` that `is_taken` rejects.
///
/// Fails with [`RegistryError::NamingExhausted`] once all candidates are taken.
pub fn allocate<F>(label: &str, is_taken: F) -> Result<String, RegistryError>
where
    F: Fn(&str) -> bool,
{
    candidates(label)
        .find(|candidate| !is_taken(candidate))
        .ok_or_else(|| RegistryError::NamingExhausted {
            label: label.to_string(),
            attempts: MAX_CANDIDATES,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_candidate() {
        let first = candidates("Order Date (Custom)!").next().unwrap();
        assert_eq!(first, "order_date_custom_X");
    }

    #[test]
    fn test_trailing_underscore_stripped_for_suffixes() {
        let names: Vec<String> = candidates("Sales (EU)").take(3).collect();
        assert_eq!(names, vec!["sales_eu_", "sales_eu_1", "sales_eu_2"]);
    }

    #[test]
    fn test_blank_label_is_never_empty() {
        let names: Vec<String> = candidates("").take(2).collect();
        assert_eq!(names, vec!["unnamed", "unnamed_1"]);
        assert_eq!(candidates("   ").next().unwrap(), "unnamed");
        assert_eq!(candidates("()").next().unwrap(), "unnamed");
        assert_eq!(allocate("", |c| c == "unnamed").unwrap(), "unnamed_1");
    }

    #[test]
    fn test_label_truncated_to_sixty_chars() {
        let label = "a".repeat(80);
        let first = candidates(&label).next().unwrap();
        assert_eq!(first.len(), MAX_LABEL_CHARS);
    }

    #[test]
    fn test_sequence_is_finite() {
        let all: Vec<String> = candidates("x").collect();
        assert_eq!(all.len(), MAX_CANDIDATES);
        assert_eq!(all.last().unwrap(), "x_999");
        assert_eq!(candidates("x").len(), MAX_CANDIDATES);
    }

    #[test]
    fn test_allocate_skips_taken() {
        let taken: HashSet<&str> = ["orders", "orders_1"].into_iter().collect();
        let name = allocate("Orders", |c| taken.contains(c)).unwrap();
        assert_eq!(name, "orders_2");
    }

    #[test]
    fn test_allocate_exhaustion_is_an_error() {
        let err = allocate("orders", |_| true).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::NamingExhausted { attempts: MAX_CANDIDATES, .. }
        ));
    }
}

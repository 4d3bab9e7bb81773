//! Keyword normalisation and the reserved keyword rows.

use std::collections::HashSet;
use std::hash::Hash;

/// Reserved keyword that stands for "no keyword". It is seeded when the
/// schema is created and never contributes to recommendations.
pub const SENTINEL_KEYWORD: &str = "";

/// Reserved keyword recorded against a product that has been deleted.
pub const DELETION_MARKER: &str = "DELETED";

/// Keywords seeded as reserved rows at schema initialisation.
pub const RESERVED_KEYWORDS: [&str; 2] = [SENTINEL_KEYWORD, DELETION_MARKER];

/// Drop empty strings and exact duplicates, keeping first-occurrence order.
pub fn dedup_keywords<I>(keywords: I) -> Vec<String>
where
  I: IntoIterator<Item = String>,
{
  let mut seen = HashSet::new();
  keywords
    .into_iter()
    .filter(|kw| !kw.is_empty())
    .filter(|kw| seen.insert(kw.clone()))
    .collect()
}

/// Drop repeated values, keeping first-occurrence order.
pub fn dedup_ids<T, I>(ids: I) -> Vec<T>
where
  T: Copy + Eq + Hash,
  I: IntoIterator<Item = T>,
{
  let mut seen = HashSet::new();
  ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn dedup_keywords_drops_empty_and_repeats() {
    let out = dedup_keywords(strings(&["", "fish", "cars", "", "fish", "Fish"]));
    assert_eq!(out, ["fish", "cars", "Fish"]);
  }

  #[test]
  fn dedup_ids_keeps_first_occurrence() {
    assert_eq!(dedup_ids([10, 3, 10, 7, 3]), [10, 3, 7]);
  }
}

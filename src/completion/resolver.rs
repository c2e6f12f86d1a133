//! Candidate resolution: root → ranked, capped, narrowed candidate list
//!
//! Pipeline (in order):
//! 1. Source selection: the shard for the root's first letter; if that shard
//!    is empty, the static fallback set (when configured)
//! 2. Filter: keep items whose prefix starts with the root
//! 3. Sort by the composite key `(exact prefix first, sort key, prefix, body)`
//!    so the order never depends on dictionary file order
//! 4. Deduplicate identical `(prefix, body)` pairs
//! 5. Cap at `suggest_limit`
//! 6. Exact-root narrowing: if any capped candidate is an exact-root hit, drop
//!    every candidate that is not
//!
//! An empty list is a normal outcome, never an error.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::{DEFAULT_SUGGEST_LIMIT, EngineConfig};
use crate::dictionary::{Bucket, BucketKey, BucketStore, DictionaryItem};

/// One resolved suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub prefix: String,

    /// Display label: the dictionary label, or `"<prefix> → <body>"`
    pub label: String,

    /// Text inserted in place of the root (the item body)
    pub insert_text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    /// Host-facing sort text, `"0" + (sortText | prefix)`
    pub sort_text: String,

    /// The prefix equals the typed root
    pub exact_prefix: bool,

    /// The dictionary label marks this entry as the full-root match
    /// (`label` begins with `root + " "`, ignoring ASCII case when matching
    /// is case-insensitive)
    pub exact_root_hit: bool,
}

/// Half-open column range replaced when a candidate is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ColumnRange {
    pub start: usize,
    pub end: usize,
}

/// Candidates resolved for one root
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CandidateList {
    pub root: String,
    pub replace: ColumnRange,
    pub items: Vec<Candidate>,
}

impl CandidateList {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn empty_for(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.replace = ColumnRange { start, end };
        self
    }

    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|c| c.label.as_str()).collect()
    }
}

/// Matching and ranking knobs
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub suggest_limit: usize,
    pub min_root_len: usize,
    pub case_insensitive: bool,
    /// Give up on a loading shard after this long
    pub load_wait: Option<Duration>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            suggest_limit: DEFAULT_SUGGEST_LIMIT,
            min_root_len: 1,
            case_insensitive: false,
            load_wait: None,
        }
    }
}

impl From<&EngineConfig> for ResolverOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            suggest_limit: config.suggest_limit,
            min_root_len: config.min_root_len,
            case_insensitive: config.case_insensitive,
            load_wait: config.load_wait(),
        }
    }
}

/// Resolves roots against the bucket store (and optional fallback set)
#[derive(Debug)]
pub struct CandidateResolver {
    store: Arc<BucketStore>,
    fallback: Option<Bucket>,
    options: ResolverOptions,
}

impl CandidateResolver {
    pub fn new(store: Arc<BucketStore>, options: ResolverOptions) -> Self {
        Self {
            store,
            fallback: None,
            options,
        }
    }

    /// Use `items` whenever the shard for a root's letter is empty
    pub fn with_fallback(mut self, items: Vec<DictionaryItem>) -> Self {
        self.fallback = (!items.is_empty()).then(|| Arc::from(items));
        self
    }

    pub fn store(&self) -> &Arc<BucketStore> {
        &self.store
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Whether `root` is long enough to be looked up at all
    pub fn accepts(&self, root: &str) -> bool {
        root.chars().count() >= self.options.min_root_len && BucketKey::for_root(root).is_some()
    }

    /// Resolve `root` to a candidate list
    pub async fn resolve(&self, root: &str) -> CandidateList {
        if !self.accepts(root) {
            return CandidateList::empty_for(root);
        }
        let Some(key) = BucketKey::for_root(root) else {
            return CandidateList::empty_for(root);
        };

        let metrics = Arc::clone(self.store.metrics());
        let _timing = metrics.time("resolve");

        let bucket = match self.options.load_wait {
            Some(wait) => match tokio::time::timeout(wait, self.store.get_bucket(key)).await {
                Ok(bucket) => bucket,
                Err(_) => {
                    debug!(
                        "Bucket '{}' still loading after {:?}, resolving '{}' empty",
                        key, wait, root
                    );
                    return CandidateList::empty_for(root);
                }
            },
            None => self.store.get_bucket(key).await,
        };
        metrics.record_resolution();

        let source = if !bucket.is_empty() {
            bucket
        } else if let Some(fallback) = &self.fallback {
            debug!("Bucket '{}' empty, using fallback set ({} items)", key, fallback.len());
            Arc::clone(fallback)
        } else {
            return CandidateList::empty_for(root);
        };

        let items = rank_candidates(root, &source, &self.options);
        debug!("Resolved '{}' to {} candidates", root, items.len());

        CandidateList {
            root: root.to_string(),
            replace: ColumnRange::default(),
            items,
        }
    }
}

/// Composite ordering key; `exact` sorts first
struct SortKey<'a> {
    exact: bool,
    normalized: String,
    item: &'a DictionaryItem,
}

impl SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .exact
            .cmp(&self.exact)
            .then_with(|| self.normalized.cmp(&other.normalized))
            .then_with(|| self.item.prefix.cmp(&other.item.prefix))
            .then_with(|| self.item.body.cmp(&other.item.body))
    }
}

fn prefix_matches(prefix: &str, root: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        prefix.len() >= root.len()
            && prefix.is_char_boundary(root.len())
            && prefix[..root.len()].eq_ignore_ascii_case(root)
    } else {
        prefix.starts_with(root)
    }
}

fn prefix_equals(prefix: &str, root: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        prefix.eq_ignore_ascii_case(root)
    } else {
        prefix == root
    }
}

/// Filter, sort, deduplicate, cap and narrow `items` for `root`
pub fn rank_candidates(
    root: &str,
    items: &[DictionaryItem],
    options: &ResolverOptions,
) -> Vec<Candidate> {
    let mut keyed: Vec<SortKey<'_>> = items
        .iter()
        .filter(|item| !item.prefix.is_empty())
        .filter(|item| prefix_matches(&item.prefix, root, options.case_insensitive))
        .map(|item| SortKey {
            exact: prefix_equals(&item.prefix, root, options.case_insensitive),
            normalized: item
                .sort_text
                .as_deref()
                .unwrap_or(&item.prefix)
                .to_lowercase(),
            item,
        })
        .collect();

    keyed.sort_by(|a, b| a.cmp(b));
    let mut seen = HashSet::new();
    keyed.retain(|key| {
        let item: &DictionaryItem = key.item;
        seen.insert((item.prefix.as_str(), item.body.as_str()))
    });
    keyed.truncate(options.suggest_limit);

    let candidates: Vec<Candidate> = keyed
        .into_iter()
        .map(|key| {
            let hit = key
                .item
                .label
                .as_deref()
                .is_some_and(|label| label_names_root(label, root, options.case_insensitive));
            to_candidate(key.item, key.exact, hit)
        })
        .collect();

    if candidates.iter().any(|c| c.exact_root_hit) {
        candidates.into_iter().filter(|c| c.exact_root_hit).collect()
    } else {
        candidates
    }
}

/// A label names the root when it reads `"<root> ..."`
fn label_names_root(label: &str, root: &str, case_insensitive: bool) -> bool {
    label.len() > root.len()
        && label.is_char_boundary(root.len())
        && label[root.len()..].starts_with(' ')
        && prefix_equals(&label[..root.len()], root, case_insensitive)
}

fn to_candidate(item: &DictionaryItem, exact_prefix: bool, exact_root_hit: bool) -> Candidate {
    Candidate {
        prefix: item.prefix.clone(),
        label: item
            .label
            .clone()
            .unwrap_or_else(|| format!("{} → {}", item.prefix, item.body)),
        insert_text: item.body.clone(),
        detail: item.detail.clone(),
        documentation: item.documentation.clone(),
        sort_text: format!("0{}", item.sort_text.as_deref().unwrap_or(&item.prefix)),
        exact_prefix,
        exact_root_hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ResolverOptions {
        ResolverOptions::default()
    }

    fn prefixes(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.prefix.as_str()).collect()
    }

    #[test]
    fn test_filters_by_prefix() {
        let items = vec![
            DictionaryItem::new("bona", "好a"),
            DictionaryItem::new("bela", "美a"),
            DictionaryItem::new("bon", "好"),
        ];
        let ranked = rank_candidates("bo", &items, &opts());
        assert_eq!(prefixes(&ranked), vec!["bon", "bona"]);
    }

    #[test]
    fn test_exact_prefix_sorts_first() {
        let items = vec![
            DictionaryItem::new("bona", "好a").with_sort_text("a"),
            DictionaryItem::new("bon", "好").with_sort_text("z"),
        ];
        let ranked = rank_candidates("bon", &items, &opts());
        assert_eq!(prefixes(&ranked), vec!["bon", "bona"]);
        assert!(ranked[0].exact_prefix);
        assert!(!ranked[1].exact_prefix);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let a = vec![
            DictionaryItem::new("bonx", "2"),
            DictionaryItem::new("bony", "1"),
            DictionaryItem::new("bonx", "1"),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(rank_candidates("bon", &a, &opts()), rank_candidates("bon", &b, &opts()));
        let ranked = rank_candidates("bon", &a, &opts());
        assert_eq!(ranked[0].insert_text, "1");
        assert_eq!(ranked[1].insert_text, "2");
    }

    #[test]
    fn test_deduplicates_prefix_body_pairs() {
        let items = vec![
            DictionaryItem::new("bon", "好"),
            DictionaryItem::new("bon", "好"),
            DictionaryItem::new("bon", "良"),
        ];
        assert_eq!(rank_candidates("bon", &items, &opts()).len(), 2);
    }

    #[test]
    fn test_cap_is_applied() {
        let items: Vec<_> = (0..250)
            .map(|i| DictionaryItem::new(format!("bon{:03}", i), "x"))
            .collect();
        let ranked = rank_candidates("bon", &items, &opts());
        assert_eq!(ranked.len(), 100);
        assert_eq!(ranked[0].prefix, "bon000");
    }

    #[test]
    fn test_exact_root_label_narrows() {
        let items = vec![
            DictionaryItem::new("bon", "好").with_label("bon 好"),
            DictionaryItem::new("bona", "好a"),
            DictionaryItem::new("bonega", "極好"),
        ];
        let ranked = rank_candidates("bon", &items, &opts());
        assert_eq!(prefixes(&ranked), vec!["bon"]);
        assert!(ranked[0].exact_root_hit);
    }

    #[test]
    fn test_default_label_does_not_narrow() {
        let items = vec![DictionaryItem::new("bon", "good"), DictionaryItem::new("bona", "nice")];
        let ranked = rank_candidates("bon", &items, &opts());
        assert_eq!(ranked[0].label, "bon → good");
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_case_sensitivity() {
        let items = vec![DictionaryItem::new("Bon", "好")];
        assert!(rank_candidates("bon", &items, &opts()).is_empty());

        let insensitive = ResolverOptions {
            case_insensitive: true,
            ..opts()
        };
        let ranked = rank_candidates("bon", &items, &insensitive);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].exact_prefix);
    }

    #[test]
    fn test_case_insensitive_label_narrows() {
        let items = vec![
            DictionaryItem::new("bona", "好a").with_label("bona 好a"),
            DictionaryItem::new("bonaĵo", "好物"),
        ];
        let insensitive = ResolverOptions {
            case_insensitive: true,
            ..opts()
        };

        let ranked = rank_candidates("Bona", &items, &insensitive);
        assert_eq!(prefixes(&ranked), vec!["bona"]);
        assert!(ranked[0].exact_root_hit);

        // Case still matters when the option is off
        assert!(rank_candidates("Bona", &items, &opts()).is_empty());
        assert!(!label_names_root("bonaĵo 好物", "bona", false));
    }

    #[test]
    fn test_sort_text_for_host() {
        let items = vec![
            DictionaryItem::new("bon", "好"),
            DictionaryItem::new("bona", "好a").with_sort_text("k1"),
        ];
        let ranked = rank_candidates("bon", &items, &opts());
        assert_eq!(ranked[0].sort_text, "0bon");
        assert_eq!(ranked[1].sort_text, "0k1");
    }
}

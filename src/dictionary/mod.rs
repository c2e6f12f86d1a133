//! Sharded root dictionary
//!
//! The dictionary is split into one shard per lowercase first letter of the
//! item prefix (`ke-a.json` .. `ke-z.json`). Shards are loaded lazily by the
//! [`BucketStore`] the first time a root starting with that letter is typed.
//!
//! - [`DictionaryItem`]: a single root → snippet entry as stored on disk
//! - [`ShardDocument`]: the `{"items": [...]}` wrapper of one shard file
//! - [`BucketKey`]: a validated single-letter shard key
//! - [`Bucket`]: an immutable, shared view of a loaded shard

pub mod bucket_store;
pub mod source;
pub mod tools;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use bucket_store::{BucketStore, LoadStatus};
pub use source::{FetchAttempt, FsShardSource, ShardError, ShardSource, StaticShardSource};

/// One dictionary entry: an ASCII root and the snippet it expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryItem {
    /// ASCII root typed by the user (non-empty)
    pub prefix: String,

    /// Expansion text; may contain ideographs and snippet placeholders
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    #[serde(rename = "sortText", default, skip_serializing_if = "Option::is_none")]
    pub sort_text: Option<String>,
}

impl DictionaryItem {
    /// Create a bare item with only a prefix and a body
    pub fn new(prefix: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            body: body.into(),
            label: None,
            detail: None,
            documentation: None,
            sort_text: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_sort_text(mut self, sort_text: impl Into<String>) -> Self {
        self.sort_text = Some(sort_text.into());
        self
    }
}

/// On-disk shard document: `{"items": [ ... ]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardDocument {
    #[serde(default)]
    pub items: Vec<DictionaryItem>,
}

/// Validated shard key: a single lowercase ASCII letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(char);

impl BucketKey {
    /// Normalize a caller-supplied key.
    ///
    /// Returns `None` for empty keys, keys longer than one character and
    /// anything that is not an ASCII letter.
    pub fn parse(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::from_char(first)
    }

    pub fn from_char(ch: char) -> Option<Self> {
        ch.is_ascii_alphabetic()
            .then(|| Self(ch.to_ascii_lowercase()))
    }

    /// Key for the first character of a root, if it has one
    pub fn for_root(root: &str) -> Option<Self> {
        root.chars().next().and_then(Self::from_char)
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// All 26 shard keys in alphabetical order
    pub fn all() -> impl Iterator<Item = BucketKey> {
        ('a'..='z').map(BucketKey)
    }

    /// File name of this shard under the data directory
    pub fn file_name(&self) -> String {
        format!("ke-{}.json", self.0)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable loaded shard, cheap to clone and share between callers
pub type Bucket = Arc<[DictionaryItem]>;

/// The empty bucket returned for rejected keys and failed loads
pub fn empty_bucket() -> Bucket {
    Arc::from(Vec::<DictionaryItem>::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_normalizes_case() {
        assert_eq!(BucketKey::parse("B"), BucketKey::parse("b"));
        assert_eq!(BucketKey::parse("b").map(|k| k.as_char()), Some('b'));
    }

    #[test]
    fn test_bucket_key_rejects_invalid() {
        assert_eq!(BucketKey::parse(""), None);
        assert_eq!(BucketKey::parse("ab"), None);
        assert_eq!(BucketKey::parse("1"), None);
        assert_eq!(BucketKey::parse("更"), None);
    }

    #[test]
    fn test_shard_document_reads_sort_text() {
        let json = r#"{"items": [{"prefix": "bon", "body": "好", "sortText": "a1", "extra": 3}]}"#;
        let doc: ShardDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].sort_text.as_deref(), Some("a1"));
        assert_eq!(doc.items[0].label, None);
    }

    #[test]
    fn test_all_keys() {
        let keys: Vec<char> = BucketKey::all().map(|k| k.as_char()).collect();
        assert_eq!(keys.len(), 26);
        assert_eq!(keys.first(), Some(&'a'));
        assert_eq!(BucketKey::parse("q").unwrap().file_name(), "ke-q.json");
    }
}

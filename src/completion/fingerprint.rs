//! Cheap digest of a candidate list
//!
//! The retrigger controller compares the fingerprint of every fresh
//! resolution with the one of the list currently shown, on every keystroke.
//! A full deep comparison is avoided: the fingerprint keeps the root, the
//! list length and a blake3 digest of the first [`FINGERPRINT_HEAD`]
//! candidates (label + inserted text).

use super::resolver::CandidateList;

/// Number of leading candidates folded into the head digest
pub const FINGERPRINT_HEAD: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    root: String,
    len: usize,
    head: blake3::Hash,
}

impl Fingerprint {
    pub fn of(list: &CandidateList) -> Self {
        let mut hasher = blake3::Hasher::new();
        for candidate in list.items.iter().take(FINGERPRINT_HEAD) {
            // Length prefixes keep ("ab","c") and ("a","bc") apart
            hasher.update(&(candidate.label.len() as u64).to_le_bytes());
            hasher.update(candidate.label.as_bytes());
            hasher.update(&(candidate.insert_text.len() as u64).to_le_bytes());
            hasher.update(candidate.insert_text.as_bytes());
        }

        Self {
            root: list.root.clone(),
            len: list.items.len(),
            head: hasher.finalize(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

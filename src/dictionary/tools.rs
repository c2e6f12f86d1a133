//! Dictionary build tooling
//!
//! Offline conversion of authoring formats into shard documents:
//!
//! - `.ke.txt` word lists (`prefix -> body`, `prefix: body`, `prefix body`, ...)
//! - VS Code snippet files (JSONC: comments and trailing commas allowed)
//! - splitting a combined `all.json` into `ke-<letter>.json` shards
//!
//! The completion engine never calls these at runtime; they back the
//! `convert-text`, `convert-snippets` and `split` subcommands.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{DictionaryItem, ShardDocument};

/// Key used for items whose prefix is empty
pub const UNKEYED_BUCKET: char = '#';

/// Parse a `.ke.txt` word list.
///
/// Blank lines and lines starting with `#` or `//` are skipped. Each line is
/// tried as `prefix <sep> body` where `<sep>` is a run of `-`, `:` or `>`
/// (optionally surrounded by spaces), then as `prefix<whitespace>body`.
/// Lines matching neither form are ignored.
pub fn parse_ke_text(text: &str) -> Vec<DictionaryItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .filter_map(|line| split_separated(line).or_else(|| split_whitespace(line)))
        .map(|(prefix, body)| {
            let detail = format!("{} → {}", prefix, body);
            DictionaryItem::new(prefix, body).with_detail(detail)
        })
        .collect()
}

fn is_separator(ch: char) -> bool {
    matches!(ch, '-' | ':' | '>')
}

/// `prefix -> body`, `prefix: body`, `prefix>body`
fn split_separated(line: &str) -> Option<(&str, &str)> {
    let prefix_end = line
        .find(|ch: char| is_separator(ch) || ch.is_whitespace())
        .filter(|&idx| idx > 0)?;
    let prefix = &line[..prefix_end];

    let rest = line[prefix_end..].trim_start();
    let body_start = rest.find(|ch: char| !is_separator(ch))?;
    if body_start == 0 {
        return None;
    }
    let body = rest[body_start..].trim();

    (!body.is_empty()).then_some((prefix, body))
}

/// `prefix body`
fn split_whitespace(line: &str) -> Option<(&str, &str)> {
    let (prefix, body) = line.split_once(char::is_whitespace)?;
    let body = body.trim();
    (!prefix.is_empty() && !body.is_empty()).then_some((prefix, body))
}

/// One entry of a VS Code snippet file
#[derive(Debug, Deserialize)]
struct SnippetEntry {
    #[serde(default)]
    prefix: Option<Value>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

/// Convert a VS Code snippets file (JSON with comments) into dictionary items.
///
/// A snippet with several prefixes yields one item per prefix. Array bodies
/// are joined with newlines. `detail` is the description (or the snippet
/// name), `documentation` the description.
pub fn parse_vscode_snippets(source: &str) -> Result<Vec<DictionaryItem>> {
    let json = strip_jsonc(source);
    let snippets: BTreeMap<String, Option<SnippetEntry>> =
        serde_json::from_str(&json).context("Invalid snippet JSON")?;

    let mut items = Vec::new();
    for (name, snippet) in snippets {
        let Some(snippet) = snippet else { continue };

        let prefixes: Vec<String> = match snippet.prefix {
            Some(Value::Array(values)) => values.iter().filter_map(value_text).collect(),
            Some(value) => value_text(&value).into_iter().collect(),
            None => Vec::new(),
        };
        let body = match snippet.body {
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(value_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Some(value) => value_text(&value).unwrap_or_default(),
            None => String::new(),
        };
        let detail = snippet
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| name.clone());

        for prefix in prefixes.into_iter().filter(|p| !p.is_empty()) {
            let mut item = DictionaryItem::new(prefix, body.clone()).with_detail(detail.clone());
            item.documentation = snippet.description.clone();
            items.push(item);
        }
    }

    debug!("Converted {} snippet items", items.len());
    Ok(items)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Remove a BOM, `//` and `/* */` comments and trailing commas.
///
/// String literals are copied verbatim, so `"http://x"` survives.
pub fn strip_jsonc(source: &str) -> String {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            match ch {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(ch),
        }
    }

    remove_trailing_commas(&out)
}

fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            if ch == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
            out.push(ch);
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(ch);
            }
        } else {
            out.push(ch);
        }
        i += 1;
    }

    out
}

/// Deduplicate by `(prefix, body)`; later duplicates replace earlier ones
/// but keep the position of the first occurrence.
pub fn dedupe_items(items: Vec<DictionaryItem>) -> Vec<DictionaryItem> {
    let mut positions: HashMap<(String, String), usize> = HashMap::new();
    let mut unique: Vec<DictionaryItem> = Vec::with_capacity(items.len());

    for item in items {
        let key = (item.prefix.clone(), item.body.clone());
        match positions.get(&key) {
            Some(&idx) => unique[idx] = item,
            None => {
                positions.insert(key, unique.len());
                unique.push(item);
            }
        }
    }

    unique
}

/// Group items by lowercase first character of the prefix, each group
/// sorted by prefix
pub fn split_into_buckets(items: Vec<DictionaryItem>) -> BTreeMap<char, Vec<DictionaryItem>> {
    let mut buckets: BTreeMap<char, Vec<DictionaryItem>> = BTreeMap::new();
    for item in items {
        let key = item
            .prefix
            .chars()
            .next()
            .map(|ch| ch.to_lowercase().next().unwrap_or(ch))
            .unwrap_or(UNKEYED_BUCKET);
        buckets.entry(key).or_default().push(item);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by(|a, b| a.prefix.cmp(&b.prefix));
    }
    buckets
}

/// Read a combined `{"items": [...]}` document
pub fn read_document(path: &Path) -> Result<ShardDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid dictionary document {}", path.display()))
}

/// Write items as a pretty-printed `{"items": [...]}` document
pub fn write_document(path: &Path, items: Vec<DictionaryItem>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&ShardDocument { items })?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write one `ke-<key>.json` shard per bucket; returns the written paths
pub fn write_shards(
    dir: &Path,
    buckets: BTreeMap<char, Vec<DictionaryItem>>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::with_capacity(buckets.len());
    for (key, items) in buckets {
        let path = dir.join(format!("ke-{}.json", key));
        write_document(&path, items)?;
        written.push(path);
    }

    info!("Wrote {} shards to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_parse_ke_text_formats() {
        let text = indoc! {"
            # comment
            // another comment

            bon -> 好
            bela: 美
            akvo>水
            granda   大
            nothing
        "};
        let items = parse_ke_text(text);
        let pairs: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.prefix.as_str(), i.body.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("bon", "好"), ("bela", "美"), ("akvo", "水"), ("granda", "大")]
        );
        assert_eq!(items[0].detail.as_deref(), Some("bon → 好"));
    }

    #[test]
    fn test_strip_jsonc_keeps_strings() {
        let src = "\u{feff}{\n  // line\n  \"a\": \"http://x\", /* block */\n  \"b\": [1, 2,],\n}";
        let value: Value = serde_json::from_str(&strip_jsonc(src)).unwrap();
        assert_eq!(value["a"], "http://x");
        assert_eq!(value["b"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_parse_vscode_snippets() {
        let src = indoc! {r#"
            {
              // greeting
              "good": {
                "prefix": ["bon", "bona"],
                "body": ["好", "$0"],
                "description": "good",
              },
              "water": { "prefix": "akvo", "body": "水" },
            }
        "#};
        let items = parse_vscode_snippets(src).unwrap();
        assert_eq!(items.len(), 3);

        let bon = items.iter().find(|i| i.prefix == "bon").unwrap();
        assert_eq!(bon.body, "好\n$0");
        assert_eq!(bon.detail.as_deref(), Some("good"));
        assert_eq!(bon.documentation.as_deref(), Some("good"));

        let akvo = items.iter().find(|i| i.prefix == "akvo").unwrap();
        assert_eq!(akvo.detail.as_deref(), Some("water"));
        assert_eq!(akvo.documentation, None);
    }

    #[test]
    fn test_dedupe_keeps_first_position_last_value() {
        let items = vec![
            DictionaryItem::new("bon", "好").with_detail("old"),
            DictionaryItem::new("akvo", "水"),
            DictionaryItem::new("bon", "好").with_detail("new"),
        ];
        let unique = dedupe_items(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].prefix, "bon");
        assert_eq!(unique[0].detail.as_deref(), Some("new"));
    }

    #[test]
    fn test_split_into_buckets() {
        let buckets = split_into_buckets(vec![
            DictionaryItem::new("bona", "1"),
            DictionaryItem::new("Bon", "2"),
            DictionaryItem::new("akvo", "3"),
            DictionaryItem::new("", "4"),
        ]);
        let keys: Vec<char> = buckets.keys().copied().collect();
        assert_eq!(keys, vec!['#', 'a', 'b']);
        let b: Vec<&str> = buckets[&'b'].iter().map(|i| i.prefix.as_str()).collect();
        assert_eq!(b, vec!["Bon", "bona"]);
    }
}

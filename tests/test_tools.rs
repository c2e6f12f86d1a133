//! Dictionary build pipeline: authoring formats -> shards -> live lookups

use std::sync::Arc;

use indoc::indoc;
use tempfile::TempDir;

use kanji_esperanto_server::completion::{CandidateResolver, CompletionProvider, ResolverOptions};
use kanji_esperanto_server::dictionary::tools::{
    dedupe_items, parse_ke_text, parse_vscode_snippets, read_document, split_into_buckets,
    write_document, write_shards,
};
use kanji_esperanto_server::dictionary::{BucketStore, FsShardSource};

fn provider_for(dir: &std::path::Path) -> CompletionProvider {
    let store = Arc::new(BucketStore::new(Arc::new(FsShardSource::new(dir))));
    CompletionProvider::new(Arc::new(CandidateResolver::new(store, ResolverOptions::default())))
}

#[tokio::test]
async fn test_word_list_to_shards_to_completions() {
    let dir = TempDir::new().unwrap();
    let words = indoc! {"
        # Kanji Esperanto roots
        bon -> 好
        bona: 好a
        bela > 美a
        akvo 水
        bon -> 好
    "};

    let items = dedupe_items(parse_ke_text(words));
    assert_eq!(items.len(), 4);

    let all = dir.path().join("all.json");
    write_document(&all, items).unwrap();
    let shards_dir = dir.path().join("data");
    let document = read_document(&all).unwrap();
    let written = write_shards(&shards_dir, split_into_buckets(document.items)).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["ke-a.json", "ke-b.json"]);

    let provider = provider_for(&shards_dir);
    let list = provider.complete_line("更bo", 3).await;
    assert_eq!(list.labels(), vec!["bon → 好", "bona → 好a"]);
    assert_eq!(list.items[0].detail.as_deref(), Some("bon → 好"));
    assert_eq!(provider.complete_line("akv", 3).await.len(), 1);
}

#[tokio::test]
async fn test_snippets_to_shards_to_completions() {
    let dir = TempDir::new().unwrap();
    let snippets = indoc! {r#"
        {
          /* Kanji Esperanto */
          "water": {
            "prefix": ["akvo", "akv"],
            "body": ["水", "$0"],
            "description": "water",
          },
        }
    "#};

    let items = parse_vscode_snippets(snippets).unwrap();
    write_shards(dir.path(), split_into_buckets(items)).unwrap();

    let list = provider_for(dir.path()).complete_line("ak", 2).await;
    assert_eq!(list.len(), 2);
    assert!(list.items.iter().all(|c| c.insert_text == "水\n$0"));
    assert!(list.items.iter().all(|c| c.detail.as_deref() == Some("water")));
}

#[test]
fn test_invalid_snippet_file_is_an_error() {
    assert!(parse_vscode_snippets("{ \"a\": ").is_err());
}

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

const CHUNK_SIZE: usize = 500;
const TOP_K: usize = 3;

/// The retrieval contract the orchestrator depends on. The store's internal
/// representation is its own business.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ingests a document; returns a human-readable status line.
    async fn ingest(&self, path: &Path) -> Result<String>;
    /// Returns the context block most relevant to `text` ("" when empty).
    async fn query(&self, text: &str) -> Result<String>;
}

struct Chunk {
    source_hash: u64,
    text: String,
    tokens: HashSet<String>,
}

/// In-memory store scoring chunks by token overlap. Deliberately small: the
/// contract above is the boundary a vector-backed store would slot into.
#[derive(Default)]
pub struct KeywordStore {
    chunks: RwLock<Vec<Chunk>>,
    ingested: RwLock<HashSet<u64>>,
}

impl KeywordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Retriever for KeywordStore {
    async fn ingest(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let source_hash = hash_path(path);

        if self
            .ingested
            .read()
            .map_err(|_| anyhow!("retrieval store poisoned"))?
            .contains(&source_hash)
        {
            return Ok(format!("'{name}' already ingested, skipping."));
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;
        let pieces = chunk_text(&text, CHUNK_SIZE);
        let count = pieces.len();

        let mut chunks = self
            .chunks
            .write()
            .map_err(|_| anyhow!("retrieval store poisoned"))?;
        for piece in pieces {
            chunks.push(Chunk {
                source_hash,
                tokens: tokenize(&piece),
                text: piece,
            });
        }
        self.ingested
            .write()
            .map_err(|_| anyhow!("retrieval store poisoned"))?
            .insert(source_hash);

        tracing::info!(file = %name, chunks = count, "document ingested");
        Ok(format!("Successfully ingested {name} ({count} chunks)."))
    }

    async fn query(&self, text: &str) -> Result<String> {
        let wanted = tokenize(text);
        if wanted.is_empty() {
            return Ok(String::new());
        }
        let chunks = self
            .chunks
            .read()
            .map_err(|_| anyhow!("retrieval store poisoned"))?;
        let mut scored: Vec<(usize, &Chunk)> = chunks
            .iter()
            .map(|c| (c.tokens.intersection(&wanted).count(), c))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let context = scored
            .iter()
            .take(TOP_K)
            .map(|(_, c)| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n");
        Ok(context)
    }
}

fn hash_path(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Groups paragraphs into ~`chunk_size`-char chunks. Oversized paragraphs
/// pass through whole rather than being split mid-sentence.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if para.len() > chunk_size {
            if !current.is_empty() {
                chunks.push(current.join("\n\n"));
                current.clear();
                current_len = 0;
            }
            chunks.push(para.to_string());
            continue;
        }
        if current_len + para.len() > chunk_size && !current.is_empty() {
            chunks.push(current.join("\n\n"));
            current.clear();
            current_len = 0;
        }
        current_len += para.len();
        current.push(para);
    }
    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::{KeywordStore, Retriever, chunk_text};

    #[test]
    fn chunker_groups_paragraphs() {
        let text = "one two three\n\nfour five six\n\nseven";
        let chunks = chunk_text(text, 20);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("one"));
    }

    #[test]
    fn oversized_paragraph_stays_whole() {
        let big = "x".repeat(100);
        let chunks = chunk_text(&big, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 100);
    }

    #[tokio::test]
    async fn ingest_and_query_round_trip() {
        let dir = std::env::temp_dir().join(format!("moabot-rag-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("tmp dir");
        let file = dir.join("notes.md");
        std::fs::write(&file, "The deploy runs at midnight.\n\nLunch is at noon.").expect("write");

        let store = KeywordStore::new();
        let status = store.ingest(&file).await.expect("ingest");
        assert!(status.contains("notes.md"));

        let ctx = store.query("when is the deploy").await.expect("query");
        assert!(ctx.contains("midnight"));

        // Second ingest of the same file is a no-op.
        let again = store.ingest(&file).await.expect("ingest");
        assert!(again.contains("already ingested"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let store = KeywordStore::new();
        assert!(store.ingest(std::path::Path::new("/no/such/file.md")).await.is_err());
    }
}

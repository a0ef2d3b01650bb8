//! Document processing: extraction, cleanup, and token-aware chunking.
//!
//! Splitting happens on sentence boundaries (runs of `.`, `!`, `?`);
//! sentences accumulate greedily into a chunk until the next one would push
//! the chunk past its token budget, at which point the chunk is finalized
//! and the next one is seeded with a word-tail overlap from it. Token counts
//! use the `cl100k_base` encoding.

use anyhow::{Context, Result};
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::extract::{self, FileKind};
use crate::models::{Chunk, ChunkMeta};

/// Output of processing one document.
#[derive(Debug)]
pub struct ProcessedDocument {
    pub content: String,
    pub chunks: Vec<Chunk>,
    pub word_count: usize,
    pub chunk_count: usize,
}

pub struct DocumentProcessor {
    chunk_size_tokens: usize,
    overlap_tokens: usize,
    bpe: CoreBPE,
}

impl DocumentProcessor {
    pub fn new(chunk_size_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        let bpe = cl100k_base().context("loading cl100k_base tokenizer")?;
        Ok(Self {
            chunk_size_tokens,
            overlap_tokens,
            bpe,
        })
    }

    /// Extracts, cleans, and chunks one document. Fails if the declared kind
    /// cannot be parsed at all; recoverable per-page/per-sheet failures are
    /// already absorbed by the extraction layer.
    pub fn process(
        &self,
        bytes: &[u8],
        file_name: &str,
        kind: FileKind,
        document_id: &str,
    ) -> Result<ProcessedDocument> {
        let raw = extract::extract_text(bytes, kind)
            .with_context(|| format!("extracting text from {}", file_name))?;
        let content = clean_text(&raw);
        let chunks = self.create_chunks(document_id, &content);
        let word_count = content.split_whitespace().count();
        let chunk_count = chunks.len();
        Ok(ProcessedDocument {
            content,
            chunks,
            word_count,
            chunk_count,
        })
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Greedy sentence accumulation under the token budget.
    ///
    /// A single sentence larger than the budget still becomes its own chunk:
    /// the size check only fires when the accumulator already has content.
    /// Char offsets advance by the finalized chunk length minus the injected
    /// overlap length.
    pub fn create_chunks(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let sentences = split_sentences(text);

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;
        let mut chunk_index = 0usize;
        let mut start_char = 0usize;

        for sentence in &sentences {
            let sentence_tokens = self.count_tokens(sentence);

            if current_tokens + sentence_tokens > self.chunk_size_tokens && !current.is_empty() {
                let content = current.trim().to_string();
                chunks.push(make_chunk(
                    document_id,
                    chunk_index,
                    &content,
                    start_char,
                    current_tokens,
                ));
                chunk_index += 1;

                // Seed the next chunk with the word tail of the one just
                // finalized.
                let overlap = self.overlap_text(&content);
                start_char += content.len().saturating_sub(overlap.len());
                current = if overlap.is_empty() {
                    sentence.clone()
                } else {
                    format!("{} {}", overlap, sentence)
                };
                current_tokens = self.count_tokens(&current);
            } else if current.is_empty() {
                current = sentence.clone();
                current_tokens = sentence_tokens;
            } else {
                current.push(' ');
                current.push_str(sentence);
                current_tokens += sentence_tokens;
            }
        }

        if !current.trim().is_empty() {
            let content = current.trim().to_string();
            chunks.push(make_chunk(
                document_id,
                chunk_index,
                &content,
                start_char,
                current_tokens,
            ));
        }

        chunks
    }

    /// Takes words from the tail of `text` until adding another would exceed
    /// the overlap token budget.
    fn overlap_text(&self, text: &str) -> String {
        if text.is_empty() || self.overlap_tokens == 0 {
            return String::new();
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut taken: Vec<&str> = Vec::new();
        let mut tokens = 0usize;
        for word in words.iter().rev() {
            let word_tokens = self.count_tokens(word);
            if tokens + word_tokens > self.overlap_tokens {
                break;
            }
            taken.push(word);
            tokens += word_tokens;
        }
        taken.reverse();
        taken.join(" ")
    }
}

fn make_chunk(
    document_id: &str,
    index: usize,
    content: &str,
    start_char: usize,
    token_count: usize,
) -> Chunk {
    Chunk {
        id: format!("{}_chunk_{}", document_id, index),
        document_id: document_id.to_string(),
        content: content.to_string(),
        chunk_index: index,
        embedding: None,
        metadata: ChunkMeta {
            start_char,
            end_char: start_char + content.len(),
            token_count,
        },
    }
}

/// Collapses whitespace runs to a single space, blank-line runs to a single
/// blank line, and trims both ends.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_newlines = 0usize;
    let mut pending_space = false;

    for ch in text.chars() {
        if ch == '\n' {
            pending_newlines += 1;
            pending_space = false;
            continue;
        }
        if ch.is_whitespace() {
            if pending_newlines == 0 {
                pending_space = true;
            }
            continue;
        }
        if !out.is_empty() {
            if pending_newlines >= 2 {
                out.push_str("\n\n");
            } else if pending_newlines == 1 {
                out.push('\n');
            } else if pending_space {
                out.push(' ');
            }
        }
        pending_newlines = 0;
        pending_space = false;
        out.push(ch);
    }
    out
}

/// Sentence boundary = any run of `.`, `!`, `?`. Empty fragments (from
/// consecutive terminators) are dropped.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

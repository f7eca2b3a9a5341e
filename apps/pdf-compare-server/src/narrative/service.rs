//! Narrative service
//!
//! Splits both document texts into paragraph-aligned chunks, asks the
//! comparator about each chunk pair in order and normalizes the combined
//! answer into a [`ChangeNarrative`].

use std::sync::Arc;

use super::{
    provider::TextComparator,
    types::{ChangeNarrative, NarrativeError, DEFAULT_CHUNK_SIZE},
};

/// Narrative service
#[derive(Clone)]
pub struct NarrativeService {
    comparator: Arc<dyn TextComparator>,
    chunk_size: usize,
}

impl NarrativeService {
    pub fn new(comparator: Arc<dyn TextComparator>, chunk_size: usize) -> Self {
        Self {
            comparator,
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                chunk_size
            },
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Describe the differences between two full document texts
    ///
    /// Chunk pairs are compared sequentially; a document with fewer chunks
    /// contributes empty text for the rest.
    pub async fn compare_texts(
        &self,
        old_text: &str,
        new_text: &str,
    ) -> Result<ChangeNarrative, NarrativeError> {
        let old_chunks = chunk_text(old_text, self.chunk_size);
        let new_chunks = chunk_text(new_text, self.chunk_size);
        let total = old_chunks.len().max(new_chunks.len());

        tracing::info!(
            old_chunks = old_chunks.len(),
            new_chunks = new_chunks.len(),
            "Comparing document texts"
        );

        let mut results = Vec::with_capacity(total);
        for i in 0..total {
            let old_chunk = old_chunks.get(i).map(String::as_str).unwrap_or("");
            let new_chunk = new_chunks.get(i).map(String::as_str).unwrap_or("");
            results.push(self.comparator.compare(old_chunk, new_chunk, i).await?);
        }

        Ok(ChangeNarrative::new(parse_differences(&results.join("\n\n"))))
    }
}

/// Paragraphs separated by one or more blank lines
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n")
        .map(|p| p.trim_start_matches('\n'))
        .filter(|p| !p.is_empty())
}

/// Group paragraphs into chunks of at most `chunk_size` characters
///
/// A single paragraph longer than `chunk_size` becomes its own chunk.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for paragraph in paragraphs(text) {
        let len = paragraph.chars().count();
        if current_len > 0 && current_len + len > chunk_size {
            push_chunk(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }
        current.push_str(paragraph);
        current.push_str("\n\n");
        current_len += len + 2;
    }
    push_chunk(&mut chunks, &current);

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}

fn is_group_header(line: &str) -> bool {
    line.strip_prefix('•')
        .map(|rest| rest.starts_with(char::is_whitespace) && rest.ends_with(':'))
        .unwrap_or(false)
}

/// Normalize raw comparator output into the narrative line format
///
/// Blank lines are dropped and `-`/`*` bullets become `•`. A `• …:` line opens
/// a group; bullets under it are indented by two spaces. Any other line
/// closes the group.
pub fn parse_differences(text: &str) -> String {
    let mut lines = Vec::new();
    let mut in_group = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let line = match line.strip_prefix(['-', '*']) {
            Some(rest) => format!("•{}", rest),
            None => line.to_string(),
        };

        if is_group_header(&line) {
            in_group = true;
            lines.push(line);
        } else if in_group && line.starts_with('•') {
            lines.push(format!("  {}", line));
        } else {
            in_group = false;
            lines.push(line);
        }
    }

    lines.join("\n")
}

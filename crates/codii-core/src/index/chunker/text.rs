//! Sliding-window text chunker
//!
//! Fallback for files without an AST grammar. Accumulates whole lines until
//! the next line would push the chunk past `max_chunk_size`, then starts the
//! next chunk repeating roughly `chunk_overlap` characters of the previous
//! one, breaking on a line boundary. A trailing remainder smaller than
//! `min_chunk_size` is merged into the previous chunk instead of dropped.

use super::{Chunk, ChunkType};

pub struct TextChunker {
    max_chunk_size: usize,
    min_chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(max_chunk_size: usize, min_chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            max_chunk_size,
            min_chunk_size,
            chunk_overlap,
        }
    }

    pub fn chunk(&self, path: &str, content: &str, language: &str) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let lines: Vec<&str> = content.split('\n').collect();
        let mut chunks: Vec<Chunk> = Vec::new();

        let mut current: Vec<&str> = Vec::new();
        let mut current_start = 1usize;
        let mut current_size = 0usize;
        // How many leading lines of `current` repeat the previous chunk
        let mut overlap_lines = 0usize;

        for (i, line) in lines.iter().enumerate() {
            let line_no = i + 1;
            let line_size = line.len() + 1;

            if current_size + line_size > self.max_chunk_size && !current.is_empty() {
                let text = current.join("\n");
                if text.len() >= self.min_chunk_size {
                    chunks.push(self.make_chunk(path, language, text, current_start, line_no - 1));
                }

                let keep = self.overlap_line_count(&current);
                let kept: Vec<&str> = current[current.len() - keep..].to_vec();
                current_start = line_no - kept.len();
                current_size = kept.iter().map(|l| l.len() + 1).sum();
                overlap_lines = kept.len();
                current = kept;
            }

            current.push(line);
            current_size += line_size;
        }

        if !current.is_empty() {
            let text = current.join("\n");
            let end_line = lines.len();
            if text.len() >= self.min_chunk_size || chunks.is_empty() {
                if text.trim().is_empty() {
                    return chunks;
                }
                let chunk_type = if chunks.is_empty() && text.len() < self.min_chunk_size {
                    ChunkType::Module
                } else {
                    ChunkType::Text
                };
                let mut chunk = self.make_chunk(path, language, text, current_start, end_line);
                chunk.chunk_type = chunk_type;
                chunks.push(chunk);
            } else if let Some(prev) = chunks.last_mut() {
                // Undersized tail: fold the non-overlapping lines into the
                // previous chunk rather than losing them.
                let tail = &current[overlap_lines..];
                if !tail.is_empty() {
                    prev.content.push('\n');
                    prev.content.push_str(&tail.join("\n"));
                }
                prev.end_line = end_line;
            }
        }

        chunks
    }

    fn make_chunk(
        &self,
        path: &str,
        language: &str,
        content: String,
        start_line: usize,
        end_line: usize,
    ) -> Chunk {
        Chunk {
            content,
            path: path.to_string(),
            start_line,
            end_line: end_line.max(start_line),
            language: language.to_string(),
            chunk_type: ChunkType::Text,
        }
    }

    /// Number of trailing lines of the finished chunk to repeat, staying at
    /// or below the overlap target.
    fn overlap_line_count(&self, lines: &[&str]) -> usize {
        let mut size = 0usize;
        let mut count = 0usize;
        for line in lines.iter().rev() {
            if size + line.len() > self.chunk_overlap {
                break;
            }
            size += line.len() + 1;
            count += 1;
        }
        count.min(lines.len().saturating_sub(1))
    }
}

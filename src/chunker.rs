//! Header-aligned splitting of long documents.

pub const DEFAULT_CHUNK_SIZE: usize = 2500;

/// Split `content` into chunks of at most `max_size` characters, cutting only
/// before level 1-3 headers. A single section larger than `max_size` becomes
/// its own oversized chunk.
pub fn split_into_chunks(content: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for section in split_sections(content) {
        let section_len = section.chars().count();

        if current_len + section_len > max_size && current_len > 0 {
            push_trimmed(&mut chunks, &current);
            current = section;
            current_len = section_len;
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
                current_len += 2;
            }
            current.push_str(&section);
            current_len += section_len;
        }
    }

    push_trimmed(&mut chunks, &current);
    chunks
}

/// Sections start at every line (other than the first) that opens with one to
/// three `#` followed by whitespace.
fn split_sections(content: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (index, line) in content.split('\n').enumerate() {
        if index > 0 && is_major_header(line) {
            sections.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    sections.push(current.join("\n"));

    sections
}

fn is_major_header(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=3).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace())
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

//! Field-boundary / enum-value-boundary document chunker.
//!
//! Splits an oversized `object`/`interface`/`input` document's `content` at
//! field boundaries, and an oversized `enum` document's `content` at value
//! boundaries, so every chunk fits a caller-supplied `max_content_length`
//! while staying retrievable on its own. All other document kinds pass
//! through unchanged regardless of size.
//!
//! Field boundaries are found with a depth-tracked scan rather than a
//! regex: parenthesis/brace depth is tracked as the body is walked
//! character-by-character, and a boundary is recognized at depth zero,
//! once a `:` has been seen, at a run of whitespace whose next non-space
//! character starts a new identifier, a block-string description, or a
//! directive (`[a-zA-Z_"@]`) — or at the end of the body. The schema
//! parser always separates fields with a newline, so this whitespace run
//! is exactly the gap between one field and the next.

use crate::models::{DocumentMetadata, DocumentType, EmbeddingDocument};

fn is_boundary_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '"' || c == '@'
}

/// Split a type body into field (or, for enums, value) texts at depth-zero
/// whitespace boundaries following a `:`. Enum bodies never contain `:`,
/// so every whitespace run is treated as a boundary for them — see
/// [`split_enum_values`].
fn split_fields(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut seen_colon = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' | '{' => {
                depth += 1;
                current.push(c);
                i += 1;
            }
            ')' | '}' => {
                depth -= 1;
                current.push(c);
                i += 1;
            }
            ':' if depth == 0 => {
                seen_colon = true;
                current.push(c);
                i += 1;
            }
            c if depth == 0 && seen_colon && c.is_whitespace() => {
                let mut lookahead = i;
                while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                    lookahead += 1;
                }
                let at_boundary = lookahead >= chars.len() || is_boundary_start(chars[lookahead]);
                if at_boundary {
                    let field = current.trim().to_string();
                    if !field.is_empty() {
                        fields.push(field);
                    }
                    current.clear();
                    seen_colon = false;
                    i = lookahead;
                } else {
                    current.push(c);
                    i += 1;
                }
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        fields.push(tail.to_string());
    }
    fields
}

fn split_enum_values(body: &str) -> Vec<String> {
    body.split_whitespace().map(str::to_string).collect()
}

/// Greedily pack `fields` into groups so that `header + "\n" + group joined
/// with "\n" + "\n}"` (exactly what [`build_chunks`] emits) never exceeds
/// `max_content_length`. A single field that alone exceeds the budget
/// occupies a group by itself.
fn pack_into_groups(fields: &[String], header: &str, max_content_length: usize) -> Vec<Vec<String>> {
    let reserved = header.chars().count() + 3;
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = reserved;

    for field in fields {
        let joiner_len = if current.is_empty() { 0 } else { 1 };
        let added = field.chars().count() + joiner_len;
        if !current.is_empty() && current_len + added > max_content_length {
            groups.push(std::mem::take(&mut current));
            current_len = reserved;
        }
        current_len += if current.is_empty() { field.chars().count() } else { added };
        current.push(field.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

pub(crate) fn header_and_body(content: &str) -> Option<(&str, &str)> {
    let brace_pos = content.find('{')?;
    let header = &content[..=brace_pos];
    let rest = &content[brace_pos + 1..];
    let body = rest.strip_suffix('}').unwrap_or(rest);
    Some((header, body))
}

fn build_chunks(doc: &EmbeddingDocument, header: &str, groups: Vec<Vec<String>>) -> Vec<EmbeddingDocument> {
    let total = groups.len();
    groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| {
            let mut chunk = doc.clone();
            chunk.content = format!("{}\n{}\n}}", header, group.join("\n"));
            chunk.metadata = DocumentMetadata {
                chunk_index: Some(index),
                total_chunks: Some(total),
                ..doc.metadata.clone()
            };
            chunk.recompute_id();
            chunk
        })
        .collect()
}

/// Split a single document into chunks that each fit `max_content_length`.
///
/// Returns the original document unchanged (as a single-element vector) if
/// it already fits, if its kind is not splittable, or if splitting would
/// only produce one chunk anyway.
pub fn chunk_document(doc: &EmbeddingDocument, max_content_length: usize) -> Vec<EmbeddingDocument> {
    if doc.content.chars().count() <= max_content_length {
        return vec![doc.clone()];
    }

    let splittable = matches!(
        doc.doc_type,
        DocumentType::Object | DocumentType::Interface | DocumentType::Input | DocumentType::Enum
    );
    if !splittable {
        return vec![doc.clone()];
    }

    let Some((header, body)) = header_and_body(&doc.content) else {
        return vec![doc.clone()];
    };

    let fields = if doc.doc_type == DocumentType::Enum {
        split_enum_values(body)
    } else {
        split_fields(body)
    };
    if fields.len() <= 1 {
        return vec![doc.clone()];
    }

    let groups = pack_into_groups(&fields, header, max_content_length);
    if groups.len() <= 1 {
        return vec![doc.clone()];
    }

    build_chunks(doc, header, groups)
}

/// Chunk a whole document set, flattening each document's chunks in order.
pub fn chunk_documents(docs: &[EmbeddingDocument], max_content_length: usize) -> Vec<EmbeddingDocument> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, max_content_length))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema_documents;

    fn user_type_document(field_count: usize) -> EmbeddingDocument {
        let fields: Vec<String> = (0..field_count).map(|i| format!("f{i}: String!")).collect();
        let sdl = format!("type User {{ {} }} type Query {{ noop: Boolean }}", fields.join(" "));
        parse_schema_documents(&sdl)
            .unwrap()
            .into_iter()
            .find(|d| d.name == "User")
            .unwrap()
    }

    #[test]
    fn small_document_passes_through_unchanged() {
        let doc = user_type_document(2);
        let chunks = chunk_document(&doc, 10_000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, doc.content);
        assert!(chunks[0].metadata.chunk_index.is_none());
    }

    #[test]
    fn non_splittable_kind_passes_through_regardless_of_size() {
        let sdl = "scalar ReallyLongScalarNameThatStillJustPassesThrough type Query { noop: Boolean }";
        let docs = parse_schema_documents(sdl).unwrap();
        let scalar = docs.into_iter().find(|d| d.doc_type == DocumentType::Scalar).unwrap();
        let chunks = chunk_document(&scalar, 5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, scalar.content);
    }

    #[test]
    fn oversized_object_splits_into_multiple_chunks_with_sequential_indices() {
        let doc = user_type_document(20);
        let chunks = chunk_document(&doc, 60);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata.chunk_index, Some(i));
            assert_eq!(c.metadata.total_chunks, Some(chunks.len()));
        }
    }

    #[test]
    fn every_chunk_begins_with_header_and_ends_with_brace() {
        let doc = user_type_document(20);
        let chunks = chunk_document(&doc, 60);
        let header = doc.content.split('{').next().unwrap();
        for c in &chunks {
            assert!(c.content.starts_with(header));
            assert!(c.content.trim_end().ends_with('}'));
        }
    }

    #[test]
    fn chunk_field_bodies_concatenate_back_to_original_fields() {
        let doc = user_type_document(15);
        let (_, original_body) = header_and_body(&doc.content).unwrap();
        let original_fields = split_fields(original_body);

        let chunks = chunk_document(&doc, 60);
        let mut reassembled = Vec::new();
        for c in &chunks {
            let (_, body) = header_and_body(&c.content).unwrap();
            reassembled.extend(split_fields(body));
        }
        assert_eq!(reassembled, original_fields);
    }

    #[test]
    fn every_chunk_respects_size_bound_unless_single_field_exceeds_it() {
        let doc = user_type_document(30);
        let chunks = chunk_document(&doc, 80);
        for c in &chunks {
            if c.metadata.total_chunks == Some(1) {
                continue;
            }
            assert!(c.content.chars().count() <= 80);
        }
    }

    #[test]
    fn single_oversized_field_gets_its_own_chunk() {
        let sdl = "type User { averyveryveryverylongfieldnamethatexceedsbudget: String! short: Int! } type Query { noop: Boolean }";
        let docs = parse_schema_documents(sdl).unwrap();
        let user = docs.into_iter().find(|d| d.name == "User").unwrap();
        let chunks = chunk_document(&user, 20);
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn enum_splits_on_value_boundaries() {
        let sdl = "enum Status { ACTIVE INACTIVE PENDING ARCHIVED DELETED } type Query { status: Status }";
        let docs = parse_schema_documents(sdl).unwrap();
        let status = docs.into_iter().find(|d| d.doc_type == DocumentType::Enum).unwrap();
        let chunks = chunk_document(&status, 30);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata.chunk_index, Some(i));
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let doc = user_type_document(25);
        let a = chunk_document(&doc, 60);
        let b = chunk_document(&doc, 60);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.content, y.content);
            assert_eq!(x.id, y.id);
        }
    }
}

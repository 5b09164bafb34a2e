//! Dynamic operation generator: the ten-step retrieval+LLM orchestration
//! that turns a pre-embedded user query into a parse-valid (and, when a
//! schema validator is configured, schema-valid) GraphQL operation.
//!
//! Operates purely over [`VectorStore`], [`LLMProvider`], and the optional
//! [`SchemaValidator`], so it has no network or process dependencies of
//! its own — mirroring how the embedding service never touches `sqlx`
//! directly.

use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::chunk::header_and_body;
use crate::embedding::substitute_zero_vector;
use crate::llm::{CompletionOptions, LLMProvider, Message};
use crate::models::{DynamicGeneratedOperation, EmbeddingDocument, GenerationContext, RelevantDocument};
use crate::parser::is_builtin_scalar;
use crate::store::{Filter, SearchOptions, SearchResult, VectorStore};

/// Tunable knobs for [`generate`]. All may be overridden per call.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub min_similarity_score: f64,
    pub max_documents: usize,
    pub max_type_depth: usize,
    pub max_validation_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            min_similarity_score: 0.4,
            max_documents: 50,
            max_type_depth: 5,
            max_validation_retries: 5,
        }
    }
}

/// Errors from [`generate`].
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("no relevant root fields found for this query")]
    NoRelevantRootFields,
    #[error("no root fields matched the determined operation type")]
    NoMatchingOperationFields,
    #[error("{step} failed on attempt {attempt}: {message}")]
    Transport { step: String, attempt: u32, message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn transport_err(step: &str, attempt: u32, err: impl std::fmt::Display) -> GeneratorError {
    GeneratorError::Transport { step: step.to_string(), attempt, message: err.to_string() }
}

/// Validates a generated operation against the schema beyond plain
/// parsing. Default implementation is best-effort structural validation
/// (selected fields and arguments exist on the schema) since no GraphQL
/// type-checker crate is in scope here; implementers with a stricter
/// validator can provide their own.
pub trait SchemaValidator: Send + Sync {
    /// Returns error messages for any structural problems found.
    /// `known_types` is the root field document plus every type
    /// discovered during BFS expansion — the same set carried as
    /// provenance on the final [`DynamicGeneratedOperation`].
    fn validate(&self, operation: &str, known_types: &[EmbeddingDocument]) -> Vec<String>;
}

/// Structural validator: checks that every selected field exists on its
/// parent type, using only the container `fields` lists and field
/// `fieldType` metadata already retrieved during generation.
///
/// A type absent from `known_types` (never discovered, or discovery
/// stopped at `max_type_depth`) is treated as unknown and its subtree is
/// not checked — this validator trades completeness for needing no
/// separate schema load.
pub struct StructuralSchemaValidator;

fn strip_type_wrappers(rendered: &str) -> &str {
    let mut s = rendered;
    loop {
        if let Some(stripped) = s.strip_suffix('!') {
            s = stripped;
            continue;
        }
        if let Some(stripped) = s.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            s = stripped;
            continue;
        }
        break;
    }
    s
}

impl SchemaValidator for StructuralSchemaValidator {
    fn validate(&self, operation: &str, known_types: &[EmbeddingDocument]) -> Vec<String> {
        let document = match graphql_parser::query::parse_query::<String>(operation) {
            Ok(doc) => doc,
            Err(e) => return vec![format!("parse error: {e}")],
        };

        let mut fields_by_type: std::collections::HashMap<&str, &Vec<String>> = std::collections::HashMap::new();
        let mut return_type_by_field: std::collections::HashMap<(&str, &str), &str> = std::collections::HashMap::new();
        let mut root_field_return_type: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
        for doc in known_types {
            if !doc.metadata.fields.is_empty() {
                fields_by_type.insert(doc.name.as_str(), &doc.metadata.fields);
            }
            if let Some(field_type) = doc.metadata.field_type.as_deref() {
                if let Some(parent) = doc.metadata.parent_type.as_deref() {
                    if doc.metadata.is_root_operation_field {
                        root_field_return_type.insert(doc.name.as_str(), strip_type_wrappers(field_type));
                    } else {
                        return_type_by_field.insert((parent, doc.name.as_str()), strip_type_wrappers(field_type));
                    }
                }
            }
        }

        let mut errors = Vec::new();
        for definition in &document.definitions {
            if let graphql_parser::query::Definition::Operation(op) = definition {
                let selection_set = match op {
                    graphql_parser::query::OperationDefinition::SelectionSet(s) => s,
                    graphql_parser::query::OperationDefinition::Query(q) => &q.selection_set,
                    graphql_parser::query::OperationDefinition::Mutation(m) => &m.selection_set,
                    graphql_parser::query::OperationDefinition::Subscription(s) => &s.selection_set,
                };
                // The root operation type itself is never stored as a
                // container document (P4), so the top-level field names
                // are trusted (they came from field selection) and only
                // their children are checked.
                for selection in &selection_set.items {
                    if let graphql_parser::query::Selection::Field(field) = selection {
                        let Some(&child_parent) = root_field_return_type.get(field.name.as_str()) else {
                            continue;
                        };
                        validate_selection_set(&field.selection_set, child_parent, &fields_by_type, &return_type_by_field, &mut errors);
                    }
                }
            }
        }
        errors
    }
}

fn validate_selection_set(
    set: &graphql_parser::query::SelectionSet<String>,
    parent_type: &str,
    fields_by_type: &std::collections::HashMap<&str, &Vec<String>>,
    return_type_by_field: &std::collections::HashMap<(&str, &str), &str>,
    errors: &mut Vec<String>,
) {
    let Some(known_fields) = fields_by_type.get(parent_type) else {
        return;
    };
    for selection in &set.items {
        let graphql_parser::query::Selection::Field(field) = selection else {
            continue;
        };
        if field.name != "__typename" && !known_fields.iter().any(|f| f == &field.name) {
            errors.push(format!("field '{}' does not exist on type '{}'", field.name, parent_type));
            continue;
        }
        if !field.selection_set.items.is_empty() {
            if let Some(&child_parent) = return_type_by_field.get(&(parent_type, field.name.as_str())) {
                validate_selection_set(&field.selection_set, child_parent, fields_by_type, return_type_by_field, errors);
            }
        }
    }
}

fn parse_operation_type(reply: &str) -> &'static str {
    let lower = reply.to_lowercase();
    if lower.contains("mutation") {
        "Mutation"
    } else if lower.contains("subscription") {
        "Subscription"
    } else {
        "Query"
    }
}

fn select_field<'a>(candidates: &'a [SearchResult], reply: &str) -> &'a SearchResult {
    let trimmed = reply.trim();
    if let Some(exact) = candidates.iter().find(|c| c.document.id == trimmed) {
        return exact;
    }
    if let Some(partial) = candidates
        .iter()
        .find(|c| c.document.id.contains(trimmed) || (!trimmed.is_empty() && trimmed.contains(&c.document.id)))
    {
        return partial;
    }
    candidates
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        .expect("candidates is non-empty by construction")
}

fn extract_fenced(text: &str, lang: &str) -> Option<String> {
    let fence = format!("```{lang}");
    let start = text.find(&fence)?;
    let rest = &text[start + fence.len()..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

fn extract_operation_and_variables(reply: &str) -> (String, serde_json::Value) {
    let operation = extract_fenced(reply, "graphql").unwrap_or_else(|| reply.trim().to_string());
    let variables = extract_fenced(reply, "json")
        .and_then(|json_text| serde_json::from_str(&json_text).ok())
        .unwrap_or_else(|| serde_json::json!({}));
    (operation, variables)
}

fn root_operation_search_options(limit: usize) -> SearchOptions {
    SearchOptions {
        limit,
        column_filters: vec![Filter::is_in(
            "parentType",
            vec!["Query".into(), "Mutation".into(), "Subscription".into()],
        )],
        ..Default::default()
    }
}

/// Candidate retrieval with adaptive similarity threshold relaxation
/// (§4.5.1, P9). Retrofits legacy records missing `rootOperationType`.
async fn retrieve_candidates<V: VectorStore>(
    store: &V,
    table: &str,
    context: &GenerationContext,
    config: &GeneratorConfig,
) -> Result<Vec<SearchResult>, GeneratorError> {
    let mut threshold = config.min_similarity_score;
    let options = root_operation_search_options(config.max_documents);

    loop {
        let mut results = store
            .search(table, &context.input_vector, &options)
            .await
            .map_err(|e| transport_err("retrieval", 1, e))?;

        for result in &mut results {
            if result.document.metadata.root_operation_type.is_none() {
                if let Some(parent) = &result.document.metadata.parent_type {
                    result.document.metadata.root_operation_type = Some(parent.clone());
                }
            }
        }

        let filtered: Vec<SearchResult> = results.into_iter().filter(|r| r.score >= threshold).collect();
        if !filtered.is_empty() {
            return Ok(filtered);
        }
        if threshold < 0.05 {
            return Err(GeneratorError::NoRelevantRootFields);
        }
        threshold = ((threshold - 0.05) * 100.0).round() / 100.0;
    }
}

/// §4.5.2 — Prompt the LLM to classify the operation type.
async fn classify_operation_type<L: LLMProvider>(
    llm: &L,
    candidates: &[SearchResult],
    input_text: &str,
) -> Result<&'static str, GeneratorError> {
    let mut messages = vec![Message::system(
        "You determine whether a user's request is best served by a GraphQL Query, Mutation, or Subscription. \
         Reply with exactly one word.",
    )];
    for candidate in candidates {
        let root_type = candidate.document.metadata.root_operation_type.as_deref().unwrap_or("Query");
        messages.push(Message::assistant(format!("{}:{}", root_type, candidate.document.content)));
    }
    messages.push(Message::user(format!(
        "Which operation type (Query, Mutation, or Subscription) best matches: \"{input_text}\"?"
    )));

    let reply = llm
        .complete(&messages, &CompletionOptions { temperature: Some(0.0), max_tokens: Some(5) })
        .await
        .map_err(|e| transport_err("classify", 1, e))?;
    Ok(parse_operation_type(&reply))
}

/// §4.5.4 — Prompt the LLM to select the most relevant root field.
async fn select_root_field<'a, L: LLMProvider>(
    llm: &L,
    candidates: &'a [SearchResult],
    input_text: &str,
) -> Result<&'a SearchResult, GeneratorError> {
    let mut messages = vec![Message::system(
        "You select the single GraphQL root field that best matches a user's request. Reply with only its id.",
    )];
    for candidate in candidates {
        messages.push(Message::assistant(format!("{}:{}", candidate.document.id, candidate.document.content)));
    }
    messages.push(Message::user(format!("Which field id is the best match for: \"{input_text}\"?")));

    let reply = llm
        .complete(&messages, &CompletionOptions { temperature: Some(0.0), max_tokens: Some(20) })
        .await
        .map_err(|e| transport_err("field-selection", 1, e))?;
    Ok(select_field(candidates, &reply))
}

fn merge_chunks(mut chunks: Vec<EmbeddingDocument>) -> EmbeddingDocument {
    chunks.sort_by_key(|c| c.metadata.chunk_index.unwrap_or(0));
    let header = header_and_body(&chunks[0].content).map(|(h, _)| h.to_string()).unwrap_or_default();
    let bodies: Vec<String> = chunks
        .iter()
        .filter_map(|c| header_and_body(&c.content))
        .map(|(_, body)| body.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();

    let mut merged = chunks.into_iter().next().expect("at least one chunk");
    merged.content = format!("{}\n{}\n}}", header, bodies.join("\n"));
    merged.metadata.chunk_index = None;
    merged.metadata.total_chunks = None;
    merged.recompute_id();
    merged
}

/// Look up a type by name via a metadata-only search, merging chunked
/// results back into one document (§4.5.5).
async fn lookup_type<V: VectorStore>(
    store: &V,
    table: &str,
    name: &str,
    zero_vector: &[f32],
) -> Result<Option<EmbeddingDocument>, GeneratorError> {
    let kinds = vec!["object".into(), "input".into(), "interface".into(), "union".into(), "enum".into(), "scalar".into()];
    let options = SearchOptions {
        limit: 1,
        column_filters: vec![Filter::is_in("type", kinds.clone()), Filter::eq("name", name)],
        ..Default::default()
    };
    let results = store.search(table, zero_vector, &options).await.map_err(|e| transport_err("type-lookup", 1, e))?;
    let Some(first) = results.into_iter().next() else {
        return Ok(None);
    };

    let total_chunks = first.document.metadata.total_chunks.unwrap_or(1);
    if total_chunks <= 1 {
        return Ok(Some(first.document));
    }

    let full_options = SearchOptions {
        limit: total_chunks,
        column_filters: vec![Filter::is_in("type", kinds), Filter::eq("name", name)],
        ..Default::default()
    };
    let all = store.search(table, zero_vector, &full_options).await.map_err(|e| transport_err("type-lookup", 2, e))?;
    Ok(Some(merge_chunks(all.into_iter().map(|r| r.document).collect())))
}

async fn fetch_type_fields<V: VectorStore>(
    store: &V,
    table: &str,
    parent: &str,
    zero_vector: &[f32],
    limit: usize,
) -> Result<Vec<EmbeddingDocument>, GeneratorError> {
    let options = SearchOptions {
        limit,
        column_filters: vec![Filter::eq("type", "field"), Filter::eq("parentType", parent)],
        ..Default::default()
    };
    let results = store.search(table, zero_vector, &options).await.map_err(|e| transport_err("field-lookup", 1, e))?;
    Ok(results.into_iter().map(|r| r.document).collect())
}

/// §4.5.5 — BFS the transitive type closure needed to render the selected
/// field, deduplicated by type name, bounded to `max_type_depth`.
async fn discover_types<V: VectorStore>(
    store: &V,
    table: &str,
    selected: &SearchResult,
    vector_len: usize,
    config: &GeneratorConfig,
) -> Result<Vec<EmbeddingDocument>, GeneratorError> {
    let zero_vector = substitute_zero_vector(&vec![0.0; vector_len], vector_len);

    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut discovered = Vec::new();

    if let Some(field_type) = &selected.document.metadata.field_type {
        let base = strip_type_wrappers(field_type).to_string();
        if !is_builtin_scalar(&base) {
            queue.push_back((base, 1));
        }
    }
    for arg in &selected.document.metadata.arguments {
        let base = strip_type_wrappers(&arg.r#type).to_string();
        if !is_builtin_scalar(&base) {
            queue.push_back((base, 1));
        }
    }

    while let Some((name, depth)) = queue.pop_front() {
        if visited.contains(&name) || is_builtin_scalar(&name) {
            continue;
        }
        visited.insert(name.clone());

        let Some(type_doc) = lookup_type(store, table, &name, &zero_vector).await? else {
            continue;
        };

        if depth < config.max_type_depth {
            for possible in &type_doc.metadata.possible_types {
                if !visited.contains(possible) && !is_builtin_scalar(possible) {
                    queue.push_back((possible.clone(), depth + 1));
                }
            }
            for iface in &type_doc.metadata.interfaces {
                if !visited.contains(iface) && !is_builtin_scalar(iface) {
                    queue.push_back((iface.clone(), depth + 1));
                }
            }

            let field_docs = fetch_type_fields(store, table, &name, &zero_vector, config.max_documents).await?;
            for field in field_docs {
                if let Some(field_type) = &field.metadata.field_type {
                    let base = strip_type_wrappers(field_type).to_string();
                    if !visited.contains(&base) && !is_builtin_scalar(&base) {
                        queue.push_back((base, depth + 1));
                    }
                }
            }
        }

        discovered.push(type_doc);
    }

    Ok(discovered)
}

/// §4.5.6 — Prompt the LLM to generate an operation plus example
/// variables from the root field and discovered types.
async fn generate_operation<L: LLMProvider>(
    llm: &L,
    root_field: &EmbeddingDocument,
    discovered: &[EmbeddingDocument],
    input_text: &str,
) -> Result<(String, serde_json::Value), GeneratorError> {
    let mut messages = vec![Message::system(
        "Generate a single GraphQL operation that satisfies the user's request, using only the fields and types \
         provided. Reply with the operation in a fenced ```graphql block and example variables in a fenced ```json \
         block.",
    )];
    messages.push(Message::assistant(root_field.content.clone()));
    for doc in discovered {
        messages.push(Message::assistant(doc.content.clone()));
    }
    messages.push(Message::user(input_text.to_string()));

    let reply = llm
        .complete(&messages, &CompletionOptions { temperature: Some(0.2), max_tokens: Some(800) })
        .await
        .map_err(|e| transport_err("generate", 1, e))?;
    Ok(extract_operation_and_variables(&reply))
}

/// §4.5.7 — Build a repair prompt from the broken operation and its
/// validation errors.
async fn repair_operation<L: LLMProvider>(
    llm: &L,
    root_field: &EmbeddingDocument,
    discovered: &[EmbeddingDocument],
    broken_operation: &str,
    errors: &[String],
    input_text: &str,
    attempt: u32,
) -> Result<(String, serde_json::Value), GeneratorError> {
    let mut messages = vec![Message::system(
        "The previous GraphQL operation failed to validate against the schema. Fix it using only the schema \
         excerpts provided. Reply with the corrected operation in a fenced ```graphql block and example variables \
         in a fenced ```json block.",
    )];
    messages.push(Message::assistant(root_field.content.clone()));
    for doc in discovered {
        messages.push(Message::assistant(doc.content.clone()));
    }
    let bullets = errors.iter().map(|e| format!("- {e}")).collect::<Vec<_>>().join("\n");
    messages.push(Message::user(format!(
        "This operation failed:\n```graphql\n{broken_operation}\n```\nErrors:\n{bullets}\n\nOriginal request: \"{input_text}\""
    )));

    let reply = llm
        .complete(&messages, &CompletionOptions { temperature: Some(0.2), max_tokens: Some(800) })
        .await
        .map_err(|e| transport_err("repair", attempt, e))?;
    Ok(extract_operation_and_variables(&reply))
}

/// Run the full ten-step dynamic generation protocol.
#[tracing::instrument(skip_all, fields(table = %table))]
pub async fn generate<V, L>(
    store: &V,
    llm: &L,
    validator: Option<&dyn SchemaValidator>,
    table: &str,
    context: &GenerationContext,
    config: &GeneratorConfig,
) -> Result<DynamicGeneratedOperation, GeneratorError>
where
    V: VectorStore,
    L: LLMProvider,
{
    let candidates = retrieve_candidates(store, table, context, config).await?;

    let op_type = classify_operation_type(llm, &candidates, &context.input_text).await?;

    let filtered: Vec<SearchResult> = candidates
        .into_iter()
        .filter(|c| c.document.metadata.root_operation_type.as_deref() == Some(op_type))
        .collect();
    if filtered.is_empty() {
        return Err(GeneratorError::NoMatchingOperationFields);
    }

    let selected = select_root_field(llm, &filtered, &context.input_text).await?;
    let root_field = selected.document.clone();

    let discovered = discover_types(store, table, selected, context.input_vector.len(), config).await?;

    let (mut operation, mut variables) = generate_operation(llm, &root_field, &discovered, &context.input_text).await?;

    let mut known_types: Vec<EmbeddingDocument> = vec![root_field.clone()];
    known_types.extend(discovered.iter().cloned());

    let mut attempts: u32 = 1;
    loop {
        let mut errors: Vec<String> = Vec::new();
        match graphql_parser::query::parse_query::<String>(&operation) {
            Err(e) => errors.push(format!("parse error: {e}")),
            Ok(_) => {
                if let Some(v) = validator {
                    errors.extend(v.validate(&operation, &known_types));
                }
            }
        }

        if errors.is_empty() {
            break;
        }
        if attempts >= config.max_validation_retries {
            break;
        }

        let (repaired_op, repaired_vars) =
            repair_operation(llm, &root_field, &discovered, &operation, &errors, &context.input_text, attempts + 1).await?;
        operation = repaired_op;
        variables = repaired_vars;
        attempts += 1;
    }

    let mut relevant_documents: Vec<RelevantDocument> =
        filtered.iter().map(|c| RelevantDocument { document: c.document.clone(), score: c.score }).collect();
    relevant_documents.extend(discovered.into_iter().map(|d| RelevantDocument { document: d, score: 1.0 }));

    Ok(DynamicGeneratedOperation {
        operation,
        variables,
        operation_type: op_type.to_lowercase(),
        root_field: root_field.name,
        relevant_documents,
        validation_attempts: attempts,
    })
}

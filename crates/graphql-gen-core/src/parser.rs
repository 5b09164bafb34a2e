//! Schema parser: turns GraphQL SDL into an ordered list of
//! [`EmbeddingDocument`]s.
//!
//! Walks the `graphql-parser` AST rather than slicing source spans: since
//! `graphql_parser::schema::Type` carries line/column `Pos` and not byte
//! offsets, every document's `content` is synthesized directly from the AST
//! fields (name, arguments, wrapped return type) instead of re-deriving
//! offsets from `Pos`. For well-formed SDL this produces the same
//! information a span slice would, because the signature is rebuilt from
//! exactly the fields a span-based reader would also read.

use graphql_parser::schema::{self, Definition, ParseError, Type, TypeDefinition};
use thiserror::Error;

use crate::embedding::content_id;
use crate::models::{ArgumentMetadata, DocumentMetadata, DocumentType, EmbeddingDocument};

/// Errors from parsing a schema document.
#[derive(Debug, Error)]
pub enum ParserError {
    /// The SDL text failed to parse. Fatal; surfaced unchanged.
    #[error("failed to parse schema: {0}")]
    Parse(#[from] ParseError),
}

/// Built-in scalar type names, excluded from type-discovery BFS and from
/// schema-validator lookups.
pub const BUILTIN_SCALARS: &[&str] = &["ID", "String", "Int", "Float", "Boolean"];

/// `true` if `name` is one of the five built-in GraphQL scalars.
pub fn is_builtin_scalar(name: &str) -> bool {
    BUILTIN_SCALARS.contains(&name)
}

/// Strip `!` and `[...]` wrappers down to the named type.
pub fn base_type_name(ty: &Type<String>) -> String {
    match ty {
        Type::NamedType(name) => name.clone(),
        Type::ListType(inner) => base_type_name(inner),
        Type::NonNullType(inner) => base_type_name(inner),
    }
}

/// Render a type including its `!`/`[...]` wrappers (e.g. `[ID!]!`).
fn render_type(ty: &Type<String>) -> String {
    match ty {
        Type::NamedType(name) => name.clone(),
        Type::ListType(inner) => format!("[{}]", render_type(inner)),
        Type::NonNullType(inner) => format!("{}!", render_type(inner)),
    }
}

/// Render a field's `name(args):ReturnType` signature, parent-free.
fn render_field_signature(name: &str, arguments: &[schema::InputValue<String>], return_type: &Type<String>) -> String {
    if arguments.is_empty() {
        format!("{}:{}", name, render_type(return_type))
    } else {
        let args = arguments
            .iter()
            .map(|a| format!("{}:{}", a.name, render_type(&a.value_type)))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({}):{}", name, args, render_type(return_type))
    }
}

fn argument_metadata(arguments: &[schema::InputValue<String>]) -> Vec<ArgumentMetadata> {
    arguments
        .iter()
        .map(|a| ArgumentMetadata {
            name: a.name.clone(),
            r#type: render_type(&a.value_type),
            description: a.description.clone(),
        })
        .collect()
}

fn make_document(
    doc_type: DocumentType,
    name: String,
    description: Option<String>,
    content: String,
    metadata: DocumentMetadata,
) -> EmbeddingDocument {
    let id = content_id(&content);
    EmbeddingDocument {
        id,
        doc_type,
        name,
        description,
        content,
        metadata,
    }
}

/// Parse SDL text into the ordered document list described in the data
/// model: container documents for object/interface/input/enum/union/scalar
/// types (except the three root operation types, which emit field
/// documents only), and one field document per field of
/// object/interface/input types.
pub fn parse_schema_documents(sdl: &str) -> Result<Vec<EmbeddingDocument>, ParserError> {
    let document = schema::parse_schema::<String>(sdl)?;
    let mut docs = Vec::new();

    for definition in &document.definitions {
        let Definition::TypeDefinition(type_def) = definition else {
            continue;
        };
        match type_def {
            TypeDefinition::Object(obj) => {
                if let Some(root_type) = DocumentType::root_operation_from_name(&obj.name) {
                    for field in &obj.fields {
                        docs.push(root_field_document(root_type, &obj.name, field));
                    }
                } else {
                    docs.push(object_container_document(obj));
                    for field in &obj.fields {
                        docs.push(field_document(&obj.name, field));
                    }
                }
            }
            TypeDefinition::Interface(iface) => {
                docs.push(interface_container_document(iface));
                for field in &iface.fields {
                    docs.push(field_document(&iface.name, field));
                }
            }
            TypeDefinition::InputObject(input) => {
                docs.push(input_container_document(input));
                for field in &input.fields {
                    docs.push(input_field_document(&input.name, field));
                }
            }
            TypeDefinition::Enum(en) => {
                docs.push(enum_container_document(en));
            }
            TypeDefinition::Union(un) => {
                docs.push(union_container_document(un));
            }
            TypeDefinition::Scalar(scalar) => {
                docs.push(scalar_container_document(scalar));
            }
        }
    }

    Ok(docs)
}

fn root_field_document(root_type: DocumentType, parent: &str, field: &schema::Field<String>) -> EmbeddingDocument {
    let signature = render_field_signature(&field.name, &field.arguments, &field.field_type);
    let content = format!("{}.{}", parent, signature);
    let metadata = DocumentMetadata {
        parent_type: Some(parent.to_string()),
        field_type: Some(render_type(&field.field_type)),
        arguments: argument_metadata(&field.arguments),
        is_root_operation_field: true,
        root_operation_type: Some(parent.to_string()),
        ..Default::default()
    };
    make_document(root_type, field.name.clone(), field.description.clone(), content, metadata)
}

fn field_document(parent: &str, field: &schema::Field<String>) -> EmbeddingDocument {
    let signature = render_field_signature(&field.name, &field.arguments, &field.field_type);
    let content = format!("{}.{}", parent, signature);
    let metadata = DocumentMetadata {
        parent_type: Some(parent.to_string()),
        field_type: Some(render_type(&field.field_type)),
        arguments: argument_metadata(&field.arguments),
        is_root_operation_field: false,
        ..Default::default()
    };
    make_document(DocumentType::Field, field.name.clone(), field.description.clone(), content, metadata)
}

fn input_field_document(parent: &str, field: &schema::InputValue<String>) -> EmbeddingDocument {
    let content = format!("{}.{}:{}", parent, field.name, render_type(&field.value_type));
    let metadata = DocumentMetadata {
        parent_type: Some(parent.to_string()),
        field_type: Some(render_type(&field.value_type)),
        is_root_operation_field: false,
        ..Default::default()
    };
    make_document(DocumentType::Field, field.name.clone(), field.description.clone(), content, metadata)
}

fn object_container_document(obj: &schema::ObjectType<String>) -> EmbeddingDocument {
    let field_names: Vec<String> = obj.fields.iter().map(|f| f.name.clone()).collect();
    let lines: Vec<String> = obj
        .fields
        .iter()
        .map(|f| render_field_signature(&f.name, &f.arguments, &f.field_type))
        .collect();
    let content = format!("type {} {{\n{}\n}}", obj.name, lines.join("\n"));
    let metadata = DocumentMetadata {
        fields: field_names,
        interfaces: obj.implements_interfaces.clone(),
        kind: Some("object".to_string()),
        ..Default::default()
    };
    make_document(DocumentType::Object, obj.name.clone(), obj.description.clone(), content, metadata)
}

fn interface_container_document(iface: &schema::InterfaceType<String>) -> EmbeddingDocument {
    let field_names: Vec<String> = iface.fields.iter().map(|f| f.name.clone()).collect();
    let lines: Vec<String> = iface
        .fields
        .iter()
        .map(|f| render_field_signature(&f.name, &f.arguments, &f.field_type))
        .collect();
    let content = format!("interface {} {{\n{}\n}}", iface.name, lines.join("\n"));
    let metadata = DocumentMetadata {
        fields: field_names,
        kind: Some("interface".to_string()),
        ..Default::default()
    };
    make_document(DocumentType::Interface, iface.name.clone(), iface.description.clone(), content, metadata)
}

fn input_container_document(input: &schema::InputObjectType<String>) -> EmbeddingDocument {
    let field_names: Vec<String> = input.fields.iter().map(|f| f.name.clone()).collect();
    let lines: Vec<String> = input
        .fields
        .iter()
        .map(|f| format!("{}:{}", f.name, render_type(&f.value_type)))
        .collect();
    let content = format!("input {} {{\n{}\n}}", input.name, lines.join("\n"));
    let metadata = DocumentMetadata {
        fields: field_names,
        kind: Some("input".to_string()),
        ..Default::default()
    };
    make_document(DocumentType::Input, input.name.clone(), input.description.clone(), content, metadata)
}

fn enum_container_document(en: &schema::EnumType<String>) -> EmbeddingDocument {
    let values: Vec<String> = en.values.iter().map(|v| v.name.clone()).collect();
    let content = format!("enum {} {{\n{}\n}}", en.name, values.join("\n"));
    let metadata = DocumentMetadata {
        enum_values: values,
        kind: Some("enum".to_string()),
        ..Default::default()
    };
    make_document(DocumentType::Enum, en.name.clone(), en.description.clone(), content, metadata)
}

fn union_container_document(un: &schema::UnionType<String>) -> EmbeddingDocument {
    let content = format!("union {} = {}", un.name, un.types.join(" | "));
    let metadata = DocumentMetadata {
        possible_types: un.types.clone(),
        kind: Some("union".to_string()),
        ..Default::default()
    };
    make_document(DocumentType::Union, un.name.clone(), un.description.clone(), content, metadata)
}

fn scalar_container_document(scalar: &schema::ScalarType<String>) -> EmbeddingDocument {
    let content = format!("scalar {}", scalar.name);
    let metadata = DocumentMetadata {
        kind: Some("scalar".to_string()),
        ..Default::default()
    };
    make_document(DocumentType::Scalar, scalar.name.clone(), scalar.description.clone(), content, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_SDL: &str = r#"
        type User { id: ID!, name: String! }
        type Query { users: [User!]! }
    "#;

    #[test]
    fn no_container_for_root_operation_type() {
        let docs = parse_schema_documents(SIMPLE_SDL).unwrap();
        assert!(!docs.iter().any(|d| d.name == "Query" && d.doc_type == DocumentType::Object));
    }

    #[test]
    fn root_field_tagged_with_operation_type() {
        let docs = parse_schema_documents(SIMPLE_SDL).unwrap();
        let users = docs.iter().find(|d| d.name == "users").unwrap();
        assert_eq!(users.doc_type, DocumentType::Query);
        assert!(users.metadata.is_root_operation_field);
        assert_eq!(users.metadata.root_operation_type.as_deref(), Some("Query"));
        assert_eq!(users.metadata.parent_type.as_deref(), Some("Query"));
    }

    #[test]
    fn field_content_has_parent_prefix() {
        let docs = parse_schema_documents(SIMPLE_SDL).unwrap();
        let name_field = docs.iter().find(|d| d.name == "name" && d.metadata.parent_type.as_deref() == Some("User")).unwrap();
        assert_eq!(name_field.content, "User.name:String!");
    }

    #[test]
    fn argument_signature_includes_type_wrappers() {
        let sdl = "type Query { user(id: ID!): User } type User { id: ID! }";
        let docs = parse_schema_documents(sdl).unwrap();
        let user_field = docs.iter().find(|d| d.name == "user").unwrap();
        assert_eq!(user_field.content, "Query.user(id:ID!):User");
    }

    #[test]
    fn ids_are_stable_across_reparses() {
        let a = parse_schema_documents(SIMPLE_SDL).unwrap();
        let b = parse_schema_documents(SIMPLE_SDL).unwrap();
        let ids_a: Vec<_> = a.iter().map(|d| d.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn enum_container_only_no_field_docs() {
        let sdl = "enum Status { ACTIVE INACTIVE } type Query { status: Status }";
        let docs = parse_schema_documents(sdl).unwrap();
        let status = docs.iter().find(|d| d.name == "Status").unwrap();
        assert_eq!(status.doc_type, DocumentType::Enum);
        assert_eq!(status.metadata.enum_values, vec!["ACTIVE", "INACTIVE"]);
        assert_eq!(docs.iter().filter(|d| d.metadata.parent_type.as_deref() == Some("Status")).count(), 0);
    }

    #[test]
    fn builtin_scalars_are_recognized() {
        assert!(is_builtin_scalar("ID"));
        assert!(is_builtin_scalar("String"));
        assert!(!is_builtin_scalar("User"));
    }

    #[test]
    fn base_type_name_strips_wrappers() {
        let ty = Type::NonNullType(Box::new(Type::ListType(Box::new(Type::NonNullType(Box::new(
            Type::NamedType("User".to_string()),
        ))))));
        assert_eq!(base_type_name(&ty), "User");
    }

    #[test]
    fn parse_error_is_surfaced() {
        let err = parse_schema_documents("type {{{ not valid");
        assert!(err.is_err());
    }
}

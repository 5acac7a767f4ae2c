//! Client-side query document synthesis.
//!
//! Given a model name and a field list, this module produces the text of
//! every CRUD/bulk/aggregate operation for that model, plus the universal
//! (model-name-as-a-variable) documents used by generic client hooks. No
//! hand-written document exists per model.
//!
//! The naming convention is exact and programmatic — plural for list
//! operations, singular for single-record operations, `_BULK` for batch
//! variants, `_PAGINATED` for the envelope variant — because consumers
//! construct these keys rather than typing them. A mismatch would silently
//! produce a missing document reference.
//!
//! The generator is pure and stateless: identical inputs produce
//! structurally identical output, which the transport layer relies on to
//! key its cache by operation identity.

use std::collections::BTreeMap;

/// Fallback selection when the caller supplies no field list: identifier
/// plus audit timestamps, never select-star.
pub const DEFAULT_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

const PAGE_META_FIELDS: [&str; 6] = [
    "total",
    "page",
    "limit",
    "totalPages",
    "hasNextPage",
    "hasPrevPage",
];

/// A relation to expand inside generated selection sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedSelection {
    pub name: String,
    pub fields: Vec<String>,
}

impl NestedSelection {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Generate every operation document for one model.
///
/// Returns a map from canonical operation key (`GET_TASKS`, `CREATE_TASK`,
/// `UPDATE_TASKS_BULK`, ...) to a ready-to-send document.
#[must_use]
pub fn generate_crud_queries(
    model: &str,
    fields: &[&str],
    nested: &[NestedSelection],
) -> BTreeMap<String, String> {
    let singular = to_pascal_case(model);
    let plural = pluralize(&singular);
    let singular_key = to_screaming_snake(&singular);
    let plural_key = to_screaming_snake(&plural);
    let singular_field = to_camel_case(&singular);
    let plural_field = to_camel_case(&plural);

    let fields: Vec<&str> = if fields.is_empty() {
        DEFAULT_FIELDS.to_vec()
    } else {
        fields.to_vec()
    };
    let record = selection_block(&fields, nested, 2);
    let record_nested = selection_block(&fields, nested, 3);
    let bulk_envelope = |indent: &str, inner: &str| {
        format!(
            "{indent}success\n{indent}count\n{indent}data {{\n{inner}\n{indent}}}\n{indent}errors {{\n{indent}  index\n{indent}  error\n{indent}}}"
        )
    };

    let mut documents = BTreeMap::new();

    documents.insert(
        format!("GET_{plural_key}"),
        format!(
            "query Get{plural}($where: Json, $orderBy: Json, $take: Int, $skip: Int) {{\n  {plural_field}(where: $where, orderBy: $orderBy, take: $take, skip: $skip) {{\n{record}\n  }}\n}}"
        ),
    );
    documents.insert(
        format!("GET_{plural_key}_PAGINATED"),
        format!(
            "query Get{plural}Paginated($where: Json, $orderBy: Json, $page: Int, $limit: Int) {{\n  {plural_field}Paginated(where: $where, orderBy: $orderBy, page: $page, limit: $limit) {{\n    data {{\n{record_nested}\n    }}\n    meta {{\n{meta}\n    }}\n  }}\n}}",
            meta = lines(&PAGE_META_FIELDS, 3),
        ),
    );
    documents.insert(
        format!("GET_{singular_key}"),
        format!(
            "query Get{singular}($where: Json!) {{\n  {singular_field}(where: $where) {{\n{record}\n  }}\n}}"
        ),
    );
    documents.insert(
        format!("COUNT_{plural_key}"),
        format!(
            "query Count{plural}($where: Json) {{\n  count{plural}(where: $where)\n}}"
        ),
    );
    documents.insert(
        format!("AGGREGATE_{plural_key}"),
        format!(
            "query Aggregate{plural}($where: Json, $aggregate: Json!) {{\n  aggregate{plural}(where: $where, aggregate: $aggregate)\n}}"
        ),
    );
    documents.insert(
        format!("CREATE_{singular_key}"),
        format!(
            "mutation Create{singular}($data: Json!) {{\n  create{singular}(data: $data) {{\n{record}\n  }}\n}}"
        ),
    );
    documents.insert(
        format!("UPDATE_{singular_key}"),
        format!(
            "mutation Update{singular}($where: Json!, $data: Json!) {{\n  update{singular}(where: $where, data: $data) {{\n{record}\n  }}\n}}"
        ),
    );
    documents.insert(
        format!("DELETE_{singular_key}"),
        format!(
            "mutation Delete{singular}($where: Json!) {{\n  delete{singular}(where: $where) {{\n{record}\n  }}\n}}"
        ),
    );
    documents.insert(
        format!("UPSERT_{singular_key}"),
        format!(
            "mutation Upsert{singular}($where: Json!, $create: Json!, $update: Json!) {{\n  upsert{singular}(where: $where, create: $create, update: $update) {{\n    record {{\n{record_nested}\n    }}\n    created\n  }}\n}}"
        ),
    );
    documents.insert(
        format!("CREATE_{plural_key}_BULK"),
        format!(
            "mutation Create{plural}Bulk($input: [Json!]!) {{\n  create{plural}Bulk(input: $input) {{\n{envelope}\n  }}\n}}",
            envelope = bulk_envelope("    ", &record_nested),
        ),
    );
    documents.insert(
        format!("UPDATE_{plural_key}_BULK"),
        format!(
            "mutation Update{plural}Bulk($input: [Json!]!) {{\n  update{plural}Bulk(input: $input) {{\n{envelope}\n  }}\n}}",
            envelope = bulk_envelope("    ", &record_nested),
        ),
    );
    documents.insert(
        format!("DELETE_{plural_key}_BULK"),
        format!(
            "mutation Delete{plural}Bulk($input: [Json!]!) {{\n  delete{plural}Bulk(input: $input) {{\n{envelope}\n  }}\n}}",
            envelope = bulk_envelope("    ", &record_nested),
        ),
    );

    documents
}

/// Generate the model-name-parameterized documents used by generic hooks.
///
/// These take the model name as a runtime variable rather than baking it
/// into the document text, so one hook implementation serves every model.
/// Results are raw JSON scalars because the record shape is dynamic.
#[must_use]
pub fn generate_universal_queries() -> BTreeMap<String, String> {
    let operations: [(&str, &str, &[(&str, &str)]); 12] = [
        ("DYNAMIC_FIND_MANY", "dynamicFindMany", &[
            ("where", "Json"),
            ("orderBy", "Json"),
            ("take", "Int"),
            ("skip", "Int"),
        ]),
        ("DYNAMIC_FIND_MANY_PAGINATED", "dynamicFindManyPaginated", &[
            ("where", "Json"),
            ("orderBy", "Json"),
            ("page", "Int"),
            ("limit", "Int"),
        ]),
        ("DYNAMIC_FIND_UNIQUE", "dynamicFindUnique", &[("where", "Json!")]),
        ("DYNAMIC_COUNT", "dynamicCount", &[("where", "Json")]),
        ("DYNAMIC_AGGREGATE", "dynamicAggregate", &[
            ("where", "Json"),
            ("aggregate", "Json!"),
        ]),
        ("DYNAMIC_CREATE", "dynamicCreate", &[("data", "Json!")]),
        ("DYNAMIC_UPDATE", "dynamicUpdate", &[
            ("where", "Json!"),
            ("data", "Json!"),
        ]),
        ("DYNAMIC_DELETE", "dynamicDelete", &[("where", "Json!")]),
        ("DYNAMIC_UPSERT", "dynamicUpsert", &[
            ("where", "Json!"),
            ("create", "Json!"),
            ("update", "Json!"),
        ]),
        ("DYNAMIC_CREATE_MANY", "dynamicCreateMany", &[("input", "[Json!]!")]),
        ("DYNAMIC_UPDATE_MANY", "dynamicUpdateMany", &[("input", "[Json!]!")]),
        ("DYNAMIC_DELETE_MANY", "dynamicDeleteMany", &[("input", "[Json!]!")]),
    ];

    let mut documents = BTreeMap::new();
    for (key, field, variables) in operations {
        let kind = if field.contains("Find") || field.contains("Count") || field.contains("Aggregate")
        {
            "query"
        } else {
            "mutation"
        };
        let mut declared = String::from("$model: String!");
        let mut passed = String::from("model: $model");
        for (name, ty) in variables {
            declared.push_str(&format!(", ${name}: {ty}"));
            passed.push_str(&format!(", {name}: ${name}"));
        }
        let name = to_pascal_case(field);
        documents.insert(
            key.to_string(),
            format!("{kind} {name}({declared}) {{\n  {field}({passed})\n}}"),
        );
    }
    documents
}

fn lines(fields: &[&str], indent_level: usize) -> String {
    let indent = "  ".repeat(indent_level);
    fields
        .iter()
        .map(|field| format!("{indent}{field}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn selection_block(fields: &[&str], nested: &[NestedSelection], indent_level: usize) -> String {
    let indent = "  ".repeat(indent_level);
    let mut rendered: Vec<String> = fields
        .iter()
        .map(|field| format!("{indent}{field}"))
        .collect();
    for relation in nested {
        let inner = relation
            .fields
            .iter()
            .map(|field| format!("{indent}  {field}"))
            .collect::<Vec<_>>()
            .join("\n");
        rendered.push(format!("{indent}{} {{\n{inner}\n{indent}}}", relation.name));
    }
    rendered.join("\n")
}

/// `blog_post`, `blogPost`, and `BlogPost` all become `BlogPost`.
#[must_use]
pub fn to_pascal_case(name: &str) -> String {
    if name.contains(['_', '-', ' ']) {
        name.split(['_', '-', ' '])
            .filter(|part| !part.is_empty())
            .map(capitalize)
            .collect()
    } else {
        capitalize(name)
    }
}

/// `blog_post` and `BlogPost` become `blogPost`.
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let pascal = to_pascal_case(name);
    let mut chars = pascal.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().collect::<String>() + chars.as_str()
    })
}

/// `BlogPost` becomes `BLOG_POST`.
#[must_use]
pub fn to_screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_uppercase());
    }
    out
}

/// Naive English pluralization, applied to the final word.
#[must_use]
pub fn pluralize(name: &str) -> String {
    let lower = name.to_lowercase();
    if let Some(stem) = name.strip_suffix('y') {
        let before = lower.chars().rev().nth(1);
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{stem}ies");
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{name}es");
    }
    format!("{name}s")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_helpers() {
        assert_eq!(to_pascal_case("task"), "Task");
        assert_eq!(to_pascal_case("blog_post"), "BlogPost");
        assert_eq!(to_pascal_case("blogPost"), "BlogPost");
        assert_eq!(to_camel_case("BlogPost"), "blogPost");
        assert_eq!(to_screaming_snake("Task"), "TASK");
        assert_eq!(to_screaming_snake("BlogPost"), "BLOG_POST");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("Task"), "Tasks");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Class"), "Classes");
        assert_eq!(pluralize("Day"), "Days");
    }

    #[test]
    fn test_key_naming_convention() {
        let documents = generate_crud_queries("Task", &["id", "title"], &[]);
        let keys: Vec<&str> = documents.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "AGGREGATE_TASKS",
                "COUNT_TASKS",
                "CREATE_TASK",
                "CREATE_TASKS_BULK",
                "DELETE_TASK",
                "DELETE_TASKS_BULK",
                "GET_TASK",
                "GET_TASKS",
                "GET_TASKS_PAGINATED",
                "UPDATE_TASK",
                "UPDATE_TASKS_BULK",
                "UPSERT_TASK",
            ]
        );
    }

    #[test]
    fn test_list_document_text() {
        let documents = generate_crud_queries("Task", &["id", "title"], &[]);
        assert_eq!(
            documents["GET_TASKS"],
            "query GetTasks($where: Json, $orderBy: Json, $take: Int, $skip: Int) {\n  tasks(where: $where, orderBy: $orderBy, take: $take, skip: $skip) {\n    id\n    title\n  }\n}"
        );
    }

    #[test]
    fn test_paginated_document_carries_meta() {
        let documents = generate_crud_queries("Task", &["id"], &[]);
        let doc = &documents["GET_TASKS_PAGINATED"];
        assert!(doc.contains("tasksPaginated(where: $where, orderBy: $orderBy, page: $page, limit: $limit)"));
        for field in PAGE_META_FIELDS {
            assert!(doc.contains(field), "meta field {field} missing");
        }
    }

    #[test]
    fn test_bulk_documents_carry_error_entries() {
        let documents = generate_crud_queries("Task", &["id"], &[]);
        for key in ["CREATE_TASKS_BULK", "UPDATE_TASKS_BULK", "DELETE_TASKS_BULK"] {
            let doc = &documents[key];
            assert!(doc.contains("success"));
            assert!(doc.contains("count"));
            assert!(doc.contains("index"));
            assert!(doc.contains("error"));
        }
    }

    #[test]
    fn test_upsert_document_exposes_created_flag() {
        let documents = generate_crud_queries("Task", &["id"], &[]);
        assert!(documents["UPSERT_TASK"].contains("created"));
    }

    #[test]
    fn test_nested_selection_rendering() {
        let documents = generate_crud_queries(
            "Post",
            &["id", "title"],
            &[NestedSelection::new("author", ["id", "name"])],
        );
        let doc = &documents["GET_POSTS"];
        assert!(doc.contains("author {\n      id\n      name\n    }"));
    }

    #[test]
    fn test_empty_field_list_falls_back_to_safe_defaults() {
        let documents = generate_crud_queries("Task", &[], &[]);
        let doc = &documents["GET_TASK"];
        for field in DEFAULT_FIELDS {
            assert!(doc.contains(field));
        }
        // Not select-star: nothing beyond the default set
        assert!(!doc.contains('*'));
    }

    #[test]
    fn test_generation_is_referentially_transparent() {
        let nested = [NestedSelection::new("author", ["id"])];
        let first = generate_crud_queries("BlogPost", &["id", "title"], &nested);
        let second = generate_crud_queries("BlogPost", &["id", "title"], &nested);
        assert_eq!(first, second);

        assert_eq!(generate_universal_queries(), generate_universal_queries());
    }

    #[test]
    fn test_universal_queries_take_model_as_variable() {
        let documents = generate_universal_queries();
        assert_eq!(documents.len(), 12);
        for (key, doc) in &documents {
            assert!(doc.contains("$model: String!"), "{key} missing model variable");
            assert!(doc.contains("model: $model"), "{key} missing model argument");
            assert!(!doc.contains("Task"), "{key} bakes in a model name");
        }
        assert_eq!(
            documents["DYNAMIC_FIND_MANY"],
            "query DynamicFindMany($model: String!, $where: Json, $orderBy: Json, $take: Int, $skip: Int) {\n  dynamicFindMany(model: $model, where: $where, orderBy: $orderBy, take: $take, skip: $skip)\n}"
        );
    }

    #[test]
    fn test_universal_mutations_are_mutations() {
        let documents = generate_universal_queries();
        assert!(documents["DYNAMIC_CREATE"].starts_with("mutation "));
        assert!(documents["DYNAMIC_DELETE_MANY"].starts_with("mutation "));
        assert!(documents["DYNAMIC_FIND_UNIQUE"].starts_with("query "));
        assert!(documents["DYNAMIC_COUNT"].starts_with("query "));
    }
}

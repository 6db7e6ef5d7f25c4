use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(app) = expect_optional_object(root, "app")? {
        validate_optional_string_field(app, "app.environment", "environment")?;
        validate_u64_field(
            app,
            "app.max_query_length",
            "max_query_length",
            1,
            100_000,
        )?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.dimension", "dimension", 1, 65_536)?;
    }

    if let Some(store) = expect_optional_object(root, "vector_store")? {
        validate_enum_field(store, "vector_store.backend", "backend", &["sqlite", "astra"])?;
        validate_optional_string_field(store, "vector_store.table_name", "table_name")?;
        if let Some(astra) = expect_optional_object(store, "astra")? {
            validate_optional_string_field(astra, "vector_store.astra.keyspace", "keyspace")?;
            validate_optional_string_field(
                astra,
                "vector_store.astra.api_endpoint",
                "api_endpoint",
            )?;
        }
    }

    if let Some(wiki) = expect_optional_object(root, "wikipedia")? {
        validate_optional_string_field(wiki, "wikipedia.api_url", "api_url")?;
        validate_optional_string_field(wiki, "wikipedia.lang", "lang")?;
        validate_u64_field(wiki, "wikipedia.top_k_results", "top_k_results", 1, 10)?;
        validate_u64_field(
            wiki,
            "wikipedia.doc_content_chars_max",
            "doc_content_chars_max",
            1,
            100_000,
        )?;
    }

    if let Some(workflow) = expect_optional_object(root, "workflow")? {
        validate_u64_field(workflow, "workflow.top_k", "top_k", 1, 20)?;
        validate_u64_field(
            workflow,
            "workflow.max_context_documents",
            "max_context_documents",
            1,
            5,
        )?;
        validate_u64_field(
            workflow,
            "workflow.provider_timeout_secs",
            "provider_timeout_secs",
            1,
            600,
        )?;
        validate_u64_field(workflow, "workflow.max_steps", "max_steps", 3, 100)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() && !value.is_null() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn range_error(path: &str, min: impl std::fmt::Display, max: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': must be between {} and {}",
        path, min, max
    ))
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_partial_documents() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({ "workflow": { "top_k": 4 }, "llm": null })).is_ok());
    }

    #[test]
    fn rejects_non_object_root() {
        assert!(validate_config(&json!([1, 2])).is_err());
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let err = validate_config(&json!({ "wikipedia": { "top_k_results": 0 } })).unwrap_err();
        assert!(err.to_string().contains("wikipedia.top_k_results"));

        let err = validate_config(&json!({ "llm": { "temperature": 3.5 } })).unwrap_err();
        assert!(err.to_string().contains("llm.temperature"));
    }

    #[test]
    fn context_documents_limited_to_five() {
        let err = validate_config(&json!({ "workflow": { "max_context_documents": 8 } }))
            .unwrap_err();
        assert!(err.to_string().contains("workflow.max_context_documents"));
        assert!(err.to_string().contains("between 1 and 5"));

        assert!(validate_config(&json!({ "workflow": { "max_context_documents": 5 } })).is_ok());
    }

    #[test]
    fn rejects_wrong_types() {
        let err = validate_config(&json!({ "server": { "cors_allowed_origins": "*" } }))
            .unwrap_err();
        assert!(err.to_string().contains("array of strings"));

        let err = validate_config(&json!({ "workflow": "fast" })).unwrap_err();
        assert!(err.to_string().contains("expected object"));
    }
}

//! Structured output schemas for agents.
//!
//! An agent without a schema produces plain text; an agent with an
//! [`AgentOutputSchema`] is asked for JSON matching the schema, and the
//! runtime parses the model's text against it before accepting a final
//! output.

use schemars::JsonSchema;
use serde_json::Value;

use crate::error::{Error, Result};

/// A structured output schema attached to an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutputSchema {
    name: String,
    json_schema: Value,
    strict_json_schema: bool,
}

impl AgentOutputSchema {
    /// Build a schema from a type that derives [`schemars::JsonSchema`].
    ///
    /// The schema name comes from [`schemars::JsonSchema::schema_name`], and
    /// the `$schema` meta field is removed (model backends don't need it).
    #[must_use]
    pub fn of<T: JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let mut json_schema = serde_json::to_value(root)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        if let Value::Object(ref mut map) = json_schema {
            map.remove("$schema");
        }
        Self {
            name: <T as JsonSchema>::schema_name().into_owned(),
            json_schema,
            strict_json_schema: true,
        }
    }

    /// Build a schema from a raw JSON Schema value.
    #[must_use]
    pub fn from_json_schema(name: impl Into<String>, json_schema: Value) -> Self {
        Self {
            name: name.into(),
            json_schema,
            strict_json_schema: true,
        }
    }

    /// Disable strict-mode schema enforcement for backends that reject
    /// strict schemas.
    #[must_use]
    pub const fn non_strict(mut self) -> Self {
        self.strict_json_schema = false;
        self
    }

    /// The schema name, used when declaring the response format.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying JSON Schema.
    #[must_use]
    pub const fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    /// Whether the schema is declared in strict mode.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict_json_schema
    }

    /// Parse model output text against this schema.
    ///
    /// Invalid JSON, or a JSON shape that contradicts the schema's declared
    /// top-level type, is a model-behavior error: the model failed to honor
    /// the response format it was given. Full structural validation is the
    /// schema builder's concern and happens backend-side.
    pub fn validate_json(&self, text: &str) -> Result<Value> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            Error::model_behavior(format!(
                "output did not parse as JSON for schema '{}': {e}",
                self.name
            ))
        })?;
        if self.json_schema.get("type").and_then(Value::as_str) == Some("object")
            && !value.is_object()
        {
            return Err(Error::model_behavior(format!(
                "output for schema '{}' is not a JSON object",
                self.name
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Weather {
        #[allow(dead_code)]
        city: String,
    }

    #[test]
    fn derives_name_and_object_schema() {
        let schema = AgentOutputSchema::of::<Weather>();
        assert_eq!(schema.name(), "Weather");
        assert!(schema.is_strict());
        assert_eq!(
            schema.json_schema().get("type").and_then(Value::as_str),
            Some("object")
        );
        // The $schema meta field is stripped before the backend sees it.
        assert!(schema.json_schema().get("$schema").is_none());
    }

    #[test]
    fn validate_accepts_matching_json() {
        let schema = AgentOutputSchema::of::<Weather>();
        let value = schema.validate_json(r#"{"city":"Oslo"}"#).unwrap();
        assert_eq!(value["city"], "Oslo");
    }

    #[test]
    fn validate_rejects_garbage_as_model_behavior() {
        let schema = AgentOutputSchema::of::<Weather>();
        let err = schema.validate_json("not json").unwrap_err();
        assert!(matches!(err, Error::ModelBehavior { .. }));

        let err = schema.validate_json("\"a string\"").unwrap_err();
        assert!(matches!(err, Error::ModelBehavior { .. }));
    }
}

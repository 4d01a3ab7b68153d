//! Structural validator for parsed generator responses.
//!
//! A [`Schema`] describes the expected shape of a JSON value: per-field type,
//! presence, enumerations, string/number/array bounds, nested objects and
//! arrays, strict mode, and custom predicates. [`SchemaValidator::validate`]
//! returns every [`Violation`] found; an empty list means the value is valid.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Schema model
// ---------------------------------------------------------------------------

/// JSON value type a field is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Array => "array",
            ValueType::Object => "object",
        }
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "boolean" => Ok(ValueType::Boolean),
            "array" => Ok(ValueType::Array),
            "object" => Ok(ValueType::Object),
            other => Err(other.to_string()),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Caller-supplied check: `Ok(())` when valid, `Err(message)` otherwise.
///
/// A panic inside the predicate is caught and reported as a
/// [`ViolationCode::CustomValidation`] violation.
#[derive(Clone)]
pub struct CustomPredicate(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl CustomPredicate {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Rules for one field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<ValueType>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, FieldSchema>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strict: bool,
    #[serde(skip)]
    pub custom: Option<CustomPredicate>,
}

impl FieldSchema {
    /// Field of the given type, optional by default.
    pub fn of(ty: ValueType) -> Self {
        Self {
            ty: Some(ty),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn item_count(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    pub fn items(mut self, items: FieldSchema) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn properties<I, K>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldSchema)>,
        K: Into<String>,
    {
        self.properties = Some(properties.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn custom(mut self, predicate: CustomPredicate) -> Self {
        self.custom = Some(predicate);
        self
    }
}

/// Shape description for a top-level object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub properties: BTreeMap<String, FieldSchema>,
    /// Reject fields not listed in `properties`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub strict: bool,
}

/// Errors from parsing a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema document must be a JSON object")]
    NotAnObject,

    #[error("field '{field}' has unknown type '{ty}'")]
    UnknownType { field: String, ty: String },

    #[error("field '{field}' must map to a type name or a field schema object")]
    InvalidShorthand { field: String },

    #[error("invalid schema document: {0}")]
    Invalid(#[from] serde_json::Error),
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Shorthand form: every listed field is required with the given type.
    pub fn shorthand<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, ValueType)>,
        K: Into<String>,
    {
        Self {
            properties: fields
                .into_iter()
                .map(|(name, ty)| (name.into(), FieldSchema::of(ty).required()))
                .collect(),
            strict: false,
        }
    }

    /// Parse a schema document.
    ///
    /// Accepts the full form (`{"properties": {...}, "strict": true}`) or the
    /// shorthand type map (`{"a": "number", "b": "string"}`). In shorthand,
    /// a field may also map to a full field schema object.
    pub fn from_json(doc: &Value) -> Result<Self, SchemaError> {
        let map = doc.as_object().ok_or(SchemaError::NotAnObject)?;
        if map.contains_key("properties") {
            return Ok(serde_json::from_value(doc.clone())?);
        }

        let mut properties = BTreeMap::new();
        for (field, spec) in map {
            let field_schema = match spec {
                Value::String(ty) => {
                    let ty = ty.parse::<ValueType>().map_err(|ty| SchemaError::UnknownType {
                        field: field.clone(),
                        ty,
                    })?;
                    FieldSchema::of(ty).required()
                }
                Value::Object(_) => serde_json::from_value(spec.clone())?,
                _ => {
                    return Err(SchemaError::InvalidShorthand {
                        field: field.clone(),
                    })
                }
            };
            properties.insert(field.clone(), field_schema);
        }
        Ok(Self {
            properties,
            strict: false,
        })
    }

    /// JSON form of the schema, used in audit context. Custom predicates
    /// are omitted.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// Violation code, serialized in the `ERR_*` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationCode {
    #[serde(rename = "ERR_MISSING_FIELD")]
    MissingField,
    #[serde(rename = "ERR_INVALID_TYPE")]
    InvalidType,
    #[serde(rename = "ERR_INVALID_VALUE")]
    InvalidValue,
    #[serde(rename = "ERR_ARRAY_VALIDATION")]
    ArrayValidation,
    #[serde(rename = "ERR_OBJECT_VALIDATION")]
    ObjectValidation,
    #[serde(rename = "ERR_CUSTOM_VALIDATION")]
    CustomValidation,
    #[serde(rename = "ERR_INVALID_FIELD")]
    InvalidField,
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted field path (`user.name`, `tags[2]`); `$` is the root value.
    pub field: String,
    #[serde(rename = "error_code")]
    pub code: ViolationCode,
    pub message: String,
}

impl Violation {
    fn new(field: &str, code: ViolationCode, message: String) -> Self {
        Self {
            field: field.to_string(),
            code,
            message,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validation result in report form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Violation>,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Stateless structural validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Every violation of `schema` by `value`; empty means valid.
    pub fn validate(&self, value: &Value, schema: &Schema) -> Vec<Violation> {
        let mut out = Vec::new();
        self.validate_object(value, &schema.properties, schema.strict, None, &mut out);
        out
    }

    pub fn is_valid(&self, value: &Value, schema: &Schema) -> ValidationReport {
        let errors = self.validate(value, schema);
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn validate_object(
        &self,
        value: &Value,
        properties: &BTreeMap<String, FieldSchema>,
        strict: bool,
        path: Option<&str>,
        out: &mut Vec<Violation>,
    ) {
        if properties.is_empty() && !strict {
            return;
        }
        let Some(object) = value.as_object() else {
            let field = path.unwrap_or("$");
            out.push(Violation::new(
                field,
                ViolationCode::ObjectValidation,
                format!("Field '{field}' expected an object, got '{}'", type_name(value)),
            ));
            return;
        };

        for (name, field_schema) in properties {
            let field = match path {
                Some(parent) => format!("{parent}.{name}"),
                None => name.clone(),
            };
            self.validate_field(object.get(name), field_schema, &field, out);
        }

        if strict {
            for key in object.keys().filter(|k| !properties.contains_key(*k)) {
                let field = match path {
                    Some(parent) => format!("{parent}.{key}"),
                    None => key.clone(),
                };
                out.push(Violation::new(
                    &field,
                    ViolationCode::InvalidField,
                    format!("Unexpected field '{field}' in strict mode"),
                ));
            }
        }
    }

    fn validate_field(
        &self,
        value: Option<&Value>,
        schema: &FieldSchema,
        field: &str,
        out: &mut Vec<Violation>,
    ) {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if schema.required {
                    out.push(Violation::new(
                        field,
                        ViolationCode::MissingField,
                        format!("Required field '{field}' is missing"),
                    ));
                }
                return;
            }
        };

        if let Some(expected) = schema.ty {
            let actual = type_name(value);
            if actual != expected.as_str() {
                out.push(Violation::new(
                    field,
                    ViolationCode::InvalidType,
                    format!(
                        "Field '{field}' expected type '{}', got '{actual}'",
                        expected.as_str()
                    ),
                ));
                return;
            }
        }

        if let Some(allowed) = &schema.allowed {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' must be one of: {}", options.join(", ")),
                ));
            }
        }

        match (schema.ty, value) {
            (Some(ValueType::String), Value::String(s)) => self.check_string(s, schema, field, out),
            (Some(ValueType::Number), Value::Number(n)) => {
                if let Some(n) = n.as_f64() {
                    self.check_number(n, schema, field, out);
                }
            }
            (Some(ValueType::Array), Value::Array(items)) => {
                self.check_array(items, schema, field, out)
            }
            _ => {}
        }

        if let Some(properties) = &schema.properties {
            if schema.ty.is_none() || schema.ty == Some(ValueType::Object) {
                self.validate_object(value, properties, schema.strict, Some(field), out);
            }
        }

        if let Some(predicate) = &schema.custom {
            match catch_unwind(AssertUnwindSafe(|| predicate.check(value))) {
                Ok(Ok(())) => {}
                Ok(Err(message)) => {
                    let message = if message.is_empty() {
                        format!("Custom validation failed for field '{field}'")
                    } else {
                        message
                    };
                    out.push(Violation::new(field, ViolationCode::CustomValidation, message));
                }
                Err(panic) => {
                    let detail = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "predicate panicked".to_string());
                    out.push(Violation::new(
                        field,
                        ViolationCode::CustomValidation,
                        format!("Custom validation error for field '{field}': {detail}"),
                    ));
                }
            }
        }
    }

    fn check_string(&self, s: &str, schema: &FieldSchema, field: &str, out: &mut Vec<Violation>) {
        let len = s.chars().count();
        if let Some(min) = schema.min_length {
            if len < min {
                out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' must be at least {min} characters"),
                ));
            }
        }
        if let Some(max) = schema.max_length {
            if len > max {
                out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' must be at most {max} characters"),
                ));
            }
        }
        if let Some(pattern) = &schema.pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' does not match required pattern"),
                )),
                Err(e) => out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' has an invalid pattern '{pattern}': {e}"),
                )),
            }
        }
    }

    fn check_number(&self, n: f64, schema: &FieldSchema, field: &str, out: &mut Vec<Violation>) {
        if let Some(min) = schema.min {
            if n < min {
                out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' must be at least {min}"),
                ));
            }
        }
        if let Some(max) = schema.max {
            if n > max {
                out.push(Violation::new(
                    field,
                    ViolationCode::InvalidValue,
                    format!("Field '{field}' must be at most {max}"),
                ));
            }
        }
    }

    fn check_array(
        &self,
        items: &[Value],
        schema: &FieldSchema,
        field: &str,
        out: &mut Vec<Violation>,
    ) {
        if let Some(min) = schema.min_items {
            if items.len() < min {
                out.push(Violation::new(
                    field,
                    ViolationCode::ArrayValidation,
                    format!("Array '{field}' must have at least {min} items"),
                ));
            }
        }
        if let Some(max) = schema.max_items {
            if items.len() > max {
                out.push(Violation::new(
                    field,
                    ViolationCode::ArrayValidation,
                    format!("Array '{field}' must have at most {max} items"),
                ));
            }
        }
        if let Some(item_schema) = &schema.items {
            for (index, item) in items.iter().enumerate() {
                self.validate_field(Some(item), item_schema, &format!("{field}[{index}]"), out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Common schemas
// ---------------------------------------------------------------------------

/// Schemas for the payloads this system commonly exchanges.
pub mod common {
    use super::{FieldSchema, Schema, ValueType};

    pub const NAMES: [&str; 4] = [
        "file_operation",
        "generator_response",
        "log_entry",
        "uncertainty_halt",
    ];

    /// Result of a filesystem-style operation.
    pub fn file_operation() -> Schema {
        Schema::new()
            .field(
                "operation",
                FieldSchema::of(ValueType::String)
                    .required()
                    .one_of(["create", "read", "update", "delete"]),
            )
            .field(
                "path",
                FieldSchema::of(ValueType::String)
                    .required()
                    .length(Some(1), None),
            )
            .field("content", FieldSchema::of(ValueType::String))
            .field("success", FieldSchema::of(ValueType::Boolean).required())
    }

    /// Envelope returned by a generator that reports its own status.
    pub fn generator_response() -> Schema {
        Schema::new()
            .field(
                "status",
                FieldSchema::of(ValueType::String)
                    .required()
                    .one_of(["SUCCESS", "ERROR", "UNCERTAINTY_HALT"]),
            )
            .field("data", FieldSchema::of(ValueType::Object))
            .field("error", FieldSchema::of(ValueType::String))
            .field("operation_id", FieldSchema::of(ValueType::String).required())
    }

    /// Plain audit log line.
    pub fn log_entry() -> Schema {
        Schema::new()
            .field("timestamp", FieldSchema::of(ValueType::String).required())
            .field(
                "level",
                FieldSchema::of(ValueType::String)
                    .required()
                    .one_of(["INFO", "WARN", "ERROR"]),
            )
            .field("message", FieldSchema::of(ValueType::String).required())
            .field("operation_id", FieldSchema::of(ValueType::String))
            .field("metadata", FieldSchema::of(ValueType::Object))
    }

    /// Uncertainty-halt audit record.
    pub fn uncertainty_halt() -> Schema {
        Schema::new()
            .field("operation_id", FieldSchema::of(ValueType::String).required())
            .field(
                "status",
                FieldSchema::of(ValueType::String)
                    .required()
                    .one_of(["UNCERTAINTY_HALT"]),
            )
            .field("reason", FieldSchema::of(ValueType::String).required())
            .field("raw_response", FieldSchema::of(ValueType::String))
            .field("context", FieldSchema::of(ValueType::Object).required())
            .field("source", FieldSchema::of(ValueType::String).required())
    }

    /// Look up a common schema by name.
    pub fn by_name(name: &str) -> Option<Schema> {
        match name {
            "file_operation" => Some(file_operation()),
            "generator_response" => Some(generator_response()),
            "log_entry" => Some(log_entry()),
            "uncertainty_halt" => Some(uncertainty_halt()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(violations: &[Violation]) -> Vec<ViolationCode> {
        violations.iter().map(|v| v.code).collect()
    }

    #[test]
    fn shorthand_reports_missing_field() {
        let schema = Schema::shorthand([("a", ValueType::Number), ("b", ValueType::String)]);
        let violations = SchemaValidator::new().validate(&json!({"a": 1}), &schema);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "b");
        assert_eq!(violations[0].code, ViolationCode::MissingField);
    }

    #[test]
    fn type_mismatch_stops_further_checks() {
        let schema = Schema::new().field(
            "name",
            FieldSchema::of(ValueType::String).length(Some(3), None),
        );
        let violations = SchemaValidator::new().validate(&json!({"name": 42}), &schema);
        assert_eq!(codes(&violations), vec![ViolationCode::InvalidType]);
        assert!(violations[0].message.contains("got 'number'"));
    }

    #[test]
    fn null_counts_as_absent() {
        let schema = Schema::new()
            .field("opt", FieldSchema::of(ValueType::String))
            .field("req", FieldSchema::of(ValueType::String).required());
        let violations =
            SchemaValidator::new().validate(&json!({"opt": null, "req": null}), &schema);
        assert_eq!(codes(&violations), vec![ViolationCode::MissingField]);
        assert_eq!(violations[0].field, "req");
    }

    #[test]
    fn string_bounds_enum_and_pattern() {
        let schema = Schema::new()
            .field(
                "mode",
                FieldSchema::of(ValueType::String).one_of(["fast", "safe"]),
            )
            .field(
                "code",
                FieldSchema::of(ValueType::String)
                    .length(Some(2), Some(4))
                    .pattern("^[A-Z]+$"),
            );
        let validator = SchemaValidator::new();

        assert!(validator
            .validate(&json!({"mode": "safe", "code": "ABC"}), &schema)
            .is_empty());

        let violations = validator.validate(&json!({"mode": "yolo", "code": "abcdef"}), &schema);
        // BTreeMap order: "code" before "mode".
        assert_eq!(
            codes(&violations),
            vec![
                ViolationCode::InvalidValue,
                ViolationCode::InvalidValue,
                ViolationCode::InvalidValue
            ]
        );
        assert!(violations[0].message.contains("at most 4"));
        assert!(violations[1].message.contains("pattern"));
        assert!(violations[2].message.contains("fast, safe"));
    }

    #[test]
    fn invalid_pattern_is_reported_not_panicked() {
        let schema = Schema::new().field("x", FieldSchema::of(ValueType::String).pattern("(["));
        let violations = SchemaValidator::new().validate(&json!({"x": "anything"}), &schema);
        assert_eq!(codes(&violations), vec![ViolationCode::InvalidValue]);
        assert!(violations[0].message.contains("invalid pattern"));
    }

    #[test]
    fn number_range() {
        let schema = Schema::new().field(
            "score",
            FieldSchema::of(ValueType::Number).range(Some(0.0), Some(1.0)),
        );
        let validator = SchemaValidator::new();
        assert!(validator.validate(&json!({"score": 0.5}), &schema).is_empty());
        let violations = validator.validate(&json!({"score": 1.5}), &schema);
        assert_eq!(codes(&violations), vec![ViolationCode::InvalidValue]);
        assert!(violations[0].message.contains("at most 1"));
    }

    #[test]
    fn arrays_recurse_into_items() {
        let schema = Schema::new().field(
            "tags",
            FieldSchema::of(ValueType::Array)
                .item_count(Some(1), Some(3))
                .items(FieldSchema::of(ValueType::String)),
        );
        let violations =
            SchemaValidator::new().validate(&json!({"tags": ["a", 2, "c", "d"]}), &schema);
        assert_eq!(
            codes(&violations),
            vec![ViolationCode::ArrayValidation, ViolationCode::InvalidType]
        );
        assert_eq!(violations[1].field, "tags[1]");
    }

    #[test]
    fn nested_objects_use_dotted_paths() {
        let schema = Schema::new().field(
            "user",
            FieldSchema::of(ValueType::Object).properties([
                ("name", FieldSchema::of(ValueType::String).required()),
                ("age", FieldSchema::of(ValueType::Number)),
            ]),
        );
        let violations =
            SchemaValidator::new().validate(&json!({"user": {"age": "old"}}), &schema);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["user.age", "user.name"]);
    }

    #[test]
    fn strict_mode_rejects_unlisted_fields() {
        let schema = Schema::new()
            .field("a", FieldSchema::of(ValueType::Number))
            .strict();
        let violations = SchemaValidator::new().validate(&json!({"a": 1, "extra": true}), &schema);
        assert_eq!(codes(&violations), vec![ViolationCode::InvalidField]);
        assert_eq!(violations[0].field, "extra");
    }

    #[test]
    fn non_object_root_is_one_violation() {
        let schema = Schema::shorthand([("a", ValueType::Number)]);
        let violations = SchemaValidator::new().validate(&json!([1, 2]), &schema);
        assert_eq!(codes(&violations), vec![ViolationCode::ObjectValidation]);
        assert_eq!(violations[0].field, "$");
    }

    #[test]
    fn custom_predicate_failure_and_panic() {
        let even = CustomPredicate::new(|v| match v.as_i64() {
            Some(n) if n % 2 == 0 => Ok(()),
            _ => Err("value must be even".to_string()),
        });
        let exploding = CustomPredicate::new(|_| panic!("predicate exploded"));
        let schema = Schema::new()
            .field("n", FieldSchema::of(ValueType::Number).custom(even))
            .field("z", FieldSchema::default().custom(exploding));

        let violations = SchemaValidator::new().validate(&json!({"n": 3, "z": 1}), &schema);
        assert_eq!(
            codes(&violations),
            vec![ViolationCode::CustomValidation, ViolationCode::CustomValidation]
        );
        assert_eq!(violations[0].message, "value must be even");
        assert!(violations[1].message.contains("predicate exploded"));
    }

    #[test]
    fn from_json_accepts_shorthand_and_full_forms() {
        let short = Schema::from_json(&json!({"a": "number", "b": "string"})).unwrap();
        assert!(short.properties["a"].required);
        assert_eq!(short.properties["b"].ty, Some(ValueType::String));

        let full = Schema::from_json(&json!({
            "properties": {
                "status": {"type": "string", "required": true, "enum": ["ok"]},
                "items": {"type": "array", "minItems": 1, "items": {"type": "number"}}
            },
            "strict": true
        }))
        .unwrap();
        assert!(full.strict);
        assert_eq!(full.properties["items"].min_items, Some(1));
        assert!(full.properties["items"].items.is_some());

        assert!(matches!(
            Schema::from_json(&json!({"a": "decimal"})),
            Err(SchemaError::UnknownType { .. })
        ));
        assert!(matches!(
            Schema::from_json(&json!([1])),
            Err(SchemaError::NotAnObject)
        ));
    }

    #[test]
    fn common_schemas_validate_their_payloads() {
        let validator = SchemaValidator::new();
        let report = validator.is_valid(
            &json!({"operation": "read", "path": "/etc/hosts", "success": true}),
            &common::file_operation(),
        );
        assert!(report.valid, "{:?}", report.errors);

        let report = validator.is_valid(
            &json!({"operation": "move", "path": "", "success": "yes"}),
            &common::file_operation(),
        );
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3);

        for name in common::NAMES {
            assert!(common::by_name(name).is_some());
        }
    }
}

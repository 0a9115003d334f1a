use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Property {
    #[serde(rename = "type")]
    kind: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    allowed: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_pattern"
    )]
    pattern: Option<Regex>,
}

fn serialize_pattern<S: Serializer>(pattern: &Option<Regex>, s: S) -> Result<S::Ok, S::Error> {
    match pattern {
        Some(re) => s.serialize_str(re.as_str()),
        None => s.serialize_none(),
    }
}

impl Property {
    pub fn new(kind: PropertyType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: Some(description.into()),
            allowed: None,
            default: None,
            pattern: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new(PropertyType::String, description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::new(PropertyType::Number, description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::new(PropertyType::Integer, description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new(PropertyType::Boolean, description)
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn matching(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    fn check(&self, name: &str, value: &Value) -> Result<(), ToolError> {
        if !self.kind.matches(value) {
            return Err(ToolError::invalid(format!(
                "'{}' must be of type {}",
                name,
                self.kind.as_str()
            )));
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect();
                return Err(ToolError::invalid(format!(
                    "'{}' must be one of: {}",
                    name,
                    options.join(", ")
                )));
            }
        }

        if let (Some(re), Some(s)) = (&self.pattern, value.as_str()) {
            if !re.is_match(s) {
                return Err(ToolError::invalid(format!(
                    "'{}' does not match pattern {}",
                    name,
                    re.as_str()
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    properties: Vec<(String, Property)>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, property: Property) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.push((name, property));
        self
    }

    pub fn optional(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.push((name.into(), property));
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Checks `arguments` and returns them with defaults filled in.
    ///
    /// `null` arguments count as an empty object, and a `null` property counts
    /// as absent. Properties the schema does not declare pass through untouched.
    pub fn validate(&self, arguments: Value) -> Result<Value, ToolError> {
        let mut args = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(ToolError::invalid("arguments must be an object")),
        };

        for (name, property) in &self.properties {
            if let Some(value) = args.get_mut(name).filter(|v| !v.is_null()) {
                property.check(name, value)?;
                if property.kind == PropertyType::Integer {
                    normalize_integer(value);
                }
            } else if let Some(default) = &property.default {
                args.insert(name.clone(), default.clone());
            } else if self.is_required(name) {
                return Err(ToolError::MissingArgument(name.clone()));
            } else {
                args.remove(name);
            }
        }

        Ok(Value::Object(args))
    }
}

/// Rewrites a whole float such as `3.0` as the integer `3`.
fn normalize_integer(value: &mut Value) {
    if value.is_i64() || value.is_u64() {
        return;
    }
    if let Some(f) = value.as_f64() {
        *value = if f < 0.0 {
            Value::from(f as i64)
        } else {
            Value::from(f as u64)
        };
    }
}

struct OrderedProperties<'a>(&'a [(String, Property)]);

impl Serialize for OrderedProperties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, prop)| (name, prop)))
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.required.is_empty() { 2 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &OrderedProperties(&self.properties))?;
        if !self.required.is_empty() {
            map.serialize_entry("required", &self.required)?;
        }
        map.end()
    }
}

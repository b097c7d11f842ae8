//! Field-level validation errors and JSON body coercion.
//!
//! Request bodies are not rejected at the first bad field. Instead every field is
//! checked and each failure is recorded as a [FieldError], so the client can
//! fix all of them at once.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Error;

/// The location prefix for fields read from a JSON request body.
pub const BODY: &str = "body";
/// The location prefix for parameters read from the query string.
pub const QUERY: &str = "query";

/// Describes why a single field in a request was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Where the value was found, e.g. `["body", "amount"]`.
    pub loc: Vec<String>,
    /// A human readable explanation.
    pub msg: String,
    /// A machine readable error kind, e.g. `missing` or `float_parsing`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    /// Create an error for the value at `loc`.
    pub fn new(loc: &[&str], msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc: loc.iter().map(|part| (*part).to_owned()).collect(),
            msg: msg.into(),
            kind: kind.into(),
        }
    }

    /// A required field was not provided.
    pub fn missing(location: &str, field: &str) -> Self {
        Self::new(&[location, field], "Field required", "missing")
    }

    fn from_invalid(location: &str, field: &str, invalid: Invalid) -> Self {
        Self::new(&[location, field], invalid.msg, invalid.kind)
    }
}

/// The reason a value could not be coerced to the wanted type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Invalid {
    msg: &'static str,
    kind: &'static str,
}

impl Invalid {
    const fn new(msg: &'static str, kind: &'static str) -> Self {
        Self { msg, kind }
    }
}

/// A function that coerces a JSON value into a concrete type.
pub type Coerce<T> = fn(&Value) -> Result<T, Invalid>;

/// Reads the fields of a JSON object, collecting a [FieldError] for each
/// field that is missing or cannot be coerced.
pub struct JsonFields<'a> {
    object: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> JsonFields<'a> {
    /// Start reading fields from `value`.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `value` is not a JSON object.
    pub fn new(value: &'a Value) -> Result<Self, Error> {
        match value.as_object() {
            Some(object) => Ok(Self {
                object,
                errors: Vec::new(),
            }),
            None => Err(Error::Validation(vec![FieldError::new(
                &[BODY],
                "Input should be a valid dictionary or object to extract fields from",
                "model_attributes_type",
            )])),
        }
    }

    /// Read a field that must be present and valid.
    ///
    /// Returns `None` if the field is missing or invalid, in which case the
    /// error has been recorded.
    pub fn required<T>(&mut self, field: &str, coerce: Coerce<T>) -> Option<T> {
        match self.object.get(field) {
            Some(value) => self.coerce(field, value, coerce),
            None => {
                self.errors.push(FieldError::missing(BODY, field));
                None
            }
        }
    }

    /// Read a field that may be missing, in which case `default` is used.
    ///
    /// A JSON `null` is treated as a present value and handed to `coerce`.
    pub fn with_default<T>(&mut self, field: &str, default: T, coerce: Coerce<T>) -> Option<T> {
        match self.object.get(field) {
            Some(value) => self.coerce(field, value, coerce),
            None => Some(default),
        }
    }

    /// Read a field that may be missing or `null`.
    ///
    /// The outer `Option` is `None` only when the field was present but invalid.
    pub fn nullable<T>(&mut self, field: &str, coerce: Coerce<T>) -> Option<Option<T>> {
        match self.object.get(field) {
            None | Some(Value::Null) => Some(None),
            Some(value) => self.coerce(field, value, coerce).map(Some),
        }
    }

    /// Finish reading fields.
    ///
    /// # Errors
    /// Returns [Error::Validation] with every recorded failure, if any.
    pub fn finish(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }

    fn coerce<T>(&mut self, field: &str, value: &Value, coerce: Coerce<T>) -> Option<T> {
        match coerce(value) {
            Ok(coerced) => Some(coerced),
            Err(invalid) => {
                self.errors
                    .push(FieldError::from_invalid(BODY, field, invalid));
                None
            }
        }
    }
}

/// Coerce a number, or a string containing a number, into a finite `f64`.
pub fn coerce_float(value: &Value) -> Result<f64, Invalid> {
    let number = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or(Invalid::new("Input should be a valid number", "float_type"))?,
        Value::String(text) => text.trim().parse::<f64>().map_err(|_| {
            Invalid::new(
                "Input should be a valid number, unable to parse string as a number",
                "float_parsing",
            )
        })?,
        _ => return Err(Invalid::new("Input should be a valid number", "float_type")),
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(Invalid::new("Input should be a finite number", "finite_number"))
    }
}

/// Coerce a boolean, `0`/`1`, or a common boolean word into a `bool`.
pub fn coerce_bool(value: &Value) -> Result<bool, Invalid> {
    const INVALID: Invalid = Invalid::new("Input should be a valid boolean", "bool_type");

    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(INVALID),
        },
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
            _ => Err(Invalid::new(
                "Input should be a valid boolean, unable to interpret input",
                "bool_parsing",
            )),
        },
        _ => Err(INVALID),
    }
}

/// Coerce a string, or a number rendered as a string, into a `String`.
pub fn coerce_string(value: &Value) -> Result<String, Invalid> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(Invalid::new("Input should be a valid string", "string_type")),
    }
}

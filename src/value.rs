use std::{error, fmt};

/// Type tag handed to a [`ValueConverter`] for each raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    String,
    Bool,
    Integer,
    Float,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ElementType::String => write!(f, "string"),
            ElementType::Bool => write!(f, "bool"),
            ElementType::Integer => write!(f, "integer"),
            ElementType::Float => write!(f, "float"),
        }
    }
}

/// A converted argument value.
///
/// `Map` preserves arrival order; duplicate keys overwrite in place when the
/// dictionary argument allows them.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Switch(bool),
    Plain(String),
    Int(i64),
    Float(f64),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(*self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Switch(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Plain(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(n) => Some(n),
            Value::Int(n) => Some(n as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match *self {
            Value::List(ref vs) => Some(vs),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match *self {
            Value::Map(ref kvs) => Some(kvs),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match *self {
            Value::Null => "null",
            Value::Switch(_) => "switch",
            Value::Plain(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Null => write!(f, ""),
            Value::Switch(b) => write!(f, "{b}"),
            Value::Plain(ref s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::List(ref vs) => {
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Value::Map(ref kvs) => {
                for (i, (k, v)) in kvs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                Ok(())
            }
        }
    }
}

/// Failure to convert a raw token into a typed [`Value`].
#[derive(Clone, Debug)]
pub struct ConversionError {
    raw: String,
    ty: ElementType,
}

impl ConversionError {
    pub fn new(raw: impl Into<String>, ty: ElementType) -> ConversionError {
        ConversionError {
            raw: raw.into(),
            ty,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn element_type(&self) -> ElementType {
        self.ty
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not convert '{}' to {}", self.raw, self.ty)
    }
}

impl error::Error for ConversionError {}

/// Converts one raw value (or sub-value of a multi-value/dictionary split)
/// into a typed [`Value`].
///
/// Invoked once per raw value. Implementations must be shareable across
/// concurrent `parse` calls.
pub trait ValueConverter: Send + Sync {
    fn convert(&self, raw: &str, ty: ElementType) -> Result<Value, ConversionError>;
}

/// The stock converter: `FromStr`-based conversion per element type.
///
/// An empty raw string converts to [`Value::Null`]; whether that is accepted
/// is decided by the argument's null policy, not here.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConverter;

impl ValueConverter for DefaultConverter {
    fn convert(&self, raw: &str, ty: ElementType) -> Result<Value, ConversionError> {
        if raw.is_empty() && ty != ElementType::String {
            return Ok(Value::Null);
        }
        match ty {
            ElementType::String => Ok(Value::Plain(raw.into())),
            ElementType::Bool => match raw {
                _ if raw.eq_ignore_ascii_case("true") => Ok(Value::Switch(true)),
                _ if raw.eq_ignore_ascii_case("false") => Ok(Value::Switch(false)),
                "1" => Ok(Value::Switch(true)),
                "0" => Ok(Value::Switch(false)),
                _ => Err(ConversionError::new(raw, ty)),
            },
            ElementType::Integer => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ConversionError::new(raw, ty)),
            ElementType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ConversionError::new(raw, ty)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_converter_scalars() {
        let c = DefaultConverter;
        assert_eq!(
            c.convert("8080", ElementType::Integer).unwrap(),
            Value::Int(8080)
        );
        assert_eq!(
            c.convert("-5", ElementType::Integer).unwrap(),
            Value::Int(-5)
        );
        assert_eq!(
            c.convert("2.5", ElementType::Float).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            c.convert("TRUE", ElementType::Bool).unwrap(),
            Value::Switch(true)
        );
        assert_eq!(
            c.convert("0", ElementType::Bool).unwrap(),
            Value::Switch(false)
        );
        assert_eq!(
            c.convert("x", ElementType::String).unwrap(),
            Value::Plain("x".into())
        );
    }

    #[test]
    fn default_converter_failures() {
        let c = DefaultConverter;
        assert!(c.convert("ten", ElementType::Integer).is_err());
        assert!(c.convert("yes", ElementType::Bool).is_err());
        assert!(c.convert("1.2.3", ElementType::Float).is_err());
    }

    #[test]
    fn empty_raw_is_null_for_non_strings() {
        let c = DefaultConverter;
        assert_eq!(c.convert("", ElementType::Integer).unwrap(), Value::Null);
        assert_eq!(
            c.convert("", ElementType::String).unwrap(),
            Value::Plain(String::new())
        );
    }
}

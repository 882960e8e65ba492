//! The stock instance factory: deserializes [`BoundArguments`] into any type
//! implementing serde's `Deserialize`. Struct fields look up arguments by
//! name (through aliases and the configured case folding), sequences come
//! from multi-value lists, maps from dictionary arguments. Missing switches
//! deserialize as `false`, missing options as `None`, missing lists as empty.

use std::fmt;

use serde::{
    de::{
        self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
    },
    forward_to_deserialize_any,
};

use crate::{matches::BoundArguments, value::Value};

/// Instance construction failure.
#[derive(Clone, Debug)]
pub struct DeError(String);

impl fmt::Display for DeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DeError {}

impl de::Error for DeError {
    fn custom<T: fmt::Display>(msg: T) -> DeError {
        DeError(msg.to_string())
    }
}

pub(crate) fn from_matches<T: DeserializeOwned>(matches: &BoundArguments) -> Result<T, DeError> {
    T::deserialize(MatchesDeserializer { matches })
}

struct MatchesDeserializer<'de> {
    matches: &'de BoundArguments,
}

impl<'de> de::Deserializer<'de> for MatchesDeserializer<'de> {
    type Error = DeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        let entries: Vec<(&'de str, &'de Value)> = self.matches.iter().collect();
        visitor.visit_map(Entries {
            entries,
            next_value: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        visitor.visit_map(Fields {
            matches: self.matches,
            fields: fields.iter(),
            pending: None,
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct enum identifier ignored_any
    }
}

// Struct access: every declared field is visited; absent arguments go
// through `Missing`, which knows how to produce empty containers.
struct Fields<'de> {
    matches: &'de BoundArguments,
    fields: std::slice::Iter<'static, &'static str>,
    pending: Option<&'static str>,
}

impl<'de> MapAccess<'de> for Fields<'de> {
    type Error = DeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, DeError>
    where
        K: DeserializeSeed<'de>,
    {
        match self.fields.next() {
            None => Ok(None),
            Some(&field) => {
                self.pending = Some(field);
                seed.deserialize(field.into_deserializer()).map(Some)
            }
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, DeError>
    where
        V: DeserializeSeed<'de>,
    {
        let field = self.pending.take().unwrap_or("");
        match self.matches.find(field) {
            Some(value) => seed.deserialize(ValueDeserializer { value }),
            None => seed.deserialize(Missing { field }),
        }
    }
}

struct Entries<'de> {
    entries: Vec<(&'de str, &'de Value)>,
    next_value: Option<&'de Value>,
}

impl<'de> MapAccess<'de> for Entries<'de> {
    type Error = DeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, DeError>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.pop() {
            None => Ok(None),
            Some((name, value)) => {
                self.next_value = Some(value);
                seed.deserialize(name.into_deserializer()).map(Some)
            }
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, DeError>
    where
        V: DeserializeSeed<'de>,
    {
        match self.next_value.take() {
            Some(value) => seed.deserialize(ValueDeserializer { value }),
            None => Err(de::Error::custom("value requested before key")),
        }
    }
}

static EMPTY_LIST: &[Value] = &[];
static EMPTY_PAIRS: &[(Value, Value)] = &[];

struct Missing {
    field: &'static str,
}

impl<'de> de::Deserializer<'de> for Missing {
    type Error = DeError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, DeError> {
        Err(de::Error::custom(format!(
            "no value bound for argument '{}'",
            self.field
        )))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_none()
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_bool(false)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_unit()
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_seq(Elements {
            iter: EMPTY_LIST.iter(),
        })
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        visitor.visit_map(Pairs {
            iter: EMPTY_PAIRS.iter(),
            next_value: None,
        })
    }

    forward_to_deserialize_any! {
        i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string bytes
        byte_buf unit_struct newtype_struct tuple tuple_struct struct enum
        identifier ignored_any
    }
}

struct ValueDeserializer<'de> {
    value: &'de Value,
}

impl<'de> ValueDeserializer<'de> {
    fn mismatch(&self, expected: &str) -> DeError {
        de::Error::custom(format!(
            "expected {expected}, found {} value",
            self.value.type_name()
        ))
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = DeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Null => visitor.visit_unit(),
            Value::Switch(b) => visitor.visit_bool(b),
            Value::Plain(ref s) => visitor.visit_borrowed_str(s),
            Value::Int(n) => visitor.visit_i64(n),
            Value::Float(n) => visitor.visit_f64(n),
            Value::List(_) => self.deserialize_seq(visitor),
            Value::Map(_) => self.deserialize_map(visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Switch(b) => visitor.visit_bool(b),
            _ => Err(self.mismatch("bool")),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Plain(ref s) => visitor.visit_borrowed_str(s),
            // Scalar arguments render losslessly as text.
            Value::Switch(_) | Value::Int(_) | Value::Float(_) => {
                visitor.visit_string(self.value.to_string())
            }
            _ => Err(self.mismatch("string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Plain(ref s) if s.chars().count() == 1 => {
                visitor.visit_char(s.chars().next().unwrap())
            }
            _ => Err(self.mismatch("char")),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::List(ref values) => visitor.visit_seq(Elements {
                iter: values.iter(),
            }),
            Value::Null => visitor.visit_seq(Elements {
                iter: EMPTY_LIST.iter(),
            }),
            // A single value reads as a one-element sequence.
            _ => visitor.visit_seq(Elements {
                iter: std::slice::from_ref(self.value).iter(),
            }),
        }
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Map(ref pairs) => visitor.visit_map(Pairs {
                iter: pairs.iter(),
                next_value: None,
            }),
            _ => Err(self.mismatch("map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Plain(ref s) => visitor.visit_enum(s.as_str().into_deserializer()),
            _ => Err(self.mismatch("enum variant name")),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match *self.value {
            Value::Null => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    forward_to_deserialize_any! {
        i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 bytes byte_buf
        unit_struct tuple tuple_struct identifier ignored_any
    }
}

struct Elements<'de> {
    iter: std::slice::Iter<'de, Value>,
}

impl<'de> SeqAccess<'de> for Elements<'de> {
    type Error = DeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, DeError>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            None => Ok(None),
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
        }
    }
}

struct Pairs<'de> {
    iter: std::slice::Iter<'de, (Value, Value)>,
    next_value: Option<&'de Value>,
}

impl<'de> MapAccess<'de> for Pairs<'de> {
    type Error = DeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, DeError>
    where
        K: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            None => Ok(None),
            Some((key, value)) => {
                self.next_value = Some(value);
                seed.deserialize(ValueDeserializer { value: key }).map(Some)
            }
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, DeError>
    where
        V: DeserializeSeed<'de>,
    {
        match self.next_value.take() {
            Some(value) => seed.deserialize(ValueDeserializer { value }),
            None => Err(de::Error::custom("value requested before key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;
    use crate::config::NameComparison;

    fn matches() -> BoundArguments {
        let mut m = BoundArguments::new(NameComparison::CaseInsensitive);
        m.insert("port", Value::Int(8080));
        m.insert("verbose", Value::Switch(true));
        m.insert("host", Value::Plain("example.com".into()));
        m.insert(
            "tags",
            Value::List(vec![Value::Plain("a".into()), Value::Plain("b".into())]),
        );
        m.insert(
            "env",
            Value::Map(vec![(
                Value::Plain("k1".into()),
                Value::Plain("v1".into()),
            )]),
        );
        m
    }

    #[test]
    fn struct_from_matches() {
        #[derive(Deserialize)]
        struct Options {
            port: u16,
            verbose: bool,
            host: Option<String>,
            tags: Vec<String>,
            env: HashMap<String, String>,
            // Never bound: exercises the missing-field defaults.
            quiet: bool,
            output: Option<String>,
            extra: Vec<String>,
        }
        let opts: Options = from_matches(&matches()).unwrap();
        assert_eq!(opts.port, 8080);
        assert!(opts.verbose);
        assert_eq!(opts.host.as_deref(), Some("example.com"));
        assert_eq!(opts.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(opts.env.get("k1").map(String::as_str), Some("v1"));
        assert!(!opts.quiet);
        assert!(opts.output.is_none());
        assert!(opts.extra.is_empty());
    }

    #[test]
    fn missing_scalar_is_an_error() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Options {
            count: i64,
        }
        let m = BoundArguments::new(NameComparison::CaseInsensitive);
        assert!(from_matches::<Options>(&m).is_err());
    }

    #[test]
    fn single_value_reads_as_one_element_sequence() {
        #[derive(Deserialize)]
        struct Options {
            tags: Vec<String>,
        }
        let mut m = BoundArguments::new(NameComparison::CaseInsensitive);
        m.insert("tags", Value::Plain("only".into()));
        let opts: Options = from_matches(&m).unwrap();
        assert_eq!(opts.tags, vec!["only".to_string()]);
    }

    #[test]
    fn unit_enum_variant_from_plain() {
        #[derive(Deserialize, Debug, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Mode {
            Fast,
            Slow,
        }
        #[derive(Deserialize)]
        struct Options {
            mode: Mode,
        }
        let mut m = BoundArguments::new(NameComparison::CaseInsensitive);
        m.insert("mode", Value::Plain("fast".into()));
        let opts: Options = from_matches(&m).unwrap();
        assert_eq!(opts.mode, Mode::Fast);
    }
}

use std::fmt;

use ahash::AHashMap;

use crate::{config::NameComparison, value::Value};

/// The values bound by one `parse` call, keyed by canonical argument name.
///
/// Every alias and short name registers as a synonym, so lookups accept any
/// name the argument is known by, folded under the configured comparison
/// rule.
#[derive(Clone)]
pub struct BoundArguments {
    vals: AHashMap<String, Value>,
    syns: AHashMap<String, String>,
    comparison: NameComparison,
}

impl BoundArguments {
    pub(crate) fn new(comparison: NameComparison) -> BoundArguments {
        BoundArguments {
            vals: AHashMap::new(),
            syns: AHashMap::new(),
            comparison,
        }
    }

    pub(crate) fn insert(&mut self, canonical: &str, value: Value) {
        self.syns
            .insert(self.comparison.fold(canonical).into_owned(), canonical.into());
        self.vals.insert(canonical.into(), value);
    }

    pub(crate) fn insert_synonym(&mut self, from: &str, canonical: &str) {
        debug_assert!(self.vals.contains_key(canonical));
        self.syns
            .insert(self.comparison.fold(from).into_owned(), canonical.into());
    }

    /// The canonical name behind any name the argument is known by.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.syns
            .get(self.comparison.fold(name).as_ref())
            .map(String::as_str)
    }

    pub fn find(&self, name: &str) -> Option<&Value> {
        self.resolve(name).and_then(|canonical| self.vals.get(canonical))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Canonical names and values, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vals.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_switch(&self, name: &str) -> Option<bool> {
        self.find(name).and_then(Value::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.find(name).and_then(Value::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.find(name).and_then(Value::as_float)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.find(name).and_then(Value::as_list)
    }

    pub fn get_map(&self, name: &str) -> Option<&[(Value, Value)]> {
        self.find(name).and_then(Value::as_map)
    }
}

impl fmt::Debug for BoundArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<(&String, &Value)> = self.vals.iter().collect();
        sorted.sort_by_key(|&(k, _)| k);
        f.debug_map().entries(sorted).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_through_synonyms_and_folding() {
        let mut m = BoundArguments::new(NameComparison::CaseInsensitive);
        m.insert("Port", Value::Int(80));
        m.insert_synonym("p", "Port");
        assert_eq!(m.get_int("Port"), Some(80));
        assert_eq!(m.get_int("port"), Some(80));
        assert_eq!(m.get_int("P"), Some(80));
        assert_eq!(m.resolve("p"), Some("Port"));
        assert!(m.find("q").is_none());
    }

    #[test]
    fn case_sensitive_lookup() {
        let mut m = BoundArguments::new(NameComparison::CaseSensitive);
        m.insert("Port", Value::Int(80));
        assert_eq!(m.get_int("Port"), Some(80));
        assert_eq!(m.get_int("port"), None);
    }
}

use regex::Regex;

use crate::{descriptor::ArgumentDescriptor, matches::BoundArguments, value::Value};

/// Per-argument validation hooks.
///
/// A validator participates in a phase by overriding the matching method; the
/// defaults accept everything. Validators attached to a descriptor run in
/// attachment order within each phase.
pub trait ArgumentValidator: Send + Sync {
    fn before_conversion(&self, _arg: &ArgumentDescriptor, _raw: &str) -> Result<(), String> {
        Ok(())
    }

    fn after_conversion(&self, _arg: &ArgumentDescriptor, _value: &Value) -> Result<(), String> {
        Ok(())
    }

    fn after_parsing(&self, _arg: &ArgumentDescriptor, _value: &Value) -> Result<(), String> {
        Ok(())
    }
}

/// Whole-schema validation, run after every per-argument `AfterParsing`
/// validator. Sees all bound values at once for cross-argument rules.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, matches: &BoundArguments) -> Result<(), String>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&BoundArguments) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, matches: &BoundArguments) -> Result<(), String> {
        self(matches)
    }
}

/// Bounds a numeric value after conversion.
#[derive(Clone, Copy, Debug)]
pub struct ValidateRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl ValidateRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> ValidateRange {
        ValidateRange { min, max }
    }

    pub fn at_least(min: f64) -> ValidateRange {
        ValidateRange::new(Some(min), None)
    }

    pub fn at_most(max: f64) -> ValidateRange {
        ValidateRange::new(None, Some(max))
    }
}

impl ArgumentValidator for ValidateRange {
    fn after_conversion(&self, _arg: &ArgumentDescriptor, value: &Value) -> Result<(), String> {
        let Some(n) = value.as_float() else {
            return Ok(());
        };
        if let Some(min) = self.min {
            if n < min {
                return Err(format!("value {n} is below the minimum of {min}"));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return Err(format!("value {n} is above the maximum of {max}"));
            }
        }
        Ok(())
    }
}

/// Matches the raw string against a regex before conversion.
#[derive(Clone, Debug)]
pub struct ValidatePattern {
    pattern: Regex,
}

impl ValidatePattern {
    /// Panics if `pattern` is not a valid regex; patterns are schema-time
    /// constants.
    pub fn new(pattern: &str) -> ValidatePattern {
        ValidatePattern {
            pattern: Regex::new(pattern).unwrap(),
        }
    }
}

impl ArgumentValidator for ValidatePattern {
    fn before_conversion(&self, _arg: &ArgumentDescriptor, raw: &str) -> Result<(), String> {
        if self.pattern.is_match(raw) {
            Ok(())
        } else {
            Err(format!("value '{raw}' does not match '{}'", self.pattern))
        }
    }
}

/// Bounds the number of accumulated values of a multi-value argument after
/// parsing completes.
#[derive(Clone, Copy, Debug)]
pub struct ValidateCount {
    min: usize,
    max: Option<usize>,
}

impl ValidateCount {
    pub fn new(min: usize, max: Option<usize>) -> ValidateCount {
        ValidateCount { min, max }
    }
}

impl ArgumentValidator for ValidateCount {
    fn after_parsing(&self, _arg: &ArgumentDescriptor, value: &Value) -> Result<(), String> {
        let count = match *value {
            Value::List(ref vs) => vs.len(),
            Value::Map(ref kvs) => kvs.len(),
            _ => 1,
        };
        if count < self.min {
            return Err(format!(
                "expected at least {} values, got {count}",
                self.min
            ));
        }
        if let Some(max) = self.max {
            if count > max {
                return Err(format!("expected at most {max} values, got {count}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{descriptor::ArgumentDescriptor, value::ElementType};

    fn arg() -> ArgumentDescriptor {
        ArgumentDescriptor::builder("n", ElementType::Integer).build()
    }

    #[test]
    fn range_checks_numbers_only() {
        let v = ValidateRange::new(Some(1.0), Some(10.0));
        assert!(v.after_conversion(&arg(), &Value::Int(5)).is_ok());
        assert!(v.after_conversion(&arg(), &Value::Int(0)).is_err());
        assert!(v.after_conversion(&arg(), &Value::Float(10.5)).is_err());
        // Non-numeric values are out of scope for the range check.
        assert!(v
            .after_conversion(&arg(), &Value::Plain("zzz".into()))
            .is_ok());
    }

    #[test]
    fn pattern_checks_raw_text() {
        let v = ValidatePattern::new(r"^[a-z]+$");
        assert!(v.before_conversion(&arg(), "abc").is_ok());
        assert!(v.before_conversion(&arg(), "a1").is_err());
    }

    #[test]
    fn count_checks_list_length() {
        let v = ValidateCount::new(2, Some(3));
        let two = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let one = Value::List(vec![Value::Int(1)]);
        assert!(v.after_parsing(&arg(), &two).is_ok());
        assert!(v.after_parsing(&arg(), &one).is_err());
    }
}

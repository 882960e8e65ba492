use std::{fmt, sync::Arc};

use ahash::AHashMap;

use crate::{
    config::ParserConfiguration,
    error::{ErrorKind, ParseError},
    validate::{ArgumentValidator, SchemaValidator},
    value::{ElementType, Value},
};

/// Cancellation automatically triggered when an argument is supplied.
///
/// Ordered so that the effective cancellation of a bind is literally the
/// maximum of the descriptor's own mode and any hook override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum CancelMode {
    #[default]
    None,
    /// Stop the loop; the parse still reports success.
    Success,
    /// Stop the loop; the parse reports a canceled result.
    Abort,
}

/// How values accumulate into an argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgumentKind {
    /// Exactly one value; a second supply is a duplicate.
    Single,
    /// Values append in arrival order. An inline `separator`, if set, first
    /// splits one raw token into several sub-values. `allow_multi_token`
    /// permits whitespace-separated consumption of several following tokens
    /// when the argument is supplied by name.
    MultiValue {
        separator: Option<String>,
        allow_multi_token: bool,
    },
    /// Key/value pairs split at the first `key_value_separator` occurrence.
    Dictionary {
        key_value_separator: String,
        allow_duplicate_keys: bool,
        key_type: ElementType,
    },
    /// Like `Single`, but invokes the descriptor's callback after the value
    /// is bound; the callback can request cancellation.
    Callback,
}

impl ArgumentKind {
    pub(crate) fn is_container(&self) -> bool {
        matches!(
            *self,
            ArgumentKind::MultiValue { .. } | ArgumentKind::Dictionary { .. }
        )
    }
}

pub(crate) type ArgumentCallback = Arc<dyn Fn(&Value) -> CancelMode + Send + Sync>;

/// One argument's schema entry. Immutable after construction; build with
/// [`ArgumentDescriptor::builder`].
#[derive(Clone)]
pub struct ArgumentDescriptor {
    name: String,
    short_name: Option<char>,
    aliases: Vec<String>,
    short_aliases: Vec<char>,
    position: Option<usize>,
    kind: ArgumentKind,
    element_type: ElementType,
    required: bool,
    allows_null: bool,
    default_value: Option<Value>,
    cancel_mode: CancelMode,
    pub(crate) validators: Vec<Arc<dyn ArgumentValidator>>,
    pub(crate) callback: Option<ArgumentCallback>,
}

impl ArgumentDescriptor {
    pub fn builder(name: impl Into<String>, element_type: ElementType) -> ArgumentBuilder {
        ArgumentBuilder {
            descriptor: ArgumentDescriptor {
                name: name.into(),
                short_name: None,
                aliases: vec![],
                short_aliases: vec![],
                position: None,
                kind: ArgumentKind::Single,
                element_type,
                required: false,
                allows_null: false,
                default_value: None,
                cancel_mode: CancelMode::None,
                validators: vec![],
                callback: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> Option<char> {
        self.short_name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn short_aliases(&self) -> &[char] {
        &self.short_aliases
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn kind(&self) -> &ArgumentKind {
        &self.kind
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn allows_null(&self) -> bool {
        self.allows_null
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn cancel_mode(&self) -> CancelMode {
        self.cancel_mode
    }

    /// A switch needs no explicit value; supplying its name binds `true`.
    /// Derived: boolean element type and not positional.
    pub fn is_switch(&self) -> bool {
        self.element_type == ElementType::Bool && self.position.is_none()
    }
}

impl fmt::Debug for ArgumentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentDescriptor")
            .field("name", &self.name)
            .field("short_name", &self.short_name)
            .field("aliases", &self.aliases)
            .field("short_aliases", &self.short_aliases)
            .field("position", &self.position)
            .field("kind", &self.kind)
            .field("element_type", &self.element_type)
            .field("required", &self.required)
            .field("allows_null", &self.allows_null)
            .field("default_value", &self.default_value)
            .field("cancel_mode", &self.cancel_mode)
            .field("validators", &self.validators.len())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Fluent construction of an [`ArgumentDescriptor`].
pub struct ArgumentBuilder {
    descriptor: ArgumentDescriptor,
}

impl ArgumentBuilder {
    pub fn short_name(mut self, c: char) -> Self {
        self.descriptor.short_name = Some(c);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor.aliases.push(alias.into());
        self
    }

    pub fn short_alias(mut self, c: char) -> Self {
        self.descriptor.short_aliases.push(c);
        self
    }

    pub fn position(mut self, position: usize) -> Self {
        self.descriptor.position = Some(position);
        self
    }

    pub fn required(mut self) -> Self {
        self.descriptor.required = true;
        self
    }

    pub fn allows_null(mut self) -> Self {
        self.descriptor.allows_null = true;
        self
    }

    /// Applied after parsing when the argument received no value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.descriptor.default_value = Some(value);
        self
    }

    pub fn multi_value(mut self) -> Self {
        if !matches!(self.descriptor.kind, ArgumentKind::MultiValue { .. }) {
            self.descriptor.kind = ArgumentKind::MultiValue {
                separator: None,
                allow_multi_token: false,
            };
        }
        self
    }

    /// Inline separator that splits one raw token into several sub-values.
    pub fn multi_value_separator(mut self, sep: impl Into<String>) -> Self {
        let allow = match self.descriptor.kind {
            ArgumentKind::MultiValue {
                allow_multi_token, ..
            } => allow_multi_token,
            _ => false,
        };
        self.descriptor.kind = ArgumentKind::MultiValue {
            separator: Some(sep.into()),
            allow_multi_token: allow,
        };
        self
    }

    /// Lets a named multi-value argument keep consuming whitespace-separated
    /// tokens until one matches a prefix. Positional arguments absorb tokens
    /// regardless of this flag.
    pub fn allow_multi_token(mut self) -> Self {
        match self.descriptor.kind {
            ArgumentKind::MultiValue {
                ref mut allow_multi_token,
                ..
            } => *allow_multi_token = true,
            _ => {
                self.descriptor.kind = ArgumentKind::MultiValue {
                    separator: None,
                    allow_multi_token: true,
                }
            }
        }
        self
    }

    pub fn dictionary(mut self, key_type: ElementType) -> Self {
        self.descriptor.kind = ArgumentKind::Dictionary {
            key_value_separator: "=".into(),
            allow_duplicate_keys: false,
            key_type,
        };
        self
    }

    pub fn key_value_separator(mut self, sep: impl Into<String>) -> Self {
        if let ArgumentKind::Dictionary {
            ref mut key_value_separator,
            ..
        } = self.descriptor.kind
        {
            *key_value_separator = sep.into();
        }
        self
    }

    pub fn allow_duplicate_keys(mut self) -> Self {
        if let ArgumentKind::Dictionary {
            ref mut allow_duplicate_keys,
            ..
        } = self.descriptor.kind
        {
            *allow_duplicate_keys = true;
        }
        self
    }

    pub fn cancel_mode(mut self, mode: CancelMode) -> Self {
        self.descriptor.cancel_mode = mode;
        self
    }

    pub fn validator(mut self, validator: impl ArgumentValidator + 'static) -> Self {
        self.descriptor.validators.push(Arc::new(validator));
        self
    }

    /// Turns the argument into a callback argument: `f` runs after each
    /// successful bind and its result participates in cancellation.
    pub fn callback(
        mut self,
        f: impl Fn(&Value) -> CancelMode + Send + Sync + 'static,
    ) -> Self {
        self.descriptor.kind = ArgumentKind::Callback;
        self.descriptor.callback = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> ArgumentDescriptor {
        self.descriptor
    }
}

/// Yields the argument schema; invoked once at parser construction.
pub trait SchemaProvider {
    fn provide(self) -> Schema;
}

/// The explicit-construction schema: an ordered set of descriptors plus any
/// whole-schema validators.
#[derive(Default)]
pub struct Schema {
    pub(crate) arguments: Vec<ArgumentDescriptor>,
    pub(crate) validators: Vec<Box<dyn SchemaValidator>>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    pub fn argument(mut self, descriptor: ArgumentDescriptor) -> Schema {
        self.arguments.push(descriptor);
        self
    }

    pub fn validator(mut self, validator: impl SchemaValidator + 'static) -> Schema {
        self.validators.push(Box::new(validator));
        self
    }
}

impl SchemaProvider for Schema {
    fn provide(self) -> Schema {
        self
    }
}

/// The validated, immutable descriptor set plus its lookup indices.
///
/// Lookup keys are folded under the configured name comparison rule; the
/// `named` list keeps original display names in declaration order for the
/// automatic prefix-alias scan and for suggestions.
#[derive(Debug)]
pub struct DescriptorTable {
    arguments: Vec<ArgumentDescriptor>,
    by_name: AHashMap<String, usize>,
    by_short: AHashMap<char, usize>,
    positional: Vec<usize>,
    named: Vec<(String, usize)>,
}

impl DescriptorTable {
    pub(crate) fn new(
        arguments: Vec<ArgumentDescriptor>,
        config: &ParserConfiguration,
    ) -> Result<DescriptorTable, ParseError> {
        let schema_err =
            |msg: String| ParseError::new(ErrorKind::InvalidSchema).with_message(msg);
        let mut by_name = AHashMap::new();
        let mut by_short = AHashMap::new();
        let mut named = vec![];
        let mut positions: Vec<(usize, usize)> = vec![];

        for (idx, arg) in arguments.iter().enumerate() {
            if arg.name.is_empty() {
                return Err(schema_err("argument names must not be empty".into()));
            }
            for name in std::iter::once(&arg.name).chain(&arg.aliases) {
                if name.contains(config.name_value_separators.as_slice()) {
                    return Err(schema_err(format!(
                        "name '{name}' contains a name/value separator"
                    )));
                }
                let key = config.name_comparison.fold(name).into_owned();
                if by_name.insert(key, idx).is_some() {
                    return Err(schema_err(format!("duplicate argument name '{name}'")));
                }
                named.push((name.clone(), idx));
            }
            for &c in arg.short_name.iter().chain(&arg.short_aliases) {
                if config.name_value_separators.contains(&c) {
                    return Err(schema_err(format!(
                        "short name '{c}' is a name/value separator"
                    )));
                }
                let key = config.name_comparison.fold_char(c);
                if by_short.insert(key, idx).is_some() {
                    return Err(schema_err(format!("duplicate short argument name '{c}'")));
                }
            }
            if arg.kind == ArgumentKind::Callback && arg.callback.is_none() {
                return Err(schema_err(format!(
                    "callback argument '{}' has no callback",
                    arg.name
                )));
            }
            if let ArgumentKind::MultiValue {
                separator: Some(ref sep),
                ..
            } = arg.kind
            {
                if sep.is_empty() {
                    return Err(schema_err(format!(
                        "empty multi-value separator on '{}'",
                        arg.name
                    )));
                }
            }
            if let ArgumentKind::Dictionary {
                ref key_value_separator,
                ..
            } = arg.kind
            {
                if key_value_separator.is_empty() {
                    return Err(schema_err(format!(
                        "empty key/value separator on '{}'",
                        arg.name
                    )));
                }
            }
            if let Some(pos) = arg.position {
                positions.push((pos, idx));
            }
        }

        positions.sort_by_key(|&(pos, _)| pos);
        let mut seen_optional = false;
        for window in positions.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(schema_err(format!(
                    "arguments '{}' and '{}' share position {}",
                    arguments[window[0].1].name, arguments[window[1].1].name, window[0].0
                )));
            }
        }
        for (i, &(_, idx)) in positions.iter().enumerate() {
            let arg = &arguments[idx];
            if arg.required {
                if seen_optional {
                    return Err(schema_err(format!(
                        "required positional argument '{}' follows an optional one",
                        arg.name
                    )));
                }
            } else {
                seen_optional = true;
            }
            if arg.kind.is_container() && i + 1 != positions.len() {
                return Err(schema_err(format!(
                    "multi-value positional argument '{}' must come last",
                    arg.name
                )));
            }
        }

        Ok(DescriptorTable {
            arguments,
            by_name,
            by_short,
            positional: positions.into_iter().map(|(_, idx)| idx).collect(),
            named,
        })
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn get(&self, idx: usize) -> &ArgumentDescriptor {
        &self.arguments[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgumentDescriptor> {
        self.arguments.iter()
    }

    pub(crate) fn find_name(&self, folded: &str) -> Option<usize> {
        self.by_name.get(folded).copied()
    }

    pub(crate) fn find_short(&self, folded: char) -> Option<usize> {
        self.by_short.get(&folded).copied()
    }

    /// Descriptor indices of positional arguments, in position order.
    pub(crate) fn positional(&self) -> &[usize] {
        &self.positional
    }

    /// Every display name and alias, in declaration order.
    pub(crate) fn named(&self) -> &[(String, usize)] {
        &self.named
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(args: Vec<ArgumentDescriptor>) -> Result<DescriptorTable, ParseError> {
        DescriptorTable::new(args, &ParserConfiguration::default())
    }

    fn arg(name: &str) -> ArgumentBuilder {
        ArgumentDescriptor::builder(name, ElementType::String)
    }

    #[test]
    fn indexes_names_aliases_and_shorts() {
        let t = table(vec![
            arg("Port").short_name('p').alias("PortNumber").build(),
            arg("Verbose").short_name('v').build(),
        ])
        .unwrap();
        assert_eq!(t.find_name("port"), Some(0));
        assert_eq!(t.find_name("portnumber"), Some(0));
        assert_eq!(t.find_short('v'), Some(1));
        assert_eq!(t.find_name("missing"), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn rejects_duplicate_names_across_aliases() {
        let err = table(vec![
            arg("port").build(),
            arg("p2").alias("Port").build(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }

    #[test]
    fn rejects_separator_in_name() {
        let err = table(vec![arg("key=value").build()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }

    #[test]
    fn rejects_required_positional_after_optional() {
        let err = table(vec![
            arg("first").position(0).build(),
            arg("second").position(1).required().build(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }

    #[test]
    fn rejects_container_positional_before_last() {
        let err = table(vec![
            arg("files").position(0).multi_value().build(),
            arg("dest").position(1).build(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }

    #[test]
    fn positional_order_follows_position_not_declaration() {
        let t = table(vec![
            arg("second").position(5).build(),
            arg("first").position(2).required().build(),
        ])
        .unwrap();
        assert_eq!(t.positional(), &[1, 0]);
    }

    #[test]
    fn switch_is_bool_and_not_positional() {
        let switch = ArgumentDescriptor::builder("v", ElementType::Bool).build();
        let positional_bool = ArgumentDescriptor::builder("flag", ElementType::Bool)
            .position(0)
            .build();
        let string_arg = arg("s").build();
        assert!(switch.is_switch());
        assert!(!positional_bool.is_switch());
        assert!(!string_arg.is_switch());
    }
}

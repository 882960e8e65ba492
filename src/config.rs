use std::borrow::Cow;

use crate::error::{ErrorKind, ParseError};

/// How argument names are matched against tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParsingMode {
    /// One namespace of names; every configured prefix is equivalent.
    #[default]
    Default,
    /// POSIX-like: short prefixes carry single-character names (and combined
    /// switches), the long prefix carries long names.
    LongShort,
}

/// What happens when a single-value argument is supplied more than once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateArgumentPolicy {
    /// The second supply fails the parse.
    #[default]
    Error,
    /// The later value wins silently (the duplicate hook may keep the old).
    Allow,
    /// Like `Allow`, but a warning is logged.
    Warn,
}

/// Behavior when a token exactly equal to the long prefix is seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrefixTerminationMode {
    #[default]
    None,
    /// Every subsequent token is positional, regardless of prefix shape.
    PositionalOnly,
    /// Parsing ends immediately with a successful result; the remaining
    /// tokens are recorded unconsumed.
    CancelWithSuccess,
}

/// The comparison rule applied to argument names, aliases and automatic
/// prefix aliases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NameComparison {
    CaseSensitive,
    #[default]
    CaseInsensitive,
}

impl NameComparison {
    /// Folds a name into its lookup key.
    pub(crate) fn fold<'a>(&self, s: &'a str) -> Cow<'a, str> {
        match *self {
            NameComparison::CaseSensitive => Cow::Borrowed(s),
            NameComparison::CaseInsensitive => Cow::Owned(s.to_lowercase()),
        }
    }

    pub(crate) fn fold_char(&self, c: char) -> char {
        match *self {
            NameComparison::CaseSensitive => c,
            // A single folded char is enough for short-name lookup.
            NameComparison::CaseInsensitive => c.to_lowercase().next().unwrap_or(c),
        }
    }

    pub(crate) fn sort(&self, names: &mut [String]) {
        names.sort_by(|a, b| self.fold(a).cmp(&self.fold(b)));
    }
}

/// Immutable per-parser configuration.
///
/// Built with the fluent setters and validated once at parser construction;
/// afterwards it is shared read-only across any number of concurrent `parse`
/// calls.
#[derive(Clone, Debug)]
pub struct ParserConfiguration {
    pub(crate) mode: ParsingMode,
    pub(crate) short_prefixes: Vec<String>,
    pub(crate) long_prefix: Option<String>,
    pub(crate) name_value_separators: Vec<char>,
    pub(crate) allow_whitespace_separator: bool,
    pub(crate) duplicate_arguments: DuplicateArgumentPolicy,
    pub(crate) auto_prefix_aliases: bool,
    pub(crate) prefix_termination: PrefixTerminationMode,
    pub(crate) name_comparison: NameComparison,
}

impl Default for ParserConfiguration {
    fn default() -> ParserConfiguration {
        ParserConfiguration {
            mode: ParsingMode::Default,
            short_prefixes: vec!["-".into()],
            long_prefix: Some("--".into()),
            name_value_separators: vec![':', '='],
            allow_whitespace_separator: true,
            duplicate_arguments: DuplicateArgumentPolicy::default(),
            auto_prefix_aliases: true,
            prefix_termination: PrefixTerminationMode::None,
            name_comparison: NameComparison::default(),
        }
    }
}

impl ParserConfiguration {
    /// Long/short mode with the conventional `-`/`--` prefixes.
    pub fn long_short() -> ParserConfiguration {
        ParserConfiguration {
            mode: ParsingMode::LongShort,
            ..ParserConfiguration::default()
        }
    }

    pub fn mode(mut self, mode: ParsingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the short (in `Default` mode: the only) argument prefixes.
    /// Order matters only to break ties between equal-length prefixes.
    pub fn short_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.short_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn long_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.long_prefix = Some(prefix.into());
        self
    }

    pub fn name_value_separators<I: IntoIterator<Item = char>>(mut self, seps: I) -> Self {
        self.name_value_separators = seps.into_iter().collect();
        self
    }

    pub fn allow_whitespace_separator(mut self, allow: bool) -> Self {
        self.allow_whitespace_separator = allow;
        self
    }

    pub fn duplicate_arguments(mut self, policy: DuplicateArgumentPolicy) -> Self {
        self.duplicate_arguments = policy;
        self
    }

    pub fn auto_prefix_aliases(mut self, enabled: bool) -> Self {
        self.auto_prefix_aliases = enabled;
        self
    }

    pub fn prefix_termination(mut self, mode: PrefixTerminationMode) -> Self {
        self.prefix_termination = mode;
        self
    }

    pub fn name_comparison(mut self, comparison: NameComparison) -> Self {
        self.name_comparison = comparison;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ParseError> {
        let config_err =
            |msg: &str| ParseError::new(ErrorKind::InvalidConfiguration).with_message(msg);
        if self.short_prefixes.is_empty() && self.long_prefix.is_none() {
            return Err(config_err("no argument prefixes configured"));
        }
        if self
            .short_prefixes
            .iter()
            .any(|p| p.is_empty() || p.chars().any(char::is_whitespace))
        {
            return Err(config_err("argument prefixes must be non-empty and free of whitespace"));
        }
        if let Some(ref p) = self.long_prefix {
            if p.is_empty() || p.chars().any(char::is_whitespace) {
                return Err(config_err("the long prefix must be non-empty and free of whitespace"));
            }
        }
        if self.mode == ParsingMode::LongShort && self.long_prefix.is_none() {
            return Err(config_err("long/short mode requires a long prefix"));
        }
        if self.prefix_termination != PrefixTerminationMode::None && self.long_prefix.is_none() {
            return Err(config_err("prefix termination requires a long prefix"));
        }
        if self.name_value_separators.is_empty() {
            return Err(config_err("at least one name/value separator is required"));
        }
        if self.name_value_separators.iter().any(|c| c.is_whitespace()) {
            return Err(config_err("name/value separators must not be whitespace"));
        }
        Ok(())
    }

    /// Splits `text` at the first occurrence of any name/value separator.
    pub(crate) fn split_inline_value<'a>(&self, text: &'a str) -> (&'a str, Option<&'a str>) {
        match text.find(self.name_value_separators.as_slice()) {
            None => (text, None),
            Some(i) => {
                let sep_len = text[i..].chars().next().map_or(1, char::len_utf8);
                (&text[..i], Some(&text[i + sep_len..]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert!(ParserConfiguration::default().validate().is_ok());
        assert!(ParserConfiguration::long_short().validate().is_ok());
    }

    #[test]
    fn separators_must_not_be_whitespace() {
        let config = ParserConfiguration::default().name_value_separators([' ']);
        assert_eq!(
            config.validate().unwrap_err().kind(),
            ErrorKind::InvalidConfiguration
        );
    }

    #[test]
    fn separators_must_be_non_empty() {
        let config = ParserConfiguration::default().name_value_separators([]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn inline_split_uses_first_separator() {
        let config = ParserConfiguration::default();
        assert_eq!(config.split_inline_value("name"), ("name", None));
        assert_eq!(config.split_inline_value("name=a:b"), ("name", Some("a:b")));
        assert_eq!(config.split_inline_value("name:"), ("name", Some("")));
    }

    #[test]
    fn case_insensitive_fold() {
        let cmp = NameComparison::CaseInsensitive;
        assert_eq!(cmp.fold("Port"), "port");
        assert_eq!(cmp.fold_char('P'), 'p');
        let mut names = vec!["Protocol".to_string(), "Port".to_string()];
        cmp.sort(&mut names);
        assert_eq!(names, vec!["Port".to_string(), "Protocol".to_string()]);
    }
}

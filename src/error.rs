use std::{error, fmt};

/// The category of a parse failure.
///
/// Ambiguous prefix aliases and duplicate arguments are deliberately distinct
/// from `UnknownArgument` so callers can render different guidance (candidate
/// lists for ambiguity, a warning for tolerated duplicates).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A named token did not resolve to any argument.
    UnknownArgument,
    /// An unnamed token had no remaining positional slot.
    TooManyArguments,
    /// A required argument was never supplied.
    MissingRequiredArgument,
    /// An automatic prefix alias matched more than one argument.
    AmbiguousPrefixAlias,
    /// A single-value argument was supplied twice under the `Error` policy.
    DuplicateArgument,
    /// A combined short-switch token contained a non-switch argument.
    CombinedShortNameOnNonSwitch,
    /// A named argument required a value but none was available.
    MissingNamedArgumentValue,
    /// A dictionary value had no key/value separator.
    MissingKeyValuePairSeparator,
    /// A null key, or a null value where null is not allowed.
    NullArgumentValue,
    /// A duplicate dictionary key under the strict policy.
    InvalidDictionaryValue,
    /// The value converter rejected a raw value.
    ArgumentValueConversion,
    /// An argument or schema validator failed, in any phase.
    ValidationFailure,
    /// The instance factory failed to materialize the bound result.
    InstanceConstruction,
    /// The descriptor set violated a schema invariant at construction.
    InvalidSchema,
    /// The parser configuration was inconsistent at construction.
    InvalidConfiguration,
}

/// A structured parse failure.
///
/// Carries the offending argument name and token where known; the unconsumed
/// remainder of the token sequence lives on the `ParseResult`, not here.
#[derive(Debug)]
pub struct ParseError {
    kind: ErrorKind,
    argument: Option<String>,
    token: Option<String>,
    candidates: Vec<String>,
    suggestion: Option<String>,
    message: Option<String>,
    source: Option<Box<dyn error::Error + Send + Sync + 'static>>,
}

impl ParseError {
    pub fn new(kind: ErrorKind) -> ParseError {
        ParseError {
            kind,
            argument: None,
            token: None,
            candidates: vec![],
            suggestion: None,
            message: None,
            source: None,
        }
    }

    pub(crate) fn with_argument(mut self, name: impl Into<String>) -> ParseError {
        self.argument = Some(name.into());
        self
    }

    pub(crate) fn with_token(mut self, token: impl Into<String>) -> ParseError {
        self.token = Some(token.into());
        self
    }

    pub(crate) fn with_candidates(mut self, candidates: Vec<String>) -> ParseError {
        self.candidates = candidates;
        self
    }

    pub(crate) fn with_suggestion(mut self, suggestion: Option<String>) -> ParseError {
        self.suggestion = suggestion;
        self
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> ParseError {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn with_source(
        mut self,
        source: impl error::Error + Send + Sync + 'static,
    ) -> ParseError {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The offending argument's long name, if the failure is tied to one.
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// The raw token (or value substring) that triggered the failure.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// For `AmbiguousPrefixAlias`: every matching display name, sorted under
    /// the configured name comparison rule.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// For `UnknownArgument`: the closest declared name, if one is close.
    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject: &str = self
            .argument
            .as_deref()
            .or(self.token.as_deref())
            .unwrap_or("");
        match self.kind {
            ErrorKind::UnknownArgument => {
                write!(f, "unknown argument '{subject}'")?;
                if let Some(ref s) = self.suggestion {
                    write!(f, ", did you mean '{s}'?")?;
                }
                Ok(())
            }
            ErrorKind::TooManyArguments => {
                write!(f, "too many positional arguments at '{subject}'")
            }
            ErrorKind::MissingRequiredArgument => {
                write!(f, "missing required argument '{subject}'")
            }
            ErrorKind::AmbiguousPrefixAlias => {
                write!(
                    f,
                    "argument prefix '{subject}' is ambiguous, could be any of: {}",
                    self.candidates.join(", ")
                )
            }
            ErrorKind::DuplicateArgument => {
                write!(f, "argument '{subject}' was supplied more than once")
            }
            ErrorKind::CombinedShortNameOnNonSwitch => {
                write!(
                    f,
                    "combined short argument '{subject}' contains an argument that is not a switch"
                )
            }
            ErrorKind::MissingNamedArgumentValue => {
                write!(f, "no value given for argument '{subject}'")
            }
            ErrorKind::MissingKeyValuePairSeparator => {
                write!(
                    f,
                    "value for argument '{subject}' has no key/value separator"
                )
            }
            ErrorKind::NullArgumentValue => {
                write!(f, "null value supplied for argument '{subject}'")
            }
            ErrorKind::InvalidDictionaryValue => {
                write!(f, "invalid dictionary value for argument '{subject}'")?;
                if let Some(ref t) = self.token {
                    if self.argument.is_some() {
                        write!(f, ": duplicate key '{t}'")?;
                    }
                }
                Ok(())
            }
            ErrorKind::ArgumentValueConversion => {
                write!(f, "invalid value for argument '{subject}'")?;
                match (&self.argument, &self.token) {
                    (Some(_), Some(t)) => write!(f, ": '{t}'"),
                    _ => Ok(()),
                }
            }
            ErrorKind::ValidationFailure => {
                if subject.is_empty() {
                    write!(f, "validation failed")?;
                } else {
                    write!(f, "validation failed for argument '{subject}'")?;
                }
                if let Some(ref m) = self.message {
                    write!(f, ": {m}")?;
                }
                Ok(())
            }
            ErrorKind::InstanceConstruction => {
                write!(f, "could not construct result")?;
                if let Some(ref m) = self.message {
                    write!(f, ": {m}")?;
                }
                Ok(())
            }
            ErrorKind::InvalidSchema => {
                write!(f, "invalid argument schema")?;
                if let Some(ref m) = self.message {
                    write!(f, ": {m}")?;
                }
                Ok(())
            }
            ErrorKind::InvalidConfiguration => {
                write!(f, "invalid parser configuration")?;
                if let Some(ref m) = self.message {
                    write!(f, ": {m}")?;
                }
                Ok(())
            }
        }
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| &**s as &(dyn error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_candidates() {
        let err = ParseError::new(ErrorKind::AmbiguousPrefixAlias)
            .with_token("Pr")
            .with_candidates(vec!["Port".into(), "Protocol".into()]);
        let msg = err.to_string();
        assert!(msg.contains("Port, Protocol"), "{msg}");
        assert_eq!(err.kind(), ErrorKind::AmbiguousPrefixAlias);
    }

    #[test]
    fn display_carries_suggestion() {
        let err = ParseError::new(ErrorKind::UnknownArgument)
            .with_token("prot")
            .with_suggestion(Some("port".into()));
        assert!(err.to_string().contains("did you mean 'port'?"));
    }
}

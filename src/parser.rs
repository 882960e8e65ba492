// The token matching and binding loop. Everything transient lives in
// `ParseState`, created per `parse` call; the `Parser` itself is read-only
// after construction and safe to share across threads.

use std::cmp;

use ahash::AHashSet;
use log::{trace, warn};
use serde::de::DeserializeOwned;
use strsim::levenshtein;

use crate::{
    config::{DuplicateArgumentPolicy, ParserConfiguration, ParsingMode, PrefixTerminationMode},
    de,
    descriptor::{ArgumentDescriptor, ArgumentKind, CancelMode, DescriptorTable, SchemaProvider},
    error::{ErrorKind, ParseError},
    matches::BoundArguments,
    validate::SchemaValidator,
    value::{DefaultConverter, ElementType, Value, ValueConverter},
};

decl_regex! {
    // A dash immediately followed by a decimal digit is a negative number
    // literal, never a named argument.
    NEGATIVE_NUMBER: r"^-\d";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PrefixStyle {
    Short,
    Long,
}

#[derive(Clone, Debug)]
struct Prefix {
    text: String,
    style: PrefixStyle,
}

/// How one `parse` call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseStatus {
    Success,
    Error,
    Canceled,
}

/// The outcome of one `parse` call.
///
/// On `Error` the remaining tokens start at the failing token; on
/// cancellation they start after the triggering token. Failures raised after
/// the token loop (post-parse validation, instance construction) leave them
/// empty.
#[derive(Debug)]
pub struct ParseResult {
    status: ParseStatus,
    argument_name: Option<String>,
    remaining: Vec<String>,
    error: Option<ParseError>,
    matches: BoundArguments,
}

impl ParseResult {
    pub fn status(&self) -> ParseStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ParseStatus::Success
    }

    /// The argument that triggered cancellation or caused the error.
    pub fn argument_name(&self) -> Option<&str> {
        self.argument_name.as_deref()
    }

    /// The unconsumed tail of the token sequence.
    pub fn remaining_arguments(&self) -> &[String] {
        &self.remaining
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<ParseError> {
        self.error
    }

    pub fn matches(&self) -> &BoundArguments {
        &self.matches
    }

    pub fn into_matches(self) -> BoundArguments {
        self.matches
    }

    /// Materializes the bound values into `T` via serde, the stock instance
    /// factory.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        de::from_matches(&self.matches).map_err(|e| {
            ParseError::new(ErrorKind::InstanceConstruction).with_message(e.to_string())
        })
    }
}

/// Decision returned by the unknown-argument hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookDecision {
    /// Let the failure propagate and end the parse.
    Continue,
    /// Skip the offending token (or combined-switch character) and go on.
    Ignore,
    /// Stop parsing with the given cancellation.
    Cancel(CancelMode),
}

/// Decision returned by the duplicate-argument hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateDecision {
    /// The new value overwrites the old one.
    Continue,
    /// Keep the old value; the new one is discarded.
    KeepOld,
    /// Overwrite, then stop parsing with the given cancellation.
    Cancel(CancelMode),
}

/// An unresolvable token, about to fail the parse.
#[derive(Debug)]
pub struct UnknownArgumentEvent<'a> {
    /// The full raw token.
    pub token: &'a str,
    /// The unresolved name; for combined switches, the single character.
    pub name: &'a str,
    /// `UnknownArgument`, or `TooManyArguments` for positional overflow.
    pub kind: ErrorKind,
}

/// A value was just bound to an argument.
#[derive(Debug)]
pub struct ArgumentBoundEvent<'a> {
    pub name: &'a str,
    /// The name or alias token actually typed; the long name for positional
    /// binds.
    pub used_name: &'a str,
    pub value: &'a Value,
}

/// A single-value argument was supplied again under `Allow`/`Warn` policy.
#[derive(Debug)]
pub struct DuplicateArgumentEvent<'a> {
    pub name: &'a str,
    pub old_value: &'a Value,
    pub new_value: &'a Value,
}

/// Optional per-call observers. Every method has a no-op default, so hooks
/// implement only what they care about.
pub trait ParseHooks {
    fn unknown_argument(&mut self, _event: &UnknownArgumentEvent<'_>) -> HookDecision {
        HookDecision::Continue
    }

    /// May override the cancellation for this bind; the effective mode is the
    /// maximum of the descriptor's own and the returned one.
    fn argument_bound(&mut self, _event: &ArgumentBoundEvent<'_>) -> Option<CancelMode> {
        None
    }

    fn duplicate_argument(&mut self, _event: &DuplicateArgumentEvent<'_>) -> DuplicateDecision {
        DuplicateDecision::Continue
    }
}

struct NoHooks;

impl ParseHooks for NoHooks {}

// One per descriptor, reset at the start of each parse call.
struct Slot {
    value: Option<Value>,
    // True only when the value came from the token sequence, not a default.
    received: bool,
    bound_by_name: bool,
}

struct ParseState {
    tokens: Vec<String>,
    cur: usize,
    positional_cursor: usize,
    positional_only: bool,
    cancel: CancelMode,
    cancel_arg: Option<String>,
    slots: Vec<Slot>,
}

impl ParseState {
    fn new(tokens: Vec<String>, slots: usize) -> ParseState {
        ParseState {
            tokens,
            cur: 0,
            positional_cursor: 0,
            positional_only: false,
            cancel: CancelMode::None,
            cancel_arg: None,
            slots: (0..slots)
                .map(|_| Slot {
                    value: None,
                    received: false,
                    bound_by_name: false,
                })
                .collect(),
        }
    }

    fn request_cancel(&mut self, mode: CancelMode, argument: Option<String>) {
        if mode == CancelMode::None {
            return;
        }
        if self.cancel == CancelMode::None {
            self.cancel_arg = argument;
        }
        self.cancel = cmp::max(self.cancel, mode);
    }
}

enum PrefixAlias {
    None,
    One(usize),
    Many(Vec<String>),
}

/// The parsing engine: a validated descriptor table, a configuration and a
/// value converter. Construction is the only fallible step; `parse` never
/// panics on any input.
pub struct Parser {
    table: DescriptorTable,
    config: ParserConfiguration,
    converter: Box<dyn ValueConverter>,
    schema_validators: Vec<Box<dyn SchemaValidator>>,
    prefixes: Vec<Prefix>,
}

impl Parser {
    pub fn new(
        provider: impl SchemaProvider,
        config: ParserConfiguration,
    ) -> Result<Parser, ParseError> {
        config.validate()?;
        let schema = provider.provide();
        let table = DescriptorTable::new(schema.arguments, &config)?;

        let mut prefixes = vec![];
        if config.mode == ParsingMode::LongShort {
            if let Some(ref long) = config.long_prefix {
                prefixes.push(Prefix {
                    text: long.clone(),
                    style: PrefixStyle::Long,
                });
            }
        }
        let short_style = match config.mode {
            ParsingMode::LongShort => PrefixStyle::Short,
            // In default mode every prefix introduces a regular name.
            ParsingMode::Default => PrefixStyle::Long,
        };
        for p in &config.short_prefixes {
            prefixes.push(Prefix {
                text: p.clone(),
                style: short_style,
            });
        }
        // Longest first; the stable sort keeps declaration order on ties.
        prefixes.sort_by_key(|p| cmp::Reverse(p.text.len()));

        Ok(Parser {
            table,
            config,
            converter: Box::new(DefaultConverter),
            schema_validators: schema.validators,
            prefixes,
        })
    }

    /// Replaces the stock value converter.
    pub fn with_converter(mut self, converter: impl ValueConverter + 'static) -> Parser {
        self.converter = Box::new(converter);
        self
    }

    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    pub fn configuration(&self) -> &ParserConfiguration {
        &self.config
    }

    /// Parses one token sequence to completion. Tokens are plain argv
    /// strings; no shell re-splitting happens here.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> ParseResult {
        self.parse_with_hooks(tokens, &mut NoHooks)
    }

    /// Like [`Parser::parse`], with per-call hooks observing unknown
    /// arguments, binds and duplicates.
    pub fn parse_with_hooks<S: AsRef<str>>(
        &self,
        tokens: &[S],
        hooks: &mut dyn ParseHooks,
    ) -> ParseResult {
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        self.run(tokens, hooks)
    }

    /// Parse-and-build convenience: `Ok(None)` when parsing was canceled with
    /// an abort, `Err` on any parse or construction failure.
    pub fn parse_to<T, S>(&self, tokens: &[S]) -> Result<Option<T>, ParseError>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        let result = self.parse(tokens);
        match result.status() {
            ParseStatus::Error => Err(result
                .into_error()
                .unwrap_or_else(|| ParseError::new(ErrorKind::InstanceConstruction))),
            ParseStatus::Canceled => Ok(None),
            ParseStatus::Success => result.deserialize().map(Some),
        }
    }

    fn run(&self, tokens: Vec<String>, hooks: &mut dyn ParseHooks) -> ParseResult {
        let mut st = ParseState::new(tokens, self.table.len());
        while st.cur < st.tokens.len() {
            let token = st.tokens[st.cur].clone();
            trace!("token {}: '{token}'", st.cur);

            if !st.positional_only
                && self.config.prefix_termination != PrefixTerminationMode::None
                && Some(token.as_str()) == self.config.long_prefix.as_deref()
            {
                match self.config.prefix_termination {
                    PrefixTerminationMode::PositionalOnly => {
                        st.positional_only = true;
                        st.cur += 1;
                        continue;
                    }
                    PrefixTerminationMode::CancelWithSuccess => {
                        let remaining = st.tokens[st.cur + 1..].to_vec();
                        return ParseResult {
                            status: ParseStatus::Success,
                            argument_name: None,
                            remaining,
                            error: None,
                            matches: self.build_matches(&st),
                        };
                    }
                    PrefixTerminationMode::None => unreachable!(),
                }
            }

            let step = if st.positional_only {
                self.bind_positional(&mut st, hooks)
            } else {
                match self.match_prefix(&token) {
                    Some((style, rest)) => {
                        let rest = rest.to_string();
                        self.bind_named(&mut st, hooks, &token, style, &rest)
                    }
                    None => self.bind_positional(&mut st, hooks),
                }
            };

            if let Err(error) = step {
                let remaining = st.tokens[st.cur..].to_vec();
                return ParseResult {
                    status: ParseStatus::Error,
                    argument_name: error.argument().map(String::from),
                    remaining,
                    error: Some(error),
                    matches: self.build_matches(&st),
                };
            }

            // Cancellation takes effect here, never mid-bind.
            if st.cancel != CancelMode::None {
                let status = match st.cancel {
                    CancelMode::Success => ParseStatus::Success,
                    _ => ParseStatus::Canceled,
                };
                let remaining = st.tokens[st.cur + 1..].to_vec();
                return ParseResult {
                    status,
                    argument_name: st.cancel_arg.clone(),
                    remaining,
                    error: None,
                    matches: self.build_matches(&st),
                };
            }

            st.cur += 1;
        }
        self.finalize(st)
    }

    /// Classifies a raw token: `None` means positional value.
    fn match_prefix<'t>(&self, token: &'t str) -> Option<(PrefixStyle, &'t str)> {
        if NEGATIVE_NUMBER.is_match(token) {
            return None;
        }
        for prefix in &self.prefixes {
            if token.len() > prefix.text.len() && token.starts_with(&prefix.text) {
                return Some((prefix.style, &token[prefix.text.len()..]));
            }
        }
        None
    }

    // Whether a token would stop whitespace-separated value consumption.
    fn is_prefix_shaped(&self, token: &str) -> bool {
        if self.match_prefix(token).is_some() {
            return true;
        }
        self.config.prefix_termination != PrefixTerminationMode::None
            && Some(token) == self.config.long_prefix.as_deref()
    }

    fn bind_named(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
        token: &str,
        style: PrefixStyle,
        rest: &str,
    ) -> Result<(), ParseError> {
        let (name_text, inline) = self.config.split_inline_value(rest);
        if name_text.is_empty() {
            return self.unknown(st, hooks, token, rest, ErrorKind::UnknownArgument);
        }

        if style == PrefixStyle::Short && self.config.mode == ParsingMode::LongShort {
            let chars: Vec<char> = name_text.chars().collect();
            if chars.len() == 1 {
                let folded = self.config.name_comparison.fold_char(chars[0]);
                return match self.table.find_short(folded) {
                    Some(idx) => self.bind_named_argument(st, hooks, idx, token, inline),
                    None => self.unknown(st, hooks, token, name_text, ErrorKind::UnknownArgument),
                };
            }
            // Combined switches: every character stands on its own.
            for &c in &chars {
                let folded = self.config.name_comparison.fold_char(c);
                match self.table.find_short(folded) {
                    None => {
                        let name = c.to_string();
                        self.unknown(st, hooks, token, &name, ErrorKind::UnknownArgument)?;
                    }
                    Some(idx) => {
                        if !self.table.get(idx).is_switch() {
                            return Err(ParseError::new(ErrorKind::CombinedShortNameOnNonSwitch)
                                .with_argument(self.table.get(idx).name())
                                .with_token(token));
                        }
                        self.bind_named_argument(st, hooks, idx, token, inline)?;
                    }
                }
                if st.cancel != CancelMode::None {
                    return Ok(());
                }
            }
            return Ok(());
        }

        let folded = self.config.name_comparison.fold(name_text);
        if let Some(idx) = self.table.find_name(&folded) {
            return self.bind_named_argument(st, hooks, idx, token, inline);
        }
        if self.config.auto_prefix_aliases {
            match self.prefix_alias(&folded) {
                PrefixAlias::One(idx) => {
                    return self.bind_named_argument(st, hooks, idx, token, inline);
                }
                PrefixAlias::Many(candidates) => {
                    return Err(ParseError::new(ErrorKind::AmbiguousPrefixAlias)
                        .with_token(name_text)
                        .with_candidates(candidates));
                }
                PrefixAlias::None => {}
            }
        }
        self.unknown(st, hooks, token, name_text, ErrorKind::UnknownArgument)
    }

    /// The three-way automatic prefix alias outcome: one match binds, several
    /// are ambiguous (all matching display names, sorted), zero is unknown.
    fn prefix_alias(&self, folded: &str) -> PrefixAlias {
        let mut indices = AHashSet::new();
        let mut displays = vec![];
        for (display, idx) in self.table.named() {
            if self
                .config
                .name_comparison
                .fold(display)
                .starts_with(folded)
            {
                indices.insert(*idx);
                displays.push(display.clone());
            }
        }
        if indices.len() > 1 {
            self.config.name_comparison.sort(&mut displays);
            displays.dedup();
            return PrefixAlias::Many(displays);
        }
        match indices.into_iter().next() {
            Some(idx) => PrefixAlias::One(idx),
            None => PrefixAlias::None,
        }
    }

    fn unknown(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
        token: &str,
        name: &str,
        kind: ErrorKind,
    ) -> Result<(), ParseError> {
        let event = UnknownArgumentEvent { token, name, kind };
        match hooks.unknown_argument(&event) {
            HookDecision::Ignore => Ok(()),
            HookDecision::Cancel(mode) => {
                st.request_cancel(mode, None);
                Ok(())
            }
            HookDecision::Continue => {
                let mut error = ParseError::new(kind).with_token(token);
                if kind == ErrorKind::UnknownArgument {
                    error = error.with_suggestion(self.suggest(name));
                }
                Err(error)
            }
        }
    }

    /// The closest declared name, if any is close enough to suggest.
    fn suggest(&self, name: &str) -> Option<String> {
        let folded = self.config.name_comparison.fold(name);
        let mut best = None;
        let mut min = usize::MAX;
        for (display, _) in self.table.named() {
            let dist = levenshtein(&folded, &self.config.name_comparison.fold(display));
            if dist < 3 && dist < min {
                min = dist;
                best = Some(display.clone());
            }
        }
        best
    }

    fn bind_named_argument(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
        idx: usize,
        used_name: &str,
        inline: Option<&str>,
    ) -> Result<(), ParseError> {
        let arg = self.table.get(idx);
        st.slots[idx].bound_by_name = true;

        if let Some(value) = inline {
            let value = value.to_string();
            return self.accumulate(st, hooks, idx, used_name, &value, false);
        }
        if arg.is_switch() {
            return self.accumulate(st, hooks, idx, used_name, "true", true);
        }
        if !self.config.allow_whitespace_separator {
            return Err(
                ParseError::new(ErrorKind::MissingNamedArgumentValue).with_argument(arg.name())
            );
        }

        // Consume following tokens as the value. Multi-token consumption is a
        // single explicit rule: only containers that opt in (or are reached
        // positionally, which never goes through here) keep eating tokens.
        let consume_many = matches!(
            arg.kind(),
            ArgumentKind::MultiValue {
                allow_multi_token: true,
                ..
            }
        );
        let mut consumed_any = false;
        while st.cur + 1 < st.tokens.len() {
            let next = st.tokens[st.cur + 1].clone();
            if self.is_prefix_shaped(&next) {
                break;
            }
            st.cur += 1;
            consumed_any = true;
            self.accumulate(st, hooks, idx, used_name, &next, false)?;
            if !consume_many || st.cancel != CancelMode::None {
                break;
            }
        }
        if !consumed_any {
            return Err(
                ParseError::new(ErrorKind::MissingNamedArgumentValue).with_argument(arg.name())
            );
        }
        Ok(())
    }

    fn bind_positional(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
    ) -> Result<(), ParseError> {
        let token = st.tokens[st.cur].clone();
        loop {
            let positional = self.table.positional();
            if st.positional_cursor >= positional.len() {
                return self.unknown(st, hooks, &token, &token, ErrorKind::TooManyArguments);
            }
            let idx = positional[st.positional_cursor];
            let arg = self.table.get(idx);
            let is_last = st.positional_cursor + 1 == positional.len();
            let container = arg.kind().is_container();
            // A positional bound by explicit name is skipped, except the last
            // container, which keeps absorbing.
            if st.slots[idx].bound_by_name && !(is_last && container) {
                st.positional_cursor += 1;
                continue;
            }
            let name = arg.name().to_string();
            self.accumulate(st, hooks, idx, &name, &token, false)?;
            if !container {
                st.positional_cursor += 1;
            }
            return Ok(());
        }
    }

    /// Splits a raw value on the multi-value separator (if any) and binds
    /// each sub-value independently.
    fn accumulate(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
        idx: usize,
        used_name: &str,
        raw: &str,
        implicit: bool,
    ) -> Result<(), ParseError> {
        let arg = self.table.get(idx);
        let subvalues: Vec<String> = match arg.kind() {
            ArgumentKind::MultiValue {
                separator: Some(sep),
                ..
            } if !implicit => raw.split(sep.as_str()).map(String::from).collect(),
            _ => vec![raw.to_string()],
        };
        for sub in subvalues {
            self.bind_one(st, hooks, idx, used_name, &sub)?;
            if st.cancel != CancelMode::None {
                break;
            }
        }
        Ok(())
    }

    fn bind_one(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
        idx: usize,
        used_name: &str,
        raw: &str,
    ) -> Result<(), ParseError> {
        let arg = self.table.get(idx);
        for validator in &arg.validators {
            validator.before_conversion(arg, raw).map_err(|m| {
                ParseError::new(ErrorKind::ValidationFailure)
                    .with_argument(arg.name())
                    .with_token(raw)
                    .with_message(m)
            })?;
        }

        match *arg.kind() {
            ArgumentKind::Dictionary {
                ref key_value_separator,
                allow_duplicate_keys,
                key_type,
            } => {
                let Some((key_raw, value_raw)) = raw.split_once(key_value_separator.as_str())
                else {
                    return Err(ParseError::new(ErrorKind::MissingKeyValuePairSeparator)
                        .with_argument(arg.name())
                        .with_token(raw));
                };
                let key = self.convert(arg, key_type, key_raw)?;
                if key.is_null() {
                    return Err(ParseError::new(ErrorKind::NullArgumentValue)
                        .with_argument(arg.name())
                        .with_token(raw));
                }
                let value = self.convert(arg, arg.element_type(), value_raw)?;
                if value.is_null() && !arg.allows_null() {
                    return Err(ParseError::new(ErrorKind::NullArgumentValue)
                        .with_argument(arg.name())
                        .with_token(raw));
                }
                self.run_after_conversion(arg, &value)?;

                let slot = &mut st.slots[idx];
                if slot.value.is_none() {
                    slot.value = Some(Value::Map(vec![]));
                }
                let Some(Value::Map(ref mut pairs)) = slot.value else {
                    unreachable!("dictionary slot holds a map");
                };
                if let Some(pair) = pairs.iter_mut().find(|(k, _)| *k == key) {
                    if !allow_duplicate_keys {
                        return Err(ParseError::new(ErrorKind::InvalidDictionaryValue)
                            .with_argument(arg.name())
                            .with_token(key_raw));
                    }
                    pair.1 = value.clone();
                } else {
                    pairs.push((key, value.clone()));
                }
                slot.received = true;
                self.after_bind(st, hooks, idx, used_name, &value, CancelMode::None);
                Ok(())
            }
            ArgumentKind::MultiValue { .. } => {
                let value = self.convert(arg, arg.element_type(), raw)?;
                if value.is_null() && !arg.allows_null() {
                    return Err(ParseError::new(ErrorKind::NullArgumentValue)
                        .with_argument(arg.name())
                        .with_token(raw));
                }
                self.run_after_conversion(arg, &value)?;
                let slot = &mut st.slots[idx];
                if slot.value.is_none() {
                    slot.value = Some(Value::List(vec![]));
                }
                let Some(Value::List(ref mut values)) = slot.value else {
                    unreachable!("multi-value slot holds a list");
                };
                values.push(value.clone());
                slot.received = true;
                self.after_bind(st, hooks, idx, used_name, &value, CancelMode::None);
                Ok(())
            }
            ArgumentKind::Single | ArgumentKind::Callback => {
                let value = self.convert(arg, arg.element_type(), raw)?;
                if value.is_null() && !arg.allows_null() {
                    return Err(ParseError::new(ErrorKind::NullArgumentValue)
                        .with_argument(arg.name())
                        .with_token(raw));
                }
                self.run_after_conversion(arg, &value)?;

                let mut extra_cancel = CancelMode::None;
                if st.slots[idx].received {
                    match self.config.duplicate_arguments {
                        DuplicateArgumentPolicy::Error => {
                            return Err(ParseError::new(ErrorKind::DuplicateArgument)
                                .with_argument(arg.name())
                                .with_token(raw));
                        }
                        DuplicateArgumentPolicy::Warn => {
                            warn!("argument '{}' was supplied more than once", arg.name());
                        }
                        DuplicateArgumentPolicy::Allow => {}
                    }
                    let old = st.slots[idx]
                        .value
                        .clone()
                        .unwrap_or(Value::Null);
                    let event = DuplicateArgumentEvent {
                        name: arg.name(),
                        old_value: &old,
                        new_value: &value,
                    };
                    match hooks.duplicate_argument(&event) {
                        DuplicateDecision::KeepOld => return Ok(()),
                        DuplicateDecision::Cancel(mode) => extra_cancel = mode,
                        DuplicateDecision::Continue => {}
                    }
                }

                if arg.kind() == &ArgumentKind::Callback {
                    if let Some(ref callback) = arg.callback {
                        extra_cancel = cmp::max(extra_cancel, callback(&value));
                    }
                }

                let slot = &mut st.slots[idx];
                slot.value = Some(value.clone());
                slot.received = true;
                self.after_bind(st, hooks, idx, used_name, &value, extra_cancel);
                Ok(())
            }
        }
    }

    fn run_after_conversion(
        &self,
        arg: &ArgumentDescriptor,
        value: &Value,
    ) -> Result<(), ParseError> {
        for validator in &arg.validators {
            validator.after_conversion(arg, value).map_err(|m| {
                ParseError::new(ErrorKind::ValidationFailure)
                    .with_argument(arg.name())
                    .with_message(m)
            })?;
        }
        Ok(())
    }

    fn after_bind(
        &self,
        st: &mut ParseState,
        hooks: &mut dyn ParseHooks,
        idx: usize,
        used_name: &str,
        value: &Value,
        extra_cancel: CancelMode,
    ) {
        let arg = self.table.get(idx);
        let event = ArgumentBoundEvent {
            name: arg.name(),
            used_name,
            value,
        };
        let hook_mode = hooks.argument_bound(&event).unwrap_or(CancelMode::None);
        let effective = cmp::max(arg.cancel_mode(), cmp::max(hook_mode, extra_cancel));
        if effective != CancelMode::None {
            st.request_cancel(effective, Some(arg.name().to_string()));
        }
    }

    fn convert(
        &self,
        arg: &ArgumentDescriptor,
        ty: ElementType,
        raw: &str,
    ) -> Result<Value, ParseError> {
        self.converter.convert(raw, ty).map_err(|e| {
            ParseError::new(ErrorKind::ArgumentValueConversion)
                .with_argument(arg.name())
                .with_token(raw)
                .with_source(e)
        })
    }

    fn finalize(&self, mut st: ParseState) -> ParseResult {
        for (idx, arg) in self.table.iter().enumerate() {
            if st.slots[idx].value.is_none() {
                if let Some(default) = arg.default_value() {
                    st.slots[idx].value = Some(default.clone());
                }
            }
        }

        let post_error = |error: ParseError, matches: BoundArguments| ParseResult {
            status: ParseStatus::Error,
            argument_name: error.argument().map(String::from),
            // Parsing itself finished; nothing is left unconsumed.
            remaining: vec![],
            error: Some(error),
            matches,
        };

        for (idx, arg) in self.table.iter().enumerate() {
            if arg.is_required() && !st.slots[idx].received {
                let error = ParseError::new(ErrorKind::MissingRequiredArgument)
                    .with_argument(arg.name());
                return post_error(error, self.build_matches(&st));
            }
        }

        for (idx, arg) in self.table.iter().enumerate() {
            if !st.slots[idx].received {
                continue;
            }
            let Some(ref value) = st.slots[idx].value else {
                continue;
            };
            for validator in &arg.validators {
                if let Err(m) = validator.after_parsing(arg, value) {
                    let error = ParseError::new(ErrorKind::ValidationFailure)
                        .with_argument(arg.name())
                        .with_message(m);
                    return post_error(error, self.build_matches(&st));
                }
            }
        }

        let matches = self.build_matches(&st);
        for validator in &self.schema_validators {
            if let Err(m) = validator.validate(&matches) {
                let error = ParseError::new(ErrorKind::ValidationFailure).with_message(m);
                return post_error(error, matches);
            }
        }

        ParseResult {
            status: ParseStatus::Success,
            argument_name: None,
            remaining: vec![],
            error: None,
            matches,
        }
    }

    fn build_matches(&self, st: &ParseState) -> BoundArguments {
        let mut matches = BoundArguments::new(self.config.name_comparison);
        for (idx, arg) in self.table.iter().enumerate() {
            let Some(ref value) = st.slots[idx].value else {
                continue;
            };
            matches.insert(arg.name(), value.clone());
            for alias in arg.aliases() {
                matches.insert_synonym(alias, arg.name());
            }
            for c in arg.short_name().into_iter().chain(arg.short_aliases().iter().copied()) {
                matches.insert_synonym(&c.to_string(), arg.name());
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArgumentDescriptor, Schema};

    fn parser(schema: Schema, config: ParserConfiguration) -> Parser {
        Parser::new(schema, config).unwrap()
    }

    fn string_arg(name: &str) -> ArgumentDescriptor {
        ArgumentDescriptor::builder(name, ElementType::String).build()
    }

    #[test]
    fn longest_prefix_wins() {
        let p = parser(
            Schema::new().argument(string_arg("name")),
            ParserConfiguration::default().short_prefixes(["-", "--"]),
        );
        let (_, rest) = p.match_prefix("--name").unwrap();
        assert_eq!(rest, "name");
        let (_, rest) = p.match_prefix("-name").unwrap();
        assert_eq!(rest, "name");
    }

    #[test]
    fn dash_digit_is_positional() {
        let p = parser(
            Schema::new().argument(string_arg("name")),
            ParserConfiguration::default(),
        );
        assert!(p.match_prefix("-5").is_none());
        assert!(p.match_prefix("-5x").is_none());
        assert!(p.match_prefix("-x5").is_some());
    }

    #[test]
    fn bare_prefix_is_positional() {
        let p = parser(
            Schema::new().argument(string_arg("name")),
            ParserConfiguration::default(),
        );
        assert!(p.match_prefix("-").is_none());
    }

    #[test]
    fn suggestion_for_near_miss() {
        let p = parser(
            Schema::new().argument(string_arg("port")),
            ParserConfiguration::default(),
        );
        assert_eq!(p.suggest("prot").as_deref(), Some("port"));
        assert_eq!(p.suggest("completely-different"), None);
    }

    #[test]
    fn prefix_alias_counts_descriptors_not_names() {
        // Two aliases of one argument both matching a prefix is not
        // ambiguous.
        let p = parser(
            Schema::new().argument(
                ArgumentDescriptor::builder("value", ElementType::String)
                    .alias("val")
                    .build(),
            ),
            ParserConfiguration::default(),
        );
        match p.prefix_alias("va") {
            PrefixAlias::One(idx) => assert_eq!(idx, 0),
            _ => panic!("expected a unique match"),
        }
    }
}

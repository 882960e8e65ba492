//! Schema-driven command line argument parsing and binding.
//!
//! `argbind` takes a declared schema of named and positional arguments and a
//! sequence of raw argv tokens, binds tokens to typed values and reports
//! structured, recoverable errors. Unlike pattern-language parsers, the schema
//! is built explicitly (or by any [`SchemaProvider`]), so the full argument
//! grammar is available up front: long and short names, aliases, automatic
//! prefix aliases, inline and whitespace value separators, multi-value and
//! dictionary accumulation, duplicate policies and cancellation.
//!
//! # Example
//!
//! ```
//! use argbind::{
//!     ArgumentDescriptor, ElementType, Parser, ParserConfiguration, Schema,
//! };
//!
//! let schema = Schema::new()
//!     .argument(
//!         ArgumentDescriptor::builder("port", ElementType::Integer)
//!             .short_name('p')
//!             .required()
//!             .build(),
//!     )
//!     .argument(
//!         ArgumentDescriptor::builder("verbose", ElementType::Bool)
//!             .short_name('v')
//!             .build(),
//!     )
//!     .argument(
//!         ArgumentDescriptor::builder("host", ElementType::String)
//!             .position(0)
//!             .build(),
//!     );
//!
//! let parser = Parser::new(schema, ParserConfiguration::default()).unwrap();
//! let result = parser.parse(&["example.com", "-port", "8080", "-v"]);
//! assert!(result.is_success());
//! assert_eq!(result.matches().get_int("port"), Some(8080));
//! assert_eq!(result.matches().get_switch("verbose"), Some(true));
//! assert_eq!(result.matches().get_str("host"), Some("example.com"));
//! ```
//!
//! # Binding into a struct
//!
//! Bound values deserialize into any type implementing serde's `Deserialize`,
//! which serves as the default instance factory:
//!
//! ```
//! use argbind::{ArgumentDescriptor, ElementType, Parser, ParserConfiguration, Schema};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Options {
//!     port:    i64,
//!     verbose: bool,
//! }
//!
//! let schema = Schema::new()
//!     .argument(ArgumentDescriptor::builder("port", ElementType::Integer).build())
//!     .argument(ArgumentDescriptor::builder("verbose", ElementType::Bool).build());
//! let parser = Parser::new(schema, ParserConfiguration::default()).unwrap();
//! let opts: Options = parser
//!     .parse_to(&["-port", "8080"])
//!     .unwrap()
//!     .expect("parsing was not canceled");
//! assert_eq!(opts.port, 8080);
//! assert!(!opts.verbose);
//! ```
//!
//! The parser itself is immutable after construction and may be shared across
//! threads; every [`Parser::parse`] call owns its transient state.

// Declares lazily-compiled regexes. The `Regex` is built on first use and
// reused for the lifetime of the process.
macro_rules! decl_regex {
    ($($name:ident: $re:expr;)+) => {
        $(
            static $name: std::sync::LazyLock<regex::Regex> =
                std::sync::LazyLock::new(|| regex::Regex::new($re).unwrap());
        )+
    };
}

mod config;
mod de;
mod descriptor;
mod error;
mod matches;
mod parser;
mod validate;
mod value;

pub use crate::{
    config::{
        DuplicateArgumentPolicy, NameComparison, ParserConfiguration, ParsingMode,
        PrefixTerminationMode,
    },
    de::DeError,
    descriptor::{
        ArgumentBuilder, ArgumentDescriptor, ArgumentKind, CancelMode, DescriptorTable, Schema,
        SchemaProvider,
    },
    error::{ErrorKind, ParseError},
    matches::BoundArguments,
    parser::{
        ArgumentBoundEvent, DuplicateArgumentEvent, DuplicateDecision, HookDecision, ParseHooks,
        ParseResult, ParseStatus, Parser, UnknownArgumentEvent,
    },
    validate::{
        ArgumentValidator, SchemaValidator, ValidateCount, ValidatePattern, ValidateRange,
    },
    value::{ConversionError, DefaultConverter, ElementType, Value, ValueConverter},
};

//! Process-argument carrier for console routing.
//!
//! # Responsibilities
//! - Split argv into a target, named `key=value` pairs and positionals
//!
//! # Design Decisions
//! - The first positional token is the route target; everything after it
//!   is a parameter
//! - `key=value` tokens become named parameters (leading `--` stripped);
//!   remaining tokens stay positional, in order

use std::collections::BTreeMap;

/// Parsed process arguments, consumed by the console routing strategy.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    target: Option<String>,
    named: BTreeMap<String, String>,
    positional: Vec<String>,
}

impl CliArgs {
    /// Parse an argument vector. `argv[0]` (the program name) must already
    /// be stripped by the caller.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            let trimmed = arg.strip_prefix("--").unwrap_or(arg);
            if let Some((key, value)) = trimmed.split_once('=') {
                out.named.insert(key.to_string(), value.to_string());
            } else if out.target.is_none() {
                out.target = Some(arg.to_string());
            } else {
                out.positional.push(arg.to_string());
            }
        }
        out
    }

    /// The route target, if one was given.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn named(&self) -> &BTreeMap<String, String> {
        &self.named
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }
}

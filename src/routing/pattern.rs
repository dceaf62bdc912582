//! Route pattern compilation.
//!
//! # Responsibilities
//! - Parse path templates into ordered token lists at startup
//! - Validate placeholder syntax and capture types eagerly
//! - Match canonical path segments against compiled tokens
//!
//! # Design Decisions
//! - No regex: a pattern compiles to literal/capture tokens, matching is O(n)
//! - Malformed patterns fail at registration, never per-request
//! - Compilation is deterministic; the same pattern always yields the same
//!   token list
//! - Type set is closed at router construction (built-ins plus an explicit
//!   validator registry; no runtime reflection)

use std::collections::{BTreeMap, HashMap};

use crate::routing::{MethodFilter, RouteError};

/// Validator for a custom capture type: returns true if the segment is valid.
pub type TypeValidator = fn(&str) -> bool;

/// Registry of capture types beyond the built-ins.
///
/// Populated once at router construction; lookups after that are read-only.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    validators: HashMap<String, TypeValidator>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom capture type under `name`.
    pub fn register(&mut self, name: impl Into<String>, validator: TypeValidator) {
        self.validators.insert(name.into(), validator);
    }

    fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    fn validate(&self, name: &str, segment: &str) -> bool {
        self.validators.get(name).map(|v| v(segment)).unwrap_or(false)
    }
}

/// Type constraint attached to a capture segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Any non-empty, non-slash run (`string` / `any`).
    Any,
    /// Digits only.
    Int,
    /// Exactly four digits.
    Year,
    /// Custom type, validated through the [`TypeRegistry`].
    Custom(String),
}

impl ParamType {
    fn validate(&self, segment: &str, types: &TypeRegistry) -> bool {
        match self {
            ParamType::Any => !segment.is_empty(),
            ParamType::Int => {
                !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
            }
            ParamType::Year => {
                segment.len() == 4 && segment.bytes().all(|b| b.is_ascii_digit())
            }
            ParamType::Custom(name) => types.validate(name, segment),
        }
    }
}

/// One compiled pattern token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Capture { name: String, ty: ParamType },
}

/// A route compiled into matchable form, retained for the router's lifetime.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub pattern: String,
    pub target: String,
    pub methods: MethodFilter,
    pub defaults: BTreeMap<String, String>,
    tokens: Vec<Token>,
}

impl CompiledRoute {
    /// Compile `pattern` into tokens, validating against `types`.
    pub fn compile(
        pattern: &str,
        target: &str,
        methods: MethodFilter,
        defaults: BTreeMap<String, String>,
        types: &TypeRegistry,
    ) -> Result<Self, RouteError> {
        let mut tokens = Vec::new();
        let mut seen = Vec::new();

        for segment in split_segments(pattern) {
            let token = parse_segment(pattern, segment, types)?;
            if let Token::Capture { name, .. } = &token {
                if seen.contains(name) {
                    return Err(RouteError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: format!("duplicate capture name {name:?}"),
                    });
                }
                seen.push(name.clone());
            }
            tokens.push(token);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            target: target.to_string(),
            methods,
            defaults,
            tokens,
        })
    }

    /// Attempt a structural match against canonical path segments.
    ///
    /// Returns the captured parameters on success. Method constraints are
    /// the router's concern, not the matcher's.
    pub fn try_match(
        &self,
        segments: &[&str],
        types: &TypeRegistry,
    ) -> Option<BTreeMap<String, String>> {
        if segments.len() != self.tokens.len() {
            return None;
        }

        let mut captures = BTreeMap::new();
        for (token, segment) in self.tokens.iter().zip(segments) {
            match token {
                Token::Literal(lit) => {
                    if lit != segment {
                        return None;
                    }
                }
                Token::Capture { name, ty } => {
                    if !ty.validate(segment, types) {
                        return None;
                    }
                    captures.insert(name.clone(), (*segment).to_string());
                }
            }
        }
        Some(captures)
    }

    /// Names of all capture segments, in pattern order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Capture { name, .. } => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

/// Canonical form: split on `/`, dropping empty segments. `"/"` and `""`
/// both canonicalize to zero segments.
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_segment(
    pattern: &str,
    segment: &str,
    types: &TypeRegistry,
) -> Result<Token, RouteError> {
    let invalid = |reason: String| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if let Some(name) = segment.strip_prefix(':') {
        validate_name(name).map_err(invalid)?;
        return Ok(Token::Capture {
            name: name.to_string(),
            ty: ParamType::Any,
        });
    }

    if segment.starts_with('{') || segment.ends_with('}') {
        let inner = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| invalid(format!("unbalanced braces in segment {segment:?}")))?;

        let (name, ty) = match inner.split_once(':') {
            Some((name, ty_name)) => (name, resolve_type(ty_name, types).map_err(invalid)?),
            None => (inner, ParamType::Any),
        };
        validate_name(name).map_err(invalid)?;
        return Ok(Token::Capture {
            name: name.to_string(),
            ty,
        });
    }

    if segment.contains(['{', '}', ':']) {
        return Err(invalid(format!("stray placeholder syntax in segment {segment:?}")));
    }

    Ok(Token::Literal(segment.to_string()))
}

fn resolve_type(name: &str, types: &TypeRegistry) -> Result<ParamType, String> {
    match name {
        "int" => Ok(ParamType::Int),
        "string" | "any" => Ok(ParamType::Any),
        "year" => Ok(ParamType::Year),
        _ if types.contains(name) => Ok(ParamType::Custom(name.to_string())),
        _ => Err(format!("unknown capture type {name:?}")),
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty capture name".to_string());
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(format!("invalid capture name {name:?}"));
    }
    Ok(())
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every route pattern so bad tables fail at startup
//! - Check backend parameters are present for the selected backends
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Patterns are compiled against the built-in type set; custom capture
//!   types only exist for routers assembled programmatically

use std::collections::BTreeMap;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, CacheBackend, MutexBackend};
use crate::routing::{CompiledRoute, RouterStrategy, TypeRegistry};

/// One semantic problem found in a config.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid bind address {addr:?}")]
    BadBindAddress { addr: String },

    #[error("route {index}: {reason}")]
    BadRoute { index: usize, reason: String },

    #[error("routes {first} and {second} are ambiguous duplicates of {pattern:?}")]
    DuplicateRoute {
        first: usize,
        second: usize,
        pattern: String,
    },

    #[error("simple strategy requires a non-empty route_param")]
    EmptyRouteParam,

    #[error("{backend} backend requires {field}")]
    MissingBackendField {
        backend: &'static str,
        field: &'static str,
    },

    #[error("mutex.poll_interval_ms must be at least 1")]
    ZeroPollInterval,
}

/// Validate a parsed config, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress {
            addr: config.server.bind_address.clone(),
        });
    }

    validate_routes(config, &mut errors);

    if config.router.strategy == RouterStrategy::Simple && config.router.route_param.is_empty() {
        errors.push(ValidationError::EmptyRouteParam);
    }

    match config.cache.backend {
        CacheBackend::File if config.cache.file.dir.is_none() => {
            errors.push(ValidationError::MissingBackendField {
                backend: "file cache",
                field: "cache.file.dir",
            });
        }
        CacheBackend::Memcached if config.cache.memcached.addr.is_none() => {
            errors.push(ValidationError::MissingBackendField {
                backend: "memcached cache",
                field: "cache.memcached.addr",
            });
        }
        CacheBackend::Sharded if config.cache.sharded.nodes.is_empty() => {
            errors.push(ValidationError::MissingBackendField {
                backend: "sharded cache",
                field: "cache.sharded.nodes",
            });
        }
        _ => {}
    }

    if config.mutex.backend == MutexBackend::File && config.mutex.dir.is_none() {
        errors.push(ValidationError::MissingBackendField {
            backend: "file mutex",
            field: "mutex.dir",
        });
    }
    if config.mutex.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let types = TypeRegistry::new();

    // Flatten top-level routes and groups in registration order, the same
    // order the router factory uses.
    let flattened: Vec<(String, String, Vec<String>)> = config
        .router
        .routes
        .iter()
        .map(|r| (r.pattern.clone(), r.target.clone(), r.methods.clone()))
        .chain(config.router.groups.iter().flat_map(|g| {
            let prefix = g.prefix.trim_end_matches('/').to_string();
            g.routes.iter().map(move |r| {
                let tail = r.pattern.trim_start_matches('/');
                (format!("{prefix}/{tail}"), r.target.clone(), r.methods.clone())
            })
        }))
        .collect();

    let mut seen: Vec<(usize, &str, &Vec<String>)> = Vec::new();
    for (index, (pattern, target, methods)) in flattened.iter().enumerate() {
        if let Err(e) = CompiledRoute::compile(
            pattern,
            target,
            crate::routing::MethodFilter::Any,
            BTreeMap::new(),
            &types,
        ) {
            errors.push(ValidationError::BadRoute {
                index,
                reason: e.to_string(),
            });
            continue;
        }

        if let Some((first, _, _)) = seen
            .iter()
            .find(|(_, p, m)| *p == pattern.as_str() && *m == methods)
        {
            errors.push(ValidationError::DuplicateRoute {
                first: *first,
                second: index,
                pattern: pattern.clone(),
            });
        }
        seen.push((index, pattern, methods));
    }

    // Method names are checked through the same conversion the factory uses.
    for (index, entry) in config
        .router
        .routes
        .iter()
        .chain(config.router.groups.iter().flat_map(|g| g.routes.iter()))
        .enumerate()
    {
        if let Err(reason) = entry.to_def() {
            errors.push(ValidationError::BadRoute { index, reason });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteEntry;

    fn entry(pattern: &str, methods: &[&str]) -> RouteEntry {
        RouteEntry {
            pattern: pattern.into(),
            target: "t".into(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            defaults: BTreeMap::new(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_pattern_reported() {
        let mut config = AppConfig::default();
        config.router.routes.push(entry("/x/{id:nope}", &[]));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BadRoute { .. })));
    }

    #[test]
    fn test_duplicate_routes_reported() {
        let mut config = AppConfig::default();
        config.router.routes.push(entry("/same", &["get"]));
        config.router.routes.push(entry("/same", &["get"]));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateRoute { .. })));
    }

    #[test]
    fn test_same_pattern_different_methods_allowed() {
        let mut config = AppConfig::default();
        config.router.routes.push(entry("/same", &["get"]));
        config.router.routes.push(entry("/same", &["post"]));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_errors_collected() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.router.routes.push(entry("/x/{id:nope}", &[]));
        config.mutex.poll_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn test_file_backends_require_dirs() {
        let mut config = AppConfig::default();
        config.cache.backend = CacheBackend::File;
        config.mutex.backend = MutexBackend::File;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::MissingBackendField { .. }))
                .count(),
            2
        );
    }
}

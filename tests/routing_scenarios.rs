//! End-to-end routing: TOML config through the factory to resolution.

use std::collections::BTreeMap;

use axum::http::{Method, Uri};
use junction::config::AppConfig;
use junction::http::{CliArgs, Request};
use junction::routing::{ConsoleRouter, RouteError, RouteInput, FALLBACK_PATH_PARAM};

fn request(method: Method, uri: &str) -> Request {
    let uri: Uri = uri.parse().unwrap();
    Request::new(method, &uri)
}

fn config_from(toml_src: &str) -> AppConfig {
    let config: AppConfig = toml::from_str(toml_src).unwrap();
    junction::config::validate_config(&config).unwrap();
    config
}

#[test]
fn test_rewrite_config_end_to_end() {
    let config = config_from(
        r#"
        [router]
        strategy = "rewrite"
        default_route = "home/index"

        [[router.routes]]
        pattern = "/"
        target = "home/index"

        [[router.routes]]
        pattern = "/users"
        target = "user/list"
        methods = ["get"]

        [[router.routes]]
        pattern = "/user/:id"
        target = "user/info"
        methods = ["get"]

        [[router.routes]]
        pattern = "/register"
        target = "user/register"
        methods = ["post"]

        [[router.groups]]
        prefix = "/api"

        [[router.groups.routes]]
        pattern = "/archive/{y:year}"
        target = "api/archive"
        "#,
    );
    let router = config.router.build().unwrap();

    // /user/123 resolves with the id extracted.
    let resolved = router
        .resolve(&RouteInput::Http(&request(Method::GET, "/user/123")))
        .unwrap();
    assert_eq!(resolved.target, "user/info");
    assert_eq!(resolved.params.get("id").map(String::as_str), Some("123"));

    // Method constraints.
    let err = router
        .resolve(&RouteInput::Http(&request(Method::GET, "/register")))
        .unwrap_err();
    assert!(matches!(err, RouteError::MethodNotAllowed { .. }));
    assert!(router
        .resolve(&RouteInput::Http(&request(Method::POST, "/register")))
        .is_ok());

    // Group prefix + typed capture.
    let resolved = router
        .resolve(&RouteInput::Http(&request(Method::GET, "/api/archive/2023")))
        .unwrap();
    assert_eq!(resolved.target, "api/archive");

    // Unmatched path falls back to the default route with the path param.
    let resolved = router
        .resolve(&RouteInput::Http(&request(Method::GET, "/nothing/here")))
        .unwrap();
    assert_eq!(resolved.target, "home/index");
    assert_eq!(
        resolved.params.get(FALLBACK_PATH_PARAM).map(String::as_str),
        Some("/nothing/here")
    );
}

#[test]
fn test_reverse_generation_round_trip() {
    let config = config_from(
        r#"
        [[router.routes]]
        pattern = "/user/:id"
        target = "user/info"
        "#,
    );
    let router = config.router.build().unwrap();

    let mut params = BTreeMap::new();
    params.insert("id".to_string(), "123".to_string());
    params.insert("tab".to_string(), "posts".to_string());

    let url = router.make_url("user/info", &params).unwrap();
    assert_eq!(url, "/user/123?tab=posts");

    let resolved = router
        .resolve(&RouteInput::Http(&request(Method::GET, &url)))
        .unwrap();
    assert_eq!(resolved.target, "user/info");
    assert_eq!(resolved.params.get("id").map(String::as_str), Some("123"));
}

#[test]
fn test_simple_strategy_end_to_end() {
    let config = config_from(
        r#"
        [router]
        strategy = "simple"
        default_route = "home/index"
        route_param = "r"
        "#,
    );
    let router = config.router.build().unwrap();

    let resolved = router
        .resolve(&RouteInput::Http(&request(
            Method::GET,
            "/index.php?r=user%2Finfo&id=3",
        )))
        .unwrap();
    assert_eq!(resolved.target, "user/info");
    assert_eq!(resolved.params.get("id").map(String::as_str), Some("3"));

    let resolved = router
        .resolve(&RouteInput::Http(&request(Method::GET, "/index.php")))
        .unwrap();
    assert_eq!(resolved.target, "home/index");
}

#[test]
fn test_console_strategy() {
    let router = ConsoleRouter::new(Some("help/index".to_string()));

    let resolved = router
        .resolve(&CliArgs::parse(["cache/flush", "scope=all"]))
        .unwrap();
    assert_eq!(resolved.target, "cache/flush");
    assert_eq!(resolved.params.get("scope").map(String::as_str), Some("all"));

    let resolved = router.resolve(&CliArgs::parse(Vec::<String>::new())).unwrap();
    assert_eq!(resolved.target, "help/index");
}

#[test]
fn test_invalid_pattern_rejected_at_startup() {
    let config: AppConfig = toml::from_str(
        r#"
        [[router.routes]]
        pattern = "/x/{id:uuid}"
        target = "t"
        "#,
    )
    .unwrap();

    // Both validation and the factory refuse the table.
    assert!(junction::config::validate_config(&config).is_err());
    assert!(matches!(
        config.router.build(),
        Err(RouteError::InvalidPattern { .. })
    ));
}

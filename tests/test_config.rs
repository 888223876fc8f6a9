use std::collections::HashMap;

use sentinel::config::{CONFIG_ENV, Config, LISTEN_ENV};
use sentinel::http::request::RequestLimits;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_config_default_address() {
    let cfg = Config::load_with(lookup(&[])).unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_custom_address_from_env() {
    let cfg = Config::load_with(lookup(&[(LISTEN_ENV, "0.0.0.0:3000")])).unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::load_with(lookup(&[(LISTEN_ENV, "127.0.0.1:8000")])).unwrap();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.listen_addr, cfg2.server.listen_addr);
}

#[test]
fn test_config_default_limits() {
    let cfg = Config::default();

    assert_eq!(cfg.limits.request_limits(), RequestLimits::default());
    assert_eq!(cfg.limits.scratch_size, 16 * 1024);
    assert!(cfg.static_files.list_directories);
}

#[test]
fn test_config_from_yaml() {
    let cfg = Config::from_yaml(
        "server:\n  listen_addr: \"0.0.0.0:9000\"\nlimits:\n  max_headers: 8\nstatic_files:\n  root: /srv/www\n  list_directories: false\n",
    )
    .unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.limits.max_headers, 8);
    // unspecified fields keep their defaults
    assert_eq!(cfg.limits.header_arena_size, 8 * 1024);
    assert_eq!(cfg.static_files.root.to_str(), Some("/srv/www"));
    assert!(!cfg.static_files.list_directories);
}

#[test]
fn test_config_file_then_env_override() {
    let path = std::env::temp_dir().join(format!("sentinel-config-{}.yaml", std::process::id()));
    std::fs::write(&path, "server:\n  listen_addr: \"127.0.0.1:7000\"\nlimits:\n  scratch_size: 512\n").unwrap();
    let path_str = path.to_string_lossy().into_owned();

    let from_file = Config::load_with(lookup(&[(CONFIG_ENV, &path_str)])).unwrap();
    assert_eq!(from_file.server.listen_addr, "127.0.0.1:7000");
    assert_eq!(from_file.limits.scratch_size, 512);

    let overridden = Config::load_with(lookup(&[(CONFIG_ENV, &path_str), (LISTEN_ENV, "127.0.0.1:7001")])).unwrap();
    assert_eq!(overridden.server.listen_addr, "127.0.0.1:7001");
    assert_eq!(overridden.limits.scratch_size, 512);
}

#[test]
fn test_config_missing_file_is_an_error() {
    let err = Config::load_with(lookup(&[(CONFIG_ENV, "/definitely/not/here.yaml")])).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.yaml"));
}

#[test]
fn test_config_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml("limits: [1, 2").is_err());
    assert!(Config::from_yaml("limits:\n  max_headers: many\n").is_err());
}

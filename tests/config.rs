use std::io::Write;

use ratekeeper::config::RatekeeperConfig;
use ratekeeper::{Algorithm, RatekeeperError};

#[test]
fn test_load_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        r#"
limiter:
  algorithm: leaky-bucket
  window_size_ms: 60000
  max_requests: 30
  max_keys: 1024
logging:
  level: debug
  json: true
"#
    )
    .unwrap();

    let config = RatekeeperConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.limiter.algorithm, Algorithm::LeakyBucket);
    assert_eq!(config.limiter.window_size_ms, 60_000);
    assert_eq!(config.limiter.max_requests, 30);
    assert_eq!(config.limiter.max_keys, Some(1024));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);

    let from_file = RatekeeperConfig::from_file(file.path()).unwrap();
    assert_eq!(from_file.limiter.max_requests, 30);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");

    let err = RatekeeperConfig::load(Some(missing.as_path())).unwrap_err();
    assert!(matches!(err, RatekeeperError::Config(_)));

    let err = RatekeeperConfig::from_file(&missing).unwrap_err();
    assert!(matches!(err, RatekeeperError::Io(_)));
}

#[test]
fn test_zero_limit_is_rejected() {
    let config = RatekeeperConfig::from_yaml("limiter:\n  max_requests: 0\n").unwrap();
    let err = config.limiter.options().unwrap_err();
    assert!(matches!(err, RatekeeperError::InvalidLimit(_)));
}

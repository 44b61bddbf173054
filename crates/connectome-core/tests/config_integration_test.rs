use connectome_core::{ColoringOption, ConfigError, ConfigManager, ConnectomeConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_config_round_trips_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    ConfigManager::create_default_config(&config_path).unwrap();
    assert!(config_path.exists());

    let manager = ConfigManager::load_from(&config_path).unwrap();
    assert_eq!(manager.config_path(), Some(config_path.as_path()));
    assert_eq!(manager.config().ring, ConnectomeConfig::default().ring);
}

#[test]
fn test_partial_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[graph]
include_annotations = true
coloring = "neurotransmitter"

[ring]
capacity = 5
"#,
    )
    .unwrap();

    let manager = ConfigManager::load_from(&config_path).unwrap();
    let config = manager.config();
    assert!(config.graph.include_annotations);
    assert_eq!(config.graph.coloring, ColoringOption::Neurotransmitter);
    assert!(config.graph.include_post_embryonic);
    assert_eq!(config.ring.capacity, 5);
    assert_eq!(config.ring.max, 714);
    assert_eq!(config.logging.format, "pretty");
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[ring]\ncapacity = 1\n").unwrap();

    match ConfigManager::load_from(&config_path) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("capacity")),
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }

    fs::write(&config_path, "[ring\n").unwrap();
    assert!(matches!(
        ConfigManager::load_from(&config_path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");
    assert!(matches!(
        ConfigManager::load_from(&missing),
        Err(ConfigError::NotFound(_))
    ));
}

//! Configuration loading tests.
//!
//! Environment overrides touch process-wide state, so every test that sets
//! or reads `NETRM_*` variables runs serially.

use netrm::config::{Config, LogFormat, OutputFormat};
use netrm::resource::State;
use pretty_assertions::assert_eq;
use serial_test::serial;
use tempfile::tempdir;

const ENV_VARS: &[&str] = &[
    "NETRM_CONFIG",
    "NETRM_STATE",
    "NETRM_OUTPUT",
    "NETRM_LOG_LEVEL",
    "NETRM_LOG_FORMAT",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

// ============================================================================
// File formats
// ============================================================================

#[test]
#[serial]
fn test_load_toml_file() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("netrm.toml");
    std::fs::write(
        &config_path,
        "[defaults]\nstate = \"replaced\"\noutput = \"yaml\"\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
    )
    .unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.defaults.state, State::Replaced);
    assert_eq!(config.defaults.output, OutputFormat::Yaml);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn test_load_yaml_file() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("netrm.yml");
    std::fs::write(&config_path, "defaults:\n  state: overridden\n").unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.defaults.state, State::Overridden);
    assert_eq!(config.defaults.output, OutputFormat::Json);
    assert_eq!(config.logging.level, "warn");
}

#[test]
#[serial]
fn test_load_json_file() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("netrm.json");
    std::fs::write(&config_path, r#"{"logging": {"level": "netrm=trace"}}"#).unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.logging.level, "netrm=trace");
    assert_eq!(config.defaults.state, State::Merged);
}

#[test]
fn test_from_file_partial() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("partial.toml");
    std::fs::write(&config_path, "[logging]\nformat = \"json\"\n").unwrap();

    let config = Config::from_file(&config_path).unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.defaults, Config::default().defaults);
}

#[test]
fn test_invalid_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("broken.toml");
    std::fs::write(&config_path, "[defaults\nstate = ").unwrap();

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(format!("{:#}", err).contains("broken.toml"));
}

#[test]
fn test_unknown_state_in_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bad_state.toml");
    std::fs::write(&config_path, "[defaults]\nstate = \"sideways\"\n").unwrap();

    assert!(Config::from_file(&config_path).is_err());
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("absent.toml");
    assert!(Config::load(Some(&config_path)).is_err());
}

// ============================================================================
// Environment overrides
// ============================================================================

#[test]
#[serial]
fn test_env_config_path() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("from_env.toml");
    std::fs::write(&config_path, "[defaults]\nstate = \"deleted\"\n").unwrap();

    std::env::set_var("NETRM_CONFIG", &config_path);
    let config = Config::load(None).unwrap();
    assert_eq!(config.defaults.state, State::Deleted);
    std::env::remove_var("NETRM_CONFIG");
}

#[test]
#[serial]
fn test_explicit_path_beats_env_path() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let explicit = temp_dir.path().join("explicit.toml");
    let from_env = temp_dir.path().join("env.toml");
    std::fs::write(&explicit, "[defaults]\nstate = \"replaced\"\n").unwrap();
    std::fs::write(&from_env, "[defaults]\nstate = \"deleted\"\n").unwrap();

    std::env::set_var("NETRM_CONFIG", &from_env);
    let config = Config::load(Some(&explicit)).unwrap();
    assert_eq!(config.defaults.state, State::Replaced);
    std::env::remove_var("NETRM_CONFIG");
}

#[test]
#[serial]
fn test_env_override_state() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("test.toml");
    std::fs::write(&config_path, "[defaults]\nstate = \"replaced\"\n").unwrap();

    std::env::set_var("NETRM_STATE", "overridden");
    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.defaults.state, State::Overridden);
    std::env::remove_var("NETRM_STATE");
}

#[test]
#[serial]
fn test_env_override_invalid_state() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("test.toml");
    std::fs::write(&config_path, "").unwrap();

    std::env::set_var("NETRM_STATE", "sideways");
    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(err.to_string().contains("NETRM_STATE"));
    std::env::remove_var("NETRM_STATE");
}

#[test]
#[serial]
fn test_env_override_output_and_logging() {
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("test.toml");
    std::fs::write(&config_path, "[logging]\nlevel = \"error\"\n").unwrap();

    std::env::set_var("NETRM_OUTPUT", "yml");
    std::env::set_var("NETRM_LOG_LEVEL", "info");
    std::env::set_var("NETRM_LOG_FORMAT", "json");
    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.defaults.output, OutputFormat::Yaml);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Json);
    clear_env();
}

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use model_archivist::config::{unknown_keys, Config};
use model_archivist::naming::TagStyle;
use model_archivist::scanner::DigestAlgorithm;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.naming.tag_style, TagStyle::Brackets);
    assert_eq!(config.duplicates.marker, "_DUPE");
    assert_eq!(config.duplicates.digest, DigestAlgorithm::Sha256);
    assert!(config.rules_path.is_none());
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("ARCHIVIST_IO_THREADS", "16");
    // Use double underscore for nesting
    std::env::set_var("ARCHIVIST_NAMING__TAG_STYLE", "parentheses");
    std::env::set_var("ARCHIVIST_DUPLICATES__MARKER", "_COPY");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("ARCHIVIST_").split("__"));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.io_threads, 16);
    assert_eq!(config.naming.tag_style, TagStyle::Parentheses);
    assert_eq!(config.duplicates.marker, "_COPY");

    std::env::remove_var("ARCHIVIST_IO_THREADS");
    std::env::remove_var("ARCHIVIST_NAMING__TAG_STYLE");
    std::env::remove_var("ARCHIVIST_DUPLICATES__MARKER");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
io_threads = 8
follow_symlinks = true
skip_hidden = true
archive_extensions = ["zip", "stl"]

[naming]
add_category_prefix = false
tag_style = "none"
default_category = "UNSORTED"

[duplicates]
permanent_delete = true
digest = "blake3"
"#;
    fs::write(&config_path, toml_content).unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.io_threads, 8);
    assert!(config.follow_symlinks);
    assert!(config.walker_config().skip_hidden);
    assert_eq!(config.archive_extensions, vec!["zip", "stl"]);
    assert!(!config.naming.add_category_prefix);
    assert!(config.naming.preserve_version_numbers);
    assert_eq!(config.naming.tag_style, TagStyle::None);
    assert_eq!(config.naming.default_category, "UNSORTED");
    assert!(config.duplicates.permanent_delete);
    assert!(config.duplicates.verify_unchanged);
    assert_eq!(config.duplicates.digest, DigestAlgorithm::Blake3);
}

#[test]
fn test_config_save_round_trip() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("sub").join("config.toml");

    let mut config = Config::default();
    config.catalog_path = Some(temp_dir.path().join("catalog.db"));
    config.naming.tag_style = TagStyle::Parentheses;
    config.save(&config_path).unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let loaded: Config = figment.extract().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_wrong_type_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "io_threads = \"many\"\n").unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    assert!(figment.extract::<Config>().is_err());
}

#[test]
fn test_unknown_keys_get_suggestions() {
    let unknown = unknown_keys("io_thread = 2\n[naming]\ntag_styel = \"none\"\n");
    assert_eq!(unknown.len(), 2);
    assert_eq!(unknown[1].key, "naming.tag_styel");
    assert_eq!(unknown[0].suggestion.as_deref(), Some("io_threads"));
    assert_eq!(unknown[1].suggestion.as_deref(), Some("tag_style"));
}

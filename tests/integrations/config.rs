//! Loading `GlobalOptions` from TOML and the environment, and accumulating
//! them in a `ConfigStore`.

use fanlog::{ConfigStore, Destinations, GlobalOptions, TelegramOptions};
use serde_json::json;
use serial_test::serial;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

#[path = "../helpers/mod.rs"]
mod helpers;

const ENV_VARS: [&str; 5] = [
    "FANLOG_ENV",
    "FANLOG_DIRNAME",
    "FANLOG_EXIT_ON_ERROR",
    "FANLOG_TELEGRAM__TOKEN",
    "FANLOG_TELEGRAM__CHATS",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(&Path),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    test_fn(file.path());
}

#[test]
#[serial]
fn test_load_full_config_file() {
    clear_env();
    let toml_content = r#"
        dirname = "/var/log/billing"
        exit_on_error = false

        [telegram]
        token = "123456:ABC"
        chats = [-100123, "@ops"]
    "#;

    with_config_file(toml_content, |path| {
        let options = GlobalOptions::load(Some(path)).unwrap();

        assert_eq!(options.log_dir(), PathBuf::from("/var/log/billing"));
        assert!(!options.exit_on_error());
        assert_eq!(options.telegram_token(), Some("123456:ABC"));
        assert_eq!(
            options.telegram_chats(),
            Some(&Destinations::many(vec![json!(-100123), json!("@ops")]))
        );
    });
}

#[test]
#[serial]
fn test_single_chat_in_file() {
    clear_env();
    with_config_file("[telegram]\nchats = 42\n", |path| {
        let options = GlobalOptions::load(Some(path)).unwrap();

        assert_eq!(options.telegram_chats(), Some(&Destinations::one(42)));
        assert_eq!(options.telegram_token(), None);
        assert_eq!(options.telegram_chats().unwrap().to_vec(), vec![json!(42)]);
    });
}

#[test]
#[serial]
fn test_empty_sources_give_defaults() {
    clear_env();
    let options = GlobalOptions::load(None).unwrap();

    assert_eq!(options, GlobalOptions::default());
    assert_eq!(options.log_dir(), PathBuf::from("./logs"));
    assert!(options.exit_on_error());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    std::env::set_var("FANLOG_DIRNAME", "/tmp/from-env");
    std::env::set_var("FANLOG_TELEGRAM__TOKEN", "ENVTOKEN");
    // The deployment mode shares the prefix but is not a config key.
    std::env::set_var("FANLOG_ENV", "production");

    let toml_content = r#"
        dirname = "/var/log/billing"

        [telegram]
        token = "FILETOKEN"
        chats = [1, 2]
    "#;

    with_config_file(toml_content, |path| {
        let options = GlobalOptions::load(Some(path)).unwrap();

        assert_eq!(options.log_dir(), PathBuf::from("/tmp/from-env"));
        assert_eq!(options.telegram_token(), Some("ENVTOKEN"));
        assert_eq!(
            options.telegram_chats(),
            Some(&Destinations::many(vec![1, 2]))
        );
    });

    clear_env();
}

#[test]
#[serial]
fn test_invalid_type_is_rejected() {
    clear_env();
    with_config_file("exit_on_error = \"sometimes\"\n", |path| {
        assert!(GlobalOptions::load(Some(path)).is_err());
    });
}

#[test]
fn test_store_accumulates_across_merges() {
    let store = ConfigStore::new();

    store.merge(&GlobalOptions {
        telegram: Some(TelegramOptions {
            token: Some("T1".to_string()),
            chats: None,
        }),
        ..Default::default()
    });
    store.merge(&GlobalOptions {
        telegram: Some(TelegramOptions {
            token: None,
            chats: Some(Destinations::one(1)),
        }),
        dirname: Some(PathBuf::from("/srv/logs")),
        ..Default::default()
    });
    store.merge(&GlobalOptions::default());

    let snapshot = store.snapshot();
    assert_eq!(snapshot.telegram_token(), Some("T1"));
    assert_eq!(snapshot.telegram_chats(), Some(&Destinations::one(1)));
    assert_eq!(snapshot.log_dir(), PathBuf::from("/srv/logs"));
    assert!(snapshot.exit_on_error());
}

#[test]
fn test_concurrent_merges_keep_every_field() {
    let store = Arc::new(ConfigStore::new());

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let partial = match i {
                        0 => GlobalOptions {
                            dirname: Some(PathBuf::from("/srv/logs")),
                            ..Default::default()
                        },
                        1 => GlobalOptions {
                            exit_on_error: Some(false),
                            ..Default::default()
                        },
                        _ => GlobalOptions {
                            telegram: Some(TelegramOptions {
                                token: Some("T".to_string()),
                                chats: None,
                            }),
                            ..Default::default()
                        },
                    };
                    store.merge(&partial);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = store.snapshot();
    assert_eq!(snapshot.log_dir(), PathBuf::from("/srv/logs"));
    assert!(!snapshot.exit_on_error());
    assert_eq!(snapshot.telegram_token(), Some("T"));
}

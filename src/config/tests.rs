use super::settings::Settings;
use super::{SettingsError, load_config_from};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.mqtt.host, "localhost");
    assert_eq!(settings.mqtt.port, 1883);
    assert_eq!(settings.mqtt.topic_in, "iot/telemetry/+");
    assert_eq!(settings.mqtt.max_retries, 5);
    assert_eq!(settings.kafka.topic_out, "iot-telemetry-raw");
    assert_eq!(settings.kafka.max_queue_size, 10_000);
    assert_eq!(settings.health.port, 8080);
    assert_eq!(settings.health.stale_after_secs, 120);
    assert_eq!(settings.runtime.flush_timeout_secs, 10);
    assert!(settings.runtime.handle_signals);
    assert!(settings.validate().is_ok());
}

#[test]
fn warn_threshold_is_eighty_percent_of_max() {
    let mut settings = Settings::default();
    assert_eq!(settings.kafka.warn_threshold(), 8_000);
    settings.kafka.max_queue_size = 2;
    assert_eq!(settings.kafka.warn_threshold(), 1);
}

#[test]
fn effective_port_follows_tls_toggle() {
    let mut settings = Settings::default();
    assert_eq!(settings.mqtt.effective_port(), 1883);
    settings.mqtt.use_tls = true;
    assert_eq!(settings.mqtt.effective_port(), 8883);
}

#[test]
fn validate_rejects_unusable_settings() {
    let mut settings = Settings::default();
    settings.kafka.max_queue_size = 0;
    assert_eq!(settings.validate(), Err(SettingsError::ZeroQueueSize));

    let mut settings = Settings::default();
    settings.mqtt.qos = 3;
    assert_eq!(settings.validate(), Err(SettingsError::InvalidQos(3)));

    let mut settings = Settings::default();
    settings.ingress.namespace = "  ".to_string();
    assert_eq!(
        settings.validate(),
        Err(SettingsError::Empty("ingress.namespace"))
    );
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("bridge.toml");
    let toml = r#"
        [mqtt]
        host = "broker.internal"
        use_tls = true
        max_retries = 2

        [kafka]
        max_queue_size = 50
        sasl_password = "secret"

        [health]
        port = 9100
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.mqtt.host, "broker.internal");
    assert!(cfg.mqtt.use_tls);
    assert_eq!(cfg.mqtt.max_retries, 2);
    assert_eq!(cfg.kafka.max_queue_size, 50);
    assert_eq!(cfg.kafka.sasl_password.as_deref(), Some("secret"));
    assert_eq!(cfg.health.port, 9100);
    // untouched values keep their defaults
    assert_eq!(cfg.mqtt.port, 1883);
    assert_eq!(cfg.kafka.topic_out, "iot-telemetry-raw");
    assert_eq!(cfg.ingress.category, "telemetry");
}

#[test]
#[serial]
fn missing_config_file_falls_back_to_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("does-not-exist");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.mqtt.host, "localhost");
    assert_eq!(cfg.kafka.brokers, "localhost:9092");
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("bridge.toml");
    fs::write(&path, "[mqtt]\nhost = \"from-file\"\n").expect("write config file");

    temp_env::with_vars(
        [
            ("BRIDGE__MQTT__HOST", Some("from-env")),
            ("BRIDGE__KAFKA__MAX_QUEUE_SIZE", Some("77")),
        ],
        || {
            let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
            assert_eq!(cfg.mqtt.host, "from-env");
            assert_eq!(cfg.kafka.max_queue_size, 77);
        },
    );
}

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Top-level configuration settings for the bridge.
///
/// One section per collaborator: the inbound MQTT broker, the outbound Kafka
/// cluster, topic validation, the health surface and the process runtime.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub mqtt: MqttSettings,
    pub kafka: KafkaSettings,
    pub ingress: IngressSettings,
    pub health: HealthSettings,
    pub runtime: RuntimeSettings,
}

/// Connection and retry settings for the inbound MQTT broker.
#[derive(Debug, Deserialize, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub tls_port: u16,
    pub use_tls: bool,
    pub ca_cert: String,
    pub topic_in: String,
    pub qos: u8,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id_prefix: String,
    pub keep_alive_secs: u64,
    /// Retries allowed after the first failed connect, before the bridge has
    /// ever been connected.
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
}

/// Producer settings for the outbound Kafka cluster.
#[derive(Debug, Deserialize, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic_out: String,
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub sasl_username: String,
    pub sasl_password: Option<String>,
    pub acks: String,
    pub retries: u32,
    pub compression: String,
    pub linger_ms: u64,
    pub max_queue_size: usize,
    pub queue_max_kbytes: u64,
}

/// Expected `<namespace>/<category>/<device_id>` topic shape.
#[derive(Debug, Deserialize, Clone)]
pub struct IngressSettings {
    pub namespace: String,
    pub category: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthSettings {
    pub host: String,
    pub port: u16,
    pub stale_after_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeSettings {
    pub flush_timeout_secs: u64,
    pub stats_interval_secs: u64,
    pub handle_signals: bool,
    pub log_level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub mqtt: Option<PartialMqttSettings>,
    pub kafka: Option<PartialKafkaSettings>,
    pub ingress: Option<PartialIngressSettings>,
    pub health: Option<PartialHealthSettings>,
    pub runtime: Option<PartialRuntimeSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialMqttSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_port: Option<u16>,
    pub use_tls: Option<bool>,
    pub ca_cert: Option<String>,
    pub topic_in: Option<String>,
    pub qos: Option<u8>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id_prefix: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub backoff_base_secs: Option<u64>,
    pub backoff_cap_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialKafkaSettings {
    pub brokers: Option<String>,
    pub topic_out: Option<String>,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub acks: Option<String>,
    pub retries: Option<u32>,
    pub compression: Option<String>,
    pub linger_ms: Option<u64>,
    pub max_queue_size: Option<usize>,
    pub queue_max_kbytes: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialIngressSettings {
    pub namespace: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHealthSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub stale_after_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRuntimeSettings {
    pub flush_timeout_secs: Option<u64>,
    pub stats_interval_secs: Option<u64>,
    pub handle_signals: Option<bool>,
    pub log_level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge_over(self, defaults: Settings) -> Settings {
        Settings {
            mqtt: self.mqtt.unwrap_or_default().merge_over(defaults.mqtt),
            kafka: self.kafka.unwrap_or_default().merge_over(defaults.kafka),
            ingress: self.ingress.unwrap_or_default().merge_over(defaults.ingress),
            health: self.health.unwrap_or_default().merge_over(defaults.health),
            runtime: self.runtime.unwrap_or_default().merge_over(defaults.runtime),
        }
    }
}

impl PartialMqttSettings {
    fn merge_over(self, d: MqttSettings) -> MqttSettings {
        MqttSettings {
            host: self.host.unwrap_or(d.host),
            port: self.port.unwrap_or(d.port),
            tls_port: self.tls_port.unwrap_or(d.tls_port),
            use_tls: self.use_tls.unwrap_or(d.use_tls),
            ca_cert: self.ca_cert.unwrap_or(d.ca_cert),
            topic_in: self.topic_in.unwrap_or(d.topic_in),
            qos: self.qos.unwrap_or(d.qos),
            username: self.username.or(d.username),
            password: self.password.or(d.password),
            client_id_prefix: self.client_id_prefix.unwrap_or(d.client_id_prefix),
            keep_alive_secs: self.keep_alive_secs.unwrap_or(d.keep_alive_secs),
            max_retries: self.max_retries.unwrap_or(d.max_retries),
            backoff_base_secs: self.backoff_base_secs.unwrap_or(d.backoff_base_secs),
            backoff_cap_secs: self.backoff_cap_secs.unwrap_or(d.backoff_cap_secs),
        }
    }
}

impl PartialKafkaSettings {
    fn merge_over(self, d: KafkaSettings) -> KafkaSettings {
        KafkaSettings {
            brokers: self.brokers.unwrap_or(d.brokers),
            topic_out: self.topic_out.unwrap_or(d.topic_out),
            security_protocol: self.security_protocol.unwrap_or(d.security_protocol),
            sasl_mechanism: self.sasl_mechanism.unwrap_or(d.sasl_mechanism),
            sasl_username: self.sasl_username.unwrap_or(d.sasl_username),
            sasl_password: self.sasl_password.or(d.sasl_password),
            acks: self.acks.unwrap_or(d.acks),
            retries: self.retries.unwrap_or(d.retries),
            compression: self.compression.unwrap_or(d.compression),
            linger_ms: self.linger_ms.unwrap_or(d.linger_ms),
            max_queue_size: self.max_queue_size.unwrap_or(d.max_queue_size),
            queue_max_kbytes: self.queue_max_kbytes.unwrap_or(d.queue_max_kbytes),
        }
    }
}

impl PartialIngressSettings {
    fn merge_over(self, d: IngressSettings) -> IngressSettings {
        IngressSettings {
            namespace: self.namespace.unwrap_or(d.namespace),
            category: self.category.unwrap_or(d.category),
        }
    }
}

impl PartialHealthSettings {
    fn merge_over(self, d: HealthSettings) -> HealthSettings {
        HealthSettings {
            host: self.host.unwrap_or(d.host),
            port: self.port.unwrap_or(d.port),
            stale_after_secs: self.stale_after_secs.unwrap_or(d.stale_after_secs),
        }
    }
}

impl PartialRuntimeSettings {
    fn merge_over(self, d: RuntimeSettings) -> RuntimeSettings {
        RuntimeSettings {
            flush_timeout_secs: self.flush_timeout_secs.unwrap_or(d.flush_timeout_secs),
            stats_interval_secs: self.stats_interval_secs.unwrap_or(d.stats_interval_secs),
            handle_signals: self.handle_signals.unwrap_or(d.handle_signals),
            log_level: self.log_level.unwrap_or(d.log_level),
        }
    }
}

/// Provides default values for `Settings`.
///
/// These match a local development setup: brokers on localhost, plain MQTT,
/// SASL/PLAIN towards Kafka.
impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt: MqttSettings {
                host: "localhost".to_string(),
                port: 1883,
                tls_port: 8883,
                use_tls: false,
                ca_cert: "ca.crt".to_string(),
                topic_in: "iot/telemetry/+".to_string(),
                qos: 1,
                username: None,
                password: None,
                client_id_prefix: "mqtt-kafka-bridge".to_string(),
                keep_alive_secs: 60,
                max_retries: 5,
                backoff_base_secs: 1,
                backoff_cap_secs: 60,
            },
            kafka: KafkaSettings {
                brokers: "localhost:9092".to_string(),
                topic_out: "iot-telemetry-raw".to_string(),
                security_protocol: "SASL_PLAINTEXT".to_string(),
                sasl_mechanism: "PLAIN".to_string(),
                sasl_username: "bridge_user".to_string(),
                sasl_password: None,
                acks: "all".to_string(),
                retries: 3,
                compression: "snappy".to_string(),
                linger_ms: 20,
                max_queue_size: 10_000,
                queue_max_kbytes: 512_000,
            },
            ingress: IngressSettings {
                namespace: "iot".to_string(),
                category: "telemetry".to_string(),
            },
            health: HealthSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                stale_after_secs: 120,
            },
            runtime: RuntimeSettings {
                flush_timeout_secs: 10,
                stats_interval_secs: 60,
                handle_signals: true,
                log_level: "info".to_string(),
            },
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("kafka.max_queue_size must be greater than zero")]
    ZeroQueueSize,
    #[error("mqtt.qos must be 0, 1 or 2 (got {0})")]
    InvalidQos(u8),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl Settings {
    /// Rejects settings the bridge cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.kafka.max_queue_size == 0 {
            return Err(SettingsError::ZeroQueueSize);
        }
        if self.mqtt.qos > 2 {
            return Err(SettingsError::InvalidQos(self.mqtt.qos));
        }
        let required = [
            ("mqtt.host", &self.mqtt.host),
            ("mqtt.topic_in", &self.mqtt.topic_in),
            ("kafka.brokers", &self.kafka.brokers),
            ("kafka.topic_out", &self.kafka.topic_out),
            ("ingress.namespace", &self.ingress.namespace),
            ("ingress.category", &self.ingress.category),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::Empty(name));
            }
        }
        Ok(())
    }
}

impl MqttSettings {
    /// Port to dial: the TLS port when TLS is on.
    pub fn effective_port(&self) -> u16 {
        if self.use_tls { self.tls_port } else { self.port }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }
}

impl KafkaSettings {
    /// Queue depth above which near-capacity warnings are logged (80 % of max).
    pub fn warn_threshold(&self) -> usize {
        self.max_queue_size.saturating_mul(8) / 10
    }
}

impl HealthSettings {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RuntimeSettings {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}

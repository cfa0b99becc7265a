use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use punchbridge_ingest::MqttSettings;
use punchbridge_ingest::mqtt::{BrokerAddress, MqttError, parse_broker_url};
use thiserror::Error;
use uuid::Uuid;

/// Placeholder admin tokens that MUST NOT be used.
const PLACEHOLDER_TOKENS: &[&str] = &["change-me", "change-me-to-a-random-string", "dev-token"];

const DEFAULT_TOPIC: &str = "aiface/+/sub";
const DEFAULT_MAX_PACKET_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_RECONNECT_MS: u64 = 2000;
const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is still a placeholder; set a long random string")]
    Placeholder(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Broker(#[from] MqttError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub broker: BrokerAddress,
    pub mqtt_topic: String,
    pub mqtt_max_packet_bytes: usize,
    pub mqtt_reconnect_delay: Duration,
    pub admin_token: String,
    pub db_path: PathBuf,
    pub store_images: bool,
    pub ingest_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mqtt_url = get("PUNCHBRIDGE_MQTT_URL").ok_or(ConfigError::Missing("PUNCHBRIDGE_MQTT_URL"))?;
        let mut broker = parse_broker_url(&mqtt_url)?;

        match (get("PUNCHBRIDGE_MQTT_USERNAME"), get("PUNCHBRIDGE_MQTT_PASSWORD")) {
            (Some(username), password) => {
                broker.username = Some(username);
                broker.password = password;
            }
            (None, Some(_)) => return Err(ConfigError::Missing("PUNCHBRIDGE_MQTT_USERNAME")),
            (None, None) => {}
        }

        let admin_token =
            get("PUNCHBRIDGE_ADMIN_TOKEN").ok_or(ConfigError::Missing("PUNCHBRIDGE_ADMIN_TOKEN"))?;
        if PLACEHOLDER_TOKENS.contains(&admin_token.as_str()) {
            return Err(ConfigError::Placeholder("PUNCHBRIDGE_ADMIN_TOKEN"));
        }

        let db_path: PathBuf = get("PUNCHBRIDGE_DB_PATH")
            .ok_or(ConfigError::Missing("PUNCHBRIDGE_DB_PATH"))?
            .into();

        let host = get("PUNCHBRIDGE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or("PUNCHBRIDGE_PORT", get("PUNCHBRIDGE_PORT"), 3000)?;
        let bind_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::Invalid { name: "PUNCHBRIDGE_HOST", value: host })?;

        let store_images = get("PUNCHBRIDGE_STORE_IMAGES")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mqtt_max_packet_bytes = parse_or(
            "PUNCHBRIDGE_MQTT_MAX_PACKET_BYTES",
            get("PUNCHBRIDGE_MQTT_MAX_PACKET_BYTES"),
            DEFAULT_MAX_PACKET_BYTES,
        )?;
        let reconnect_ms = parse_or(
            "PUNCHBRIDGE_MQTT_RECONNECT_MS",
            get("PUNCHBRIDGE_MQTT_RECONNECT_MS"),
            DEFAULT_RECONNECT_MS,
        )?;
        let ingest_queue_capacity = parse_or(
            "PUNCHBRIDGE_INGEST_QUEUE",
            get("PUNCHBRIDGE_INGEST_QUEUE"),
            DEFAULT_QUEUE_CAPACITY,
        )?;
        if ingest_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "PUNCHBRIDGE_INGEST_QUEUE",
                value: "0".into(),
            });
        }

        Ok(Self {
            bind_addr,
            broker,
            mqtt_topic: get("PUNCHBRIDGE_MQTT_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.into()),
            mqtt_max_packet_bytes,
            mqtt_reconnect_delay: Duration::from_millis(reconnect_ms),
            admin_token,
            db_path,
            store_images,
            ingest_queue_capacity,
        })
    }

    pub fn mqtt_settings(&self) -> MqttSettings {
        let suffix = Uuid::new_v4().simple().to_string();
        MqttSettings {
            broker: self.broker.clone(),
            topic: self.mqtt_topic.clone(),
            client_id: format!("punchbridge-{}", &suffix[..8]),
            max_packet_bytes: self.mqtt_max_packet_bytes,
            reconnect_delay: self.mqtt_reconnect_delay,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

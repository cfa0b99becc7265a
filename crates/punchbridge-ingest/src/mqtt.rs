use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::worker::InboundFrame;

const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Error, PartialEq)]
pub enum MqttError {
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
}

/// Broker host, port and any credentials embedded in the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerAddress {
    /// `mqtt://host:port` without credentials, safe to log and expose.
    pub fn redacted(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

/// Parse broker URL in format mqtt://[user:pass@]host[:port], tcp://... or host[:port]
pub fn parse_broker_url(url: &str) -> Result<BrokerAddress, MqttError> {
    let rest = url.trim();
    let rest = rest
        .strip_prefix("mqtt://")
        .or_else(|| rest.strip_prefix("tcp://"))
        .unwrap_or(rest);
    let rest = rest.trim_end_matches('/');

    if rest.is_empty() || rest.contains("://") || rest.contains('/') {
        return Err(MqttError::InvalidBrokerUrl(url.to_string()));
    }

    let (credentials, host_port) = match rest.rsplit_once('@') {
        Some((credentials, host_port)) => (Some(credentials), host_port),
        None => (None, rest),
    };

    let (username, password) = match credentials {
        Some(credentials) => match credentials.split_once(':') {
            Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
            None => (Some(credentials.to_string()), None),
        },
        None => (None, None),
    };

    let (host, port) = match host_port.split_once(':') {
        None => (host_port, DEFAULT_MQTT_PORT),
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| MqttError::InvalidBrokerUrl(format!("invalid port in {}", url)))?;
            (host, port)
        }
    };

    if host.is_empty() {
        return Err(MqttError::InvalidBrokerUrl(url.to_string()));
    }

    Ok(BrokerAddress {
        host: host.to_string(),
        port,
        username,
        password,
    })
}

/// Everything the subscriber needs to reach the broker.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker: BrokerAddress,
    pub topic: String,
    pub client_id: String,
    pub max_packet_bytes: usize,
    pub reconnect_delay: Duration,
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.client_id, self.broker.host.as_str(), self.broker.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);
        options.set_max_packet_size(self.max_packet_bytes, self.max_packet_bytes);

        if let Some(username) = &self.broker.username {
            options.set_credentials(username, self.broker.password.clone().unwrap_or_default());
        }

        options
    }
}

/// Broker connection flag, shared with the health route.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    connected: Arc<AtomicBool>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

/// Run the MQTT subscriber until shutdown.
///
/// Subscribes on every (re)connect since sessions are clean, and pushes each
/// publish onto the ingest queue. Connection errors are logged and retried
/// after `reconnect_delay`, forever.
#[instrument(
    name = "mqtt_subscriber",
    skip_all,
    fields(broker = %settings.broker.redacted(), topic = %settings.topic)
)]
pub async fn run_mqtt_subscriber(
    settings: MqttSettings,
    queue: mpsc::Sender<InboundFrame>,
    connection: ConnectionState,
    shutdown: CancellationToken,
) {
    let (client, mut eventloop) = AsyncClient::new(settings.options(), 16);

    info!("starting MQTT subscriber");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("shutdown signal received");
                connection.set_connected(false);
                let _ = client.disconnect().await;
                break;
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connection.set_connected(true);
                        info!("MQTT connected");
                        if let Err(e) = client.subscribe(&settings.topic, QoS::AtLeastOnce).await {
                            error!(error = %e, "MQTT subscribe error");
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        info!("Subscribed to {}", settings.topic);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let frame = InboundFrame {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        };
                        if !forward_frame(&queue, &connection, frame).await {
                            break;
                        }
                    }
                    Ok(_) => {
                        // Pings, acks and outgoing packets
                    }
                    Err(e) => {
                        connection.set_connected(false);
                        error!(error = %e, "MQTT error");
                        info!("MQTT reconnecting...");

                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(settings.reconnect_delay) => {}
                        }
                    }
                }
            }
        }
    }

    info!("MQTT subscriber stopped");
}

/// Hand a publish to the ingest queue. Returns false once the worker is gone,
/// after marking the connection down.
async fn forward_frame(
    queue: &mpsc::Sender<InboundFrame>,
    connection: &ConnectionState,
    frame: InboundFrame,
) -> bool {
    if queue.send(frame).await.is_err() {
        warn!("ingest queue closed, stopping MQTT subscriber");
        connection.set_connected(false);
        return false;
    }
    true
}

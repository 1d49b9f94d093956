//! `rumqttc` adapter for the [`Transport`] trait.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    TlsConfiguration,
};
use tracing::info;
use uuid::Uuid;

use super::transport::{Transport, TransportError, TransportEvent};
use crate::config::MqttSettings;
use crate::utils::BridgeError;

/// Capacity of the request channel between `AsyncClient` and the event loop.
const REQUEST_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);
const MIN_KEEP_ALIVE_SECS: u64 = 5;

pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    qos: QoS,
}

/// `<prefix>-<8 hex chars>`, unique per process.
pub fn client_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..8])
}

pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// Reads the CA bundle, failing if it is missing.
pub fn load_ca(path: &str) -> Result<Vec<u8>, BridgeError> {
    std::fs::read(path).map_err(|e| BridgeError::Tls(format!("CA cert not found at '{path}': {e}")))
}

impl MqttTransport {
    pub fn new(settings: &MqttSettings, client_id: &str) -> Result<Self, BridgeError> {
        let mut options = MqttOptions::new(client_id, &settings.host, settings.effective_port());
        options.set_keep_alive(Duration::from_secs(
            settings.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
        ));

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            options.set_credentials(username, password);
        }

        if settings.use_tls {
            let ca = load_ca(&settings.ca_cert)?;
            options.set_transport(rumqttc::Transport::tls_with_config(
                TlsConfiguration::Simple {
                    ca,
                    alpn: None,
                    client_auth: None,
                },
            ));
            info!("TLS enabled");
        }

        info!(
            "MQTT: {}:{} (TLS: {}, client id: {client_id})",
            settings.host,
            settings.effective_port(),
            settings.use_tls
        );

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Ok(Self {
            client,
            eventloop,
            topic: settings.topic_in.clone(),
            qos: qos_from_level(settings.qos),
        })
    }
}

impl Transport for MqttTransport {
    async fn poll(&mut self) -> Result<TransportEvent, TransportError> {
        match self.eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    Ok(TransportEvent::Connected)
                } else {
                    Err(TransportError(format!("connect refused: {:?}", ack.code)))
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => Ok(TransportEvent::Message {
                topic: publish.topic,
                payload: publish.payload,
            }),
            Ok(Event::Incoming(Packet::Disconnect)) => Ok(TransportEvent::Disconnected),
            Ok(_) => Ok(TransportEvent::Other),
            Err(e) => Err(TransportError(e.to_string())),
        }
    }

    fn subscribe(&mut self) -> Result<(), TransportError> {
        info!("Subscribing to '{}' ({:?})", self.topic, self.qos);
        self.client
            .try_subscribe(&self.topic, self.qos)
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn disconnect(&mut self) {
        if self.client.try_disconnect().is_err() {
            return;
        }
        // the request only goes out while the event loop is polled
        let eventloop = &mut self.eventloop;
        let _ = tokio::time::timeout(DISCONNECT_GRACE, async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
    }
}

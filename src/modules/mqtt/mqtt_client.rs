use bytes::Bytes;
use log::{debug, error, info, warn};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode,
    TlsConfiguration, Transport,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::{self, JoinHandle},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

use super::config::MqttConfig;
use crate::shared::errors::TransportError;

const REQUEST_CAPACITY: usize = 250;
const ROUTE_CAPACITY: usize = 64;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

type TopicRoutes = Arc<Mutex<HashMap<String, mpsc::Sender<Bytes>>>>;

/// Owned MQTT connection.
///
/// Incoming publishes are forwarded to per-topic channels registered with
/// [`MqttClient::add_topic_route`]; every route is (re)subscribed on each
/// ConnAck, so subscriptions survive reconnects handled by rumqttc.
#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    eventloop: Arc<Mutex<Option<EventLoop>>>,
    topic_routes: TopicRoutes,
    connected: Arc<watch::Sender<bool>>,
}

impl MqttClient {
    pub fn new(config: &MqttConfig) -> Result<Self, TransportError> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive.into()));
        options.set_clean_session(true);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        if let Some(ca_cert) = &config.ca_cert {
            let ca = load_certificate(ca_cert)?;
            let client_auth = match (&config.client_cert, &config.client_key) {
                (Some(cert), Some(key)) => Some((load_certificate(cert)?, load_certificate(key)?)),
                _ => None,
            };

            let tls_config = TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth,
            };
            options.set_transport(Transport::tls_with_config(tls_config));
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (connected, _) = watch::channel(false);

        Ok(MqttClient {
            client,
            eventloop: Arc::new(Mutex::new(Some(eventloop))),
            topic_routes: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(connected),
        })
    }

    /// Spawns the event loop task. It runs until `cancel` fires, then sends a
    /// DISCONNECT to the broker.
    pub async fn start(&self, cancel: CancellationToken) -> Result<JoinHandle<()>, TransportError> {
        let eventloop = self
            .eventloop
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        let client = self.client.clone();
        let routes = Arc::clone(&self.topic_routes);
        let connected = Arc::clone(&self.connected);

        Ok(task::spawn(run_event_loop(
            eventloop, client, routes, connected, cancel,
        )))
    }

    /// Registers a channel for messages on `topic`. The subscription itself
    /// is issued on every ConnAck.
    pub async fn add_topic_route(&self, topic: &str) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(ROUTE_CAPACITY);
        self.topic_routes.lock().await.insert(topic.to_string(), tx);
        rx
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        self.client.publish(topic, qos, false, payload).await?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn connection_watch(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    routes: TopicRoutes,
    connected: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(
                    "Received message on topic '{}' ({} bytes)",
                    publish.topic,
                    publish.payload.len()
                );

                let route = routes.lock().await.get(&publish.topic).cloned();
                match route {
                    Some(tx) => {
                        if tx.send(publish.payload).await.is_err() {
                            warn!("Route for topic '{}' is closed", publish.topic);
                        }
                    }
                    None => debug!("No route for topic '{}'", publish.topic),
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connection established with broker.");
                connected.send_replace(true);

                let topics: Vec<String> = routes.lock().await.keys().cloned().collect();
                for topic in topics {
                    let client = client.clone();
                    tokio::spawn(async move {
                        info!("Subscribing to topic: {}", topic);
                        if let Err(e) = client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                            error!("Failed to subscribe to topic '{}': {}", topic, e);
                        }
                    });
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    error!(
                        "Broker rejected subscription (pkid {}), retrying on next connect",
                        ack.pkid
                    );
                } else {
                    debug!("Subscription acknowledged (pkid {})", ack.pkid);
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the connection.");
                connected.send_replace(false);
            }
            Ok(_) => (),
            Err(e) => {
                error!("MQTT event loop error: {}", e);
                if connected.send_replace(false) {
                    warn!("Connection lost with broker.");
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(RETRY_DELAY) => (),
                }
            }
        }
    }

    if *connected.borrow() {
        if let Err(e) = client.try_disconnect() {
            warn!("Failed to request disconnect: {}", e);
        }
        let _ = timeout(DISCONNECT_GRACE, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => (),
                }
            }
        })
        .await;
    }

    connected.send_replace(false);
    info!("MQTT event loop stopped");
}

fn load_certificate(path: &str) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|source| TransportError::Certificate {
        path: path.to_string(),
        source,
    })
}

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use mqtt::{Message, Receiver};
use paho_mqtt as mqtt;
use serde::Deserialize;

use crate::dispatcher::TriggerDispatcher;
use crate::error::ValidationError;
use crate::trigger::TriggerEvent;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const RECONNECT_DELAY_MIN: Duration = Duration::from_millis(250);
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(10);

/// Pause before reconnection attempt `attempt` (zero based): doubles from
/// `RECONNECT_DELAY_MIN` up to `RECONNECT_DELAY_MAX`.
fn reconnect_delay(attempt: u32) -> Duration {
    RECONNECT_DELAY_MIN
        .saturating_mul(1 << attempt.min(16))
        .min(RECONNECT_DELAY_MAX)
}

fn keep_reconnecting(running: bool, connected: bool) -> bool {
    running && !connected
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_url: String,
    pub client_id: String,
    pub trigger_topic: String,
    pub status_topic: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            broker_url: "tcp://localhost:1883".to_string(),
            client_id: "colorlaunch".to_string(),
            trigger_topic: "playanimation".to_string(),
            status_topic: "colorlaunch/status".to_string(),
            keep_alive_secs: 20,
        }
    }
}

/// Feeds trigger messages from the broker into the dispatcher and reports
/// availability and the outcome of each trigger on the status topic.
pub struct MqttClient {
    client: mqtt::Client,
    receiver: Receiver<Option<Message>>,
    config: MqttConfig,
    dispatcher: TriggerDispatcher,
    running: Arc<AtomicBool>,
}

impl MqttClient {
    fn make_lwt_message(topic: &str) -> mqtt::Message {
        let payload = json::object! {
            available: "offline"
        };

        return mqtt::Message::new_retained(topic, json::stringify(payload), 0);
    }

    pub fn new(
        config: &MqttConfig,
        dispatcher: TriggerDispatcher,
        running: Arc<AtomicBool>,
    ) -> Result<MqttClient, String> {
        let create_opts = mqtt::CreateOptionsBuilder::new()
            .server_uri(&config.broker_url)
            .client_id(&config.client_id)
            .finalize();

        let client = match mqtt::Client::new(create_opts) {
            Ok(client) => client,
            Err(err) => {
                return Err(format!("{:?}", err));
            }
        };

        let conn_opts = mqtt::ConnectOptionsBuilder::new()
            .keep_alive_interval(Duration::from_secs(config.keep_alive_secs))
            .clean_session(true)
            .will_message(MqttClient::make_lwt_message(&config.status_topic))
            .finalize();

        if let Err(err) = client.connect(conn_opts) {
            return Err(format!("Cannot connect to {}: {:?}", config.broker_url, err));
        }

        log::info!("Connected to broker at {}", config.broker_url);

        let receiver = client.start_consuming();
        let mqtt_client = MqttClient {
            client,
            receiver,
            config: config.clone(),
            dispatcher,
            running,
        };

        mqtt_client.subscribe()?;
        mqtt_client.publish_status(json::object! { available: "online" });
        Ok(mqtt_client)
    }

    fn subscribe(&self) -> Result<(), String> {
        if let Err(err) = self.client.subscribe(&self.config.trigger_topic, 0) {
            return Err(format!(
                "Failed to subscribe to topic {}: {:?}",
                &self.config.trigger_topic, err
            ));
        }
        log::info!("Listening for triggers on {}", self.config.trigger_topic);
        Ok(())
    }

    /// Retries until the broker is back or we are shut down.
    fn reconnect(&self) {
        let mut attempt = 0;
        while keep_reconnecting(self.running.load(Ordering::SeqCst), self.client.is_connected()) {
            match self.client.reconnect() {
                Ok(_) => break,
                Err(err) => {
                    let delay = reconnect_delay(attempt);
                    log::warn!("Reconnection failed: {err}, retrying in {delay:?}");
                    self.pause(delay);
                    attempt = attempt.saturating_add(1);
                }
            }
        }
        if !self.client.is_connected() {
            return;
        }

        log::info!("Reconnected to {}", self.config.broker_url);
        // Clean sessions drop subscriptions together with the connection.
        match self.subscribe() {
            Ok(()) => self.publish_status(json::object! { available: "online" }),
            Err(err) => log::warn!("{err}"),
        }
    }

    /// Sleeps for `delay`, waking early if `running` is cleared.
    fn pause(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while self.running.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }

    fn publish_status(&self, payload: json::JsonValue) {
        let payload_str = json::stringify(payload);
        let msg = mqtt::Message::new_retained(&self.config.status_topic, payload_str.clone(), 0);
        log::debug!("Publishing {}: {}", self.config.status_topic, &payload_str);
        if let Err(err) = self.client.publish(msg) {
            log::warn!("Publishing failed: {err}");
        }
    }

    /// Handles triggers until `running` is cleared. Fails if the client
    /// stops delivering messages altogether.
    pub fn run(&self) -> Result<(), String> {
        while self.running.load(Ordering::SeqCst) {
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(Some(msg)) => self.handle_message(msg),
                Ok(None) => {
                    log::warn!("Lost connection to {}", self.config.broker_url);
                    self.reconnect();
                }
                Err(err) if err.is_disconnected() => {
                    return Err("Message channel closed".to_string());
                }
                // Timed out. A failed reconnect leaves us here without another
                // disconnect notice, so retry from the poll loop.
                Err(_) => {
                    if !self.client.is_connected() {
                        self.reconnect();
                    }
                }
            };
        }
        Ok(())
    }

    fn handle_message(&self, msg: Message) {
        if msg.topic() != self.config.trigger_topic {
            log::debug!("Ignoring message on {}", msg.topic());
            return;
        }

        let outcome = self.dispatcher.dispatch(&msg.payload_str());
        self.publish_status(status_payload(&outcome));
    }
}

fn status_payload(outcome: &Result<TriggerEvent, ValidationError>) -> json::JsonValue {
    match outcome {
        Ok(_) => json::object! {
            available: "online",
            last_trigger: "accepted",
        },
        Err(err) => json::object! {
            available: "online",
            last_trigger: "rejected",
            error: err.to_string(),
        },
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        self.publish_status(json::object! { available: "offline" });
        if let Err(err) = self.client.disconnect(None) {
            // We don't really care about errors here, but let's make rustc happy.
            log::error!("{:?}", err);
        }
    }
}

//! Relay between the message broker and the TV
//!
//! Inbound messages on the configured topics become TV calls. The TV's power
//! state, foreground app and volume flow back out as retained messages, so a
//! client subscribing late still sees the current state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webos_sdk::{BrokerConfig, Config, LgTv, Subscription};

use crate::topics::{self, Action};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Connection options for the configured broker
pub fn broker_options(broker: &BrokerConfig) -> Result<MqttOptions> {
    let host = broker.host()?;
    let client_id = format!("lgtv-bridge-{}", std::process::id());

    let mut options = MqttOptions::new(client_id, host, broker.port);
    options.set_keep_alive(KEEP_ALIVE);
    Ok(options)
}

#[derive(Clone)]
pub struct Bridge {
    config: Arc<Config>,
    tv: Arc<LgTv>,
}

impl Bridge {
    pub fn new(config: Config, tv: LgTv) -> Self {
        Self {
            config: Arc::new(config),
            tv: Arc::new(tv),
        }
    }

    pub fn tv(&self) -> &LgTv {
        &self.tv
    }

    /// Carry out an action received from the broker
    ///
    /// The TV is unreachable whenever it is off, so `NotConnected` failures
    /// are dropped with a debug log rather than reported.
    pub async fn apply(&self, action: &Action) -> Result<()> {
        let result = match action {
            Action::PowerOn => return self.wake(),
            Action::PowerOff => {
                if !self.tv.is_connected() {
                    debug!("TV is already off");
                    return Ok(());
                }
                self.tv.turn_off().await
            }
            Action::LaunchApp(id) => self.tv.set_app(id).await,
            Action::SetVolume(level) => self.tv.set_volume(*level).await,
        };

        match result {
            Ok(()) => {
                info!("Applied {:?}", action);
                Ok(())
            }
            Err(e) if e.is_not_connected() => {
                debug!("TV unreachable, dropping {:?}", action);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to apply {:?}", action)),
        }
    }

    fn wake(&self) -> Result<()> {
        let mac = self.config.mac_address()?;
        webos_sdk::wake(&mac).with_context(|| format!("Failed to wake {}", mac))?;
        info!("Sent Wake-on-LAN packet to {}", mac);
        Ok(())
    }

    /// Publish app and volume changes as retained messages
    ///
    /// The subscriptions survive TV reconnects; keep them for as long as the
    /// bridge runs.
    pub async fn follow_tv(&self, client: &AsyncClient) -> Vec<Subscription> {
        let mut subscriptions = Vec::new();
        let broker = &self.config.broker;

        if !broker.topic_input.is_empty() {
            let config = Arc::clone(&self.config);
            let client = client.clone();
            let subscription = self
                .tv
                .subscribe_app(move |event| match event {
                    Ok(app) => {
                        if let Some(name) = topics::app_state(&config, &app) {
                            publish_retained(&client, &config.broker.topic_input, name);
                        }
                    }
                    Err(e) => warn!("App event failed: {}", e),
                })
                .await;
            subscriptions.push(subscription);
        }

        if !broker.topic_volume.is_empty() {
            let topic = broker.topic_volume.clone();
            let client = client.clone();
            let subscription = self
                .tv
                .subscribe_volume(move |event| match event {
                    Ok(volume) => publish_retained(&client, &topic, topics::volume_state(&volume)),
                    Err(e) => warn!("Volume event failed: {}", e),
                })
                .await;
            subscriptions.push(subscription);
        }

        subscriptions
    }

    /// Publish `on` whenever the TV connects and `off` when it drops
    pub fn follow_power(&self, client: AsyncClient) -> Option<JoinHandle<()>> {
        let topic = self.config.broker.topic_power.clone();
        if topic.is_empty() {
            return None;
        }

        let mut states = self.tv.session().watch_state();
        Some(tokio::spawn(async move {
            let mut on = false;
            loop {
                let active = states.borrow_and_update().is_active();
                if active != on {
                    on = active;
                    info!("TV is {}", topics::power_state(on));
                    publish_retained(&client, &topic, topics::power_state(on));
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        }))
    }

    /// Drive the broker connection until the process is stopped
    ///
    /// Topics are subscribed again and the app-name list is republished on
    /// every (re)connect. TV calls run on their own tasks so a slow TV never
    /// stalls the broker connection.
    pub async fn relay(&self, mut events: EventLoop, client: &AsyncClient) {
        loop {
            match events.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to broker");
                    self.on_connect(client);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some(action) = topics::action_for(&self.config, &publish.topic, &publish.payload) else {
                        debug!("Ignoring message on {}", publish.topic);
                        continue;
                    };
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bridge.apply(&action).await {
                            warn!("{:#}", e);
                        }
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Broker connection failed: {}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    fn on_connect(&self, client: &AsyncClient) {
        let broker = &self.config.broker;
        for topic in [&broker.topic_power, &broker.topic_input, &broker.topic_volume] {
            if topic.is_empty() {
                continue;
            }
            if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                warn!("Could not subscribe to {}: {}", topic, e);
            }
        }

        if let Some(topic) = broker.topic_app_names() {
            publish_retained(client, &topic, topics::app_names(&self.config));
        }
    }
}

fn publish_retained(client: &AsyncClient, topic: &str, payload: impl Into<Vec<u8>>) {
    match client.try_publish(topic, QoS::AtLeastOnce, true, payload) {
        Ok(()) => debug!("Published to {}", topic),
        Err(e) => warn!("Could not publish to {}: {}", topic, e),
    }
}

//! Typed handle to a single TV

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ssap_client::{Connector, WebSocketConnector};
use tracing::{debug, info};
use webos_api::operations::{
    GetForegroundAppOperation, GetVolumeOperation, LaunchAppOperation, LaunchAppRequest,
    ListAppsOperation, SetVolumeOperation, SetVolumeRequest, TurnOffOperation,
};
use webos_api::{App, SsapOperation, Subscribable, Volume};
use webos_session::{Session, SessionConfig, SessionError, SessionState, Subscription};

use crate::error::{Result, SdkError};

/// A connected (or reconnecting) LG webOS TV
///
/// Wraps a [`Session`], so every call made through it benefits from
/// automatic reconnection and pairing. Calls made while the TV is
/// unreachable fail fast with [`SessionError::NotConnected`].
pub struct LgTv {
    session: Session,
    app_names: Arc<HashMap<String, String>>,
}

impl LgTv {
    /// Connect to the TV at `host` with default timeouts
    ///
    /// Returns immediately; the connection is established in the background.
    /// Use [`LgTv::wait_until_connected`] to block until it is usable.
    pub fn connect(host: &str, key: impl Into<String>) -> Result<Self> {
        Self::connect_with_config(host, key, SessionConfig::default())
    }

    pub fn connect_with_config(host: &str, key: impl Into<String>, config: SessionConfig) -> Result<Self> {
        if host.trim().is_empty() {
            return Err(SdkError::Config("TV host must not be empty".to_string()));
        }
        info!("Connecting to TV at {}", host);
        Self::with_connector(WebSocketConnector::new(host), config, key)
    }

    /// Build on any transport, mainly for tests
    pub fn with_connector<C: Connector>(
        connector: C,
        config: SessionConfig,
        key: impl Into<String>,
    ) -> Result<Self> {
        let session = Session::spawn(connector, config, key)?;
        Ok(Self {
            session,
            app_names: Arc::new(HashMap::new()),
        })
    }

    /// Friendly names for app ids, used to fill [`App::name`] when the TV
    /// only reports an id
    pub fn with_app_names(mut self, names: HashMap<String, String>) -> Self {
        self.app_names = Arc::new(names);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// The key the TV last accepted or issued; persist it for the next run
    pub fn pairing_key(&self) -> String {
        self.session.pairing_key()
    }

    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<()> {
        self.session.wait_until_active(timeout).await?;
        Ok(())
    }

    /// Execute any operation against the TV
    pub async fn execute<Op: SsapOperation>(&self, request: &Op::Request) -> Result<Op::Response> {
        let payload = Op::build_payload(request)?;
        debug!("Executing {}", Op::CAPABILITY.name());
        let reply = self.session.call(Op::CAPABILITY.uri(), payload).await?;
        Ok(Op::parse_response(&reply)?)
    }

    /// Subscribe to any subscribable operation
    ///
    /// The callback receives every parsed event, including errors pushed by
    /// the TV and events that fail to parse.
    pub async fn subscribe<Op, F>(&self, callback: F) -> Subscription
    where
        Op: Subscribable,
        F: Fn(Result<Op::Response>) + Send + Sync + 'static,
    {
        self.session
            .subscribe(Op::CAPABILITY.uri(), None, move |event| {
                let parsed = event
                    .map_err(|e| SdkError::Session(SessionError::Tv(e)))
                    .and_then(|payload| Op::parse_response(&payload).map_err(SdkError::from));
                callback(parsed);
            })
            .await
    }

    pub async fn list_apps(&self) -> Result<Vec<App>> {
        self.execute::<ListAppsOperation>(&()).await
    }

    /// The application in the foreground
    pub async fn app(&self) -> Result<App> {
        let app = self.execute::<GetForegroundAppOperation>(&()).await?;
        Ok(name_app(&self.app_names, app))
    }

    /// Launch the app with id `app_id`
    pub async fn set_app(&self, app_id: &str) -> Result<()> {
        let request = LaunchAppRequest {
            id: app_id.to_string(),
        };
        self.execute::<LaunchAppOperation>(&request).await?;
        Ok(())
    }

    pub async fn subscribe_app<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Result<App>) + Send + Sync + 'static,
    {
        let names = Arc::clone(&self.app_names);
        self.subscribe::<GetForegroundAppOperation, _>(move |event| {
            callback(event.map(|app| name_app(&names, app)))
        })
        .await
    }

    pub async fn volume(&self) -> Result<Volume> {
        self.execute::<GetVolumeOperation>(&()).await
    }

    /// Set the volume. `level` is sent as given; range checks are up to the caller.
    pub async fn set_volume(&self, level: i32) -> Result<()> {
        self.execute::<SetVolumeOperation>(&SetVolumeRequest { level })
            .await?;
        Ok(())
    }

    pub async fn subscribe_volume<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Result<Volume>) + Send + Sync + 'static,
    {
        self.subscribe::<GetVolumeOperation, _>(callback).await
    }

    /// Turn the TV off. Turning it back on needs Wake-on-LAN.
    pub async fn turn_off(&self) -> Result<()> {
        self.execute::<TurnOffOperation>(&()).await?;
        Ok(())
    }

    /// Close the connection and stop reconnecting
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}

fn name_app(names: &HashMap<String, String>, app: App) -> App {
    if !app.name.is_empty() {
        return app;
    }
    match names.get(&app.id) {
        Some(name) => app.with_name(name.clone()),
        None => app,
    }
}

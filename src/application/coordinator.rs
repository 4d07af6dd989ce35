//! Service Coordinator
//!
//! Top-level orchestration of the GATT peripheral and the HTTP bridge.
//!
//! ```text
//!  GattPeripheralServer ──AdvertisingState──┐
//!                                           ├──► state actor ──ServicesState──┐
//!  HttpBridgeServer ─────WebServerState─────┘   (single owner)               │
//!         │                                                                   ▼
//!         └──BpmReading──► BPM bridge ──notify_heart_rate (iff Started)   AppState
//!                              │                                              ▲
//!                              └──────────────last BPM────────────────────────┘
//! ```
//!
//! Every task spawned here is aborted when the coordinator is dropped.

use crate::application::fake_bpm::{FakeBpmGenerator, FakeBpmHandle};
use crate::domain::models::{
    AdvertisingState, AppState, BpmReading, CommandOutcome, FakeBpmStatus, HardwareState,
    Permission, ServicesState, WebServerState,
};
use crate::domain::settings::{FakeBpmSettings, Settings};
use crate::domain::state_machine::{CascadeStop, ServicesStateMachine};
use crate::infrastructure::bluetooth::{GattPeripheralServer, PeripheralRadio};
use crate::infrastructure::http::{HttpBridgeConfig, HttpBridgeServer};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub struct ServiceCoordinator {
    peripheral: Arc<GattPeripheralServer>,
    web_server: Arc<HttpBridgeServer>,
    fake_bpm: FakeBpmSettings,
    services_state: watch::Receiver<ServicesState>,
    app_state: watch::Receiver<AppState>,
    fake_generator: Arc<Mutex<Option<FakeBpmHandle>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceCoordinator {
    /// Wire both subsystems together. Must be called inside a Tokio runtime.
    pub fn new(
        peripheral: Arc<GattPeripheralServer>,
        web_server: Arc<HttpBridgeServer>,
        fake_bpm: FakeBpmSettings,
    ) -> Self {
        let (services_tx, services_rx) = watch::channel(ServicesState::Stopped);
        let (last_bpm_tx, last_bpm_rx) = watch::channel(None);
        let (app_tx, app_rx) = watch::channel(AppState::default());
        let fake_generator = Arc::new(Mutex::new(None));

        let tasks = vec![
            tokio::spawn(run_state_actor(
                peripheral.advertising_state(),
                web_server.state(),
                services_tx,
                peripheral.clone(),
                web_server.clone(),
            )),
            tokio::spawn(run_bpm_bridge(
                web_server.bpm_stream(),
                services_rx.clone(),
                peripheral.clone(),
                last_bpm_tx,
            )),
            tokio::spawn(run_app_state(
                services_rx.clone(),
                peripheral.client_connected(),
                last_bpm_rx,
                app_tx,
            )),
            tokio::spawn(run_fake_bpm_guard(
                services_rx.clone(),
                fake_generator.clone(),
            )),
        ];

        Self {
            peripheral,
            web_server,
            fake_bpm,
            services_state: services_rx,
            app_state: app_rx,
            fake_generator,
            tasks,
        }
    }

    pub fn from_settings(radio: Arc<dyn PeripheralRadio>, settings: &Settings) -> Self {
        let peripheral = Arc::new(GattPeripheralServer::new(
            radio,
            settings.device_name.clone(),
        ));
        let web_server = Arc::new(HttpBridgeServer::new(HttpBridgeConfig::from(settings)));
        Self::new(peripheral, web_server, settings.fake_bpm.clone())
    }

    /// Combined snapshot; every clone shares the same upstream computation.
    pub fn app_state(&self) -> watch::Receiver<AppState> {
        self.app_state.clone()
    }

    pub fn services_state(&self) -> watch::Receiver<ServicesState> {
        self.services_state.clone()
    }

    pub fn peripheral(&self) -> &Arc<GattPeripheralServer> {
        &self.peripheral
    }

    pub fn web_server(&self) -> &Arc<HttpBridgeServer> {
        &self.web_server
    }

    /// Bring both subsystems up. Only valid from `Stopped`; progress is
    /// reported through [`Self::app_state`].
    pub async fn start_services(&self) -> CommandOutcome {
        let current = self.services_state.borrow().clone();
        if current != ServicesState::Stopped {
            info!("Ignoring start request while {}", current);
            return CommandOutcome::AlreadyInState(current);
        }

        info!("Starting services");
        let peripheral = self.peripheral.clone();
        let web_server = self.web_server.clone();
        tokio::spawn(async move {
            tokio::join!(peripheral.start_advertising(), web_server.start());
        });
        CommandOutcome::Accepted
    }

    /// Take both subsystems down. Valid from `Started` and from `Error`, the
    /// latter being the only way out of a failure.
    pub async fn stop_services(&self) -> CommandOutcome {
        let current = self.services_state.borrow().clone();
        if !matches!(current, ServicesState::Started | ServicesState::Error(_)) {
            info!("Ignoring stop request while {}", current);
            return CommandOutcome::AlreadyInState(current);
        }

        info!("Stopping services");
        self.stop_fake_bpm().await;
        let peripheral = self.peripheral.clone();
        let web_server = self.web_server.clone();
        tokio::spawn(async move {
            tokio::join!(peripheral.stop_advertising(), web_server.stop());
        });
        CommandOutcome::Accepted
    }

    pub async fn start_fake_bpm(&self) -> FakeBpmStatus {
        let mut slot = self.fake_generator.lock().await;
        if slot.as_ref().is_some_and(FakeBpmHandle::is_running) {
            return FakeBpmStatus::AlreadyRunning;
        }
        self.spawn_generator(&mut slot).await
    }

    pub async fn stop_fake_bpm(&self) -> FakeBpmStatus {
        if let Some(handle) = self.fake_generator.lock().await.take() {
            handle.stop();
        }
        FakeBpmStatus::Stopped
    }

    pub async fn toggle_fake_bpm(&self) -> FakeBpmStatus {
        let mut slot = self.fake_generator.lock().await;
        match slot.take() {
            Some(handle) if handle.is_running() => {
                handle.stop();
                FakeBpmStatus::Stopped
            }
            _ => self.spawn_generator(&mut slot).await,
        }
    }

    pub async fn is_fake_bpm_running(&self) -> bool {
        self.fake_generator
            .lock()
            .await
            .as_ref()
            .is_some_and(FakeBpmHandle::is_running)
    }

    async fn spawn_generator(&self, slot: &mut Option<FakeBpmHandle>) -> FakeBpmStatus {
        let current = self.services_state.borrow().clone();
        if current != ServicesState::Started {
            info!("Fake BPM needs running services, currently {}", current);
            return FakeBpmStatus::NotPermitted;
        }
        let Some(endpoint) = self.web_server.endpoint().await else {
            warn!("Web server has no endpoint while services are started");
            return FakeBpmStatus::NotPermitted;
        };
        *slot = Some(FakeBpmGenerator::new(endpoint, &self.fake_bpm).spawn());
        FakeBpmStatus::Started
    }

    pub async fn get_hardware_state(&self) -> HardwareState {
        self.peripheral.get_hardware_state().await
    }

    pub fn permissions_granted(&self) -> bool {
        self.peripheral.permissions_granted()
    }

    pub fn get_missing_permissions(&self) -> Vec<Permission> {
        self.peripheral.get_missing_permissions()
    }
}

impl Drop for ServiceCoordinator {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Forward one reading to the peripheral, but only while `Started`.
pub async fn forward_reading(
    state: &ServicesState,
    reading: &BpmReading,
    peripheral: &GattPeripheralServer,
) -> bool {
    if *state != ServicesState::Started {
        trace!(
            "Dropping BPM {} (#{}) while {}",
            reading.value,
            reading.sequence_number,
            state
        );
        return false;
    }

    let accepted = peripheral.notify_heart_rate(reading.value).await;
    if !accepted {
        debug!(
            "BPM {} (#{}) not forwarded to any central",
            reading.value, reading.sequence_number
        );
    }
    accepted
}

/// Sole writer of `ServicesState` and of the state machine's memory.
async fn run_state_actor(
    mut advertising: watch::Receiver<AdvertisingState>,
    mut web_server_state: watch::Receiver<WebServerState>,
    services_tx: watch::Sender<ServicesState>,
    peripheral: Arc<GattPeripheralServer>,
    web_server: Arc<HttpBridgeServer>,
) {
    let mut machine = ServicesStateMachine::new();
    loop {
        let transition = {
            let advertising_now = advertising.borrow_and_update().clone();
            let web_now = web_server_state.borrow_and_update().clone();
            machine.advance(&advertising_now, &web_now)
        };

        if let Some(cascade) = transition.cascade {
            dispatch_cascade(cascade, peripheral.clone(), web_server.clone());
        }

        let next = transition.state;
        services_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!("Services state: {} -> {}", current, next);
            *current = next;
            true
        });

        tokio::select! {
            changed = advertising.changed() => if changed.is_err() { break },
            changed = web_server_state.changed() => if changed.is_err() { break },
        }
    }
    debug!("Services state actor finished");
}

/// Stop whichever half is still up; never awaited by the actor.
fn dispatch_cascade(
    cascade: CascadeStop,
    peripheral: Arc<GattPeripheralServer>,
    web_server: Arc<HttpBridgeServer>,
) {
    info!(
        "Cascading stop (advertising: {}, web server: {})",
        cascade.advertising, cascade.web_server
    );
    tokio::spawn(async move {
        let stop_advertising = async {
            if cascade.advertising {
                peripheral.stop_advertising().await;
            }
        };
        let stop_web_server = async {
            if cascade.web_server {
                web_server.stop().await;
            }
        };
        tokio::join!(stop_advertising, stop_web_server);
    });
}

async fn run_bpm_bridge(
    mut readings: broadcast::Receiver<BpmReading>,
    mut services: watch::Receiver<ServicesState>,
    peripheral: Arc<GattPeripheralServer>,
    last_bpm: watch::Sender<Option<i32>>,
) {
    loop {
        tokio::select! {
            reading = readings.recv() => match reading {
                Ok(reading) => {
                    let state = services.borrow().clone();
                    forward_reading(&state, &reading, &peripheral).await;
                    if state == ServicesState::Started {
                        last_bpm.send_replace(Some(reading.value));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("BPM bridge lagged, {} readings skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            changed = services.changed() => {
                if changed.is_err() {
                    break;
                }
                if *services.borrow_and_update() != ServicesState::Started {
                    last_bpm.send_if_modified(|bpm| bpm.take().is_some());
                }
            }
        }
    }
    debug!("BPM bridge finished");
}

/// The fake generator only lives while services are `Started`, however they
/// leave it.
async fn run_fake_bpm_guard(
    mut services: watch::Receiver<ServicesState>,
    fake_generator: Arc<Mutex<Option<FakeBpmHandle>>>,
) {
    while services.changed().await.is_ok() {
        let state = services.borrow_and_update().clone();
        if state == ServicesState::Started {
            continue;
        }
        if let Some(handle) = fake_generator.lock().await.take() {
            info!("Services {}, cancelling fake BPM generator", state);
            handle.stop();
        }
    }
}

async fn run_app_state(
    mut services: watch::Receiver<ServicesState>,
    mut client_connected: watch::Receiver<bool>,
    mut last_bpm: watch::Receiver<Option<i32>>,
    app_tx: watch::Sender<AppState>,
) {
    loop {
        let services_state = services.borrow_and_update().clone();
        let bpm = *last_bpm.borrow_and_update();
        let next = AppState {
            bpm: if services_state == ServicesState::Started {
                bpm
            } else {
                None
            },
            is_client_connected: *client_connected.borrow_and_update(),
            services_state,
        };
        app_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });

        tokio::select! {
            changed = services.changed() => if changed.is_err() { break },
            changed = client_connected.changed() => if changed.is_err() { break },
            changed = last_bpm.changed() => if changed.is_err() { break },
        }
    }
    debug!("App state publisher finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::BridgeError;
    use crate::infrastructure::bluetooth::simulated::SimulatedRadio;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn coordinator(radio: Arc<SimulatedRadio>) -> ServiceCoordinator {
        let peripheral = Arc::new(GattPeripheralServer::new(radio, "test"));
        let web_server = Arc::new(HttpBridgeServer::new(HttpBridgeConfig {
            port: 0,
            grace_period: Duration::from_millis(200),
            stop_timeout: Duration::from_secs(1),
            ..HttpBridgeConfig::default()
        }));
        ServiceCoordinator::new(
            peripheral,
            web_server,
            FakeBpmSettings {
                min: 90,
                max: 95,
                step: 1,
                interval_ms: 20,
            },
        )
    }

    async fn wait_for(coordinator: &ServiceCoordinator, check: impl Fn(&ServicesState) -> bool) {
        let mut rx = coordinator.services_state();
        tokio::time::timeout(WAIT, rx.wait_for(|s| check(s)))
            .await
            .unwrap()
            .unwrap();
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn post_bpm(coordinator: &ServiceCoordinator, bpm: i32) {
        let url = coordinator.web_server().endpoint().await.unwrap();
        reqwest::Client::new()
            .post(url)
            .json(&serde_json::json!({ "bpm": bpm }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_and_stop_round_trip() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        assert_eq!(coordinator.app_state().borrow().services_state, ServicesState::Stopped);

        assert_eq!(coordinator.start_services().await, CommandOutcome::Accepted);
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
        assert_eq!(
            coordinator.start_services().await,
            CommandOutcome::AlreadyInState(ServicesState::Started)
        );

        assert_eq!(coordinator.stop_services().await, CommandOutcome::Accepted);
        wait_for(&coordinator, |s| *s == ServicesState::Stopped).await;
        assert!(!radio.is_advertising());
        assert!(coordinator.web_server().local_addr().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_rejected_when_stopped() {
        let coordinator = coordinator(Arc::new(SimulatedRadio::new()));
        assert_eq!(
            coordinator.stop_services().await,
            CommandOutcome::AlreadyInState(ServicesState::Stopped)
        );
    }

    #[tokio::test]
    async fn test_gate_blocks_unless_started() {
        let radio = Arc::new(SimulatedRadio::new());
        let peripheral = GattPeripheralServer::new(radio.clone(), "test");
        peripheral.start_advertising().await;
        radio.connect_central("central-a").await;
        let mut connected = peripheral.client_connected();
        tokio::time::timeout(WAIT, connected.wait_for(|c| *c))
            .await
            .unwrap()
            .unwrap();

        let reading = BpmReading {
            value: 77,
            sequence_number: 1,
        };
        for state in [ServicesState::Stopped, ServicesState::Starting] {
            assert!(!forward_reading(&state, &reading, &peripheral).await);
        }
        assert!(radio.notifications().is_empty());

        assert!(forward_reading(&ServicesState::Started, &reading, &peripheral).await);
        let sent = radio.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, vec![0x00, 77]);
    }

    #[tokio::test]
    async fn test_posted_bpm_reaches_central() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;

        radio.connect_central("central-a").await;
        let mut app = coordinator.app_state();
        tokio::time::timeout(WAIT, app.wait_for(|a| a.is_client_connected))
            .await
            .unwrap()
            .unwrap();

        post_bpm(&coordinator, 88).await;
        wait_until(|| !radio.notifications().is_empty()).await;
        assert_eq!(
            radio.notifications(),
            vec![(crate::domain::models::ClientId::new("central-a"), vec![0x00, 88])]
        );
        tokio::time::timeout(WAIT, app.wait_for(|a| a.bpm == Some(88)))
            .await
            .unwrap()
            .unwrap();

        coordinator.stop_services().await;
        tokio::time::timeout(
            WAIT,
            app.wait_for(|a| a.services_state == ServicesState::Stopped && !a.is_client_connected),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(app.borrow().bpm, None);
    }

    #[tokio::test]
    async fn test_out_of_range_post_is_not_forwarded() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
        radio.connect_central("central-a").await;
        let mut connected = coordinator.peripheral().client_connected();
        tokio::time::timeout(WAIT, connected.wait_for(|c| *c))
            .await
            .unwrap()
            .unwrap();

        post_bpm(&coordinator, 300).await;
        post_bpm(&coordinator, 61).await;
        wait_until(|| !radio.notifications().is_empty()).await;
        assert_eq!(radio.notifications()[0].1, vec![0x00, 61]);
        assert_eq!(radio.notifications().len(), 1);
        assert_eq!(coordinator.services_state().borrow().clone(), ServicesState::Started);
    }

    #[tokio::test]
    async fn test_advertising_failure_then_recovery() {
        let radio = Arc::new(SimulatedRadio::new());
        radio.fail_advertising(Some("busy"));
        let coordinator = coordinator(radio.clone());

        coordinator.start_services().await;
        wait_for(&coordinator, |s| {
            *s == ServicesState::Error(BridgeError::AdvertisingFailure("busy".into()))
        })
        .await;
        assert!(matches!(
            coordinator.start_services().await,
            CommandOutcome::AlreadyInState(ServicesState::Error(_))
        ));

        assert_eq!(coordinator.stop_services().await, CommandOutcome::Accepted);
        wait_for(&coordinator, |s| *s == ServicesState::Stopped).await;

        radio.fail_advertising(None);
        assert_eq!(coordinator.start_services().await, CommandOutcome::Accepted);
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
    }

    #[tokio::test]
    async fn test_half_stop_cascades_to_web_server() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;

        // The radio stack drops the advertisement on its own.
        radio.stop_advertising().await.unwrap();

        wait_for(&coordinator, |s| *s == ServicesState::Stopped).await;
        assert!(!coordinator.web_server().state().borrow().is_ready);
        assert!(coordinator.web_server().local_addr().await.is_none());
    }

    #[tokio::test]
    async fn test_fake_bpm_lifecycle() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        assert_eq!(coordinator.toggle_fake_bpm().await, FakeBpmStatus::NotPermitted);

        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
        radio.connect_central("central-a").await;
        let mut app = coordinator.app_state();
        tokio::time::timeout(WAIT, app.wait_for(|a| a.is_client_connected))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(coordinator.toggle_fake_bpm().await, FakeBpmStatus::Started);
        assert_eq!(coordinator.start_fake_bpm().await, FakeBpmStatus::AlreadyRunning);
        assert!(coordinator.is_fake_bpm_running().await);

        wait_until(|| radio.notifications().len() >= 2).await;
        let first: Vec<Vec<u8>> = radio
            .notifications()
            .into_iter()
            .take(2)
            .map(|(_, payload)| payload)
            .collect();
        assert_eq!(first, vec![vec![0x00, 90], vec![0x00, 91]]);

        assert_eq!(coordinator.toggle_fake_bpm().await, FakeBpmStatus::Stopped);
        assert!(!coordinator.is_fake_bpm_running().await);

        coordinator.start_fake_bpm().await;
        coordinator.stop_services().await;
        assert!(!coordinator.is_fake_bpm_running().await);
        wait_for(&coordinator, |s| *s == ServicesState::Stopped).await;
    }

    async fn wait_fake_stopped(coordinator: &ServiceCoordinator) {
        tokio::time::timeout(WAIT, async {
            while coordinator.is_fake_bpm_running().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_fake_bpm_cancelled_when_services_drop_out() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
        assert_eq!(coordinator.toggle_fake_bpm().await, FakeBpmStatus::Started);

        // Advertising ends without a stop request; the cascade takes the rest down.
        radio.stop_advertising().await.unwrap();
        wait_for(&coordinator, |s| *s == ServicesState::Stopped).await;
        wait_fake_stopped(&coordinator).await;

        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
        assert!(!coordinator.is_fake_bpm_running().await);
        assert_eq!(coordinator.toggle_fake_bpm().await, FakeBpmStatus::Started);
        coordinator.stop_services().await;
    }

    #[tokio::test]
    async fn test_fake_bpm_cancelled_on_error() {
        let radio = Arc::new(SimulatedRadio::new());
        let coordinator = coordinator(radio.clone());
        coordinator.start_services().await;
        wait_for(&coordinator, |s| *s == ServicesState::Started).await;
        assert_eq!(coordinator.start_fake_bpm().await, FakeBpmStatus::Started);

        radio.abort_advertising("link layer reset").await;
        wait_for(&coordinator, |s| matches!(s, ServicesState::Error(_))).await;
        wait_fake_stopped(&coordinator).await;
    }

    #[tokio::test]
    async fn test_stop_while_start_report_pending_converges() {
        let taken = std::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        let radio = Arc::new(SimulatedRadio::new());
        radio.delay_start_report(Some(Duration::from_millis(200)));
        let peripheral = Arc::new(GattPeripheralServer::new(radio.clone(), "test"));
        let web_server = Arc::new(HttpBridgeServer::new(HttpBridgeConfig {
            port,
            ..HttpBridgeConfig::default()
        }));
        let coordinator = ServiceCoordinator::new(peripheral, web_server, FakeBpmSettings::default());

        coordinator.start_services().await;
        wait_for(&coordinator, |s| {
            matches!(s, ServicesState::Error(BridgeError::WebServerBindFailure(_)))
        })
        .await;
        assert_eq!(coordinator.stop_services().await, CommandOutcome::Accepted);
        wait_for(&coordinator, |s| *s == ServicesState::Stopped).await;

        // Outlive the late start report.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(coordinator.services_state().borrow().clone(), ServicesState::Stopped);
        assert_eq!(
            *coordinator.peripheral().advertising_state().borrow(),
            AdvertisingState::Stopped
        );
        assert!(!radio.is_advertising());
        assert_eq!(coordinator.start_services().await, CommandOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_capability_queries() {
        let radio = Arc::new(SimulatedRadio::new());
        radio.set_missing_permissions(vec![Permission::BluetoothConnect]);
        radio.set_powered(false);
        let coordinator = coordinator(radio);

        assert!(!coordinator.permissions_granted());
        assert_eq!(
            coordinator.get_missing_permissions(),
            vec![Permission::BluetoothConnect]
        );
        assert_eq!(coordinator.get_hardware_state().await, HardwareState::Disabled);
    }
}

//! Node server lifecycle.
//!
//! # Startup
//! validate config → resolve realm → mount handlers → tune and bind the
//! listener → serve → startup hooks → heartbeat monitor → optionally wait
//!
//! # Shutdown
//! shutdown hooks → cancel monitor → close pooled sockets → halt listener.
//! Every step runs even if an earlier one failed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::config::settings::ProcessSettings;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::NodeConfig;
use crate::handlers::root::StatusState;
use crate::handlers::{self, HandlerDescriptor, MountError};
use crate::health::{HeartbeatMonitor, HttpStatusProbe, MonitorSchedule, StatusProbe};
use crate::http::{build_router, HttpServer, ServingHandle};
use crate::lifecycle::hooks::{Hooks, LifecycleEvent, LifecycleHook};
use crate::lifecycle::shutdown::{ShutdownReport, ShutdownStep, StepOutcome};
use crate::net::{Listener, ListenerError, ListenerTuning};
use crate::security::{resolve_realm, Authenticator, LoginModule, LoginModules, SecurityRealm};
use crate::state::{ServerInfo, SharedState};

/// Why a server could not start. Nothing is left bound on error.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server is already running")]
    AlreadyRunning,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What callers can observe about a running server.
#[derive(Debug, Clone)]
struct RunningInfo {
    local_addr: SocketAddr,
    realm: SecurityRealm,
}

/// Resources owned while the server runs.
struct RunningServer {
    info: ServerInfo,
    serving: ServingHandle,
    monitor: HeartbeatMonitor,
}

/// A cluster node server: authenticated HTTP endpoints plus peer heartbeats.
pub struct NodeServer {
    config: NodeConfig,
    shared: SharedState,
    descriptors: Vec<HandlerDescriptor>,
    hooks: Hooks,
    login_modules: LoginModules,
    settings: ProcessSettings,
    probe: Arc<dyn StatusProbe>,
    running: Mutex<Option<RunningServer>>,
    status: watch::Sender<Option<RunningInfo>>,
}

impl NodeServer {
    /// Server over `shared`, probing peers over HTTP and reading tuning
    /// from the process environment.
    pub fn new(config: NodeConfig, shared: SharedState) -> Self {
        let probe = HttpStatusProbe::new(
            config.heartbeat.status_path.clone(),
            Duration::from_millis(config.heartbeat.probe_timeout_ms),
        );
        let (status, _) = watch::channel(None);

        Self {
            config,
            shared,
            descriptors: Vec::new(),
            hooks: Hooks::new(),
            login_modules: LoginModules::new(),
            settings: ProcessSettings::from_env(),
            probe: Arc::new(probe),
            running: Mutex::new(None),
            status,
        }
    }

    pub fn with_handler(mut self, descriptor: HandlerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn with_handlers(
        mut self,
        descriptors: impl IntoIterator<Item = HandlerDescriptor>,
    ) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn with_login_module(
        mut self,
        name: impl Into<String>,
        module: Arc<dyn LoginModule>,
    ) -> Self {
        self.login_modules.register(name, module);
        self
    }

    /// Replace the process settings snapshot.
    pub fn with_settings(mut self, settings: ProcessSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn StatusProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.status.borrow().as_ref().map(|s| s.local_addr)
    }

    /// Realm chosen at the last successful start, while running.
    pub fn realm(&self) -> Option<SecurityRealm> {
        self.status.borrow().as_ref().map(|s| s.realm.clone())
    }

    /// Start serving. Returns the bound address once accepting, or after the
    /// server stops again when `server.join` is set.
    pub async fn start(&self) -> Result<SocketAddr, StartupError> {
        let mut slot = self.running.lock().await;
        if slot.is_some() {
            return Err(StartupError::AlreadyRunning);
        }

        validate_config(&self.config).map_err(StartupError::Config)?;
        let server = &self.config.server;

        let hint = self.config.node.as_ref().map(|node| node.credentials());
        let realm = resolve_realm(server, hint.as_ref(), &self.settings);
        let authenticator = Arc::new(Authenticator::from_realm(&realm, &self.login_modules));

        let mounted = handlers::mount(
            &self.descriptors,
            &self.shared,
            &[self.config.static_files.mount_path.as_str()],
        )?;

        let tuning = ListenerTuning::from_settings(&self.settings);
        let listener = Listener::bind(
            &server.hostname,
            server.port,
            self.config.listener.max_connections,
            tuning,
        )
        .await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Accept)?;

        let info = ServerInfo::new(server.hostname.clone(), local_addr.port());
        let status = StatusState {
            shared: self.shared.clone(),
            info: info.clone(),
            handlers: Arc::new(mounted.summaries()),
        };
        let router = build_router(
            &mounted,
            status,
            &self.config.static_files,
            authenticator,
            Duration::from_secs(self.config.listener.request_timeout_secs),
        );
        let serving = HttpServer::new(router, listener).spawn()?;

        tracing::info!(
            address = %local_addr,
            realm = realm.kind(),
            handlers = mounted.len(),
            peers = self.shared.detections.len(),
            "Node server started"
        );

        self.hooks.invoke(LifecycleEvent::Startup, &info).await;

        let mut monitor = HeartbeatMonitor::new(
            self.shared.detections.clone(),
            self.probe.clone(),
            MonitorSchedule::from(&self.config.heartbeat),
        );
        monitor.start();

        *slot = Some(RunningServer {
            info,
            serving,
            monitor,
        });
        self.status.send_replace(Some(RunningInfo { local_addr, realm }));
        drop(slot);

        if server.join {
            self.join().await;
        }

        Ok(local_addr)
    }

    /// Wait until the server is not running.
    pub async fn join(&self) {
        let mut status = self.status.subscribe();
        let _ = status.wait_for(|s| s.is_none()).await;
    }

    /// Tear the server down. Never fails; see the report for step outcomes.
    pub async fn stop(&self) -> ShutdownReport {
        let mut slot = self.running.lock().await;
        let Some(running) = slot.take() else {
            tracing::debug!("Stop requested but server is not running");
            return ShutdownReport::all_skipped();
        };

        tracing::info!(port = running.info.port, "Node server stopping");
        let RunningServer {
            info,
            serving,
            mut monitor,
        } = running;
        let mut report = ShutdownReport::new();

        let hooks = if self.hooks.is_empty() {
            StepOutcome::Skipped
        } else {
            let failures = self.hooks.invoke(LifecycleEvent::Shutdown, &info).await;
            if failures.is_empty() {
                StepOutcome::Completed
            } else {
                StepOutcome::Failed(
                    failures
                        .iter()
                        .map(|(name, e)| format!("{name}: {e}"))
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            }
        };
        report.record(ShutdownStep::Hooks, hooks);

        let monitor_outcome = if !monitor.is_running() {
            StepOutcome::Skipped
        } else {
            match monitor.cancel().await {
                Ok(()) => StepOutcome::Completed,
                Err(e) => StepOutcome::Failed(e.to_string()),
            }
        };
        report.record(ShutdownStep::Monitor, monitor_outcome);

        let sockets = match self.shared.sockets.close_all().await {
            Ok(0) => StepOutcome::Skipped,
            Ok(closed) => {
                tracing::info!(closed, "Closed pooled sockets");
                StepOutcome::Completed
            }
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        report.record(ShutdownStep::Sockets, sockets);

        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        let listener = match serving.halt(grace).await {
            Ok(()) => StepOutcome::Completed,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        report.record(ShutdownStep::Listener, listener);

        self.status.send_replace(None);
        drop(slot);

        tracing::info!(clean = report.is_clean(), "Node server stopped");
        report
    }
}

impl std::fmt::Debug for NodeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeServer")
            .field("hostname", &self.config.server.hostname)
            .field("port", &self.config.server.port)
            .field("handlers", &self.descriptors)
            .field("hooks", &self.hooks)
            .field("running", &self.is_running())
            .finish()
    }
}

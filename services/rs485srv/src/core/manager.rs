//! Protocol manager
//!
//! Public surface of the adapter. Device work (initialize, process, heartbeat,
//! build) is submitted to the bounded worker pool and answered through a
//! [`TaskHandle`]; bookkeeping queries run inline on the caller's task.
//!
//! Expected failures never reject the handle. They come back as a result with
//! `success == false` and a mapped [`ProtocolErrorResponse`], after the failure
//! has been counted, logged and reported to the communication log sink.
//!
//! All methods must be called from within a Tokio runtime.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use errors::{log_error, ErrorInfo};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::connection::DeviceConnection;
use super::error_mapping::{self, ProtocolErrorCode, ProtocolErrorResponse};
use super::handlers::handle_business_data;
use super::health;
use super::log_sink::{dispatch, CommAction, CommLogEntry, CommLogSink, TracingLogSink};
use super::permission::check_operation;
use super::registry::ConnectionRegistry;
use super::statistics::{ops, Statistics};
use super::types::{
    AdapterInfo, AdapterStatus, BuildResult, BusinessOutcome, ConnectionState, DeviceId,
    DeviceInfo, DeviceStatus, HeartbeatResult, InitResult, PerformanceStatistics,
    PermissionDecision, ProcessResult, RegistrationResult,
};
use crate::config::{AppConfig, SerialConfig, SerialConfigPatch};
use crate::error::{BuildError, ConnectionError, Result, Rs485Error};
use crate::protocols::rs485::constants::{
    CONNECTION_PREFIX, MANUFACTURER, PROTOCOL_TYPE, PROTOCOL_VERSION, REGISTRATION_PREFIX,
};
use crate::protocols::rs485::{
    build_frame, decode_business_data, encode_business_data, parse_frame, validate_frame,
    BusinessData, DeviceModelCatalog, ParseMode, StaticModelCatalog,
};
use crate::runtime::supervisor::sweep_heartbeat_timeouts;
use crate::runtime::{Supervisor, SupervisorConfig, SupervisorContext, TaskHandle, WorkerPool};

pub const DEFAULT_WORKER_POOL_SIZE: usize = 20;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn connection_id(device_id: DeviceId) -> String {
    format!("{}-{}", CONNECTION_PREFIX, device_id)
}

/// Builder for [`ProtocolManager`]
pub struct ProtocolManagerBuilder {
    worker_pool_size: usize,
    parse_mode: ParseMode,
    supervisor: SupervisorConfig,
    shutdown_grace: Duration,
    clock: Option<Arc<dyn Clock>>,
    log_sink: Option<Arc<dyn CommLogSink>>,
    catalog: Option<Arc<dyn DeviceModelCatalog>>,
}

impl Default for ProtocolManagerBuilder {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            parse_mode: ParseMode::default(),
            supervisor: SupervisorConfig::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            clock: None,
            log_sink: None,
            catalog: None,
        }
    }
}

impl ProtocolManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool size, parse mode, supervisor timings and grace period from the service config
    pub fn from_config(config: &AppConfig) -> Self {
        Self::default()
            .worker_pool_size(config.service.worker_pool_size)
            .parse_mode(config.protocol.parse_mode)
            .supervisor_config(config.supervisor_config())
            .shutdown_grace(config.shutdown_grace())
    }

    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn supervisor_config(mut self, config: SupervisorConfig) -> Self {
        self.supervisor = config;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn CommLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn DeviceModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> ProtocolManager {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let started_at_ms = clock.now_millis();
        let inner = ManagerInner {
            registry: Arc::new(ConnectionRegistry::new()),
            statistics: Arc::new(Statistics::new()),
            log_sink: self.log_sink.unwrap_or_else(|| Arc::new(TracingLogSink)),
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(StaticModelCatalog::default())),
            clock,
            parse_mode: self.parse_mode,
            started_at_ms,
        };

        ProtocolManager {
            inner: Arc::new(inner),
            pool: WorkerPool::new(self.worker_pool_size),
            supervisor_config: self.supervisor,
            supervisor: Mutex::new(None),
            shutdown_grace: self.shutdown_grace,
        }
    }
}

pub struct ProtocolManager {
    inner: Arc<ManagerInner>,
    pool: WorkerPool,
    supervisor_config: SupervisorConfig,
    supervisor: Mutex<Option<Supervisor>>,
    shutdown_grace: Duration,
}

impl ProtocolManager {
    pub fn builder() -> ProtocolManagerBuilder {
        ProtocolManagerBuilder::new()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the supervisor tasks. Calling it again is a no-op.
    pub fn start(&self) {
        let mut supervisor = self.supervisor.lock();
        if supervisor.is_some() {
            debug!("Protocol manager already started");
            return;
        }
        *supervisor = Some(Supervisor::start(
            self.inner.supervisor_context(),
            self.supervisor_config.clone(),
        ));
        info!("RS485 protocol manager started ({} workers)", self.pool.size());
    }

    pub fn is_started(&self) -> bool {
        self.supervisor.lock().is_some()
    }

    /// Disconnect every device, stop the supervisors and drain the worker pool.
    ///
    /// Returns false when in-flight work had to be cancelled after the grace period.
    pub async fn shutdown(&self) -> bool {
        let disconnected = self.inner.registry.disconnect_all();
        info!("Shutting down protocol manager, {} device(s) disconnected", disconnected);

        let supervisor = self.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            supervisor.stop().await;
        }

        let drained = self.pool.shutdown(self.shutdown_grace).await;
        info!("Protocol manager stopped");
        drained
    }

    // ------------------------------------------------------------------
    // Device operations (worker pool)
    // ------------------------------------------------------------------

    pub fn initialize_device(
        &self,
        device_id: DeviceId,
        device_info: DeviceInfo,
        config: SerialConfigPatch,
    ) -> TaskHandle<InitResult> {
        let inner = Arc::clone(&self.inner);
        self.pool
            .spawn(async move { inner.initialize_device(device_id, &device_info, &config) })
    }

    pub fn process_device_message(
        &self,
        device_id: DeviceId,
        raw: impl Into<Bytes>,
    ) -> TaskHandle<ProcessResult> {
        let inner = Arc::clone(&self.inner);
        let raw = raw.into();
        self.pool
            .spawn(async move { inner.process_message(device_id, raw) })
    }

    /// Hex-encoded variant of [`process_device_message`](Self::process_device_message).
    /// Whitespace is ignored; an invalid digit fails with a parse error.
    pub fn process_device_message_hex(
        &self,
        device_id: DeviceId,
        hex: impl Into<String>,
    ) -> TaskHandle<ProcessResult> {
        let inner = Arc::clone(&self.inner);
        let hex = hex.into();
        self.pool
            .spawn(async move { inner.process_hex(device_id, &hex) })
    }

    pub fn process_device_heartbeat(&self, device_id: DeviceId) -> TaskHandle<HeartbeatResult> {
        let inner = Arc::clone(&self.inner);
        self.pool.spawn(async move { inner.heartbeat(device_id) })
    }

    pub fn build_device_response(
        &self,
        device_id: DeviceId,
        function_code: u8,
        data: BusinessData,
    ) -> TaskHandle<BuildResult> {
        let inner = Arc::clone(&self.inner);
        self.pool
            .spawn(async move { inner.build_response(device_id, function_code, &data) })
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    pub fn validate_device_permission(&self, device_id: DeviceId, operation: &str) -> PermissionDecision {
        let connection = self.inner.registry.get(device_id);
        check_operation(connection.as_deref(), operation)
    }

    /// Drop the device's connection record. Its protocol config is kept.
    pub fn disconnect_device(&self, device_id: DeviceId) -> bool {
        let Some(connection) = self.inner.registry.remove(device_id) else {
            debug!("Disconnect requested for unknown device {}", device_id);
            return false;
        };
        connection.disconnect();
        info!("Device {} disconnected", device_id);
        self.inner.report(CommLogEntry::new(
            device_id,
            CommAction::DisconnectDevice,
            "device disconnected",
            self.inner.now(),
        ));
        true
    }

    pub fn set_write_enabled(&self, device_id: DeviceId, enabled: bool) -> bool {
        match self.inner.registry.get(device_id) {
            Some(connection) => {
                connection.set_write_enabled(enabled);
                debug!("Device {} write_enabled={}", device_id, enabled);
                true
            },
            None => false,
        }
    }

    pub fn get_protocol_config(&self, device_id: DeviceId) -> Option<SerialConfig> {
        self.inner.registry.config(device_id)
    }

    /// Change only the supplied fields. Rejected while the device is connected.
    pub fn update_protocol_config(&self, device_id: DeviceId, patch: &SerialConfigPatch) -> Result<SerialConfig> {
        match self.inner.registry.update_config(device_id, patch) {
            Ok(config) => {
                info!("Device {} protocol config updated", device_id);
                Ok(config)
            },
            Err(e) => {
                log_error(&e, &format!("Device {} config update", device_id));
                Err(e)
            },
        }
    }

    pub fn get_device_status(&self, device_id: DeviceId) -> DeviceStatus {
        match self.inner.registry.get(device_id) {
            Some(connection) => {
                let online = connection.is_connected();
                DeviceStatus {
                    device_id,
                    online,
                    state: if online {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::Disconnected
                    },
                    connection_id: Some(connection_id(device_id)),
                    snapshot: Some(connection.snapshot(self.inner.now())),
                }
            },
            None => DeviceStatus {
                device_id,
                online: false,
                state: ConnectionState::Uninitialized,
                connection_id: None,
                snapshot: None,
            },
        }
    }

    pub fn get_performance_statistics(&self) -> PerformanceStatistics {
        let registry = &self.inner.registry;
        let statistics = &self.inner.statistics;
        let message_count = statistics.total_messages();
        let error_count = statistics.total_errors();
        let error_rate = if message_count == 0 {
            0.0
        } else {
            error_count as f64 / message_count as f64 * 100.0
        };

        PerformanceStatistics {
            total_connections: registry.len(),
            active_connections: registry.active_count(),
            message_count,
            error_count,
            error_rate,
            uptime_ms: (self.inner.now() - self.inner.started_at_ms).max(0),
            operations: statistics.snapshot(),
        }
    }

    pub fn get_adapter_status(&self) -> AdapterStatus {
        let registry = &self.inner.registry;
        let total = registry.len();
        if total == 0 {
            AdapterStatus::Idle
        } else if registry.active_count() == total {
            AdapterStatus::Running
        } else {
            AdapterStatus::Partial
        }
    }

    /// Check a device identity against the model catalog without connecting it
    pub fn handle_device_registration(&self, device_id: DeviceId, device_info: DeviceInfo) -> RegistrationResult {
        let now = self.inner.now();
        if self.inner.catalog.is_supported(&device_info.device_model) {
            info!(
                "Device {} registered as {}",
                device_id, device_info.device_model
            );
            self.inner.report(CommLogEntry::new(
                device_id,
                CommAction::Register,
                format!("registered model {}", device_info.device_model),
                now,
            ));
            return RegistrationResult {
                device_id,
                success: true,
                registration_id: Some(format!("{}-{}", REGISTRATION_PREFIX, device_id)),
                device_info,
                protocol_type: PROTOCOL_TYPE,
                registered_at_ms: now,
                error: None,
            };
        }

        let err = Rs485Error::from(ConnectionError::UnsupportedModel(
            device_info.device_model.clone(),
        ));
        log_error(&err, &format!("Device {} registration", device_id));
        self.inner.report(
            CommLogEntry::new(device_id, CommAction::RegisterError, "registration rejected", now)
                .with_error(err.to_string()),
        );
        RegistrationResult {
            device_id,
            success: false,
            registration_id: None,
            device_info,
            protocol_type: PROTOCOL_TYPE,
            registered_at_ms: now,
            error: Some(error_mapping::from_error(&err, Some(device_id), now)),
        }
    }

    pub fn handle_protocol_error(
        &self,
        system_code: &str,
        message: &str,
        device_id: Option<DeviceId>,
    ) -> ProtocolErrorResponse {
        error_mapping::map_error(system_code, message, device_id, self.inner.now())
    }

    pub fn error_code_mapping(&self) -> BTreeMap<ProtocolErrorCode, ErrorInfo> {
        error_mapping::error_code_mapping()
    }

    pub fn supported_device_models(&self) -> Vec<String> {
        self.inner.catalog.supported_models()
    }

    pub fn is_device_model_supported(&self, model: &str) -> bool {
        self.inner.catalog.is_supported(model)
    }

    pub fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            protocol_type: PROTOCOL_TYPE,
            manufacturer: MANUFACTURER,
            version: PROTOCOL_VERSION,
            supported_models: self.inner.catalog.supported_models().len(),
        }
    }

    /// Run one heartbeat sweep now, independent of the supervisor schedule
    pub fn run_heartbeat_sweep(&self) -> Vec<DeviceId> {
        sweep_heartbeat_timeouts(
            &self.inner.supervisor_context(),
            self.supervisor_config.heartbeat_timeout_ms,
        )
    }

    pub fn reset_statistics(&self) {
        self.inner.statistics.reset();
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.inner.statistics
    }
}

/// State shared with pooled tasks
struct ManagerInner {
    registry: Arc<ConnectionRegistry>,
    statistics: Arc<Statistics>,
    clock: Arc<dyn Clock>,
    log_sink: Arc<dyn CommLogSink>,
    catalog: Arc<dyn DeviceModelCatalog>,
    parse_mode: ParseMode,
    started_at_ms: i64,
}

impl ManagerInner {
    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    fn report(&self, entry: CommLogEntry) {
        dispatch(&self.log_sink, entry);
    }

    fn supervisor_context(&self) -> SupervisorContext {
        SupervisorContext {
            registry: Arc::clone(&self.registry),
            statistics: Arc::clone(&self.statistics),
            clock: Arc::clone(&self.clock),
            log_sink: Arc::clone(&self.log_sink),
        }
    }

    /// Count, log and report a failed operation; returns the mapped error
    fn fail(
        &self,
        device_id: DeviceId,
        err: &Rs485Error,
        operation: &'static str,
        action: CommAction,
    ) -> ProtocolErrorResponse {
        let now = self.now();
        self.statistics.record_error(operation);
        if let Some(connection) = self.registry.get(device_id) {
            connection.record_error();
        }
        log_error(err, &format!("Device {} {} failed", device_id, operation));
        self.report(
            CommLogEntry::new(device_id, action, format!("{} failed", operation), now)
                .with_error(err.to_string()),
        );
        error_mapping::from_error(err, Some(device_id), now)
    }

    // ------------------------------------------------------------------
    // initialize
    // ------------------------------------------------------------------

    fn initialize_device(&self, device_id: DeviceId, info: &DeviceInfo, patch: &SerialConfigPatch) -> InitResult {
        match self.try_initialize(device_id, info, patch) {
            Ok(connection) => {
                self.statistics.record_message(ops::INITIALIZE);
                info!(
                    "Device {} ({}) connected, baud={} addr={}",
                    device_id,
                    info.device_model,
                    connection.config().baud_rate,
                    connection.config().device_address
                );
                self.report(CommLogEntry::new(
                    device_id,
                    CommAction::Initialize,
                    format!("initialized model {}", info.device_model),
                    self.now(),
                ));
                InitResult {
                    device_id,
                    success: true,
                    connection_id: Some(connection_id(device_id)),
                    protocol_type: PROTOCOL_TYPE,
                    error: None,
                }
            },
            Err(e) => InitResult {
                device_id,
                success: false,
                connection_id: None,
                protocol_type: PROTOCOL_TYPE,
                error: Some(self.fail(device_id, &e, ops::INITIALIZE, CommAction::InitializeError)),
            },
        }
    }

    fn try_initialize(
        &self,
        device_id: DeviceId,
        info: &DeviceInfo,
        patch: &SerialConfigPatch,
    ) -> Result<Arc<DeviceConnection>> {
        if !self.catalog.is_supported(&info.device_model) {
            return Err(ConnectionError::UnsupportedModel(info.device_model.clone()).into());
        }

        let config = self
            .registry
            .config(device_id)
            .unwrap_or_default()
            .merged(patch);
        config.validate()?;
        self.registry.set_config(device_id, config.clone());

        let connection = Arc::new(DeviceConnection::new(device_id, info.device_model.clone(), config));
        connection.connect(self.now());
        if let Some(previous) = self.registry.insert(Arc::clone(&connection)) {
            previous.disconnect();
            debug!("Device {} re-initialized, previous connection replaced", device_id);
        }
        Ok(connection)
    }

    // ------------------------------------------------------------------
    // process
    // ------------------------------------------------------------------

    fn process_hex(&self, device_id: DeviceId, hex: &str) -> ProcessResult {
        let started = Instant::now();
        match common::hex::decode(hex) {
            Ok(bytes) => self.process_message(device_id, Bytes::from(bytes)),
            Err(e) => self.process_failure(device_id, &Rs485Error::from(e), started),
        }
    }

    fn process_message(&self, device_id: DeviceId, raw: Bytes) -> ProcessResult {
        let started = Instant::now();
        match self.try_process(device_id, raw) {
            Ok((device_address, function_code, data, outcome)) => {
                let elapsed = started.elapsed().as_millis() as u64;
                let now = self.now();
                if let Some(connection) = self.registry.get(device_id) {
                    connection.record_message(elapsed);
                    connection.update_last_activity(now);
                }
                self.statistics.record_message(ops::PROCESS);
                debug!(
                    "Device {} FC={:02X} {} -> {:?}",
                    device_id,
                    function_code,
                    data.kind(),
                    outcome
                );
                self.report(CommLogEntry::new(
                    device_id,
                    CommAction::ProcessMessage,
                    format!("FC={:02X} {}", function_code, data.kind()),
                    now,
                ));
                ProcessResult {
                    device_id,
                    success: true,
                    device_address: Some(device_address),
                    function_code: Some(function_code),
                    business_data: Some(data),
                    outcome: Some(outcome),
                    response_time_ms: elapsed,
                    error: None,
                }
            },
            Err(e) => self.process_failure(device_id, &e, started),
        }
    }

    fn try_process(&self, device_id: DeviceId, raw: Bytes) -> Result<(u8, u8, BusinessData, BusinessOutcome)> {
        let connection = self
            .registry
            .get_connected(device_id)
            .ok_or_else(|| Rs485Error::not_connected(device_id))?;

        let frame = match parse_frame(raw, self.parse_mode) {
            Ok(frame) => {
                self.statistics.record_message(ops::PARSE);
                frame.stamped(device_id, self.now())
            },
            Err(e) => {
                self.statistics.record_error(ops::PARSE);
                return Err(e.into());
            },
        };
        validate_frame(&frame)?;

        let data = decode_business_data(frame.function_code, &frame.payload);

        if let Some(operation) = frame.function().operation_name() {
            if let PermissionDecision::Deny { reason } = check_operation(Some(&connection), operation) {
                return Err(Rs485Error::permission_denied(operation, reason));
            }
        }

        let outcome = handle_business_data(frame.function_code, &data);
        Ok((frame.device_address, frame.function_code, data, outcome))
    }

    fn process_failure(&self, device_id: DeviceId, err: &Rs485Error, started: Instant) -> ProcessResult {
        ProcessResult {
            device_id,
            success: false,
            device_address: None,
            function_code: None,
            business_data: None,
            outcome: None,
            response_time_ms: started.elapsed().as_millis() as u64,
            error: Some(self.fail(device_id, err, ops::PROCESS, CommAction::ProcessMessageError)),
        }
    }

    // ------------------------------------------------------------------
    // heartbeat
    // ------------------------------------------------------------------

    fn heartbeat(&self, device_id: DeviceId) -> HeartbeatResult {
        let Some(connection) = self.registry.get(device_id) else {
            let err = Rs485Error::not_connected(device_id);
            return HeartbeatResult {
                device_id,
                success: false,
                snapshot: None,
                health_score: None,
                health_status: None,
                error: Some(self.fail(device_id, &err, ops::HEARTBEAT, CommAction::HeartbeatError)),
            };
        };

        let now = self.now();
        connection.update_last_heartbeat(now);
        let snapshot = connection.snapshot(now);
        let score = health::health_score(&snapshot);
        let status = health::classify(&snapshot, score);

        self.statistics.record_message(ops::HEARTBEAT);
        if !snapshot.connected {
            warn!("Heartbeat from disconnected device {}", device_id);
        }
        debug!("Device {} health {:.1} ({:?})", device_id, score, status);
        self.report(CommLogEntry::new(
            device_id,
            CommAction::Heartbeat,
            format!("health {:.1} {:?}", score, status),
            now,
        ));

        HeartbeatResult {
            device_id,
            success: true,
            snapshot: Some(snapshot),
            health_score: Some(score),
            health_status: Some(status),
            error: None,
        }
    }

    // ------------------------------------------------------------------
    // build
    // ------------------------------------------------------------------

    fn build_response(&self, device_id: DeviceId, function_code: u8, data: &BusinessData) -> BuildResult {
        match self.try_build(device_id, function_code, data) {
            Ok(frame) => {
                self.statistics.record_message(ops::BUILD);
                let frame_hex = common::hex::encode_upper_spaced(&frame);
                debug!("Device {} response frame: {}", device_id, frame_hex);
                self.report(CommLogEntry::new(
                    device_id,
                    CommAction::BuildResponse,
                    format!("FC={:02X} {} bytes", function_code, frame.len()),
                    self.now(),
                ));
                BuildResult {
                    device_id,
                    success: true,
                    frame: Some(frame),
                    frame_hex: Some(frame_hex),
                    error: None,
                }
            },
            Err(e) => BuildResult {
                device_id,
                success: false,
                frame: None,
                frame_hex: None,
                error: Some(self.fail(device_id, &e, ops::BUILD, CommAction::BuildResponseError)),
            },
        }
    }

    fn try_build(&self, device_id: DeviceId, function_code: u8, data: &BusinessData) -> Result<Bytes> {
        let connection = self
            .registry
            .get_connected(device_id)
            .ok_or_else(|| Rs485Error::not_connected(device_id))?;
        let payload = encode_business_data(function_code, data)
            .map_err(|e| BuildError::EncodeFailure(e.to_string()))?;
        let frame = build_frame(connection.config().device_address, function_code, &payload)?;
        Ok(frame)
    }
}

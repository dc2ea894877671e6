//! Sensor registry and update dispatch
//!
//! The registry owns one [`SensorState`] per registered schema for the life
//! of the process. Incoming buffers for a sensor are serialized behind that
//! sensor's lock, so decode, history append and handler dispatch happen as
//! one unit relative to any reader. Different sensors proceed independently.
//!
//! Handlers run while the sensor's lock is held and receive the locked
//! state. They must read through that reference. A handler that calls back
//! into the registry for its own sensor gets [`Error::ReentrantAccess`]
//! instead of blocking on the lock it already holds.

use crate::decoder::{DecodedField, DecodedRecord};
use crate::schema::SensorSchema;
use crate::sensor::{SensorState, UpdateHandler};
use crate::types::{SensorId, Value};
use crate::{Error, Result, DEFAULT_MAX_RECORDS};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counters across all sensors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Bytes consumed by successfully decoded fields
    pub bytes_received: u64,
    pub packets_decoded: u64,
    pub packets_rejected: u64,
}

/// One sensor's state plus the thread currently running its handler
struct SensorSlot {
    state: Mutex<SensorState>,
    dispatching: Mutex<Option<ThreadId>>,
}

impl SensorSlot {
    fn new(state: SensorState) -> Self {
        Self {
            state: Mutex::new(state),
            dispatching: Mutex::new(None),
        }
    }

    fn is_dispatching_here(&self) -> bool {
        *self.dispatching.lock() == Some(thread::current().id())
    }

    fn lock(&self, id: &str) -> Result<MutexGuard<'_, SensorState>> {
        if self.is_dispatching_here() {
            return Err(Error::ReentrantAccess(id.to_string()));
        }
        Ok(self.state.lock())
    }
}

/// Marks a slot as dispatching on this thread until dropped
struct DispatchGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> DispatchGuard<'a> {
    fn enter(dispatching: &'a Mutex<Option<ThreadId>>) -> Self {
        *dispatching.lock() = Some(thread::current().id());
        Self(dispatching)
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

/// Process-wide table of sensors
pub struct SensorRegistry {
    max_records: usize,
    schemas: Vec<Arc<SensorSchema>>,
    sensors: HashMap<SensorId, SensorSlot>,
    by_uuid: HashMap<Uuid, SensorId>,
    bytes_received: AtomicU64,
    bytes_reported: AtomicU64,
    packets_decoded: AtomicU64,
    packets_rejected: AtomicU64,
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorRegistry {
    /// Create a registry with the default history depth
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECORDS)
    }

    /// Create a registry keeping `max_records` values per field
    pub fn with_capacity(max_records: usize) -> Self {
        Self {
            max_records: max_records.max(1),
            schemas: Vec::new(),
            sensors: HashMap::new(),
            by_uuid: HashMap::new(),
            bytes_received: AtomicU64::new(0),
            bytes_reported: AtomicU64::new(0),
            packets_decoded: AtomicU64::new(0),
            packets_rejected: AtomicU64::new(0),
        }
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Register a schema with an optional completion handler
    pub fn register(
        &mut self,
        schema: SensorSchema,
        handler: Option<Arc<dyn UpdateHandler>>,
    ) -> Result<()> {
        let id = schema.id().clone();
        if self.sensors.contains_key(&id) {
            return Err(Error::DuplicateSensor(id.to_string()));
        }
        if let Some(uuid) = schema.uuid() {
            if self.by_uuid.contains_key(&uuid) {
                return Err(Error::DuplicateSensor(uuid.to_string()));
            }
            self.by_uuid.insert(uuid, id.clone());
        }

        info!(
            "Registered sensor {} ({} fields, {} bytes, {:?})",
            id,
            schema.fields().len(),
            schema.total_width(),
            schema.mode()
        );

        let schema = Arc::new(schema);
        let state = SensorState::new(Arc::clone(&schema), self.max_records, handler);
        self.schemas.push(schema);
        self.sensors.insert(id, SensorSlot::new(state));
        Ok(())
    }

    /// Register a schema whose updates call `handler`
    pub fn register_schema<H>(&mut self, schema: SensorSchema, handler: H) -> Result<()>
    where
        H: UpdateHandler + 'static,
    {
        let handler: Arc<dyn UpdateHandler> = Arc::new(handler);
        self.register(schema, Some(handler))
    }

    /// Register a schema with no completion handler
    pub fn register_passive(&mut self, schema: SensorSchema) -> Result<()> {
        self.register(schema, None)
    }

    /// Registered schemas, in registration order
    pub fn schemas(&self) -> &[Arc<SensorSchema>] {
        &self.schemas
    }

    pub fn schema(&self, id: &str) -> Result<&SensorSchema> {
        self.schemas
            .iter()
            .find(|s| s.id().as_str() == id)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))
    }

    pub fn sensor_ids(&self) -> impl Iterator<Item = &SensorId> {
        self.schemas.iter().map(|s| s.id())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sensors.contains_key(id)
    }

    /// Sensor registered under a characteristic UUID
    pub fn resolve_uuid(&self, uuid: &Uuid) -> Option<&SensorId> {
        self.by_uuid.get(uuid)
    }

    /// Decode and commit a raw buffer for a sensor, then dispatch its handler.
    ///
    /// A buffer that fails to decode changes nothing and fires nothing; the
    /// error is returned so the transport side can report it.
    pub fn on_raw_buffer(&self, id: &str, buf: &[u8]) -> Result<DecodedRecord> {
        let slot = self.slot(id)?;
        let mut state = slot.lock(id)?;
        let record = match state.ingest(buf) {
            Ok(record) => record,
            Err(e) => {
                self.packets_rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Rejected {} byte buffer for {}: {}", buf.len(), id, e);
                return Err(e);
            }
        };

        let total = self
            .bytes_received
            .fetch_add(record.bytes_consumed as u64, Ordering::Relaxed)
            + record.bytes_consumed as u64;
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Decoded {} ({} bytes, {} trailing, {} total)",
            id, record.bytes_consumed, record.trailing, total
        );

        if let Some(handler) = state.handler() {
            let _dispatch = DispatchGuard::enter(&slot.dispatching);
            handler.on_sensor_updated(&state);
        }

        Ok(record)
    }

    /// Route a raw buffer by characteristic UUID
    pub fn on_uuid_buffer(&self, uuid: &Uuid, buf: &[u8]) -> Result<DecodedRecord> {
        let id = self
            .resolve_uuid(uuid)
            .ok_or_else(|| Error::UnknownSensor(uuid.to_string()))?;
        self.on_raw_buffer(id.as_str(), buf)
    }

    fn slot(&self, id: &str) -> Result<&SensorSlot> {
        self.sensors
            .get(id)
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))
    }

    /// Run `f` with the sensor's state locked
    pub fn with_sensor<R>(&self, id: &str, f: impl FnOnce(&SensorState) -> R) -> Result<R> {
        let state = self.slot(id)?.lock(id)?;
        Ok(f(&state))
    }

    fn with_sensor_mut<R>(&self, id: &str, f: impl FnOnce(&mut SensorState) -> R) -> Result<R> {
        let mut state = self.slot(id)?.lock(id)?;
        Ok(f(&mut state))
    }

    /// Most recent value of a field
    pub fn latest(&self, id: &str, field: &str) -> Result<Value> {
        self.with_sensor(id, |s| s.latest(field).cloned())?
    }

    /// Field history, oldest first
    pub fn history(&self, id: &str, field: &str) -> Result<Vec<Value>> {
        self.with_sensor(id, |s| s.history(field).map(|h| h.to_vec()))?
    }

    /// Latest value of every field from a single committed record
    pub fn snapshot(&self, id: &str) -> Result<Vec<DecodedField>> {
        self.with_sensor(id, |s| s.snapshot())?
    }

    pub fn is_dirty(&self, id: &str) -> Result<bool> {
        self.with_sensor(id, |s| s.is_dirty())
    }

    /// Clear a sensor's dirty flag, returning whether it was set
    pub fn take_dirty(&self, id: &str) -> Result<bool> {
        self.with_sensor_mut(id, |s| s.take_dirty())
    }

    pub fn clear_dirty(&self, id: &str) -> Result<()> {
        self.with_sensor_mut(id, |s| s.clear_dirty())
    }

    /// Sensors with unconsumed updates, in registration order.
    ///
    /// A sensor whose handler is running on this thread was just committed
    /// and counts as dirty.
    pub fn dirty_sensors(&self) -> Vec<SensorId> {
        self.schemas
            .iter()
            .filter(|schema| match self.sensors.get(schema.id()) {
                Some(slot) if slot.is_dispatching_here() => true,
                Some(slot) => slot.state.lock().is_dirty(),
                None => false,
            })
            .map(|schema| schema.id().clone())
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
        }
    }

    /// Total bytes received, if it grew since the last call
    pub fn take_bytes_report(&self) -> Option<u64> {
        let current = self.bytes_received.load(Ordering::Relaxed);
        let previous = self.bytes_reported.swap(current, Ordering::Relaxed);
        (current > previous).then_some(current)
    }
}

impl std::fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("max_records", &self.max_records)
            .field("sensors", &self.schemas.iter().map(|s| s.id()).collect::<Vec<_>>())
            .field("stats", &self.stats())
            .finish()
    }
}

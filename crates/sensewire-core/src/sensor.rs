//! Per-sensor state
//!
//! Holds the bounded history of every field, the dirty flag shared with the
//! render side, and the completion handler registered for the sensor.

use crate::decoder::{decode_packet, DecodedField, DecodedRecord};
use crate::history::FieldHistory;
use crate::schema::SensorSchema;
use crate::types::{SensorId, Value};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Called once for every packet committed to a sensor's history.
///
/// The handler receives no decoded payload; it reads what it needs through
/// [`SensorState::latest`] or [`SensorState::snapshot`]. It runs with the
/// sensor locked, so registry calls for the same sensor from inside the
/// handler fail with [`Error::ReentrantAccess`]. Other sensors stay reachable.
pub trait UpdateHandler: Send + Sync {
    fn on_sensor_updated(&self, sensor: &SensorState);
}

impl<F> UpdateHandler for F
where
    F: Fn(&SensorState) + Send + Sync,
{
    fn on_sensor_updated(&self, sensor: &SensorState) {
        self(sensor)
    }
}

/// Advisory marker for unconsumed data. The core sets it, the consumer clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyFlag {
    #[default]
    Clean,
    Dirty,
}

/// Lifecycle of a sensor with respect to incoming packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorPhase {
    /// No pending data
    #[default]
    Idle,
    /// A packet is being decoded
    Decoding,
    /// A packet was committed and the handler fired; waiting for the consumer
    Updated,
}

/// Mutable state of one registered sensor
pub struct SensorState {
    schema: Arc<SensorSchema>,
    histories: Vec<FieldHistory>,
    dirty: DirtyFlag,
    phase: SensorPhase,
    handler: Option<Arc<dyn UpdateHandler>>,
    packets_decoded: u64,
    packets_rejected: u64,
}

impl SensorState {
    pub fn new(
        schema: Arc<SensorSchema>,
        max_records: usize,
        handler: Option<Arc<dyn UpdateHandler>>,
    ) -> Self {
        let histories = schema
            .fields()
            .iter()
            .map(|_| FieldHistory::new(max_records))
            .collect();
        Self {
            schema,
            histories,
            dirty: DirtyFlag::Clean,
            phase: SensorPhase::Idle,
            handler,
            packets_decoded: 0,
            packets_rejected: 0,
        }
    }

    pub fn id(&self) -> &SensorId {
        self.schema.id()
    }

    pub fn schema(&self) -> &SensorSchema {
        &self.schema
    }

    pub fn phase(&self) -> SensorPhase {
        self.phase
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty == DirtyFlag::Dirty
    }

    /// Mark the current data as consumed
    pub fn clear_dirty(&mut self) {
        self.dirty = DirtyFlag::Clean;
        if self.phase == SensorPhase::Updated {
            self.phase = SensorPhase::Idle;
        }
    }

    /// Clear the dirty flag, returning whether it was set
    pub fn take_dirty(&mut self) -> bool {
        let was_dirty = self.is_dirty();
        self.clear_dirty();
        was_dirty
    }

    pub fn packets_decoded(&self) -> u64 {
        self.packets_decoded
    }

    pub fn packets_rejected(&self) -> u64 {
        self.packets_rejected
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn UpdateHandler>> {
        self.handler.clone()
    }

    /// Full history of a field, oldest first
    pub fn history(&self, field: &str) -> Result<&FieldHistory> {
        let index = self.field_index(field)?;
        Ok(&self.histories[index])
    }

    /// Most recent value of a field
    pub fn latest(&self, field: &str) -> Result<&Value> {
        self.history(field)?
            .latest()
            .ok_or_else(|| Error::EmptyHistory {
                sensor: self.id().to_string(),
                field: field.to_string(),
            })
    }

    /// Latest value of every field, in schema order.
    ///
    /// All fields of a packet are committed together, so these values always
    /// come from the same record.
    pub fn snapshot(&self) -> Result<Vec<DecodedField>> {
        self.schema
            .fields()
            .iter()
            .zip(&self.histories)
            .map(|(spec, history)| {
                history
                    .latest()
                    .map(|value| DecodedField {
                        name: spec.name.clone(),
                        value: value.clone(),
                    })
                    .ok_or_else(|| Error::EmptyHistory {
                        sensor: self.id().to_string(),
                        field: spec.name.clone(),
                    })
            })
            .collect()
    }

    /// Decode a raw buffer and, only if every field decoded, commit it.
    ///
    /// On failure no history changes and the dirty flag is left as it was.
    pub fn ingest(&mut self, buf: &[u8]) -> Result<DecodedRecord> {
        let previous = self.phase;
        self.phase = SensorPhase::Decoding;
        match decode_packet(&self.schema, buf) {
            Ok(record) => {
                self.commit(&record);
                Ok(record)
            }
            Err(e) => {
                self.phase = previous;
                self.packets_rejected += 1;
                Err(e)
            }
        }
    }

    fn commit(&mut self, record: &DecodedRecord) {
        for (history, field) in self.histories.iter_mut().zip(&record.fields) {
            history.push(field.value.clone());
        }
        self.packets_decoded += 1;
        self.dirty = DirtyFlag::Dirty;
        self.phase = SensorPhase::Updated;
    }

    fn field_index(&self, field: &str) -> Result<usize> {
        self.schema
            .field_index(field)
            .ok_or_else(|| Error::UnknownField {
                sensor: self.id().to_string(),
                field: field.to_string(),
            })
    }
}

impl fmt::Debug for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorState")
            .field("id", self.id())
            .field("dirty", &self.dirty)
            .field("phase", &self.phase)
            .field("has_handler", &self.handler.is_some())
            .field("packets_decoded", &self.packets_decoded)
            .finish()
    }
}

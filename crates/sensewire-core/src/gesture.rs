//! Gesture sensor profile
//!
//! Layouts and interpretation for the two characteristics exposed by the
//! gesture peripheral:
//!
//! ```text
//! stroke      [state:Int32][length:Int32][strokePoints:PointArray(160)]  328 bytes
//! prediction  [index:Uint8]                                                1 byte
//! ```

use crate::registry::SensorRegistry;
use crate::schema::SensorSchema;
use crate::sensor::SensorState;
use crate::types::{AccessMode, FieldType, Point};
use crate::{Error, Result};
use std::time::Duration;
use uuid::Uuid;

/// GATT service exposing both characteristics
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4798e0f2_0000_4d68_af64_8a8f5258404e);

/// Stroke characteristic
pub const STROKE_UUID: Uuid = Uuid::from_u128(0x4798e0f2_300a_4d68_af64_8a8f5258404e);

/// Prediction characteristic
pub const PREDICTION_UUID: Uuid = Uuid::from_u128(0x4798e0f2_300b_4d68_af64_8a8f5258404e);

/// Points carried by every stroke packet
pub const STROKE_POINT_COUNT: usize = 160;

/// Read-poll interval used for both characteristics
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub const STROKE_SENSOR: &str = "stroke";
pub const PREDICTION_SENSOR: &str = "prediction";

pub const FIELD_STATE: &str = "state";
pub const FIELD_LENGTH: &str = "length";
pub const FIELD_STROKE_POINTS: &str = "strokePoints";
pub const FIELD_INDEX: &str = "index";

/// Stroke characteristic layout
pub fn stroke_schema() -> Result<SensorSchema> {
    SensorSchema::builder(STROKE_SENSOR)
        .uuid(STROKE_UUID)
        // Notify payloads are capped at 20 bytes, far below a stroke packet
        .mode(AccessMode::ReadPoll)
        .field(FIELD_STATE, FieldType::Int32)
        .field(FIELD_LENGTH, FieldType::Int32)
        .field(FIELD_STROKE_POINTS, FieldType::PointArray(STROKE_POINT_COUNT))
        .build()
}

/// Prediction characteristic layout
pub fn prediction_schema() -> Result<SensorSchema> {
    SensorSchema::builder(PREDICTION_SENSOR)
        .uuid(PREDICTION_UUID)
        .mode(AccessMode::ReadPoll)
        .field(FIELD_INDEX, FieldType::UInt8)
        .build()
}

/// Progress of the stroke being drawn on the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeState {
    Waiting,
    Drawing,
    Done,
}

impl StrokeState {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => StrokeState::Waiting,
            1 => StrokeState::Drawing,
            _ => StrokeState::Done,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrokeState::Waiting => "Waiting for gesture",
            StrokeState::Drawing => "Drawing",
            StrokeState::Done => "Done",
        }
    }
}

/// The latest stroke, with points cut to the reported length
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub state: StrokeState,
    pub points: Vec<Point>,
}

impl Stroke {
    /// Read the latest stroke from a sensor state.
    ///
    /// A reported length outside `[0, N]` is clamped.
    pub fn from_state(state: &SensorState) -> Result<Self> {
        let raw_state = state.latest(FIELD_STATE)?.as_i64().unwrap_or_default();
        let length = state.latest(FIELD_LENGTH)?.as_i64().unwrap_or_default();
        let points = state
            .latest(FIELD_STROKE_POINTS)?
            .as_points()
            .ok_or_else(|| Error::InvalidSchema(format!("{} is not a point array", FIELD_STROKE_POINTS)))?;

        let length = length.clamp(0, points.len() as i64) as usize;
        Ok(Self {
            state: StrokeState::from_raw(raw_state),
            points: points[..length].to_vec(),
        })
    }

    /// Read the latest stroke through the registry
    pub fn from_registry(registry: &SensorRegistry) -> Result<Self> {
        registry.with_sensor(STROKE_SENSOR, Stroke::from_state)?
    }

    /// Only an in-progress stroke is drawn
    pub fn is_drawable(&self) -> bool {
        self.state == StrokeState::Drawing
    }
}

/// Classes reported by the on-device gesture model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureClass {
    SwipeUp,
    SwipeDown,
    HandWave,
    Clockwise,
    CounterClockwise,
}

impl GestureClass {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(GestureClass::SwipeUp),
            1 => Some(GestureClass::SwipeDown),
            2 => Some(GestureClass::HandWave),
            3 => Some(GestureClass::Clockwise),
            4 => Some(GestureClass::CounterClockwise),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            GestureClass::SwipeUp => 0,
            GestureClass::SwipeDown => 1,
            GestureClass::HandWave => 2,
            GestureClass::Clockwise => 3,
            GestureClass::CounterClockwise => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GestureClass::SwipeUp => "Swipe Up",
            GestureClass::SwipeDown => "Swipe Down",
            GestureClass::HandWave => "Hand Wave",
            GestureClass::Clockwise => "Clockwise",
            GestureClass::CounterClockwise => "Counter-Clockwise",
        }
    }
}

/// A change in the predicted index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionChange {
    pub index: u8,
    /// `None` for indices the model does not define
    pub class: Option<GestureClass>,
}

/// Reports a prediction only when it differs from the previous one.
///
/// Polling re-reads the same index many times per gesture.
#[derive(Debug, Default)]
pub struct PredictionTracker {
    last: Option<u8>,
}

impl PredictionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, index: u8) -> Option<PredictionChange> {
        if self.last == Some(index) {
            return None;
        }
        self.last = Some(index);
        Some(PredictionChange {
            index,
            class: GestureClass::from_index(index),
        })
    }

    /// Observe the latest index held by a prediction sensor
    pub fn observe_state(&mut self, state: &SensorState) -> Result<Option<PredictionChange>> {
        let index = state
            .latest(FIELD_INDEX)?
            .as_i64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| Error::InvalidSchema(format!("{} is not a byte", FIELD_INDEX)))?;
        Ok(self.observe(index))
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

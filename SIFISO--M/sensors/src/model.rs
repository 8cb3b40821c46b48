//! Immutable sensor snapshot model and partial-update deltas.
//!
//! A published [`SensorSnapshot`] is never modified. Updates go through
//! [`SensorSnapshot::apply`], which copies the previous value and overwrites only
//! the fields present in a [`SensorDelta`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stress::HrvMetrics;

/// Body posture derived from motion sensors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// Seated.
    Sitting,
    /// Upright and stationary.
    Standing,
    /// Moving on foot.
    Walking,
    /// Lying down.
    Lying,
    /// No posture estimate available.
    #[default]
    Unknown,
}

/// Coarse location context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationContext {
    /// At home.
    Home,
    /// At the workplace.
    Work,
    /// Travelling between places.
    Commute,
    /// Outside, not commuting.
    Outdoors,
    /// Unknown location.
    #[default]
    Unknown,
}

/// Biometric readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BiosensorReadings {
    /// Beats per minute.
    pub heart_rate: f64,
    /// Heart rate variability (RMSSD, milliseconds).
    pub hrv_rmssd: f64,
    /// Skin conductance in microsiemens.
    pub skin_conductance: f64,
    /// Breaths per minute.
    pub breathing_rate: f64,
    /// Skin temperature in Celsius.
    pub body_temperature: f64,
    /// Blood oxygen saturation percentage.
    pub spo2: f64,
    /// Estimated hydration level in [0, 1].
    pub hydration_level: f64,
}

impl Default for BiosensorReadings {
    fn default() -> Self {
        Self {
            heart_rate: 70.0,
            hrv_rmssd: 40.0,
            skin_conductance: 5.0,
            breathing_rate: 16.0,
            body_temperature: 36.6,
            spo2: 98.0,
            hydration_level: 0.7,
        }
    }
}

/// Ambient readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentalReadings {
    /// Ambient light in lux.
    pub ambient_light: f64,
    /// Noise level in decibels.
    pub noise_db: f64,
    /// Air temperature in Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Air quality index (lower is better).
    pub air_quality_index: f64,
}

impl Default for EnvironmentalReadings {
    fn default() -> Self {
        Self {
            ambient_light: 300.0,
            noise_db: 40.0,
            temperature: 21.0,
            humidity: 45.0,
            air_quality_index: 30.0,
        }
    }
}

/// Accelerometer and activity readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct MotionReadings {
    /// Acceleration along X (m/s²).
    pub acceleration_x: f64,
    /// Acceleration along Y (m/s²).
    pub acceleration_y: f64,
    /// Acceleration along Z (m/s²).
    pub acceleration_z: f64,
    /// Normalized motion intensity in [0, 1].
    pub motion_intensity: f64,
    /// Current posture estimate.
    pub posture: Posture,
    /// Steps counted since the previous snapshot.
    pub steps: u32,
    /// Rolling step count for the last hour.
    pub steps_last_hour: u32,
}

/// Situational context readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ContextReadings {
    /// Coarse location.
    pub location: LocationContext,
    /// Whether the screen is on.
    pub screen_on: bool,
    /// Whether the calendar marks the user as in a meeting.
    pub in_meeting: bool,
}

/// One immutable, timestamped bundle of all current sensor readings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSnapshot {
    /// Publication counter; 0 for the initial default snapshot.
    pub version: u64,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Biometric readings.
    pub biosensors: BiosensorReadings,
    /// Ambient readings.
    pub environmental: EnvironmentalReadings,
    /// Motion readings.
    pub motion: MotionReadings,
    /// Context readings.
    pub context: ContextReadings,
}

impl SensorSnapshot {
    /// Snapshot with default readings at `timestamp`.
    #[must_use]
    pub fn initial(timestamp: DateTime<Utc>) -> Self {
        Self {
            version: 0,
            timestamp,
            biosensors: BiosensorReadings::default(),
            environmental: EnvironmentalReadings::default(),
            motion: MotionReadings::default(),
            context: ContextReadings::default(),
        }
    }

    /// Produces the successor snapshot: fields present in `delta` overwrite, the rest carry over.
    #[must_use]
    pub fn apply(&self, delta: &SensorDelta, timestamp: DateTime<Utc>) -> Self {
        Self {
            version: self.version + 1,
            timestamp,
            biosensors: delta.biosensors.apply(&self.biosensors),
            environmental: delta.environmental.apply(&self.environmental),
            motion: delta.motion.apply(&self.motion),
            context: delta.context.apply(&self.context),
        }
    }

    /// Whether the posture reading is [`Posture::Sitting`].
    #[must_use]
    pub fn is_sitting(&self) -> bool {
        self.motion.posture == Posture::Sitting
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::initial(Utc::now())
    }
}

/// Field-level overrides for [`BiosensorReadings`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BiosensorDelta {
    pub heart_rate: Option<f64>,
    pub hrv_rmssd: Option<f64>,
    pub skin_conductance: Option<f64>,
    pub breathing_rate: Option<f64>,
    pub body_temperature: Option<f64>,
    pub spo2: Option<f64>,
    pub hydration_level: Option<f64>,
}

impl BiosensorDelta {
    fn apply(&self, base: &BiosensorReadings) -> BiosensorReadings {
        BiosensorReadings {
            heart_rate: self.heart_rate.unwrap_or(base.heart_rate),
            hrv_rmssd: self.hrv_rmssd.unwrap_or(base.hrv_rmssd),
            skin_conductance: self.skin_conductance.unwrap_or(base.skin_conductance),
            breathing_rate: self.breathing_rate.unwrap_or(base.breathing_rate),
            body_temperature: self.body_temperature.unwrap_or(base.body_temperature),
            spo2: self.spo2.unwrap_or(base.spo2),
            hydration_level: self.hydration_level.unwrap_or(base.hydration_level),
        }
    }
}

/// Field-level overrides for [`EnvironmentalReadings`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentalDelta {
    pub ambient_light: Option<f64>,
    pub noise_db: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air_quality_index: Option<f64>,
}

impl EnvironmentalDelta {
    fn apply(&self, base: &EnvironmentalReadings) -> EnvironmentalReadings {
        EnvironmentalReadings {
            ambient_light: self.ambient_light.unwrap_or(base.ambient_light),
            noise_db: self.noise_db.unwrap_or(base.noise_db),
            temperature: self.temperature.unwrap_or(base.temperature),
            humidity: self.humidity.unwrap_or(base.humidity),
            air_quality_index: self.air_quality_index.unwrap_or(base.air_quality_index),
        }
    }
}

/// Field-level overrides for [`MotionReadings`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MotionDelta {
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    pub motion_intensity: Option<f64>,
    pub posture: Option<Posture>,
    pub steps: Option<u32>,
    pub steps_last_hour: Option<u32>,
}

impl MotionDelta {
    fn apply(&self, base: &MotionReadings) -> MotionReadings {
        MotionReadings {
            acceleration_x: self.acceleration_x.unwrap_or(base.acceleration_x),
            acceleration_y: self.acceleration_y.unwrap_or(base.acceleration_y),
            acceleration_z: self.acceleration_z.unwrap_or(base.acceleration_z),
            motion_intensity: self.motion_intensity.unwrap_or(base.motion_intensity),
            posture: self.posture.unwrap_or(base.posture),
            // Steps are per-snapshot increments; an absent value means none were counted.
            steps: self.steps.unwrap_or(0),
            steps_last_hour: self.steps_last_hour.unwrap_or(base.steps_last_hour),
        }
    }
}

/// Field-level overrides for [`ContextReadings`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ContextDelta {
    pub location: Option<LocationContext>,
    pub screen_on: Option<bool>,
    pub in_meeting: Option<bool>,
}

impl ContextDelta {
    fn apply(&self, base: &ContextReadings) -> ContextReadings {
        ContextReadings {
            location: self.location.unwrap_or(base.location),
            screen_on: self.screen_on.unwrap_or(base.screen_on),
            in_meeting: self.in_meeting.unwrap_or(base.in_meeting),
        }
    }
}

/// Partial reading merged into the current snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SensorDelta {
    /// Biometric overrides.
    pub biosensors: BiosensorDelta,
    /// Ambient overrides.
    pub environmental: EnvironmentalDelta,
    /// Motion overrides.
    pub motion: MotionDelta,
    /// Context overrides.
    pub context: ContextDelta,
}

impl SensorDelta {
    /// Empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets heart rate.
    #[must_use]
    pub fn heart_rate(mut self, bpm: f64) -> Self {
        self.biosensors.heart_rate = Some(bpm);
        self
    }

    /// Sets HRV (RMSSD).
    #[must_use]
    pub fn hrv(mut self, rmssd: f64) -> Self {
        self.biosensors.hrv_rmssd = Some(rmssd);
        self
    }

    /// Sets skin conductance.
    #[must_use]
    pub fn skin_conductance(mut self, microsiemens: f64) -> Self {
        self.biosensors.skin_conductance = Some(microsiemens);
        self
    }

    /// Sets breathing rate.
    #[must_use]
    pub fn breathing_rate(mut self, per_minute: f64) -> Self {
        self.biosensors.breathing_rate = Some(per_minute);
        self
    }

    /// Sets hydration level.
    #[must_use]
    pub fn hydration(mut self, level: f64) -> Self {
        self.biosensors.hydration_level = Some(level);
        self
    }

    /// Sets all three acceleration axes.
    #[must_use]
    pub fn acceleration(mut self, x: f64, y: f64, z: f64) -> Self {
        self.motion.acceleration_x = Some(x);
        self.motion.acceleration_y = Some(y);
        self.motion.acceleration_z = Some(z);
        self
    }

    /// Sets motion intensity.
    #[must_use]
    pub fn motion_intensity(mut self, intensity: f64) -> Self {
        self.motion.motion_intensity = Some(intensity);
        self
    }

    /// Sets posture.
    #[must_use]
    pub fn posture(mut self, posture: Posture) -> Self {
        self.motion.posture = Some(posture);
        self
    }

    /// Sets the step increment and rolling hourly count.
    #[must_use]
    pub fn steps(mut self, steps: u32, last_hour: u32) -> Self {
        self.motion.steps = Some(steps);
        self.motion.steps_last_hour = Some(last_hour);
        self
    }

    /// Sets ambient light.
    #[must_use]
    pub fn ambient_light(mut self, lux: f64) -> Self {
        self.environmental.ambient_light = Some(lux);
        self
    }

    /// Sets location context.
    #[must_use]
    pub fn location(mut self, location: LocationContext) -> Self {
        self.context.location = Some(location);
        self
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Discrete event from a real sensor, converted into a [`SensorDelta`] on ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorEvent {
    /// Optical heart-rate reading.
    HeartRate {
        /// Beats per minute.
        bpm: f64,
    },
    /// HRV measurement.
    HeartRateVariability {
        /// RMSSD in milliseconds.
        rmssd: f64,
    },
    /// Beat-to-beat intervals; RMSSD is derived on ingest.
    RrIntervals {
        /// Successive RR intervals in milliseconds.
        intervals_ms: Vec<f64>,
    },
    /// Electrodermal activity reading.
    SkinConductance {
        /// Microsiemens.
        microsiemens: f64,
    },
    /// Respiration reading.
    Breathing {
        /// Breaths per minute.
        per_minute: f64,
    },
    /// Hydration estimate.
    Hydration {
        /// Level in [0, 1].
        level: f64,
    },
    /// Accelerometer sample.
    Accelerometer {
        /// X axis.
        x: f64,
        /// Y axis.
        y: f64,
        /// Z axis.
        z: f64,
    },
    /// Posture classification.
    Posture {
        /// Detected posture.
        posture: Posture,
    },
    /// Pedometer update.
    Steps {
        /// Steps since the previous update.
        count: u32,
        /// Rolling hourly total.
        last_hour: u32,
    },
    /// Light sensor reading.
    AmbientLight {
        /// Lux.
        lux: f64,
    },
    /// Microphone level.
    Noise {
        /// Decibels.
        db: f64,
    },
    /// Thermometer/hygrometer reading.
    Climate {
        /// Celsius.
        temperature: f64,
        /// Relative humidity.
        humidity: f64,
    },
    /// Location classifier output.
    Location {
        /// Coarse location.
        location: LocationContext,
    },
}

impl SensorEvent {
    /// Converts the event into the partial update it represents.
    #[must_use]
    pub fn into_delta(self) -> SensorDelta {
        let delta = SensorDelta::new();
        match self {
            Self::HeartRate { bpm } => delta.heart_rate(bpm),
            Self::HeartRateVariability { rmssd } => delta.hrv(rmssd),
            Self::RrIntervals { intervals_ms } => HrvMetrics::from_rr_intervals(&intervals_ms)
                .map_or_else(SensorDelta::new, |metrics| delta.hrv(metrics.rmssd)),
            Self::SkinConductance { microsiemens } => delta.skin_conductance(microsiemens),
            Self::Breathing { per_minute } => delta.breathing_rate(per_minute),
            Self::Hydration { level } => delta.hydration(level),
            Self::Accelerometer { x, y, z } => {
                let magnitude = (x * x + y * y + z * z).sqrt();
                let intensity = ((magnitude - 9.81).abs() / 5.0).clamp(0.0, 1.0);
                delta.acceleration(x, y, z).motion_intensity(intensity)
            }
            Self::Posture { posture } => delta.posture(posture),
            Self::Steps { count, last_hour } => delta.steps(count, last_hour),
            Self::AmbientLight { lux } => delta.ambient_light(lux),
            Self::Noise { db } => {
                let mut delta = delta;
                delta.environmental.noise_db = Some(db);
                delta
            }
            Self::Climate {
                temperature,
                humidity,
            } => {
                let mut delta = delta;
                delta.environmental.temperature = Some(temperature);
                delta.environmental.humidity = Some(humidity);
                delta
            }
            Self::Location { location } => delta.location(location),
        }
    }
}

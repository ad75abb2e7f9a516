//! Machine profiles and the machine catalog.
//!
//! A [`MachineProfile`] is the static descriptor of one plotter:
//! coordinate scale/inversion, travel limits, connection settings, and
//! postprocessor defaults. Profiles are plain serde values; the catalog
//! is constructed at startup and passed to whoever needs it — there is
//! no process-wide registry.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the machine is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDriver {
    Serial,
    Tcp,
}

impl Default for ConnectionDriver {
    fn default() -> Self {
        Self::Serial
    }
}

impl std::fmt::Display for ConnectionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// Connection settings for a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub driver: ConnectionDriver,
    /// Serial port path (e.g. "/dev/ttyACM0", "COM3").
    pub port: String,
    pub baud_rate: u32,
    /// Host for TCP connections.
    pub host: String,
    pub tcp_port: u16,
    pub timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            driver: ConnectionDriver::Serial,
            port: String::new(),
            baud_rate: 115_200,
            host: String::new(),
            tcp_port: 23,
            timeout_ms: 30_000,
        }
    }
}

/// Travel-limit bounding box in millimetres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TravelLimits {
    pub min: Point,
    pub max: Point,
}

impl TravelLimits {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.is_valid()
            && p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
    }
}

impl Default for TravelLimits {
    fn default() -> Self {
        Self {
            min: Point::new(0.0, 0.0),
            max: Point::new(100.0, 100.0),
        }
    }
}

/// Postprocessor defaults carried by a profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    /// Drawing feed rate in mm/min.
    pub feed_rate: f64,
    /// Pen-up/pen-down cycles are elided for gaps shorter than this.
    pub pen_drag_mm: f64,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            feed_rate: 1200.0,
            pen_drag_mm: 0.75,
        }
    }
}

/// Static descriptor of one plotter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineProfile {
    pub name: String,
    pub description: String,
    /// Machine origin in millimetres.
    pub origin: [f64; 2],
    /// Units per source mm per axis; a negative component inverts the
    /// axis (plotters usually flip Y relative to screen space).
    pub scale: [f64; 2],
    pub limits: TravelLimits,
    pub connection: ConnectionSettings,
    pub post: PostSettings,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            name: "generic_gcode".to_string(),
            description: "Generic G-code plotter".to_string(),
            origin: [0.0, 0.0],
            scale: [1.0, -1.0],
            limits: TravelLimits::default(),
            connection: ConnectionSettings::default(),
            post: PostSettings::default(),
        }
    }
}

/// Catalog of known machine profiles, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineCatalog {
    profiles: HashMap<String, MachineProfile>,
}

impl MachineCatalog {
    /// The built-in catalog: a generic G-code profile and the servo-pen
    /// plotter with its 235x254 mm bed.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.insert(MachineProfile::default());
        catalog.insert(MachineProfile {
            name: "plotkit_v1".to_string(),
            description: "Servo-pen plotter, M280 height control".to_string(),
            limits: TravelLimits::new(Point::new(0.0, 0.0), Point::new(235.0, 254.0)),
            ..MachineProfile::default()
        });
        catalog
    }

    /// Parse a catalog from its JSON representation.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, profile: MachineProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&MachineProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

// skysearch/aircraft.rs
use serde::Deserialize;
use std::fmt;

const DB_FLAG_MILITARY: u32 = 1;
const DB_FLAG_PIA: u32 = 4;
const DB_FLAG_LADD: u32 = 8;

/// Response body shared by every `/v2` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AircraftResponse {
    #[serde(default)]
    pub ac: Vec<Aircraft>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub now: Option<f64>,
}

/// Barometric altitude is either feet or the literal string `"ground"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Altitude {
    Feet(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Aircraft {
    pub hex: Option<String>,
    pub flight: Option<String>,
    #[serde(rename = "r")]
    pub registration: Option<String>,
    #[serde(rename = "t")]
    pub type_code: Option<String>,
    pub desc: Option<String>,
    #[serde(rename = "ownOp")]
    pub operator: Option<String>,
    pub alt_baro: Option<Altitude>,
    pub alt_geom: Option<f64>,
    pub gs: Option<f64>,
    pub track: Option<f64>,
    pub baro_rate: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub squawk: Option<String>,
    pub emergency: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "dbFlags")]
    pub db_flags: Option<u32>,
    pub seen: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmergencySquawk {
    Hijacking,
    RadioFailure,
    GeneralEmergency,
}

impl EmergencySquawk {
    pub const ALL: [EmergencySquawk; 3] = [
        EmergencySquawk::Hijacking,
        EmergencySquawk::RadioFailure,
        EmergencySquawk::GeneralEmergency,
    ];

    pub fn code(self) -> &'static str {
        match self {
            EmergencySquawk::Hijacking => "7500",
            EmergencySquawk::RadioFailure => "7600",
            EmergencySquawk::GeneralEmergency => "7700",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code.trim())
    }

    pub fn colour(self) -> u32 {
        match self {
            EmergencySquawk::Hijacking => 0x8B0000,
            EmergencySquawk::RadioFailure => 0xFFA500,
            EmergencySquawk::GeneralEmergency => 0xFF0000,
        }
    }
}

impl fmt::Display for EmergencySquawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmergencySquawk::Hijacking => write!(f, "Hijacking"),
            EmergencySquawk::RadioFailure => write!(f, "Radio failure"),
            EmergencySquawk::GeneralEmergency => write!(f, "General emergency"),
        }
    }
}

impl Aircraft {
    pub fn hex(&self) -> Option<String> {
        self.hex
            .as_deref()
            .map(|h| h.trim().trim_start_matches('~').to_lowercase())
            .filter(|h| !h.is_empty())
    }

    pub fn callsign(&self) -> Option<&str> {
        self.flight.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    pub fn is_on_ground(&self) -> bool {
        matches!(&self.alt_baro, Some(Altitude::Text(t)) if t.eq_ignore_ascii_case("ground"))
    }

    pub fn altitude_ft(&self) -> Option<f64> {
        match &self.alt_baro {
            Some(Altitude::Feet(ft)) => Some(*ft),
            Some(Altitude::Text(_)) if self.is_on_ground() => Some(0.0),
            Some(Altitude::Text(_)) => None,
            None => self.alt_geom,
        }
    }

    /// On the ground, or low enough to treat as landed.
    pub fn has_landed(&self, threshold_ft: f64) -> bool {
        self.is_on_ground() || self.altitude_ft().is_some_and(|alt| alt < threshold_ft)
    }

    pub fn emergency_squawk(&self) -> Option<EmergencySquawk> {
        self.squawk.as_deref().and_then(EmergencySquawk::from_code)
    }

    /// The transponder's own emergency status, unless it reports `"none"`.
    pub fn reported_emergency(&self) -> Option<&str> {
        self.emergency
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("none"))
    }

    pub fn is_military(&self) -> bool {
        self.db_flags.is_some_and(|f| f & DB_FLAG_MILITARY != 0)
    }

    pub fn is_ladd(&self) -> bool {
        self.db_flags.is_some_and(|f| f & DB_FLAG_LADD != 0)
    }

    pub fn is_pia(&self) -> bool {
        self.db_flags.is_some_and(|f| f & DB_FLAG_PIA != 0)
    }

    pub fn altitude_text(&self) -> String {
        if self.is_on_ground() {
            return "On ground".to_string();
        }
        match self.altitude_ft() {
            Some(ft) => format!("{:.0} ft", ft),
            None => "N/A".to_string(),
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    /// One-line summary used in multi-result listings.
    pub fn summary_line(&self) -> String {
        format!(
            "`{}` {} {} · {} · {}",
            self.hex().unwrap_or_else(|| "??????".to_string()),
            self.callsign().unwrap_or("N/A"),
            self.registration.as_deref().map(|r| format!("({})", r)).unwrap_or_default(),
            self.type_code.as_deref().unwrap_or("N/A"),
            self.altitude_text(),
        )
    }
}

/// Six hex digits, optionally prefixed with `~` for non-ICAO addresses.
pub fn is_valid_hex(hex: &str) -> bool {
    let hex = hex.trim().trim_start_matches('~');
    hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Four octal digits.
pub fn is_valid_squawk(code: &str) -> bool {
    code.len() == 4 && code.chars().all(|c| ('0'..='7').contains(&c))
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }
}

/// A named stop on a bus route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(rename = "nombre", alias = "name")]
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Route document as published under `routes/*.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteFile {
    #[serde(rename = "nombreRuta", alias = "name", default)]
    pub name: String,
    #[serde(rename = "horario", alias = "schedule", default)]
    pub schedule: String,
    pub route: Vec<Waypoint>,
}

impl RouteFile {
    pub fn origin(&self) -> Option<&Waypoint> {
        self.route.first()
    }

    pub fn destination(&self) -> Option<&Waypoint> {
        self.route.last()
    }

    /// Stops strictly between origin and destination.
    pub fn intermediate_stops(&self) -> &[Waypoint] {
        match self.route.len() {
            0..=2 => &[],
            len => &self.route[1..len - 1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

impl Severity {
    /// CSS-style class a display can attach to the message box.
    pub fn class_name(self) -> &'static str {
        match self {
            Severity::Info => "message-info",
            Severity::Warning => "message-warning",
            Severity::Success => "message-success",
            Severity::Error => "message-error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Parent,
    Tutor,
}

/// Logged-in user, handed explicitly to whichever view builds a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub file_name: String,
    pub name: String,
    pub schedule: String,
    pub stop_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_endpoints() {
        let a = Coordinate { lat: 14.291, lng: -89.918 };
        let b = Coordinate { lat: 14.2905, lng: -89.920 };
        assert_eq!(a.interpolate(b, 0.0), a);
        let end = a.interpolate(b, 1.0);
        assert!((end.lat - b.lat).abs() < 1e-12 && (end.lng - b.lng).abs() < 1e-12);
    }

    #[test]
    fn route_file_reads_spanish_field_names() {
        let json = r#"{
            "nombreRuta": "Ruta Matutina",
            "horario": "06:30",
            "route": [
                {"nombre": "Gasolinera", "lat": 14.291, "lng": -89.918},
                {"nombre": "Parada X", "lat": 14.2905, "lng": -89.920},
                {"nombre": "Colegio", "lat": 14.2896, "lng": -89.92523}
            ]
        }"#;
        let file: RouteFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.name, "Ruta Matutina");
        assert_eq!(file.schedule, "06:30");
        assert_eq!(file.origin().unwrap().name, "Gasolinera");
        assert_eq!(file.destination().unwrap().name, "Colegio");
        assert_eq!(file.intermediate_stops().len(), 1);
    }

    #[test]
    fn waypoint_accepts_english_alias() {
        let wp: Waypoint =
            serde_json::from_str(r#"{"name": "Colegio", "lat": 1.0, "lng": 2.0}"#).unwrap();
        assert_eq!(wp, Waypoint::new("Colegio", 1.0, 2.0));
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
        assert_eq!(Severity::Success.class_name(), "message-success");
    }
}

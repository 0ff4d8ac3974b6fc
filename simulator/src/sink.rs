//! Capabilities the simulator drives: a marker on a map and a message box.
//!
//! The controller and the notifier only ever talk to these traits, so a map
//! widget, a terminal, or a test recorder can stand behind them.

use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{Coordinate, Severity};

/// Renders the moving bus marker.
pub trait PositionSink: Send {
    fn set_position(&mut self, at: Coordinate);

    fn focus(&mut self, _at: Coordinate, _zoom: u8) {}

    /// Drop the marker from the map.
    fn remove(&mut self) {}
}

/// Shows one transient status message at a time.
pub trait DisplaySink: Send {
    fn display(&mut self, text: &str, severity: Severity);
    fn hide(&mut self);
}

/// Logs marker movement through `tracing`.
#[derive(Debug, Default)]
pub struct TracingPositionSink;

impl PositionSink for TracingPositionSink {
    fn set_position(&mut self, at: Coordinate) {
        tracing::trace!("bus at lat={:.5} lng={:.5}", at.lat, at.lng);
    }

    fn focus(&mut self, at: Coordinate, zoom: u8) {
        tracing::debug!("focus lat={:.5} lng={:.5} zoom={zoom}", at.lat, at.lng);
    }

    fn remove(&mut self) {
        tracing::debug!("bus marker removed");
    }
}

/// Logs messages through `tracing` at a level matching their severity.
#[derive(Debug, Default)]
pub struct TracingDisplay;

impl DisplaySink for TracingDisplay {
    fn display(&mut self, text: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => tracing::info!("[{}] {text}", severity.class_name()),
            Severity::Warning => tracing::warn!("[{}] {text}", severity.class_name()),
            Severity::Error => tracing::error!("[{}] {text}", severity.class_name()),
        }
    }

    fn hide(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerEvent {
    Position(Coordinate),
    Focus(Coordinate, u8),
    Removed,
}

/// Keeps every marker call in a shared log.
///
/// Clones share the same log, so a caller can hand one clone to a controller
/// and read the other one.
#[derive(Debug, Clone, Default)]
pub struct MemoryPositionSink {
    events: Arc<Mutex<Vec<MarkerEvent>>>,
}

impl MemoryPositionSink {
    pub fn events(&self) -> Vec<MarkerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn positions(&self) -> Vec<Coordinate> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MarkerEvent::Position(at) => Some(at),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: MarkerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl PositionSink for MemoryPositionSink {
    fn set_position(&mut self, at: Coordinate) {
        self.push(MarkerEvent::Position(at));
    }

    fn focus(&mut self, at: Coordinate, zoom: u8) {
        self.push(MarkerEvent::Focus(at, zoom));
    }

    fn remove(&mut self) {
        self.push(MarkerEvent::Removed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Shown(String, Severity),
    Hidden,
}

/// Keeps every display call in a shared log, stamped with Tokio time.
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    origin: tokio::time::Instant,
    events: Arc<Mutex<Vec<(std::time::Duration, DisplayEvent)>>>,
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            events: Arc::default(),
        }
    }
}

impl MemoryDisplay {
    /// Events with the time elapsed since this display was created.
    pub fn timeline(&self) -> Vec<(std::time::Duration, DisplayEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts shown so far, in order.
    pub fn shown(&self) -> Vec<String> {
        self.timeline()
            .into_iter()
            .filter_map(|(_, event)| match event {
                DisplayEvent::Shown(text, _) => Some(text),
                DisplayEvent::Hidden => None,
            })
            .collect()
    }

    fn push(&self, event: DisplayEvent) {
        let elapsed = self.origin.elapsed();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((elapsed, event));
    }
}

impl DisplaySink for MemoryDisplay {
    fn display(&mut self, text: &str, severity: Severity) {
        self.push(DisplayEvent::Shown(text.to_string(), severity));
    }

    fn hide(&mut self) {
        self.push(DisplayEvent::Hidden);
    }
}

//! Per-role controller setup for the driver, parent and tutor views.

use crate::{
    controller::{ControllerConfig, MovementController, ObserverOptions, StopCallback},
    models::{Role, RouteFile, Session},
    notifier::Notifier,
    sink::PositionSink,
};

/// Parents watch the bus dwell longer at each stop.
const PARENT_DWELL_MS: u64 = 2500;
const MORNING_TARGET_STOP: usize = 8;
const AFTERNOON_TARGET_STOP: usize = 3;
const FALLBACK_TARGET_STOP: usize = 5;

#[derive(Debug, Clone)]
pub struct RoleProfile {
    pub role: Role,
    pub config: ControllerConfig,
    /// Only set for the parent view.
    pub target_stop_index: Option<usize>,
}

impl RoleProfile {
    pub fn for_role(role: Role, route: &RouteFile) -> Self {
        match role {
            Role::Driver | Role::Tutor => Self {
                role,
                config: ControllerConfig::default(),
                target_stop_index: None,
            },
            Role::Parent => Self {
                role,
                config: ControllerConfig {
                    inter_stop_delay_ms: PARENT_DWELL_MS,
                    ..ControllerConfig::default()
                },
                target_stop_index: Some(default_target_stop(route)),
            },
        }
    }

    pub fn with_target_stop(mut self, index: usize) -> Self {
        if self.role == Role::Parent {
            self.target_stop_index = Some(index);
        }
        self
    }

    pub fn build_controller(
        &self,
        route: &RouteFile,
        sink: impl PositionSink + 'static,
        notifier: Notifier,
        on_stop: Option<StopCallback>,
    ) -> MovementController {
        let waypoints = route.route.clone();
        match self.role {
            Role::Parent => MovementController::with_observer(
                waypoints,
                self.config.clone(),
                ObserverOptions {
                    target_stop_index: self.target_stop_index,
                    on_stop,
                    ..ObserverOptions::default()
                },
                sink,
                notifier,
            ),
            Role::Driver | Role::Tutor => {
                MovementController::new(waypoints, self.config.clone(), sink, notifier)
            }
        }
    }
}

/// Stop where the parent's child boards, picked from the route's name and kept
/// inside the route.
pub fn default_target_stop(route: &RouteFile) -> usize {
    let preferred = if route.name.contains("Matutina") {
        MORNING_TARGET_STOP
    } else if route.name.contains("Vespertina") {
        AFTERNOON_TARGET_STOP
    } else {
        FALLBACK_TARGET_STOP
    };
    preferred.min(route.route.len().saturating_sub(1))
}

pub fn greeting(session: &Session) -> String {
    let badge = match session.role {
        Role::Driver => "Driver",
        Role::Parent => "Parent",
        Role::Tutor => "Tutor",
    };
    format!("{badge}: {}", session.name)
}

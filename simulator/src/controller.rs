//! Bus movement along a fixed route.
//!
//! A [`MovementController`] walks its route segment by segment, sampling
//! `steps_per_segment + 1` interpolated positions per leg and pushing them to a
//! [`PositionSink`]. Run state is `Idle -> Running <-> Paused -> Idle`; every
//! transition other than those is refused with a notice on the [`Notifier`],
//! never with an error.
//!
//! The handle is cheap to clone. One clone awaits [`MovementController::start`]
//! while others call `pause`, `resume` and `reset` from elsewhere. The loop
//! checks the run state before every sample, so a pause lands on the next step
//! boundary and a reset ends the traversal within one step interval.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    geo::segment_samples,
    models::{Coordinate, Waypoint},
    notifier::Notifier,
    sink::PositionSink,
};

const DEPARTURE_NOTICE: Duration = Duration::from_millis(4000);
const ARRIVAL_NOTICE: Duration = Duration::from_millis(3000);
const COMPLETION_NOTICE: Duration = Duration::from_millis(5000);
const BOARDING_NOTICE: Duration = Duration::from_millis(5000);
const CONTROL_NOTICE: Duration = Duration::from_millis(3000);
const MISUSE_NOTICE: Duration = Duration::from_millis(2500);
const STOP_NOTICE: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

/// Where the bus is: the waypoint it last reached and how far it is along the
/// leg to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current_index: usize,
    pub fraction_between: f64,
}

impl Progress {
    pub fn is_complete(&self, route_len: usize) -> bool {
        route_len >= 2 && self.current_index == route_len - 1 && self.fraction_between >= 1.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    #[serde(default = "default_steps_per_segment")]
    pub steps_per_segment: usize,
    #[serde(default = "default_inter_stop_delay_ms")]
    pub inter_stop_delay_ms: u64,
    #[serde(default = "default_start_zoom")]
    pub start_zoom: u8,
    #[serde(default = "default_arrival_zoom")]
    pub arrival_zoom: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            steps_per_segment: default_steps_per_segment(),
            inter_stop_delay_ms: default_inter_stop_delay_ms(),
            start_zoom: default_start_zoom(),
            arrival_zoom: default_arrival_zoom(),
        }
    }
}

impl ControllerConfig {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    pub fn inter_stop_delay(&self) -> Duration {
        Duration::from_millis(self.inter_stop_delay_ms)
    }
}

pub fn default_step_interval_ms() -> u64 {
    130
}

pub fn default_steps_per_segment() -> usize {
    25
}

pub fn default_inter_stop_delay_ms() -> u64 {
    800
}

pub fn default_start_zoom() -> u8 {
    15
}

pub fn default_arrival_zoom() -> u8 {
    16
}

/// Remaining travel time, `remaining stops * minutes per stop`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeEstimate {
    pub minutes: f64,
}

impl fmt::Display for TimeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} min", self.minutes)
    }
}

/// Per-stop update pushed to an observer view.
#[derive(Debug, Clone, PartialEq)]
pub struct StopStatus {
    pub index: usize,
    pub stop_name: String,
    /// `None` once the destination has been reached.
    pub estimate: Option<TimeEstimate>,
}

impl StopStatus {
    pub fn eta_label(&self) -> String {
        match self.estimate {
            Some(estimate) => estimate.to_string(),
            None => "Trip finished".to_string(),
        }
    }
}

pub type StopCallback = Arc<dyn Fn(&StopStatus) + Send + Sync>;

/// Observer mode, used by the parent view.
#[derive(Clone)]
pub struct ObserverOptions {
    /// Stop where the observed student boards; announced once per traversal.
    pub target_stop_index: Option<usize>,
    pub minutes_per_stop: f64,
    pub on_stop: Option<StopCallback>,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            target_stop_index: None,
            minutes_per_stop: 0.8,
            on_stop: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRejection {
    InvalidRoute { waypoints: usize },
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOutcome {
    Completed,
    /// Reset before the destination was reached.
    Cancelled,
    Rejected(StartRejection),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Snapshot {
    run_state: RunState,
    progress: Progress,
    /// Identifies the traversal allowed to drive; bumped by `start` and `reset`.
    generation: u64,
    boarding_announced: bool,
}

impl Snapshot {
    fn drives(&self, generation: u64) -> bool {
        self.generation == generation && self.run_state != RunState::Idle
    }
}

enum Step {
    Applied,
    Paused,
    Stopped,
}

#[derive(Clone)]
pub struct MovementController {
    inner: Arc<Inner>,
}

struct Inner {
    route: Vec<Waypoint>,
    config: ControllerConfig,
    observer: Option<ObserverOptions>,
    state: watch::Sender<Snapshot>,
    // Taken before touching `state` when both are needed.
    sink: Mutex<Box<dyn PositionSink>>,
    notifier: Notifier,
}

impl MovementController {
    pub fn new(
        route: Vec<Waypoint>,
        config: ControllerConfig,
        sink: impl PositionSink + 'static,
        notifier: Notifier,
    ) -> Self {
        Self::build(route, config, None, Box::new(sink), notifier)
    }

    pub fn with_observer(
        route: Vec<Waypoint>,
        config: ControllerConfig,
        observer: ObserverOptions,
        sink: impl PositionSink + 'static,
        notifier: Notifier,
    ) -> Self {
        Self::build(route, config, Some(observer), Box::new(sink), notifier)
    }

    fn build(
        route: Vec<Waypoint>,
        config: ControllerConfig,
        observer: Option<ObserverOptions>,
        sink: Box<dyn PositionSink>,
        notifier: Notifier,
    ) -> Self {
        let (state, _) = watch::channel(Snapshot {
            run_state: RunState::Idle,
            progress: Progress::default(),
            generation: 0,
            boarding_announced: false,
        });
        Self {
            inner: Arc::new(Inner {
                route,
                config,
                observer,
                state,
                sink: Mutex::new(sink),
                notifier,
            }),
        }
    }

    pub fn route(&self) -> &[Waypoint] {
        &self.inner.route
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn run_state(&self) -> RunState {
        self.inner.snapshot().run_state
    }

    pub fn progress(&self) -> Progress {
        self.inner.snapshot().progress
    }

    /// Drive the bus from origin to destination.
    ///
    /// Resolves when the destination is reached, when a `reset` cancels the
    /// traversal, or immediately when the start is refused.
    pub async fn start(&self) -> TraversalOutcome {
        let inner = &self.inner;
        let len = inner.route.len();
        if len < 2 {
            tracing::warn!("refusing to start: route has {len} waypoints");
            let notice = if len == 0 {
                "No route has been loaded."
            } else {
                "The route needs at least two stops."
            };
            inner.notifier.warning(notice, DEPARTURE_NOTICE);
            return TraversalOutcome::Rejected(StartRejection::InvalidRoute { waypoints: len });
        }

        let origin = inner.route[0].coordinate();
        let mut generation = 0;
        let accepted = {
            // Held across the transition so a concurrent reset cannot remove
            // the marker before the origin is placed.
            let mut sink = inner.lock_sink();
            let accepted = inner.state.send_if_modified(|s| {
                if s.run_state != RunState::Idle {
                    return false;
                }
                s.generation += 1;
                s.run_state = RunState::Running;
                s.progress = Progress::default();
                s.boarding_announced = false;
                generation = s.generation;
                true
            });
            if accepted {
                sink.set_position(origin);
                sink.focus(origin, inner.config.start_zoom);
            }
            accepted
        };
        if !accepted {
            tracing::debug!("start ignored: traversal already active");
            inner
                .notifier
                .info("The trip is already in progress.", CONTROL_NOTICE);
            return TraversalOutcome::Rejected(StartRejection::AlreadyActive);
        }

        tracing::info!(
            "traversal {generation} leaving {} with {} legs",
            inner.route[0].name,
            len - 1
        );
        inner
            .notifier
            .info("Getting ready to leave, students!", DEPARTURE_NOTICE);
        self.check_boarding();

        let outcome = self.drive(generation).await;
        tracing::info!("traversal {generation} ended: {outcome:?}");
        outcome
    }

    pub fn pause(&self) {
        let mut previous = RunState::Idle;
        self.inner.state.send_if_modified(|s| {
            previous = s.run_state;
            if s.run_state == RunState::Running {
                s.run_state = RunState::Paused;
                true
            } else {
                false
            }
        });
        let notifier = &self.inner.notifier;
        match previous {
            RunState::Idle => notifier.warning("There is no active trip to pause.", MISUSE_NOTICE),
            RunState::Paused => notifier.info("The trip is already paused.", MISUSE_NOTICE),
            RunState::Running => {
                tracing::debug!("traversal paused at {:?}", self.progress());
                notifier.warning("Trip paused.", CONTROL_NOTICE);
            }
        }
    }

    pub fn resume(&self) {
        let mut previous = RunState::Idle;
        self.inner.state.send_if_modified(|s| {
            previous = s.run_state;
            if s.run_state == RunState::Paused {
                s.run_state = RunState::Running;
                true
            } else {
                false
            }
        });
        let notifier = &self.inner.notifier;
        match previous {
            RunState::Idle => {
                notifier.warning("There is no active trip to continue.", MISUSE_NOTICE)
            }
            RunState::Running => notifier.info("The trip is already moving.", MISUSE_NOTICE),
            RunState::Paused => {
                tracing::debug!("traversal resumed at {:?}", self.progress());
                notifier.success("Continuing the trip...", CONTROL_NOTICE);
            }
        }
    }

    /// Back to `Idle` from any state, removing the bus marker.
    pub fn reset(&self) {
        {
            let mut sink = self.inner.lock_sink();
            self.inner.state.send_modify(|s| {
                s.run_state = RunState::Idle;
                s.progress = Progress::default();
                s.generation += 1;
                s.boarding_announced = false;
            });
            sink.remove();
        }
        tracing::info!("route reset");
        self.inner
            .notifier
            .success("Route reset. Ready to start again.", CONTROL_NOTICE);
    }

    /// Announce boarding if the bus sits at the target stop.
    ///
    /// Latched: fires at most once per traversal however often it is polled.
    pub fn check_boarding(&self) -> bool {
        let Some(target) = self
            .inner
            .observer
            .as_ref()
            .and_then(|observer| observer.target_stop_index)
        else {
            return false;
        };
        let fire = self.inner.state.send_if_modified(|s| {
            if s.boarding_announced
                || s.run_state == RunState::Idle
                || s.progress.current_index != target
            {
                return false;
            }
            s.boarding_announced = true;
            true
        });
        if fire {
            tracing::info!("boarding at stop {target}");
            self.inner
                .notifier
                .success("Your child is boarding the bus.", BOARDING_NOTICE);
        }
        fire
    }

    /// Remaining-time estimate as seen from stop `index`.
    pub fn time_estimate(&self, index: usize) -> TimeEstimate {
        let minutes_per_stop = self
            .inner
            .observer
            .as_ref()
            .map_or(ObserverOptions::default().minutes_per_stop, |o| o.minutes_per_stop);
        let remaining = self.inner.route.len().saturating_sub(index + 1);
        TimeEstimate {
            minutes: remaining as f64 * minutes_per_stop,
        }
    }

    async fn drive(&self, generation: u64) -> TraversalOutcome {
        let inner = &self.inner;
        let mut rx = inner.state.subscribe();
        let last = inner.route.len() - 1;

        for index in 0..last {
            let current = &inner.route[index];
            let next = &inner.route[index + 1];
            self.report_stop(index, Some(self.time_estimate(index)));

            if !self
                .animate_segment(&mut rx, generation, current.coordinate(), next.coordinate())
                .await
            {
                return TraversalOutcome::Cancelled;
            }

            let arrived = index + 1;
            let committed = inner.state.send_if_modified(|s| {
                if !s.drives(generation) {
                    return false;
                }
                s.progress = Progress {
                    current_index: arrived,
                    fraction_between: if arrived == last { 1.0 } else { 0.0 },
                };
                true
            });
            if !committed {
                return TraversalOutcome::Cancelled;
            }
            tracing::debug!("arrived at stop {arrived}: {}", next.name);
            inner
                .notifier
                .info(format!("We arrived at {}.", next.name), ARRIVAL_NOTICE);
            self.check_boarding();

            if !self
                .pace(&mut rx, generation, inner.config.inter_stop_delay())
                .await
            {
                return TraversalOutcome::Cancelled;
            }
        }

        let finished = inner.state.send_if_modified(|s| {
            if !s.drives(generation) {
                return false;
            }
            s.run_state = RunState::Idle;
            true
        });
        if !finished {
            return TraversalOutcome::Cancelled;
        }

        let destination = &inner.route[last];
        inner.notifier.success(
            format!("We have arrived at {}!", destination.name),
            COMPLETION_NOTICE,
        );
        inner
            .lock_sink()
            .focus(destination.coordinate(), inner.config.arrival_zoom);
        self.report_stop(last, None);
        TraversalOutcome::Completed
    }

    /// Returns `false` when the traversal was stopped mid-leg.
    async fn animate_segment(
        &self,
        rx: &mut watch::Receiver<Snapshot>,
        generation: u64,
        from: Coordinate,
        to: Coordinate,
    ) -> bool {
        let samples = segment_samples(from, to, self.inner.config.steps_per_segment);
        let last = samples.len() - 1;
        let mut step = 0;
        while let Some(&at) = samples.get(step) {
            let fraction = step as f64 / last as f64;
            match self.place(generation, fraction, at) {
                Step::Stopped => return false,
                Step::Paused => {
                    if !self.hold_while_paused(rx, generation).await {
                        return false;
                    }
                    continue;
                }
                Step::Applied => step += 1,
            }
            if !self
                .pace(rx, generation, self.inner.config.step_interval())
                .await
            {
                return false;
            }
        }
        true
    }

    /// Commit one interpolation sample if this traversal is still running.
    fn place(&self, generation: u64, fraction: f64, at: Coordinate) -> Step {
        // The sink lock spans the state check so a concurrent reset cannot
        // remove the marker between the check and the move.
        let mut sink = self.inner.lock_sink();
        let mut step = Step::Stopped;
        self.inner.state.send_if_modified(|s| {
            if !s.drives(generation) {
                return false;
            }
            if s.run_state == RunState::Paused {
                step = Step::Paused;
                return false;
            }
            s.progress.fraction_between = fraction;
            step = Step::Applied;
            true
        });
        if matches!(step, Step::Applied) {
            sink.set_position(at);
        }
        step
    }

    /// Wait out `duration`, returning early with `false` if stopped.
    async fn pace(
        &self,
        rx: &mut watch::Receiver<Snapshot>,
        generation: u64,
        duration: Duration,
    ) -> bool {
        let stopped = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = rx.wait_for(|s| !s.drives(generation)) => true,
        };
        !stopped
    }

    async fn hold_while_paused(&self, rx: &mut watch::Receiver<Snapshot>, generation: u64) -> bool {
        // The sender lives in `inner`, so the channel cannot close under us.
        let _ = rx
            .wait_for(|s| !s.drives(generation) || s.run_state == RunState::Running)
            .await;
        self.inner.snapshot().drives(generation)
    }

    /// Observer mode only: announce the stop the bus is leaving from and hand
    /// the status to `on_stop`. The final report carries no estimate and is
    /// covered by the completion notice.
    fn report_stop(&self, index: usize, estimate: Option<TimeEstimate>) {
        let Some(observer) = self.inner.observer.as_ref() else {
            return;
        };
        let stop_name = &self.inner.route[index].name;
        if estimate.is_some() {
            self.inner
                .notifier
                .info(format!("The bus is at {stop_name}."), STOP_NOTICE);
        }
        if let Some(callback) = observer.on_stop.as_ref() {
            callback(&StopStatus {
                index,
                stop_name: stop_name.clone(),
                estimate,
            });
        }
    }
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        *self.state.borrow()
    }

    fn lock_sink(&self) -> MutexGuard<'_, Box<dyn PositionSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

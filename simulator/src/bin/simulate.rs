use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use simulator::{
    controller::{MovementController, RunState, StopCallback, StopStatus, TraversalOutcome},
    indicators::next_stop,
    models::{Role, RouteFile, Session},
    notifier::Notifier,
    roles::{RoleProfile, greeting},
    routes::read_route_file,
    sink::{TracingDisplay, TracingPositionSink},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INDICATOR_REFRESH: Duration = Duration::from_secs(2);
const DRAIN_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Driver,
    Parent,
    Tutor,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Driver => Role::Driver,
            RoleArg::Parent => Role::Parent,
            RoleArg::Tutor => Role::Tutor,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Drive the school bus along a route in the terminal",
    long_about = "Reads commands from stdin while the bus moves: \
                  s = start, p = pause, c = continue, r = reset, q = quit"
)]
struct Args {
    /// Route JSON file with nombreRuta, horario and route[]
    #[arg(long)]
    route: PathBuf,

    #[arg(long, value_enum, default_value_t = RoleArg::Driver)]
    role: RoleArg,

    /// Name shown in the session greeting
    #[arg(long, default_value = "Invitado")]
    name: String,

    /// Stop index where the parent's child boards (parent role only)
    #[arg(long)]
    target_stop: Option<usize>,

    /// Milliseconds between interpolation steps
    #[arg(long)]
    step_ms: Option<u64>,

    /// Interpolation steps per leg
    #[arg(long)]
    steps: Option<usize>,

    /// Dwell time at each stop in milliseconds
    #[arg(long)]
    dwell_ms: Option<u64>,
}

impl Args {
    fn profile(&self, route: &RouteFile) -> RoleProfile {
        let mut profile = RoleProfile::for_role(self.role.into(), route);
        if let Some(index) = self.target_stop {
            profile = profile.with_target_stop(index);
        }
        if let Some(step_ms) = self.step_ms {
            profile.config.step_interval_ms = step_ms;
        }
        if let Some(steps) = self.steps {
            profile.config.steps_per_segment = steps;
        }
        if let Some(dwell_ms) = self.dwell_ms {
            profile.config.inter_stop_delay_ms = dwell_ms;
        }
        profile
    }
}

enum Flow {
    Continue,
    Quit,
}

fn spawn_traversal(controller: &MovementController) -> JoinHandle<TraversalOutcome> {
    let runner = controller.clone();
    tokio::spawn(async move { runner.start().await })
}

/// Handle one stdin command without blocking the input loop.
fn apply_command(
    command: &str,
    controller: &MovementController,
    traversal: &mut JoinHandle<TraversalOutcome>,
) -> Flow {
    match command {
        // An active trip makes this start return at once with a notice, and a
        // reset trip still winding down is detached and ends on its own.
        "s" => *traversal = spawn_traversal(controller),
        "p" => controller.pause(),
        "c" => controller.resume(),
        "r" => controller.reset(),
        "q" => {
            controller.reset();
            return Flow::Quit;
        }
        "" => {}
        other => tracing::warn!("unknown command {other:?} (use s, p, c, r, q)"),
    }
    Flow::Continue
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simulate=info,simulator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let route = read_route_file(&args.route)?;
    let session = Session {
        name: args.name.clone(),
        role: args.role.into(),
    };
    tracing::info!("{}", greeting(&session));
    tracing::info!(
        "{} ({}) loaded with {} stops, {:.2} km",
        route.name,
        route.schedule,
        route.route.len(),
        simulator::geo::approximate_distance_km(&route.route)
    );

    let profile = args.profile(&route);
    let notifier = Notifier::new(TracingDisplay);
    let on_stop: StopCallback = Arc::new(|status: &StopStatus| {
        tracing::info!("stop: {} | remaining: {}", status.stop_name, status.eta_label());
    });
    let controller =
        profile.build_controller(&route, TracingPositionSink, notifier.clone(), Some(on_stop));
    let pacing = controller.config();
    tracing::info!(
        "pacing: {} steps per leg every {:?}, {:?} at each stop",
        pacing.steps_per_segment,
        pacing.step_interval(),
        pacing.inter_stop_delay()
    );

    let mut traversal = spawn_traversal(&controller);

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut indicators = tokio::time::interval(INDICATOR_REFRESH);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = commands.next_line(), if stdin_open => match line? {
                Some(command) => {
                    if let Flow::Quit = apply_command(command.trim(), &controller, &mut traversal) {
                        break;
                    }
                }
                None => stdin_open = false,
            },
            _ = indicators.tick() => {
                if traversal.is_finished() && controller.run_state() == RunState::Idle {
                    if !stdin_open {
                        break;
                    }
                    continue;
                }
                if session.role == Role::Driver {
                    match next_stop(controller.route(), controller.progress()) {
                        Some(next) => tracing::info!("next stop: {} ({:.2} km)", next.name, next.distance_km),
                        None => tracing::info!("next stop: -"),
                    }
                }
            }
        }
    }

    let outcome = traversal.await?;
    tracing::info!("trip outcome: {outcome:?}");

    while notifier.is_showing() {
        tokio::time::sleep(DRAIN_POLL).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulator::{
        controller::ControllerConfig,
        models::Waypoint,
        sink::{MemoryDisplay, MemoryPositionSink},
    };

    fn controller() -> MovementController {
        let route = vec![
            Waypoint::new("Gasolinera", 14.291, -89.918),
            Waypoint::new("ParadaX", 14.2905, -89.920),
            Waypoint::new("Colegio", 14.2896, -89.92523),
        ];
        let config = ControllerConfig {
            step_interval_ms: 100,
            steps_per_segment: 4,
            inter_stop_delay_ms: 300,
            ..ControllerConfig::default()
        };
        MovementController::new(
            route,
            config,
            MemoryPositionSink::default(),
            Notifier::new(MemoryDisplay::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn start_right_after_reset_keeps_commands_responsive() {
        let controller = controller();
        let mut traversal = spawn_traversal(&controller);
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(matches!(apply_command("r", &controller, &mut traversal), Flow::Continue));
        assert!(matches!(apply_command("s", &controller, &mut traversal), Flow::Continue));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.run_state(), RunState::Running);

        apply_command("p", &controller, &mut traversal);
        assert_eq!(controller.run_state(), RunState::Paused);
        assert!(matches!(apply_command("q", &controller, &mut traversal), Flow::Quit));
        assert_eq!(traversal.await.unwrap(), TraversalOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn start_during_a_trip_is_refused_without_blocking() {
        let controller = controller();
        let mut traversal = spawn_traversal(&controller);
        tokio::time::sleep(Duration::from_millis(250)).await;
        let running = std::mem::replace(&mut traversal, spawn_traversal(&controller));

        assert_eq!(
            traversal.await.unwrap(),
            TraversalOutcome::Rejected(simulator::controller::StartRejection::AlreadyActive)
        );
        assert_eq!(running.await.unwrap(), TraversalOutcome::Completed);
    }
}

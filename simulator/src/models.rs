pub use shared::{
    ApiError, Coordinate, Role, RouteFile, RouteSummary, Session, Severity, Waypoint,
};

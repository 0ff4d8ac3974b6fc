use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteLoadError {
    #[error("failed to read route file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid route definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("route needs at least 2 waypoints, found {0}")]
    TooShort(usize),
    #[error("route file not found: {0}")]
    NotFound(String),
    #[error("invalid route file name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("server i/o error: {0}")]
    Io(#[from] io::Error),
}

use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

use crate::{
    error::RouteLoadError,
    models::{RouteFile, RouteSummary},
};

pub const GENERAL_ROUTES: &str = "data.json";
pub const DIJKSTRA_ROUTES: &str = "data_dijkstra.json";
pub const KRUSKAL_ROUTES: &str = "data_kruskal.json";

pub fn read_route_file(path: impl AsRef<Path>) -> Result<RouteFile, RouteLoadError> {
    let file = File::open(path)?;
    parse_route_file(file)
}

/// Parse a route document, rejecting routes too short to have a direction.
pub fn parse_route_file(reader: impl Read) -> Result<RouteFile, RouteLoadError> {
    let route_file: RouteFile = serde_json::from_reader(reader)?;
    validate(route_file)
}

fn validate(route_file: RouteFile) -> Result<RouteFile, RouteLoadError> {
    if route_file.route.len() < 2 {
        return Err(RouteLoadError::TooShort(route_file.route.len()));
    }
    Ok(route_file)
}

/// Directory of route JSON documents, as served under `/routes`.
#[derive(Debug, Clone)]
pub struct RouteCatalog {
    root: PathBuf,
}

impl RouteCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw JSON of one of the published documents, unvalidated.
    pub fn read_raw(&self, file_name: &str) -> Result<serde_json::Value, RouteLoadError> {
        let path = self.resolve(file_name)?;
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn general(&self) -> Result<serde_json::Value, RouteLoadError> {
        self.read_raw(GENERAL_ROUTES)
    }

    pub fn dijkstra(&self) -> Result<serde_json::Value, RouteLoadError> {
        self.read_raw(DIJKSTRA_ROUTES)
    }

    pub fn kruskal(&self) -> Result<serde_json::Value, RouteLoadError> {
        self.read_raw(KRUSKAL_ROUTES)
    }

    pub fn load(&self, file_name: &str) -> Result<RouteFile, RouteLoadError> {
        let path = self.resolve(file_name)?;
        read_route_file(path)
    }

    /// Every `*.json` file that parses as a traversable route, sorted by file name.
    pub fn list(&self) -> Result<Vec<RouteSummary>, RouteLoadError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            match read_route_file(&path) {
                Ok(route_file) => summaries.push(RouteSummary {
                    file_name: file_name.to_string(),
                    name: route_file.name,
                    schedule: route_file.schedule,
                    stop_count: route_file.route.len(),
                }),
                Err(err) => tracing::debug!("skipping {file_name}: {err}"),
            }
        }
        summaries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(summaries)
    }

    fn resolve(&self, file_name: &str) -> Result<PathBuf, RouteLoadError> {
        let plain = !file_name.is_empty()
            && !file_name.starts_with('.')
            && !file_name.contains(['/', '\\'])
            && file_name.ends_with(".json");
        if !plain {
            return Err(RouteLoadError::InvalidName(file_name.to_string()));
        }
        let path = self.root.join(file_name);
        if !path.is_file() {
            return Err(RouteLoadError::NotFound(file_name.to_string()));
        }
        Ok(path)
    }
}

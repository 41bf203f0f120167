use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::routing::{RegistryError, RouteDefinition};

/// Result string for every successful mutation.
pub const SUCCESS: &str = "success";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    /// Store version of the active table.
    pub table_version: u64,
    pub active_routes: usize,
    pub stored_routes: usize,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match self {
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::StoreWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RegistryError::Compile(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let table = state.registry.active_table();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        table_version: table.version(),
        active_routes: table.len(),
        stored_routes: state.registry.store().snapshot().len(),
    })
}

pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<RouteDefinition>> {
    Json(
        state
            .registry
            .list_all()
            .iter()
            .map(|d| RouteDefinition::clone(d))
            .collect(),
    )
}

pub async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RouteDefinition>, RegistryError> {
    let route = state.registry.get(&id)?;
    Ok(Json(RouteDefinition::clone(&route)))
}

pub async fn add_route(
    State(state): State<AppState>,
    Json(definition): Json<RouteDefinition>,
) -> Result<&'static str, RegistryError> {
    state.registry.add(definition)?;
    Ok(SUCCESS)
}

pub async fn update_route(
    State(state): State<AppState>,
    Json(definition): Json<RouteDefinition>,
) -> Result<&'static str, RegistryError> {
    state.registry.update_by_id(definition)?;
    Ok(SUCCESS)
}

pub async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<&'static str, RegistryError> {
    state.registry.delete(&id)?;
    Ok(SUCCESS)
}

pub async fn replace_routes(
    State(state): State<AppState>,
    Json(definitions): Json<Vec<RouteDefinition>>,
) -> Result<&'static str, RegistryError> {
    state.registry.update_list(definitions)?;
    Ok(SUCCESS)
}

pub async fn refresh_routes(State(state): State<AppState>) -> Result<&'static str, RegistryError> {
    state.registry.refresh()?;
    Ok(SUCCESS)
}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use recond_model::{Project, ProjectStats, ProjectSummary};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(rename = "projectName")]
    pub project_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTargetRequest {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveTargetQuery {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<ProjectSummary>>> {
    Ok(Json(state.scope.list_projects().await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = state.scope.create_project(&req.project_name).await?;
    info!(project = %project.name, "created project");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.scope.get_project(&name).await?))
}

pub async fn add_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AddTargetRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = state.scope.add_target(&name, &req.target, &req.kind).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn remove_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RemoveTargetQuery>,
) -> AppResult<Json<Project>> {
    Ok(Json(
        state
            .scope
            .remove_target(&name, &query.target, &query.kind)
            .await?,
    ))
}

pub async fn project_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<ProjectStats>> {
    Ok(Json(state.scope.project_stats(&name).await?))
}

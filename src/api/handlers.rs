use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, Sse},
        Html,
    },
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::api::dashboard::render_dashboard;
use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::api::stream::sse_response;
use crate::error::ValidationError;
use crate::types::FactoryConfig;

#[derive(Deserialize)]
pub struct GoalUpdate {
    pub goal: Option<String>,
}

#[derive(Deserialize)]
pub struct BackstoryUpdate {
    pub backstory: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Serialize)]
pub struct TeamMember {
    pub role: &'static str,
    pub status: &'static str,
    pub progress: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMetrics {
    pub tasks_completed: u32,
    pub tasks_in_progress: u32,
    pub tasks_pending: u32,
}

#[derive(Debug, Serialize)]
pub struct TeamStatus {
    pub members: Vec<TeamMember>,
    pub metrics: TeamMetrics,
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let controller = &state.controller;
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "crew": controller.state().await.as_str(),
        "generation": controller.generation().await,
    }))
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_dashboard(&state.controller.factory_config()))
}

pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    log::info!("Stream client connected");
    sse_response(state.controller.channel().clone())
}

pub async fn update_factory_goal(
    State(state): State<AppState>,
    payload: Result<Json<GoalUpdate>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = payload?;
    let goal = request
        .goal
        .ok_or(ValidationError::Missing { field: "goal" })?;

    state.controller.update_goal(goal).await?;
    log::info!("Crew restarted after goal update");
    Ok(SuccessResponse::ok())
}

pub async fn update_factory_backstory(
    State(state): State<AppState>,
    payload: Result<Json<BackstoryUpdate>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = payload?;
    let backstory = request
        .backstory
        .ok_or(ValidationError::Missing { field: "backstory" })?;

    state.controller.update_backstory(backstory).await?;
    log::info!("Crew restarted after backstory update");
    Ok(SuccessResponse::ok())
}

pub async fn get_factory_config(State(state): State<AppState>) -> Json<FactoryConfig> {
    Json(state.controller.factory_config())
}

pub async fn restart_crew(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.controller.request_restart().await?;
    Ok(SuccessResponse::ok())
}

/// Sample payload for the dashboard's team panel; not derived from the crew.
pub async fn team_status() -> Json<TeamStatus> {
    Json(TeamStatus {
        members: vec![
            TeamMember {
                role: "Factory Director",
                status: "Active",
                progress: 75,
            },
            TeamMember {
                role: "Project Manager",
                status: "In progress",
                progress: 60,
            },
            TeamMember {
                role: "Developer",
                status: "In progress",
                progress: 80,
            },
            TeamMember {
                role: "Tester",
                status: "Waiting",
                progress: 40,
            },
        ],
        metrics: TeamMetrics {
            tasks_completed: 12,
            tasks_in_progress: 8,
            tasks_pending: 5,
        },
    })
}

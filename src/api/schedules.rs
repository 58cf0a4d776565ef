use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    api::error::ApiError,
    codec::{self, ParseOptions},
    controller::{AppState, ExecutionKind, ExecutionRecord},
    domain::{FieldIssue, Schedule, ScheduleDraft},
    repo::ImportResult,
    weather::ScheduleStatus,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteQuery {
    pub site_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub site_id: Option<String>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    100
}

/// Created or updated schedule, with any soft validation warnings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSchedule {
    #[serde(flatten)]
    pub schedule: ScheduleStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FieldIssue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    pub enabled: Option<bool>,
}

/// Evaluates effective percents, fetching each site's forecast at most once
async fn with_effective(state: &AppState, schedules: Vec<Schedule>) -> Vec<ScheduleStatus> {
    let now = Utc::now();
    let mut sunshine: HashMap<String, Option<u8>> = HashMap::new();
    let mut out = Vec::with_capacity(schedules.len());

    for schedule in schedules {
        let pct = if schedule.is_weather_aware() {
            match sunshine.get(&schedule.energy_site_id) {
                Some(cached) => *cached,
                None => {
                    let pct = state
                        .reconciler
                        .sunshine_for(&schedule.energy_site_id, now)
                        .await;
                    sunshine.insert(schedule.energy_site_id.clone(), pct);
                    pct
                }
            }
        } else {
            None
        };
        out.push(ScheduleStatus::evaluate(schedule, pct));
    }
    out
}

async fn evaluate_one(state: &AppState, schedule: Schedule) -> ScheduleStatus {
    let pct = if schedule.is_weather_aware() {
        state
            .reconciler
            .sunshine_for(&schedule.energy_site_id, Utc::now())
            .await
    } else {
        None
    };
    ScheduleStatus::evaluate(schedule, pct)
}

fn prepare_draft(state: &AppState, mut draft: ScheduleDraft) -> ScheduleDraft {
    let site_missing = draft
        .energy_site_id
        .as_deref()
        .map_or(true, |s| s.trim().is_empty());
    if site_missing {
        draft.energy_site_id = state.cfg.default_site_id().map(str::to_string);
    }
    // server-side timestamps only
    draft.updated_at = None;
    draft
}

/// GET /api/schedules - List schedules with their effective percents
pub async fn list_schedules(
    State(state): State<AppState>,
    Query(q): Query<SiteQuery>,
) -> Json<Vec<ScheduleStatus>> {
    let schedules = match q.site_id.as_deref() {
        Some(site) => state.repos.schedules.list_for_site(site),
        None => state.repos.schedules.list(),
    };
    Json(with_effective(&state, schedules).await)
}

/// GET /api/schedules/:id
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduleStatus>, ApiError> {
    let schedule = state
        .repos
        .schedules
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Schedule group {id}")))?;
    Ok(Json(evaluate_one(&state, schedule).await))
}

/// POST /api/schedules
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(draft): Json<ScheduleDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let mut draft = prepare_draft(&state, draft);
    draft.schedule_group_id = None;

    let validated = draft
        .into_schedule_for(&state.cfg.site_ids(), Uuid::new_v4(), Utc::now())
        .map_err(ApiError::Validation)?;
    let created = state.repos.schedules.create(validated.schedule)?;

    let schedule = evaluate_one(&state, created).await;
    Ok((
        StatusCode::CREATED,
        Json(SavedSchedule {
            schedule,
            warnings: validated.warnings,
        }),
    ))
}

/// PUT /api/schedules/:id - Replace a schedule group
pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<ScheduleDraft>,
) -> Result<Json<SavedSchedule>, ApiError> {
    let existing = state
        .repos
        .schedules
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Schedule group {id}")))?;

    let mut draft = prepare_draft(&state, draft);
    draft.schedule_group_id = Some(id);
    draft.enabled = draft.enabled.or(Some(existing.enabled));

    let validated = draft
        .into_schedule_for(&state.cfg.site_ids(), id, Utc::now())
        .map_err(ApiError::Validation)?;
    let updated = state.repos.schedules.update(id, validated.schedule)?;

    let schedule = evaluate_one(&state, updated).await;
    Ok(Json(SavedSchedule {
        schedule,
        warnings: validated.warnings,
    }))
}

/// PATCH /api/schedules/:id/toggle - Set `enabled`, or flip it without a body
pub async fn toggle_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ToggleRequest>>,
) -> Result<Json<ScheduleStatus>, ApiError> {
    let enabled = body.and_then(|Json(req)| req.enabled);
    let toggled = state.repos.schedules.toggle(id, enabled, Utc::now())?;
    Ok(Json(evaluate_one(&state, toggled).await))
}

/// DELETE /api/schedules/:id
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repos.schedules.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/schedules/import - Multipart upload of an export file
pub async fn import_schedules(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResult>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.file_name().is_some() || field.name() == Some("file");
        if is_file {
            file = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let options = ParseOptions {
        default_site_id: state.cfg.default_site_id().map(str::to_string),
        known_site_ids: Some(state.cfg.site_ids()),
        max_records: state.cfg.import.max_schedules,
    };
    let schedules = codec::parse_with(&bytes, &options, Utc::now())?;
    let result = state
        .repos
        .schedules
        .import(schedules, state.cfg.import.max_schedules)?;

    Ok(Json(result))
}

/// GET /api/schedules/export - Download schedules as an import file
pub async fn export_schedules(
    State(state): State<AppState>,
    Query(q): Query<SiteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let schedules = match q.site_id.as_deref() {
        Some(site) => state.repos.schedules.list_for_site(site),
        None => state.repos.schedules.list(),
    };
    let body = codec::serialize(&schedules)
        .map_err(|e| ApiError::InternalError(format!("export failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"schedules.json\"",
            ),
        ],
        body,
    ))
}

/// GET /api/schedules/history - Recent reconciliation outcomes, newest first
pub async fn execution_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<ExecutionRecord>> {
    Json(
        state
            .reconciler
            .history()
            .recent(q.site_id.as_deref(), q.limit),
    )
}

/// POST /api/schedules/reconcile - Run a reconciliation pass now
pub async fn reconcile_now(State(state): State<AppState>) -> Json<Vec<ExecutionRecord>> {
    Json(state.reconciler.run_tracked(ExecutionKind::Continuous).await)
}

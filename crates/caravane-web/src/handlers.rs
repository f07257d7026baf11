//! HTTP处理器

use crate::auth::AuthenticatedActor;
use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use caravane_core::{
    CareEventPatch, CareEventStatus, ClinicianPatch, ConsultationPatch, ConsultationStatus,
    NewCareEvent, NewClinician, NewConsultation, NewPatient, PageRequest, PatientPatch, Role,
    Specialty,
};
use caravane_database::{CareEventFilter, ClinicianFilter, ConsultationFilter, PatientFilter};
use caravane_workflow::OrientationPatch;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Caravane API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 查询参数
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientQueryParams {
    pub search: Option<String>,
    pub referred_to_generalist: Option<bool>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsultationQueryParams {
    pub search: Option<String>,
    pub patient_id: Option<Uuid>,
    pub clinician_id: Option<Uuid>,
    pub care_event_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
    pub has_orientation_target: Option<bool>,
    pub out_of_network: Option<bool>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClinicianQueryParams {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub specialty: Option<Specialty>,
    pub active: Option<bool>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CareEventQueryParams {
    pub search: Option<String>,
    pub status: Option<CareEventStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl AppState {
    fn page(&self, page: Option<usize>, limit: Option<usize>) -> PageRequest {
        PageRequest::new(page.unwrap_or(1), limit.unwrap_or(self.default_page_size))
    }
}

// ========== 患者 ==========

pub async fn list_patients(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<PatientQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = PatientFilter {
        search: params.search,
        referred_to_generalist: params.referred_to_generalist,
        ..Default::default()
    };
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.list_patients(&actor, filter, page).await?))
}

pub async fn create_patient(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(data): Json<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.create_patient(&actor, data).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_patient(&actor, id).await?))
}

pub async fn update_patient(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(patch): Json<PatientPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.update_patient(&actor, id, patch).await?))
}

pub async fn refer_patient(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.refer_to_generalist(&actor, id).await?))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_patient(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== 会诊 ==========

pub async fn list_consultations(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<ConsultationQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = ConsultationFilter {
        search: params.search,
        patient_id: params.patient_id,
        clinician_id: params.clinician_id,
        care_event_id: params.care_event_id,
        status: params.status,
        has_orientation_target: params.has_orientation_target.unwrap_or(false),
        out_of_network: params.out_of_network,
        ..Default::default()
    };
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.list_consultations(&actor, filter, page).await?))
}

pub async fn create_consultation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(data): Json<NewConsultation>,
) -> ApiResult<impl IntoResponse> {
    let consultation = state.engine.create_consultation(&actor, data).await?;
    Ok((StatusCode::CREATED, Json(consultation)))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_consultation(&actor, id).await?))
}

pub async fn update_consultation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(patch): Json<ConsultationPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.update_consultation(&actor, id, patch).await?))
}

pub async fn update_orientation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(patch): Json<OrientationPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.update_orientation(&actor, id, patch).await?))
}

pub async fn delete_consultation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_consultation(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== 队列与统计 ==========

pub async fn intake_queue(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.intake_queue(&actor, params.search, page).await?))
}

pub async fn generalist_queue(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.generalist_queue(&actor, params.search, page).await?))
}

pub async fn specialist_queue(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.specialist_queue(&actor, params.search, page).await?))
}

pub async fn referred_out(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.referred_out(&actor).await?))
}

pub async fn out_of_network(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.out_of_network(&actor).await?))
}

pub async fn specialist_workload(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.specialist_workload(&actor).await?))
}

pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.dashboard(&actor).await?))
}

// ========== 医务人员 ==========

pub async fn list_clinicians(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<ClinicianQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = ClinicianFilter {
        search: params.search,
        role: params.role,
        specialty: params.specialty,
        active: params.active,
    };
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.list_clinicians(&actor, filter, page).await?))
}

pub async fn create_clinician(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(data): Json<NewClinician>,
) -> ApiResult<impl IntoResponse> {
    let clinician = state.engine.create_clinician(&actor, data).await?;
    Ok((StatusCode::CREATED, Json(clinician)))
}

pub async fn get_clinician(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_clinician(&actor, id).await?))
}

pub async fn update_clinician(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(patch): Json<ClinicianPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.update_clinician(&actor, id, patch).await?))
}

pub async fn delete_clinician(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_clinician(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== 大篷车活动 ==========

pub async fn list_care_events(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<CareEventQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = CareEventFilter {
        search: params.search,
        status: params.status,
    };
    let page = state.page(params.page, params.limit);
    Ok(Json(state.engine.list_care_events(&actor, filter, page).await?))
}

pub async fn create_care_event(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(data): Json<NewCareEvent>,
) -> ApiResult<impl IntoResponse> {
    let care_event = state.engine.create_care_event(&actor, data).await?;
    Ok((StatusCode::CREATED, Json(care_event)))
}

pub async fn get_care_event(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_care_event(&actor, id).await?))
}

pub async fn update_care_event(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(patch): Json<CareEventPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.update_care_event(&actor, id, patch).await?))
}

pub async fn delete_care_event(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_care_event(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

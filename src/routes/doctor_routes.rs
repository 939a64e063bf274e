// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AppState, AvailabilityRule, Doctor, OkResponse, Slot},
    scheduling::{generate_slots, moment_on},
    store::DoctorPatch,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/doctors/search", get(search_doctors))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route("/doctors/{doctor_id}/availability", get(get_availability))
}

/* ============================================================
   Listing and search
   ============================================================ */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorListItem {
    #[serde(flatten)]
    pub doctor: Doctor,
    /// Mean review rating, 0 when unreviewed.
    pub avg_rating: f64,
}

pub async fn list_doctors(
    State(state): State<AppState>,
) -> Result<Json<Vec<DoctorListItem>>, ApiError> {
    let averages = state.reviews.average_ratings().await?;
    let items = state
        .doctors
        .list()
        .await?
        .into_iter()
        .map(|doctor| {
            let avg_rating = averages.get(&doctor.id).copied().unwrap_or(0.0);
            DoctorListItem { doctor, avg_rating }
        })
        .collect();
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search_doctors(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let q = query.q.unwrap_or_default();
    Ok(Json(state.doctors.search(q.trim()).await?))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, ApiError> {
    let doctor = state
        .doctors
        .find(doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    Ok(Json(doctor))
}

/* ============================================================
   Create / update / delete
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoctorRequest {
    pub name: String,
    pub specialization: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hospital: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub languages: Option<String>,
    #[serde(default)]
    pub availability_rules: Vec<AvailabilityRule>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    if req.name.trim().is_empty() || req.specialization.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "name and specialization are required".into(),
        ));
    }
    for rule in &req.availability_rules {
        rule.validate()?;
    }

    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        specialization: req.specialization.trim().to_string(),
        email: req.email,
        phone: req.phone,
        hospital: req.hospital,
        experience: req.experience,
        education: req.education,
        certifications: req.certifications,
        languages: req.languages,
        availability_rules: req.availability_rules,
    };
    state.doctors.insert(&doctor).await?;

    Ok((StatusCode::CREATED, Json(doctor)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hospital: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub languages: Option<String>,
    pub availability_rules: Option<Vec<AvailabilityRule>>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<Doctor>, ApiError> {
    if let Some(rules) = &req.availability_rules {
        for rule in rules {
            rule.validate()?;
        }
    }

    let patch = DoctorPatch {
        name: req.name,
        specialization: req.specialization,
        email: req.email,
        phone: req.phone,
        hospital: req.hospital,
        experience: req.experience,
        education: req.education,
        certifications: req.certifications,
        languages: req.languages,
        availability_rules: req.availability_rules,
    };

    let doctor = state
        .doctors
        .update(doctor_id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    Ok(Json(doctor))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    if !state.doctors.delete(doctor_id).await? {
        return Err(ApiError::NotFound("Doctor not found".into()));
    }
    Ok(Json(OkResponse::new()))
}

/* ============================================================
   GET /doctors/{id}/availability?from=&to=
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn get_availability(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Slot>>, ApiError> {
    let doctor = state
        .doctors
        .find(doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;

    let (Some(from), Some(to)) = (query.from, query.to) else {
        return Err(ApiError::InvalidInput("from and to query required".into()));
    };
    let from = parse_day(&from)?;
    let to = parse_day(&to)?;

    // appointments for the booked flag: the whole civil range, end inclusive
    let range_start = moment_on(from, midnight(), state.clinic_offset)
        .ok_or_else(|| ApiError::InvalidInput("from is out of range".into()))?;
    let range_end = to
        .succ_opt()
        .and_then(|d| moment_on(d, midnight(), state.clinic_offset))
        .ok_or_else(|| ApiError::InvalidInput("to is out of range".into()))?;
    let booked = state
        .appointments
        .starts_in_range(doctor_id, range_start, range_end)
        .await?;

    let slots = generate_slots(
        &doctor.availability_rules,
        from,
        to,
        &booked,
        state.clinic_offset,
    );
    Ok(Json(slots))
}

fn parse_day(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::InvalidInput("dates must be YYYY-MM-DD".into()))
}

fn midnight() -> chrono::NaiveTime {
    chrono::NaiveTime::MIN
}

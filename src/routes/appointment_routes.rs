// src/routes/appointment_routes.rs

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::{format_civil_date, format_civil_time},
    error::ApiError,
    models::{ApiOk, Appointment, AppointmentStatus, OkResponse, AppState},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(book_appointment).get(list_appointments))
        .route("/appointments/doctor/{doctor_id}", get(doctor_calendar))
        .route("/appointments/{appointment_id}/confirm", patch(confirm_appointment))
        .route("/appointments/{appointment_id}", delete(delete_appointment))
}

/* ============================================================
   POST /appointments (book)
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doctor: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    /// RFC 3339 instant of the chosen slot start.
    pub start: String,
}

pub async fn book_appointment(
    State(state): State<AppState>,
    Json(req): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<Appointment>>), ApiError> {
    if req.patient_name.trim().is_empty() || req.patient_email.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Doctor, patient name, and start time are required".into(),
        ));
    }

    let appointment = state
        .booking
        .book(
            req.doctor,
            req.patient_name.trim(),
            req.patient_email.trim(),
            &req.start,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiOk { data: appointment })))
}

/* ============================================================
   GET /appointments?status=
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorBrief {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListItem {
    pub id: Uuid,
    pub patient_name: String,
    pub doctor: Option<DoctorBrief>,
    /// Display fields at the clinic offset, e.g. "24/8/2026" and "9:00 AM".
    pub date: String,
    pub time: String,
    pub status: AppointmentStatus,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentListItem>>>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            AppointmentStatus::parse(raw)
                .ok_or_else(|| ApiError::InvalidInput("status must be pending or confirmed".into()))?,
        ),
    };

    let appointments = state.appointments.list(status).await?;
    let briefs: HashMap<Uuid, DoctorBrief> = state
        .doctors
        .list()
        .await?
        .into_iter()
        .map(|d| {
            (
                d.id,
                DoctorBrief {
                    id: d.id,
                    name: d.name,
                    specialization: d.specialization,
                },
            )
        })
        .collect();

    let items = appointments
        .into_iter()
        .map(|a| {
            let local = a.starts_at.with_timezone(&state.clinic_offset);
            AppointmentListItem {
                id: a.id,
                patient_name: a.patient_name,
                doctor: briefs.get(&a.doctor_id).map(|b| DoctorBrief {
                    id: b.id,
                    name: b.name.clone(),
                    specialization: b.specialization.clone(),
                }),
                date: format_civil_date(local.date_naive()),
                time: format_civil_time(local.time()),
                status: a.status,
            }
        })
        .collect();

    Ok(Json(ApiOk { data: items }))
}

/* ============================================================
   GET /appointments/doctor/{id} (calendar feed)
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct CalendarEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn doctor_calendar(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Vec<CalendarEntry>>, ApiError> {
    let appointments = state.appointments.by_doctor(doctor_id).await?;
    let entries = appointments
        .into_iter()
        .map(|a| CalendarEntry {
            start: a.starts_at,
            end: a.starts_at + chrono::Duration::minutes(i64::from(a.duration_minutes)),
        })
        .collect();
    Ok(Json(entries))
}

/* ============================================================
   Confirm / delete
   ============================================================ */

pub async fn confirm_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appointment = state.booking.confirm(appointment_id).await?;
    Ok(Json(ApiOk { data: appointment }))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    if !state.appointments.delete(appointment_id).await? {
        return Err(ApiError::NotFound("Appointment not found".into()));
    }
    Ok(Json(OkResponse::new()))
}

//! In-memory fakes for the storage and mail seams; unit tests only.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::models::{Appointment, AppointmentStatus, Doctor, Review};
use crate::store::{AppointmentStore, DoctorPatch, DoctorStore, ReviewStore};

#[derive(Default)]
pub struct MemDoctorStore {
    doctors: Mutex<Vec<Doctor>>,
}

impl MemDoctorStore {
    pub fn with(doctors: Vec<Doctor>) -> Self {
        Self {
            doctors: Mutex::new(doctors),
        }
    }
}

#[async_trait]
impl DoctorStore for MemDoctorStore {
    async fn list(&self) -> Result<Vec<Doctor>, ApiError> {
        Ok(self.doctors.lock().unwrap().clone())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Doctor>, ApiError> {
        Ok(self
            .doctors
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn search(&self, query: &str) -> Result<Vec<Doctor>, ApiError> {
        let needle = query.to_lowercase();
        Ok(self
            .doctors
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                d.name.to_lowercase().contains(&needle)
                    || d.specialization.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn insert(&self, doctor: &Doctor) -> Result<(), ApiError> {
        self.doctors.lock().unwrap().push(doctor.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: DoctorPatch) -> Result<Option<Doctor>, ApiError> {
        let mut doctors = self.doctors.lock().unwrap();
        let Some(doctor) = doctors.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            doctor.name = name;
        }
        if let Some(specialization) = patch.specialization {
            doctor.specialization = specialization;
        }
        if let Some(rules) = patch.availability_rules {
            doctor.availability_rules = rules;
        }
        Ok(Some(doctor.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut doctors = self.doctors.lock().unwrap();
        let before = doctors.len();
        doctors.retain(|d| d.id != id);
        Ok(doctors.len() < before)
    }
}

#[derive(Default)]
pub struct MemAppointmentStore {
    appointments: Mutex<Vec<Appointment>>,
}

impl MemAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for MemAppointmentStore {
    async fn starts_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ApiError> {
        let mut starts: Vec<DateTime<Utc>> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.starts_at >= from && a.starts_at < to)
            .map(|a| a.starts_at)
            .collect();
        starts.sort();
        Ok(starts)
    }

    async fn exists_at(&self, doctor_id: Uuid, moment: DateTime<Utc>) -> Result<bool, ApiError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .any(|a| a.doctor_id == doctor_id && a.starts_at == moment))
    }

    async fn try_insert(&self, appointment: &Appointment) -> Result<bool, ApiError> {
        let mut appointments = self.appointments.lock().unwrap();
        let taken = appointments
            .iter()
            .any(|a| a.doctor_id == appointment.doctor_id && a.starts_at == appointment.starts_at);
        if taken {
            return Ok(false);
        }
        appointments.push(appointment.clone());
        Ok(true)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, ApiError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn list(&self, status: Option<AppointmentStatus>) -> Result<Vec<Appointment>, ApiError> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(rows)
    }

    async fn by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, ApiError> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.starts_at);
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, ApiError> {
        let mut appointments = self.appointments.lock().unwrap();
        let Some(appointment) = appointments.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        appointment.status = status;
        Ok(Some(appointment.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut appointments = self.appointments.lock().unwrap();
        let before = appointments.len();
        appointments.retain(|a| a.id != id);
        Ok(appointments.len() < before)
    }
}

#[derive(Default)]
pub struct MemReviewStore {
    reviews: Mutex<Vec<Review>>,
}

impl MemReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for MemReviewStore {
    async fn by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Review>, ApiError> {
        let mut rows: Vec<Review> = self
            .reviews
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, review: &Review) -> Result<(), ApiError> {
        self.reviews.lock().unwrap().push(review.clone());
        Ok(())
    }

    async fn average_ratings(&self) -> Result<HashMap<Uuid, f64>, ApiError> {
        let reviews = self.reviews.lock().unwrap();
        let mut sums: HashMap<Uuid, (f64, u32)> = HashMap::new();
        for review in reviews.iter() {
            let entry = sums.entry(review.doctor_id).or_insert((0.0, 0));
            entry.0 += f64::from(review.rating);
            entry.1 += 1;
        }
        Ok(sums
            .into_iter()
            .map(|(id, (sum, n))| (id, sum / f64::from(n)))
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _text: &str,
        _html: Option<&str>,
    ) -> Result<(), ApiError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct FailMailer;

#[async_trait]
impl Mailer for FailMailer {
    async fn send(
        &self,
        _to: &str,
        _subject: &str,
        _text: &str,
        _html: Option<&str>,
    ) -> Result<(), ApiError> {
        Err(ApiError::Transport("mail api unreachable".into()))
    }
}

/// Fully wired `AppState` over the in-memory fakes, for handler tests.
pub fn app_state(
    doctors: std::sync::Arc<MemDoctorStore>,
    appointments: std::sync::Arc<MemAppointmentStore>,
    reviews: std::sync::Arc<MemReviewStore>,
) -> crate::models::AppState {
    use std::sync::Arc;

    let offset = chrono::FixedOffset::east_opt(0).unwrap();
    let mailer = Arc::new(RecordingMailer::new());
    let sessions = Arc::new(crate::chat::MemorySessionStore::new());
    let booking = Arc::new(crate::booking::BookingService::new(
        doctors.clone(),
        appointments.clone(),
        mailer,
        offset,
    ));
    let chat = Arc::new(crate::chat::ChatEngine::new(
        doctors.clone(),
        appointments.clone(),
        sessions,
        offset,
    ));
    crate::models::AppState {
        doctors,
        appointments,
        reviews,
        booking,
        chat,
        clinic_offset: offset,
    }
}

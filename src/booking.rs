//! Booking resolution: validates a requested moment against the doctor's
//! rules and existing appointments, persists the reservation, and fires the
//! outbound notices.
//!
//! Notification policy, deliberately asymmetric: a failed booking-received
//! notice is logged and the booking still succeeds; a failed confirmation
//! notice leaves the appointment confirmed but fails the call.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::models::{Appointment, AppointmentStatus, Doctor};
use crate::scheduling::find_covering_rule;
use crate::store::{AppointmentStore, DoctorStore};

pub struct BookingService {
    doctors: Arc<dyn DoctorStore>,
    appointments: Arc<dyn AppointmentStore>,
    mailer: Arc<dyn Mailer>,
    clinic_offset: FixedOffset,
}

impl BookingService {
    pub fn new(
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        mailer: Arc<dyn Mailer>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            doctors,
            appointments,
            mailer,
            clinic_offset,
        }
    }

    /// Preconditions, in order: doctor exists, the start moment parses as
    /// RFC 3339, slot free, a rule covers the moment's civil day. The insert
    /// is conditional on the storage-level (doctor, moment) uniqueness, so a
    /// lost race also reports `Conflict`.
    pub async fn book(
        &self,
        doctor_id: Uuid,
        patient_name: &str,
        patient_contact: &str,
        start_raw: &str,
    ) -> Result<Appointment, ApiError> {
        let doctor = self
            .doctors
            .find(doctor_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;

        let starts_at: DateTime<Utc> = start_raw
            .trim()
            .parse()
            .map_err(|_| ApiError::InvalidInput("Invalid date/time".into()))?;

        if self.appointments.exists_at(doctor_id, starts_at).await? {
            return Err(ApiError::Conflict("Slot already booked".into()));
        }

        let rule = find_covering_rule(&doctor.availability_rules, starts_at, self.clinic_offset)
            .ok_or_else(|| ApiError::NoAvailability("No slot available for this day".into()))?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_name: patient_name.to_string(),
            patient_contact: patient_contact.to_string(),
            starts_at,
            duration_minutes: rule.duration_minutes,
            status: AppointmentStatus::Pending,
        };

        if !self.appointments.try_insert(&appointment).await? {
            return Err(ApiError::Conflict("Slot already booked".into()));
        }

        // booking success and notice delivery are independent outcomes
        if let Err(e) = self.send_request_received(&doctor, &appointment).await {
            tracing::warn!("failed to send booking notice: {e}");
        }

        Ok(appointment)
    }

    /// Unconditional Pending -> Confirmed; confirming twice succeeds. A failed
    /// confirmation notice fails the call without reverting the status.
    pub async fn confirm(&self, id: Uuid) -> Result<Appointment, ApiError> {
        let appointment = self
            .appointments
            .set_status(id, AppointmentStatus::Confirmed)
            .await?
            .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;

        if !looks_like_email(&appointment.patient_contact) {
            // chat bookings carry a phone number; nothing to send
            return Ok(appointment);
        }

        let doctor = self.doctors.find(appointment.doctor_id).await?;
        let doctor_name = doctor.as_ref().map_or("your doctor", |d| d.name.as_str());

        let when = format_moment(appointment.starts_at, self.clinic_offset);
        let text = format!(
            "Hello {},\n\nYour appointment with Dr. {} on {} has been successfully confirmed.\n\nThank you!",
            appointment.patient_name, doctor_name, when
        );
        self.mailer
            .send(
                &appointment.patient_contact,
                "Your Appointment is Confirmed!",
                &text,
                None,
            )
            .await?;

        Ok(appointment)
    }

    async fn send_request_received(
        &self,
        doctor: &Doctor,
        appointment: &Appointment,
    ) -> Result<(), ApiError> {
        if !looks_like_email(&appointment.patient_contact) {
            return Ok(());
        }
        let when = format_moment(appointment.starts_at, self.clinic_offset);
        let hospital = doctor.hospital.as_deref().unwrap_or("N/A");
        let text = format!(
            "Hello {},\n\n\
             We have received your appointment request with Dr. {} ({}).\n\
             Date & Time: {}\n\
             Hospital / Clinic: {}\n\n\
             Your appointment is currently pending. You will receive a \
             confirmation email once Dr. {} confirms the appointment.\n\n\
             Thank you for choosing our service!",
            appointment.patient_name, doctor.name, doctor.specialization, when, hospital, doctor.name
        );
        self.mailer
            .send(
                &appointment.patient_contact,
                "Appointment Request Received",
                &text,
                None,
            )
            .await
    }
}

fn looks_like_email(contact: &str) -> bool {
    contact.contains('@')
}

/// "24/8/2026 9:00 AM" at the clinic offset, matching the admin-facing lists.
pub fn format_moment(moment: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = moment.with_timezone(&offset);
    format!(
        "{} {}",
        format_civil_date(local.date_naive()),
        format_civil_time(local.time())
    )
}

pub fn format_civil_date(date: chrono::NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

pub fn format_civil_time(time: chrono::NaiveTime) -> String {
    use chrono::Timelike;
    let (is_pm, hour12) = time.hour12();
    let suffix = if is_pm { "PM" } else { "AM" };
    format!("{}:{:02} {}", hour12, time.minute(), suffix)
}

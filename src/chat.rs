//! Rule-based conversational booking. Drives the same doctors/appointments
//! stores as the HTTP path, but from per-session state instead of a single
//! request. The chat path inserts the appointment straight from the chosen
//! rule, without the resolver's conflict and rule re-validation; only the
//! storage-level uniqueness constraint stands in the way of a duplicate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::booking::{format_civil_date, format_civil_time};
use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentStatus, AvailabilityRule, DAY_NAMES, Doctor, Recurrence,
};
use crate::scheduling::{moment_on, rule_applies_on};
use crate::store::{AppointmentStore, DoctorStore};

const FILLER_TOKENS: [&str; 4] = ["doctor", "please", "show", "available"];
const INFO_KEYWORDS: [&str; 7] = [
    "email",
    "phone",
    "hospital",
    "experience",
    "specialization",
    "timing",
    "view timing",
];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MENU_TEXT: &str = "I can help with:\n\
    - Doctor search\n\
    - Doctor profile\n\
    - Clinic timing\n\
    - Appointment booking\n\n\
    Type a doctor name or specialization";

#[derive(Debug, Clone, Serialize)]
pub struct BotMessage {
    pub from: &'static str,
    pub text: String,
}

impl BotMessage {
    fn bot(text: impl Into<String>) -> Self {
        BotMessage {
            from: "bot",
            text: text.into(),
        }
    }
}

/* ============================================================
   Session state
   ============================================================ */

/// Where a conversation stands in the booking flow. Absent entry = idle.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStep {
    SelectingDoctor,
    SelectingSlot {
        doctor_id: Uuid,
    },
    AwaitingPatientDetails {
        doctor_id: Uuid,
        rule: AvailabilityRule,
    },
}

/// Injectable session backing: in-memory for a single instance, an external
/// store for anything bigger.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ChatStep>, ApiError>;
    async fn put(&self, session_id: &str, step: ChatStep) -> Result<(), ApiError>;
    async fn remove(&self, session_id: &str) -> Result<(), ApiError>;
}

/// Process-local sessions, no expiry.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<String, ChatStep>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ChatStep>, ApiError> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    async fn put(&self, session_id: &str, step: ChatStep) -> Result<(), ApiError> {
        self.lock()?.insert(session_id.to_string(), step);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), ApiError> {
        self.lock()?.remove(session_id);
        Ok(())
    }
}

impl MemorySessionStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ChatStep>>, ApiError> {
        self.inner
            .lock()
            .map_err(|_| ApiError::Internal("session store poisoned".into()))
    }
}

/* ============================================================
   Engine
   ============================================================ */

pub struct ChatEngine {
    doctors: Arc<dyn DoctorStore>,
    appointments: Arc<dyn AppointmentStore>,
    sessions: Arc<dyn SessionStore>,
    clinic_offset: FixedOffset,
}

impl ChatEngine {
    pub fn new(
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        sessions: Arc<dyn SessionStore>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            doctors,
            appointments,
            sessions,
            clinic_offset,
        }
    }

    /// One conversational turn. Only storage faults surface as errors; every
    /// other failure becomes a bot message and the session stays alive.
    pub async fn handle(&self, session_id: &str, message: &str) -> Result<Vec<BotMessage>, ApiError> {
        let text = normalize(message);
        let all_doctors = self.doctors.list().await?;

        // global commands short-circuit regardless of state
        if ["help", "menu", "what can you do"].contains(&text.as_str()) {
            self.sessions.remove(session_id).await?;
            return Ok(vec![BotMessage::bot(MENU_TEXT)]);
        }
        if ["cancel", "restart"].contains(&text.as_str()) {
            self.sessions.remove(session_id).await?;
            return Ok(vec![BotMessage::bot("Booking cancelled. How can I help you?")]);
        }

        // doctor info lookups: keyword plus a doctor name in the same message
        for keyword in INFO_KEYWORDS {
            if !text.contains(keyword) {
                continue;
            }
            let Some(doctor) = all_doctors
                .iter()
                .find(|d| text.contains(&d.name.to_lowercase()))
            else {
                continue;
            };
            let reply = if keyword == "timing" || keyword == "view timing" {
                self.timings_text(doctor)
            } else {
                doctor_details_text(doctor)
            };
            return Ok(vec![BotMessage::bot(reply)]);
        }

        // active booking session
        if let Some(step) = self.sessions.get(session_id).await? {
            return match step {
                ChatStep::SelectingDoctor => {
                    self.select_doctor(session_id, &text, &all_doctors).await
                }
                ChatStep::SelectingSlot { doctor_id } => {
                    self.select_slot(session_id, &text, doctor_id).await
                }
                ChatStep::AwaitingPatientDetails { doctor_id, rule } => {
                    self.take_patient_details(session_id, &text, doctor_id, rule)
                        .await
                }
            };
        }

        // name / specialization search
        let mut matches: Vec<&Doctor> = all_doctors
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&text))
            .collect();
        for doctor in all_doctors
            .iter()
            .filter(|d| d.specialization.to_lowercase().contains(&text))
        {
            if !matches.iter().any(|m| m.id == doctor.id) {
                matches.push(doctor);
            }
        }
        if !matches.is_empty() {
            return Ok(matches
                .into_iter()
                .map(|d| BotMessage::bot(doctor_summary_text(d)))
                .collect());
        }

        if text == "doctor" || text == "doctors" {
            return Ok(all_doctors
                .iter()
                .map(|d| {
                    BotMessage::bot(format!(
                        "{} ({}) - {}",
                        d.name,
                        d.specialization,
                        d.hospital.as_deref().unwrap_or("N/A")
                    ))
                })
                .collect());
        }

        // booking intent
        if text.contains("book") {
            self.sessions
                .put(session_id, ChatStep::SelectingDoctor)
                .await?;
            return Ok(vec![BotMessage::bot(
                "Appointment booking:\n\
                 1. Type the doctor's name\n\
                 2. Pick a slot number\n\
                 3. Send the patient details\n\n\
                 Type the doctor name to start booking.",
            )]);
        }

        Ok(vec![BotMessage::bot(MENU_TEXT)])
    }

    async fn select_doctor(
        &self,
        session_id: &str,
        text: &str,
        all_doctors: &[Doctor],
    ) -> Result<Vec<BotMessage>, ApiError> {
        let matches: Vec<&Doctor> = all_doctors
            .iter()
            .filter(|d| d.name.to_lowercase().contains(text))
            .collect();
        let [doctor] = matches.as_slice() else {
            return Ok(vec![BotMessage::bot(
                "Doctor not found. Please type the exact doctor name.",
            )]);
        };

        if doctor.availability_rules.is_empty() {
            return Ok(vec![BotMessage::bot(format!(
                "No available slots for {}. Type another doctor name.",
                doctor.name
            ))]);
        }

        self.sessions
            .put(session_id, ChatStep::SelectingSlot { doctor_id: doctor.id })
            .await?;

        Ok(vec![BotMessage::bot(format!(
            "{}\nSpecialization: {}\nHospital: {}\n\nAvailable timings:\n{}\n\nType the slot number",
            doctor.name,
            doctor.specialization,
            doctor.hospital.as_deref().unwrap_or("N/A"),
            numbered_rules(&doctor.availability_rules)
        ))])
    }

    async fn select_slot(
        &self,
        session_id: &str,
        text: &str,
        doctor_id: Uuid,
    ) -> Result<Vec<BotMessage>, ApiError> {
        let Some(doctor) = self.doctors.find(doctor_id).await? else {
            self.sessions.remove(session_id).await?;
            return Ok(vec![BotMessage::bot(
                "That doctor is no longer available. Type \"book\" to start again.",
            )]);
        };

        let chosen = text
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| doctor.availability_rules.get(i));
        let Some(rule) = chosen else {
            return Ok(vec![BotMessage::bot(
                "Invalid slot. Please type the slot number (1, 2, 3...)",
            )]);
        };

        self.sessions
            .put(
                session_id,
                ChatStep::AwaitingPatientDetails {
                    doctor_id,
                    rule: rule.clone(),
                },
            )
            .await?;

        Ok(vec![BotMessage::bot(
            "Patient details\nFormat: Name, Phone\n\nExample:\nSeema, 03012345678",
        )])
    }

    async fn take_patient_details(
        &self,
        session_id: &str,
        text: &str,
        doctor_id: Uuid,
        rule: AvailabilityRule,
    ) -> Result<Vec<BotMessage>, ApiError> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let [patient_name, patient_phone, ..] = parts.as_slice() else {
            return Ok(vec![BotMessage::bot("Invalid format. Use: Name, Phone")]);
        };
        if patient_name.is_empty() || patient_phone.is_empty() {
            return Ok(vec![BotMessage::bot("Invalid format. Use: Name, Phone")]);
        }

        let Some(doctor) = self.doctors.find(doctor_id).await? else {
            self.sessions.remove(session_id).await?;
            return Ok(vec![BotMessage::bot(
                "That doctor is no longer available. Type \"book\" to start again.",
            )]);
        };

        let today = Utc::now().with_timezone(&self.clinic_offset).date_naive();
        let Some(starts_at) = rule_moment(&rule, today, self.clinic_offset) else {
            self.sessions.remove(session_id).await?;
            return Ok(vec![BotMessage::bot(
                "That slot is no longer available. Type \"book\" to start again.",
            )]);
        };

        // direct insert from the rule's raw time; no conflict or rule
        // re-validation on this path, the unique constraint is the only guard
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_name: (*patient_name).to_string(),
            patient_contact: (*patient_phone).to_string(),
            starts_at,
            duration_minutes: rule.duration_minutes,
            status: AppointmentStatus::Pending,
        };
        let inserted = self.appointments.try_insert(&appointment).await?;
        self.sessions.remove(session_id).await?;

        if !inserted {
            return Ok(vec![BotMessage::bot(
                "That slot has just been taken. Type \"book\" to start again.",
            )]);
        }

        Ok(vec![BotMessage::bot(format!(
            "Appointment confirmed!\n\n\
             Doctor: {}\nSpecialization: {}\nHospital: {}\n\n\
             Patient: {}\nPhone: {}\nTime: {}\n\n\
             Thank you for booking!",
            doctor.name,
            doctor.specialization,
            doctor.hospital.as_deref().unwrap_or("N/A"),
            patient_name,
            patient_phone,
            format_rule(&rule)
        ))])
    }

    fn timings_text(&self, doctor: &Doctor) -> String {
        if doctor.availability_rules.is_empty() {
            format!("No available slots for {}", doctor.name)
        } else {
            format!(
                "Available timings for {}:\n{}\nType the slot number to book",
                doctor.name,
                numbered_rules(&doctor.availability_rules)
            )
        }
    }
}

/* ============================================================
   Text helpers
   ============================================================ */

/// Lower-case, trim, strip filler tokens. Applied before any dispatch, so a
/// doctor name containing a filler substring gets mangled here too; known
/// quirk, kept deliberately.
pub fn normalize(message: &str) -> String {
    let mut text = message.trim().to_lowercase();
    for filler in FILLER_TOKENS {
        text = text.replace(filler, "");
    }
    text.trim().to_string()
}

/// The UTC instant a chat booking lands on. Date rules book their raw date
/// and start time, whatever day that is. Weekly rules have no stored date, so
/// the chat path books their next occurrence, today included.
fn rule_moment(rule: &AvailabilityRule, today: NaiveDate, offset: FixedOffset) -> Option<chrono::DateTime<Utc>> {
    match &rule.recurrence {
        Recurrence::Date { date } => moment_on(*date, rule.start_time, offset),
        Recurrence::Weekly { .. } => {
            let mut day = today;
            // a year covers any month/year-constrained weekly rule still bookable
            for _ in 0..366 {
                if rule_applies_on(rule, day) {
                    return moment_on(day, rule.start_time, offset);
                }
                day = day.succ_opt()?;
            }
            None
        }
    }
}

fn numbered_rules(rules: &[AvailabilityRule]) -> String {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, format_rule(rule)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_rule(rule: &AvailabilityRule) -> String {
    let hours = format!(
        "{} - {}",
        format_civil_time(rule.start_time),
        format_civil_time(rule.end_time)
    );
    match &rule.recurrence {
        Recurrence::Weekly {
            day_of_week,
            month,
            year,
        } => {
            let mut label = format!("{} {}", DAY_NAMES[usize::from(*day_of_week % 7)], hours);
            if let Some(m) = month {
                label.push_str(&format!(" in {}", MONTH_NAMES[usize::from(*m % 12)]));
            }
            if let Some(y) = year {
                label.push_str(&format!(" {y}"));
            }
            label
        }
        Recurrence::Date { date } => format!("{} on {}", hours, format_civil_date(*date)),
    }
}

fn doctor_details_text(doctor: &Doctor) -> String {
    format!(
        "Doctor details:\n\
         Name: {}\n\
         Specialization: {}\n\
         Hospital: {}\n\
         Experience: {}\n\
         Languages: {}\n\
         Phone: {}\n\
         Email: {}",
        doctor.name,
        doctor.specialization,
        doctor.hospital.as_deref().unwrap_or("N/A"),
        doctor.experience.as_deref().unwrap_or("N/A"),
        doctor.languages.as_deref().unwrap_or("N/A"),
        doctor.phone.as_deref().unwrap_or("N/A"),
        doctor.email.as_deref().unwrap_or("N/A"),
    )
}

fn doctor_summary_text(doctor: &Doctor) -> String {
    format!(
        "{} ({}) - {}\nExperience: {}\nLanguages: {}\nType \"view timing\" or \"book appointment\"",
        doctor.name,
        doctor.specialization,
        doctor.hospital.as_deref().unwrap_or("N/A"),
        doctor.experience.as_deref().unwrap_or("N/A"),
        doctor.languages.as_deref().unwrap_or("N/A"),
    )
}

/* ============================================================
   Tests
   ============================================================ */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemAppointmentStore, MemDoctorStore};
    use chrono::NaiveTime;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sara() -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            name: "Sara Khan".into(),
            specialization: "Cardiology".into(),
            email: Some("sara@clinic.local".into()),
            phone: Some("021-1234567".into()),
            hospital: Some("City Hospital".into()),
            experience: Some("10 years".into()),
            education: None,
            certifications: None,
            languages: Some("English, Urdu".into()),
            availability_rules: vec![
                AvailabilityRule {
                    recurrence: Recurrence::Date {
                        date: "2030-06-03".parse().unwrap(),
                    },
                    start_time: t(9, 0),
                    end_time: t(10, 0),
                    duration_minutes: 30,
                },
                AvailabilityRule {
                    recurrence: Recurrence::Weekly {
                        day_of_week: 2,
                        month: None,
                        year: None,
                    },
                    start_time: t(14, 0),
                    end_time: t(16, 0),
                    duration_minutes: 30,
                },
            ],
        }
    }

    struct Fixture {
        engine: ChatEngine,
        appointments: Arc<MemAppointmentStore>,
        sessions: Arc<MemorySessionStore>,
        doctor_id: Uuid,
    }

    fn fixture() -> Fixture {
        let doctor = sara();
        let doctor_id = doctor.id;
        let doctors = Arc::new(MemDoctorStore::with(vec![doctor]));
        let appointments = Arc::new(MemAppointmentStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let engine = ChatEngine::new(doctors, appointments.clone(), sessions.clone(), utc());
        Fixture {
            engine,
            appointments,
            sessions,
            doctor_id,
        }
    }

    #[test]
    fn normalization_strips_fillers_and_case() {
        assert_eq!(normalize("  Please SHOW available doctors  "), "s");
        assert_eq!(normalize("Doctor Sara Khan"), "sara khan");
        // a name containing a filler substring gets mangled; documented quirk
        assert_eq!(normalize("Peter Showalter"), "peter alter");
    }

    #[tokio::test]
    async fn book_intent_opens_a_session() {
        let f = fixture();
        let replies = f.engine.handle("s1", "book appointment").await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            f.sessions.get("s1").await.unwrap(),
            Some(ChatStep::SelectingDoctor)
        );
    }

    #[tokio::test]
    async fn full_booking_walk_creates_pending_appointment() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();

        let replies = f.engine.handle("s1", "Sara Khan").await.unwrap();
        // numbered list with one line per rule
        let listing = &replies[0].text;
        assert!(listing.contains("1. "));
        assert!(listing.contains("2. "));
        assert!(!listing.contains("3. "));
        assert!(matches!(
            f.sessions.get("s1").await.unwrap(),
            Some(ChatStep::SelectingSlot { .. })
        ));

        f.engine.handle("s1", "1").await.unwrap();
        assert!(matches!(
            f.sessions.get("s1").await.unwrap(),
            Some(ChatStep::AwaitingPatientDetails { .. })
        ));

        let replies = f.engine.handle("s1", "Ana, 0300111222").await.unwrap();
        assert!(replies[0].text.contains("Appointment confirmed"));
        assert_eq!(f.sessions.get("s1").await.unwrap(), None);

        let stored = f.appointments.by_doctor(f.doctor_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, AppointmentStatus::Pending);
        assert_eq!(stored[0].patient_name, "ana");
        assert_eq!(stored[0].patient_contact, "0300111222");
        // first rule is the dated one: its raw date and start time
        let expected = moment_on("2030-06-03".parse().unwrap(), t(9, 0), utc()).unwrap();
        assert_eq!(stored[0].starts_at, expected);
    }

    #[tokio::test]
    async fn date_rule_books_its_raw_date_even_when_past() {
        let mut doctor = sara();
        doctor.availability_rules = vec![AvailabilityRule {
            recurrence: Recurrence::Date {
                date: "2020-01-06".parse().unwrap(),
            },
            start_time: t(9, 0),
            end_time: t(10, 0),
            duration_minutes: 30,
        }];
        let doctor_id = doctor.id;
        let doctors = Arc::new(MemDoctorStore::with(vec![doctor]));
        let appointments = Arc::new(MemAppointmentStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let engine = ChatEngine::new(doctors, appointments.clone(), sessions, utc());

        engine.handle("s1", "book").await.unwrap();
        engine.handle("s1", "Sara").await.unwrap();
        engine.handle("s1", "1").await.unwrap();
        let replies = engine.handle("s1", "Ana, 0300111222").await.unwrap();
        assert!(replies[0].text.contains("Appointment confirmed"));

        let stored = appointments.by_doctor(doctor_id).await.unwrap();
        let expected = moment_on("2020-01-06".parse().unwrap(), t(9, 0), utc()).unwrap();
        assert_eq!(stored[0].starts_at, expected);
    }

    #[tokio::test]
    async fn invalid_slot_number_keeps_the_session() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();
        f.engine.handle("s1", "Sara").await.unwrap();

        for bad in ["0", "3", "nine"] {
            let replies = f.engine.handle("s1", bad).await.unwrap();
            assert!(replies[0].text.contains("Invalid slot"));
            assert!(matches!(
                f.sessions.get("s1").await.unwrap(),
                Some(ChatStep::SelectingSlot { .. })
            ));
        }
    }

    #[tokio::test]
    async fn malformed_patient_details_keep_the_session() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();
        f.engine.handle("s1", "Sara").await.unwrap();
        f.engine.handle("s1", "2").await.unwrap();

        let replies = f.engine.handle("s1", "just-a-name").await.unwrap();
        assert!(replies[0].text.contains("Invalid format"));
        assert!(matches!(
            f.sessions.get("s1").await.unwrap(),
            Some(ChatStep::AwaitingPatientDetails { .. })
        ));
    }

    #[tokio::test]
    async fn weekly_rule_books_its_next_occurrence() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();
        f.engine.handle("s1", "Sara").await.unwrap();
        f.engine.handle("s1", "2").await.unwrap();
        f.engine.handle("s1", "Ana, 0300111222").await.unwrap();

        let stored = f.appointments.by_doctor(f.doctor_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        let local = stored[0].starts_at.with_timezone(&utc());
        assert_eq!(crate::scheduling::day_of_week(local.date_naive()), 2);
        assert_eq!(local.time(), t(14, 0));
        assert!(local.date_naive() >= Utc::now().date_naive());
    }

    #[tokio::test]
    async fn cancel_resets_from_any_state() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();
        f.engine.handle("s1", "Sara").await.unwrap();
        f.engine.handle("s1", "1").await.unwrap();

        let replies = f.engine.handle("s1", "cancel").await.unwrap();
        assert!(replies[0].text.contains("Booking cancelled"));
        assert_eq!(f.sessions.get("s1").await.unwrap(), None);
        assert!(f.appointments.by_doctor(f.doctor_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn help_resets_the_session_and_shows_the_menu() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();
        let replies = f.engine.handle("s1", "help").await.unwrap();
        assert!(replies[0].text.contains("I can help with"));
        assert_eq!(f.sessions.get("s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_doctor_name_keeps_selecting() {
        let f = fixture();
        f.engine.handle("s1", "book").await.unwrap();
        let replies = f.engine.handle("s1", "Gregory House").await.unwrap();
        assert!(replies[0].text.contains("Doctor not found"));
        assert_eq!(
            f.sessions.get("s1").await.unwrap(),
            Some(ChatStep::SelectingDoctor)
        );
    }

    #[tokio::test]
    async fn idle_search_matches_name_and_specialization() {
        let f = fixture();
        let by_name = f.engine.handle("s1", "sara").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert!(by_name[0].text.contains("Sara Khan"));

        let by_spec = f.engine.handle("s1", "cardio").await.unwrap();
        assert_eq!(by_spec.len(), 1);
        assert!(by_spec[0].text.contains("Cardiology"));

        // search leaves no session behind
        assert_eq!(f.sessions.get("s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn timing_keyword_lists_numbered_slots() {
        let f = fixture();
        let replies = f.engine.handle("s1", "view timing sara khan").await.unwrap();
        assert!(replies[0].text.contains("Available timings for Sara Khan"));
        assert!(replies[0].text.contains("1. "));
    }

    #[tokio::test]
    async fn duplicate_chat_booking_hits_the_storage_guard() {
        let f = fixture();
        for session in ["s1", "s2"] {
            f.engine.handle(session, "book").await.unwrap();
            f.engine.handle(session, "Sara").await.unwrap();
            f.engine.handle(session, "1").await.unwrap();
        }
        let first = f.engine.handle("s1", "Ana, 0300111222").await.unwrap();
        assert!(first[0].text.contains("Appointment confirmed"));
        let second = f.engine.handle("s2", "Bea, 0300999888").await.unwrap();
        assert!(second[0].text.contains("just been taken"));
        assert_eq!(f.appointments.by_doctor(f.doctor_id).await.unwrap().len(), 1);
    }
}

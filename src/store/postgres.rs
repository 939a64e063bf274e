use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentStatus, AvailabilityRule, Doctor, Recurrence, Review,
};
use crate::store::{AppointmentStore, DoctorPatch, DoctorStore, ReviewStore};

fn db_err(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("db error: {e}"))
}

/* ============================================================
   Doctors
   ============================================================ */

pub struct PgDoctorStore {
    pool: PgPool,
}

impl PgDoctorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn rules_for(&self, doctor_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<AvailabilityRule>>, ApiError> {
        let rows: Vec<RuleRow> = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT doctor_id, kind, day_of_week, month, year, on_date,
                   start_time, end_time, duration_minutes
            FROM availability_rule
            WHERE doctor_id = ANY($1)
            ORDER BY doctor_id, position ASC
            "#,
        )
        .bind(doctor_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut by_doctor: HashMap<Uuid, Vec<AvailabilityRule>> = HashMap::new();
        for row in rows {
            let doctor_id = row.doctor_id;
            by_doctor.entry(doctor_id).or_default().push(row.into_rule()?);
        }
        Ok(by_doctor)
    }

    async fn attach_rules(&self, rows: Vec<DoctorRow>) -> Result<Vec<Doctor>, ApiError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.doctor_id).collect();
        let mut rules = self.rules_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let availability_rules = rules.remove(&r.doctor_id).unwrap_or_default();
                r.into_doctor(availability_rules)
            })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DoctorRow {
    doctor_id: Uuid,
    name: String,
    specialization: String,
    email: Option<String>,
    phone: Option<String>,
    hospital: Option<String>,
    experience: Option<String>,
    education: Option<String>,
    certifications: Option<String>,
    languages: Option<String>,
}

impl DoctorRow {
    fn into_doctor(self, availability_rules: Vec<AvailabilityRule>) -> Doctor {
        Doctor {
            id: self.doctor_id,
            name: self.name,
            specialization: self.specialization,
            email: self.email,
            phone: self.phone,
            hospital: self.hospital,
            experience: self.experience,
            education: self.education,
            certifications: self.certifications,
            languages: self.languages,
            availability_rules,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    doctor_id: Uuid,
    kind: String,
    day_of_week: Option<i16>,
    month: Option<i16>,
    year: Option<i32>,
    on_date: Option<NaiveDate>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    duration_minutes: i32,
}

impl RuleRow {
    fn into_rule(self) -> Result<AvailabilityRule, ApiError> {
        let recurrence = match self.kind.as_str() {
            "weekly" => Recurrence::Weekly {
                day_of_week: self
                    .day_of_week
                    .ok_or_else(|| ApiError::Internal("weekly rule without day_of_week".into()))?
                    as u8,
                month: self.month.map(|m| m as u8),
                year: self.year,
            },
            "date" => Recurrence::Date {
                date: self
                    .on_date
                    .ok_or_else(|| ApiError::Internal("date rule without on_date".into()))?,
            },
            other => {
                return Err(ApiError::Internal(format!("unknown rule kind: {other}")));
            }
        };
        Ok(AvailabilityRule {
            recurrence,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
        })
    }
}

const DOCTOR_COLUMNS: &str = r#"
    doctor_id, name, specialization, email, phone,
    hospital, experience, education, certifications, languages
"#;

async fn insert_rules(
    tx: &mut sqlx::PgConnection,
    doctor_id: Uuid,
    rules: &[AvailabilityRule],
) -> Result<(), ApiError> {
    for (position, rule) in rules.iter().enumerate() {
        let (kind, day_of_week, month, year, on_date) = match &rule.recurrence {
            Recurrence::Weekly {
                day_of_week,
                month,
                year,
            } => (
                "weekly",
                Some(i16::from(*day_of_week)),
                month.map(i16::from),
                *year,
                None,
            ),
            Recurrence::Date { date } => ("date", None, None, None, Some(*date)),
        };
        sqlx::query(
            r#"
            INSERT INTO availability_rule
              (doctor_id, position, kind, day_of_week, month, year, on_date,
               start_time, end_time, duration_minutes)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(doctor_id)
        .bind(position as i32)
        .bind(kind)
        .bind(day_of_week)
        .bind(month)
        .bind(year)
        .bind(on_date)
        .bind(rule.start_time)
        .bind(rule.end_time)
        .bind(rule.duration_minutes)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait]
impl DoctorStore for PgDoctorStore {
    async fn list(&self) -> Result<Vec<Doctor>, ApiError> {
        let rows: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        self.attach_rules(rows).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Doctor>, ApiError> {
        let row: Option<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor WHERE doctor_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else { return Ok(None) };
        Ok(self.attach_rules(vec![row]).await?.into_iter().next())
    }

    async fn search(&self, query: &str) -> Result<Vec<Doctor>, ApiError> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
            r#"
            SELECT {DOCTOR_COLUMNS} FROM doctor
            WHERE name ILIKE $1 OR specialization ILIKE $1
            ORDER BY name ASC
            "#
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        self.attach_rules(rows).await
    }

    async fn insert(&self, doctor: &Doctor) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO doctor
              (doctor_id, name, specialization, email, phone,
               hospital, experience, education, certifications, languages)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(doctor.id)
        .bind(&doctor.name)
        .bind(&doctor.specialization)
        .bind(&doctor.email)
        .bind(&doctor.phone)
        .bind(&doctor.hospital)
        .bind(&doctor.experience)
        .bind(&doctor.education)
        .bind(&doctor.certifications)
        .bind(&doctor.languages)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        insert_rules(&mut *tx, doctor.id, &doctor.availability_rules).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: DoctorPatch) -> Result<Option<Doctor>, ApiError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE doctor
            SET name           = COALESCE($2, name),
                specialization = COALESCE($3, specialization),
                email          = COALESCE($4, email),
                phone          = COALESCE($5, phone),
                hospital       = COALESCE($6, hospital),
                experience     = COALESCE($7, experience),
                education      = COALESCE($8, education),
                certifications = COALESCE($9, certifications),
                languages      = COALESCE($10, languages)
            WHERE doctor_id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.specialization)
        .bind(&patch.email)
        .bind(&patch.phone)
        .bind(&patch.hospital)
        .bind(&patch.experience)
        .bind(&patch.education)
        .bind(&patch.certifications)
        .bind(&patch.languages)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(rules) = &patch.availability_rules {
            sqlx::query("DELETE FROM availability_rule WHERE doctor_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            insert_rules(&mut *tx, id, rules).await?;
        }

        tx.commit().await.map_err(db_err)?;
        self.find(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM doctor WHERE doctor_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

/* ============================================================
   Appointments
   ============================================================ */

pub struct PgAppointmentStore {
    pool: PgPool,
}

impl PgAppointmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    doctor_id: Uuid,
    patient_name: String,
    patient_contact: String,
    starts_at: DateTime<Utc>,
    duration_minutes: i32,
    status: String,
}

impl AppointmentRow {
    fn into_appointment(self) -> Result<Appointment, ApiError> {
        let status = AppointmentStatus::parse(&self.status)
            .ok_or_else(|| ApiError::Internal(format!("unknown appointment status: {}", self.status)))?;
        Ok(Appointment {
            id: self.appointment_id,
            doctor_id: self.doctor_id,
            patient_name: self.patient_name,
            patient_contact: self.patient_contact,
            starts_at: self.starts_at,
            duration_minutes: self.duration_minutes,
            status,
        })
    }
}

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, doctor_id, patient_name, patient_contact,
    starts_at, duration_minutes, status
"#;

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn starts_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ApiError> {
        let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT starts_at FROM appointment
            WHERE doctor_id = $1 AND starts_at >= $2 AND starts_at < $3
            ORDER BY starts_at ASC
            "#,
        )
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    async fn exists_at(&self, doctor_id: Uuid, moment: DateTime<Utc>) -> Result<bool, ApiError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT appointment_id FROM appointment WHERE doctor_id = $1 AND starts_at = $2",
        )
        .bind(doctor_id)
        .bind(moment)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn try_insert(&self, appointment: &Appointment) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            INSERT INTO appointment
              (appointment_id, doctor_id, patient_name, patient_contact,
               starts_at, duration_minutes, status)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            ON CONFLICT (doctor_id, starts_at) DO NOTHING
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.doctor_id)
        .bind(&appointment.patient_name)
        .bind(&appointment.patient_contact)
        .bind(appointment.starts_at)
        .bind(appointment.duration_minutes)
        .bind(appointment.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, ApiError> {
        let row: Option<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(AppointmentRow::into_appointment).transpose()
    }

    async fn list(&self, status: Option<AppointmentStatus>) -> Result<Vec<Appointment>, ApiError> {
        let rows: Vec<AppointmentRow> = match status {
            Some(status) => {
                sqlx::query_as::<_, AppointmentRow>(&format!(
                    r#"
                    SELECT {APPOINTMENT_COLUMNS} FROM appointment
                    WHERE status = $1
                    ORDER BY starts_at DESC
                    "#
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, AppointmentRow>(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointment ORDER BY starts_at DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;
        rows.into_iter().map(AppointmentRow::into_appointment).collect()
    }

    async fn by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, ApiError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS} FROM appointment
            WHERE doctor_id = $1
            ORDER BY starts_at ASC
            "#
        ))
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(AppointmentRow::into_appointment).collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, ApiError> {
        let row: Option<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            UPDATE appointment
            SET status = $2
            WHERE appointment_id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(AppointmentRow::into_appointment).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM appointment WHERE appointment_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

/* ============================================================
   Reviews
   ============================================================ */

pub struct PgReviewStore {
    pool: PgPool,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    review_id: Uuid,
    doctor_id: Uuid,
    reviewer_name: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl ReviewRow {
    fn into_review(self) -> Review {
        Review {
            id: self.review_id,
            doctor_id: self.doctor_id,
            reviewer_name: self.reviewer_name,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Review>, ApiError> {
        let rows: Vec<ReviewRow> = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT review_id, doctor_id, reviewer_name, rating, comment, created_at
            FROM review
            WHERE doctor_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ReviewRow::into_review).collect())
    }

    async fn insert(&self, review: &Review) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO review
              (review_id, doctor_id, reviewer_name, rating, comment, created_at)
            VALUES ($1,$2,$3,$4,$5,$6)
            "#,
        )
        .bind(review.id)
        .bind(review.doctor_id)
        .bind(&review.reviewer_name)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn average_ratings(&self) -> Result<HashMap<Uuid, f64>, ApiError> {
        let rows: Vec<(Uuid, f64)> = sqlx::query_as(
            "SELECT doctor_id, AVG(rating::float8) FROM review GROUP BY doctor_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().collect())
    }
}

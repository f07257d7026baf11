//! 数据库模型

use caravane_core::models::*;
use caravane_core::{CaravaneError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询，枚举以文本存储

fn parse<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(CaravaneError::Database)
}

fn parse_specialties(values: &[String]) -> Result<BTreeSet<Specialty>> {
    values.iter().map(|v| parse(v)).collect()
}

pub(crate) fn specialty_codes(specialties: &BTreeSet<Specialty>) -> Vec<String> {
    specialties.iter().map(|s| s.as_str().to_string()).collect()
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub unique_number: String,
    pub first_name: String,
    pub last_name: String,
    pub cin: String,
    pub address: String,
    pub age: i16,
    pub sex: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub medical_history: Option<String>,
    pub referred_to_generalist: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPatient> for Patient {
    type Error = CaravaneError;

    fn try_from(row: DbPatient) -> Result<Self> {
        Ok(Patient {
            id: row.id,
            unique_number: row.unique_number,
            first_name: row.first_name,
            last_name: row.last_name,
            cin: row.cin,
            address: row.address,
            age: u8::try_from(row.age)
                .map_err(|_| CaravaneError::Database(format!("invalid age {}", row.age)))?,
            sex: parse(&row.sex)?,
            phone: row.phone,
            email: row.email,
            birth_date: row.birth_date,
            medical_history: row.medical_history,
            referred_to_generalist: row.referred_to_generalist,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库会诊表
#[derive(Debug, FromRow)]
pub struct DbConsultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub care_event_id: Uuid,
    pub clinician_id: Uuid,
    pub kind: String,
    pub specialty: Option<String>,
    pub status: String,
    pub orientation_specialties: Vec<String>,
    pub orientation_clinician_id: Option<Uuid>,
    pub out_of_network: bool,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub orientation_comment: Option<String>,
    pub scanner_performed: bool,
    pub hospital_referral: bool,
    pub follow_up_required: bool,
    pub appointment_date: Option<NaiveDate>,
    pub next_appointment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbConsultation> for Consultation {
    type Error = CaravaneError;

    fn try_from(row: DbConsultation) -> Result<Self> {
        Ok(Consultation {
            id: row.id,
            patient_id: row.patient_id,
            care_event_id: row.care_event_id,
            clinician_id: row.clinician_id,
            kind: parse(&row.kind)?,
            specialty: row.specialty.as_deref().map(parse).transpose()?,
            status: parse(&row.status)?,
            orientation_specialties: parse_specialties(&row.orientation_specialties)?,
            orientation_clinician_id: row.orientation_clinician_id,
            out_of_network: row.out_of_network,
            notes: row.notes,
            diagnosis: row.diagnosis,
            orientation_comment: row.orientation_comment,
            scanner_performed: row.scanner_performed,
            hospital_referral: row.hospital_referral,
            follow_up_required: row.follow_up_required,
            appointment_date: row.appointment_date,
            next_appointment_date: row.next_appointment_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库医务人员表
#[derive(Debug, FromRow)]
pub struct DbClinician {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: String,
    pub specialty: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbClinician> for Clinician {
    type Error = CaravaneError;

    fn try_from(row: DbClinician) -> Result<Self> {
        Ok(Clinician {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role: parse(&row.role)?,
            specialty: row.specialty.as_deref().map(parse).transpose()?,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库大篷车表
#[derive(Debug, FromRow)]
pub struct DbCareEvent {
    pub id: Uuid,
    pub unique_number: String,
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub covered_specialties: Vec<String>,
    pub status: String,
    pub roster: Vec<Uuid>,
    pub enrolled_patients: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCareEvent> for CareEvent {
    type Error = CaravaneError;

    fn try_from(row: DbCareEvent) -> Result<Self> {
        Ok(CareEvent {
            id: row.id,
            unique_number: row.unique_number,
            name: row.name,
            date: row.date,
            location: row.location,
            covered_specialties: parse_specialties(&row.covered_specialties)?,
            status: parse(&row.status)?,
            roster: row.roster,
            enrolled_patients: row.enrolled_patients,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 批量转换查询结果
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = CaravaneError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consultation_row_conversion() {
        let now = Utc::now();
        let row = DbConsultation {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            care_event_id: Uuid::new_v4(),
            clinician_id: Uuid::new_v4(),
            kind: "general".to_string(),
            specialty: Some("general_medicine".to_string()),
            status: "in_progress".to_string(),
            orientation_specialties: vec!["psychiatry".to_string(), "neurology".to_string()],
            orientation_clinician_id: None,
            out_of_network: false,
            notes: None,
            diagnosis: None,
            orientation_comment: None,
            scanner_performed: false,
            hospital_referral: false,
            follow_up_required: false,
            appointment_date: None,
            next_appointment_date: None,
            created_at: now,
            updated_at: now,
        };
        let consultation = Consultation::try_from(row).unwrap();
        assert_eq!(consultation.status, ConsultationStatus::InProgress);
        assert_eq!(
            consultation.orientation_specialties.into_iter().collect::<Vec<_>>(),
            vec![Specialty::Neurology, Specialty::Psychiatry]
        );
    }

    #[test]
    fn test_unknown_code_is_database_error() {
        let now = Utc::now();
        let row = DbClinician {
            id: Uuid::new_v4(),
            username: "x".to_string(),
            first_name: "X".to_string(),
            last_name: "Y".to_string(),
            email: None,
            role: "surgeon".to_string(),
            specialty: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            Clinician::try_from(row),
            Err(CaravaneError::Database(_))
        ));
    }
}

//! 输入校验
//!
//! 所有校验按字段汇总错误，一次性返回给调用方。

use crate::models::{
    Clinician, ClinicianPatch, ConsultationKind, ConsultationPatch, NewCareEvent, NewClinician,
    NewConsultation, NewPatient, PatientPatch, Role,
};
use crate::query::Patch;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static CIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z]{1,2}\d{1,7}$").expect("Failed to compile CIN regex"));

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Failed to compile email regex"));

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0[5-7](\d{2}){4}$").expect("Failed to compile phone regex"));

pub const MIN_AGE: u8 = 1;
pub const MAX_AGE: u8 = 120;

/// 按字段聚合的校验错误
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录字段错误，同一字段只保留第一条
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn require_text(errors: &mut ValidationErrors, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}

fn check_cin(errors: &mut ValidationErrors, cin: &str) {
    if cin.trim().is_empty() {
        errors.add("cin", "CIN is required");
    } else if !CIN_REGEX.is_match(cin.trim()) {
        errors.add("cin", "invalid CIN format (e.g. AB123456)");
    }
}

fn check_age(errors: &mut ValidationErrors, age: u8) {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        errors.add("age", format!("age must be between {} and {}", MIN_AGE, MAX_AGE));
    }
}

fn check_email(errors: &mut ValidationErrors, email: Option<&str>) {
    if let Some(email) = email.filter(|e| !e.is_empty()) {
        if !EMAIL_REGEX.is_match(email) {
            errors.add("email", "invalid email address");
        }
    }
}

fn check_phone(errors: &mut ValidationErrors, phone: Option<&str>) {
    if let Some(phone) = phone.filter(|p| !p.is_empty()) {
        let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
        if !PHONE_REGEX.is_match(&compact) {
            errors.add("phone", "invalid phone format (e.g. 06 XX XX XX XX)");
        }
    }
}

fn check_birth_date(errors: &mut ValidationErrors, birth_date: Option<NaiveDate>, today: NaiveDate) {
    if let Some(date) = birth_date {
        if date > today {
            errors.add("birth_date", "birth date cannot be in the future");
        }
    }
}

/// 随访日期：需要随访时必须提供且不得早于今天
pub fn check_follow_up(
    errors: &mut ValidationErrors,
    follow_up_required: bool,
    next_appointment_date: Option<NaiveDate>,
    today: NaiveDate,
) {
    if !follow_up_required {
        return;
    }
    match next_appointment_date {
        None => errors.add(
            "next_appointment_date",
            "next appointment date is required when follow-up is needed",
        ),
        Some(date) if date < today => errors.add(
            "next_appointment_date",
            "next appointment date cannot be in the past",
        ),
        Some(_) => {}
    }
}

/// 校验新患者登记数据
pub fn validate_new_patient(data: &NewPatient, today: NaiveDate) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_text(&mut errors, "first_name", &data.first_name, "first name is required");
    require_text(&mut errors, "last_name", &data.last_name, "last name is required");
    check_cin(&mut errors, &data.cin);
    require_text(&mut errors, "address", &data.address, "address is required");
    check_age(&mut errors, data.age);
    check_birth_date(&mut errors, data.birth_date, today);
    check_email(&mut errors, data.email.as_deref());
    check_phone(&mut errors, data.phone.as_deref());
    errors.into_result()
}

/// 校验患者更新中出现的字段
pub fn validate_patient_patch(patch: &PatientPatch, today: NaiveDate) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(first_name) = &patch.first_name {
        require_text(&mut errors, "first_name", first_name, "first name is required");
    }
    if let Some(last_name) = &patch.last_name {
        require_text(&mut errors, "last_name", last_name, "last name is required");
    }
    if let Some(cin) = &patch.cin {
        check_cin(&mut errors, cin);
    }
    if let Some(address) = &patch.address {
        require_text(&mut errors, "address", address, "address is required");
    }
    if let Some(age) = patch.age {
        check_age(&mut errors, age);
    }
    check_birth_date(&mut errors, patch.birth_date.as_set().copied(), today);
    check_email(&mut errors, patch.email.as_set().map(String::as_str));
    check_phone(&mut errors, patch.phone.as_set().map(String::as_str));
    errors.into_result()
}

/// 校验新会诊数据；专科医生填写的会诊不强制要求病历记录
pub fn validate_new_consultation(
    data: &NewConsultation,
    author_role: Role,
    today: NaiveDate,
) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if data.kind == ConsultationKind::Specialized && data.specialty.is_none() {
        errors.add("specialty", "specialty is required for a specialized consultation");
    }
    if author_role != Role::Specialist && crate::utils::non_blank(data.notes.as_deref()).is_none() {
        errors.add("notes", "consultation notes are required");
    }
    check_follow_up(
        &mut errors,
        data.follow_up_required,
        data.next_appointment_date,
        today,
    );
    errors.into_result()
}

/// 校验会诊更新中出现的字段（合并后的整体一致性由工作流层检查）
pub fn validate_consultation_patch(patch: &ConsultationPatch) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if patch.kind == Some(ConsultationKind::Specialized) && matches!(patch.specialty, Patch::Clear) {
        errors.add("specialty", "specialty is required for a specialized consultation");
    }
    errors.into_result()
}

pub fn validate_new_clinician(data: &NewClinician) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_text(&mut errors, "username", &data.username, "username is required");
    require_text(&mut errors, "first_name", &data.first_name, "first name is required");
    require_text(&mut errors, "last_name", &data.last_name, "last name is required");
    check_email(&mut errors, data.email.as_deref());
    if data.role == Role::Specialist && data.specialty.is_none() {
        errors.add("specialty", "specialty is required for a specialist");
    }
    errors.into_result()
}

/// 合并补丁后按新建规则整体校验
pub fn validate_clinician_patch(
    current: &Clinician,
    patch: &ClinicianPatch,
) -> std::result::Result<(), ValidationErrors> {
    let mut merged = current.clone();
    merged.apply(patch.clone());
    validate_new_clinician(&NewClinician {
        username: merged.username,
        first_name: merged.first_name,
        last_name: merged.last_name,
        email: merged.email,
        role: merged.role,
        specialty: merged.specialty,
        active: merged.active,
    })
}

pub fn validate_new_care_event(data: &NewCareEvent, today: NaiveDate) -> std::result::Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_text(&mut errors, "name", &data.name, "care event name is required");
    require_text(&mut errors, "location", &data.location, "care event location is required");
    if data.date < today {
        errors.add("date", "care event date cannot be in the past");
    }
    if data.covered_specialties.is_empty() {
        errors.add("covered_specialties", "at least one specialty must be covered");
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, Specialty};
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()
    }

    fn valid_patient() -> NewPatient {
        NewPatient {
            first_name: "Fatima".to_string(),
            last_name: "El Alaoui".to_string(),
            cin: "AB123456".to_string(),
            address: "12 Rue de la Paix, Casablanca".to_string(),
            age: 45,
            sex: Sex::Female,
            phone: Some("06 00 11 22 33".to_string()),
            email: Some("fatima@example.com".to_string()),
            birth_date: NaiveDate::from_ymd_opt(1979, 5, 15),
            medical_history: None,
            referred_to_generalist: true,
        }
    }

    #[test]
    fn test_valid_patient_passes() {
        assert!(validate_new_patient(&valid_patient(), today()).is_ok());
    }

    #[test]
    fn test_patient_errors_are_aggregated() {
        let mut data = valid_patient();
        data.first_name = "  ".to_string();
        data.cin = "123".to_string();
        data.age = 0;
        data.email = Some("not-an-email".to_string());
        data.phone = Some("0812".to_string());
        data.birth_date = NaiveDate::from_ymd_opt(2030, 1, 1);

        let errors = validate_new_patient(&data, today()).unwrap_err();
        for field in ["first_name", "cin", "age", "email", "phone", "birth_date"] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
        assert!(!errors.contains("last_name"));
    }

    #[test]
    fn test_cin_format_is_case_insensitive() {
        let mut data = valid_patient();
        data.cin = "ab12".to_string();
        assert!(validate_new_patient(&data, today()).is_ok());
    }

    #[test]
    fn test_patch_only_checks_present_fields() {
        let patch = PatientPatch {
            age: Some(200),
            ..Default::default()
        };
        let errors = validate_patient_patch(&patch, today()).unwrap_err();
        assert!(errors.contains("age"));
        assert_eq!(errors.fields().len(), 1);

        assert!(validate_patient_patch(&PatientPatch::default(), today()).is_ok());
    }

    #[test]
    fn test_consultation_rules() {
        let mut data = NewConsultation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            ConsultationKind::Specialized,
        );
        data.follow_up_required = true;
        data.next_appointment_date = NaiveDate::from_ymd_opt(2024, 8, 1);

        let errors = validate_new_consultation(&data, Role::Generalist, today()).unwrap_err();
        assert!(errors.contains("specialty"));
        assert!(errors.contains("notes"));
        assert_eq!(
            errors.get("next_appointment_date"),
            Some("next appointment date cannot be in the past")
        );

        // 专科医生无需填写病历记录
        let errors = validate_new_consultation(&data, Role::Specialist, today()).unwrap_err();
        assert!(!errors.contains("notes"));
    }

    #[test]
    fn test_specialist_clinician_needs_specialty() {
        let data = NewClinician {
            username: "dr.spec".to_string(),
            first_name: "Sara".to_string(),
            last_name: "Idrissi".to_string(),
            email: None,
            role: Role::Specialist,
            specialty: None,
            active: true,
        };
        let errors = validate_new_clinician(&data).unwrap_err();
        assert!(errors.contains("specialty"));
    }

    #[test]
    fn test_clinician_patch_is_checked_on_merged_record() {
        let neurologist = Clinician::new(NewClinician {
            username: "dr.neuro".to_string(),
            first_name: "Nadia".to_string(),
            last_name: "Tazi".to_string(),
            email: None,
            role: Role::Specialist,
            specialty: Some(Specialty::Neurology),
            active: true,
        });

        let clear = ClinicianPatch {
            specialty: Patch::Clear,
            ..Default::default()
        };
        let errors = validate_clinician_patch(&neurologist, &clear).unwrap_err();
        assert!(errors.contains("specialty"));

        let rename = ClinicianPatch {
            first_name: Some("Nadia Amal".to_string()),
            ..Default::default()
        };
        assert!(validate_clinician_patch(&neurologist, &rename).is_ok());
    }

    #[test]
    fn test_display_lists_every_field() {
        let mut errors = ValidationErrors::new();
        errors.add("notes", "required");
        errors.add("cin", "invalid");
        errors.add("cin", "ignored second message");
        assert_eq!(errors.to_string(), "cin: invalid; notes: required");
    }
}

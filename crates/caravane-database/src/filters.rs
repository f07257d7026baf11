//! 列表查询过滤条件

use caravane_core::{
    CareEvent, CareEventStatus, Clinician, Consultation, ConsultationStatus, Patient, Role,
    Specialty,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 患者过滤器
///
/// `ids` 为 `Some` 时只返回其中的患者；空列表得到空结果，绝不退化为“全部患者”。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientFilter {
    pub search: Option<String>,
    pub ids: Option<Vec<Uuid>>,
    pub exclude_ids: Option<Vec<Uuid>>,
    pub referred_to_generalist: Option<bool>,
}

impl PatientFilter {
    pub fn with_ids(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, patient: &Patient) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&patient.id) {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_ids {
            if excluded.contains(&patient.id) {
                return false;
            }
        }
        if let Some(flag) = self.referred_to_generalist {
            if patient.referred_to_generalist != flag {
                return false;
            }
        }
        match self.search_term() {
            Some(term) => patient.matches_search(term),
            None => true,
        }
    }
}

/// 会诊过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultationFilter {
    pub search: Option<String>,
    pub patient_id: Option<Uuid>,
    pub patient_ids: Option<Vec<Uuid>>,
    pub clinician_id: Option<Uuid>,
    pub care_event_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
    /// 只保留带有转诊目标（专科或指定医生）的会诊
    pub has_orientation_target: bool,
    pub out_of_network: Option<bool>,
}

impl ConsultationFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, consultation: &Consultation) -> bool {
        if self.patient_id.is_some_and(|id| consultation.patient_id != id) {
            return false;
        }
        if let Some(ids) = &self.patient_ids {
            if !ids.contains(&consultation.patient_id) {
                return false;
            }
        }
        if self.clinician_id.is_some_and(|id| consultation.clinician_id != id) {
            return false;
        }
        if self
            .care_event_id
            .is_some_and(|id| consultation.care_event_id != id)
        {
            return false;
        }
        if self.status.is_some_and(|status| consultation.status != status) {
            return false;
        }
        if self.has_orientation_target && !consultation.has_orientation_target() {
            return false;
        }
        if self
            .out_of_network
            .is_some_and(|flag| consultation.out_of_network != flag)
        {
            return false;
        }
        match self.search_term() {
            Some(term) => consultation.matches_search(term),
            None => true,
        }
    }
}

/// 医务人员过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicianFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub specialty: Option<Specialty>,
    pub active: Option<bool>,
}

impl ClinicianFilter {
    pub fn matches(&self, clinician: &Clinician) -> bool {
        self.role.map_or(true, |role| clinician.role == role)
            && self
                .specialty
                .map_or(true, |spec| clinician.specialty == Some(spec))
            && self.active.map_or(true, |active| clinician.active == active)
            && self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map_or(true, |term| clinician.matches_search(term))
    }
}

/// 大篷车过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CareEventFilter {
    pub search: Option<String>,
    pub status: Option<CareEventStatus>,
}

impl CareEventFilter {
    pub fn matches(&self, event: &CareEvent) -> bool {
        self.status.map_or(true, |status| event.status == status)
            && self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map_or(true, |term| event.matches_search(term))
    }
}

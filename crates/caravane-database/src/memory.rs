//! 内存存储
//!
//! 四类记录共用一把读写锁：所有写操作串行执行，快照在读锁下一次复制，
//! 级联删除在同一个写临界区内完成。

use crate::filters::{CareEventFilter, ClinicianFilter, ConsultationFilter, PatientFilter};
use crate::repository::{
    CareEventRepository, ClinicianRepository, ConsultationMutation, ConsultationRepository,
    PatientRepository, Store,
};
use async_trait::async_trait;
use caravane_core::utils::normalize_cin;
use caravane_core::{
    CaravaneError, CareEvent, CareEventPatch, Clinician, ClinicianPatch, Consultation,
    NewCareEvent, NewClinician, NewPatient, Page, PageRequest, Patient, PatientPatch, Result,
    Role, Snapshot,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 内存中的记录集合，均按创建时间倒序保存（最新在前）
#[derive(Debug, Default)]
struct MemoryState {
    patients: Vec<Patient>,
    consultations: Vec<Consultation>,
    clinicians: Vec<Clinician>,
    care_events: Vec<CareEvent>,
}

impl MemoryState {
    fn cin_taken(&self, cin: &str, except: Option<Uuid>) -> bool {
        let cin = normalize_cin(cin);
        self.patients
            .iter()
            .any(|p| Some(p.id) != except && p.normalized_cin() == cin)
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        let username = username.trim().to_lowercase();
        self.clinicians
            .iter()
            .any(|c| Some(c.id) != except && c.username.to_lowercase() == username)
    }
}

type SharedState = Arc<RwLock<MemoryState>>;

/// 内存存储
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: SharedState,
    patients: MemoryPatients,
    consultations: MemoryConsultations,
    clinicians: MemoryClinicians,
    care_events: MemoryCareEvents,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let state: SharedState = Arc::default();
        Self {
            patients: MemoryPatients {
                state: state.clone(),
            },
            consultations: MemoryConsultations {
                state: state.clone(),
            },
            clinicians: MemoryClinicians {
                state: state.clone(),
            },
            care_events: MemoryCareEvents {
                state: state.clone(),
            },
            state,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn patients(&self) -> &dyn PatientRepository {
        &self.patients
    }

    fn consultations(&self) -> &dyn ConsultationRepository {
        &self.consultations
    }

    fn clinicians(&self) -> &dyn ClinicianRepository {
        &self.clinicians
    }

    fn care_events(&self) -> &dyn CareEventRepository {
        &self.care_events
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let state = self.state.read().await;
        Ok(Snapshot {
            patients: state.patients.clone(),
            consultations: state.consultations.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryPatients {
    state: SharedState,
}

#[async_trait]
impl PatientRepository for MemoryPatients {
    async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>> {
        let state = self.state.read().await;
        let matching: Vec<Patient> = state
            .patients
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        Ok(page.slice(&matching))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Patient>> {
        let state = self.state.read().await;
        Ok(state.patients.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, data: NewPatient) -> Result<Patient> {
        let mut state = self.state.write().await;
        if state.cin_taken(&data.cin, None) {
            return Err(CaravaneError::DuplicateIdentifier(format!(
                "a patient with CIN {} already exists",
                data.cin.trim()
            )));
        }
        let patient = Patient::new(data);
        state.patients.insert(0, patient.clone());
        tracing::info!("Created patient {} ({})", patient.id, patient.unique_number);
        Ok(patient)
    }

    async fn update(&self, id: Uuid, patch: PatientPatch) -> Result<Option<Patient>> {
        let mut state = self.state.write().await;
        if let Some(cin) = &patch.cin {
            if state.cin_taken(cin, Some(id)) {
                return Err(CaravaneError::DuplicateIdentifier(format!(
                    "another patient with CIN {} already exists",
                    cin.trim()
                )));
            }
        }
        let Some(patient) = state.patients.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        patient.apply(patch);
        tracing::info!("Updated patient {}", id);
        Ok(Some(patient.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.patients.len();
        state.patients.retain(|p| p.id != id);
        if state.patients.len() == before {
            return Ok(false);
        }
        let consultations_before = state.consultations.len();
        state.consultations.retain(|c| c.patient_id != id);
        tracing::info!(
            "Deleted patient {} and {} consultation(s)",
            id,
            consultations_before - state.consultations.len()
        );
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryConsultations {
    state: SharedState,
}

#[async_trait]
impl ConsultationRepository for MemoryConsultations {
    async fn list(
        &self,
        filter: &ConsultationFilter,
        page: PageRequest,
    ) -> Result<Page<Consultation>> {
        let state = self.state.read().await;
        let matching: Vec<Consultation> = state
            .consultations
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(page.slice(&matching))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Consultation>> {
        let state = self.state.read().await;
        Ok(state.consultations.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, consultation: Consultation) -> Result<Consultation> {
        let mut state = self.state.write().await;
        if !state.patients.iter().any(|p| p.id == consultation.patient_id) {
            return Err(CaravaneError::invalid(
                "patient_id",
                format!("unknown patient {}", consultation.patient_id),
            ));
        }
        state.consultations.insert(0, consultation.clone());
        tracing::info!(
            "Created consultation {} for patient {}",
            consultation.id,
            consultation.patient_id
        );
        Ok(consultation)
    }

    async fn modify(
        &self,
        id: Uuid,
        mutation: ConsultationMutation,
    ) -> Result<Option<Consultation>> {
        let mut state = self.state.write().await;
        let Some(slot) = state.consultations.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        // 在副本上修改，失败时原记录保持不变
        let mut updated = slot.clone();
        mutation(&mut updated)?;
        *slot = updated.clone();
        tracing::info!("Updated consultation {}", id);
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.consultations.len();
        state.consultations.retain(|c| c.id != id);
        let deleted = state.consultations.len() < before;
        if deleted {
            tracing::info!("Deleted consultation {}", id);
        }
        Ok(deleted)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryClinicians {
    state: SharedState,
}

#[async_trait]
impl ClinicianRepository for MemoryClinicians {
    async fn list(&self, filter: &ClinicianFilter, page: PageRequest) -> Result<Page<Clinician>> {
        let state = self.state.read().await;
        let matching: Vec<Clinician> = state
            .clinicians
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(page.slice(&matching))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Clinician>> {
        let state = self.state.read().await;
        Ok(state.clinicians.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, data: NewClinician) -> Result<Clinician> {
        let mut state = self.state.write().await;
        if state.username_taken(&data.username, None) {
            return Err(CaravaneError::DuplicateIdentifier(format!(
                "username {} is already taken",
                data.username.trim()
            )));
        }
        let clinician = Clinician::new(data);
        state.clinicians.insert(0, clinician.clone());
        tracing::info!("Created clinician {} ({})", clinician.id, clinician.role);
        Ok(clinician)
    }

    async fn update(&self, id: Uuid, patch: ClinicianPatch) -> Result<Option<Clinician>> {
        let mut state = self.state.write().await;
        if let Some(username) = &patch.username {
            if state.username_taken(username, Some(id)) {
                return Err(CaravaneError::DuplicateIdentifier(format!(
                    "username {} is already taken",
                    username.trim()
                )));
            }
        }
        let admins = state
            .clinicians
            .iter()
            .filter(|c| c.role == Role::Admin)
            .count();
        let Some(clinician) = state.clinicians.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if patch.revokes_admin(clinician) && admins <= 1 {
            return Err(CaravaneError::invalid(
                "role",
                "cannot demote the last administrator",
            ));
        }
        clinician.apply(patch);
        Ok(Some(clinician.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(target) = state.clinicians.iter().find(|c| c.id == id) else {
            return Ok(false);
        };
        let admins = state
            .clinicians
            .iter()
            .filter(|c| c.role == Role::Admin)
            .count();
        if target.role == Role::Admin && admins <= 1 {
            return Err(CaravaneError::invalid(
                "id",
                "cannot delete the last administrator",
            ));
        }
        state.clinicians.retain(|c| c.id != id);
        tracing::info!("Deleted clinician {}", id);
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCareEvents {
    state: SharedState,
}

#[async_trait]
impl CareEventRepository for MemoryCareEvents {
    async fn list(&self, filter: &CareEventFilter, page: PageRequest) -> Result<Page<CareEvent>> {
        let state = self.state.read().await;
        let mut matching: Vec<CareEvent> = state
            .care_events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // 最近的活动在前
        matching.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(page.slice(&matching))
    }

    async fn get(&self, id: Uuid) -> Result<Option<CareEvent>> {
        let state = self.state.read().await;
        Ok(state.care_events.iter().find(|e| e.id == id).cloned())
    }

    async fn create(&self, data: NewCareEvent) -> Result<CareEvent> {
        let mut state = self.state.write().await;
        let event = CareEvent::new(data);
        state.care_events.insert(0, event.clone());
        tracing::info!("Created care event {} ({})", event.id, event.name);
        Ok(event)
    }

    async fn update(&self, id: Uuid, patch: CareEventPatch) -> Result<Option<CareEvent>> {
        let mut state = self.state.write().await;
        let Some(event) = state.care_events.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        event.apply(patch);
        Ok(Some(event.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.care_events.len();
        state.care_events.retain(|e| e.id != id);
        Ok(state.care_events.len() < before)
    }
}

//! 工作流服务
//!
//! 所有角色操作的统一入口：先检查操作者能力，再做输入校验，
//! 最后在限定时间内调用存储。队列与统计总是基于一次完整快照计算。

use crate::orientation::{apply_orientation, repair_orientation, OrientationPatch};
use crate::state_machine::ConsultationStateMachine;
use crate::visibility::{self, DashboardSummary, SpecialistBeneficiaries};
use caravane_core::validation::{
    check_follow_up, validate_clinician_patch, validate_consultation_patch,
    validate_new_care_event, validate_new_clinician, validate_new_consultation,
    validate_new_patient, validate_patient_patch,
};
use caravane_core::{
    Actor, CaravaneError, Capability, CareEvent, CareEventPatch, CareEventStatus, Clinician,
    ClinicianPatch, Consultation, ConsultationKind, ConsultationPatch, ConsultationStatus,
    NewCareEvent, NewClinician, NewConsultation, NewPatient, Page, PageRequest, Patch, Patient,
    PatientPatch, Result, Role, Snapshot, Specialty, ValidationErrors,
};
use caravane_database::{
    CareEventFilter, ClinicianFilter, ConsultationFilter, PatientFilter, Store,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 会诊详情：会诊本身及其患者、被指定的专科医生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationDetail {
    pub consultation: Consultation,
    pub patient: Option<Patient>,
    pub orientation_clinician: Option<Clinician>,
}

/// 已转出的患者
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferredPatient {
    pub patient: Patient,
    pub consultation_id: Uuid,
    pub referred_at: DateTime<Utc>,
}

/// 超出覆盖范围的患者
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutOfNetworkPatient {
    pub patient: Patient,
    pub consultation_id: Uuid,
    pub flagged_at: DateTime<Utc>,
}

/// 专科医生工作量
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadEntry {
    pub clinician_id: Uuid,
    pub name: Option<String>,
    pub consultations: usize,
}

/// 仪表盘
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub active_care_events: usize,
    pub active_clinicians: usize,
    pub beneficiaries_by_specialty: BTreeMap<Specialty, usize>,
    pub beneficiaries_by_specialist: Vec<SpecialistBeneficiaries>,
}

/// 工作流服务
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn Store>,
    state_machine: ConsultationStateMachine,
    operation_timeout: Duration,
    max_page_size: usize,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("operation_timeout", &self.operation_timeout)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
    /// 转诊去向并发冲突时的最多尝试次数
    const MODIFY_ATTEMPTS: usize = 3;

    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            state_machine: ConsultationStateMachine::new(),
            operation_timeout: Self::DEFAULT_TIMEOUT,
            max_page_size: Self::DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn state_machine(&self) -> &ConsultationStateMachine {
        &self.state_machine
    }

    /// 限时执行一次存储调用
    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Operation {} timed out after {:?}",
                    operation,
                    self.operation_timeout
                );
                Err(CaravaneError::Timeout(format!(
                    "{} did not complete within {:?}",
                    operation, self.operation_timeout
                )))
            }
        }
    }

    fn page(&self, page: PageRequest) -> PageRequest {
        PageRequest::new(page.page, page.limit.min(self.max_page_size))
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        self.bounded("snapshot", self.store.snapshot()).await
    }

    /// 把可见性结果物化为分页患者列表
    async fn materialize(
        &self,
        ids: Vec<Uuid>,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Patient>> {
        let filter = PatientFilter {
            search,
            ..PatientFilter::with_ids(ids)
        };
        self.bounded(
            "patients.list",
            self.store.patients().list(&filter, self.page(page)),
        )
        .await
    }

    /// 校验被指定的转诊医生存在且为专科医生，返回其专科
    async fn orientation_target(&self, clinician_id: Uuid) -> Result<Option<Specialty>> {
        let clinician = self
            .bounded("clinicians.get", self.store.clinicians().get(clinician_id))
            .await?;
        match clinician {
            Some(c) if c.is_specialist() => Ok(c.specialty),
            Some(_) => Err(CaravaneError::invalid(
                "orientation_clinician_id",
                format!("clinician {} is not a specialist", clinician_id),
            )),
            None => Err(CaravaneError::invalid(
                "orientation_clinician_id",
                format!("unknown clinician {}", clinician_id),
            )),
        }
    }

    /// 预先解析修改可能涉及的转诊医生专科
    async fn orientation_specialties_of(
        &self,
        requested: &Patch<Uuid>,
        current: Option<Uuid>,
    ) -> Result<HashMap<Uuid, Specialty>> {
        let mut specialties = HashMap::new();
        if let Patch::Set(id) = requested {
            if let Some(spec) = self.orientation_target(*id).await? {
                specialties.insert(*id, spec);
            }
        }
        if let Some(id) = current.filter(|id| !specialties.contains_key(id)) {
            let clinician = self
                .bounded("clinicians.get", self.store.clinicians().get(id))
                .await?;
            if let Some(spec) = clinician.and_then(|c| c.specialty) {
                specialties.insert(id, spec);
            }
        }
        Ok(specialties)
    }

    /// 预读之后转诊医生被其他写者换掉时，预先解析的专科不再可信
    fn ensure_orientation_unchanged(
        consultation: &Consultation,
        requested: &Patch<Uuid>,
        expected: Option<Uuid>,
    ) -> Result<()> {
        if requested.is_keep() && consultation.orientation_clinician_id != expected {
            return Err(CaravaneError::Conflict(format!(
                "orientation clinician of consultation {} changed concurrently",
                consultation.id
            )));
        }
        Ok(())
    }

    fn ensure_author(actor: &Actor, consultation: &Consultation) -> Result<()> {
        if actor.is_admin() || consultation.clinician_id == actor.id {
            Ok(())
        } else {
            Err(CaravaneError::Permission(format!(
                "consultation {} was authored by another clinician",
                consultation.id
            )))
        }
    }

    // ========== 患者登记 ==========

    pub async fn list_patients(
        &self,
        actor: &Actor,
        filter: PatientFilter,
        page: PageRequest,
    ) -> Result<Page<Patient>> {
        actor.require_any(&[
            Capability::ManagePatientsIntake,
            Capability::ManagePatientsFull,
            Capability::ViewReferredPatients,
            Capability::ViewSpecialistPatients,
        ])?;
        self.bounded(
            "patients.list",
            self.store.patients().list(&filter, self.page(page)),
        )
        .await
    }

    pub async fn get_patient(&self, actor: &Actor, id: Uuid) -> Result<Patient> {
        actor.require(Capability::ViewDashboard)?;
        self.bounded("patients.get", self.store.patients().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("patient", id))
    }

    pub async fn create_patient(&self, actor: &Actor, data: NewPatient) -> Result<Patient> {
        actor.require(Capability::AddPatients)?;
        validate_new_patient(&data, Self::today())?;

        let patient = self
            .bounded("patients.create", self.store.patients().create(data))
            .await?;
        tracing::info!("Actor {} registered patient {}", actor.id, patient.id);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: PatientPatch,
    ) -> Result<Patient> {
        actor.require_any(&[Capability::ManagePatientsIntake, Capability::ManagePatientsFull])?;
        validate_patient_patch(&patch, Self::today())?;

        self.bounded("patients.update", self.store.patients().update(id, patch))
            .await?
            .ok_or_else(|| CaravaneError::not_found("patient", id))
    }

    /// 接待人员将患者转介给全科
    pub async fn refer_to_generalist(&self, actor: &Actor, id: Uuid) -> Result<Patient> {
        let patch = PatientPatch {
            referred_to_generalist: Some(true),
            ..Default::default()
        };
        let patient = self.update_patient(actor, id, patch).await?;
        tracing::info!("Patient {} referred to generalist by {}", id, actor.id);
        Ok(patient)
    }

    /// 删除患者并级联删除其会诊
    pub async fn delete_patient(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Capability::ManagePatientsFull)?;
        if self
            .bounded("patients.delete", self.store.patients().delete(id))
            .await?
        {
            tracing::info!("Actor {} deleted patient {}", actor.id, id);
            Ok(())
        } else {
            Err(CaravaneError::not_found("patient", id))
        }
    }

    // ========== 会诊账本 ==========

    pub async fn list_consultations(
        &self,
        actor: &Actor,
        filter: ConsultationFilter,
        page: PageRequest,
    ) -> Result<Page<Consultation>> {
        actor.require_any(&[
            Capability::ManageConsultationsGeneral,
            Capability::ManageConsultationsSpecialist,
            Capability::ManageConsultationsFull,
        ])?;
        self.bounded(
            "consultations.list",
            self.store.consultations().list(&filter, self.page(page)),
        )
        .await
    }

    pub async fn get_consultation(&self, actor: &Actor, id: Uuid) -> Result<ConsultationDetail> {
        actor.require_any(&[
            Capability::ManageConsultationsGeneral,
            Capability::ManageConsultationsSpecialist,
            Capability::ManageConsultationsFull,
        ])?;
        let consultation = self
            .bounded("consultations.get", self.store.consultations().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("consultation", id))?;

        let patient = self
            .bounded(
                "patients.get",
                self.store.patients().get(consultation.patient_id),
            )
            .await?;
        let orientation_clinician = match consultation.orientation_clinician_id {
            Some(clinician_id) => {
                self.bounded("clinicians.get", self.store.clinicians().get(clinician_id))
                    .await?
            }
            None => None,
        };

        Ok(ConsultationDetail {
            consultation,
            patient,
            orientation_clinician,
        })
    }

    /// 新建会诊，按作者角色确定类型与初始状态
    ///
    /// - 专科医生：默认 in_progress，专科缺省时取本人专科
    /// - 全科医生：强制为全科会诊并直接 completed
    /// - 管理员：沿用调用方给出的状态，缺省 awaiting
    pub async fn create_consultation(
        &self,
        actor: &Actor,
        mut data: NewConsultation,
    ) -> Result<Consultation> {
        actor.require(Capability::AddConsultations)?;

        if !actor.is_admin() {
            data.clinician_id = actor.id;
        } else if data.clinician_id.is_nil() {
            return Err(CaravaneError::invalid(
                "clinician_id",
                "the authoring clinician is required",
            ));
        }
        let status = match actor.role {
            Role::Specialist => {
                if data.kind == ConsultationKind::Specialized && data.specialty.is_none() {
                    data.specialty = actor.specialty;
                }
                data.status.unwrap_or(ConsultationStatus::InProgress)
            }
            Role::Generalist => {
                data.kind = ConsultationKind::General;
                ConsultationStatus::Completed
            }
            Role::Intake | Role::Admin => data.status.unwrap_or(ConsultationStatus::Awaiting),
        };

        validate_new_consultation(&data, actor.role, Self::today())?;
        let target_specialty = match data.orientation_clinician_id {
            Some(clinician_id) => self.orientation_target(clinician_id).await?,
            None => None,
        };

        let mut consultation = Consultation::new(data, status);
        repair_orientation(&mut consultation, &BTreeSet::new(), |_| target_specialty);

        let consultation = self
            .bounded(
                "consultations.create",
                self.store.consultations().create(consultation),
            )
            .await?;
        tracing::info!(
            "Actor {} ({}) created consultation {} with status {}",
            actor.id,
            actor.role,
            consultation.id,
            consultation.status
        );
        Ok(consultation)
    }

    /// 通用会诊更新
    ///
    /// 状态只能前进；合并后的记录重新校验，并做转诊去向的一致性修复。
    /// 任何一项失败时整个更新都不生效。
    pub async fn update_consultation(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: ConsultationPatch,
    ) -> Result<Consultation> {
        actor.require_any(&[
            Capability::ManageConsultationsGeneral,
            Capability::ManageConsultationsSpecialist,
            Capability::ManageConsultationsFull,
        ])?;
        validate_consultation_patch(&patch)?;

        let mut attempt = 1;
        let updated = loop {
            match self.try_update_consultation(actor, id, patch.clone()).await {
                Err(CaravaneError::Conflict(reason)) if attempt < Self::MODIFY_ATTEMPTS => {
                    tracing::debug!("Retrying update of consultation {}: {}", id, reason);
                    attempt += 1;
                }
                result => break result?,
            }
        };
        tracing::info!("Actor {} updated consultation {}", actor.id, id);
        Ok(updated)
    }

    async fn try_update_consultation(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: ConsultationPatch,
    ) -> Result<Consultation> {
        let current = self
            .bounded("consultations.get", self.store.consultations().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("consultation", id))?;
        Self::ensure_author(actor, &current)?;
        let specialties = self
            .orientation_specialties_of(
                &patch.orientation_clinician_id,
                current.orientation_clinician_id,
            )
            .await?;

        let expected_clinician = current.orientation_clinician_id;
        let actor = *actor;
        let state_machine = self.state_machine.clone();
        let today = Self::today();
        let mutation = Box::new(move |consultation: &mut Consultation| -> Result<()> {
            Self::ensure_author(&actor, consultation)?;
            Self::ensure_orientation_unchanged(
                consultation,
                &patch.orientation_clinician_id,
                expected_clinician,
            )?;
            if let Some(status) = patch.status {
                state_machine.ensure_forward(consultation.status, status)?;
            }
            let follow_up_touched =
                patch.follow_up_required.is_some() || !patch.next_appointment_date.is_keep();

            let previous = consultation.orientation_specialties.clone();
            consultation.apply(patch);

            let mut errors = ValidationErrors::new();
            if consultation.kind == ConsultationKind::Specialized && consultation.specialty.is_none()
            {
                errors.add("specialty", "specialty is required for a specialized consultation");
            }
            if follow_up_touched {
                check_follow_up(
                    &mut errors,
                    consultation.follow_up_required,
                    consultation.next_appointment_date,
                    today,
                );
            }
            errors.into_result()?;

            repair_orientation(consultation, &previous, |clinician_id| {
                specialties.get(&clinician_id).copied()
            });
            Ok(())
        });

        self.bounded(
            "consultations.modify",
            self.store.consultations().modify(id, mutation),
        )
        .await?
        .ok_or_else(|| CaravaneError::not_found("consultation", id))
    }

    /// 全科医生编辑转诊去向，完成后会诊状态为 completed
    pub async fn update_orientation(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: OrientationPatch,
    ) -> Result<Consultation> {
        actor.require(Capability::EditOrientation)?;

        let mut attempt = 1;
        let updated = loop {
            match self.try_update_orientation(actor, id, patch.clone()).await {
                Err(CaravaneError::Conflict(reason)) if attempt < Self::MODIFY_ATTEMPTS => {
                    tracing::debug!("Retrying orientation of consultation {}: {}", id, reason);
                    attempt += 1;
                }
                result => break result?,
            }
        };
        tracing::info!(
            "Actor {} oriented consultation {} (specialties: {:?}, clinician: {:?}, out of network: {})",
            actor.id,
            id,
            updated.orientation_specialties,
            updated.orientation_clinician_id,
            updated.out_of_network
        );
        Ok(updated)
    }

    async fn try_update_orientation(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: OrientationPatch,
    ) -> Result<Consultation> {
        let current = self
            .bounded("consultations.get", self.store.consultations().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("consultation", id))?;
        Self::ensure_author(actor, &current)?;
        let specialties = self
            .orientation_specialties_of(
                &patch.orientation_clinician_id,
                current.orientation_clinician_id,
            )
            .await?;

        let expected_clinician = current.orientation_clinician_id;
        let actor = *actor;
        let state_machine = self.state_machine.clone();
        let mutation = Box::new(move |consultation: &mut Consultation| -> Result<()> {
            Self::ensure_author(&actor, consultation)?;
            Self::ensure_orientation_unchanged(
                consultation,
                &patch.orientation_clinician_id,
                expected_clinician,
            )?;
            apply_orientation(consultation, patch, &state_machine, |clinician_id| {
                specialties.get(&clinician_id).copied()
            })
        });

        self.bounded(
            "consultations.modify",
            self.store.consultations().modify(id, mutation),
        )
        .await?
        .ok_or_else(|| CaravaneError::not_found("consultation", id))
    }

    pub async fn delete_consultation(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Capability::ManageConsultationsFull)?;
        if self
            .bounded("consultations.delete", self.store.consultations().delete(id))
            .await?
        {
            tracing::info!("Actor {} deleted consultation {}", actor.id, id);
            Ok(())
        } else {
            Err(CaravaneError::not_found("consultation", id))
        }
    }

    // ========== 角色队列 ==========

    pub async fn intake_queue(
        &self,
        actor: &Actor,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Patient>> {
        actor.require(Capability::ManagePatientsIntake)?;
        let snapshot = self.snapshot().await?;
        let ids = visibility::intake_queue(&snapshot);
        tracing::debug!("Intake queue holds {} patient(s)", ids.len());
        self.materialize(ids, search, page).await
    }

    pub async fn generalist_queue(
        &self,
        actor: &Actor,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Patient>> {
        actor.require(Capability::ViewReferredPatients)?;
        let snapshot = self.snapshot().await?;
        let ids = visibility::generalist_queue(&snapshot, actor.id);
        tracing::debug!("Generalist {} queue holds {} patient(s)", actor.id, ids.len());
        self.materialize(ids, search, page).await
    }

    pub async fn specialist_queue(
        &self,
        actor: &Actor,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Patient>> {
        actor.require(Capability::ViewSpecialistPatients)?;
        let snapshot = self.snapshot().await?;
        let ids = visibility::specialist_queue(&snapshot, actor.id, actor.specialty);
        tracing::debug!("Specialist {} queue holds {} patient(s)", actor.id, ids.len());
        self.materialize(ids, search, page).await
    }

    /// 当前全科医生已转出的患者
    pub async fn referred_out(&self, actor: &Actor) -> Result<Vec<ReferredPatient>> {
        actor.require(Capability::EditOrientation)?;
        let snapshot = self.snapshot().await?;
        let patients: HashMap<Uuid, &Patient> =
            snapshot.patients.iter().map(|p| (p.id, p)).collect();

        Ok(visibility::generalist_referred_out(&snapshot, actor.id)
            .into_iter()
            .filter_map(|entry| {
                patients.get(&entry.patient_id).map(|patient| ReferredPatient {
                    patient: (*patient).clone(),
                    consultation_id: entry.consultation_id,
                    referred_at: entry.referred_at,
                })
            })
            .collect())
    }

    pub async fn out_of_network(&self, actor: &Actor) -> Result<Vec<OutOfNetworkPatient>> {
        actor.require(Capability::ViewOutOfNetwork)?;
        let snapshot = self.snapshot().await?;
        let patients: HashMap<Uuid, &Patient> =
            snapshot.patients.iter().map(|p| (p.id, p)).collect();

        Ok(visibility::out_of_network(&snapshot)
            .into_iter()
            .filter_map(|entry| {
                patients.get(&entry.patient_id).map(|patient| OutOfNetworkPatient {
                    patient: (*patient).clone(),
                    consultation_id: entry.consultation_id,
                    flagged_at: entry.flagged_at,
                })
            })
            .collect())
    }

    /// 专科医生工作量，按会诊数降序
    pub async fn specialist_workload(&self, actor: &Actor) -> Result<Vec<WorkloadEntry>> {
        actor.require(Capability::ViewDashboard)?;
        let snapshot = self.snapshot().await?;
        let clinicians = self
            .bounded(
                "clinicians.list",
                self.store
                    .clinicians()
                    .list(&ClinicianFilter::default(), PageRequest::all()),
            )
            .await?;
        let names: HashMap<Uuid, String> = clinicians
            .items
            .iter()
            .map(|c| (c.id, c.full_name()))
            .collect();

        let mut entries: Vec<WorkloadEntry> = visibility::specialist_workload(&snapshot)
            .into_iter()
            .map(|(clinician_id, consultations)| WorkloadEntry {
                clinician_id,
                name: names.get(&clinician_id).cloned(),
                consultations,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.consultations
                .cmp(&a.consultations)
                .then_with(|| a.clinician_id.cmp(&b.clinician_id))
        });
        Ok(entries)
    }

    pub async fn dashboard(&self, actor: &Actor) -> Result<Dashboard> {
        actor.require(Capability::ViewDashboard)?;
        let snapshot = self.snapshot().await?;
        let clinicians = self
            .bounded(
                "clinicians.list",
                self.store
                    .clinicians()
                    .list(&ClinicianFilter::default(), PageRequest::all()),
            )
            .await?
            .items;
        let care_events = self
            .bounded(
                "care_events.list",
                self.store
                    .care_events()
                    .list(&CareEventFilter::default(), PageRequest::all()),
            )
            .await?
            .items;

        Ok(Dashboard {
            summary: visibility::summary(&snapshot),
            active_care_events: care_events
                .iter()
                .filter(|e| e.status != CareEventStatus::Finished)
                .count(),
            active_clinicians: clinicians.iter().filter(|c| c.active).count(),
            beneficiaries_by_specialty: visibility::beneficiaries_by_specialty(&snapshot),
            beneficiaries_by_specialist: visibility::beneficiaries_by_specialist(
                &snapshot,
                &clinicians,
            ),
        })
    }

    // ========== 医务人员 ==========

    pub async fn list_clinicians(
        &self,
        actor: &Actor,
        filter: ClinicianFilter,
        page: PageRequest,
    ) -> Result<Page<Clinician>> {
        actor.require(Capability::ViewDashboard)?;
        self.bounded(
            "clinicians.list",
            self.store.clinicians().list(&filter, self.page(page)),
        )
        .await
    }

    pub async fn get_clinician(&self, actor: &Actor, id: Uuid) -> Result<Clinician> {
        actor.require(Capability::ViewDashboard)?;
        self.bounded("clinicians.get", self.store.clinicians().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("clinician", id))
    }

    pub async fn create_clinician(&self, actor: &Actor, data: NewClinician) -> Result<Clinician> {
        actor.require(Capability::ManageClinicians)?;
        validate_new_clinician(&data)?;
        self.bounded("clinicians.create", self.store.clinicians().create(data))
            .await
    }

    pub async fn update_clinician(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: ClinicianPatch,
    ) -> Result<Clinician> {
        actor.require(Capability::ManageClinicians)?;
        let current = self
            .bounded("clinicians.get", self.store.clinicians().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("clinician", id))?;
        validate_clinician_patch(&current, &patch)?;
        self.bounded("clinicians.update", self.store.clinicians().update(id, patch))
            .await?
            .ok_or_else(|| CaravaneError::not_found("clinician", id))
    }

    pub async fn delete_clinician(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Capability::ManageClinicians)?;
        if self
            .bounded("clinicians.delete", self.store.clinicians().delete(id))
            .await?
        {
            Ok(())
        } else {
            Err(CaravaneError::not_found("clinician", id))
        }
    }

    // ========== 大篷车活动 ==========

    pub async fn list_care_events(
        &self,
        actor: &Actor,
        filter: CareEventFilter,
        page: PageRequest,
    ) -> Result<Page<CareEvent>> {
        actor.require(Capability::ViewDashboard)?;
        self.bounded(
            "care_events.list",
            self.store.care_events().list(&filter, self.page(page)),
        )
        .await
    }

    pub async fn get_care_event(&self, actor: &Actor, id: Uuid) -> Result<CareEvent> {
        actor.require(Capability::ViewDashboard)?;
        self.bounded("care_events.get", self.store.care_events().get(id))
            .await?
            .ok_or_else(|| CaravaneError::not_found("care event", id))
    }

    pub async fn create_care_event(&self, actor: &Actor, data: NewCareEvent) -> Result<CareEvent> {
        actor.require(Capability::ManageCareEvents)?;
        validate_new_care_event(&data, Self::today())?;
        self.bounded("care_events.create", self.store.care_events().create(data))
            .await
    }

    pub async fn update_care_event(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: CareEventPatch,
    ) -> Result<CareEvent> {
        actor.require(Capability::ManageCareEvents)?;
        if patch
            .covered_specialties
            .as_ref()
            .is_some_and(BTreeSet::is_empty)
        {
            return Err(CaravaneError::invalid(
                "covered_specialties",
                "at least one specialty must be covered",
            ));
        }
        self.bounded(
            "care_events.update",
            self.store.care_events().update(id, patch),
        )
        .await?
        .ok_or_else(|| CaravaneError::not_found("care event", id))
    }

    pub async fn delete_care_event(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require(Capability::ManageCareEvents)?;
        if self
            .bounded("care_events.delete", self.store.care_events().delete(id))
            .await?
        {
            Ok(())
        } else {
            Err(CaravaneError::not_found("care event", id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caravane_core::Sex;
    use caravane_database::{
        CareEventRepository, ClinicianRepository, ConsultationMutation, ConsultationRepository,
        MemoryStore, PatientRepository,
    };

    struct Fixture {
        engine: WorkflowEngine,
        admin: Actor,
        intake: Actor,
        gp_x: Actor,
        gp_y: Actor,
        neurologist: Actor,
        psychiatrist: Actor,
        care_event: Uuid,
    }

    fn new_patient(cin: &str) -> NewPatient {
        NewPatient {
            first_name: "Khadija".to_string(),
            last_name: "Berrada".to_string(),
            cin: cin.to_string(),
            address: "Rue 12, Ouarzazate".to_string(),
            age: 38,
            sex: Sex::Female,
            phone: Some("06 12 34 56 78".to_string()),
            email: None,
            birth_date: None,
            medical_history: None,
            referred_to_generalist: false,
        }
    }

    fn staff(username: &str, role: Role, specialty: Option<Specialty>) -> NewClinician {
        NewClinician {
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: "Test".to_string(),
            email: None,
            role,
            specialty,
            active: true,
        }
    }

    async fn actor_for(engine: &WorkflowEngine, admin: &Actor, data: NewClinician) -> Actor {
        let clinician = engine.create_clinician(admin, data).await.unwrap();
        Actor {
            id: clinician.id,
            role: clinician.role,
            specialty: clinician.specialty,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryStore::new())).await
    }

    async fn fixture_with(store: Arc<dyn Store>) -> Fixture {
        let engine = WorkflowEngine::new(store);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let intake = actor_for(&engine, &admin, staff("accueil", Role::Intake, None)).await;
        let gp_x = actor_for(&engine, &admin, staff("gp.x", Role::Generalist, None)).await;
        let gp_y = actor_for(&engine, &admin, staff("gp.y", Role::Generalist, None)).await;
        let neurologist = actor_for(
            &engine,
            &admin,
            staff("neuro", Role::Specialist, Some(Specialty::Neurology)),
        )
        .await;
        let psychiatrist = actor_for(
            &engine,
            &admin,
            staff("psy", Role::Specialist, Some(Specialty::Psychiatry)),
        )
        .await;
        let care_event = engine
            .create_care_event(
                &admin,
                NewCareEvent {
                    name: "Caravane Azilal".to_string(),
                    date: Utc::now().date_naive(),
                    location: "Azilal".to_string(),
                    covered_specialties: [Specialty::Neurology, Specialty::Psychiatry]
                        .into_iter()
                        .collect(),
                    status: CareEventStatus::Ongoing,
                    roster: vec![gp_x.id, neurologist.id],
                    enrolled_patients: Vec::new(),
                },
            )
            .await
            .unwrap()
            .id;

        Fixture {
            engine,
            admin,
            intake,
            gp_x,
            gp_y,
            neurologist,
            psychiatrist,
            care_event,
        }
    }

    async fn referred_patient(f: &Fixture, cin: &str) -> Patient {
        let patient = f.engine.create_patient(&f.intake, new_patient(cin)).await.unwrap();
        f.engine.refer_to_generalist(&f.intake, patient.id).await.unwrap()
    }

    fn gp_consultation(f: &Fixture, patient_id: Uuid) -> NewConsultation {
        let mut data =
            NewConsultation::new(patient_id, f.care_event, Uuid::nil(), ConsultationKind::General);
        data.notes = Some("Examen clinique, céphalées chroniques".to_string());
        data
    }

    #[tokio::test]
    async fn test_intake_to_generalist_flow() {
        let f = fixture().await;
        let patient = f.engine.create_patient(&f.intake, new_patient("AB123")).await.unwrap();

        let intake = f.engine.intake_queue(&f.intake, None, PageRequest::default()).await.unwrap();
        assert_eq!(intake.items.len(), 1);
        assert!(f
            .engine
            .generalist_queue(&f.gp_x, None, PageRequest::default())
            .await
            .unwrap()
            .items
            .is_empty());

        f.engine.refer_to_generalist(&f.intake, patient.id).await.unwrap();
        let intake = f.engine.intake_queue(&f.intake, None, PageRequest::default()).await.unwrap();
        assert!(intake.items.is_empty());

        // 全科医生 X 建立会诊后从自己的队列消失，Y 仍能看到
        let queue = f.engine.generalist_queue(&f.gp_x, None, PageRequest::default()).await.unwrap();
        assert_eq!(queue.items[0].id, patient.id);

        let consultation = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();
        assert_eq!(consultation.status, ConsultationStatus::Completed);
        assert_eq!(consultation.clinician_id, f.gp_x.id);
        assert_eq!(consultation.specialty, Some(Specialty::GeneralMedicine));

        let queue_x = f.engine.generalist_queue(&f.gp_x, None, PageRequest::default()).await.unwrap();
        assert!(queue_x.items.is_empty());
        let queue_y = f.engine.generalist_queue(&f.gp_y, None, PageRequest::default()).await.unwrap();
        assert_eq!(queue_y.items.len(), 1);
    }

    #[tokio::test]
    async fn test_specialist_queue_follows_orientation() {
        let f = fixture().await;
        let patient = referred_patient(&f, "CD456").await;
        let mut data = gp_consultation(&f, patient.id);
        data.orientation_specialties.insert(Specialty::Neurology);
        let c1 = f.engine.create_consultation(&f.gp_x, data).await.unwrap();

        let neuro = f
            .engine
            .specialist_queue(&f.neurologist, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(neuro.items.len(), 1);
        let psy = f
            .engine
            .specialist_queue(&f.psychiatrist, None, PageRequest::default())
            .await
            .unwrap();
        assert!(psy.items.is_empty());

        f.engine.delete_consultation(&f.admin, c1.id).await.unwrap();
        let neuro = f
            .engine
            .specialist_queue(&f.neurologist, None, PageRequest::default())
            .await
            .unwrap();
        assert!(neuro.items.is_empty());
        assert_eq!(neuro.total, 0);
    }

    #[tokio::test]
    async fn test_orientation_repair_through_service() {
        let f = fixture().await;
        let patient = referred_patient(&f, "EF789").await;
        let c = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();

        let patch = OrientationPatch::specialties([Specialty::Neurology])
            .with_clinician(f.psychiatrist.id)
            .with_notes("Suspicion d'épilepsie");
        let updated = f.engine.update_orientation(&f.gp_x, c.id, patch).await.unwrap();
        assert_eq!(updated.orientation_clinician_id, None);
        assert_eq!(updated.status, ConsultationStatus::Completed);

        let patch = OrientationPatch::specialties([Specialty::Neurology])
            .with_clinician(f.neurologist.id)
            .with_notes("Suspicion d'épilepsie");
        let updated = f.engine.update_orientation(&f.gp_x, c.id, patch).await.unwrap();
        assert_eq!(updated.orientation_clinician_id, Some(f.neurologist.id));

        let workload = f.engine.specialist_workload(&f.admin).await.unwrap();
        assert_eq!(workload.len(), 1);
        assert_eq!(workload[0].clinician_id, f.neurologist.id);
        assert_eq!(workload[0].consultations, 1);

        // 清空专科同时清除指定医生
        let updated = f
            .engine
            .update_orientation(&f.gp_x, c.id, OrientationPatch::specialties([]))
            .await
            .unwrap();
        assert_eq!(updated.orientation_clinician_id, None);
    }

    #[tokio::test]
    async fn test_orientation_rejects_non_specialist_target() {
        let f = fixture().await;
        let patient = referred_patient(&f, "GH1").await;
        let c = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();

        let patch = OrientationPatch::default().with_clinician(f.gp_y.id);
        let err = f.engine.update_orientation(&f.gp_x, c.id, patch).await.unwrap_err();
        match err {
            CaravaneError::Validation(errors) => {
                assert!(errors.contains("orientation_clinician_id"))
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // 其他全科医生不能修改别人的会诊
        let err = f
            .engine
            .update_orientation(&f.gp_y, c.id, OrientationPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Permission(_)));
    }

    #[tokio::test]
    async fn test_specialist_consultation_defaults_and_forward_only_status() {
        let f = fixture().await;
        let patient = referred_patient(&f, "IJ2").await;
        let data = NewConsultation::new(
            patient.id,
            f.care_event,
            Uuid::nil(),
            ConsultationKind::Specialized,
        );
        let c = f.engine.create_consultation(&f.neurologist, data).await.unwrap();
        assert_eq!(c.status, ConsultationStatus::InProgress);
        assert_eq!(c.specialty, Some(Specialty::Neurology));
        assert_eq!(c.clinician_id, f.neurologist.id);

        let back = ConsultationPatch {
            status: Some(ConsultationStatus::Awaiting),
            ..Default::default()
        };
        let err = f
            .engine
            .update_consultation(&f.neurologist, c.id, back)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaravaneError::IllegalTransition {
                from: ConsultationStatus::InProgress,
                to: ConsultationStatus::Awaiting
            }
        ));

        let same = ConsultationPatch {
            status: Some(ConsultationStatus::InProgress),
            diagnosis: Patch::Set("Migraine avec aura".to_string()),
            ..Default::default()
        };
        let c = f.engine.update_consultation(&f.neurologist, c.id, same).await.unwrap();
        assert_eq!(c.status, ConsultationStatus::InProgress);
        assert_eq!(c.diagnosis.as_deref(), Some("Migraine avec aura"));
    }

    #[tokio::test]
    async fn test_update_validation_is_all_or_nothing() {
        let f = fixture().await;
        let patient = referred_patient(&f, "KL3").await;
        let c = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();

        let patch = ConsultationPatch {
            out_of_network: Some(true),
            follow_up_required: Some(true),
            ..Default::default()
        };
        let err = f.engine.update_consultation(&f.gp_x, c.id, patch).await.unwrap_err();
        match err {
            CaravaneError::Validation(errors) => assert!(errors.contains("next_appointment_date")),
            other => panic!("unexpected error: {:?}", other),
        }

        let stored = f.engine.get_consultation(&f.gp_x, c.id).await.unwrap();
        assert!(!stored.consultation.out_of_network);
        assert!(!stored.consultation.follow_up_required);
    }

    #[tokio::test]
    async fn test_generalist_notes_required() {
        let f = fixture().await;
        let patient = referred_patient(&f, "MN4").await;
        let mut data = gp_consultation(&f, patient.id);
        data.notes = None;
        let err = f.engine.create_consultation(&f.gp_x, data).await.unwrap_err();
        assert!(matches!(err, CaravaneError::Validation(e) if e.contains("notes")));

        let err = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Validation(e) if e.contains("patient_id")));
    }

    #[tokio::test]
    async fn test_permissions_are_checked_first() {
        let f = fixture().await;
        let err = f
            .engine
            .create_patient(&f.gp_x, new_patient("OP5"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Permission(_)));

        let err = f
            .engine
            .create_consultation(&f.intake, gp_consultation(&f, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Permission(_)));

        let err = f
            .engine
            .delete_patient(&f.intake, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Permission(_)));
    }

    #[tokio::test]
    async fn test_cascading_delete_and_out_of_network() {
        let f = fixture().await;
        let patient = referred_patient(&f, "QR6").await;
        for _ in 0..2 {
            let mut data = gp_consultation(&f, patient.id);
            data.out_of_network = true;
            f.engine.create_consultation(&f.gp_x, data).await.unwrap();
        }

        let flagged = f.engine.out_of_network(&f.gp_x).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].patient.id, patient.id);

        let dashboard = f.engine.dashboard(&f.admin).await.unwrap();
        assert_eq!(dashboard.summary.out_of_network_patients, 1);
        assert_eq!(dashboard.summary.total_consultations, 2);
        assert_eq!(dashboard.active_care_events, 1);

        f.engine.delete_patient(&f.admin, patient.id).await.unwrap();
        let patients = f
            .engine
            .list_patients(&f.admin, PatientFilter::with_ids(vec![patient.id]), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(patients.total, 0);
        let consultations = f
            .engine
            .list_consultations(&f.admin, ConsultationFilter::for_patient(patient.id), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(consultations.total, 0);
        assert!(f.engine.out_of_network(&f.gp_x).await.unwrap().is_empty());

        let err = f.engine.delete_patient(&f.admin, patient.id).await.unwrap_err();
        assert!(matches!(err, CaravaneError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_cin_is_reported() {
        let f = fixture().await;
        f.engine.create_patient(&f.intake, new_patient("ST7")).await.unwrap();
        let err = f
            .engine
            .create_patient(&f.intake, new_patient("st7"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::DuplicateIdentifier(_)));
    }

    #[tokio::test]
    async fn test_referred_out_lists_oriented_patients() {
        let f = fixture().await;
        let patient = referred_patient(&f, "UV8").await;
        let mut data = gp_consultation(&f, patient.id);
        data.orientation_specialties.insert(Specialty::Psychiatry);
        f.engine.create_consultation(&f.gp_x, data).await.unwrap();

        let referred = f.engine.referred_out(&f.gp_x).await.unwrap();
        assert_eq!(referred.len(), 1);
        assert_eq!(referred[0].patient.id, patient.id);
        assert!(f.engine.referred_out(&f.gp_y).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generic_update_repairs_orientation() {
        let f = fixture().await;
        let patient = referred_patient(&f, "WX9").await;
        let c = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();
        let patch = OrientationPatch::specialties([Specialty::Neurology])
            .with_clinician(f.neurologist.id);
        f.engine.update_orientation(&f.gp_x, c.id, patch).await.unwrap();

        // 清空专科时一并清除指定医生
        let clear = ConsultationPatch {
            orientation_specialties: Some(BTreeSet::new()),
            ..Default::default()
        };
        let updated = f.engine.update_consultation(&f.gp_x, c.id, clear).await.unwrap();
        assert!(updated.orientation_specialties.is_empty());
        assert_eq!(updated.orientation_clinician_id, None);

        // 指定的专科医生不在专科集合内
        let patch = ConsultationPatch {
            orientation_specialties: Some([Specialty::Neurology].into_iter().collect()),
            orientation_clinician_id: Patch::Set(f.psychiatrist.id),
            ..Default::default()
        };
        let updated = f.engine.update_consultation(&f.gp_x, c.id, patch).await.unwrap();
        assert_eq!(
            updated.orientation_specialties,
            [Specialty::Neurology].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(updated.orientation_clinician_id, None);

        let patch = ConsultationPatch {
            orientation_clinician_id: Patch::Set(f.neurologist.id),
            ..Default::default()
        };
        let updated = f.engine.update_consultation(&f.gp_x, c.id, patch).await.unwrap();
        assert_eq!(updated.orientation_clinician_id, Some(f.neurologist.id));
    }

    #[tokio::test]
    async fn test_clinician_update_checks_merged_record() {
        let f = fixture().await;
        let clear = ClinicianPatch {
            specialty: Patch::Clear,
            ..Default::default()
        };
        let err = f
            .engine
            .update_clinician(&f.admin, f.neurologist.id, clear)
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Validation(e) if e.contains("specialty")));

        let promote = ClinicianPatch {
            role: Some(Role::Specialist),
            ..Default::default()
        };
        let err = f
            .engine
            .update_clinician(&f.admin, f.intake.id, promote)
            .await
            .unwrap_err();
        assert!(matches!(err, CaravaneError::Validation(e) if e.contains("specialty")));

        let stored = f.engine.get_clinician(&f.admin, f.neurologist.id).await.unwrap();
        assert_eq!(stored.specialty, Some(Specialty::Neurology));
    }

    /// 第一次读取会诊后，另一名写者抢先改写转诊去向
    struct RacingConsultations {
        inner: MemoryStore,
        pending: std::sync::Mutex<Option<(Specialty, Uuid)>>,
    }

    #[async_trait]
    impl ConsultationRepository for RacingConsultations {
        async fn list(
            &self,
            filter: &ConsultationFilter,
            page: PageRequest,
        ) -> Result<Page<Consultation>> {
            self.inner.consultations().list(filter, page).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Consultation>> {
            let found = self.inner.consultations().get(id).await?;
            let pending = self.pending.lock().unwrap().take();
            if let Some((specialty, clinician_id)) = pending {
                self.inner
                    .consultations()
                    .modify(
                        id,
                        Box::new(move |c| {
                            c.orientation_specialties = [specialty].into_iter().collect();
                            c.orientation_clinician_id = Some(clinician_id);
                            Ok(())
                        }),
                    )
                    .await?;
            }
            Ok(found)
        }

        async fn create(&self, consultation: Consultation) -> Result<Consultation> {
            self.inner.consultations().create(consultation).await
        }

        async fn modify(
            &self,
            id: Uuid,
            mutation: ConsultationMutation,
        ) -> Result<Option<Consultation>> {
            self.inner.consultations().modify(id, mutation).await
        }

        async fn delete(&self, id: Uuid) -> Result<bool> {
            self.inner.consultations().delete(id).await
        }
    }

    struct RacingStore {
        inner: MemoryStore,
        consultations: RacingConsultations,
    }

    impl RacingStore {
        fn new() -> Self {
            let inner = MemoryStore::new();
            Self {
                consultations: RacingConsultations {
                    inner: inner.clone(),
                    pending: std::sync::Mutex::new(None),
                },
                inner,
            }
        }
    }

    #[async_trait]
    impl Store for RacingStore {
        fn patients(&self) -> &dyn PatientRepository {
            self.inner.patients()
        }

        fn consultations(&self) -> &dyn ConsultationRepository {
            &self.consultations
        }

        fn clinicians(&self) -> &dyn ClinicianRepository {
            self.inner.clinicians()
        }

        fn care_events(&self) -> &dyn CareEventRepository {
            self.inner.care_events()
        }

        async fn snapshot(&self) -> Result<Snapshot> {
            self.inner.snapshot().await
        }
    }

    #[tokio::test]
    async fn test_orientation_rechecked_after_concurrent_write() {
        let store = Arc::new(RacingStore::new());
        let f = fixture_with(store.clone()).await;
        let patient = referred_patient(&f, "YZ10").await;
        let c = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();

        *store.consultations.pending.lock().unwrap() =
            Some((Specialty::Psychiatry, f.psychiatrist.id));
        let updated = f
            .engine
            .update_orientation(&f.gp_x, c.id, OrientationPatch::specialties([Specialty::Neurology]))
            .await
            .unwrap();

        assert_eq!(
            updated.orientation_specialties,
            [Specialty::Neurology].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(updated.orientation_clinician_id, None);
        assert!(store.consultations.pending.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generic_update_rechecked_after_concurrent_write() {
        let store = Arc::new(RacingStore::new());
        let f = fixture_with(store.clone()).await;
        let patient = referred_patient(&f, "YZ11").await;
        let c = f
            .engine
            .create_consultation(&f.gp_x, gp_consultation(&f, patient.id))
            .await
            .unwrap();

        *store.consultations.pending.lock().unwrap() =
            Some((Specialty::Psychiatry, f.psychiatrist.id));
        let patch = ConsultationPatch {
            orientation_specialties: Some([Specialty::Neurology].into_iter().collect()),
            ..Default::default()
        };
        let updated = f.engine.update_consultation(&f.gp_x, c.id, patch).await.unwrap();
        assert_eq!(updated.orientation_clinician_id, None);
    }

    /// 快照读取很慢的存储
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl Store for SlowStore {
        fn patients(&self) -> &dyn PatientRepository {
            self.inner.patients()
        }

        fn consultations(&self) -> &dyn ConsultationRepository {
            self.inner.consultations()
        }

        fn clinicians(&self) -> &dyn ClinicianRepository {
            self.inner.clinicians()
        }

        fn care_events(&self) -> &dyn CareEventRepository {
            self.inner.care_events()
        }

        async fn snapshot(&self) -> Result<Snapshot> {
            tokio::time::sleep(self.delay).await;
            self.inner.snapshot().await
        }
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(500),
        };
        let engine =
            WorkflowEngine::new(Arc::new(store)).with_timeout(Duration::from_millis(20));
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        let err = engine.dashboard(&admin).await.unwrap_err();
        assert!(matches!(err, CaravaneError::Timeout(_)));
    }
}

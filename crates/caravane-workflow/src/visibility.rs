//! 可见性计算
//!
//! 基于患者与会诊的一致快照，为各角色计算当前需要处理的患者。
//! 全部为纯函数：不做 I/O，不返回错误，空结果总是合法答案。
//! 会诊按账本顺序（最新在前）遍历，“首次遇到”均以此顺序为准。

use caravane_core::{
    Clinician, ConsultationKind, ConsultationStatus, Role, Snapshot, Specialty,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// 全科医生已转出的患者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralEntry {
    pub patient_id: Uuid,
    pub consultation_id: Uuid,
    pub referred_at: DateTime<Utc>,
}

/// 超出覆盖范围的患者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutOfNetworkEntry {
    pub patient_id: Uuid,
    pub consultation_id: Uuid,
    pub flagged_at: DateTime<Utc>,
}

/// 专科医生的受益患者数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistBeneficiaries {
    pub clinician_id: Uuid,
    pub name: String,
    pub specialty: Option<Specialty>,
    pub patients: usize,
}

/// 仪表盘汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub total_patients: usize,
    pub total_consultations: usize,
    pub awaiting_consultations: usize,
    pub out_of_network_patients: usize,
}

/// 保持首次出现顺序的去重
fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// 接待队列：尚未转介全科且没有任何会诊的患者
pub fn intake_queue(snapshot: &Snapshot) -> Vec<Uuid> {
    let consulted: HashSet<Uuid> = snapshot.consultations.iter().map(|c| c.patient_id).collect();
    snapshot
        .patients
        .iter()
        .filter(|p| !p.referred_to_generalist && !consulted.contains(&p.id))
        .map(|p| p.id)
        .collect()
}

/// 全科队列：已转介全科，且该医生本人尚未为其建立会诊
///
/// 排除范围仅限当前医生，其他全科医生仍能看到同一患者。
pub fn generalist_queue(snapshot: &Snapshot, clinician_id: Uuid) -> Vec<Uuid> {
    let seen_by_clinician: HashSet<Uuid> = snapshot
        .consultations
        .iter()
        .filter(|c| c.clinician_id == clinician_id)
        .map(|c| c.patient_id)
        .collect();
    snapshot
        .patients
        .iter()
        .filter(|p| p.referred_to_generalist && !seen_by_clinician.contains(&p.id))
        .map(|p| p.id)
        .collect()
}

/// 专科队列：直接指定给该医生的会诊，加上转向其专科且未指定医生的会诊
pub fn specialist_queue(
    snapshot: &Snapshot,
    clinician_id: Uuid,
    specialty: Option<Specialty>,
) -> Vec<Uuid> {
    distinct(
        snapshot
            .consultations
            .iter()
            .filter(|c| match c.orientation_clinician_id {
                Some(target) => target == clinician_id,
                None => specialty.is_some_and(|spec| c.orientation_specialties.contains(&spec)),
            })
            .map(|c| c.patient_id),
    )
}

/// 全科医生已转出的患者，每名患者一条，取首次遇到的会诊
pub fn generalist_referred_out(snapshot: &Snapshot, clinician_id: Uuid) -> Vec<ReferralEntry> {
    let mut seen = HashSet::new();
    snapshot
        .consultations
        .iter()
        .filter(|c| c.clinician_id == clinician_id && c.has_orientation_target())
        .filter(|c| seen.insert(c.patient_id))
        .map(|c| ReferralEntry {
            patient_id: c.patient_id,
            consultation_id: c.id,
            referred_at: c.updated_at,
        })
        .collect()
}

/// 超出覆盖范围的患者，每名患者一条，标记日期取首次遇到的会诊
pub fn out_of_network(snapshot: &Snapshot) -> Vec<OutOfNetworkEntry> {
    let mut seen = HashSet::new();
    snapshot
        .consultations
        .iter()
        .filter(|c| c.out_of_network)
        .filter(|c| seen.insert(c.patient_id))
        .map(|c| OutOfNetworkEntry {
            patient_id: c.patient_id,
            consultation_id: c.id,
            flagged_at: c.created_at,
        })
        .collect()
}

/// 各专科医生被直接指定的会诊数
pub fn specialist_workload(snapshot: &Snapshot) -> HashMap<Uuid, usize> {
    let mut workload = HashMap::new();
    for target in snapshot
        .consultations
        .iter()
        .filter_map(|c| c.orientation_clinician_id)
    {
        *workload.entry(target).or_insert(0) += 1;
    }
    workload
}

/// 各专科的受益患者数（不同患者计数），所有专科都会出现
pub fn beneficiaries_by_specialty(snapshot: &Snapshot) -> BTreeMap<Specialty, usize> {
    let mut patients: BTreeMap<Specialty, HashSet<Uuid>> = Specialty::all()
        .into_iter()
        .map(|spec| (spec, HashSet::new()))
        .collect();
    for c in &snapshot.consultations {
        if let Some(spec) = c.specialty {
            patients.entry(spec).or_default().insert(c.patient_id);
        }
    }
    patients
        .into_iter()
        .map(|(spec, ids)| (spec, ids.len()))
        .collect()
}

/// 在职专科医生各自接诊的受益患者数，按人数降序
pub fn beneficiaries_by_specialist(
    snapshot: &Snapshot,
    clinicians: &[Clinician],
) -> Vec<SpecialistBeneficiaries> {
    let mut patients: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    for c in snapshot
        .consultations
        .iter()
        .filter(|c| c.kind == ConsultationKind::Specialized)
    {
        patients.entry(c.clinician_id).or_default().insert(c.patient_id);
    }

    let mut rows: Vec<SpecialistBeneficiaries> = clinicians
        .iter()
        .filter(|clinician| clinician.role == Role::Specialist && clinician.active)
        .map(|clinician| SpecialistBeneficiaries {
            clinician_id: clinician.id,
            name: clinician.full_name(),
            specialty: clinician.specialty,
            patients: patients.get(&clinician.id).map_or(0, HashSet::len),
        })
        .collect();
    rows.sort_by(|a, b| b.patients.cmp(&a.patients).then_with(|| a.name.cmp(&b.name)));
    rows
}

pub fn summary(snapshot: &Snapshot) -> DashboardSummary {
    DashboardSummary {
        total_patients: snapshot.patients.len(),
        total_consultations: snapshot.consultations.len(),
        awaiting_consultations: snapshot
            .consultations
            .iter()
            .filter(|c| c.status == ConsultationStatus::Awaiting)
            .count(),
        out_of_network_patients: out_of_network(snapshot).len(),
    }
}

//! 转诊去向
//!
//! 全科医生在会诊上填写的转诊目标：专科集合、指定专科医生、超出覆盖范围标记。
//! 指定医生必须属于所选专科之一，否则在同一次更新中被清除（修复而非拒绝）。

use crate::state_machine::ConsultationStateMachine;
use caravane_core::utils::non_blank;
use caravane_core::{CaravaneError, Consultation, Patch, Result, Specialty};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// 转诊去向编辑
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationPatch {
    pub orientation_specialties: Option<BTreeSet<Specialty>>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub orientation_clinician_id: Patch<Uuid>,
    pub out_of_network: Option<bool>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub orientation_comment: Patch<String>,
    /// 临床理由；缺省时沿用会诊已有的记录
    pub notes: Option<String>,
}

impl OrientationPatch {
    pub fn specialties(specialties: impl IntoIterator<Item = Specialty>) -> Self {
        Self {
            orientation_specialties: Some(specialties.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_clinician(mut self, clinician_id: Uuid) -> Self {
        self.orientation_clinician_id = Patch::Set(clinician_id);
        self
    }

    pub fn out_of_network(mut self, flag: bool) -> Self {
        self.out_of_network = Some(flag);
        self
    }
}

/// 一致性修复，返回是否清除了指定医生
///
/// - 专科集合由非空变为空时清除指定医生
/// - 专科集合非空且医生专科不在其中时清除指定医生
///
/// `specialty_of` 查询医生专科；查不到时不做第二项修复。
pub fn repair_orientation(
    consultation: &mut Consultation,
    previous_specialties: &BTreeSet<Specialty>,
    specialty_of: impl Fn(Uuid) -> Option<Specialty>,
) -> bool {
    let Some(clinician_id) = consultation.orientation_clinician_id else {
        return false;
    };

    let specialties = &consultation.orientation_specialties;
    let cleared_specialties = specialties.is_empty() && !previous_specialties.is_empty();
    let mismatched = !specialties.is_empty()
        && specialty_of(clinician_id).is_some_and(|spec| !specialties.contains(&spec));

    if cleared_specialties || mismatched {
        tracing::debug!(
            "Clearing orientation clinician {} on consultation {}",
            clinician_id,
            consultation.id
        );
        consultation.orientation_clinician_id = None;
        true
    } else {
        false
    }
}

/// 在会诊上应用转诊去向编辑
///
/// 理由为空时返回 `notes` 字段的验证错误且不修改记录；
/// 成功后状态推进到 completed，已完成的记录保持 completed。
pub fn apply_orientation(
    consultation: &mut Consultation,
    patch: OrientationPatch,
    state_machine: &ConsultationStateMachine,
    specialty_of: impl Fn(Uuid) -> Option<Specialty>,
) -> Result<()> {
    let notes = match &patch.notes {
        Some(notes) => non_blank(Some(notes.as_str())).map(str::to_string),
        None => non_blank(consultation.notes.as_deref()).map(str::to_string),
    };
    let Some(notes) = notes else {
        return Err(CaravaneError::invalid(
            "notes",
            "clinical notes are required to justify the orientation",
        ));
    };

    let previous = consultation.orientation_specialties.clone();
    if let Some(specialties) = patch.orientation_specialties {
        consultation.orientation_specialties = specialties;
    }
    patch
        .orientation_clinician_id
        .apply_to(&mut consultation.orientation_clinician_id);
    if let Some(flag) = patch.out_of_network {
        consultation.out_of_network = flag;
    }
    patch
        .orientation_comment
        .apply_to(&mut consultation.orientation_comment);
    consultation.notes = Some(notes);

    repair_orientation(consultation, &previous, specialty_of);

    consultation.status = state_machine.complete(consultation.status);
    consultation.updated_at = chrono::Utc::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravane_core::{ConsultationKind, ConsultationStatus, NewConsultation};

    fn consultation(status: ConsultationStatus) -> Consultation {
        let mut data = NewConsultation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            ConsultationKind::General,
        );
        data.notes = Some("Crises convulsives récurrentes".to_string());
        Consultation::new(data, status)
    }

    #[test]
    fn test_mismatched_clinician_is_cleared() {
        let psychiatrist = Uuid::new_v4();
        let mut c = consultation(ConsultationStatus::Awaiting);
        let patch = OrientationPatch::specialties([Specialty::Neurology]).with_clinician(psychiatrist);

        apply_orientation(&mut c, patch, &ConsultationStateMachine::new(), |_| {
            Some(Specialty::Psychiatry)
        })
        .unwrap();

        assert_eq!(c.orientation_clinician_id, None);
        assert!(c.orientation_specialties.contains(&Specialty::Neurology));
    }

    #[test]
    fn test_matching_clinician_is_kept() {
        let neurologist = Uuid::new_v4();
        let mut c = consultation(ConsultationStatus::Awaiting);
        let patch = OrientationPatch::specialties([Specialty::Neurology, Specialty::Psychiatry])
            .with_clinician(neurologist);

        apply_orientation(&mut c, patch, &ConsultationStateMachine::new(), |_| {
            Some(Specialty::Neurology)
        })
        .unwrap();

        assert_eq!(c.orientation_clinician_id, Some(neurologist));
    }

    #[test]
    fn test_emptying_specialties_clears_clinician() {
        let neurologist = Uuid::new_v4();
        let mut c = consultation(ConsultationStatus::Completed);
        c.orientation_specialties.insert(Specialty::Neurology);
        c.orientation_clinician_id = Some(neurologist);

        let patch = OrientationPatch::specialties([]);
        apply_orientation(&mut c, patch, &ConsultationStateMachine::new(), |_| {
            Some(Specialty::Neurology)
        })
        .unwrap();

        assert!(c.orientation_specialties.is_empty());
        assert_eq!(c.orientation_clinician_id, None);
    }

    #[test]
    fn test_clinician_only_orientation_survives() {
        // 从未选择专科时，仅指定医生是合法的
        let neurologist = Uuid::new_v4();
        let mut c = consultation(ConsultationStatus::Awaiting);
        let patch = OrientationPatch::default().with_clinician(neurologist);

        apply_orientation(&mut c, patch, &ConsultationStateMachine::new(), |_| {
            Some(Specialty::Neurology)
        })
        .unwrap();

        assert_eq!(c.orientation_clinician_id, Some(neurologist));
    }

    #[test]
    fn test_blank_notes_rejected_without_changes() {
        let mut c = consultation(ConsultationStatus::InProgress);
        let before = c.clone();
        let patch = OrientationPatch::specialties([Specialty::Psychiatry]).with_notes("   ");

        let err = apply_orientation(&mut c, patch, &ConsultationStateMachine::new(), |_| None)
            .unwrap_err();

        match err {
            CaravaneError::Validation(errors) => assert!(errors.contains("notes")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(c, before);
    }

    #[test]
    fn test_orientation_completes_and_is_idempotent() {
        let sm = ConsultationStateMachine::new();
        let mut c = consultation(ConsultationStatus::Awaiting);

        apply_orientation(&mut c, OrientationPatch::default().out_of_network(true), &sm, |_| None)
            .unwrap();
        assert_eq!(c.status, ConsultationStatus::Completed);
        assert!(c.out_of_network);

        apply_orientation(&mut c, OrientationPatch::default(), &sm, |_| None).unwrap();
        assert_eq!(c.status, ConsultationStatus::Completed);
    }
}

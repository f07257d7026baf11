//! 角色能力集合与操作者身份
//!
//! 每个角色对应一组固定能力，在授权边界处检查一次。

use crate::error::{CaravaneError, Result};
use crate::models::{Role, Specialty};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// 系统能力
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    /// 接待队列与患者登记
    ManagePatientsIntake,
    AddPatients,
    /// 全科待诊队列
    ViewReferredPatients,
    /// 专科转诊队列
    ViewSpecialistPatients,
    AddConsultations,
    ManageConsultationsGeneral,
    ManageConsultationsSpecialist,
    /// 修改全科转诊去向
    EditOrientation,
    ViewOutOfNetwork,
    ManagePatientsFull,
    ManageConsultationsFull,
    ManageCareEvents,
    ManageClinicians,
}

impl Role {
    /// 角色的能力集合
    pub fn capabilities(&self) -> HashSet<Capability> {
        use Capability::*;
        let caps: &[Capability] = match self {
            Role::Intake => &[ViewDashboard, ManagePatientsIntake, AddPatients],
            Role::Generalist => &[
                ViewDashboard,
                ViewReferredPatients,
                AddConsultations,
                ManageConsultationsGeneral,
                EditOrientation,
                ViewOutOfNetwork,
            ],
            Role::Specialist => &[
                ViewDashboard,
                ViewSpecialistPatients,
                AddConsultations,
                ManageConsultationsSpecialist,
            ],
            Role::Admin => &[
                ViewDashboard,
                ManagePatientsIntake,
                AddPatients,
                ViewReferredPatients,
                ViewSpecialistPatients,
                AddConsultations,
                ManageConsultationsGeneral,
                ManageConsultationsSpecialist,
                EditOrientation,
                ViewOutOfNetwork,
                ManagePatientsFull,
                ManageConsultationsFull,
                ManageCareEvents,
                ManageClinicians,
            ],
        };
        caps.iter().copied().collect()
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// 已通过认证的操作者
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub specialty: Option<Specialty>,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            specialty: None,
        }
    }

    pub fn specialist(id: Uuid, specialty: Specialty) -> Self {
        Self {
            id,
            role: Role::Specialist,
            specialty: Some(specialty),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 检查能力，不满足时返回权限错误
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.role.has(capability) {
            Ok(())
        } else {
            tracing::warn!(
                "Actor {} ({}) denied capability {:?}",
                self.id,
                self.role,
                capability
            );
            Err(CaravaneError::Permission(format!(
                "role {} lacks capability {:?}",
                self.role, capability
            )))
        }
    }

    /// 满足任一能力即可
    pub fn require_any(&self, capabilities: &[Capability]) -> Result<()> {
        match capabilities.iter().find(|cap| self.role.has(**cap)) {
            Some(_) => Ok(()),
            None => Err(CaravaneError::Permission(format!(
                "role {} lacks any of {:?}",
                self.role, capabilities
            ))),
        }
    }
}

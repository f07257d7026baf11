//! 仓储接口
//!
//! 工作流层只依赖这些 trait；测试使用内存实现，生产环境使用 PostgreSQL 实现。

use crate::filters::{CareEventFilter, ClinicianFilter, ConsultationFilter, PatientFilter};
use async_trait::async_trait;
use caravane_core::{
    CareEvent, CareEventPatch, Clinician, ClinicianPatch, Consultation, ConsultationPatch,
    NewCareEvent, NewClinician, NewPatient, Page, PageRequest, Patient, PatientPatch, Result,
    Snapshot,
};
use uuid::Uuid;

/// 在单条会诊的写锁内执行的修改
///
/// 返回错误时修改整体作废，不会部分写入。
pub type ConsultationMutation = Box<dyn FnOnce(&mut Consultation) -> Result<()> + Send>;

/// 患者登记仓储
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>>;

    async fn get(&self, id: Uuid) -> Result<Option<Patient>>;

    /// CIN 冲突（忽略大小写）时返回 `DuplicateIdentifier`
    async fn create(&self, data: NewPatient) -> Result<Patient>;

    /// 与其他患者重新检查 CIN 唯一性
    async fn update(&self, id: Uuid, patch: PatientPatch) -> Result<Option<Patient>>;

    /// 删除患者并原子地级联删除其全部会诊
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// 会诊账本仓储
#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn list(
        &self,
        filter: &ConsultationFilter,
        page: PageRequest,
    ) -> Result<Page<Consultation>>;

    async fn get(&self, id: Uuid) -> Result<Option<Consultation>>;

    /// 写入一条已构造好的会诊；患者必须存在
    async fn create(&self, consultation: Consultation) -> Result<Consultation>;

    /// 读取-修改-写回，整个过程对该会诊串行化
    async fn modify(&self, id: Uuid, mutation: ConsultationMutation)
        -> Result<Option<Consultation>>;

    async fn update(&self, id: Uuid, patch: ConsultationPatch) -> Result<Option<Consultation>> {
        self.modify(
            id,
            Box::new(move |consultation| {
                consultation.apply(patch);
                Ok(())
            }),
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// 医务人员仓储
#[async_trait]
pub trait ClinicianRepository: Send + Sync {
    async fn list(&self, filter: &ClinicianFilter, page: PageRequest) -> Result<Page<Clinician>>;

    async fn get(&self, id: Uuid) -> Result<Option<Clinician>>;

    /// 用户名冲突（忽略大小写）时返回 `DuplicateIdentifier`
    async fn create(&self, data: NewClinician) -> Result<Clinician>;

    async fn update(&self, id: Uuid, patch: ClinicianPatch) -> Result<Option<Clinician>>;

    /// 不允许删除最后一名管理员
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// 大篷车仓储
#[async_trait]
pub trait CareEventRepository: Send + Sync {
    async fn list(&self, filter: &CareEventFilter, page: PageRequest) -> Result<Page<CareEvent>>;

    async fn get(&self, id: Uuid) -> Result<Option<CareEvent>>;

    async fn create(&self, data: NewCareEvent) -> Result<CareEvent>;

    async fn update(&self, id: Uuid, patch: CareEventPatch) -> Result<Option<CareEvent>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// 四类仓储的组合，并提供一致快照
#[async_trait]
pub trait Store: Send + Sync {
    fn patients(&self) -> &dyn PatientRepository;

    fn consultations(&self) -> &dyn ConsultationRepository;

    fn clinicians(&self) -> &dyn ClinicianRepository;

    fn care_events(&self) -> &dyn CareEventRepository;

    /// 同时读取患者与会诊，不会观察到写了一半的修改
    async fn snapshot(&self) -> Result<Snapshot>;
}

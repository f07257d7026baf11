//! 核心数据模型定义

use crate::query::Patch;
use crate::utils::{generate_unique_number, normalize_cin};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 性别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "M" => Ok(Sex::Male),
            "F" => Ok(Sex::Female),
            other => Err(format!("unknown sex code: {}", other)),
        }
    }
}

/// 医学专科
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Neurology,
    Neurosurgery,
    Psychiatry,
    GeneralMedicine,
}

impl Specialty {
    /// 所有已知专科
    pub fn all() -> [Specialty; 4] {
        [
            Specialty::Neurology,
            Specialty::Neurosurgery,
            Specialty::Psychiatry,
            Specialty::GeneralMedicine,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Neurology => "neurology",
            Specialty::Neurosurgery => "neurosurgery",
            Specialty::Psychiatry => "psychiatry",
            Specialty::GeneralMedicine => "general_medicine",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Specialty::all()
            .into_iter()
            .find(|spec| spec.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown specialty: {}", s))
    }
}

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 接待 - 登记患者并转介全科
    Intake,
    /// 全科医生 - 初诊分诊
    Generalist,
    /// 专科医生 - 接收转诊
    Specialist,
    /// 管理员
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Intake => "intake",
            Role::Generalist => "generalist",
            Role::Specialist => "specialist",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intake" => Ok(Role::Intake),
            "generalist" => Ok(Role::Generalist),
            "specialist" => Ok(Role::Specialist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub unique_number: String, // PAT-xxxxxxxx
    pub first_name: String,
    pub last_name: String,
    pub cin: String, // 国民身份证号
    pub address: String,
    pub age: u8,
    pub sex: Sex,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub medical_history: Option<String>,
    pub referred_to_generalist: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新患者登记数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub cin: String,
    pub address: String,
    pub age: u8,
    pub sex: Sex,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub referred_to_generalist: bool,
}

/// 患者部分更新
///
/// 必填字段用 `Option` 表示“是否修改”，可选字段用 [`Patch`] 区分保留与清空。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub cin: Option<String>,
    pub address: Option<String>,
    pub age: Option<u8>,
    pub sex: Option<Sex>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub phone: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub email: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub birth_date: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub medical_history: Patch<String>,
    pub referred_to_generalist: Option<bool>,
}

impl Patient {
    /// 根据登记数据创建患者记录
    pub fn new(data: NewPatient) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            unique_number: generate_unique_number("PAT", 8),
            first_name: data.first_name.trim().to_string(),
            last_name: data.last_name.trim().to_string(),
            cin: data.cin.trim().to_string(),
            address: data.address.trim().to_string(),
            age: data.age,
            sex: data.sex,
            phone: data.phone,
            email: data.email,
            birth_date: data.birth_date,
            medical_history: data.medical_history,
            referred_to_generalist: data.referred_to_generalist,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// 归一化后的CIN，用于唯一性比较
    pub fn normalized_cin(&self) -> String {
        normalize_cin(&self.cin)
    }

    /// 大小写不敏感的子串搜索（姓、名、CIN、编号）
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [
            &self.last_name,
            &self.first_name,
            &self.cin,
            &self.unique_number,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
    }

    /// 应用部分更新并刷新 `updated_at`
    pub fn apply(&mut self, patch: PatientPatch) {
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(cin) = patch.cin {
            self.cin = cin.trim().to_string();
        }
        if let Some(address) = patch.address {
            self.address = address.trim().to_string();
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(sex) = patch.sex {
            self.sex = sex;
        }
        patch.phone.apply_to(&mut self.phone);
        patch.email.apply_to(&mut self.email);
        patch.birth_date.apply_to(&mut self.birth_date);
        patch.medical_history.apply_to(&mut self.medical_history);
        if let Some(flag) = patch.referred_to_generalist {
            self.referred_to_generalist = flag;
        }
        self.updated_at = Utc::now();
    }
}

/// 会诊类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationKind {
    General,
    Specialized,
}

impl ConsultationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationKind::General => "general",
            ConsultationKind::Specialized => "specialized",
        }
    }
}

impl FromStr for ConsultationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "general" => Ok(ConsultationKind::General),
            "specialized" => Ok(ConsultationKind::Specialized),
            other => Err(format!("unknown consultation kind: {}", other)),
        }
    }
}

/// 会诊状态，声明顺序即前进顺序
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Awaiting,   // 待处理
    InProgress, // 进行中
    Completed,  // 已完成
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Awaiting => "awaiting",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "awaiting" => Ok(ConsultationStatus::Awaiting),
            "in_progress" => Ok(ConsultationStatus::InProgress),
            "completed" => Ok(ConsultationStatus::Completed),
            other => Err(format!("unknown consultation status: {}", other)),
        }
    }
}

/// 会诊记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub care_event_id: Uuid,
    pub clinician_id: Uuid, // 记录作者
    pub kind: ConsultationKind,
    pub specialty: Option<Specialty>,
    pub status: ConsultationStatus,
    pub orientation_specialties: BTreeSet<Specialty>,
    pub orientation_clinician_id: Option<Uuid>,
    pub out_of_network: bool, // 超出大篷车覆盖专科
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

/// 新会诊数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsultation {
    pub patient_id: Uuid,
    pub care_event_id: Uuid,
    /// 作者；非管理员创建时取操作者本人
    #[serde(default)]
    pub clinician_id: Uuid,
    pub kind: ConsultationKind,
    #[serde(default)]
    pub specialty: Option<Specialty>,
    /// 为空时按作者角色取默认值
    #[serde(default)]
    pub status: Option<ConsultationStatus>,
    #[serde(default)]
    pub orientation_specialties: BTreeSet<Specialty>,
    #[serde(default)]
    pub orientation_clinician_id: Option<Uuid>,
    #[serde(default)]
    pub out_of_network: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub orientation_comment: Option<String>,
    #[serde(default)]
    pub scanner_performed: bool,
    #[serde(default)]
    pub hospital_referral: bool,
    #[serde(default)]
    pub follow_up_required: bool,
    #[serde(default)]
    pub appointment_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_appointment_date: Option<NaiveDate>,
}

impl NewConsultation {
    /// 最小字段构造，其余取默认值
    pub fn new(patient_id: Uuid, care_event_id: Uuid, clinician_id: Uuid, kind: ConsultationKind) -> Self {
        Self {
            patient_id,
            care_event_id,
            clinician_id,
            kind,
            specialty: None,
            status: None,
            orientation_specialties: BTreeSet::new(),
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
        }
    }
}

/// 会诊部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultationPatch {
    pub care_event_id: Option<Uuid>,
    pub kind: Option<ConsultationKind>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub specialty: Patch<Specialty>,
    pub status: Option<ConsultationStatus>,
    pub orientation_specialties: Option<BTreeSet<Specialty>>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub orientation_clinician_id: Patch<Uuid>,
    pub out_of_network: Option<bool>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub notes: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub diagnosis: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub orientation_comment: Patch<String>,
    pub scanner_performed: Option<bool>,
    pub hospital_referral: Option<bool>,
    pub follow_up_required: Option<bool>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub appointment_date: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub next_appointment_date: Patch<NaiveDate>,
}

impl Consultation {
    /// 根据新会诊数据创建记录，状态必须已确定
    pub fn new(data: NewConsultation, status: ConsultationStatus) -> Self {
        let now = Utc::now();
        let specialty = match data.kind {
            ConsultationKind::General => Some(Specialty::GeneralMedicine),
            ConsultationKind::Specialized => data.specialty,
        };
        Self {
            id: Uuid::new_v4(),
            patient_id: data.patient_id,
            care_event_id: data.care_event_id,
            clinician_id: data.clinician_id,
            kind: data.kind,
            specialty,
            status,
            orientation_specialties: data.orientation_specialties,
            orientation_clinician_id: data.orientation_clinician_id,
            out_of_network: data.out_of_network,
            notes: data.notes,
            diagnosis: data.diagnosis,
            orientation_comment: data.orientation_comment,
            scanner_performed: data.scanner_performed,
            hospital_referral: data.hospital_referral,
            follow_up_required: data.follow_up_required,
            appointment_date: data.appointment_date,
            next_appointment_date: data.next_appointment_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// 是否带有任一转诊目标（专科或指定医生）
    pub fn has_orientation_target(&self) -> bool {
        !self.orientation_specialties.is_empty() || self.orientation_clinician_id.is_some()
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.id.to_string().contains(&term)
            || [&self.notes, &self.diagnosis, &self.orientation_comment]
                .iter()
                .filter_map(|field| field.as_deref())
                .any(|text| text.to_lowercase().contains(&term))
    }

    /// 逐字段应用更新，不做一致性修复；修复由工作流层负责
    pub fn apply(&mut self, patch: ConsultationPatch) {
        if let Some(care_event_id) = patch.care_event_id {
            self.care_event_id = care_event_id;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        patch.specialty.apply_to(&mut self.specialty);
        if self.kind == ConsultationKind::General {
            self.specialty = Some(Specialty::GeneralMedicine);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(specialties) = patch.orientation_specialties {
            self.orientation_specialties = specialties;
        }
        patch
            .orientation_clinician_id
            .apply_to(&mut self.orientation_clinician_id);
        if let Some(flag) = patch.out_of_network {
            self.out_of_network = flag;
        }
        patch.notes.apply_to(&mut self.notes);
        patch.diagnosis.apply_to(&mut self.diagnosis);
        patch.orientation_comment.apply_to(&mut self.orientation_comment);
        if let Some(flag) = patch.scanner_performed {
            self.scanner_performed = flag;
        }
        if let Some(flag) = patch.hospital_referral {
            self.hospital_referral = flag;
        }
        if let Some(flag) = patch.follow_up_required {
            self.follow_up_required = flag;
        }
        patch.appointment_date.apply_to(&mut self.appointment_date);
        patch
            .next_appointment_date
            .apply_to(&mut self.next_appointment_date);
        self.updated_at = Utc::now();
    }
}

/// 医务人员
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinician {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub specialty: Option<Specialty>, // 仅专科医生
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClinician {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub specialty: Option<Specialty>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicianPatch {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub email: Patch<String>,
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub specialty: Patch<Specialty>,
    pub active: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl ClinicianPatch {
    /// 补丁是否会让这名管理员失去管理员角色
    pub fn revokes_admin(&self, current: &Clinician) -> bool {
        current.role == Role::Admin && self.role.is_some_and(|role| role != Role::Admin)
    }
}

impl Clinician {
    pub fn new(data: NewClinician) -> Self {
        let now = Utc::now();
        // 全科医生默认归入全科专科
        let specialty = match data.role {
            Role::Specialist => data.specialty,
            Role::Generalist => Some(Specialty::GeneralMedicine),
            _ => None,
        };
        Self {
            id: Uuid::new_v4(),
            username: data.username.trim().to_string(),
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email,
            role: data.role,
            specialty,
            active: data.active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_specialist(&self) -> bool {
        self.role == Role::Specialist
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [&self.username, &self.first_name, &self.last_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    pub fn apply(&mut self, patch: ClinicianPatch) {
        if let Some(username) = patch.username {
            self.username = username.trim().to_string();
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name;
        }
        patch.email.apply_to(&mut self.email);
        if let Some(role) = patch.role {
            self.role = role;
        }
        patch.specialty.apply_to(&mut self.specialty);
        if let Some(active) = patch.active {
            self.active = active;
        }
        self.updated_at = Utc::now();
    }
}

/// 大篷车状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CareEventStatus {
    Planned,
    Ongoing,
    Finished,
}

impl CareEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CareEventStatus::Planned => "planned",
            CareEventStatus::Ongoing => "ongoing",
            CareEventStatus::Finished => "finished",
        }
    }
}

impl FromStr for CareEventStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "planned" => Ok(CareEventStatus::Planned),
            "ongoing" => Ok(CareEventStatus::Ongoing),
            "finished" => Ok(CareEventStatus::Finished),
            other => Err(format!("unknown care event status: {}", other)),
        }
    }
}

/// 医疗大篷车活动
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CareEvent {
    pub id: Uuid,
    pub unique_number: String, // CAR-xxxxxx
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub covered_specialties: BTreeSet<Specialty>,
    pub status: CareEventStatus,
    pub roster: Vec<Uuid>,
    pub enrolled_patients: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCareEvent {
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub covered_specialties: BTreeSet<Specialty>,
    pub status: CareEventStatus,
    #[serde(default)]
    pub roster: Vec<Uuid>,
    #[serde(default)]
    pub enrolled_patients: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CareEventPatch {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub covered_specialties: Option<BTreeSet<Specialty>>,
    pub status: Option<CareEventStatus>,
    pub roster: Option<Vec<Uuid>>,
    pub enrolled_patients: Option<Vec<Uuid>>,
}

impl CareEvent {
    pub fn new(data: NewCareEvent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            unique_number: generate_unique_number("CAR", 6),
            name: data.name.trim().to_string(),
            date: data.date,
            location: data.location.trim().to_string(),
            covered_specialties: data.covered_specialties,
            status: data.status,
            roster: dedup_ids(data.roster),
            enrolled_patients: dedup_ids(data.enrolled_patients),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn covers(&self, specialty: Specialty) -> bool {
        self.covered_specialties.contains(&specialty)
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [&self.name, &self.location, &self.unique_number]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    pub fn apply(&mut self, patch: CareEventPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(location) = patch.location {
            self.location = location.trim().to_string();
        }
        if let Some(specialties) = patch.covered_specialties {
            self.covered_specialties = specialties;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(roster) = patch.roster {
            self.roster = dedup_ids(roster);
        }
        if let Some(patients) = patch.enrolled_patients {
            self.enrolled_patients = dedup_ids(patients);
        }
        self.updated_at = Utc::now();
    }
}

/// 去重并保持原有顺序
fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// 患者与会诊集合的一致快照
///
/// 会诊按账本顺序排列（最新在前），可见性计算中的“首次遇到”以此顺序为准。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub patients: Vec<Patient>,
    pub consultations: Vec<Consultation>,
}

//! PostgreSQL 存储实现
//!
//! 读-改-写操作都在事务中以 `SELECT ... FOR UPDATE` 锁定目标行，
//! 唯一性由函数索引保证，违反时映射为 `DuplicateIdentifier`。

use crate::connection::DatabasePool;
use crate::filters::{CareEventFilter, ClinicianFilter, ConsultationFilter, PatientFilter};
use crate::models::*;
use crate::repository::{
    CareEventRepository, ClinicianRepository, ConsultationMutation, ConsultationRepository,
    PatientRepository, Store,
};
use async_trait::async_trait;
use caravane_core::{
    CaravaneError, CareEvent, CareEventPatch, Clinician, ClinicianPatch, Consultation,
    NewCareEvent, NewClinician, NewPatient, Page, PageRequest, Patient, PatientPatch, Result,
    Role, Snapshot,
};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// 判断是否为指定 SQLSTATE 的约束冲突
fn is_violation(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// 唯一约束冲突且冲突的正是指定索引
fn is_unique_violation_on(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            violates(db.code().as_deref(), db.constraint(), UNIQUE_VIOLATION, constraint)
        }
        _ => false,
    }
}

fn violates(
    code: Option<&str>,
    constraint: Option<&str>,
    expected_code: &str,
    expected: &str,
) -> bool {
    code == Some(expected_code) && constraint == Some(expected)
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const PATIENT_CIN_INDEX: &str = "idx_patients_cin_normalized";
const CLINICIAN_USERNAME_INDEX: &str = "idx_clinicians_username";

fn page_bounds(page: PageRequest) -> (i64, i64) {
    let limit = i64::try_from(page.limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}

fn lowered_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// 拼接“任一列包含搜索词”的条件（大小写不敏感）
fn push_search(qb: &mut QueryBuilder<'_, Postgres>, columns: &[&str], term: &str) {
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(format!("strpos(lower(COALESCE({}, '')), ", column));
        qb.push_bind(term.to_string());
        qb.push(") > 0");
    }
    qb.push(")");
}

/// PostgreSQL 存储
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DatabasePool,
    patients: PgPatients,
    consultations: PgConsultations,
    clinicians: PgClinicians,
    care_events: PgCareEvents,
}

impl PgStore {
    pub fn new(pool: DatabasePool) -> Self {
        let pg = pool.pool().clone();
        Self {
            patients: PgPatients { pool: pg.clone() },
            consultations: PgConsultations { pool: pg.clone() },
            clinicians: PgClinicians { pool: pg.clone() },
            care_events: PgCareEvents { pool: pg },
            pool,
        }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建患者表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                unique_number VARCHAR(32) UNIQUE NOT NULL,
                first_name VARCHAR(100) NOT NULL,
                last_name VARCHAR(100) NOT NULL,
                cin VARCHAR(16) NOT NULL,
                address TEXT NOT NULL,
                age SMALLINT NOT NULL,
                sex CHAR(1) NOT NULL,
                phone VARCHAR(32),
                email VARCHAR(255),
                birth_date DATE,
                medical_history TEXT,
                referred_to_generalist BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 创建会诊表，seq 记录账本顺序
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS consultations (
                seq BIGSERIAL UNIQUE,
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                care_event_id UUID NOT NULL,
                clinician_id UUID NOT NULL,
                kind VARCHAR(16) NOT NULL,
                specialty VARCHAR(32),
                status VARCHAR(16) NOT NULL,
                orientation_specialties TEXT[] NOT NULL DEFAULT '{}',
                orientation_clinician_id UUID,
                out_of_network BOOLEAN NOT NULL DEFAULT FALSE,
                notes TEXT,
                diagnosis TEXT,
                orientation_comment TEXT,
                scanner_performed BOOLEAN NOT NULL DEFAULT FALSE,
                hospital_referral BOOLEAN NOT NULL DEFAULT FALSE,
                follow_up_required BOOLEAN NOT NULL DEFAULT FALSE,
                appointment_date DATE,
                next_appointment_date DATE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 创建医务人员表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clinicians (
                id UUID PRIMARY KEY,
                username VARCHAR(64) NOT NULL,
                first_name VARCHAR(100) NOT NULL,
                last_name VARCHAR(100) NOT NULL,
                email VARCHAR(255),
                role VARCHAR(16) NOT NULL,
                specialty VARCHAR(32),
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 创建大篷车活动表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS care_events (
                id UUID PRIMARY KEY,
                unique_number VARCHAR(32) UNIQUE NOT NULL,
                name VARCHAR(255) NOT NULL,
                date DATE NOT NULL,
                location TEXT NOT NULL,
                covered_specialties TEXT[] NOT NULL DEFAULT '{}',
                status VARCHAR(16) NOT NULL,
                roster UUID[] NOT NULL DEFAULT '{}',
                enrolled_patients UUID[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_patients_cin_normalized ON patients (upper(trim(cin)))",
            "CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_patient_id ON consultations(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_clinician_id ON consultations(clinician_id)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_care_event_id ON consultations(care_event_id)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_status ON consultations(status)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_clinicians_username ON clinicians (lower(username))",
            "CREATE INDEX IF NOT EXISTS idx_clinicians_role ON clinicians(role)",
            "CREATE INDEX IF NOT EXISTS idx_care_events_date ON care_events(date)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
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
        let mut tx = self.pool.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let patients = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients ORDER BY created_at DESC, id",
        )
        .fetch_all(&mut *tx)
        .await?;
        let consultations =
            sqlx::query_as::<_, DbConsultation>("SELECT * FROM consultations ORDER BY seq DESC")
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(Snapshot {
            patients: convert_all(patients)?,
            consultations: convert_all(consultations)?,
        })
    }
}

// ========== 患者相关操作 ==========

fn bind_patient<'q>(query: PgQuery<'q>, p: &Patient) -> PgQuery<'q> {
    query
        .bind(p.id)
        .bind(p.unique_number.clone())
        .bind(p.first_name.clone())
        .bind(p.last_name.clone())
        .bind(p.cin.clone())
        .bind(p.address.clone())
        .bind(i16::from(p.age))
        .bind(p.sex.as_str())
        .bind(p.phone.clone())
        .bind(p.email.clone())
        .bind(p.birth_date)
        .bind(p.medical_history.clone())
        .bind(p.referred_to_generalist)
        .bind(p.created_at)
        .bind(p.updated_at)
}

fn push_patient_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PatientFilter) {
    qb.push(" WHERE TRUE");
    if let Some(ids) = &filter.ids {
        qb.push(" AND id = ANY(");
        qb.push_bind(ids.clone());
        qb.push(")");
    }
    if let Some(excluded) = &filter.exclude_ids {
        qb.push(" AND NOT (id = ANY(");
        qb.push_bind(excluded.clone());
        qb.push("))");
    }
    if let Some(flag) = filter.referred_to_generalist {
        qb.push(" AND referred_to_generalist = ");
        qb.push_bind(flag);
    }
    if let Some(term) = lowered_term(filter.search.as_deref()) {
        push_search(qb, &["last_name", "first_name", "cin", "unique_number"], &term);
    }
}

#[derive(Debug, Clone)]
pub struct PgPatients {
    pool: PgPool,
}

impl PgPatients {
    fn duplicate_cin(err: sqlx::Error, cin: &str) -> CaravaneError {
        if is_unique_violation_on(&err, PATIENT_CIN_INDEX) {
            CaravaneError::DuplicateIdentifier(format!(
                "a patient with CIN {} already exists",
                cin.trim()
            ))
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl PatientRepository for PgPatients {
    async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM patients");
        push_patient_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let (limit, offset) = page_bounds(page);
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM patients");
        push_patient_filter(&mut select, filter);
        select.push(" ORDER BY created_at DESC, id LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);
        let rows = select
            .build_query_as::<DbPatient>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(convert_all(rows)?, total.max(0) as usize, page))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Patient::try_from).transpose()
    }

    async fn create(&self, data: NewPatient) -> Result<Patient> {
        let patient = Patient::new(data);
        bind_patient(
            sqlx::query(
                r#"
                INSERT INTO patients (id, unique_number, first_name, last_name, cin, address, age, sex,
                    phone, email, birth_date, medical_history, referred_to_generalist, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            ),
            &patient,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Self::duplicate_cin(e, &patient.cin))?;

        tracing::info!("Created patient {} ({})", patient.id, patient.unique_number);
        Ok(patient)
    }

    async fn update(&self, id: Uuid, patch: PatientPatch) -> Result<Option<Patient>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut patient = Patient::try_from(row)?;
        patient.apply(patch);
        bind_patient(
            sqlx::query(
                r#"
                UPDATE patients SET unique_number = $2, first_name = $3, last_name = $4, cin = $5,
                    address = $6, age = $7, sex = $8, phone = $9, email = $10, birth_date = $11,
                    medical_history = $12, referred_to_generalist = $13, created_at = $14, updated_at = $15
                WHERE id = $1
            "#,
            ),
            &patient,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::duplicate_cin(e, &patient.cin))?;
        tx.commit().await?;

        tracing::info!("Updated patient {}", id);
        Ok(Some(patient))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let consultations = sqlx::query("DELETE FROM consultations WHERE patient_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if deleted > 0 {
            tracing::info!("Deleted patient {} and {} consultation(s)", id, consultations);
        }
        Ok(deleted > 0)
    }
}

// ========== 会诊相关操作 ==========

fn bind_consultation<'q>(query: PgQuery<'q>, c: &Consultation) -> PgQuery<'q> {
    query
        .bind(c.id)
        .bind(c.patient_id)
        .bind(c.care_event_id)
        .bind(c.clinician_id)
        .bind(c.kind.as_str())
        .bind(c.specialty.map(|s| s.as_str()))
        .bind(c.status.as_str())
        .bind(specialty_codes(&c.orientation_specialties))
        .bind(c.orientation_clinician_id)
        .bind(c.out_of_network)
        .bind(c.notes.clone())
        .bind(c.diagnosis.clone())
        .bind(c.orientation_comment.clone())
        .bind(c.scanner_performed)
        .bind(c.hospital_referral)
        .bind(c.follow_up_required)
        .bind(c.appointment_date)
        .bind(c.next_appointment_date)
        .bind(c.created_at)
        .bind(c.updated_at)
}

fn push_consultation_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ConsultationFilter) {
    qb.push(" WHERE TRUE");
    if let Some(patient_id) = filter.patient_id {
        qb.push(" AND patient_id = ");
        qb.push_bind(patient_id);
    }
    if let Some(ids) = &filter.patient_ids {
        qb.push(" AND patient_id = ANY(");
        qb.push_bind(ids.clone());
        qb.push(")");
    }
    if let Some(clinician_id) = filter.clinician_id {
        qb.push(" AND clinician_id = ");
        qb.push_bind(clinician_id);
    }
    if let Some(care_event_id) = filter.care_event_id {
        qb.push(" AND care_event_id = ");
        qb.push_bind(care_event_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status.as_str());
    }
    if filter.has_orientation_target {
        qb.push(
            " AND (cardinality(orientation_specialties) > 0 OR orientation_clinician_id IS NOT NULL)",
        );
    }
    if let Some(flag) = filter.out_of_network {
        qb.push(" AND out_of_network = ");
        qb.push_bind(flag);
    }
    if let Some(term) = lowered_term(filter.search.as_deref()) {
        push_search(
            qb,
            &["id::text", "notes", "diagnosis", "orientation_comment"],
            &term,
        );
    }
}

#[derive(Debug, Clone)]
pub struct PgConsultations {
    pool: PgPool,
}

#[async_trait]
impl ConsultationRepository for PgConsultations {
    async fn list(
        &self,
        filter: &ConsultationFilter,
        page: PageRequest,
    ) -> Result<Page<Consultation>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM consultations");
        push_consultation_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let (limit, offset) = page_bounds(page);
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM consultations");
        push_consultation_filter(&mut select, filter);
        select.push(" ORDER BY seq DESC LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);
        let rows = select
            .build_query_as::<DbConsultation>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(convert_all(rows)?, total.max(0) as usize, page))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Consultation>> {
        let row = sqlx::query_as::<_, DbConsultation>("SELECT * FROM consultations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Consultation::try_from).transpose()
    }

    async fn create(&self, consultation: Consultation) -> Result<Consultation> {
        bind_consultation(
            sqlx::query(
                r#"
                INSERT INTO consultations (id, patient_id, care_event_id, clinician_id, kind, specialty,
                    status, orientation_specialties, orientation_clinician_id, out_of_network, notes,
                    diagnosis, orientation_comment, scanner_performed, hospital_referral,
                    follow_up_required, appointment_date, next_appointment_date, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20)
            "#,
            ),
            &consultation,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_violation(&e, FOREIGN_KEY_VIOLATION) {
                CaravaneError::invalid(
                    "patient_id",
                    format!("unknown patient {}", consultation.patient_id),
                )
            } else {
                e.into()
            }
        })?;

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
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DbConsultation>(
            "SELECT * FROM consultations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut consultation = Consultation::try_from(row)?;
        // 修改失败时事务随 tx 丢弃而回滚
        mutation(&mut consultation)?;

        bind_consultation(
            sqlx::query(
                r#"
                UPDATE consultations SET patient_id = $2, care_event_id = $3, clinician_id = $4,
                    kind = $5, specialty = $6, status = $7, orientation_specialties = $8,
                    orientation_clinician_id = $9, out_of_network = $10, notes = $11, diagnosis = $12,
                    orientation_comment = $13, scanner_performed = $14, hospital_referral = $15,
                    follow_up_required = $16, appointment_date = $17, next_appointment_date = $18,
                    created_at = $19, updated_at = $20
                WHERE id = $1
            "#,
            ),
            &consultation,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("Updated consultation {}", id);
        Ok(Some(consultation))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM consultations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted > 0 {
            tracing::info!("Deleted consultation {}", id);
        }
        Ok(deleted > 0)
    }
}

// ========== 医务人员相关操作 ==========

fn bind_clinician<'q>(query: PgQuery<'q>, c: &Clinician) -> PgQuery<'q> {
    query
        .bind(c.id)
        .bind(c.username.clone())
        .bind(c.first_name.clone())
        .bind(c.last_name.clone())
        .bind(c.email.clone())
        .bind(c.role.as_str())
        .bind(c.specialty.map(|s| s.as_str()))
        .bind(c.active)
        .bind(c.created_at)
        .bind(c.updated_at)
}

fn push_clinician_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ClinicianFilter) {
    qb.push(" WHERE TRUE");
    if let Some(role) = filter.role {
        qb.push(" AND role = ");
        qb.push_bind(role.as_str());
    }
    if let Some(specialty) = filter.specialty {
        qb.push(" AND specialty = ");
        qb.push_bind(specialty.as_str());
    }
    if let Some(active) = filter.active {
        qb.push(" AND active = ");
        qb.push_bind(active);
    }
    if let Some(term) = lowered_term(filter.search.as_deref()) {
        push_search(qb, &["username", "first_name", "last_name"], &term);
    }
}

#[derive(Debug, Clone)]
pub struct PgClinicians {
    pool: PgPool,
}

impl PgClinicians {
    fn duplicate_username(err: sqlx::Error, username: &str) -> CaravaneError {
        if is_unique_violation_on(&err, CLINICIAN_USERNAME_INDEX) {
            CaravaneError::DuplicateIdentifier(format!("username {} is already taken", username))
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl ClinicianRepository for PgClinicians {
    async fn list(&self, filter: &ClinicianFilter, page: PageRequest) -> Result<Page<Clinician>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clinicians");
        push_clinician_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let (limit, offset) = page_bounds(page);
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM clinicians");
        push_clinician_filter(&mut select, filter);
        select.push(" ORDER BY created_at DESC, id LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);
        let rows = select
            .build_query_as::<DbClinician>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(convert_all(rows)?, total.max(0) as usize, page))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Clinician>> {
        let row = sqlx::query_as::<_, DbClinician>("SELECT * FROM clinicians WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Clinician::try_from).transpose()
    }

    async fn create(&self, data: NewClinician) -> Result<Clinician> {
        let clinician = Clinician::new(data);
        bind_clinician(
            sqlx::query(
                r#"
                INSERT INTO clinicians (id, username, first_name, last_name, email, role, specialty,
                    active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            ),
            &clinician,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Self::duplicate_username(e, &clinician.username))?;

        tracing::info!("Created clinician {} ({})", clinician.id, clinician.role);
        Ok(clinician)
    }

    async fn update(&self, id: Uuid, patch: ClinicianPatch) -> Result<Option<Clinician>> {
        let mut tx = self.pool.begin().await?;
        // 降级管理员时同样锁住全部管理员行
        let admins: Vec<Uuid> = if patch.role.is_some_and(|role| role != Role::Admin) {
            sqlx::query_scalar("SELECT id FROM clinicians WHERE role = 'admin' FOR UPDATE")
                .fetch_all(&mut *tx)
                .await?
        } else {
            Vec::new()
        };
        let row =
            sqlx::query_as::<_, DbClinician>("SELECT * FROM clinicians WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut clinician = Clinician::try_from(row)?;
        if patch.revokes_admin(&clinician) && admins.len() <= 1 {
            return Err(CaravaneError::invalid(
                "role",
                "cannot demote the last administrator",
            ));
        }
        clinician.apply(patch);
        bind_clinician(
            sqlx::query(
                r#"
                UPDATE clinicians SET username = $2, first_name = $3, last_name = $4, email = $5,
                    role = $6, specialty = $7, active = $8, created_at = $9, updated_at = $10
                WHERE id = $1
            "#,
            ),
            &clinician,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::duplicate_username(e, &clinician.username))?;
        tx.commit().await?;

        Ok(Some(clinician))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        // 锁住全部管理员行，避免并发删除最后两名管理员
        let admins: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM clinicians WHERE role = 'admin' FOR UPDATE")
                .fetch_all(&mut *tx)
                .await?;
        if admins.contains(&id) && admins.len() <= 1 {
            return Err(CaravaneError::invalid(
                "id",
                "cannot delete the last administrator",
            ));
        }

        let deleted = sqlx::query("DELETE FROM clinicians WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if deleted > 0 {
            tracing::info!("Deleted clinician {}", id);
        }
        Ok(deleted > 0)
    }
}

// ========== 大篷车相关操作 ==========

fn bind_care_event<'q>(query: PgQuery<'q>, e: &CareEvent) -> PgQuery<'q> {
    query
        .bind(e.id)
        .bind(e.unique_number.clone())
        .bind(e.name.clone())
        .bind(e.date)
        .bind(e.location.clone())
        .bind(specialty_codes(&e.covered_specialties))
        .bind(e.status.as_str())
        .bind(e.roster.clone())
        .bind(e.enrolled_patients.clone())
        .bind(e.created_at)
        .bind(e.updated_at)
}

fn push_care_event_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CareEventFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(term) = lowered_term(filter.search.as_deref()) {
        push_search(qb, &["name", "location", "unique_number"], &term);
    }
}

#[derive(Debug, Clone)]
pub struct PgCareEvents {
    pool: PgPool,
}

#[async_trait]
impl CareEventRepository for PgCareEvents {
    async fn list(&self, filter: &CareEventFilter, page: PageRequest) -> Result<Page<CareEvent>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM care_events");
        push_care_event_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let (limit, offset) = page_bounds(page);
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM care_events");
        push_care_event_filter(&mut select, filter);
        select.push(" ORDER BY date DESC, id LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);
        let rows = select
            .build_query_as::<DbCareEvent>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(convert_all(rows)?, total.max(0) as usize, page))
    }

    async fn get(&self, id: Uuid) -> Result<Option<CareEvent>> {
        let row = sqlx::query_as::<_, DbCareEvent>("SELECT * FROM care_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CareEvent::try_from).transpose()
    }

    async fn create(&self, data: NewCareEvent) -> Result<CareEvent> {
        let event = CareEvent::new(data);
        bind_care_event(
            sqlx::query(
                r#"
                INSERT INTO care_events (id, unique_number, name, date, location, covered_specialties,
                    status, roster, enrolled_patients, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            ),
            &event,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Created care event {} ({})", event.id, event.name);
        Ok(event)
    }

    async fn update(&self, id: Uuid, patch: CareEventPatch) -> Result<Option<CareEvent>> {
        let mut tx = self.pool.begin().await?;
        let row =
            sqlx::query_as::<_, DbCareEvent>("SELECT * FROM care_events WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut event = CareEvent::try_from(row)?;
        event.apply(patch);
        bind_care_event(
            sqlx::query(
                r#"
                UPDATE care_events SET unique_number = $2, name = $3, date = $4, location = $5,
                    covered_specialties = $6, status = $7, roster = $8, enrolled_patients = $9,
                    created_at = $10, updated_at = $11
                WHERE id = $1
            "#,
            ),
            &event,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(event))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM care_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

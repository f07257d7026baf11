//! 演示数据

use crate::engine::WorkflowEngine;
use caravane_core::{
    Actor, CareEvent, CareEventStatus, Clinician, NewCareEvent, NewClinician, Result, Role,
    Specialty,
};
use chrono::Utc;

/// 演示用人员与活动
#[derive(Debug, Clone)]
pub struct DemoData {
    pub care_event: CareEvent,
    pub intake: Clinician,
    pub generalist: Clinician,
    pub neurologist: Clinician,
    pub psychiatrist: Clinician,
}

impl DemoData {
    pub fn actor(clinician: &Clinician) -> Actor {
        Actor {
            id: clinician.id,
            role: clinician.role,
            specialty: clinician.specialty,
        }
    }
}

fn clinician(
    username: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
    specialty: Option<Specialty>,
) -> NewClinician {
    NewClinician {
        username: username.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: Some(format!("{}@caravane.local", username)),
        role,
        specialty,
        active: true,
    }
}

/// 每个角色一名医务人员，外加一次进行中的大篷车活动
pub async fn seed_demo(engine: &WorkflowEngine, admin: &Actor) -> Result<DemoData> {
    let intake = engine
        .create_clinician(admin, clinician("accueil", "Salma", "Idrissi", Role::Intake, None))
        .await?;
    let generalist = engine
        .create_clinician(admin, clinician("dr.benali", "Omar", "Benali", Role::Generalist, None))
        .await?;
    let neurologist = engine
        .create_clinician(
            admin,
            clinician("dr.tazi", "Nadia", "Tazi", Role::Specialist, Some(Specialty::Neurology)),
        )
        .await?;
    let psychiatrist = engine
        .create_clinician(
            admin,
            clinician("dr.fassi", "Karim", "Fassi", Role::Specialist, Some(Specialty::Psychiatry)),
        )
        .await?;

    let care_event = engine
        .create_care_event(
            admin,
            NewCareEvent {
                name: "Caravane du Haut Atlas".to_string(),
                date: Utc::now().date_naive(),
                location: "Imilchil".to_string(),
                covered_specialties: Specialty::all().iter().copied().collect(),
                status: CareEventStatus::Ongoing,
                roster: vec![intake.id, generalist.id, neurologist.id, psychiatrist.id],
                enrolled_patients: Vec::new(),
            },
        )
        .await?;

    tracing::info!(
        "Seeded demo data: care event {} with {} clinicians",
        care_event.unique_number,
        care_event.roster.len()
    );

    Ok(DemoData {
        care_event,
        intake,
        generalist,
        neurologist,
        psychiatrist,
    })
}

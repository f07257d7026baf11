//! 转诊流程演示
//!
//! 运行: cargo run --example referral_demo

use caravane::core::{
    Actor, ConsultationKind, NewConsultation, NewPatient, PageRequest, Role, Sex, Specialty,
};
use caravane::database::MemoryStore;
use caravane::workflow::{seed_demo, DemoData, OrientationPatch, WorkflowEngine};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let engine = WorkflowEngine::new(Arc::new(MemoryStore::new()));
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let demo = seed_demo(&engine, &admin).await?;

    let intake = DemoData::actor(&demo.intake);
    let generalist = DemoData::actor(&demo.generalist);
    let neurologist = DemoData::actor(&demo.neurologist);
    let psychiatrist = DemoData::actor(&demo.psychiatrist);

    // 接待登记并转介全科
    let patient = engine
        .create_patient(
            &intake,
            NewPatient {
                first_name: "Aicha".to_string(),
                last_name: "Ouali".to_string(),
                cin: "PA908172".to_string(),
                address: "Ksar Tinejdad".to_string(),
                age: 41,
                sex: Sex::Female,
                phone: Some("06 61 22 33 44".to_string()),
                email: None,
                birth_date: None,
                medical_history: Some("Céphalées depuis 2 ans".to_string()),
                referred_to_generalist: false,
            },
        )
        .await?;
    println!("Registered {} ({})", patient.full_name(), patient.unique_number);

    engine.refer_to_generalist(&intake, patient.id).await?;
    let queue = engine
        .generalist_queue(&generalist, None, PageRequest::default())
        .await?;
    println!("Generalist queue: {} patient(s)", queue.total);

    // 全科初诊，转诊神经科
    let mut data = NewConsultation::new(
        patient.id,
        demo.care_event.id,
        generalist.id,
        ConsultationKind::General,
    );
    data.notes = Some("Céphalées chroniques, examen neurologique à compléter".to_string());
    let consultation = engine.create_consultation(&generalist, data).await?;

    let consultation = engine
        .update_orientation(
            &generalist,
            consultation.id,
            OrientationPatch::specialties([Specialty::Neurology]).with_clinician(neurologist.id),
        )
        .await?;
    println!(
        "Consultation {} is {} and oriented to {:?}",
        consultation.id, consultation.status, consultation.orientation_specialties
    );

    for (name, actor) in [("neurologist", &neurologist), ("psychiatrist", &psychiatrist)] {
        let queue = engine
            .specialist_queue(actor, None, PageRequest::default())
            .await?;
        println!("{} queue: {} patient(s)", name, queue.total);
    }

    let dashboard = engine.dashboard(&admin).await?;
    println!("{}", serde_json::to_string_pretty(&dashboard)?);

    Ok(())
}

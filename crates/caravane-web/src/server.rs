//! Web服务器

use crate::handlers::{self, api_root, health};
use axum::{
    routing::{get, post, put},
    Router,
};
use caravane_workflow::WorkflowEngine;
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: WorkflowEngine,
    pub default_page_size: usize,
}

impl AppState {
    pub fn new(engine: WorkflowEngine, default_page_size: usize) -> Self {
        Self {
            engine,
            default_page_size,
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, request_timeout: Duration, enable_cors: bool) -> Self {
        let mut app = create_app(state).layer(TimeoutLayer::new(request_timeout));
        if enable_cors {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        Self { addr, app }
    }

    /// 运行直到收到 Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown signal received");
                }
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run web server: {}", e))?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 构建路由
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_root))
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route(
            "/patients/:id",
            get(handlers::get_patient)
                .put(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .route("/patients/:id/refer", post(handlers::refer_patient))
        .route(
            "/consultations",
            get(handlers::list_consultations).post(handlers::create_consultation),
        )
        .route(
            "/consultations/:id",
            get(handlers::get_consultation)
                .put(handlers::update_consultation)
                .delete(handlers::delete_consultation),
        )
        .route(
            "/consultations/:id/orientation",
            put(handlers::update_orientation),
        )
        .route("/queues/intake", get(handlers::intake_queue))
        .route("/queues/generalist", get(handlers::generalist_queue))
        .route("/queues/specialist", get(handlers::specialist_queue))
        .route("/queues/referred-out", get(handlers::referred_out))
        .route("/queues/out-of-network", get(handlers::out_of_network))
        .route("/workload", get(handlers::specialist_workload))
        .route("/dashboard", get(handlers::dashboard))
        .route(
            "/clinicians",
            get(handlers::list_clinicians).post(handlers::create_clinician),
        )
        .route(
            "/clinicians/:id",
            get(handlers::get_clinician)
                .put(handlers::update_clinician)
                .delete(handlers::delete_clinician),
        )
        .route(
            "/care-events",
            get(handlers::list_care_events).post(handlers::create_care_event),
        )
        .route(
            "/care-events/:id",
            get(handlers::get_care_event)
                .put(handlers::update_care_event)
                .delete(handlers::delete_care_event),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ACTOR_SPECIALTY_HEADER};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use caravane_database::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Caller {
        id: Uuid,
        role: &'static str,
        specialty: Option<&'static str>,
    }

    fn app() -> Router {
        let engine = WorkflowEngine::new(Arc::new(MemoryStore::new()));
        create_app(AppState::new(engine, 20))
    }

    async fn call(
        app: &Router,
        caller: Option<&Caller>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            request = request
                .header(ACTOR_ID_HEADER, caller.id.to_string())
                .header(ACTOR_ROLE_HEADER, caller.role);
            if let Some(specialty) = caller.specialty {
                request = request.header(ACTOR_SPECIALTY_HEADER, specialty);
            }
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(
        app: &Router,
        admin: &Caller,
        username: &str,
        role: &'static str,
        specialty: Option<&'static str>,
    ) -> Caller {
        let (status, body) = call(
            app,
            Some(admin),
            Method::POST,
            "/api/v1/clinicians",
            Some(json!({
                "username": username,
                "first_name": username,
                "last_name": "Caravane",
                "role": role,
                "specialty": specialty,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        Caller {
            id: body["id"].as_str().unwrap().parse().unwrap(),
            role,
            specialty,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = call(&app, None, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let app = app();
        let (status, body) = call(&app, None, Method::GET, "/api/v1/patients", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_referral_flow_over_http() {
        let app = app();
        let admin = Caller {
            id: Uuid::new_v4(),
            role: "admin",
            specialty: None,
        };
        let intake = register(&app, &admin, "accueil", "intake", None).await;
        let gp = register(&app, &admin, "gp", "generalist", None).await;
        let neuro = register(&app, &admin, "neuro", "specialist", Some("neurology")).await;

        let today = chrono::Utc::now().date_naive().to_string();
        let (status, event) = call(
            &app,
            Some(&admin),
            Method::POST,
            "/api/v1/care-events",
            Some(json!({
                "name": "Caravane Tinghir",
                "date": today,
                "location": "Tinghir",
                "covered_specialties": ["neurology", "psychiatry"],
                "status": "ongoing",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", event);

        let patient_body = json!({
            "first_name": "Youssef",
            "last_name": "Amrani",
            "cin": "JB45123",
            "address": "Douar Ait Ali",
            "age": 52,
            "sex": "M",
        });
        let (status, patient) = call(
            &app,
            Some(&intake),
            Method::POST,
            "/api/v1/patients",
            Some(patient_body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", patient);
        let patient_id = patient["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Some(&intake), Method::POST, "/api/v1/patients", Some(patient_body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            Some(&intake),
            Method::POST,
            &format!("/api/v1/patients/{}/refer", patient_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, queue) = call(&app, Some(&gp), Method::GET, "/api/v1/queues/generalist", None).await;
        assert_eq!(queue["total"], 1);

        let (status, consultation) = call(
            &app,
            Some(&gp),
            Method::POST,
            "/api/v1/consultations",
            Some(json!({
                "patient_id": patient_id,
                "care_event_id": event["id"],
                "kind": "general",
                "notes": "Tremblements du membre supérieur droit",
                "orientation_specialties": ["neurology"],
                "orientation_clinician_id": neuro.id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", consultation);
        assert_eq!(consultation["status"], "completed");

        let (_, queue) = call(&app, Some(&gp), Method::GET, "/api/v1/queues/generalist", None).await;
        assert_eq!(queue["total"], 0);
        let (_, queue) = call(&app, Some(&neuro), Method::GET, "/api/v1/queues/specialist", None).await;
        assert_eq!(queue["items"][0]["id"], patient["id"]);

        // 状态不可回退
        let (status, body) = call(
            &app,
            Some(&gp),
            Method::PUT,
            &format!("/api/v1/consultations/{}", consultation["id"].as_str().unwrap()),
            Some(json!({ "status": "awaiting" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "illegal_transition");

        let (status, _) = call(&app, Some(&gp), Method::GET, "/api/v1/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_and_permission_errors() {
        let app = app();
        let intake = Caller {
            id: Uuid::new_v4(),
            role: "intake",
            specialty: None,
        };

        let (status, body) = call(
            &app,
            Some(&intake),
            Method::POST,
            "/api/v1/patients",
            Some(json!({
                "first_name": "",
                "last_name": "Amrani",
                "cin": "123",
                "address": "Douar",
                "age": 0,
                "sex": "F",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["first_name"].is_string());
        assert!(body["fields"]["cin"].is_string());
        assert!(body["fields"]["age"].is_string());

        let (status, body) = call(
            &app,
            Some(&intake),
            Method::DELETE,
            &format!("/api/v1/patients/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "permission_denied");
    }

    #[tokio::test]
    async fn test_specialist_requires_specialty_header() {
        let app = app();
        let caller = Caller {
            id: Uuid::new_v4(),
            role: "specialist",
            specialty: None,
        };
        let (status, _) = call(&app, Some(&caller), Method::GET, "/api/v1/queues/specialist", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

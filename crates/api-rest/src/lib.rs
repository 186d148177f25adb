//! # API REST
//!
//! REST API implementation for the clinic ledger.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON, status codes, API key header, CORS)
//!
//! Uses `api-shared` for request/response bodies and `clinic-core` for the ledger itself.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::dto::{
    ActionLineRes, ActionRefReq, CreateMedicalRecordReq, CurrentActionRes, CurrentMedicineRes,
    HealthRes, ListMedicalRecordsRes, MedicalRecordRes, MedicineLineRes, MedicineOrderReq,
};
use api_shared::{ApiKey, HealthService, API_KEY_HEADER};
use clinic_core::{ClinicError, MedicalRecordService};

type ApiError = (StatusCode, &'static str);

/// Application state for the REST API server
///
/// Shared by all request handlers: the ledger service and the API key callers must present.
#[derive(Clone)]
pub struct AppState {
    pub medical_records: MedicalRecordService,
    pub api_key: Arc<ApiKey>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_medical_records,
        create_medical_record,
        get_medical_record,
        mark_medical_record_paid,
    ),
    components(schemas(
        HealthRes,
        CreateMedicalRecordReq,
        MedicineOrderReq,
        ActionRefReq,
        MedicalRecordRes,
        MedicineLineRes,
        ActionLineRes,
        CurrentMedicineRes,
        CurrentActionRes,
        ListMedicalRecordsRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router.
///
/// `/health` and the Swagger UI are open; every `/medical-records` route requires the
/// `x-api-key` header.
pub fn router(state: AppState) -> Router {
    let medical_records = Router::new()
        .route(
            "/medical-records",
            get(list_medical_records).post(create_medical_record),
        )
        .route("/medical-records/:id", get(get_medical_record))
        .route("/medical-records/:id/payment", put(mark_medical_record_paid))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(medical_records)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = state.api_key.verify(provided) {
        tracing::warn!("rejected {} {}: {}", req.method(), req.uri().path(), e);
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    Ok(next.run(req).await)
}

/// Maps a core error to a response, logging the cause.
fn error_response(operation: &str, e: ClinicError) -> ApiError {
    match e {
        ClinicError::InvalidInput(_) | ClinicError::AmountOverflow => {
            tracing::warn!("{} rejected: {}", operation, e);
            (StatusCode::BAD_REQUEST, "Invalid request")
        }
        ClinicError::NotFound { .. } | ClinicError::NoneFound(_) => {
            tracing::warn!("{} rejected: {}", operation, e);
            (StatusCode::NOT_FOUND, "Not found")
        }
        ClinicError::InsufficientStock { .. } => {
            tracing::warn!("{} rejected: {}", operation, e);
            (StatusCode::CONFLICT, "Insufficient stock")
        }
        ClinicError::AlreadyPaid(_) => {
            tracing::warn!("{} rejected: {}", operation, e);
            (StatusCode::CONFLICT, "Medical record is already paid")
        }
        other => {
            tracing::error!("{} error: {:?}", operation, other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn parse_record_id(id: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(id).map_err(|e| {
        tracing::warn!("Invalid medical record id {:?}: {}", id, e);
        (StatusCode::BAD_REQUEST, "Invalid medical record id")
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Does not require an API key.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/medical-records",
    responses(
        (status = 200, description = "All medical records", body = ListMedicalRecordsRes),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "No medical records exist"),
        (status = 500, description = "Internal server error")
    )
)]
/// List all medical records
///
/// Each line item carries the snapshot taken at billing time and, under `current`, the live
/// catalog values.
#[axum::debug_handler]
async fn list_medical_records(
    State(state): State<AppState>,
) -> Result<Json<ListMedicalRecordsRes>, ApiError> {
    let records = state
        .medical_records
        .list()
        .await
        .map_err(|e| error_response("List medical records", e))?;

    Ok(Json(ListMedicalRecordsRes {
        medical_records: records.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/medical-records",
    request_body = CreateMedicalRecordReq,
    responses(
        (status = 201, description = "Medical record created", body = MedicalRecordRes),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Unknown medicine or action"),
        (status = 409, description = "Insufficient stock for a paid record"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a medical record
///
/// Prices are snapshotted from the catalog, totals are computed, and if `payment_status` is
/// true the medicines are dispensed from stock. Either the whole record is stored or nothing.
///
/// # Errors
/// Returns `400` for a blank diagnosis or non-positive quantity, `404` for unknown catalog
/// items, `409` when a paid record cannot be covered by stock, and `500` otherwise.
#[axum::debug_handler]
async fn create_medical_record(
    State(state): State<AppState>,
    Json(req): Json<CreateMedicalRecordReq>,
) -> Result<(StatusCode, Json<MedicalRecordRes>), ApiError> {
    let new_record = req
        .into_new_record()
        .map_err(|e| error_response("Create medical record", e))?;

    let record = state
        .medical_records
        .create(new_record)
        .await
        .map_err(|e| error_response("Create medical record", e))?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    get,
    path = "/medical-records/{id}",
    params(("id" = String, Path, description = "Medical record id")),
    responses(
        (status = 200, description = "Medical record", body = MedicalRecordRes),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Medical record not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_medical_record(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<MedicalRecordRes>, ApiError> {
    let id = parse_record_id(&id)?;

    let record = state
        .medical_records
        .get(id)
        .await
        .map_err(|e| error_response("Get medical record", e))?;

    Ok(Json(record.into()))
}

#[utoipa::path(
    put,
    path = "/medical-records/{id}/payment",
    params(("id" = String, Path, description = "Medical record id")),
    responses(
        (status = 200, description = "Medical record marked as paid", body = MedicalRecordRes),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Medical record not found"),
        (status = 409, description = "Already paid, or insufficient stock"),
        (status = 500, description = "Internal server error")
    )
)]
/// Mark a medical record as paid
///
/// Dispenses every medicine line from stock. If any line cannot be covered, nothing changes.
#[axum::debug_handler]
async fn mark_medical_record_paid(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<MedicalRecordRes>, ApiError> {
    let id = parse_record_id(&id)?;

    let record = state
        .medical_records
        .mark_paid(id)
        .await
        .map_err(|e| error_response("Mark medical record paid", e))?;

    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request as HttpRequest};
    use clinic_core::{
        db, CatalogService, CoreConfig, NewAction, NewMedicine, NonEmptyText,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const KEY: &str = "test-key";

    struct TestApp {
        app: Router,
        catalog: CatalogService,
    }

    async fn test_app() -> TestApp {
        let cfg = Arc::new(
            CoreConfig::new(
                NonEmptyText::new("sqlite::memory:").unwrap(),
                Duration::from_secs(5),
            )
            .expect("CoreConfig::new should succeed"),
        );
        let pool = db::connect(&cfg).await.expect("pool should open");
        db::migrate(&pool).await.expect("migrations should apply");

        let state = AppState {
            medical_records: MedicalRecordService::new(cfg, pool.clone()),
            api_key: Arc::new(ApiKey::from_env_value(Some(KEY.into())).unwrap()),
        };

        TestApp {
            app: router(state),
            catalog: CatalogService::new(pool),
        }
    }

    impl TestApp {
        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = HttpRequest::builder()
                .method(method)
                .uri(uri)
                .header(API_KEY_HEADER, KEY);
            let body = match body {
                Some(v) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .app
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn medicine(&self, price: i64, stock: i64) -> Uuid {
            self.catalog
                .add_medicine(NewMedicine {
                    name: NonEmptyText::new("M1").unwrap(),
                    price,
                    stock,
                })
                .await
                .unwrap()
                .id
        }

        async fn action(&self, price: i64) -> Uuid {
            self.catalog
                .add_action(NewAction {
                    name: NonEmptyText::new("A1").unwrap(),
                    price,
                    description: None,
                })
                .await
                .unwrap()
                .id
        }
    }

    #[tokio::test]
    async fn health_is_open() {
        let t = test_app().await;
        let response = t
            .app
            .clone()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn medical_records_require_api_key() {
        let t = test_app().await;

        let missing = t
            .app
            .clone()
            .oneshot(HttpRequest::get("/medical-records").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = t
            .app
            .clone()
            .oneshot(
                HttpRequest::get("/medical-records")
                    .header(API_KEY_HEADER, "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_then_read_back_flu_visit() {
        let t = test_app().await;
        let m1 = t.medicine(1_500, 10).await;
        let a1 = t.action(5_000).await;

        let (status, created) = t
            .send(
                Method::POST,
                "/medical-records",
                Some(json!({
                    "booking_id": Uuid::new_v4(),
                    "diagnosis_result": "flu",
                    "payment_status": true,
                    "medicines": [{ "medicine_id": m1, "quantity": 2 }],
                    "actions": [{ "action_id": a1 }],
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["total_medicine_amount"], 3_000);
        assert_eq!(created["total_action_amount"], 5_000);
        assert_eq!(created["total_amount"], 8_000);
        assert_eq!(created["medicine_details"][0]["stock_after"], 8);
        assert!(created["medicine_details"][0].get("current").is_none());

        let id = created["id"].as_str().unwrap().to_owned();
        let (status, fetched) = t
            .send(Method::GET, &format!("/medical-records/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["total_amount"], 8_000);
        assert_eq!(fetched["medicine_details"][0]["current"]["stock"], 8);

        let (status, list) = t.send(Method::GET, "/medical-records", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["medical_records"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn error_kinds_map_to_status_codes() {
        let t = test_app().await;
        let m1 = t.medicine(100, 1).await;

        let (status, _) = t.send(Method::GET, "/medical-records", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "empty list");

        let (status, _) = t.send(Method::GET, "/medical-records/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = t
            .send(
                Method::GET,
                &format!("/medical-records/{}", Uuid::new_v4()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let body = |quantity: i64, paid: bool, medicine: Uuid| {
            json!({
                "booking_id": Uuid::new_v4(),
                "diagnosis_result": "cough",
                "payment_status": paid,
                "medicines": [{ "medicine_id": medicine, "quantity": quantity }],
            })
        };

        let (status, _) = t
            .send(Method::POST, "/medical-records", Some(body(0, false, m1)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "zero quantity");

        let (status, _) = t
            .send(
                Method::POST,
                "/medical-records",
                Some(body(1, false, Uuid::new_v4())),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "unknown medicine");

        let (status, _) = t
            .send(Method::POST, "/medical-records", Some(body(5, true, m1)))
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "insufficient stock");
    }

    #[tokio::test]
    async fn payment_endpoint_settles_once() {
        let t = test_app().await;
        let m1 = t.medicine(1_500, 10).await;

        let (_, created) = t
            .send(
                Method::POST,
                "/medical-records",
                Some(json!({
                    "booking_id": Uuid::new_v4(),
                    "diagnosis_result": "flu",
                    "medicines": [{ "medicine_id": m1, "quantity": 3 }],
                })),
            )
            .await;
        let id = created["id"].as_str().unwrap().to_owned();
        assert_eq!(created["payment_status"], false);

        let (status, paid) = t
            .send(Method::PUT, &format!("/medical-records/{id}/payment"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(paid["payment_status"], true);
        assert_eq!(paid["medicine_details"][0]["stock_after"], 7);

        let (status, _) = t
            .send(Method::PUT, &format!("/medical-records/{id}/payment"), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}

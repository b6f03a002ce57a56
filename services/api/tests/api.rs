//! The HTTP surface driven through the router with stub ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use activity_planner_core::{
    ActivityProvider, Evaluation, GeneratedActivity, GenerationCause, GenerationRequest,
    KeyValidation, PdfTextExtractor, PortError, PortResult, ProcedurePhase, Provider,
    ProviderCoordinator,
};
use api_lib::adapters::InMemoryActivityStore;
use api_lib::config::Config;
use api_lib::web::{router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "----activity-form-boundary";

//=========================================================================================
// Stub ports
//=========================================================================================

/// Remembers every request it was asked to generate.
struct StubProvider {
    provider: Provider,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl StubProvider {
    fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityProvider for StubProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn validate_key(&self, api_key: &SecretString) -> KeyValidation {
        if api_key.expose_secret() == "good-key" {
            KeyValidation::valid()
        } else {
            KeyValidation::invalid("401 Unauthorized: invalid api key")
        }
    }

    async fn generate_activity(
        &self,
        _api_key: &SecretString,
        request: &GenerationRequest,
    ) -> PortResult<GeneratedActivity> {
        self.requests.lock().unwrap().push(request.clone());
        if request.patient_description.contains("vendor-down") {
            return Err(PortError::generation(
                self.provider,
                GenerationCause::transport(Some(500), "upstream exploded"),
            ));
        }
        Ok(GeneratedActivity {
            title: "Cazadores de sonidos".to_string(),
            smart_objective: "Producir /s/ en 8 de 10 intentos".to_string(),
            description: "Juego".to_string(),
            materials: vec!["Tarjetas".to_string()],
            procedure: vec![ProcedurePhase {
                name: "Juego".to_string(),
                time: request.duration,
                description: "Caza de sonidos".to_string(),
            }],
            evaluation: Evaluation::default(),
            adaptations: vec![],
            theoretical_foundation: "Ciclos".to_string(),
        })
    }
}

/// Treats the upload bytes as text; bodies starting with `corrupt` fail.
#[derive(Default)]
struct StubExtractor {
    calls: AtomicUsize,
}

#[async_trait]
impl PdfTextExtractor for StubExtractor {
    async fn extract_text(&self, data: &[u8]) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if data.starts_with(b"corrupt") {
            return Err(PortError::InvalidInput("failed to parse PDF".to_string()));
        }
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

struct TestApp {
    app: Router,
    gemini: Arc<StubProvider>,
    extractor: Arc<StubExtractor>,
}

fn test_app(demo_mode: bool) -> TestApp {
    let config = Config::from_vars(|_| None).unwrap();
    let gemini = StubProvider::new(Provider::Gemini);
    let coordinator = ProviderCoordinator::new(Duration::from_secs(5))
        .with_provider(gemini.clone())
        .with_provider(StubProvider::new(Provider::OpenAi))
        .with_provider(StubProvider::new(Provider::Groq))
        .with_disabled(Provider::Groq)
        .with_demo_mode(demo_mode);
    let extractor = Arc::new(StubExtractor::default());

    let state = Arc::new(AppState {
        config: Arc::new(config),
        coordinator: Arc::new(coordinator),
        activities: Arc::new(InMemoryActivityStore::new()),
        pdf_extractor: extractor.clone(),
    });
    TestApp {
        app: router(state),
        gemini,
        extractor,
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

struct Upload<'a> {
    file_name: &'a str,
    content_type: &'a str,
    data: &'a [u8],
}

fn pdf<'a>(file_name: &'a str, data: &'a [u8]) -> Upload<'a> {
    Upload {
        file_name,
        content_type: "application/pdf",
        data,
    }
}

fn form_fields(provider: &str) -> Vec<(&'static str, String)> {
    vec![
        ("aiProvider", provider.to_string()),
        ("apiKey", "caller-key".to_string()),
        ("patientAge", "7".to_string()),
        ("patientDescription", "Niño con trastorno fonológico".to_string()),
        ("specificObjective", "Producir /s/".to_string()),
        ("duration", "45".to_string()),
        ("sessionType", "individual".to_string()),
        ("isPediatric", "true".to_string()),
    ]
}

fn multipart_request(fields: &[(&str, String)], uploads: &[Upload<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for upload in uploads {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdfs\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                upload.file_name, upload.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(upload.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/generate-activity")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

//=========================================================================================
// POST /api/generate-activity
//=========================================================================================

#[tokio::test]
async fn generate_stores_the_activity_and_skips_a_broken_pdf() {
    let test = test_app(false);
    let request = multipart_request(
        &form_fields("gemini"),
        &[
            pdf("one.pdf", b"text one"),
            pdf("two.pdf", b"corrupt bytes"),
            pdf("three.pdf", b"text three"),
        ],
    );

    let (status, body) = send(&test.app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["provider"], "gemini");
    assert_eq!(body["demo"], false);
    assert_eq!(body["activity"]["title"], "Cazadores de sonidos");
    assert_eq!(body["activity"]["procedure"][0]["time"], 45);

    let received = test.gemini.received();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].pdf_contents,
        Some(vec!["text one".to_string(), "text three".to_string()])
    );

    let id = body["activityId"].as_str().unwrap().to_string();
    let (status, stored) = send(&test.app, get(&format!("/api/activities/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["success"], true);
    assert_eq!(stored["activity"]["id"], id.as_str());
    assert_eq!(stored["activity"]["provider"], "gemini");
    assert_eq!(stored["activity"]["patientAge"], 7);
    assert_eq!(stored["activity"]["sessionType"], "individual");
    assert_eq!(
        stored["activity"]["generatedActivity"]["title"],
        "Cazadores de sonidos"
    );
    assert!(stored["activity"].get("pdfContents").is_none());
}

#[tokio::test]
async fn generate_rejects_non_pdf_uploads() {
    let test = test_app(false);
    let upload = Upload {
        file_name: "notes.txt",
        content_type: "text/plain",
        data: b"plain text",
    };
    let (status, body) = send(
        &test.app,
        multipart_request(&form_fields("gemini"), &[upload]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("notes.txt"));
    assert!(test.gemini.received().is_empty());
}

#[tokio::test]
async fn generate_requires_provider_and_key() {
    let test = test_app(false);
    let fields: Vec<_> = form_fields("gemini")
        .into_iter()
        .filter(|(name, _)| *name != "apiKey")
        .collect();
    let (status, body) = send(&test.app, multipart_request(&fields, &[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn generate_with_unknown_provider_is_a_descriptive_400() {
    let test = test_app(false);
    let (status, body) = send(&test.app, multipart_request(&form_fields("mistral"), &[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Unsupported provider"), "{error}");
    assert!(error.contains("mistral"));
}

#[tokio::test]
async fn rejected_generation_never_extracts_the_pdfs() {
    let test = test_app(false);
    let uploads = [pdf("guia.pdf", b"Texto de referencia")];

    let (status, _) = send(&test.app, multipart_request(&form_fields("mistral"), &uploads)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, multipart_request(&form_fields("groq"), &uploads)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let mut fields = form_fields("gemini");
    fields.retain(|(name, _)| *name != "duration");
    fields.push(("duration", "0".to_string()));
    let (status, _) = send(&test.app, multipart_request(&fields, &uploads)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(test.extractor.calls.load(Ordering::SeqCst), 0);
    assert!(test.gemini.received().is_empty());
}

#[tokio::test]
async fn generate_with_disabled_provider_is_unavailable() {
    let test = test_app(false);
    let (status, body) = send(&test.app, multipart_request(&form_fields("groq"), &[])).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("temporarily unavailable"));
}

#[tokio::test]
async fn vendor_failure_is_a_bad_gateway_not_a_fallback() {
    let test = test_app(false);
    let mut fields = form_fields("gemini");
    fields.retain(|(name, _)| *name != "patientDescription");
    fields.push(("patientDescription", "vendor-down please".to_string()));

    let (status, body) = send(&test.app, multipart_request(&fields, &[])).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn demo_mode_labels_offline_activities() {
    let test = test_app(true);
    let (status, body) = send(&test.app, multipart_request(&form_fields("gemini"), &[])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["demo"], true);
    assert!(body["activity"]["title"]
        .as_str()
        .unwrap()
        .starts_with("[DEMO]"));
    assert!(test.gemini.received().is_empty());
}

//=========================================================================================
// POST /api/validate-key
//=========================================================================================

#[tokio::test]
async fn validate_key_reports_the_verdict() {
    let test = test_app(false);

    let (status, body) = send(
        &test.app,
        json_request("/api/validate-key", json!({ "provider": "gemini", "apiKey": "good-key" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["valid"], true);
    assert_eq!(body["provider"], "gemini");
    assert_eq!(body["message"], "GEMINI API key is valid");

    let (status, body) = send(
        &test.app,
        json_request("/api/validate-key", json!({ "provider": "gemini", "apiKey": "stolen" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn validate_key_on_disabled_provider_is_format_only() {
    let test = test_app(false);
    let (status, body) = send(
        &test.app,
        json_request(
            "/api/validate-key",
            json!({ "provider": "groq", "apiKey": "gsk_0123456789012345678901234567890123456789012345678" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["authoritative"], false);
}

#[tokio::test]
async fn validate_key_rejects_bad_input() {
    let test = test_app(false);

    let (status, body) = send(
        &test.app,
        json_request("/api/validate-key", json!({ "provider": "gemini" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &test.app,
        json_request("/api/validate-key", json!({ "provider": "claude", "apiKey": "k" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Unsupported provider"));
}

//=========================================================================================
// GET /api/activities/{id}, export and providers
//=========================================================================================

#[tokio::test]
async fn unknown_activity_is_not_found() {
    let test = test_app(false);

    let (status, body) = send(
        &test.app,
        get("/api/activities/9b2f4a4e-4a6c-4c35-9f0e-1d2c3b4a5f60"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(&test.app, get("/api/activities/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_returns_a_text_attachment() {
    let test = test_app(false);
    let (_, body) = send(&test.app, multipart_request(&form_fields("gemini"), &[])).await;
    let id = body["activityId"].as_str().unwrap().to_string();

    let response = test
        .app
        .clone()
        .oneshot(get(&format!("/api/activities/{id}/export")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Cazadores_de_sonidos.txt\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("Cazadores de sonidos"));
    assert!(text.contains("Juego (45 min): Caza de sonidos"));
}

#[tokio::test]
async fn providers_catalogue_reflects_configuration() {
    let test = test_app(false);
    let (status, body) = send(&test.app, get("/api/providers")).await;

    assert_eq!(status, StatusCode::OK);
    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 4);

    let enabled = |id: &str| {
        providers
            .iter()
            .find(|p| p["id"] == id)
            .map(|p| p["enabled"].as_bool().unwrap())
            .unwrap()
    };
    assert!(enabled("gemini"));
    assert!(enabled("openai"));
    assert!(!enabled("groq"));
    assert!(!enabled("deepseek"));
    assert_eq!(body["demoMode"], false);
}

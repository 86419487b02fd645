mod error;
mod extract;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use validator::Validate;

use crate::database::{Database, DocumentStore, Report, ScoredDocument};
use crate::document::{DocumentKind, TextExtractor};
use crate::error::{CompanionError, Result};
use crate::llm::{
    AnswerBackend, AnsweringService, EmbeddingGenerator, MindmapGenerator, QuizGenerator, QuizItem, ReportChat,
    ResearchAgent, RetrievalService, Summarizer,
};
use crate::progress::{self, Activity, ProgressState, ProgressUpdate};
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, SearchProvider};

pub use extract::JsonOrForm;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_TEXT_CHARS: usize = 50_000;
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Everything the handlers need, built once by the entry point.
#[derive(Clone)]
pub struct AppState {
    pub extractor: TextExtractor,
    pub retrieval: Arc<RetrievalService>,
    pub answering: Arc<AnsweringService>,
    pub research: Arc<ResearchAgent>,
    pub chat: Arc<ReportChat>,
    pub mindmap: Arc<MindmapGenerator>,
    pub generation: Arc<dyn CompletionProvider>,
    pub db: Database,
}

/// External collaborators the services are wired from.
pub struct Backends {
    pub generation: Arc<dyn CompletionProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub answer: AnswerBackend,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub store: Arc<dyn DocumentStore>,
    pub db: Database,
}

impl AppState {
    pub fn new(backends: Backends, embedding_max_chars: usize) -> Self {
        let Backends {
            generation,
            embedder,
            answer,
            search,
            store,
            db,
        } = backends;

        let embeddings = EmbeddingGenerator::new(embedder, embedding_max_chars);
        let research = ResearchAgent::new(
            Summarizer::new(generation.clone()),
            QuizGenerator::new(generation.clone()),
            search,
            db.clone(),
        );

        Self {
            extractor: TextExtractor::new(),
            retrieval: Arc::new(RetrievalService::new(store, embeddings)),
            answering: Arc::new(AnsweringService::new(answer)),
            research: Arc::new(research),
            chat: Arc::new(ReportChat::new(generation.clone(), db.clone())),
            mindmap: Arc::new(MindmapGenerator::new(generation.clone())),
            generation,
            db,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct TextRequest {
    #[validate(length(max = 50000))]
    text: String,
}

#[derive(Deserialize, Validate)]
pub struct ResearchRequest {
    #[validate(length(min = 1, max = 500))]
    topic: String,
}

#[derive(Deserialize, Validate)]
pub struct ReportChatRequest {
    #[validate(length(min = 1, max = 100))]
    report_id: String,
    #[validate(length(min = 1, max = 2000))]
    question: String,
}

#[derive(Deserialize, Validate)]
pub struct RagChatParams {
    #[validate(length(min = 1, max = 2000))]
    question: String,
}

fn default_k() -> usize {
    5
}

#[derive(Deserialize, Validate)]
pub struct SearchParams {
    #[validate(length(min = 1, max = 2000))]
    query: String,
    #[serde(default = "default_k")]
    #[validate(range(min = 1, max = 50))]
    k: usize,
}

#[derive(Deserialize, Validate)]
pub struct ProgressRequest {
    #[serde(flatten)]
    #[validate]
    state: ProgressState,
    activity: Activity,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: String,
    documents: usize,
    reports: usize,
    model: String,
    answer_mode: &'static str,
}

#[derive(Serialize)]
pub struct PdfResponse {
    report_id: String,
    filename: String,
    summary: String,
    quiz: Vec<QuizItem>,
    extracted_text: String,
}

#[derive(Serialize)]
pub struct ImageResponse {
    report_id: String,
    filename: String,
    summary: String,
    extracted_text: String,
}

#[derive(Serialize)]
pub struct TextResponse {
    report_id: String,
    summary: String,
    quiz: Vec<QuizItem>,
}

#[derive(Serialize)]
pub struct StoredResponse {
    message: String,
    id: String,
    stored: bool,
}

#[derive(Serialize)]
pub struct RagAnswerResponse {
    question: String,
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    results: Vec<ScoredDocument>,
}

#[derive(Serialize)]
pub struct ResearchResponse {
    report_id: String,
    topic: String,
    summary: String,
    quiz: Vec<QuizItem>,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    answer: String,
}

#[derive(Serialize)]
pub struct MindmapResponse {
    mindmap: String,
}

/// Create and configure the API router
pub fn create_api(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/upload_pdf", post(upload_pdf))
        .route("/upload_image", post(upload_image))
        .route("/upload_text", post(upload_text))
        .route("/upload_to_rag", post(upload_to_rag))
        .route("/rag_chat", get(rag_chat))
        .route("/semantic_search", get(semantic_search))
        .route("/research", post(research))
        .route("/reports/:id", get(get_report))
        .route("/chat_with_report", post(chat_with_report))
        .route("/generate_mindmap", post(generate_mindmap))
        .route("/progress", post(update_progress))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .with_state(state)
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Reads the `file` field of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CompanionError::InvalidInput(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| CompanionError::InvalidInput(e.body_text()))?;

        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(CompanionError::InvalidInput(format!(
                "{} is larger than {} bytes",
                filename, MAX_UPLOAD_BYTES
            )));
        }

        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(CompanionError::InvalidInput("Missing multipart field `file`".to_string()))
}

fn validated<T: Validate>(value: T) -> Result<T> {
    value
        .validate()
        .map_err(|e| CompanionError::InvalidInput(e.to_string()))?;
    Ok(value)
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "AI Research Companion running".to_string(),
    })
}

async fn health_check(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    let model = state
        .generation
        .get_model_info()
        .await
        .map_err(|e| CompanionError::upstream("generation", e))?;

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        documents: state.retrieval.document_count().await?,
        reports: state.db.count_reports().await?,
        model,
        answer_mode: if state.answering.is_extractive() { "extractive" } else { "generative" },
    }))
}

async fn upload_pdf(State(state): State<AppState>, multipart: Multipart) -> Result<Json<PdfResponse>> {
    let upload = read_upload(multipart).await?;
    info!(filename = %upload.filename, bytes = upload.bytes.len(), "PDF upload");

    let text = state.extractor.extract(upload.bytes, DocumentKind::Pdf).await;
    let draft = state.research.build_report(&upload.filename, &text).await?;

    Ok(Json(PdfResponse {
        report_id: draft.report_id,
        filename: upload.filename,
        summary: draft.summary,
        quiz: draft.quiz,
        extracted_text: text,
    }))
}

async fn upload_image(State(state): State<AppState>, multipart: Multipart) -> Result<Json<ImageResponse>> {
    let upload = read_upload(multipart).await?;
    info!(filename = %upload.filename, bytes = upload.bytes.len(), "Image upload");

    let text = state.extractor.extract(upload.bytes, DocumentKind::Image).await;
    let draft = state.research.build_summary_report(&upload.filename, &text).await?;

    Ok(Json(ImageResponse {
        report_id: draft.report_id,
        filename: upload.filename,
        summary: draft.summary,
        extracted_text: text,
    }))
}

async fn upload_text(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<TextRequest>,
) -> Result<Json<TextResponse>> {
    let draft = state.research.build_report("Text Content", request.text.trim()).await?;

    Ok(Json(TextResponse {
        report_id: draft.report_id,
        summary: draft.summary,
        quiz: draft.quiz,
    }))
}

async fn upload_to_rag(State(state): State<AppState>, multipart: Multipart) -> Result<Json<StoredResponse>> {
    let upload = read_upload(multipart).await?;
    let kind = DocumentKind::from_filename(&upload.filename);
    let text = state.extractor.extract(upload.bytes, kind).await;

    if text.is_empty() {
        info!(filename = %upload.filename, "Nothing extracted, document not stored");
        return Ok(Json(StoredResponse {
            message: "No text could be extracted from the document".to_string(),
            id: upload.filename,
            stored: false,
        }));
    }

    state.retrieval.store(&text, &upload.filename).await?;
    Ok(Json(StoredResponse {
        message: "Document stored for RAG".to_string(),
        id: upload.filename,
        stored: true,
    }))
}

async fn rag_chat(
    State(state): State<AppState>,
    Query(params): Query<RagChatParams>,
) -> Result<Json<RagAnswerResponse>> {
    let params = validated(params)?;
    let context = state.retrieval.query(&params.question).await?;

    let context_text = context.as_ref().map(|c| c.text.as_str()).unwrap_or("");
    let answer = state.answering.answer(context_text, &params.question).await?;

    Ok(Json(RagAnswerResponse {
        question: params.question,
        answer: answer.text,
        confidence: answer.confidence,
        source: context.as_ref().map(|c| c.id.clone()),
        score: context.as_ref().map(|c| c.score),
    }))
}

async fn semantic_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let params = validated(params)?;
    let results = state.retrieval.search(&params.query, params.k).await?;
    Ok(Json(SearchResponse { results }))
}

async fn research(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    let draft = state.research.research(request.topic.trim()).await?;

    Ok(Json(ResearchResponse {
        report_id: draft.report_id,
        topic: draft.topic,
        summary: draft.summary,
        quiz: draft.quiz,
    }))
}

async fn get_report(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Report>> {
    state
        .db
        .get_report(&id)
        .await?
        .map(Json)
        .ok_or_else(|| CompanionError::NotFound("Report not found".to_string()))
}

async fn chat_with_report(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<ReportChatRequest>,
) -> Result<Json<AnswerResponse>> {
    let answer = state.chat.chat(&request.report_id, &request.question).await?;
    Ok(Json(AnswerResponse { answer }))
}

async fn generate_mindmap(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<TextRequest>,
) -> Result<Json<MindmapResponse>> {
    let mindmap = state.mindmap.generate(&request.text).await?;
    Ok(Json(MindmapResponse { mindmap }))
}

async fn update_progress(JsonOrForm(request): JsonOrForm<ProgressRequest>) -> Json<ProgressUpdate> {
    Json(progress::apply(request.state, request.activity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::FlatStore;
    use crate::llm::answer::NO_RELEVANT_DOCUMENT;
    use crate::llm::summarize::NO_CONTENT_TO_SUMMARIZE;
    use crate::testing::{FirstSentenceQa, HashEmbedder, ScriptedCompletion, UnreachableStore};
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app_with(model: Arc<ScriptedCompletion>) -> Router {
        app_with_store(model, Arc::new(FlatStore::in_memory())).await
    }

    async fn app_with_store(model: Arc<ScriptedCompletion>, store: Arc<dyn DocumentStore>) -> Router {
        let backends = Backends {
            generation: model,
            embedder: Arc::new(HashEmbedder::default()),
            answer: AnswerBackend::Extractive(Arc::new(FirstSentenceQa::default())),
            search: None,
            store,
            db: Database::open_in_memory().await.unwrap(),
        };
        create_api(AppState::new(backends, 2000))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart_post(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let boundary = "companion-test-boundary";
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            b = boundary,
            f = filename
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_banner() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;
        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "AI Research Companion running");
    }

    #[tokio::test]
    async fn test_upload_text_report_is_retrievable() {
        let model = Arc::new(ScriptedCompletion::new([
            "Topic X covers Y and Z.",
            r#"[{"question": "What is X about?", "options": ["Y and Z", "W"], "answer": "Y and Z"}]"#,
        ]));
        let app = app_with(model).await;

        let (status, body) = send(&app, json_post("/upload_text", json!({"text": "Topic X is about Y and Z."}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Topic X covers Y and Z.");
        assert_eq!(body["quiz"].as_array().unwrap().len(), 1);

        let id = body["report_id"].as_str().unwrap();
        let (status, report) = send(&app, get(&format!("/reports/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["summary"], "Topic X covers Y and Z.");
        assert_eq!(report["quiz"][0]["answer"], "Y and Z");
    }

    #[tokio::test]
    async fn test_upload_empty_text_uses_sentinel() {
        let model = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let app = app_with(model.clone()).await;

        let (status, body) = send(&app, json_post("/upload_text", json!({"text": "   "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], NO_CONTENT_TO_SUMMARIZE);
        assert_eq!(body["quiz"], json!([]));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_text_is_rejected() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;
        let text = "a".repeat(MAX_TEXT_CHARS + 1);
        let (status, _) = send(&app, json_post("/upload_text", json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_with_unknown_report_is_404() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;
        let (status, body) = send(
            &app,
            json_post("/chat_with_report", json!({"report_id": "nope", "question": "Why?"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Report not found"}));

        let (status, _) = send(&app, get("/reports/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rag_chat_on_empty_store() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;
        let (status, body) = send(&app, get("/rag_chat?question=What%20is%20X%3F")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], NO_RELEVANT_DOCUMENT);
        assert!(body.get("confidence").is_none());
    }

    #[tokio::test]
    async fn test_upload_to_rag_then_ask() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;

        let (status, body) = send(
            &app,
            multipart_post("/upload_to_rag", "notes.txt", b"Topic X is about Y and Z. More later."),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Document stored for RAG", "id": "notes.txt", "stored": true}));

        let (status, body) = send(&app, get("/rag_chat?question=What%20is%20topic%20X%20about")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Topic X is about Y and Z");
        assert_eq!(body["source"], "notes.txt");
        assert!(body["confidence"].as_f64().is_some());

        let (_, health) = send(&app, get("/health")).await;
        assert_eq!(health["documents"], 1);
        assert_eq!(health["reports"], 0);
    }

    #[tokio::test]
    async fn test_upload_to_rag_with_no_text_stores_nothing() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;
        let (status, body) = send(&app, multipart_post("/upload_to_rag", "empty.txt", b"  \n")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored"], false);

        let (_, health) = send(&app, get("/health")).await;
        assert_eq!(health["documents"], 0);
    }

    #[tokio::test]
    async fn test_mindmap_accepts_form_body() {
        let model = Arc::new(ScriptedCompletion::new(["# X\n- Y\n- Z"]));
        let app = app_with(model).await;

        let request = Request::builder()
            .method("POST")
            .uri("/generate_mindmap")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("text=Topic+X+is+about+Y+and+Z."))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mindmap"], "# X\n- Y\n- Z");
    }

    #[tokio::test]
    async fn test_unreachable_model_is_bad_gateway() {
        let app = app_with(Arc::new(ScriptedCompletion::failing())).await;
        let (status, body) = send(&app, json_post("/research", json!({"topic": "Mars"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["service"], "generation");
    }

    #[tokio::test]
    async fn test_unreachable_vector_store_is_bad_gateway() {
        let app = app_with_store(
            Arc::new(ScriptedCompletion::new(Vec::<String>::new())),
            Arc::new(UnreachableStore),
        )
        .await;

        let (status, body) = send(&app, get("/rag_chat?question=What%20is%20X%3F")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["service"], "vector store");

        let (status, body) = send(&app, multipart_post("/upload_to_rag", "notes.txt", b"Topic X.")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["service"], "vector store");
    }

    #[tokio::test]
    async fn test_health_reports_counts_and_backends() {
        let model = Arc::new(ScriptedCompletion::new(["Summary.", "[]"]));
        let app = app_with(model).await;
        send(&app, json_post("/upload_text", json!({"text": "Topic X is about Y."}))).await;

        let (status, health) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");
        assert_eq!(health["reports"], 1);
        assert_eq!(health["model"], "scripted");
        assert_eq!(health["answer_mode"], "extractive");
    }

    #[tokio::test]
    async fn test_progress_endpoint() {
        let app = app_with(Arc::new(ScriptedCompletion::new(Vec::<String>::new()))).await;
        let (status, body) = send(
            &app,
            json_post("/progress", json!({"xp": 80, "badges": [], "activity": "upload_image"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["xp"], 120);
        assert_eq!(body["level"], 2);
        assert_eq!(body["leveled_up"], true);
        assert_eq!(body["new_badges"], json!(["🖼️ Image Analyzer"]));
    }
}

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use vocab_categorizer::{
    CategorizationAnalytics, CategorizationResult, CategorizeStoredSummary, CategorizerConfig,
    CategorizerError, ConfiguredBackend, ConfiguredFallback, ReviewDecision,
    StoredVocabularyItem, VocabularyCategorizer, VocabularyItem, VocabularyStore, analytics,
    categorize_in_chunks, categorize_stored, pending_review, record_decision,
};

type Categorizer = VocabularyCategorizer<ConfiguredBackend, ConfiguredFallback>;

struct AppState {
    categorizer: Categorizer,
    config: CategorizerConfig,
    jwt_secret: String,
    /// Fired on shutdown so in-flight batches wind down with defaults.
    shutdown: CancellationToken,
}

impl AppState {
    fn store(&self) -> &ConfiguredBackend {
        self.categorizer.reference()
    }

    fn flush(&self) -> Result<(), StatusCode> {
        self.store()
            .flush(&self.config.backend)
            .map_err(error_status)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: uuid::Uuid, // teacher id
    exp: usize,
}

fn verify_jwt(token: &str, jwt_secret: &str) -> Result<Claims, StatusCode> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_ref());

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(token_data.claims),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

fn teacher_id(state: &AppState, auth: &Authorization<Bearer>) -> Result<String, StatusCode> {
    let claims = verify_jwt(auth.token(), &state.jwt_secret)?;
    Ok(claims.sub.to_string())
}

fn error_status(error: CategorizerError) -> StatusCode {
    match error {
        CategorizerError::NotFound(_) => StatusCode::NOT_FOUND,
        CategorizerError::InvalidDecision(_)
        | CategorizerError::UnknownCategory(_)
        | CategorizerError::EmptyTerm => StatusCode::BAD_REQUEST,
        error => {
            log::error!("Categorizer request failed: {error}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategorizeRequest {
    items: Vec<VocabularyItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CategorizeResponse {
    results: Vec<CategorizationResult>,
    needs_review: usize,
}

async fn categorize(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<CategorizeResponse>, StatusCode> {
    let teacher_id = teacher_id(&state, &auth)?;
    log::info!(
        "Categorizing {} items for teacher {teacher_id}",
        request.items.len()
    );

    let results = categorize_in_chunks(
        &state.categorizer,
        &request.items,
        &state.config.chunking.policy(),
        &state.shutdown,
        |_, _| {},
    )
    .await;
    let needs_review = results.iter().filter(|result| result.needs_review()).count();
    Ok(Json(CategorizeResponse {
        results,
        needs_review,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct CategorizeStoredRequest {
    #[serde(default)]
    only_uncategorized: bool,
}

async fn categorize_stored_items(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CategorizeStoredRequest>,
) -> Result<Json<CategorizeStoredSummary>, StatusCode> {
    let teacher_id = teacher_id(&state, &auth)?;
    let summary = categorize_stored(
        &state.categorizer,
        state.store(),
        &teacher_id,
        request.only_uncategorized,
        &state.config.chunking.policy(),
        &state.shutdown,
    )
    .await
    .map_err(error_status)?;
    state.flush()?;
    Ok(Json(summary))
}

async fn get_pending_review(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<StoredVocabularyItem>>, StatusCode> {
    let teacher_id = teacher_id(&state, &auth)?;
    let pending = pending_review(state.store(), &teacher_id)
        .await
        .map_err(error_status)?;
    Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    item_id: String,
    decision: ReviewDecision,
}

async fn review_item(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ReviewRequest>,
) -> Result<StatusCode, StatusCode> {
    let teacher_id = teacher_id(&state, &auth)?;

    // Teachers may only review their own items.
    let owned = state
        .store()
        .teacher_items(&teacher_id)
        .await
        .map_err(error_status)?
        .iter()
        .any(|item| item.id == request.item_id);
    if !owned {
        return Err(StatusCode::NOT_FOUND);
    }

    record_decision(state.store(), &request.item_id, request.decision)
        .await
        .map_err(error_status)?;
    state.flush()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_analytics(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<CategorizationAnalytics>, StatusCode> {
    let teacher_id = teacher_id(&state, &auth)?;
    let analytics = analytics(state.store(), &teacher_id)
        .await
        .map_err(error_status)?;
    Ok(Json(analytics))
}

fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/", get(|| async { "vocabulary categorizer" }))
        .route("/categorize", post(categorize))
        .route("/categorize-stored", post(categorize_stored_items))
        .route("/pending-review", get(get_pending_review))
        .route("/review", post(review_item))
        .route("/analytics", get(get_analytics))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        log::warn!("Could not listen for ctrl-c; shutting down");
    }
    log::info!("Shutting down");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = CategorizerConfig::load().context("Failed to load configuration")?;
    let jwt_secret =
        std::env::var("SUPABASE_JWT_SECRET").context("SUPABASE_JWT_SECRET must be set")?;
    let backend =
        ConfiguredBackend::from_config(&config.backend).context("Failed to open backend")?;
    let fallback = ConfiguredFallback::from_config(&config.fallback, config.language)
        .context("Failed to set up fallback categorizer")?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        categorizer: VocabularyCategorizer::from_config(backend, fallback, &config),
        config,
        jwt_secret,
        shutdown: shutdown.clone(),
    });

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    log::info!("Listening on port {port}");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;
    use vocab_categorizer::fallback::RuleBasedCategorizer;
    use vocab_categorizer::{BackendConfig, Category, MemoryVocabulary, Subcategory};

    const SECRET: &str = "test-secret";
    const TEACHER: &str = "8c5b2f5e-3d4a-4c1e-9f7a-2b6d1e0a9c3f";
    const OTHER_TEACHER: &str = "1f0e9d8c-7b6a-4b5c-8d4e-3f2a1b0c9d8e";

    fn token(teacher: &str) -> String {
        let claims = serde_json::json!({
            "sub": teacher,
            "exp": 4_000_000_000u64,
            "aud": "authenticated",
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn test_state() -> Arc<AppState> {
        let backend = ConfiguredBackend::Memory(MemoryVocabulary::default().with_items(vec![
            StoredVocabularyItem::new("a", TEACHER, "rojo", "red"),
            StoredVocabularyItem::new("b", TEACHER, "el perro", "dog"),
            StoredVocabularyItem::new("c", OTHER_TEACHER, "azul", "blue"),
        ]));
        let mut config = CategorizerConfig {
            backend: BackendConfig::Memory {
                reference_jsonl: None,
                items_jsonl: None,
            },
            ..CategorizerConfig::default()
        };
        config.chunking.delay_ms = 0;
        Arc::new(AppState {
            categorizer: VocabularyCategorizer::from_config(
                backend,
                ConfiguredFallback::Rules(RuleBasedCategorizer),
                &config,
            ),
            config,
            jwt_secret: SECRET.to_string(),
            shutdown: CancellationToken::new(),
        })
    }

    fn request(method: &str, uri: &str, teacher: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token(teacher)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_verify_jwt() {
        let claims = verify_jwt(&token(TEACHER), SECRET).unwrap();
        assert_eq!(claims.sub.to_string(), TEACHER);
        assert_eq!(
            verify_jwt(&token(TEACHER), "wrong-secret").unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(CategorizerError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(CategorizerError::InvalidDecision("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(CategorizerError::Supabase("timeout".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_categorize_route() {
        let response = app(test_state())
            .oneshot(request(
                "POST",
                "/categorize",
                TEACHER,
                serde_json::json!({
                    "items": [
                        { "term": "verde", "translation": "green" },
                        { "term": "el gato", "translation": "cat" },
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: CategorizeResponse = json_body(response).await;
        assert_eq!(body.results.len(), 2);
        assert_eq!(body.results[0].predicted_subcategory, Subcategory::Colors);
        assert_eq!(body.results[1].predicted_category, Category::General);
        assert_eq!(body.needs_review, 1);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let request = Request::builder()
            .method("GET")
            .uri("/analytics")
            .body(Body::empty())
            .unwrap();
        let response = app(test_state()).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_categorize_then_review() {
        let state = test_state();

        let response = app(state.clone())
            .oneshot(request(
                "POST",
                "/categorize-stored",
                TEACHER,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary: CategorizeStoredSummary = json_body(response).await;
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.saved, 2);

        let response = app(state.clone())
            .oneshot(request(
                "GET",
                "/pending-review",
                TEACHER,
                serde_json::Value::Null,
            ))
            .await
            .unwrap();
        let pending: Vec<StoredVocabularyItem> = json_body(response).await;
        let ids: Vec<&str> = pending.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);

        let response = app(state.clone())
            .oneshot(request(
                "POST",
                "/review",
                TEACHER,
                serde_json::json!({
                    "item_id": "b",
                    "decision": {
                        "action": "override",
                        "category": "Identity & Relationships",
                        "subcategory": "Family & Friends",
                    }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app(state)
            .oneshot(request(
                "GET",
                "/analytics",
                TEACHER,
                serde_json::Value::Null,
            ))
            .await
            .unwrap();
        let analytics: CategorizationAnalytics = json_body(response).await;
        assert_eq!(analytics.total_items, 2);
        assert_eq!(analytics.approved_items, 1);
    }

    #[tokio::test]
    async fn test_review_of_another_teachers_item() {
        let response = app(test_state())
            .oneshot(request(
                "POST",
                "/review",
                TEACHER,
                serde_json::json!({ "item_id": "c", "decision": { "action": "approve" } }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

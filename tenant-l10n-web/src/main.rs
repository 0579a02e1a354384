use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tenant_l10n::{
    AdminService, AppConfig, EntryFilter, L10nError, LocalizationOptions, LocalizerFactory,
    TenantScope, TranslationEntry, TranslationRecord, open_store,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Cookie carrying the user's chosen culture
const CULTURE_COOKIE: &str = "l10n-culture";

/// Environment variable for the listen address
const ADDR_ENV_VAR: &str = "TENANT_L10N_WEB_ADDR";

#[derive(Clone)]
pub struct AppState {
    pub factory: LocalizerFactory,
    pub admin: AdminService,
}

impl AppState {
    fn options(&self) -> &LocalizationOptions {
        self.factory.options()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Library error rendered as an HTTP response
pub struct ApiError(L10nError);

impl From<L10nError> for ApiError {
    fn from(error: L10nError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            L10nError::NotFound(_) => StatusCode::NOT_FOUND,
            L10nError::Duplicate(_) | L10nError::Protected(_) => StatusCode::CONFLICT,
            L10nError::Import(_) | L10nError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct StringQuery {
    pub culture: Option<String>,
    pub tenant: Option<String>,
    /// Comma separated positional arguments
    pub args: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AllStringsQuery {
    pub culture: Option<String>,
    pub tenant: Option<String>,
    pub parents: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringResponse {
    pub name: String,
    pub value: String,
    pub resource_not_found: bool,
    pub culture: String,
}

#[derive(Deserialize)]
pub struct CultureRequest {
    pub culture: String,
}

#[derive(Serialize)]
pub struct CultureResponse {
    pub culture: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub tenant: Option<String>,
    /// Only global rows; ignored when `tenant` is given
    pub global: Option<bool>,
    pub culture: Option<String>,
    pub search: Option<String>,
}

impl AdminQuery {
    fn filter(&self) -> EntryFilter {
        let tenant = match (self.tenant.as_deref(), self.global) {
            (Some(t), _) if !t.trim().is_empty() => Some(TenantScope::from_option(Some(t))),
            (_, Some(true)) => Some(TenantScope::Global),
            _ => None,
        };
        EntryFilter::from_parts(tenant, self.culture.as_deref(), self.search.as_deref())
    }
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub value: String,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load(None)?;
    let state = build_state(&config).await?;

    info!("Starting tenant-l10n web server");

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::env::var(ADDR_ENV_VAR).unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &AppConfig) -> Result<AppState, L10nError> {
    let store = open_store(config).await?;
    Ok(AppState {
        factory: LocalizerFactory::new(store.clone(), config.localization.clone()),
        admin: AdminService::new(store, config.localization.clone()),
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/strings", get(all_strings))
        .route("/api/strings/{key}", get(get_string))
        .route("/api/culture", post(set_culture))
        .route(
            "/api/admin/translations",
            get(list_translations).post(create_translation),
        )
        .route(
            "/api/admin/translations/{id}",
            put(update_translation).delete(delete_translation),
        )
        .route("/api/admin/export.csv", get(export_csv))
        .route("/api/admin/export.json", get(export_json))
        .route("/api/admin/import/csv", post(import_csv))
        .route("/api/admin/import/json", post(import_json))
        .with_state(state)
}

fn cookie_culture(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CULTURE_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

/// Culture for a request: query, then cookie, then the configured default
///
/// Each candidate is skipped when blank or outside the supported list.
fn requested_culture(query: Option<&str>, headers: &HeaderMap, options: &LocalizationOptions) -> String {
    let usable = |c: &str| !c.is_empty() && options.is_supported(c);
    query
        .map(str::trim)
        .filter(|c| usable(c))
        .map(str::to_string)
        .or_else(|| cookie_culture(headers).filter(|c| usable(c)))
        .unwrap_or_else(|| options.default_culture.clone())
}

fn requested_tenant(query: Option<&str>, options: &LocalizationOptions) -> Option<String> {
    query
        .or(options.tenant_id.as_deref())
        .map(str::to_string)
}

async fn get_string(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<StringQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<StringResponse>> {
    let options = state.options();
    let culture = requested_culture(query.culture.as_deref(), &headers, options);
    let tenant = requested_tenant(query.tenant.as_deref(), options);
    let args: Vec<String> = query
        .args
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(|a| a.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let localizer = state
        .factory
        .create_for_culture("web", &culture)
        .with_tenant(tenant.as_deref());
    let localized = localizer.get_with_args(&key, &args).await?;
    Ok(Json(StringResponse {
        name: localized.name,
        value: localized.value,
        resource_not_found: localized.resource_not_found,
        culture: localizer.culture().to_string(),
    }))
}

async fn all_strings(
    State(state): State<AppState>,
    Query(query): Query<AllStringsQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let options = state.options();
    let culture = requested_culture(query.culture.as_deref(), &headers, options);
    let tenant = requested_tenant(query.tenant.as_deref(), options);

    let strings = state
        .factory
        .create_for_culture("web", &culture)
        .with_tenant(tenant.as_deref())
        .get_all_strings(query.parents.unwrap_or(true))
        .await?;
    Ok(Json(
        strings.into_iter().map(|s| (s.name, s.value)).collect(),
    ))
}

async fn set_culture(
    State(state): State<AppState>,
    Json(request): Json<CultureRequest>,
) -> Response {
    let options = state.options();
    let chosen = requested_culture(Some(&request.culture), &HeaderMap::new(), options);
    let cookie = format!("{CULTURE_COOKIE}={chosen}; Path=/; Max-Age=31536000; SameSite=Lax");

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.insert(header::SET_COOKIE, value);
        }
        Err(e) => {
            return ApiError(L10nError::Invalid(format!("culture '{}': {}", chosen, e)))
                .into_response();
        }
    }
    info!(culture = chosen.as_str(), "culture selected");
    (headers, Json(CultureResponse { culture: chosen })).into_response()
}

async fn list_translations(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> ApiResult<Json<Vec<TranslationEntry>>> {
    Ok(Json(state.admin.list(&query.filter()).await?))
}

async fn create_translation(
    State(state): State<AppState>,
    Json(record): Json<TranslationRecord>,
) -> ApiResult<(StatusCode, Json<TranslationEntry>)> {
    let created = state.admin.create(record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_translation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRequest>,
) -> ApiResult<Json<TranslationEntry>> {
    Ok(Json(state.admin.update(id, &request.value).await?))
}

async fn delete_translation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.admin.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> ApiResult<impl IntoResponse> {
    let body = state.admin.export_csv(&query.filter()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"translations.csv\""),
        ],
        body,
    ))
}

async fn export_json(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> ApiResult<impl IntoResponse> {
    let body = state.admin.export_json(&query.filter()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"translations.json\""),
        ],
        body,
    ))
}

async fn import_csv(State(state): State<AppState>, body: String) -> ApiResult<Json<ImportResponse>> {
    let imported = state.admin.import_csv(&body).await?;
    Ok(Json(ImportResponse { imported }))
}

async fn import_json(State(state): State<AppState>, body: String) -> ApiResult<Json<ImportResponse>> {
    let imported = state.admin.import_json(&body).await?;
    Ok(Json(ImportResponse { imported }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app() -> Router {
        let config = AppConfig::from_toml_str(
            r#"
            [localization]
            default_culture = "en-US"
            supported_cultures = ["en-US", "fr-FR", "fr-CA"]
            provider = "memory"
            "#,
        )
        .unwrap();
        router(build_state(&config).await.unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    // ========== Culture selection ==========

    #[test]
    fn test_requested_culture_precedence() {
        let options = LocalizationOptions {
            supported_cultures: vec!["en-US".to_string(), "fr-FR".to_string()],
            ..LocalizationOptions::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; l10n-culture=fr-FR"),
        );

        assert_eq!(requested_culture(Some("en-US"), &headers, &options), "en-US");
        assert_eq!(requested_culture(None, &headers, &options), "fr-FR");
        assert_eq!(requested_culture(None, &HeaderMap::new(), &options), "en-US");
        assert_eq!(requested_culture(Some("de-DE"), &HeaderMap::new(), &options), "en-US");
    }

    #[test]
    fn test_unsupported_query_falls_back_to_cookie() {
        let options = LocalizationOptions {
            supported_cultures: vec!["en-US".to_string(), "fr-FR".to_string()],
            ..LocalizationOptions::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("l10n-culture=fr-FR"));
        assert_eq!(requested_culture(Some("de-DE"), &headers, &options), "fr-FR");
        assert_eq!(requested_culture(Some(" "), &headers, &options), "fr-FR");

        headers.insert(header::COOKIE, HeaderValue::from_static("l10n-culture=ja-JP"));
        assert_eq!(requested_culture(Some("de-DE"), &headers, &options), "en-US");
    }

    // ========== Routes ==========

    #[tokio::test]
    async fn test_create_and_resolve() {
        let app = app().await;
        let (status, _, _) = send(
            &app,
            json_request(
                "POST",
                "/api/admin/translations",
                r#"{"key":"Greet","culture":"fr-FR","tenantId":null,"value":"Bonjour {0}"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = send(&app, get_request("/api/strings/Greet?culture=fr-FR&args=Ana")).await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["value"], "Bonjour Ana");
        assert_eq!(value["resourceNotFound"], false);

        let (_, _, body) = send(&app, get_request("/api/strings/Missing")).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["value"], "Missing");
        assert_eq!(value["resourceNotFound"], true);
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let app = app().await;
        let body = r#"{"key":"A","culture":"en-US","tenantId":null,"value":"a"}"#;
        send(&app, json_request("POST", "/api/admin/translations", body)).await;
        let (status, _, body) = send(&app, json_request("POST", "/api/admin/translations", body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("error"));

        let (status, _, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/translations/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_culture_cookie() {
        let app = app().await;
        let (status, headers, body) =
            send(&app, json_request("POST", "/api/culture", r#"{"culture":"fr-CA"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("fr-CA"));
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("l10n-culture=fr-CA"));

        let (_, headers, _) =
            send(&app, json_request("POST", "/api/culture", r#"{"culture":"xx-YY"}"#)).await;
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("l10n-culture=en-US"));
    }

    #[tokio::test]
    async fn test_import_then_export() {
        let app = app().await;
        let csv = "Key,Culture,TenantId,Value\nTitle,fr-FR,,Titre\nTitle,fr-FR,acme,Titre acme\n";
        let (status, _, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/admin/import/csv")
                .body(Body::from(csv))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"imported\":2"));

        let (status, headers, body) = send(&app, get_request("/api/admin/export.csv?global=true")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
        assert_eq!(body, "Key,Culture,TenantId,Value\nTitle,fr-FR,,Titre\n");

        let (status, _, _) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/admin/import/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, _, body) = send(&app, get_request("/api/strings?culture=fr-FR&tenant=acme")).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["Title"], "Titre acme");

        let (_, _, body) = send(&app, get_request("/api/strings?culture=fr-CA&tenant=acme")).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(value.as_object().unwrap().is_empty());
    }
}

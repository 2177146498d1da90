use actix_cors::Cors;
use actix_web::{error, web, HttpRequest, HttpResponse};
use formdb::store::SortOrder;
use formdb::{validate_submission, FormDbError, SubmissionQuery, SubmissionStore};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::AppState;

/// Largest page a client may request
const MAX_LIMIT: i64 = 100;
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
/// Request body cap, in bytes
const BODY_LIMIT: usize = 100 * 1024;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(
            web::scope("/api")
                .service(
                    web::resource("/form-schema")
                        .route(web::get().to(form_schema))
                        .default_service(web::to(fallback)),
                )
                .service(
                    web::resource("/submissions")
                        .route(web::get().to(list_submissions))
                        .route(web::post().to(create_submission))
                        .default_service(web::to(fallback)),
                )
                .service(
                    web::resource("/submissions/{id}")
                        .route(web::put().to(update_submission))
                        .route(web::delete().to(delete_submission))
                        .default_service(web::to(fallback)),
                ),
        );
}

/// Any origin, method and request header; preflights are answered by the middleware
pub fn cors() -> Cors {
    Cors::permissive()
}

/// Turns every unmatched request into a JSON 404
pub async fn fallback(req: HttpRequest) -> HttpResponse {
    log::debug!("No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(json!({ "success": false, "error": "Not found" }))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(BODY_LIMIT)
        .error_handler(|err, _req| {
            log::debug!("Rejected request body: {err}");
            let response = bad_request("Invalid JSON body");
            error::InternalError::from_response(err, response).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected query string: {err}");
        let response = bad_request("Invalid query parameters");
        error::InternalError::from_response(err, response).into()
    })
}

// ── Helpers ─────────────────────────────────────────────────────────

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": message
    }))
}

fn validation_failed(errors: formdb::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "errors": errors
    }))
}

fn err_response(e: FormDbError) -> HttpResponse {
    match &e {
        FormDbError::NotFound { id } => {
            log::debug!("Submission not found: {id}");
            HttpResponse::NotFound().json(json!({
                "success": false,
                "error": "Submission not found"
            }))
        }
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal server error"
            }))
        }
    }
}

/// Run `f` with exclusive access to the store
fn with_store<T>(
    state: &AppState,
    f: impl FnOnce(&mut SubmissionStore) -> T,
) -> Result<T, FormDbError> {
    let mut store = state
        .store
        .lock()
        .map_err(|_| FormDbError::Other("Submission store lock poisoned".to_string()))?;
    Ok(f(&mut store))
}

fn into_object(body: Value) -> Option<Map<String, Value>> {
    match body {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Integer parsing that reads a leading integer prefix (`"5abc"` is 5) and
/// treats missing, unparseable and zero input as "use the default".
/// Digit runs too long for `i64` saturate.
fn lenient_int(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw else {
        return default;
    };
    let trimmed = raw.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    let digits = &rest[..end];
    if digits.is_empty() {
        return default;
    }

    // Only overflow can fail here
    match digits.parse::<i64>().unwrap_or(i64::MAX) {
        0 => default,
        n => sign * n,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    search: Option<String>,
}

impl ListParams {
    /// Apply defaults and bounds. `None` means the pagination is out of range.
    fn into_query(self) -> Option<SubmissionQuery> {
        let page = lenient_int(self.page.as_deref(), DEFAULT_PAGE);
        let limit = lenient_int(self.limit.as_deref(), DEFAULT_LIMIT);

        if page < 1 || limit < 1 || limit > MAX_LIMIT {
            return None;
        }

        Some(SubmissionQuery {
            page: usize::try_from(page).ok()?,
            limit: usize::try_from(limit).ok()?,
            sort_by: self
                .sort_by
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "createdAt".to_string()),
            sort_order: SortOrder::parse(self.sort_order.as_deref().unwrap_or_default()),
            search: self.search.unwrap_or_default(),
        })
    }
}

// ── Schema ──────────────────────────────────────────────────────────

async fn form_schema(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.schema)
}

// ── Submissions ─────────────────────────────────────────────────────

async fn create_submission(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> HttpResponse {
    let Some(data) = into_object(body.into_inner()) else {
        return bad_request("Request body must be a JSON object");
    };

    let errors = validate_submission(&state.schema.fields, &data);
    if !errors.is_ok() {
        log::debug!("Submission rejected: {} invalid field(s)", errors.len());
        return validation_failed(errors);
    }

    match with_store(&state, |store| store.add(data)) {
        Ok(submission) => HttpResponse::Created().json(json!({
            "success": true,
            "id": submission.id,
            "createdAt": submission.created_at
        })),
        Err(e) => err_response(e),
    }
}

async fn list_submissions(
    state: web::Data<AppState>,
    params: web::Query<ListParams>,
) -> HttpResponse {
    let Some(query) = params.into_inner().into_query() else {
        return bad_request("Invalid pagination parameters");
    };

    match with_store(&state, |store| store.query(&query)) {
        Ok(page) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": page.data,
            "pagination": page.pagination
        })),
        Err(e) => err_response(e),
    }
}

async fn update_submission(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(data) = into_object(body.into_inner()) else {
        return bad_request("Request body must be a JSON object");
    };

    // Validation runs before the existence check
    let errors = validate_submission(&state.schema.fields, &data);
    if !errors.is_ok() {
        return validation_failed(errors);
    }

    let result = with_store(&state, |store| store.update(&id, data))
        .and_then(|updated| updated.ok_or_else(|| FormDbError::NotFound { id: id.clone() }));

    match result {
        Ok(submission) => HttpResponse::Ok().json(json!({
            "success": true,
            "submission": submission
        })),
        Err(e) => err_response(e),
    }
}

async fn delete_submission(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();

    let result = with_store(&state, |store| store.delete(&id)).and_then(|deleted| {
        if deleted {
            Ok(())
        } else {
            Err(FormDbError::NotFound { id: id.clone() })
        }
    });

    match result {
        Ok(()) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Submission deleted successfully"
        })),
        Err(e) => err_response(e),
    }
}

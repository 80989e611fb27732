use crate::jobs::JobError;
use crate::server::api::{self, ApiError};
use crate::server::AppState;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

pub fn route_request(state: &AppState, method: &str, path: &str, body: &str) -> HttpResponse {
    let route = path.split_once('?').map_or(path, |(route, _)| route);
    match (method, route) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => ok_json(payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("POST", "/api/parse-trinkets-all") => respond(api::parse_trinkets_payload(body)),
        ("POST", "/api/quick-sim") => respond(api::quick_sim_payload(state, body)),
        ("POST", "/api/top-gear") => respond(api::top_gear_payload(state, body)),
        ("POST", "/api/top-gear-trinket-pairs") => respond(api::trinket_pairs_payload(state, body)),
        ("POST", "/api/leaderboard") => respond(api::leaderboard_payload(body)),
        ("GET", "/api/items") => respond(api::items_payload(state, path)),
        ("GET", route) if route.starts_with("/api/job/") => {
            let rest = route.trim_start_matches("/api/job/");
            match rest.split_once('/') {
                None if !rest.is_empty() => respond(api::job_status_payload(state, rest)),
                Some((job_id, "leaderboard")) if !job_id.is_empty() => {
                    respond(api::job_leaderboard_payload(state, job_id, path))
                }
                _ => error_response(404, "Not Found", "Route not found"),
            }
        }
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

fn ok_json(body: String) -> HttpResponse {
    HttpResponse {
        status_code: 200,
        status_text: "OK",
        content_type: "application/json",
        body,
    }
}

fn respond(result: Result<String, ApiError>) -> HttpResponse {
    match result {
        Ok(payload) => ok_json(payload),
        Err(ApiError::Validation(validation)) => {
            validation_error_response(400, "Bad Request", validation)
        }
        Err(err) => {
            let (status_code, status_text) = status_for(&err);
            error_response(status_code, status_text, &err.to_string())
        }
    }
}

fn status_for(err: &ApiError) -> (u16, &'static str) {
    match err {
        ApiError::Parse(_) | ApiError::Validation(_) => (400, "Bad Request"),
        ApiError::Job(JobError::NotFound(_)) => (404, "Not Found"),
        ApiError::Pending { .. } => (409, "Conflict"),
        ApiError::JobFailed(_) | ApiError::Metadata(_) => (502, "Bad Gateway"),
        ApiError::Job(_) => (503, "Service Unavailable"),
        ApiError::Encode(_) => (500, "Internal Server Error"),
    }
}

fn validation_error_response(
    status_code: u16,
    status_text: &'static str,
    payload: api::ValidationErrorResponse,
) -> HttpResponse {
    let fallback =
        "{\n  \"status\": \"error\",\n  \"message\": \"Validation failed\"\n}".to_string();

    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: serde_json::to_string_pretty(&payload).unwrap_or(fallback),
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}

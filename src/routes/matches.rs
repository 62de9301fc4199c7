use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::{MatchResult, MatchService};
use crate::models::{
    EventsQuery, EventsResponse, HealthResponse, MatchPairRequest, OwnerResponse, PreferenceId,
    PreferenceIdResponse, ProfileId, ProfileIdResponse, PublicHandleResponse,
    PublishProfileRequest, SubmitPreferenceRequest, VersionResponse,
};
use crate::routes::{caller_identity, error_response, match_error_response, validation_error_response};
use crate::services::{ClearEngine, EventLog, JwtVerifier};

const DEFAULT_EVENT_LIMIT: usize = 100;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchService>,
    pub events: Arc<EventLog>,
    pub auth: Arc<JwtVerifier>,
    /// Set only when the in-process engine backs the service and dev routes are enabled
    pub dev_engine: Option<Arc<ClearEngine>>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/version", web::get().to(version))
        .route("/profiles", web::post().to(publish_profile))
        .route("/profiles/{id}/owner", web::get().to(profile_owner))
        .route("/preferences", web::post().to(submit_preference))
        .route("/preferences/{id}/owner", web::get().to(preference_owner))
        .route("/matches/compute", web::post().to(compute_match))
        .route("/matches/public", web::post().to(make_match_public))
        .route("/matches/public", web::get().to(public_match))
        .route("/events", web::get().to(recent_events));
}

/// Run a service call off the async workers; engine operations may be slow
async fn run_blocking<T, F>(call: F) -> Result<T, HttpResponse>
where
    F: FnOnce() -> MatchResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(match_error_response(&err)),
        Err(err) => {
            tracing::error!("Blocking task failed: {}", err);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string()))
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: state.service.version().to_string(),
        engine: state.service.engine().name().to_string(),
        stats: state.service.stats(),
        timestamp: chrono::Utc::now(),
    })
}

async fn version(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(VersionResponse {
        version: state.service.version().to_string(),
    })
}

/// Publish an encrypted profile
///
/// POST /api/v1/profiles
///
/// Request body:
/// ```json
/// {
///   "age": {"handle": "0x..", "width": "u8"},
///   "gender": {"handle": "0x..", "width": "u8"},
///   "interests": {"handle": "0x..", "width": "u16"},
///   "region": {"handle": "0x..", "width": "u16"},
///   "attestation": "0x.."
/// }
/// ```
async fn publish_profile(
    state: web::Data<AppState>,
    body: web::Json<PublishProfileRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let service = state.service.clone();
    let request = body.into_inner();
    match run_blocking(move || service.publish_profile(&caller, &request.inputs, &request.attestation)).await {
        Ok(profile_id) => HttpResponse::Created().json(ProfileIdResponse { profile_id }),
        Err(response) => response,
    }
}

/// Submit an encrypted preference
///
/// POST /api/v1/preferences
///
/// Same shape as profiles, with `minAge`, `maxAge`, `desiredGender`,
/// `interestsMask` and `region` inputs.
async fn submit_preference(
    state: web::Data<AppState>,
    body: web::Json<SubmitPreferenceRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let service = state.service.clone();
    let request = body.into_inner();
    match run_blocking(move || service.submit_preference(&caller, &request.inputs, &request.attestation)).await {
        Ok(preference_id) => HttpResponse::Created().json(PreferenceIdResponse { preference_id }),
        Err(response) => response,
    }
}

/// Compute the encrypted match result for a pair
///
/// POST /api/v1/matches/compute
///
/// Request body:
/// ```json
/// { "profileId": 1, "preferenceId": 1 }
/// ```
async fn compute_match(
    state: web::Data<AppState>,
    body: web::Json<MatchPairRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(errors) = body.validate() {
        return validation_error_response(&errors);
    }

    let service = state.service.clone();
    let (profile_id, preference_id) = (ProfileId(body.profile_id), PreferenceId(body.preference_id));
    match run_blocking(move || service.compute_match_handle(&caller, profile_id, preference_id)).await {
        Ok(handle) => HttpResponse::Ok().json(handle),
        Err(response) => response,
    }
}

/// Publish a pair's match result; caller must be one of the two parties
///
/// POST /api/v1/matches/public
async fn make_match_public(
    state: web::Data<AppState>,
    body: web::Json<MatchPairRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(errors) = body.validate() {
        return validation_error_response(&errors);
    }

    let service = state.service.clone();
    let (profile_id, preference_id) = (ProfileId(body.profile_id), PreferenceId(body.preference_id));
    match run_blocking(move || service.make_match_public(&caller, profile_id, preference_id)).await {
        Ok(handle) => HttpResponse::Ok().json(PublicHandleResponse::from(handle)),
        Err(response) => response,
    }
}

/// GET /api/v1/matches/public?profileId={id}&preferenceId={id}
async fn public_match(
    state: web::Data<AppState>,
    query: web::Query<MatchPairRequest>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error_response(&errors);
    }

    let (profile_id, preference_id) = (ProfileId(query.profile_id), PreferenceId(query.preference_id));
    HttpResponse::Ok().json(PublicHandleResponse {
        profile_id,
        preference_id,
        handle: state.service.public_match_handle(profile_id, preference_id),
    })
}

async fn profile_owner(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    match state.service.owner_of_profile(ProfileId(path.into_inner())) {
        Ok(owner) => HttpResponse::Ok().json(OwnerResponse { owner }),
        Err(err) => match_error_response(&err),
    }
}

async fn preference_owner(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    match state.service.owner_of_preference(PreferenceId(path.into_inner())) {
        Ok(owner) => HttpResponse::Ok().json(OwnerResponse { owner }),
        Err(err) => match_error_response(&err),
    }
}

/// Most recent events, oldest first
///
/// GET /api/v1/events?limit={n}
async fn recent_events(
    state: web::Data<AppState>,
    query: web::Query<EventsQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error_response(&errors);
    }

    let events = state.events.recent(query.limit.unwrap_or(DEFAULT_EVENT_LIMIT));
    HttpResponse::Ok().json(EventsResponse {
        count: events.len(),
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;
    use crate::services::{EventSink, FanoutSink, TracingEventSink};
    use actix_web::{test as actix_test, App};

    fn state() -> AppState {
        let engine = Arc::new(ClearEngine::new());
        let events = Arc::new(EventLog::new(16));
        let sink = FanoutSink::new()
            .with(Arc::new(TracingEventSink))
            .with(events.clone() as Arc<dyn EventSink>);
        AppState {
            service: Arc::new(MatchService::new(engine.clone(), Identity::new("system"), Arc::new(sink))),
            events,
            auth: Arc::new(JwtVerifier::new("test-secret", None)),
            dev_engine: Some(engine),
        }
    }

    #[test]
    fn test_run_blocking_maps_service_errors() {
        let response = tokio_test::block_on(run_blocking(|| -> MatchResult<()> {
            Err(crate::core::MatchError::NotRegistered("profile 1".to_string()))
        }))
        .unwrap_err();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let value = tokio_test::block_on(run_blocking(|| Ok(7u64))).unwrap();
        assert_eq!(value, 7);
    }

    #[actix_web::test]
    async fn test_health_check_response() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["stats"]["profiles"], 0);
    }

    #[actix_web::test]
    async fn test_compute_requires_token() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/matches/compute")
            .set_json(serde_json::json!({"profileId": 1, "preferenceId": 1}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_public_lookup_is_null_before_publication() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/matches/public?profileId=1&preferenceId=2")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert!(body["handle"].is_null());
    }

    #[actix_web::test]
    async fn test_unknown_owner_is_not_found() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/profiles/9/owner").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

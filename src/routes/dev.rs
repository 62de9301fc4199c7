//! Development endpoints backed by the in-process engine
//!
//! These stand in for the client-side encryption SDK and the decryption
//! gateway a real deployment would use. They are only reachable when
//! `AppState::dev_engine` is set.

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::models::{
    DecryptResponse, DevDecryptRequest, DevPreferenceInputRequest, DevPreferenceInputsResponse,
    DevProfileInputRequest, DevProfileInputsResponse,
};
use crate::routes::{caller_identity, engine_error_response, error_response, validation_error_response, AppState};
use crate::services::ClearEngine;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/dev/inputs/profile", web::post().to(encrypt_profile))
        .route("/dev/inputs/preference", web::post().to(encrypt_preference))
        .route("/dev/decrypt", web::post().to(decrypt));
}

fn dev_engine(state: &AppState) -> Result<Arc<ClearEngine>, HttpResponse> {
    state.dev_engine.clone().ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "dev_routes_disabled",
            "Development endpoints are disabled",
        )
    })
}

/// POST /api/v1/dev/inputs/profile
///
/// Encrypts plaintext profile values for the caller and returns the inputs
/// and attestation to pass to `POST /profiles`.
async fn encrypt_profile(
    state: web::Data<AppState>,
    body: web::Json<DevProfileInputRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let engine = match dev_engine(&state) {
        Ok(engine) => engine,
        Err(response) => return response,
    };
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(errors) = body.validate() {
        return validation_error_response(&errors);
    }

    let (inputs, attestation) =
        engine.encrypt_profile(&caller, body.age, body.gender, body.interests, body.region);
    tracing::debug!(owner = %caller, "Encrypted dev profile inputs");
    HttpResponse::Ok().json(DevProfileInputsResponse { inputs, attestation })
}

/// POST /api/v1/dev/inputs/preference
async fn encrypt_preference(
    state: web::Data<AppState>,
    body: web::Json<DevPreferenceInputRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let engine = match dev_engine(&state) {
        Ok(engine) => engine,
        Err(response) => return response,
    };
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(errors) = body.validate() {
        return validation_error_response(&errors);
    }

    let (inputs, attestation) = engine.encrypt_preference(
        &caller,
        body.min_age,
        body.max_age,
        body.desired_gender,
        body.interests_mask,
        body.region,
    );
    tracing::debug!(requester = %caller, "Encrypted dev preference inputs");
    HttpResponse::Ok().json(DevPreferenceInputsResponse { inputs, attestation })
}

/// POST /api/v1/dev/decrypt
///
/// Decrypts a handle for the caller if they hold a grant on it or it is public.
async fn decrypt(
    state: web::Data<AppState>,
    body: web::Json<DevDecryptRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let engine = match dev_engine(&state) {
        Ok(engine) => engine,
        Err(response) => return response,
    };
    let caller = match caller_identity(&state, &http_req) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match engine.decrypt(&body.handle, &caller) {
        Ok(value) => HttpResponse::Ok().json(DecryptResponse {
            handle: body.handle,
            value,
        }),
        Err(err) => engine_error_response(&err),
    }
}

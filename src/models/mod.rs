// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    EncryptedPreference, EncryptedProfile, Gender, Identity, MatchEvent, MatchHandle, PreferenceId,
    PreferenceInputs, PreferenceRecord, ProfileId, ProfileInputs, ProfileRecord, AGE_MAX, AGE_MIN,
    AGE_WIDTH, GENDER_WIDTH, INTERESTS_WIDTH, MATCH_WIDTH, REGION_WIDTH, WILDCARD_GENDER,
    WILDCARD_REGION,
};
pub use requests::{
    DevDecryptRequest, DevPreferenceInputRequest, DevProfileInputRequest, EventsQuery, MatchPairRequest,
    PublishProfileRequest, SubmitPreferenceRequest,
};
pub use responses::{
    DecryptResponse, DevPreferenceInputsResponse, DevProfileInputsResponse, ErrorResponse,
    EventsResponse, HealthResponse, OwnerResponse, PreferenceIdResponse, ProfileIdResponse,
    PublicHandleResponse, VersionResponse,
};

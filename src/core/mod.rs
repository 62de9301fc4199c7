// Core matching exports
pub mod error;
pub mod filters;
pub mod grants;
pub mod matcher;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{MatchError, MatchResult};
pub use filters::{age_in_range, gender_matches, interests_overlap, region_matches};
pub use grants::{ensure_party, AccessGrantCoordinator};
pub use matcher::{encoded_match, match_predicate, Matcher};
pub use service::{MatchService, ServiceStats, VERSION};
pub use store::AttributeStore;

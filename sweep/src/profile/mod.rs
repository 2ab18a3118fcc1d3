pub mod fetcher;
pub mod sanitize;
pub mod types;

pub use fetcher::{BatchProfileFetcher, CancelFlag, ProfileLookup, fetch_detailed_profiles};
pub use sanitize::sanitize;
pub use types::{BatchResult, DetailedProfile, ProfileView, ViewerState};

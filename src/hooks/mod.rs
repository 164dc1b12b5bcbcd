//! Per-screen state: each hook owns an in-memory copy of remote data for the
//! lifetime of one screen instance.

pub mod bookmarks;
pub mod edit_profile;
pub mod posts;
pub mod profile;
pub mod toggle;

pub use bookmarks::{category_universe, filter_by_category, SavedLooks};
pub use edit_profile::{EditProfileForm, SaveOutcome};
pub use posts::{LoadState, PostCollection};
pub use profile::{HairProfileCard, ProfileHeader, ProfileTarget};
pub use toggle::{BookmarkToggle, FollowToggle, LikeToggle, Toggle};

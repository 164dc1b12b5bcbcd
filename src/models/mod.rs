pub mod bookmark;
pub mod follow;
pub mod post;
pub mod profile;
pub mod response;
pub mod session;

// 重新导出常用类型
pub use bookmark::Bookmark;
pub use follow::{Follow, FollowCounts};
pub use post::{NewPost, Post, PostAuthor, PostMedia, PostUpdate, StylistRef};
pub use profile::{HairProfile, HairProfileUpdate, Profile, ProfileUpdate};
pub use response::{ErrorInfo, MutationOutcome};
pub use session::{AuthUser, Session};

//! Business logic services.

#![allow(missing_docs)]

pub mod following;
pub mod post;
pub mod profile;
pub mod user;
pub mod visibility;

pub use following::{FollowerEntry, FollowingEntry, FollowingService};
pub use post::{
    ALLOWED_CONTENT_TYPES, AttachmentUpload, CreatePostInput, FeedQuery, PostService,
    PostWithAttachments, sniff_image_type,
};
pub use profile::{ProfileService, UserDetail};
pub use user::{LoginInput, RegisterInput, UpdateProfileInput, UserService};
pub use visibility::{FeedScope, FollowStatus, VisibilityService, can_view_content};

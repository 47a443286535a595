//! Database repositories.

pub mod following;
pub mod post;
pub mod user;

pub use following::{EdgeInsert, FollowingRepository};
pub use post::PostRepository;
pub use user::{ProfileChanges, ProfileUpdate, UserRepository};

//! Database entities.

#![allow(missing_docs)]

pub mod following;
pub mod post;
pub mod post_attachment;
pub mod user;

pub use following::Entity as Following;
pub use post::Entity as Post;
pub use post_attachment::Entity as PostAttachment;
pub use user::Entity as User;

//! Display user and video management.

pub mod users;
pub mod videos;

pub use users::{create_user, delete_user, is_valid_username, list_users, validate_new_user, UserDeletion};
pub use videos::{delete_video, list_videos, upload_video, UploadedVideo};

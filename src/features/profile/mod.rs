pub mod handler;
pub mod models;
pub mod store;

pub use handler::create_profile_router;
pub use models::{NewProfile, ProfilePageResponse, StudentProfile};
pub use store::{ProfileStore, SqliteProfileStore};

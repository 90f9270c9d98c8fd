pub mod client;
pub mod server_info;
pub mod user;
pub mod version;

pub use client::{normalize_base_url, ServerApi};
pub use server_info::ServerInfoRepo;
pub use user::UserProfile;
pub use version::{ApiVersion, VersionResponse};

use serde::Deserialize;

pub const USER_SELF_PATH: &str = "/api/users/self";

/// Subset of `GET /api/users/self`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    pub group: Option<String>,
    pub household: Option<String>,
}

//! Thin client for the campus identity service.
//!
//! Identity is an external collaborator: this server only ever asks it who a user is, for
//! notification addressing and display names. The directory is advisory, so every failure mode
//! degrades to `None` (or a generic display name) rather than failing the calling flow.
use std::time::Duration;

use log::*;
use reqwest::Client;
use serde::Deserialize;

const IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub display_name: String,
    pub is_verified: bool,
}

#[derive(Clone)]
pub struct IdentityApi {
    client: Client,
    base_url: Option<String>,
}

impl IdentityApi {
    pub fn new(base_url: Option<String>) -> Self {
        Self { client: Client::new(), base_url }
    }

    /// Resolve a user id. Returns `None` when the service is unconfigured, unreachable, or does
    /// not know the user.
    pub async fn lookup(&self, user_id: i64) -> Option<UserProfile> {
        let base = self.base_url.as_ref()?;
        let url = format!("{base}/users/{user_id}");
        match self.client.get(&url).timeout(IDENTITY_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<UserProfile>().await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    debug!("🎓️ Could not parse identity response for user {user_id}: {e}");
                    None
                },
            },
            Ok(resp) => {
                debug!("🎓️ Identity service returned {} for user {user_id}", resp.status());
                None
            },
            Err(e) => {
                debug!("🎓️ Identity service unreachable: {e}");
                None
            },
        }
    }

    pub async fn display_name(&self, user_id: i64) -> String {
        self.lookup(user_id).await.map(|p| p.display_name).unwrap_or_else(|| format!("user {user_id}"))
    }
}

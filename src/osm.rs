//! Live editor profile from the public OpenStreetMap API.
//!
//! Bypasses the agent entirely: a changeset id leads to its owner, whose
//! public profile provides the account creation date and changeset count.
//! Everything else the profile display expects is not exposed publicly, so it
//! is filled with randomized placeholders and listed in
//! [`UserProfile::illustrative_fields`].
//!
//! | Method | Path |
//! |--------|------|
//! | `GET` | `/api/0.6/changeset/{id}.json` |
//! | `GET` | `/api/0.6/user/{id}.json` |

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{GenieError, Result};
use crate::shape::{ShapedResponse, ShapedResult, UserProfile, VandalismIndicators};

/// Profile fields that are placeholders, not values read from the API.
pub const ILLUSTRATIVE_FIELDS: &[&str] = &[
    "total_edits",
    "countries_edited",
    "preferred_tools",
    "avg_changes_per_changeset",
    "received_messages",
    "blocks_received",
    "block_history",
    "community_reports",
    "organized_editing",
    "vandalism_indicators",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ChangesetOwner {
    pub user_name: String,
    pub user_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublicUser {
    pub account_created: DateTime<Utc>,
    pub changeset_count: i64,
}

#[derive(Clone)]
pub struct OsmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsmClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("genie-harness/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "osm request");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenieError::Transport {
                status: Some(status.as_u16()),
                url,
                message: response.text().await.unwrap_or_default(),
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| GenieError::MalformedResponse(format!("invalid JSON from {}: {}", url, e)))
    }

    pub async fn changeset_owner(&self, changeset_id: &str) -> Result<ChangesetOwner> {
        let body = self
            .get_json(&format!("/api/0.6/changeset/{}.json", changeset_id))
            .await?;
        parse_changeset_owner(&body)
    }

    pub async fn public_user(&self, user_id: u64) -> Result<PublicUser> {
        let body = self.get_json(&format!("/api/0.6/user/{}.json", user_id)).await?;
        parse_public_user(&body)
    }

    /// Fetch changeset then owner, and assemble a profile response.
    pub async fn live_profile(&self, changeset_id: &str) -> Result<ShapedResponse> {
        let changeset_id = changeset_id.trim();
        if changeset_id.is_empty() || !changeset_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(GenieError::InvalidInput(format!(
                "changeset id must be numeric, got '{}'",
                changeset_id
            )));
        }
        let owner = self.changeset_owner(changeset_id).await?;
        let user = self.public_user(owner.user_id).await?;
        Ok(assemble_profile(
            changeset_id,
            &owner,
            &user,
            Utc::now(),
            &mut rand::thread_rng(),
        ))
    }
}

/// Accepts both `{"changeset": {...}}` and `{"elements": [{...}]}` bodies.
pub fn parse_changeset_owner(body: &Value) -> Result<ChangesetOwner> {
    let changeset = body
        .get("changeset")
        .filter(|c| c.is_object())
        .or_else(|| body.get("elements").and_then(|e| e.get(0)))
        .ok_or_else(|| GenieError::missing_key("changeset", "changeset response"))?;

    let user_id = changeset
        .get("uid")
        .and_then(Value::as_u64)
        .ok_or_else(|| GenieError::missing_key("uid", "changeset"))?;
    let user_name = changeset
        .get("user")
        .and_then(Value::as_str)
        .unwrap_or("N/A")
        .to_string();

    Ok(ChangesetOwner { user_name, user_id })
}

pub fn parse_public_user(body: &Value) -> Result<PublicUser> {
    let user = body
        .get("user")
        .ok_or_else(|| GenieError::missing_key("user", "user response"))?;
    let created = user
        .get("account_created")
        .and_then(Value::as_str)
        .ok_or_else(|| GenieError::missing_key("account_created", "user"))?;
    let account_created = DateTime::parse_from_rfc3339(created)
        .map_err(|e| {
            GenieError::MalformedResponse(format!("bad account_created '{}': {}", created, e))
        })?
        .with_timezone(&Utc);
    let changeset_count = user
        .get("changesets")
        .and_then(|c| c.get("count"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    Ok(PublicUser {
        account_created,
        changeset_count,
    })
}

pub fn assemble_profile<R: Rng>(
    changeset_id: &str,
    owner: &ChangesetOwner,
    user: &PublicUser,
    now: DateTime<Utc>,
    rng: &mut R,
) -> ShapedResponse {
    let mut profile = UserProfile::defaulted(json!(owner.user_id), &owner.user_name);
    profile.registration_date = user.account_created.format("%Y-%m-%d").to_string();
    profile.days_active = (now - user.account_created).num_days();
    profile.total_changesets = user.changeset_count;

    profile.total_edits = rng.gen_range(500..=5000);
    profile.countries_edited = vec!["Germany".to_string(), "Poland".to_string()];
    profile.avg_changes_per_changeset = Some((rng.gen_range(10.0..60.0_f64) * 10.0).round() / 10.0);
    profile.received_messages = rng.gen_range(0..=5);
    profile.community_reports = rng.gen_range(0..=10);
    profile.vandalism_indicators = VandalismIndicators {
        rapid_editing: rng.gen(),
        pattern_repetition: rng.gen(),
        ignores_community_feedback: rng.gen(),
    };
    profile.illustrative_fields = ILLUSTRATIVE_FIELDS.iter().map(|f| f.to_string()).collect();

    ShapedResponse {
        summary: format!(
            "Generated live profile for user '{}' from changeset '{}'",
            owner.user_name, changeset_id
        ),
        result: ShapedResult::UserProfile(profile),
        description: None,
        manifest: None,
    }
}

/// User-facing explanation of a failed live fetch.
pub fn describe_error(err: &GenieError) -> String {
    match err {
        GenieError::Transport {
            status: Some(status),
            ..
        } => format!(
            "Failed to fetch data from the OSM API (HTTP status {}). Please check the changeset ID; \
             it may not exist or may have been deleted.",
            status
        ),
        GenieError::MalformedResponse(detail) if detail.starts_with("invalid JSON") => {
            "Failed to parse the API response. The OSM API may have returned non-JSON data."
                .to_string()
        }
        GenieError::MalformedResponse(detail) => format!(
            "A required key was missing in the API data ({}). This might indicate an unusual user or changeset profile.",
            detail
        ),
        other => format!("An unexpected error occurred: {}", other),
    }
}

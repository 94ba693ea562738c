use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
/// Reddit never returns more than 100 children per listing page.
const PAGE_SIZE: usize = 100;
const COMMENT_LIMIT: usize = 500;
/// Reddit tokens live an hour; assumed when the response omits `expires_in`.
const DEFAULT_TOKEN_TTL: u64 = 3600;
/// Re-authenticate this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    /// Username and password for a script app. Without them the client
    /// falls back to an application-only token.
    pub login: Option<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub url: String,
    pub score: i64,
    pub created_utc: f64,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub selftext: String,
}

impl Submission {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis((self.created_utc * 1000.0) as i64).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopLevelComment {
    pub body: String,
    pub score: i64,
}

/// Source of ranked submissions and their direct replies.
#[async_trait]
pub trait ForumSource: Send + Sync {
    async fn hot(&self, community: &str, limit: usize) -> Result<Vec<Submission>>;
    async fn top_level_comments(&self, submission: &Submission) -> Result<Vec<TopLevelComment>>;
}

// ── Listing wire format ──

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// Keep `t3` children; returns the page plus the cursor for the next one.
fn parse_submissions(listing: Listing) -> Result<(Vec<Submission>, Option<String>)> {
    let subs = listing
        .data
        .children
        .into_iter()
        .filter(|t| t.kind == "t3")
        .map(|t| serde_json::from_value(t.data).context("malformed submission"))
        .collect::<Result<Vec<Submission>>>()?;
    Ok((subs, listing.data.after))
}

/// The comments endpoint returns `[submission listing, comment listing]`.
/// Only `t1` children of the second are top-level comments; `more` stubs are
/// dropped unexpanded and nested replies are never walked.
fn parse_top_level(listings: Vec<Listing>) -> Result<Vec<TopLevelComment>> {
    let Some(comments) = listings.into_iter().nth(1) else {
        bail!("comment listing missing from response");
    };
    comments
        .data
        .children
        .into_iter()
        .filter(|t| t.kind == "t1")
        .map(|t| serde_json::from_value(t.data).context("malformed comment"))
        .collect()
}

pub struct RedditClient {
    http: reqwest::Client,
    creds: RedditCredentials,
    auth_url: String,
    api_base: String,
    token: Mutex<AccessToken>,
}

impl RedditClient {
    pub async fn connect(creds: &RedditCredentials) -> Result<Self> {
        Self::connect_at(creds, AUTH_URL, API_BASE).await
    }

    pub async fn connect_at(creds: &RedditCredentials, auth_url: &str, api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&creds.user_agent)
            .build()?;
        let token = request_token(&http, creds, auth_url).await?;

        info!(
            grant = if creds.login.is_some() { "password" } else { "client_credentials" },
            "Authenticated with Reddit"
        );

        Ok(Self {
            http,
            creds: creds.clone(),
            auth_url: auth_url.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: Mutex::new(token),
        })
    }

    /// Current bearer token, re-authenticating once it is about to expire.
    async fn bearer(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if !token.is_fresh() {
            debug!("Access token expiring, re-authenticating");
            *token = request_token(&self.http, &self.creds, &self.auth_url).await?;
        }
        Ok(token.value.clone())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        let token = self.bearer().await?;
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned {}", url, status);
        }
        resp.json()
            .await
            .with_context(|| format!("Failed to decode {}", url))
    }
}

async fn request_token(http: &reqwest::Client, creds: &RedditCredentials, auth_url: &str) -> Result<AccessToken> {
    let form: Vec<(&str, &str)> = match &creds.login {
        Some((user, pass)) => vec![
            ("grant_type", "password"),
            ("username", user),
            ("password", pass),
        ],
        None => vec![("grant_type", "client_credentials")],
    };

    let resp = http
        .post(auth_url)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&form)
        .send()
        .await
        .context("Failed to request Reddit access token")?;
    let status = resp.status();
    if !status.is_success() {
        bail!("Reddit token endpoint returned {}", status);
    }

    // Bad passwords come back as 200 with an `error` field.
    let token: TokenResponse = resp.json().await.context("Malformed token response")?;
    let value = match (token.access_token, token.error) {
        (Some(t), _) => t,
        (None, Some(e)) => bail!("Reddit rejected credentials: {}", e),
        (None, None) => bail!("Reddit token response had no access_token"),
    };
    let ttl = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL));

    Ok(AccessToken {
        value,
        expires_at: Instant::now() + ttl,
    })
}

#[async_trait]
impl ForumSource for RedditClient {
    async fn hot(&self, community: &str, limit: usize) -> Result<Vec<Submission>> {
        let path = format!("/r/{}/hot", community);
        let mut out = Vec::new();
        let mut after: Option<String> = None;

        while out.len() < limit {
            let page = (limit - out.len()).min(PAGE_SIZE);
            let mut query = vec![("limit", page.to_string()), ("raw_json", "1".to_string())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let listing: Listing = self.get(&path, &query).await?;
            let (batch, next) = parse_submissions(listing)?;
            debug!("r/{}: page of {} submissions", community, batch.len());
            if batch.is_empty() {
                break;
            }
            out.extend(batch);
            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        out.truncate(limit);
        Ok(out)
    }

    async fn top_level_comments(&self, submission: &Submission) -> Result<Vec<TopLevelComment>> {
        let path = format!("/comments/{}", submission.id);
        let query = [
            ("depth", "1".to_string()),
            ("limit", COMMENT_LIMIT.to_string()),
            ("raw_json", "1".to_string()),
        ];
        let listings: Vec<Listing> = self.get(&path, &query).await?;
        parse_top_level(listings)
    }
}

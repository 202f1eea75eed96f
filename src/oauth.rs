//! GitHub and GitLab sign-in.

use crate::error::AppError;
use crate::global::{get_settings, OAuthClient};
use crate::orm::user_identities::{self, Provider};
use crate::orm::users;
use crate::user::unique_username;
use anyhow::{anyhow, Context};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use sea_orm::{entity::*, ConnectionTrait, QueryFilter, TransactionTrait};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_API_URL: &str = "https://api.github.com";
const CLIENT_UA: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Cookie session key holding the pending `state` value.
pub const STATE_KEY: &str = "oauth_state";

/// What we keep from a provider's user endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

pub fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

/// Where to send the browser to start sign-in.
pub fn authorize_url(
    provider: Provider,
    client: &OAuthClient,
    state: &str,
    gitlab_url: &str,
) -> Result<Url, url::ParseError> {
    match provider {
        Provider::Github => Url::parse_with_params(
            GITHUB_AUTHORIZE_URL,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("scope", "read:user user:email"),
                ("state", state),
            ],
        ),
        Provider::Gitlab => Url::parse_with_params(
            &format!("{}/oauth/authorize", gitlab_url),
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "read_user"),
                ("state", state),
            ],
        ),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Deserialize)]
struct GitlabUser {
    id: u64,
    username: String,
    email: Option<String>,
    avatar_url: Option<String>,
}

fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("building HTTP client")
}

/// Exchanges the callback `code` for a token and reads the user's profile.
pub async fn fetch_profile(
    provider: Provider,
    client: &OAuthClient,
    code: &str,
) -> anyhow::Result<ProviderProfile> {
    let http = http_client()?;
    let gitlab_url = &get_settings().gitlab_url;

    let token_url = match provider {
        Provider::Github => GITHUB_TOKEN_URL.to_owned(),
        Provider::Gitlab => format!("{}/oauth/token", gitlab_url),
    };
    let token: TokenResponse = http
        .post(&token_url)
        .header(ACCEPT, "application/json")
        .form(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .with_context(|| format!("{} token exchange", provider.as_slug()))?
        .json()
        .await
        .context("decoding token response")?;
    let access_token = token.access_token.ok_or_else(|| {
        anyhow!(
            "{} refused the code: {}",
            provider.as_slug(),
            token.error_description.unwrap_or_default()
        )
    })?;

    match provider {
        Provider::Github => {
            let user: GithubUser = http
                .get(format!("{}/user", GITHUB_API_URL))
                .bearer_auth(&access_token)
                .header(USER_AGENT, CLIENT_UA)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("decoding GitHub user")?;

            let email = match user.email {
                Some(email) => Some(email),
                None => {
                    let emails: Vec<GithubEmail> = http
                        .get(format!("{}/user/emails", GITHUB_API_URL))
                        .bearer_auth(&access_token)
                        .header(USER_AGENT, CLIENT_UA)
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await
                        .context("decoding GitHub emails")?;
                    emails
                        .into_iter()
                        .find(|e| e.primary && e.verified)
                        .map(|e| e.email)
                }
            };

            Ok(ProviderProfile {
                provider_id: user.id.to_string(),
                nickname: user.login,
                email,
                avatar_url: user.avatar_url,
            })
        }
        Provider::Gitlab => {
            let user: GitlabUser = http
                .get(format!("{}/api/v4/user", gitlab_url))
                .bearer_auth(&access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("decoding GitLab user")?;

            Ok(ProviderProfile {
                provider_id: user.id.to_string(),
                nickname: user.username,
                email: user.email,
                avatar_url: user.avatar_url,
            })
        }
    }
}

/// Finds or creates the local user for a provider profile.
///
/// An existing identity wins. Otherwise a user with the same email gets the
/// identity attached. Otherwise a new user is created with a username derived
/// from the nickname.
pub async fn link_identity<C>(
    db: &C,
    provider: Provider,
    profile: &ProviderProfile,
) -> Result<users::Model, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let identity = user_identities::Entity::find()
        .filter(user_identities::Column::Provider.eq(provider))
        .filter(user_identities::Column::ProviderId.eq(profile.provider_id.as_str()))
        .one(&txn)
        .await?;
    if let Some(identity) = identity {
        let user = users::Entity::find_by_id(identity.user_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        txn.commit().await?;
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase);
    let by_email = match &email {
        Some(email) => {
            users::Entity::find()
                .filter(users::Column::Email.eq(email.as_str()))
                .one(&txn)
                .await?
        }
        None => None,
    };

    let now = Utc::now().naive_utc();
    let user = match by_email {
        Some(user) => user,
        None => {
            let name = unique_username(&txn, &profile.nickname).await?;
            users::ActiveModel {
                name: Set(name),
                email: Set(email),
                password: Set(None),
                avatar_url: Set(profile.avatar_url.clone()),
                is_admin: Set(false),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    user_identities::ActiveModel {
        user_id: Set(user.id),
        provider: Set(provider),
        provider_id: Set(profile.provider_id.to_owned()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    log::info!(
        "linked {} identity {} to user {}",
        provider.as_slug(),
        profile.provider_id,
        user.id
    );
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient {
            client_id: "abc".to_owned(),
            client_secret: "secret".to_owned(),
            redirect_uri: "http://localhost:8080/auth/github/callback".to_owned(),
        }
    }

    #[test]
    fn test_state_is_random() {
        let a = new_state();
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, new_state());
    }

    #[test]
    fn test_authorize_urls() {
        let url = authorize_url(Provider::Github, &client(), "xyz", "https://gitlab.com").unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".to_owned(), "xyz".to_owned())));
        assert!(pairs.contains(&(
            "redirect_uri".to_owned(),
            "http://localhost:8080/auth/github/callback".to_owned()
        )));

        let url = authorize_url(Provider::Gitlab, &client(), "xyz", "https://git.example.org").unwrap();
        assert!(url.as_str().starts_with("https://git.example.org/oauth/authorize?"));
        assert!(url.query_pairs().any(|(k, v)| k == "response_type" && v == "code"));
    }
}

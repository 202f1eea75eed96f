use crate::orm::user_identities::Provider;
use once_cell::sync::OnceCell;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Client credentials for one OAuth provider.
#[derive(Clone, Debug)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Process-wide settings read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_address: String,
    /// Cookie signing key material. Must be at least 64 bytes.
    pub secret_key: Option<String>,
    pub session_time: chrono::Duration,
    pub per_page: u64,
    /// Create missing tables on boot.
    pub auto_migrate: bool,
    pub github: Option<OAuthClient>,
    pub gitlab: Option<OAuthClient>,
    /// Base URL of the GitLab instance, without trailing slash.
    pub gitlab_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_owned(),
            secret_key: None,
            session_time: chrono::Duration::minutes(60 * 24 * 30),
            per_page: 24,
            auto_migrate: false,
            github: None,
            gitlab: None,
            gitlab_url: "https://gitlab.com".to_owned(),
        }
    }
}

impl Settings {
    /// Reads settings from environment variables, falling back to defaults.
    /// Panics on values that are present but malformed.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_time = match std::env::var("SESSION_TIME") {
            Ok(time) => {
                let time = time
                    .parse::<i64>()
                    .expect("SESSION_TIME cannot be parsed as an integer");
                if time < 0 {
                    panic!("SESSION_TIME is a negative number!");
                }
                chrono::Duration::minutes(time)
            }
            Err(_) => defaults.session_time,
        };

        let per_page = match std::env::var("PER_PAGE") {
            Ok(n) => match n.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => panic!("PER_PAGE must be a positive integer"),
            },
            Err(_) => defaults.per_page,
        };

        let secret_key = std::env::var("SECRET_KEY").ok();
        if let Some(key) = &secret_key {
            if key.len() < 64 {
                panic!("SECRET_KEY must be at least 64 bytes long");
            }
        }

        Self {
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            secret_key,
            session_time,
            per_page,
            auto_migrate: std::env::var("AUTO_MIGRATE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            github: oauth_client_from_env("GITHUB"),
            gitlab: oauth_client_from_env("GITLAB"),
            gitlab_url: std::env::var("GITLAB_URL")
                .map(|u| u.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.gitlab_url),
        }
    }

    pub fn oauth_client(&self, provider: Provider) -> Option<&OAuthClient> {
        match provider {
            Provider::Github => self.github.as_ref(),
            Provider::Gitlab => self.gitlab.as_ref(),
        }
    }
}

fn oauth_client_from_env(prefix: &str) -> Option<OAuthClient> {
    let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();
    Some(OAuthClient {
        client_id: var("CLIENT_ID")?,
        client_secret: var("CLIENT_SECRET")?,
        redirect_uri: var("REDIRECT_URI")?,
    })
}

/// Returns the settings, reading the environment on first use.
pub fn get_settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::from_env)
}

pub fn init() {
    if SETTINGS.set(Settings::from_env()).is_err() {
        log::warn!("global::init() called after settings were already read");
    }
}

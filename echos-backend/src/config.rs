use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use strum::{AsRefStr, EnumString};

use crate::twitter::oauth::TwitterCredentials;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const ECHOS_HOME_DIRECTORY: &str = "ECHOS_HOME_DIRECTORY";
    pub const AGENT_NAME: &str = "AGENT_NAME";
    // Reply thresholds (0-10)
    pub const RESPONSE_RATING_THRESHOLD_MENTIONS: &str = "RESPONSE_RATING_THRESHOLD_MENTIONS";
    pub const RESPONSE_RATING_THRESHOLD_FOLLOWERS: &str = "RESPONSE_RATING_THRESHOLD_FOLLOWERS";
    pub const MEME_RATING_THRESHOLD: &str = "MEME_RATING_THRESHOLD";
    // Scheduler
    pub const REPLY_GUY_INTERVAL_SECS: &str = "REPLY_GUY_INTERVAL_SECS";
    pub const FOLLOWERS_START_DELAY_SECS: &str = "FOLLOWERS_START_DELAY_SECS";
    pub const REPLY_GUY_MODE: &str = "REPLY_GUY_MODE";
    // Twitter OAuth 1.0a
    pub const TWITTER_CONSUMER_KEY: &str = "TWITTER_CONSUMER_KEY";
    pub const TWITTER_CONSUMER_SECRET: &str = "TWITTER_CONSUMER_SECRET";
    pub const TWITTER_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
    pub const TWITTER_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
    // Response generator
    pub const LLM_API_ENDPOINT: &str = "LLM_API_ENDPOINT";
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    pub const LLM_MODEL: &str = "LLM_MODEL";
    // Meme generator
    pub const IMGFLIP_USERNAME: &str = "IMGFLIP_USERNAME";
    pub const IMGFLIP_PASSWORD: &str = "IMGFLIP_PASSWORD";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/echos.db";
    pub const ECHOS_HOME_DIRECTORY: &str = "~/.echos";
    pub const RESPONSE_RATING_THRESHOLD_MENTIONS: u8 = 5;
    pub const RESPONSE_RATING_THRESHOLD_FOLLOWERS: u8 = 7;
    pub const MEME_RATING_THRESHOLD: u8 = 9;
    pub const REPLY_GUY_INTERVAL_SECS: u64 = 60;
    /// Lower bound on the cycle interval (rate limit protection)
    pub const MIN_REPLY_GUY_INTERVAL_SECS: u64 = 30;
    pub const FOLLOWERS_START_DELAY_SECS: u64 = 30;
}

/// Minimum ratings a generated response needs before it is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyThresholds {
    pub mentions: u8,
    pub followers: u8,
    pub meme: u8,
}

impl Default for ReplyThresholds {
    fn default() -> Self {
        Self {
            mentions: defaults::RESPONSE_RATING_THRESHOLD_MENTIONS,
            followers: defaults::RESPONSE_RATING_THRESHOLD_FOLLOWERS,
            meme: defaults::MEME_RATING_THRESHOLD,
        }
    }
}

/// Which cycles the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReplyGuyMode {
    All,
    Mentions,
    Followers,
}

impl ReplyGuyMode {
    pub fn runs_mentions(&self) -> bool {
        matches!(self, ReplyGuyMode::All | ReplyGuyMode::Mentions)
    }

    pub fn runs_followers(&self) -> bool {
        matches!(self, ReplyGuyMode::All | ReplyGuyMode::Followers)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub echos_home: PathBuf,
    pub agent_name: Option<String>,
    pub thresholds: ReplyThresholds,
    pub interval_secs: u64,
    pub followers_start_delay_secs: u64,
    pub mode: ReplyGuyMode,
    pub twitter_credentials: Option<TwitterCredentials>,
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub imgflip_username: Option<String>,
    pub imgflip_password: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match non_empty_var(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Invalid value '{}' for {}, using default", raw, name);
            default
        }),
        None => default,
    }
}

/// Ratings live on a 0-10 scale.
fn parse_threshold(raw: Option<String>, default: u8) -> u8 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .map(|v| v.clamp(0, 10) as u8)
        .unwrap_or(default)
}

/// Expand a leading `~` using `HOME`.
fn expand_home(path: &str, home: Option<String>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

impl Config {
    pub fn from_env() -> Self {
        let echos_home = expand_home(
            &non_empty_var(env_vars::ECHOS_HOME_DIRECTORY)
                .unwrap_or_else(|| defaults::ECHOS_HOME_DIRECTORY.to_string()),
            env::var("HOME").ok(),
        );

        let mode = non_empty_var(env_vars::REPLY_GUY_MODE)
            .map(|raw| {
                ReplyGuyMode::from_str(&raw).unwrap_or_else(|_| {
                    log::warn!("Unknown {} '{}', running all cycles", env_vars::REPLY_GUY_MODE, raw);
                    ReplyGuyMode::All
                })
            })
            .unwrap_or(ReplyGuyMode::All);

        let twitter_credentials = match (
            non_empty_var(env_vars::TWITTER_CONSUMER_KEY),
            non_empty_var(env_vars::TWITTER_CONSUMER_SECRET),
            non_empty_var(env_vars::TWITTER_ACCESS_TOKEN),
            non_empty_var(env_vars::TWITTER_ACCESS_TOKEN_SECRET),
        ) {
            (Some(ck), Some(cs), Some(at), Some(ats)) => Some(TwitterCredentials::new(ck, cs, at, ats)),
            _ => None,
        };

        Self {
            port: parse_var(env_vars::PORT, defaults::PORT),
            database_url: non_empty_var(env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            echos_home,
            agent_name: non_empty_var(env_vars::AGENT_NAME),
            thresholds: ReplyThresholds {
                mentions: parse_threshold(
                    non_empty_var(env_vars::RESPONSE_RATING_THRESHOLD_MENTIONS),
                    defaults::RESPONSE_RATING_THRESHOLD_MENTIONS,
                ),
                followers: parse_threshold(
                    non_empty_var(env_vars::RESPONSE_RATING_THRESHOLD_FOLLOWERS),
                    defaults::RESPONSE_RATING_THRESHOLD_FOLLOWERS,
                ),
                meme: parse_threshold(
                    non_empty_var(env_vars::MEME_RATING_THRESHOLD),
                    defaults::MEME_RATING_THRESHOLD,
                ),
            },
            interval_secs: parse_var(env_vars::REPLY_GUY_INTERVAL_SECS, defaults::REPLY_GUY_INTERVAL_SECS)
                .max(defaults::MIN_REPLY_GUY_INTERVAL_SECS),
            followers_start_delay_secs: parse_var(
                env_vars::FOLLOWERS_START_DELAY_SECS,
                defaults::FOLLOWERS_START_DELAY_SECS,
            ),
            mode,
            twitter_credentials,
            llm_endpoint: non_empty_var(env_vars::LLM_API_ENDPOINT),
            llm_api_key: non_empty_var(env_vars::LLM_API_KEY),
            llm_model: non_empty_var(env_vars::LLM_MODEL),
            imgflip_username: non_empty_var(env_vars::IMGFLIP_USERNAME),
            imgflip_password: non_empty_var(env_vars::IMGFLIP_PASSWORD),
        }
    }

    /// `<home>/<agent>.toml`
    pub fn profile_path(&self) -> Result<PathBuf, String> {
        let agent = self
            .agent_name
            .as_deref()
            .ok_or_else(|| format!("{} is not set", env_vars::AGENT_NAME))?;
        Ok(self.echos_home.join(format!("{}.toml", agent)))
    }
}

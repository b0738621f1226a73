use std::{env, fs, path::Path, path::PathBuf};

use anyhow::Context;
use reqwest::Url;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "harvester.toml";
pub const SESSION_ID_ENV: &str = "HARVESTER_JSESSIONID";
pub const SERAPH_TOKEN_ENV: &str = "HARVESTER_SERAPH_TOKEN";

const DEFAULT_BASE_URL: &str = "http://localhost:8090";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
const DEFAULT_WORDLIST: &str = "wordlist.txt";
const DEFAULT_OUTPUT_DIR: &str = "confluence_pdfs";

#[derive(Builder, Debug, Clone, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct HarvesterOptions {
    // server the search api and pages are served from
    #[builder(default = "DEFAULT_BASE_URL.into()")]
    pub base_url: String,
    // JSESSIONID cookie
    #[builder(default)]
    pub session_id: String,
    // seraph.confluence cookie
    #[builder(default)]
    pub seraph_token: String,
    #[builder(default = "DEFAULT_USER_AGENT.into()")]
    pub user_agent: String,
    // results per search page
    #[builder(default = "100")]
    pub limit: u32,
    #[builder(default = "DEFAULT_WORDLIST.into()")]
    pub wordlist_path: PathBuf,
    #[builder(default = "DEFAULT_OUTPUT_DIR.into()")]
    pub output_dir: PathBuf,
    // pause between two search pages in milliseconds
    #[builder(default = "500")]
    pub page_delay_ms: u64,
    #[builder(default = "10")]
    pub connect_timeout_secs: u64,
    #[builder(default = "60")]
    pub request_timeout_secs: u64,
    // maximum time the browser will idle before timing out
    #[builder(default = "45")]
    pub browser_timeout_secs: u64,
    // skip TLS certificate verification (http client and browser)
    #[builder(default = "true")]
    pub accept_invalid_certs: bool,
}

impl Default for HarvesterOptions {
    fn default() -> Self {
        HarvesterOptions {
            base_url: DEFAULT_BASE_URL.into(),
            session_id: String::new(),
            seraph_token: String::new(),
            user_agent: DEFAULT_USER_AGENT.into(),
            limit: 100,
            wordlist_path: DEFAULT_WORDLIST.into(),
            output_dir: DEFAULT_OUTPUT_DIR.into(),
            page_delay_ms: 500,
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            browser_timeout_secs: 45,
            accept_invalid_certs: true,
        }
    }
}

impl HarvesterOptions {
    pub fn default_builder() -> HarvesterOptionsBuilder {
        HarvesterOptionsBuilder::default()
    }

    /// Reads options from a TOML file. `explicit` tells whether the user
    /// named the file; a missing default file just yields the defaults.
    pub fn load(path: &Path, explicit: bool) -> anyhow::Result<Self> {
        if !path.exists() {
            if explicit {
                anyhow::bail!("config file {:?} does not exist", path);
            }
            debug!("no config file at {:?}, using defaults", path);
            return Ok(HarvesterOptions::default());
        }
        let data =
            fs::read_to_string(path).context(format!("could not read config file {:?}", path))?;
        let options: HarvesterOptions =
            toml::from_str(&data).context(format!("could not parse config file {:?}", path))?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects settings the run cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limit == 0 {
            anyhow::bail!("limit must be at least 1");
        }
        Ok(())
    }

    /// Session cookies from the environment win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var(SESSION_ID_ENV) {
            self.session_id = v;
        }
        if let Ok(v) = env::var(SERAPH_TOKEN_ENV) {
            self.seraph_token = v;
        }
    }

    pub fn parsed_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.base_url).context(format!("base url is invalid {}", self.base_url))
    }

    /// Session cookies that have a value, as name/value pairs.
    pub fn session_cookies(&self) -> Vec<(&'static str, String)> {
        [
            ("JSESSIONID", &self.session_id),
            ("seraph.confluence", &self.seraph_token),
        ]
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (*k, v.to_string()))
        .collect()
    }

    /// Value for the `Cookie` header, `None` when no session cookie is set.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self
            .session_cookies()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<String>>();

        if cookies.is_empty() {
            None
        } else {
            Some(cookies.join("; "))
        }
    }

    pub fn attachments_dir(&self, sanitized_title: &str) -> PathBuf {
        self.output_dir
            .join(crate::utils::ATTACHMENTS_DIR)
            .join(sanitized_title)
    }
}

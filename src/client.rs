use std::time::Duration;

use reqwest::{
    blocking::{Client, Response},
    header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT},
    Url,
};

use crate::{config::HarvesterOptions, types::HarvestError};

/// Authenticated session shared by every stage of a run.
pub struct WikiClient {
    client: Client,
    base_url: Url,
}

impl WikiClient {
    pub fn new(options: &HarvesterOptions) -> anyhow::Result<Self> {
        let base_url = options.parsed_base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&options.user_agent)?);
        if let Some(cookie) = options.cookie_header() {
            let mut value = HeaderValue::from_str(&cookie)?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        } else {
            warn!("no session cookies configured, requests will be anonymous");
        }

        if options.accept_invalid_certs {
            warn!(
                "TLS certificate verification is DISABLED for {} (accept_invalid_certs = true)",
                base_url
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .build()?;

        Ok(WikiClient { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// GET that only hands back successful responses.
    pub fn get(&self, url: &str) -> Result<Response, HarvestError> {
        let res = self
            .client
            .get(url)
            .send()
            .map_err(|source| HarvestError::Transport {
                url: url.into(),
                source,
            })?;
        Self::check_status(url, res)
    }

    pub fn check_status(url: &str, res: Response) -> Result<Response, HarvestError> {
        if !res.status().is_success() {
            return Err(HarvestError::Status {
                url: url.into(),
                status: res.status(),
            });
        }
        Ok(res)
    }
}

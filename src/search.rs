use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};

use serde::Deserialize;

use crate::{
    client::WikiClient,
    types::{HarvestError, SearchResult},
    utils::{preview, resolve_url, sanitize_title, SEARCH_PATH, UNKNOWN_TITLE},
};

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub content: Option<SearchContent>,
}

#[derive(Debug, Deserialize)]
pub struct SearchContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: Option<ContentLinks>,
}

#[derive(Debug, Deserialize)]
pub struct ContentLinks {
    #[serde(default)]
    pub webui: Option<String>,
}

/// CQL matching `term` anywhere in indexed content, user profiles excluded.
pub fn build_cql(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('"', "\\\"");
    format!(r#"siteSearch ~ "{}" AND type NOT IN ("user")"#, escaped)
}

pub struct SearchClient<'a> {
    client: &'a WikiClient,
    limit: u32,
    page_delay: Duration,
    should_terminate: Arc<AtomicBool>,
}

impl<'a> SearchClient<'a> {
    pub fn new(
        client: &'a WikiClient,
        limit: u32,
        page_delay: Duration,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        SearchClient {
            client,
            limit,
            page_delay,
            should_terminate,
        }
    }

    /// Every page found for `term`. Errors end the pagination early and are
    /// only logged.
    pub fn search(&self, term: &str) -> Vec<SearchResult> {
        let cql = build_cql(term);
        let mut start: u64 = 0;
        let mut found = vec![];

        while !self.should_terminate.load(Ordering::Relaxed) {
            let page = match self.fetch_page(&cql, start) {
                Ok(p) => p,
                Err(HarvestError::MalformedBody { reason, preview, .. }) => {
                    warn!("JSON parse error for word '{}': {}", term, reason);
                    warn!("server response: {}", preview);
                    break;
                }
                Err(HarvestError::Status { status, .. }) => {
                    warn!("[HTTP {}] CQL query error for word '{}'", status.as_u16(), term);
                    break;
                }
                Err(e) => {
                    warn!("connection error while searching for '{}': {}", term, e);
                    break;
                }
            };

            if page.results.is_empty() {
                break;
            }

            found.extend(self.collect_results(page));

            start += self.limit as u64;
            sleep(self.page_delay);
        }

        found
    }

    fn fetch_page(&self, cql: &str, start: u64) -> Result<SearchResponse, HarvestError> {
        let url = format!(
            "{}{}",
            self.client.base_url().as_str().trim_end_matches('/'),
            SEARCH_PATH
        );
        debug!("GET {} start={} limit={} cql={}", url, start, self.limit, cql);

        let res = self
            .client
            .http()
            .get(&url)
            .query(&[
                ("cql", cql.to_string()),
                ("start", start.to_string()),
                ("limit", self.limit.to_string()),
                ("excerpt", "highlight".to_string()),
                ("includeArchivedSpaces", "true".to_string()),
            ])
            .send()
            .map_err(|source| HarvestError::Transport {
                url: url.clone(),
                source,
            })?;
        let res = WikiClient::check_status(&url, res)?;

        let body = res.text().map_err(|source| HarvestError::Transport {
            url: url.clone(),
            source,
        })?;

        serde_json::from_str::<SearchResponse>(&body).map_err(|e| HarvestError::MalformedBody {
            url,
            reason: e.to_string(),
            preview: preview(&body),
        })
    }

    fn collect_results(&self, page: SearchResponse) -> Vec<SearchResult> {
        page.results
            .into_iter()
            .filter_map(|hit| {
                let content = hit.content?;
                let webui = content.links.and_then(|l| l.webui).unwrap_or_default();
                if webui.is_empty() {
                    return None;
                }
                let title = sanitize_title(content.title.as_deref().unwrap_or(UNKNOWN_TITLE));
                let url = match resolve_url(self.client.base_url(), &webui) {
                    Some(u) => u.to_string(),
                    None => {
                        warn!("could not resolve webui path {}", webui);
                        return None;
                    }
                };
                info!("found page: {} (title: '{}')", url, title);
                Some(SearchResult { url, title })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cql_excludes_user_profiles() {
        assert_eq!(
            build_cql("password"),
            r#"siteSearch ~ "password" AND type NOT IN ("user")"#
        );
    }

    #[test]
    fn cql_escapes_quotes() {
        assert_eq!(
            build_cql(r#"say "hi""#),
            r#"siteSearch ~ "say \"hi\"" AND type NOT IN ("user")"#
        );
    }

    #[test]
    fn parses_search_response_with_missing_fields() {
        let body = r#"{
            "results": [
                {"content": {"title": "Runbook", "_links": {"webui": "/pages/view/1?x=1"}}},
                {"content": {"_links": {"webui": "/pages/view/2"}}},
                {"content": {"title": "No link"}},
                {"user": {"username": "bob"}}
            ],
            "totalSize": 4
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 4);
        assert!(parsed.results[3].content.is_none());
    }

    #[test]
    fn missing_results_is_an_empty_page() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }
}

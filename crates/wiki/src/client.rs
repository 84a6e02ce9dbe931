use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use wb_domain::config::WikiConfig;
use wb_domain::error::{Error, Result};
use wb_domain::model::WikiPage;

use crate::anonymize::anonymize;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches and anonymizes Wikipedia pages via the MediaWiki API.
///
/// Pages are cached for the lifetime of the process, keyed by title — the
/// same start/target pair is requested by every model in a run's roster, so
/// the cache turns N network round trips into 1.
pub struct WikiSource {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, WikiPage>>,
}

impl WikiSource {
    pub fn from_config(config: &WikiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch and anonymize a page, consulting the process-wide cache first.
    ///
    /// Returns [`Error::PageNotFound`] when the MediaWiki API reports the
    /// title missing — the orchestrator treats that as a routine, recoverable
    /// event rather than a run-ending failure.
    pub async fn fetch_page(&self, title: &str) -> Result<WikiPage> {
        if let Some(page) = self.cache.lock().get(title).cloned() {
            tracing::debug!(title = %title, "wiki page cache hit");
            return Ok(page);
        }

        tracing::info!(title = %title, "fetching wikipedia page");
        let extract = self.fetch_extract(title).await?;
        let links = self.fetch_all_links(title).await?;
        let (clean_extract, mapping) = anonymize(&extract, &links);

        let page = WikiPage {
            title: title.to_string(),
            extract: clean_extract,
            links,
            mapping,
        };

        self.cache.lock().insert(title.to_string(), page.clone());
        Ok(page)
    }

    async fn fetch_extract(&self, title: &str) -> Result<String> {
        let params = [
            ("action", "query"),
            ("format", "json"),
            ("prop", "extracts"),
            ("titles", title),
            ("explaintext", "1"),
            ("exsectionformat", "plain"),
        ];

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(from_reqwest)?;
        let data: Value = resp.json().await.map_err(from_reqwest)?;

        let pages = data
            .pointer("/query/pages")
            .and_then(|p| p.as_object())
            .ok_or_else(|| Error::Wiki(format!("malformed response for page: {title}")))?;

        let (page_id, page_data) = pages
            .iter()
            .next()
            .ok_or_else(|| Error::Wiki(format!("no pages returned for: {title}")))?;

        if page_id == "-1" || page_data.get("missing").is_some() {
            return Err(Error::PageNotFound(title.to_string()));
        }

        Ok(page_data
            .get("extract")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }

    async fn fetch_all_links(&self, title: &str) -> Result<Vec<String>> {
        let mut links = Vec::new();
        let mut continue_params: Vec<(String, String)> = Vec::new();

        loop {
            let mut params = vec![
                ("action".to_string(), "query".to_string()),
                ("format".to_string(), "json".to_string()),
                ("prop".to_string(), "links".to_string()),
                ("titles".to_string(), title.to_string()),
                ("pllimit".to_string(), "max".to_string()),
                ("plnamespace".to_string(), "0".to_string()),
            ];
            params.extend(continue_params.clone());

            let resp = self
                .client
                .get(&self.base_url)
                .query(&params)
                .send()
                .await
                .map_err(from_reqwest)?;
            let data: Value = resp.json().await.map_err(from_reqwest)?;

            let pages = match data.pointer("/query/pages").and_then(|p| p.as_object()) {
                Some(p) if !p.is_empty() => p,
                _ => break,
            };
            let (page_id, page_data) = pages.iter().next().unwrap();
            if page_id == "-1" || page_data.get("missing").is_some() {
                break;
            }

            if let Some(arr) = page_data.get("links").and_then(|l| l.as_array()) {
                for link in arr {
                    if let Some(t) = link.get("title").and_then(|v| v.as_str()) {
                        links.push(t.to_string());
                    }
                }
            }

            match data.get("continue").and_then(|c| c.as_object()) {
                Some(cont) => {
                    continue_params = cont
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect();
                }
                None => break,
            }
        }

        tracing::debug!(title = %title, count = links.len(), "fetched wiki links");
        Ok(links)
    }

    /// Validate a Wikipedia URL, returning the canonical title if the page exists.
    pub async fn validate_url(&self, url: &str) -> Result<String> {
        let title = parse_wikipedia_url(url)
            .ok_or_else(|| Error::Wiki(format!("not a wikipedia article URL: {url}")))?;
        self.fetch_page(&title).await?;
        Ok(title)
    }

    /// Fetch a random article title and its canonical URL.
    pub async fn random_page(&self) -> Result<(String, String)> {
        let params = [
            ("action", "query"),
            ("format", "json"),
            ("list", "random"),
            ("rnnamespace", "0"),
            ("rnlimit", "1"),
        ];
        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(from_reqwest)?;
        let data: Value = resp.json().await.map_err(from_reqwest)?;

        let title = data
            .pointer("/query/random/0/title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Wiki("malformed random-page response".into()))?
            .to_string();

        let url = title_to_url(&title);
        Ok((title, url))
    }
}

fn title_to_url(title: &str) -> String {
    format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))
}

/// Extract an article title from a `https://<lang>.wikipedia.org/wiki/<Title>` URL.
pub fn parse_wikipedia_url(url: &str) -> Option<String> {
    let idx = url.find("/wiki/")?;
    let raw_title = &url[idx + "/wiki/".len()..];
    let raw_title = raw_title.split(&['?', '#'][..]).next().unwrap_or(raw_title);
    if raw_title.is_empty() {
        return None;
    }
    let decoded = percent_decode(raw_title);
    Some(decoded.replace('_', " "))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_from_simple_url() {
        assert_eq!(
            parse_wikipedia_url("https://en.wikipedia.org/wiki/Rust_(programming_language)"),
            Some("Rust (programming language)".to_string())
        );
    }

    #[test]
    fn parses_title_with_query_string() {
        assert_eq!(
            parse_wikipedia_url("https://en.wikipedia.org/wiki/Rust?action=history"),
            Some("Rust".to_string())
        );
    }

    #[test]
    fn rejects_non_wiki_url() {
        assert_eq!(parse_wikipedia_url("https://example.com/"), None);
    }

    #[test]
    fn title_to_url_roundtrips_spaces() {
        assert_eq!(
            title_to_url("Rust (programming language)"),
            "https://en.wikipedia.org/wiki/Rust_(programming_language)"
        );
    }
}

use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::ProbeError;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared HTTP client used by every built-in probe.
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
}

#[derive(Debug, Clone)]
pub struct PageResponse {
    pub url: String,
    pub status: u16,
    /// Header names are lowercased; repeated headers are joined with ", ".
    pub headers: HashMap<String, String>,
    pub set_cookies: Vec<String>,
    pub body: String,
    pub duration_ms: u64,
}

impl PageResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(5))
            .danger_accept_invalid_certs(false)
            .build()?;

        let no_redirect = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            no_redirect,
        })
    }

    pub async fn get(&self, url: &str) -> Result<PageResponse, ProbeError> {
        self.execute(self.client.get(url), url).await
    }

    /// Issues a GET without following redirects, so 3xx responses are visible.
    pub async fn get_raw(&self, url: &str) -> Result<PageResponse, ProbeError> {
        self.execute(self.no_redirect.get(url), url).await
    }

    async fn execute(&self, request: RequestBuilder, url: &str) -> Result<PageResponse, ProbeError> {
        let start = Instant::now();
        let mut response = request.send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut headers: HashMap<String, String> = HashMap::new();
        let mut set_cookies = Vec::new();
        for (name, value) in response.headers() {
            let value = value.to_str().unwrap_or("").to_string();
            if name == reqwest::header::SET_COOKIE {
                set_cookies.push(value.clone());
            }
            headers
                .entry(name.as_str().to_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if append_capped(&mut bytes, &chunk, MAX_BODY_BYTES) {
                break;
            }
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(url, status, duration_ms, "fetched page");

        Ok(PageResponse {
            url: if final_url.is_empty() {
                url.to_string()
            } else {
                final_url
            },
            status,
            headers,
            set_cookies,
            body,
            duration_ms,
        })
    }
}

/// Appends as much of `chunk` as fits under `cap`. Returns true once the buffer is full.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let room = cap.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    buf.len() >= cap
}

#[cfg(test)]
pub(crate) fn page(status: u16, headers: &[(&str, &str)], body: &str) -> PageResponse {
    let mut map = HashMap::new();
    let mut set_cookies = Vec::new();
    for (k, v) in headers {
        if k.eq_ignore_ascii_case("set-cookie") {
            set_cookies.push(v.to_string());
        }
        map.insert(k.to_lowercase(), v.to_string());
    }
    PageResponse {
        url: "https://example.com/".to_string(),
        status,
        headers: map,
        set_cookies,
        body: body.to_string(),
        duration_ms: 1,
    }
}

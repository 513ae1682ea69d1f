//! Documentation crawler: sitemap → pages → [`Document`]s.
//!
//! Starts from `<base>/sitemap.xml` (or the URL itself when it already
//! names an `.xml` file), follows nested sitemap indexes breadth-first, and
//! fetches at most `docs.max_pages` pages. A page that fails to fetch or
//! parse is logged and skipped; only an unreachable root sitemap is an
//! error.

use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use repo_harness_core::models::{keys, Document, SourceType};

use crate::config::DocsConfig;

/// Upper bound on nested sitemaps followed from one root.
const MAX_SITEMAPS: usize = 50;

/// `<loc>` entries of one sitemap file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Sitemap {
    pub pages: Vec<String>,
    /// Children of a `<sitemapindex>`.
    pub sitemaps: Vec<String>,
}

pub fn sitemap_url(base: &str) -> String {
    if base.ends_with(".xml") {
        base.to_string()
    } else {
        format!("{}/sitemap.xml", base.trim_end_matches('/'))
    }
}

pub fn parse_sitemap(xml: &str) -> Result<Sitemap> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sitemap = Sitemap::default();
    let mut in_sitemap_entry = false;
    let mut in_loc = false;
    let mut loc = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap_entry = true,
                b"loc" => {
                    in_loc = true;
                    loc.clear();
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_loc => {
                loc.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::CData(cd)) if in_loc => {
                loc.push_str(&String::from_utf8_lossy(&cd));
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap_entry = false,
                b"loc" => {
                    in_loc = false;
                    let value = loc.trim().to_string();
                    if !value.is_empty() {
                        if in_sitemap_entry {
                            sitemap.sitemaps.push(value);
                        } else {
                            sitemap.pages.push(value);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!("Invalid sitemap XML: {}", e),
            _ => {}
        }
    }

    Ok(sitemap)
}

/// Page title and whitespace-collapsed `<body>` text.
pub fn extract_page(html: &str) -> (Option<String>, String) {
    let soup = scrape_core::Soup::parse(html);

    let title = soup
        .find_all("title")
        .ok()
        .and_then(|tags| tags.into_iter().next())
        .map(|t| collapse_whitespace(&t.text()))
        .filter(|t| !t.is_empty());

    let body = soup
        .find_all("body")
        .ok()
        .and_then(|tags| tags.into_iter().next())
        .map(|t| t.text())
        .unwrap_or_default();

    (title, collapse_whitespace(&body))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn same_host(candidate: &str, base: &Url) -> bool {
    Url::parse(candidate)
        .map(|u| u.host_str() == base.host_str())
        .unwrap_or(false)
}

pub struct DocsCrawler {
    client: reqwest::Client,
    config: DocsConfig,
}

impl DocsCrawler {
    pub fn new(config: &DocsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repo-harness/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GET {} returned {}", url, status);
        }
        Ok(response.text().await?)
    }

    /// Page URLs reachable from the root sitemap, capped at `max_pages`.
    pub async fn discover(&self, base: &str) -> Result<Vec<String>> {
        let base_url = Url::parse(base).with_context(|| format!("Invalid docs URL: {}", base))?;
        let root = sitemap_url(base);

        let mut queue = VecDeque::from([root.clone()]);
        let mut seen_sitemaps = HashSet::new();
        let mut seen_pages = HashSet::new();
        let mut pages = Vec::new();

        while let Some(sitemap_loc) = queue.pop_front() {
            if pages.len() >= self.config.max_pages || seen_sitemaps.len() >= MAX_SITEMAPS {
                break;
            }
            if !seen_sitemaps.insert(sitemap_loc.clone()) {
                continue;
            }

            let xml = match self.fetch_text(&sitemap_loc).await {
                Ok(xml) => xml,
                Err(e) if sitemap_loc == root => return Err(e),
                Err(e) => {
                    warn!(sitemap = %sitemap_loc, error = %e, "skipping nested sitemap");
                    continue;
                }
            };
            let parsed = match parse_sitemap(&xml) {
                Ok(parsed) => parsed,
                Err(e) if sitemap_loc == root => return Err(e),
                Err(e) => {
                    warn!(sitemap = %sitemap_loc, error = %e, "skipping nested sitemap");
                    continue;
                }
            };
            debug!(
                sitemap = %sitemap_loc,
                pages = parsed.pages.len(),
                nested = parsed.sitemaps.len(),
                "parsed sitemap"
            );

            for page in parsed.pages {
                if pages.len() >= self.config.max_pages {
                    break;
                }
                if self.config.restrict_domain && !same_host(&page, &base_url) {
                    continue;
                }
                if seen_pages.insert(page.clone()) {
                    pages.push(page);
                }
            }
            queue.extend(parsed.sitemaps);
        }

        Ok(pages)
    }

    /// Crawl `base` into one document per non-empty page.
    pub async fn crawl(&self, base: &str) -> Result<Vec<Document>> {
        let pages = self.discover(base).await?;
        info!(docs = base, pages = pages.len(), "crawling documentation");

        let mut documents = Vec::with_capacity(pages.len());
        for page in &pages {
            let html = match self.fetch_text(page).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %page, error = %e, "skipping page");
                    continue;
                }
            };
            let (title, text) = extract_page(&html);
            if text.is_empty() {
                debug!(url = %page, "skipping page without body text");
                continue;
            }
            let mut doc = Document::new(text, SourceType::Docs)
                .with(keys::DOCS_BASE, base)
                .with(keys::SOURCE, page.as_str());
            if let Some(title) = title {
                doc = doc.with(keys::TITLE, title);
            }
            documents.push(doc);
        }

        info!(docs = base, documents = documents.len(), "crawled documentation");
        Ok(documents)
    }
}

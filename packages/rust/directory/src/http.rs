//! Faculty directory scraper.
//!
//! Department pages are fetched one after another; profile pages are then
//! fetched with a semaphore-bounded worker pool. Every request to a host
//! waits for that host's minimum inter-request delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use outreach_shared::{CandidateRecord, DirectoryConfig, OutreachError, Result, RetryPolicy};

use crate::DirectorySource;
use crate::departments::department_code;
use crate::parse::{parse_department_listing, parse_index, parse_profile_page};

/// User-Agent string for directory requests.
const USER_AGENT: &str = concat!("outreach/", env!("CARGO_PKG_VERSION"));

/// Path of the faculty index listing every department.
const INDEX_PATH: &str = "faclistbydepartment";

// ---------------------------------------------------------------------------
// HostThrottle
// ---------------------------------------------------------------------------

/// Enforces a minimum delay between requests to the same host.
///
/// Each caller reserves the next free slot for its host under the lock and
/// sleeps outside it, so concurrent workers queue up instead of bursting.
#[derive(Debug)]
struct HostThrottle {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    async fn wait(&self, url: &Url) {
        if self.min_interval.is_zero() {
            return;
        }
        let host = url.host_str().unwrap_or_default().to_string();
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots
                .get(&host)
                .copied()
                .filter(|s| *s > now)
                .unwrap_or(now);
            slots.insert(host, slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

// ---------------------------------------------------------------------------
// HttpDirectorySource
// ---------------------------------------------------------------------------

/// Directory Source backed by the institute's faculty web pages.
#[derive(Debug, Clone)]
pub struct HttpDirectorySource {
    client: Client,
    base_url: Url,
    concurrency: usize,
    throttle: Arc<HostThrottle>,
    retry: RetryPolicy,
}

impl HttpDirectorySource {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            OutreachError::config(format!("invalid directory base_url '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OutreachError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            concurrency: config.concurrency.max(1) as usize,
            throttle: Arc::new(HostThrottle::new(Duration::from_millis(
                config.rate_limit_ms,
            ))),
            retry: RetryPolicy::default(),
        })
    }

    /// Retry policy for individual profile-page fetches.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn page_url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'));
        Url::parse(&raw).map_err(|e| OutreachError::parse(format!("{raw}: {e}")))
    }

    /// Resolve scope filters to department codes. `None` means "all".
    fn resolve_scopes(scopes: Option<&[String]>) -> Result<Option<Vec<&'static str>>> {
        let Some(scopes) = scopes.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let mut codes = Vec::new();
        for scope in scopes {
            match department_code(scope) {
                Some(code) if !codes.contains(&code) => codes.push(code),
                Some(_) => {}
                None => warn!(scope = %scope, "unknown department scope, ignoring"),
            }
        }

        if codes.is_empty() {
            return Err(OutreachError::validation(format!(
                "no known department among scopes {scopes:?}"
            )));
        }
        Ok(Some(codes))
    }

    async fn department_listing(&self, code: &str) -> Result<Vec<CandidateRecord>> {
        let url = self.page_url(&format!("department/{code}"))?;
        let html = fetch_html(&self.client, &self.throttle, &url).await?;
        let records = parse_department_listing(&html, &url, code);
        debug!(code, count = records.len(), "parsed department page");
        Ok(records)
    }

    async fn index_listing(&self) -> Result<Vec<CandidateRecord>> {
        let url = self.page_url(INDEX_PATH)?;
        let html = fetch_html(&self.client, &self.throttle, &url).await?;
        let records = parse_index(&html, &url);
        debug!(count = records.len(), "parsed faculty index");
        Ok(records)
    }

    /// Fetch every profile page and merge its fields into the listing record.
    ///
    /// A page that cannot be fetched leaves its record with listing fields only.
    async fn fill_profiles(&self, listing: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(listing.len());

        for record in &listing {
            let client = self.client.clone();
            let throttle = self.throttle.clone();
            let sem = semaphore.clone();
            let retry = self.retry;
            let profile_url = record.profile_url.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| OutreachError::unavailable(format!("worker pool closed: {e}")))?;
                let url = Url::parse(&profile_url)
                    .map_err(|e| OutreachError::parse(format!("{profile_url}: {e}")))?;
                let html = retry
                    .call("profile-page", || fetch_html(&client, &throttle, &url))
                    .await?;
                Ok::<_, OutreachError>(parse_profile_page(&html, &url))
            }));
        }

        let mut records = Vec::with_capacity(listing.len());
        for (mut record, handle) in listing.into_iter().zip(handles) {
            match handle.await {
                Ok(Ok(details)) => details.merge_into(&mut record),
                Ok(Err(e)) => {
                    warn!(url = %record.profile_url, error = %e, "profile page unavailable, keeping listing fields");
                }
                Err(e) => {
                    warn!(url = %record.profile_url, error = %e, "profile task failed");
                }
            }
            records.push(record);
        }
        records
    }
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(base_url = %self.base_url, limit = ?limit))]
    async fn collect(
        &self,
        scopes: Option<&[String]>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>> {
        let mut listing = match Self::resolve_scopes(scopes)? {
            Some(codes) => {
                info!(?codes, "collecting department listings");
                let mut listing = Vec::new();
                let mut last_error = None;
                let mut fetched = 0usize;
                for code in &codes {
                    match self.department_listing(code).await {
                        Ok(records) => {
                            fetched += 1;
                            listing.extend(records);
                        }
                        Err(e) => {
                            warn!(code, error = %e, "department page failed");
                            last_error = Some(e);
                        }
                    }
                }
                if fetched == 0 {
                    return Err(last_error.unwrap_or_else(|| {
                        OutreachError::unavailable("no department page could be fetched")
                    }));
                }
                listing
            }
            None => {
                info!("no scopes given, collecting faculty index");
                self.index_listing().await?
            }
        };

        if let Some(limit) = limit {
            listing.truncate(limit);
        }

        let records = self.fill_profiles(listing).await;
        info!(count = records.len(), "directory collection finished");
        Ok(records)
    }
}

/// GET one page, honoring the host throttle.
async fn fetch_html(client: &Client, throttle: &HostThrottle, url: &Url) -> Result<String> {
    throttle.wait(url).await;
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| OutreachError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OutreachError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| OutreachError::Network(format!("{url}: body read failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> DirectoryConfig {
        DirectoryConfig {
            base_url: server.uri(),
            concurrency: 2,
            rate_limit_ms: 0,
            timeout_secs: 5,
        }
    }

    fn source_for(server: &MockServer) -> HttpDirectorySource {
        HttpDirectorySource::new(&config_for(server))
            .expect("source")
            .with_retry(RetryPolicy::immediate(2))
    }

    const CS_PAGE: &str = r#"
<html><body>
  <a href="/department/CS/faculty/cs-ada"><span class="hndg">Ada Lovelace</span>
     <span class="tx22"><i>Professor</i></span>
     <span>Research Area(s) : Computer Vision; Machine Learning</span></a>
  <a href="/department/CS/faculty/cs-alan"><span class="hndg">Alan Turing</span>
     <span class="tx22"><i>Professor</i></span></a>
  <a href="/department/CS/faculty/cs-grace"><span class="hndg">Grace Hopper</span></a>
</body></html>
"#;

    const ADA_PROFILE: &str = r#"
<html><body><h4>Ada Lovelace</h4>
  <a href="mailto:ada@cse.example.edu">email</a>
  <div id="biosketch">Analytical engines and vision.</div>
</body></html>
"#;

    const ALAN_PROFILE: &str = r#"
<html><body><h4>Alan Turing</h4>
  <a class="research-link">Computability</a>
</body></html>
"#;

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn collects_scoped_department_with_limit() {
        let server = MockServer::start().await;
        mount_page(&server, "/department/CS", CS_PAGE).await;
        mount_page(&server, "/department/CS/faculty/cs-ada", ADA_PROFILE).await;
        mount_page(&server, "/department/CS/faculty/cs-alan", ALAN_PROFILE).await;

        let source = source_for(&server);
        let scopes = vec!["cse".to_string()];
        let records = source.collect(Some(&scopes), Some(2)).await.expect("collect");

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.department == "CS"));

        assert_eq!(records[0].name, "Ada Lovelace");
        assert_eq!(records[0].email.as_deref(), Some("ada@cse.example.edu"));
        assert_eq!(records[0].bio.as_deref(), Some("Analytical engines and vision."));
        assert_eq!(records[0].research_areas, vec!["Computer Vision", "Machine Learning"]);

        assert_eq!(records[1].name, "Alan Turing");
        assert_eq!(records[1].research_areas, vec!["Computability"]);
    }

    #[tokio::test]
    async fn failing_profile_page_keeps_listing_fields() {
        let server = MockServer::start().await;
        mount_page(&server, "/department/CS", CS_PAGE).await;
        mount_page(&server, "/department/CS/faculty/cs-ada", ADA_PROFILE).await;
        Mock::given(method("GET"))
            .and(path("/department/CS/faculty/cs-alan"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        mount_page(&server, "/department/CS/faculty/cs-grace", "<html></html>").await;

        let source = source_for(&server);
        let scopes = vec!["CS".to_string()];
        let records = source.collect(Some(&scopes), None).await.expect("collect");

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].name, "Alan Turing");
        assert_eq!(records[1].designation, "Professor");
        assert!(records[1].bio.is_none());
    }

    #[tokio::test]
    async fn no_scopes_reads_the_faculty_index() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/faclistbydepartment",
            r#"<table>
                <tr><td><a href="/department/EE/faculty/ee-nikola">Nikola Tesla</a></td>
                    <td>Electrical Engineering</td><td>Professor</td></tr>
               </table>"#,
        )
        .await;
        mount_page(&server, "/department/EE/faculty/ee-nikola", "<h4>Nikola Tesla</h4>").await;

        let records = source_for(&server).collect(None, None).await.expect("collect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].department, "EE");
        assert_eq!(records[0].designation, "Professor");
    }

    #[tokio::test]
    async fn all_departments_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let scopes = vec!["CS".to_string(), "EE".to_string()];
        let err = source_for(&server)
            .collect(Some(&scopes), None)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn one_failing_department_is_skipped() {
        let server = MockServer::start().await;
        mount_page(&server, "/department/CS", CS_PAGE).await;
        Mock::given(method("GET"))
            .and(path("/department/EE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let scopes = vec!["EE".to_string(), "CS".to_string()];
        let records = source_for(&server)
            .collect(Some(&scopes), Some(1))
            .await
            .expect("collect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn unknown_scopes_are_rejected() {
        let server = MockServer::start().await;
        let scopes = vec!["Astrology".to_string()];
        let err = source_for(&server)
            .collect(Some(&scopes), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OutreachError::Validation { .. }));
    }

    #[tokio::test]
    async fn throttle_spaces_requests_to_one_host() {
        let throttle = HostThrottle::new(Duration::from_millis(40));
        let url = Url::parse("https://www.example.edu/a").unwrap();
        let other = Url::parse("https://other.example.org/").unwrap();

        let start = Instant::now();
        throttle.wait(&url).await;
        throttle.wait(&other).await;
        assert!(start.elapsed() < Duration::from_millis(40));

        throttle.wait(&url).await;
        throttle.wait(&url).await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}

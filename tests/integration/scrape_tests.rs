//! Integration tests for the scraper
//!
//! These tests drive `Scraper` end-to-end with an in-memory browser and DNS
//! resolver, and use wiremock for the AI endpoint.

use async_trait::async_trait;
use fibre_scout::browser::{
    AbortReason, BrowserError, BrowserLauncher, BrowserPage, BrowserResult, BrowserSession,
    BrowserSessionManager, RequestInterceptor, ResourceKind, Verdict, Viewport,
};
use fibre_scout::config::{AiConfig, BrowserConfig};
use fibre_scout::extract::ExtractionPipeline;
use fibre_scout::scrape::{
    ProviderRegistry, ScrapeSettings, Scraper, INVALID_URL, NO_PRICE_DATA, UNKNOWN_PROVIDER,
};
use fibre_scout::url::{ResolutionCache, Resolver, UrlSanitizer};
use serde_json::json;
use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEALS_PAGE: &str = r#"<html><head><title>Broadband deals</title>
<script>window.__deals = "£1 for 1Mbps";</script></head>
<body>
  <h1>Broadband deals</h1>
  <div class="card">Full Fibre 500 <span>Average speed 500Mbps</span> <b>£34.99</b> a month</div>
  <div class="card">Gig1 Only £51.99 per month with 1000Mbps speeds.</div>
  <noscript>Please enable JavaScript</noscript>
</body></html>"#;

const EMPTY_PAGE: &str = "<html><body><h1>Sorry, this page has moved</h1></body></html>";

/// Resolves `*.internal` and `sneaky.bt.com` to private space, everything else publicly
#[derive(Default)]
struct FakeDns {
    lookups: AtomicUsize,
}

#[async_trait]
impl Resolver for FakeDns {
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        if hostname.ends_with(".internal") || hostname == "sneaky.bt.com" {
            Ok(vec!["10.20.30.40".parse().unwrap()])
        } else {
            Ok(vec!["93.184.216.34".parse().unwrap()])
        }
    }
}

/// How the fake page behaves once navigation starts
#[derive(Clone, Copy)]
enum Behaviour {
    Render(&'static str),
    FailNavigation,
    HangNavigation,
    PanicOnContent,
    PanicOnLaunch,
    PanicOnClose,
}

/// Everything the fake browser saw
#[derive(Default)]
struct Recorder {
    launches: AtomicUsize,
    pages: AtomicUsize,
    closes: AtomicUsize,
    gotos: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    verdicts: Mutex<Vec<(String, Verdict)>>,
}

impl Recorder {
    fn gotos(&self) -> Vec<String> {
        self.gotos.lock().unwrap().clone()
    }
}

struct FakeBrowser {
    recorder: Arc<Recorder>,
    behaviour: Behaviour,
    subresources: Vec<(&'static str, ResourceKind)>,
}

impl FakeBrowser {
    fn new(recorder: Arc<Recorder>, behaviour: Behaviour) -> Self {
        Self {
            recorder,
            behaviour,
            subresources: Vec::new(),
        }
    }

    fn page(&self) -> FakePage {
        FakePage {
            recorder: Arc::clone(&self.recorder),
            behaviour: self.behaviour,
            subresources: self.subresources.clone(),
            interceptor: Mutex::new(None),
        }
    }
}

struct FakeSession(FakeBrowser);

struct FakePage {
    recorder: Arc<Recorder>,
    behaviour: Behaviour,
    subresources: Vec<(&'static str, ResourceKind)>,
    interceptor: Mutex<Option<RequestInterceptor>>,
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self, _config: &BrowserConfig) -> BrowserResult<Arc<dyn BrowserSession>> {
        self.recorder.launches.fetch_add(1, Ordering::SeqCst);
        if let Behaviour::PanicOnLaunch = self.behaviour {
            panic!("launcher bug");
        }
        Ok(Arc::new(FakeSession(FakeBrowser {
            recorder: Arc::clone(&self.recorder),
            behaviour: self.behaviour,
            subresources: self.subresources.clone(),
        })))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> BrowserResult<Box<dyn BrowserPage>> {
        self.0.recorder.pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.0.page()))
    }

    async fn close(&self) -> BrowserResult<()> {
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn configure(&self, _viewport: Viewport, _user_agent: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn intercept(&self, interceptor: RequestInterceptor) -> BrowserResult<()> {
        *self.interceptor.lock().unwrap() = Some(interceptor);
        Ok(())
    }

    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.recorder.gotos.lock().unwrap().push(url.to_string());

        let interceptor = self
            .interceptor
            .lock()
            .unwrap()
            .clone()
            .expect("navigation before interception was installed");

        let document = interceptor.decide(url, ResourceKind::Document).await;
        assert_eq!(document, Verdict::Allow, "main document must be allowed");

        for (resource, kind) in &self.subresources {
            let verdict = interceptor.decide(resource, *kind).await;
            self.recorder
                .verdicts
                .lock()
                .unwrap()
                .push((resource.to_string(), verdict));
        }

        match self.behaviour {
            Behaviour::FailNavigation => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
            Behaviour::HangNavigation => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value> {
        self.recorder.scripts.lock().unwrap().push(script.to_string());
        Ok(serde_json::Value::Null)
    }

    async fn content(&self) -> BrowserResult<String> {
        match self.behaviour {
            Behaviour::Render(html) => Ok(html.to_string()),
            Behaviour::PanicOnContent => panic!("renderer crashed"),
            _ => Ok(String::new()),
        }
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        if let Behaviour::PanicOnClose = self.behaviour {
            panic!("close failed");
        }
        Ok(())
    }
}

struct Harness {
    scraper: Scraper,
    recorder: Arc<Recorder>,
    dns: Arc<FakeDns>,
}

fn settings(production: bool) -> ScrapeSettings {
    ScrapeSettings {
        production,
        navigation_timeout: Duration::from_millis(200),
        settle_delay: Duration::from_millis(5),
        batch_concurrency: 1,
    }
}

fn harness_with(
    settings: ScrapeSettings,
    browser: FakeBrowser,
    pipeline: ExtractionPipeline,
) -> Harness {
    let recorder = Arc::clone(&browser.recorder);
    let dns = Arc::new(FakeDns::default());
    let scraper = Scraper::new(
        settings,
        ProviderRegistry::builtin(),
        Arc::new(ResolutionCache::new(Arc::clone(&dns) as Arc<dyn Resolver>)),
        Arc::new(BrowserSessionManager::new(
            Arc::new(browser),
            BrowserConfig::default(),
        )),
        pipeline,
    );

    Harness {
        scraper,
        recorder,
        dns,
    }
}

fn harness(production: bool, behaviour: Behaviour) -> Harness {
    let browser = FakeBrowser::new(Arc::new(Recorder::default()), behaviour);
    harness_with(settings(production), browser, ExtractionPipeline::regex_only())
}

#[tokio::test]
async fn test_successful_scrape_of_known_provider() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));

    let result = h.scraper.scrape("BT", None).await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.url.as_deref(), Some("https://www.bt.com/broadband/deals"));
    assert_eq!(result.source, "headless");
    assert!(result.rendered);
    assert_eq!(result.deals.len(), 2);
    assert_eq!(result.deals[0].speed, "1000 Mbps");
    assert_eq!(result.deals[0].price, "51.99");
    assert_eq!(result.deals[1].speed, "500 Mbps");
    assert_eq!(result.deals[1].price, "34.99");

    assert_eq!(h.recorder.gotos(), vec!["https://www.bt.com/broadband/deals"]);
    assert_eq!(
        h.recorder.scripts.lock().unwrap().as_slice(),
        ["window.scrollTo(0, document.body.scrollHeight / 2)"]
    );
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_provider_never_touches_browser() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));

    let result = h.scraper.scrape("UnknownProvider", None).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(UNKNOWN_PROVIDER));
    assert!(result.url.is_none());
    assert_eq!(h.recorder.launches.load(Ordering::SeqCst), 0);
    assert_eq!(h.recorder.pages.load(Ordering::SeqCst), 0);
    assert_eq!(h.dns.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_metadata_address_never_navigated() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));

    let result = h
        .scraper
        .scrape("BT", Some("http://169.254.169.254/latest/meta-data"))
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(INVALID_URL));
    assert!(h.recorder.gotos().is_empty());
    assert_eq!(h.recorder.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_public_name_resolving_privately_rejected() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));

    let result = h
        .scraper
        .scrape("BT", Some("https://sneaky.bt.com/deals"))
        .await;

    assert_eq!(result.error.as_deref(), Some(INVALID_URL));
    assert!(h.recorder.gotos().is_empty());
    assert_eq!(h.dns.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_caller_url_on_provider_subdomain() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));

    let result = h
        .scraper
        .scrape("bt", Some("https://shop.bt.com/broadband#deals"))
        .await;

    assert!(result.success);
    assert_eq!(result.url.as_deref(), Some("https://shop.bt.com/broadband"));
    assert_eq!(h.recorder.gotos(), vec!["https://shop.bt.com/broadband"]);
}

#[tokio::test]
async fn test_caller_url_off_provider_host_rejected() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));

    let result = h
        .scraper
        .scrape("Sky", Some("https://www.bt.com/broadband"))
        .await;

    assert_eq!(result.error.as_deref(), Some(INVALID_URL));
    assert!(h.recorder.gotos().is_empty());
}

#[tokio::test]
async fn test_fallback_url_outside_production() {
    let h = harness(false, Behaviour::Render(DEALS_PAGE));

    let result = h.scraper.scrape("Acme Broadband", None).await;

    assert!(result.success);
    assert_eq!(result.url.as_deref(), Some("https://www.acmebroadband.co.uk/"));
}

#[tokio::test]
async fn test_no_price_data() {
    let h = harness(true, Behaviour::Render(EMPTY_PAGE));

    let result = h.scraper.scrape("Sky", None).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(NO_PRICE_DATA));
    assert!(result.deals.is_empty());
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_navigation_failure_redacted_in_production() {
    let h = harness(true, Behaviour::FailNavigation);
    let result = h.scraper.scrape("TalkTalk", None).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Failed to load page"));
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);

    let h = harness(false, Behaviour::FailNavigation);
    let result = h.scraper.scrape("TalkTalk", None).await;

    let error = result.error.unwrap();
    assert!(error.contains("ERR_NAME_NOT_RESOLVED"), "got: {}", error);
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_navigation_timeout() {
    let h = harness(false, Behaviour::HangNavigation);

    let result = h.scraper.scrape("Zen", None).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Timed out"));
    assert!(h.recorder.scripts.lock().unwrap().is_empty());
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panic_is_contained_and_page_closed() {
    let h = harness(true, Behaviour::PanicOnContent);
    let result = h.scraper.scrape("EE", None).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Internal error"));
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);

    let h = harness(false, Behaviour::PanicOnContent);
    let result = h.scraper.scrape("EE", None).await;

    assert_eq!(
        result.error.as_deref(),
        Some("Unexpected error: renderer crashed")
    );
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_launcher_panic_is_contained() {
    let h = harness(true, Behaviour::PanicOnLaunch);
    let result = h.scraper.scrape("BT", None).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Internal error"));

    let h = harness(false, Behaviour::PanicOnLaunch);
    let result = h.scraper.scrape("BT", None).await;
    assert_eq!(
        result.error.as_deref(),
        Some("Unexpected error: launcher bug")
    );
    assert_eq!(h.recorder.pages.load(Ordering::SeqCst), 0);

    // A panicked launch leaves the session unset, so the next scrape retries
    h.scraper.scrape("BT", None).await;
    assert_eq!(h.recorder.launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_close_panic_is_contained() {
    let h = harness(true, Behaviour::PanicOnClose);
    let result = h.scraper.scrape("Sky", None).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Internal error"));
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exactly_one_close_per_scrape() {
    for behaviour in [
        Behaviour::Render(DEALS_PAGE),
        Behaviour::Render(EMPTY_PAGE),
        Behaviour::FailNavigation,
        Behaviour::HangNavigation,
        Behaviour::PanicOnContent,
    ] {
        let h = harness(true, behaviour);
        h.scraper.scrape("Vodafone", None).await;
        h.scraper.scrape("Plusnet", None).await;

        assert_eq!(h.recorder.pages.load(Ordering::SeqCst), 2);
        assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 2);
    }
}

#[tokio::test]
async fn test_batch_scrapes_first_five_only() {
    let h = harness(true, Behaviour::Render(DEALS_PAGE));
    let names: Vec<String> = ["BT", "Sky", "Virgin Media", "TalkTalk", "Vodafone", "EE", "Zen"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let results = h.scraper.scrape_batch(&names).await;

    assert_eq!(results.len(), 5);
    for name in &names[..5] {
        assert!(results[name].success, "{} failed", name);
    }
    assert!(!results.contains_key("EE"));
    assert!(!results.contains_key("Zen"));
    assert_eq!(h.recorder.gotos().len(), 5);
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 5);
    assert_eq!(h.recorder.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_batch_launches_browser_once() {
    let browser = FakeBrowser::new(Arc::new(Recorder::default()), Behaviour::Render(DEALS_PAGE));
    let mut settings = settings(true);
    settings.batch_concurrency = 5;
    let h = harness_with(settings, browser, ExtractionPipeline::regex_only());

    let names: Vec<String> = ["BT", "Sky", "Hyperoptic", "Zen", "UnknownProvider"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let results = h.scraper.scrape_batch(&names).await;

    assert_eq!(results.len(), 5);
    assert_eq!(
        results["UnknownProvider"].error.as_deref(),
        Some(UNKNOWN_PROVIDER)
    );
    assert_eq!(h.recorder.launches.load(Ordering::SeqCst), 1);
    assert_eq!(h.recorder.closes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_subresources_filtered_during_render() {
    let mut browser =
        FakeBrowser::new(Arc::new(Recorder::default()), Behaviour::Render(DEALS_PAGE));
    browser.subresources = vec![
        ("https://cdn.bt.com/app.js", ResourceKind::Script),
        ("https://cdn.bt.com/hero.png", ResourceKind::Image),
        ("http://169.254.169.254/latest/meta-data", ResourceKind::Xhr),
        ("https://redis.internal/", ResourceKind::Xhr),
        ("file:///etc/passwd", ResourceKind::Other),
        ("data:image/png;base64,AAAA", ResourceKind::Image),
    ];
    let h = harness_with(settings(true), browser, ExtractionPipeline::regex_only());

    let result = h.scraper.scrape("BT", None).await;
    assert!(result.success);

    let verdicts = h.recorder.verdicts.lock().unwrap().clone();
    let verdict_for = |url: &str| {
        verdicts
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, v)| *v)
            .unwrap()
    };

    assert_eq!(verdict_for("https://cdn.bt.com/app.js"), Verdict::Allow);
    assert_eq!(
        verdict_for("https://cdn.bt.com/hero.png"),
        Verdict::Abort(AbortReason::ResourceType)
    );
    assert_eq!(
        verdict_for("http://169.254.169.254/latest/meta-data"),
        Verdict::Abort(AbortReason::PrivateDestination)
    );
    assert_eq!(
        verdict_for("https://redis.internal/"),
        Verdict::Abort(AbortReason::PrivateDestination)
    );
    assert_eq!(
        verdict_for("file:///etc/passwd"),
        Verdict::Abort(AbortReason::Scheme)
    );
    assert_eq!(
        verdict_for("data:image/png;base64,AAAA"),
        Verdict::Allow
    );
}

#[tokio::test]
async fn test_private_hosts_never_sanitize() {
    let dns = Arc::new(FakeDns::default());
    let cache = ResolutionCache::new(Arc::clone(&dns) as Arc<dyn Resolver>);
    let sanitizer = UrlSanitizer::new(&cache);

    for host in ["127.0.0.1", "10.1.2.3", "169.254.1.1", "192.168.0.1", "[::1]", "localhost"] {
        let raw = format!("http://{}/deals", host);
        assert!(sanitizer.sanitize(&raw).await.is_none(), "{} accepted", raw);
    }
    assert_eq!(dns.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_checks_share_one_lookup() {
    let dns = Arc::new(FakeDns::default());
    let cache = Arc::new(ResolutionCache::new(Arc::clone(&dns) as Arc<dyn Resolver>));

    let checks = (0..10).map(|_| {
        let cache = Arc::clone(&cache);
        async move { cache.resolve_safely("example.com").await }
    });
    let verdicts = futures::future::join_all(checks).await;

    assert!(verdicts.iter().all(|private| !private));
    assert_eq!(dns.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ai_deals_used_when_configured() {
    let server = MockServer::start().await;
    let reply = r#"```json
{"deals":[{"name":"Full Fibre 900","speed_mbps":900,"price":"£45","contract":"24 months"}]}
```"#;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": reply }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ai = AiConfig {
        api_key: Some("test-key".to_string()),
        endpoint: server.uri(),
        ..AiConfig::default()
    };
    let pipeline = ExtractionPipeline::from_config(&ai).unwrap();
    assert!(pipeline.is_ai_enabled());

    let browser = FakeBrowser::new(Arc::new(Recorder::default()), Behaviour::Render(DEALS_PAGE));
    let h = harness_with(settings(true), browser, pipeline);

    let result = h.scraper.scrape("BT", None).await;

    assert!(result.success);
    assert_eq!(result.deals.len(), 1);
    assert_eq!(result.deals[0].name, "Full Fibre 900");
    assert_eq!(result.deals[0].price, "45.00");
    assert_eq!(result.deals[0].contract.as_deref(), Some("24 months"));
}

#[tokio::test]
async fn test_malformed_ai_reply_falls_back_to_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"deals\": [ truncated" }] } }]
        })))
        .mount(&server)
        .await;

    let ai = AiConfig {
        api_key: Some("test-key".to_string()),
        endpoint: server.uri(),
        ..AiConfig::default()
    };
    let browser = FakeBrowser::new(Arc::new(Recorder::default()), Behaviour::Render(DEALS_PAGE));
    let h = harness_with(
        settings(true),
        browser,
        ExtractionPipeline::from_config(&ai).unwrap(),
    );

    let result = h.scraper.scrape("BT", None).await;

    assert!(result.success);
    assert_eq!(result.deals.len(), 2);
    assert_eq!(result.deals[0].speed, "1000 Mbps");
}

use std::time::{Duration, Instant};

use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A DOM snapshot of the target page after rendering settled.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub ready_timeout: Duration,
    pub article_timeout: Duration,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

/// Everything `render` needs for one page.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    /// Generic readiness probe; its absence after `ready_timeout` is fatal.
    pub ready_selector: String,
    /// "Assets resolved" probe for at least one article; best-effort.
    pub loaded_selector: String,
    pub waits: WaitConfig,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser session error: {0}")]
    Session(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("page {url} not ready after {waited:?}")]
    Timeout { url: String, waited: Duration },
    #[error("could not snapshot DOM for {url}: {message}")]
    Snapshot { url: String, message: String },
}

/// Browser capability the adapter drives. One session renders one page and is
/// released afterwards.
pub trait PageSession {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError>;
    /// Non-blocking probe: does the live DOM currently match `selector`?
    fn has_element(&mut self, selector: &str) -> bool;
    /// Snapshot the current DOM as HTML.
    fn content(&mut self) -> Result<String, RenderError>;
    /// Release the underlying browser resources.
    fn quit(&mut self);
}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

/// Poll `probe` every `interval` until it holds or `timeout` elapses.
pub fn poll_until(
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> bool,
) -> WaitOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        if probe() {
            return WaitOutcome::Satisfied;
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::TimedOut;
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}

/// Render one page. The session is consumed and its `quit` runs on every exit
/// path — success, timeout, or snapshot failure — so no browser leaks past a
/// run.
pub fn render<S: PageSession>(mut session: S, req: &RenderRequest) -> Result<RenderedPage, RenderError> {
    let result = drive(&mut session, req);
    session.quit();
    result
}

fn drive<S: PageSession>(session: &mut S, req: &RenderRequest) -> Result<RenderedPage, RenderError> {
    info!("rendering {}", req.url);
    session.navigate(&req.url)?;

    let waits = &req.waits;
    if poll_until(waits.ready_timeout, waits.poll_interval, || {
        session.has_element(&req.ready_selector)
    }) == WaitOutcome::TimedOut
    {
        return Err(RenderError::Timeout {
            url: req.url.clone(),
            waited: waits.ready_timeout,
        });
    }

    // Client-side frameworks keep mutating the DOM after first paint and
    // expose no load event for it; the settle delay is part of the contract.
    std::thread::sleep(waits.settle_delay);

    match poll_until(waits.article_timeout, waits.poll_interval, || {
        session.has_element(&req.loaded_selector)
    }) {
        WaitOutcome::Satisfied => debug!("article containers reported loaded"),
        WaitOutcome::TimedOut => warn!(
            "no loaded article matched `{}` within {:?}; proceeding with whatever rendered",
            req.loaded_selector, waits.article_timeout
        ),
    }

    let html = session.content()?;
    Ok(RenderedPage {
        url: req.url.clone(),
        html,
    })
}

// ── Chrome session ──

/// Production session on a local headless Chrome. Dropping the `Browser`
/// terminates the child process, so even a panic cannot orphan it.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeSession {
    pub fn launch() -> Result<Self, RenderError> {
        let browser = Browser::new(LaunchOptions {
            headless: true,
            window_size: Some((1920, 1080)),
            ..Default::default()
        })
        .map_err(|e| RenderError::Session(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| RenderError::Session(e.to_string()))?;

        Ok(ChromeSession {
            browser: Some(browser),
            tab: Some(tab),
        })
    }
}

impl PageSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let tab = self.tab.as_ref().ok_or_else(|| {
            RenderError::Session("session already released".to_string())
        })?;
        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn has_element(&mut self, selector: &str) -> bool {
        match &self.tab {
            Some(tab) => matches!(tab.find_elements(selector), Ok(els) if !els.is_empty()),
            None => false,
        }
    }

    fn content(&mut self) -> Result<String, RenderError> {
        let tab = self.tab.as_ref().ok_or_else(|| {
            RenderError::Session("session already released".to_string())
        })?;
        tab.get_content().map_err(|e| RenderError::Snapshot {
            url: tab.get_url(),
            message: e.to_string(),
        })
    }

    fn quit(&mut self) {
        debug!("releasing chrome session");
        self.tab = None;
        self.browser = None;
    }
}

// ── Static HTTP session ──

/// Fallback session that fetches the page without executing JavaScript.
/// Probes run against the parsed response body, so readiness waits resolve
/// immediately. Useful for server-rendered snapshots and fast local runs.
pub struct HttpSession {
    client: reqwest::blocking::Client,
    body: Option<String>,
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

impl HttpSession {
    pub fn new() -> Result<Self, RenderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RenderError::Session(e.to_string()))?;
        Ok(HttpSession { client, body: None })
    }
}

impl PageSession for HttpSession {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let body = resp.text().map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.body = Some(body);
        Ok(())
    }

    fn has_element(&mut self, selector: &str) -> bool {
        let Some(body) = &self.body else {
            return false;
        };
        let Ok(sel) = scraper::Selector::parse(selector) else {
            return false;
        };
        scraper::Html::parse_document(body).select(&sel).next().is_some()
    }

    fn content(&mut self) -> Result<String, RenderError> {
        self.body.clone().ok_or_else(|| RenderError::Snapshot {
            url: String::new(),
            message: "no page fetched".to_string(),
        })
    }

    fn quit(&mut self) {
        self.body = None;
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Scripted session: elements "appear" after a set number of probes.
    struct StubSession {
        html: String,
        probes_until_ready: u32,
        probes_seen: u32,
        fail_snapshot: bool,
        quits: Rc<Cell<u32>>,
    }

    impl StubSession {
        fn ready(html: &str, quits: Rc<Cell<u32>>) -> Self {
            StubSession {
                html: html.to_string(),
                probes_until_ready: 0,
                probes_seen: 0,
                fail_snapshot: false,
                quits,
            }
        }
    }

    impl PageSession for StubSession {
        fn navigate(&mut self, _url: &str) -> Result<(), RenderError> {
            Ok(())
        }

        fn has_element(&mut self, _selector: &str) -> bool {
            self.probes_seen += 1;
            self.probes_seen > self.probes_until_ready
        }

        fn content(&mut self) -> Result<String, RenderError> {
            if self.fail_snapshot {
                return Err(RenderError::Snapshot {
                    url: String::new(),
                    message: "boom".to_string(),
                });
            }
            Ok(self.html.clone())
        }

        fn quit(&mut self) {
            self.quits.set(self.quits.get() + 1);
        }
    }

    fn quick_request() -> RenderRequest {
        RenderRequest {
            url: "https://example.com/".to_string(),
            ready_selector: "body".to_string(),
            loaded_selector: ".article img[src]".to_string(),
            waits: WaitConfig {
                ready_timeout: Duration::from_millis(50),
                article_timeout: Duration::from_millis(50),
                settle_delay: Duration::from_millis(0),
                poll_interval: Duration::from_millis(5),
            },
        }
    }

    #[test]
    fn poll_until_satisfied_and_timed_out() {
        let mut calls = 0;
        let outcome = poll_until(Duration::from_millis(100), Duration::from_millis(1), || {
            calls += 1;
            calls >= 3
        });
        assert_eq!(outcome, WaitOutcome::Satisfied);

        let outcome = poll_until(Duration::from_millis(10), Duration::from_millis(2), || false);
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn render_returns_snapshot_and_quits_once() {
        let quits = Rc::new(Cell::new(0));
        let session = StubSession::ready("<html><body>hi</body></html>", quits.clone());
        let page = render(session, &quick_request()).unwrap();
        assert!(page.html.contains("hi"));
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn ready_timeout_is_reported_and_quits_once() {
        let quits = Rc::new(Cell::new(0));
        let mut session = StubSession::ready("", quits.clone());
        session.probes_until_ready = u32::MAX;
        let err = render(session, &quick_request()).unwrap_err();
        assert!(matches!(err, RenderError::Timeout { .. }));
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn snapshot_failure_still_quits_once() {
        let quits = Rc::new(Cell::new(0));
        let mut session = StubSession::ready("", quits.clone());
        session.fail_snapshot = true;
        let err = render(session, &quick_request()).unwrap_err();
        assert!(matches!(err, RenderError::Snapshot { .. }));
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn article_wait_timeout_is_not_fatal() {
        // Ready probe passes on the first poll; the article probe then keeps
        // failing because the stub counts probes across both waits only once.
        struct HalfReady {
            quits: Rc<Cell<u32>>,
            probes: u32,
        }
        impl PageSession for HalfReady {
            fn navigate(&mut self, _url: &str) -> Result<(), RenderError> {
                Ok(())
            }
            fn has_element(&mut self, selector: &str) -> bool {
                self.probes += 1;
                selector == "body"
            }
            fn content(&mut self) -> Result<String, RenderError> {
                Ok("<html></html>".to_string())
            }
            fn quit(&mut self) {
                self.quits.set(self.quits.get() + 1);
            }
        }

        let quits = Rc::new(Cell::new(0));
        let session = HalfReady {
            quits: quits.clone(),
            probes: 0,
        };
        let page = render(session, &quick_request()).unwrap();
        assert_eq!(page.html, "<html></html>");
        assert_eq!(quits.get(), 1);
    }
}

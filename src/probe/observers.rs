use crate::config::ProbeConfig;
use crate::report::{NetworkEntry, Report};
use crate::{Error, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, RequestId,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    EventConsoleApiCalled, EventExceptionThrown, ExceptionDetails, RemoteObject,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// The page counts as settling while at most this many requests are in
/// flight, matching the "network idle" notion browser harnesses use for
/// pages that keep a couple of long-polling connections open.
const IDLE_MAX_INFLIGHT: usize = 2;

/// Poll interval for bounded waits.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tracks request lifecycles, so failures can be tied back to their URL and
/// the idle wait can see how many requests are still outstanding.
#[derive(Debug, Default)]
pub(crate) struct NetworkTracker {
    urls: HashMap<RequestId, String>,
    inflight: HashSet<RequestId>,
}

impl NetworkTracker {
    fn started(&mut self, id: RequestId, url: String) {
        self.inflight.insert(id.clone());
        self.urls.insert(id, url);
    }

    fn ended(&mut self, id: &RequestId) {
        self.inflight.remove(id);
    }

    fn url_of(&self, id: &RequestId) -> String {
        self.urls.get(id).cloned().unwrap_or_default()
    }

    fn inflight(&self) -> usize {
        self.inflight.len()
    }
}

/// Wire the passive observers onto the page.
///
/// Must run before the first navigation so that nothing emitted during the
/// initial load is missed. Each observer appends to the shared record from
/// its own task; the scripted sequence never touches `logs` and only appends
/// to `errors` at its top-level boundary.
pub(crate) async fn attach(
    page: &Page,
    config: &ProbeConfig,
    record: &Arc<Mutex<Report>>,
    tracker: &Arc<Mutex<NetworkTracker>>,
) -> Result<Vec<JoinHandle<()>>> {
    // Runtime events flow as soon as the page session is up; network events
    // need the domain enabled explicitly.
    page.execute(EnableParams::default()).await?;

    let mut tasks = Vec::with_capacity(3);

    let mut console_events = page.event_listener::<EventConsoleApiCalled>().await?;
    let echo_markers = config.console.echo_markers.clone();
    let console_record = Arc::clone(record);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = console_events.next().await {
            let text = console_text(&event.args);
            if echo_markers.iter().any(|m| text.contains(m.as_str())) {
                println!("📋 {text}");
            }
            console_record.lock().await.logs.push(text);
        }
    }));

    let mut exception_events = page.event_listener::<EventExceptionThrown>().await?;
    let error_record = Arc::clone(record);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = exception_events.next().await {
            let text = exception_text(&event.exception_details);
            eprintln!("❌ Page error: {text}");
            error_record.lock().await.errors.push(text);
        }
    }));

    // A single task consumes all network streams, so entries land in the
    // record in arrival order and failures can look up the URL recorded
    // when their request started.
    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut failures = page.event_listener::<EventLoadingFailed>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let network_config = config.network.clone();
    let network_record = Arc::clone(record);
    let network_tracker = Arc::clone(tracker);
    tasks.push(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = requests.next() => {
                    debug!("request: {}", event.request.url);
                    network_tracker
                        .lock()
                        .await
                        .started(event.request_id.clone(), event.request.url.clone());
                }
                Some(event) = responses.next() => {
                    let url = event.response.url.clone();
                    let status = event.response.status;
                    if response_recorded(&url, status, &network_config.response_markers) {
                        eprintln!("⚠️ Firebase API response: {url} {status}");
                        network_record
                            .lock()
                            .await
                            .network
                            .push(NetworkEntry::Response { url, status });
                    }
                }
                Some(event) = failures.next() => {
                    let mut guard = network_tracker.lock().await;
                    let url = guard.url_of(&event.request_id);
                    guard.ended(&event.request_id);
                    drop(guard);
                    if url_matches(&url, &network_config.url_markers) {
                        let error = event.error_text.clone();
                        eprintln!("❌ Network failed: {url} {error}");
                        network_record
                            .lock()
                            .await
                            .network
                            .push(NetworkEntry::Failed { url, error });
                    }
                }
                Some(event) = finished.next() => {
                    network_tracker.lock().await.ended(&event.request_id);
                }
                else => break,
            }
        }
    }));

    Ok(tasks)
}

/// Resolve once no more than [`IDLE_MAX_INFLIGHT`] requests have been in
/// flight for `idle_ms`, or error when the page never settles within
/// `timeout_ms`.
pub(crate) async fn wait_for_network_idle(
    tracker: &Arc<Mutex<NetworkTracker>>,
    idle_ms: u64,
    timeout_ms: u64,
) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut idle_since: Option<Instant> = None;

    loop {
        let inflight = tracker.lock().await.inflight();
        if inflight <= IDLE_MAX_INFLIGHT {
            let since = idle_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= Duration::from_millis(idle_ms) {
                return Ok(());
            }
        } else {
            idle_since = None;
        }

        if Instant::now() >= deadline {
            return Err(Error::Timeout(format!(
                "network never settled within {timeout_ms}ms ({inflight} requests in flight)"
            )));
        }
        tokio::time::sleep(POLL_INTERVAL.min(Duration::from_millis(idle_ms))).await;
    }
}

/// Poll for a selector until it appears, bounded by `timeout_ms`.
pub(crate) async fn wait_for_element(page: &Page, selector: &str, timeout_ms: u64) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout(format!(
                "element {selector:?} not found within {timeout_ms}ms"
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Case-sensitive substring match against the configured marker list.
fn url_matches(url: &str, markers: &[String]) -> bool {
    markers.iter().any(|marker| url.contains(marker.as_str()))
}

/// Whether a response belongs in the record: anything other than a plain
/// 200 on a marker-matched URL. Redirects and not-modified replies count.
fn response_recorded(url: &str, status: i64, markers: &[String]) -> bool {
    status != 200 && url_matches(url, markers)
}

/// Best-effort text for a console call: the argument's value when it was
/// sent by value, otherwise the remote object description (objects, DOM
/// nodes, functions).
fn console_text(args: &[RemoteObject]) -> String {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(value) = &arg.value {
            match value {
                serde_json::Value::String(s) => parts.push(s.clone()),
                other => parts.push(other.to_string()),
            }
        } else if let Some(description) = &arg.description {
            parts.push(description.clone());
        }
    }
    parts.join(" ")
}

/// Mirror of the in-page `String(err)`: the exception's description when
/// present, otherwise the detail text with the source position.
fn exception_text(details: &ExceptionDetails) -> String {
    if let Some(exception) = &details.exception {
        if let Some(description) = &exception.description {
            return description.clone();
        }
        if let Some(value) = &exception.value {
            return match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
    }
    format!(
        "{} (line {}, col {})",
        details.text, details.line_number, details.column_number
    )
}

use crate::config::ProbeConfig;
use crate::probe::observers::{self, NetworkTracker};
use crate::report::{AfterSend, ChatSnapshot, InitSnapshot, Report};
use crate::{Error, Result};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Reads the app's Firebase debug globals. The catch mirrors what a broken
/// debug surface looks like from outside: the check reports its own failure
/// instead of aborting the run.
const INIT_STATE_JS: &str = r#"(() => {
    try {
        return {
            windowFirebase: !!window._firebase,
            hasAuth: !!(window._firebase && window._firebase.auth),
            hasDb: !!(window._firebase && window._firebase.db),
            authInitialized: window._firebase && window._firebase.auth ? true : false,
            dbInitialized: window._firebase && window._firebase.db ? true : false,
            useFirebaseAuth: window._useFirebaseAuth ?? null,
            chatMessagesCount: window.chatMessages ? window.chatMessages.length : 0
        };
    } catch (e) {
        return { error: String(e) };
    }
})()"#;

/// Run the scripted sequence against an already-observed page.
///
/// Any error aborts the remaining steps; the caller records it and persists
/// whatever the record holds at that point.
pub(crate) async fn drive(
    page: &Page,
    config: &ProbeConfig,
    record: &Arc<Mutex<Report>>,
    tracker: &Arc<Mutex<NetworkTracker>>,
) -> Result<()> {
    println!("🔍 Loading page...");
    navigate(page, config, tracker).await?;
    println!("✅ Page loaded");

    reload(page, config, tracker).await?;
    println!("✅ Page reloaded");

    // Give backend listeners time to attach and fire.
    settle(config.timing.listener_settle_ms).await;

    let init = sample_init_state(page).await?;
    println!("🔥 Firebase state: {}", serde_json::to_string(&init)?);
    record.lock().await.firebase_init = Some(init);

    // The chat listener populates shortly after init.
    settle(config.timing.chat_settle_ms).await;

    let chat = sample_chat_state(page, config).await?;
    println!("💬 Chat state: {}", serde_json::to_string(&chat)?);
    record.lock().await.chat_messages = Some(chat);

    println!("🧪 Testing signed-in message send...");
    simulate_sign_in(page, config).await?;

    observers::wait_for_element(
        page,
        &config.chat.input_selector,
        config.timing.input_timeout_ms,
    )
    .await?;
    let disabled = input_disabled(page, config).await?;
    println!("📝 Message input disabled? {disabled}");

    send_test_message(page, config).await?;

    settle(config.timing.send_settle_ms).await;

    let after = sample_after_send(page, config).await?;
    println!("✅ Final chat state: {}", serde_json::to_string(&after)?);
    if let Some(chat) = record.lock().await.chat_messages.as_mut() {
        chat.after_send = Some(after);
    }

    Ok(())
}

/// Navigate to the target and wait for the network to go idle, all within
/// one shared time budget.
async fn navigate(
    page: &Page,
    config: &ProbeConfig,
    tracker: &Arc<Mutex<NetworkTracker>>,
) -> Result<()> {
    let url = &config.target.url;
    let budget = config.timing.navigation_timeout_ms;
    debug!("goto: {url} (budget {budget}ms)");

    let started = Instant::now();
    tokio::time::timeout(Duration::from_millis(budget), page.goto(url.as_str()))
        .await
        .map_err(|_| Error::Navigation(format!("{url} timed out after {budget}ms")))?
        .map_err(|e| Error::Navigation(format!("{url}: {e}")))?;

    let remaining = budget
        .saturating_sub(started.elapsed().as_millis() as u64)
        .max(1);
    observers::wait_for_network_idle(tracker, config.timing.network_idle_ms, remaining).await
}

/// Reload bypassing the cache, so config or rules cached by an earlier
/// session cannot mask an init failure, then wait for idle again.
async fn reload(
    page: &Page,
    config: &ProbeConfig,
    tracker: &Arc<Mutex<NetworkTracker>>,
) -> Result<()> {
    let budget = config.timing.navigation_timeout_ms;
    debug!("reload, ignoring cache (budget {budget}ms)");

    let started = Instant::now();
    page.execute(ReloadParams {
        ignore_cache: Some(true),
        ..Default::default()
    })
    .await?;
    tokio::time::timeout(Duration::from_millis(budget), page.wait_for_navigation())
        .await
        .map_err(|_| Error::Navigation(format!("reload timed out after {budget}ms")))?
        .map_err(|e| Error::Navigation(format!("reload: {e}")))?;

    let remaining = budget
        .saturating_sub(started.elapsed().as_millis() as u64)
        .max(1);
    observers::wait_for_network_idle(tracker, config.timing.network_idle_ms, remaining).await
}

async fn sample_init_state(page: &Page) -> Result<InitSnapshot> {
    debug!("sampling firebase init state");
    evaluate_as(page, INIT_STATE_JS, "firebase init check").await
}

fn chat_state_js(config: &ProbeConfig) -> String {
    format!(
        r#"(() => {{
            const win = document.getElementById({id});
            return {{
                count: window.chatMessages ? window.chatMessages.length : 0,
                messages: window.chatMessages ? window.chatMessages.slice(0, 3) : [],
                chatWindowHTML: win ? win.innerHTML.substring(0, 200) : ''
            }};
        }})()"#,
        id = serde_json::to_string(&config.chat.window_id).unwrap()
    )
}

async fn sample_chat_state(page: &Page, config: &ProbeConfig) -> Result<ChatSnapshot> {
    debug!("sampling chat state");
    evaluate_as(page, &chat_state_js(config), "chat state check").await
}

/// The stored value is the identity serialized *twice*: the app expects a
/// JSON string in storage, exactly what it would have written itself after
/// a real sign-in.
fn sign_in_js(config: &ProbeConfig) -> String {
    let identity = serde_json::json!({
        "email": config.identity.email,
        "name": config.identity.name,
        "uid": config.identity.uid,
    });
    format!(
        r#"(() => {{
            sessionStorage.setItem({key}, {payload});
            const hook = window[{hook}];
            if (typeof hook === 'function') try {{ hook(); }} catch (e) {{ }}
        }})()"#,
        key = serde_json::to_string(&config.identity.storage_key).unwrap(),
        payload = serde_json::to_string(&identity.to_string()).unwrap(),
        hook = serde_json::to_string(&config.identity.refresh_hook).unwrap()
    )
}

/// Write the mock identity into session storage and poke the app's refresh
/// hook if it exposes one. The hook call is best-effort: absence or failure
/// is swallowed and recorded nowhere.
async fn simulate_sign_in(page: &Page, config: &ProbeConfig) -> Result<()> {
    debug!("simulating signed-in session under key {}", config.identity.storage_key);
    let js = sign_in_js(config);
    page.evaluate(js.as_str()).await?;
    Ok(())
}

fn input_disabled_js(config: &ProbeConfig) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            return el ? !!el.disabled : false;
        }})()"#,
        sel = serde_json::to_string(&config.chat.input_selector).unwrap()
    )
}

async fn input_disabled(page: &Page, config: &ProbeConfig) -> Result<bool> {
    evaluate_as(page, &input_disabled_js(config), "input disabled check").await
}

/// Type the diagnostic message and trigger the send control. Clicking the
/// input first gives it focus, the same way a user reaches it.
async fn send_test_message(page: &Page, config: &ProbeConfig) -> Result<()> {
    debug!("typing test message into {}", config.chat.input_selector);
    let input = page.find_element(config.chat.input_selector.as_str()).await?;
    input.click().await?;
    input.type_str(config.chat.test_message.as_str()).await?;

    debug!("clicking {}", config.chat.send_selector);
    let send = page.find_element(config.chat.send_selector.as_str()).await?;
    send.click().await?;
    Ok(())
}

fn after_send_js(config: &ProbeConfig) -> String {
    format!(
        r#"(() => {{
            const win = document.getElementById({id});
            return {{
                messages: window.chatMessages ? window.chatMessages.length : 0,
                html: win ? win.innerHTML.substring(0, 300) : ''
            }};
        }})()"#,
        id = serde_json::to_string(&config.chat.window_id).unwrap()
    )
}

async fn sample_after_send(page: &Page, config: &ProbeConfig) -> Result<AfterSend> {
    debug!("sampling final chat state");
    evaluate_as(page, &after_send_js(config), "final chat check").await
}

/// Evaluate an expression in the page and decode its JSON value.
async fn evaluate_as<T: DeserializeOwned>(page: &Page, js: &str, what: &str) -> Result<T> {
    let result = page.evaluate(js).await?;
    result
        .into_value::<T>()
        .map_err(|e| Error::Evaluation(format!("{what}: {e}")))
}

/// A fixed settle, kept as a plain sleep on purpose: the windows these cover
/// have no completion signal the probe could poll for.
async fn settle(ms: u64) {
    if ms > 0 {
        debug!("settling for {ms}ms");
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;

    #[test]
    fn test_init_state_js_is_an_expression() {
        // The whole block has to evaluate as a single expression.
        assert!(INIT_STATE_JS.starts_with("(() => {"));
        assert!(INIT_STATE_JS.ends_with("})()"));
        assert!(INIT_STATE_JS.contains("window._useFirebaseAuth ?? null"));
    }

    #[test]
    fn test_chat_state_js_embeds_window_id() {
        let mut config = ProbeConfig::default();
        config.chat.window_id = "customWindow".to_string();
        let js = chat_state_js(&config);
        assert!(js.contains(r#"getElementById("customWindow")"#), "js: {js}");
        assert!(js.contains("slice(0, 3)"));
        assert!(js.contains("substring(0, 200)"));
    }

    #[test]
    fn test_sign_in_js_payload_is_double_encoded() {
        // The stored value must be a JSON *string*, exactly as the app
        // would have written it after a real sign-in.
        let js = sign_in_js(&ProbeConfig::default());
        assert!(
            js.contains(r#"sessionStorage.setItem("mh_current", "{\"email\":\"test@example.com\""#),
            "js: {js}"
        );
        assert!(js.contains(r#"const hook = window["updateAuthGates"];"#), "js: {js}");
    }

    #[test]
    fn test_input_disabled_js_escapes_selector_quotes() {
        let mut config = ProbeConfig::default();
        config.chat.input_selector = r#"input[name="msg"]"#.to_string();
        let js = input_disabled_js(&config);
        assert!(js.contains(r#"querySelector("input[name=\"msg\"]")"#), "js: {js}");
    }

    #[test]
    fn test_after_send_js_truncates_at_300() {
        let js = after_send_js(&ProbeConfig::default());
        assert!(js.contains(r#"getElementById("chatWindow")"#), "js: {js}");
        assert!(js.contains("substring(0, 300)"));
    }
}

mod observers;
mod session;

use crate::config::ProbeConfig;
use crate::report::Report;
use crate::{Error, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use chrono::Utc;
use futures::StreamExt;
use observers::NetworkTracker;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome of a probe run.
#[derive(Debug)]
pub struct RunSummary {
    /// Whether the whole sequence completed.
    pub success: bool,
    /// Number of console lines captured.
    pub logs: usize,
    /// Number of errors captured, page errors and probe failures alike.
    pub errors: usize,
    /// Number of network anomalies captured.
    pub network: usize,
    /// Where the diagnostics record was written.
    pub report_path: PathBuf,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Drives the diagnostic sequence against a live browser.
pub struct Probe {
    browser: Browser,
    page: Page,
    record: Arc<Mutex<Report>>,
    tracker: Arc<Mutex<NetworkTracker>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Probe {
    /// Launch a browser and attach the observers to a blank page.
    ///
    /// Capture starts here, before any navigation, so nothing the target
    /// page emits during load can be missed.
    pub async fn launch(config: &ProbeConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .window_size(config.browser.viewport.width, config.browser.viewport.height);
        if !config.browser.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = config.browser.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(Error::Config)?;

        debug!("Launching browser (headless: {})", config.browser.headless);
        let (browser, mut handler) = Browser::launch(browser_config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let record = Arc::new(Mutex::new(Report::new()));
        let tracker = Arc::new(Mutex::new(NetworkTracker::default()));
        let mut tasks = observers::attach(&page, config, &record, &tracker).await?;
        tasks.push(handler_task);

        Ok(Self {
            browser,
            page,
            record,
            tracker,
            tasks,
        })
    }

    /// Run the sequence and persist the diagnostics record.
    ///
    /// A failing step does not fail the run: the error joins the record,
    /// the record is written anyway, and the summary reports
    /// `success: false`. Only a failure to write the record itself (or a
    /// broken browser connection before the run starts) surfaces as `Err`.
    pub async fn run(&mut self, config: &ProbeConfig) -> Result<RunSummary> {
        let start = Instant::now();

        let outcome = session::drive(&self.page, config, &self.record, &self.tracker).await;
        let success = match outcome {
            Ok(()) => true,
            Err(e) => {
                let text = e.to_string();
                eprintln!("❌ Test error: {text}");
                self.record.lock().await.errors.push(text);
                false
            }
        };

        if !success {
            self.handle_failure(config).await;
        }

        let (logs, errors, network) = {
            let record = self.record.lock().await;
            record.save(&config.output.path)?;
            (record.logs.len(), record.errors.len(), record.network.len())
        };
        println!("\n📊 Diagnostics written to {}", config.output.path.display());

        Ok(RunSummary {
            success,
            logs,
            errors,
            network,
            report_path: config.output.path.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn handle_failure(&self, config: &ProbeConfig) {
        if let Some(ref screenshot_path) = config.output.failure_screenshot {
            let timestamp = Utc::now().format("%Y%m%dT%H%M%S").to_string();
            let path = screenshot_path.replace("{timestamp}", &timestamp);
            debug!("Saving failure screenshot to: {}", path);
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            match self.page.screenshot(params).await {
                Ok(data) => {
                    if let Err(e) = std::fs::write(&path, data) {
                        warn!("Failed to save screenshot: {}", e);
                    }
                }
                Err(e) => warn!("Failed to capture screenshot: {}", e),
            }
        }
    }

    /// Close the browser.
    ///
    /// The record is already on disk by the time this is called; an error
    /// here is the caller's to handle.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        for task in self.tasks {
            task.abort();
        }
        Ok(())
    }
}

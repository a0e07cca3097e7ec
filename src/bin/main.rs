use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "fireprobe")]
#[command(about = "Browser-driven diagnostics for a Firebase-backed chat app")]
#[command(version)]
struct Cli {
    /// Config file (built-in defaults when omitted)
    config: Option<PathBuf>,

    /// Target URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Report output path (overrides config)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run with a visible browser window
    #[arg(long)]
    headful: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> fireprobe::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    // Load and validate config
    let mut config = match cli.config {
        Some(ref path) => fireprobe::ProbeConfig::load(path)?,
        None => fireprobe::ProbeConfig::default(),
    };

    // Apply CLI overrides
    if let Some(url) = cli.url {
        config.target.url = url;
    }
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    if cli.headful {
        config.browser.headless = false;
    }

    if cli.check {
        println!("Config valid");
        println!("  Target: {}", config.target.url);
        println!("  Output: {}", config.output.path.display());
        println!("  Headless: {}", config.browser.headless);
        println!(
            "  Waits: {}ms listener, {}ms chat, {}ms send",
            config.timing.listener_settle_ms,
            config.timing.chat_settle_ms,
            config.timing.send_settle_ms
        );
        println!(
            "  Network markers: {}",
            config.network.url_markers.join(", ")
        );
        return Ok(());
    }

    let mut probe = fireprobe::Probe::launch(&config).await?;
    let summary = probe.run(&config).await?;

    // Print result
    println!();
    if summary.success {
        println!("✓ Success");
    } else {
        println!("✗ Completed with errors");
    }
    println!("  Console logs: {}", summary.logs);
    println!("  Errors: {}", summary.errors);
    println!("  Network issues: {}", summary.network);
    println!("  Duration: {}ms", summary.duration_ms);

    probe.close().await?;

    // A failed sequence still exits 0; the record was written either way.
    Ok(())
}

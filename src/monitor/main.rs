mod login;
mod report;
mod reserve;
mod slots;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use headless_chrome::{Browser, Tab};
use pmon::{
    config::Config,
    notify::Notifier,
    scrape::{self, puppeteer},
};

use login::LoginOutcome;
use reserve::AttemptOutcome;

// per-deployment targets; pointing this at another club means editing code
const LOGIN_URL: &str = "https://tuclub.com/login";
const RESERVATIONS_URL: &str = "https://tuclub.com/reservas";

#[derive(Parser)]
#[command(name = "monitor", about = "Watches the club site for 20-22 slots and alerts via Telegram")]
struct Args {
    #[arg(long)]
    visible: bool,
    #[arg(long)]
    no_reserve: bool,
    #[arg(long, value_name = "file")]
    screenshot: Option<PathBuf>,
    #[arg(long, value_name = "file")]
    dump_html: Option<PathBuf>,
}

/// Marker context for failures that already produced their own chat
/// message, so the top-level handler does not report them twice.
#[derive(Debug)]
struct AlreadyReported;

impl core::fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("failure already reported to chat")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();
    let args = Args::parse();

    if std::env::var_os("GITHUB_ACTIONS").is_some_and(|v| v == "true") {
        tracing::info!(target: "monitor", "running under GitHub Actions");
    } else {
        tracing::info!(target: "monitor", "running locally");
    }

    // nothing may touch the network until the configuration is complete
    let config = Config::from_env()?;
    let notifier = Notifier::new(&config)?;

    tracing::info!(target: "monitor", "======== \x1b[32mSTARTING RESERVATION MONITOR\x1b[0m ========");
    notifier.send(&report::run_started()).await;

    let result = run(&config, &notifier, &args).await;

    if let Err(ref e) = result {
        tracing::error!(target: "monitor", "\x1b[31mfatal: {e:?}\x1b[0m");
        if e.downcast_ref::<AlreadyReported>().is_none() {
            notifier.send(&report::fatal(&format!("{e:#}"))).await;
        }
    }

    tracing::info!(target: "monitor", "======== \x1b[32mRUN COMPLETED\x1b[0m ========");
    result
}

async fn run(config: &Config, notifier: &Notifier, args: &Args) -> anyhow::Result<()> {
    let browser = match puppeteer::launch(!args.visible) {
        Ok(browser) => browser,
        Err(e) => {
            notifier.send(&report::browser_error()).await;
            return Err(e.context(AlreadyReported));
        }
    };

    let tab = match session(&browser).await {
        Ok(tab) => tab,
        Err(e) => {
            notifier.send(&report::browser_error()).await;
            return Err(e.context(AlreadyReported));
        }
    };

    let outcome = drive(&tab, config, notifier, args).await;

    drop(tab);
    drop(browser);
    tracing::info!(target: "monitor", "browser closed");

    outcome
}

async fn session(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = puppeteer::first_tab(browser)?;

    let user_agent = scrape::pick_user_agent();
    tracing::info!(target: "monitor", "user-agent \x1b[1;36m{user_agent}\x1b[0m");
    puppeteer::set_user_agent(&tab, user_agent).await?;

    Ok(tab)
}

async fn drive(
    tab: &Arc<Tab>,
    config: &Config,
    notifier: &Notifier,
    args: &Args,
) -> anyhow::Result<()> {
    match login::authenticate(tab, config, LOGIN_URL).await {
        Ok(LoginOutcome::Success) => {
            tracing::info!(target: "monitor", "\x1b[32mlogged in\x1b[0m");
        }
        Ok(LoginOutcome::Ambiguous) => {
            tracing::warn!(target: "monitor", "\x1b[33mambiguous login outcome, scanning anyway\x1b[0m");
            notifier.send(&report::login_ambiguous()).await;
        }
        Ok(LoginOutcome::Rejected) => {
            notifier.send(&report::login_error()).await;
            return Err(anyhow::anyhow!("login rejected").context(AlreadyReported));
        }
        Err(e) => {
            notifier.send(&report::login_error()).await;
            return Err(e.context("login flow failed").context(AlreadyReported));
        }
    }

    let found = match slots::scan(tab, RESERVATIONS_URL).await {
        Ok(found) => found,
        Err(e) => {
            // a changed site and an empty schedule both land here
            tracing::warn!(target: "monitor", "\x1b[31mscan failed\x1b[0m, treating as no availability: {e:?}");
            Vec::new()
        }
    };

    side_files(tab, args).await;

    if found.is_empty() {
        tracing::info!(target: "monitor", "no 20-22 slots this time");
        notifier.send(&report::no_availability()).await;
        return Ok(());
    }

    tracing::info!(target: "monitor", "\x1b[1;32m{} slot pattern(s) found\x1b[0m", found.len());
    for slot in &found {
        notifier.send(&report::slot_alert(slot, RESERVATIONS_URL)).await;
    }

    if args.no_reserve {
        tracing::info!(target: "monitor", "--no-reserve, leaving the click to the user");
        return Ok(());
    }

    let first = &found[0];
    match reserve::attempt(tab, first).await {
        AttemptOutcome::Clicked => {
            notifier.send(&report::reserve_success(&first.label)).await;
        }
        AttemptOutcome::NoControl | AttemptOutcome::Error => {
            notifier.send(&report::reserve_manual(&first.label)).await;
        }
    }

    Ok(())
}

async fn side_files(tab: &Arc<Tab>, args: &Args) {
    if let Some(path) = &args.screenshot {
        match puppeteer::screenshot_png(tab).await {
            Ok(png) => match std::fs::write(path, png) {
                Ok(()) => tracing::info!(target: "monitor", "screenshot saved to {}", path.display()),
                Err(e) => tracing::warn!(target: "monitor", "screenshot write failed: {e}"),
            },
            Err(e) => tracing::warn!(target: "monitor", "screenshot capture failed: {e:?}"),
        }
    }

    if let Some(path) = &args.dump_html {
        match puppeteer::page_content(tab).await {
            Ok(html) => match std::fs::write(path, html) {
                Ok(()) => tracing::info!(target: "monitor", "markup dumped to {}", path.display()),
                Err(e) => tracing::warn!(target: "monitor", "markup write failed: {e}"),
            },
            Err(e) => tracing::warn!(target: "monitor", "markup capture failed: {e:?}"),
        }
    }
}

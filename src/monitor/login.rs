use std::sync::Arc;

use headless_chrome::{Element, Tab};
use pmon::{config::Config, scrape::puppeteer};
use tokio::time::sleep;

const PAGE_SETTLE: core::time::Duration = core::time::Duration::from_secs(5);
const FIELD_WAIT: core::time::Duration = core::time::Duration::from_secs(10);
const SUBMIT_SETTLE: core::time::Duration = core::time::Duration::from_secs(3);

/// The site has no stable markup across revisions, so the login fields are
/// hunted with an ordered list of guesses, most specific first.
struct Strategy {
    tag: &'static str,
    user: &'static str,
    password: &'static str,
    submit: &'static str,
}

#[rustfmt::skip]
static STRATEGIES: [Strategy; 4] = [
    Strategy { tag: "field-name", user: r#"input[name="usuario"]"#, password: r#"input[name="password"]"#, submit: r#"button[type="submit"]"# },
    Strategy { tag: "element-id", user: "#username", password: "#password", submit: "#btnLogin" },
    Strategy { tag: "input-type", user: r#"input[type="text"], input[type="email"]"#, password: r#"input[type="password"]"#, submit: r#"button[type="submit"], input[type="submit"]"# },
    Strategy { tag: "tag-order", user: "input", password: "input ~ input", submit: "button" },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Submitted, but the page gave no readable signal either way. The run
    /// goes on, loudly, because scanning unauthenticated looks exactly like
    /// an empty schedule.
    Ambiguous,
    Rejected,
}

pub async fn authenticate(
    tab: &Arc<Tab>,
    config: &Config,
    url: &'static str,
) -> anyhow::Result<LoginOutcome> {
    tracing::info!(target: "login", "opening {url}");
    puppeteer::navigate_to(tab, url.into()).await?;
    sleep(PAGE_SETTLE).await;

    if puppeteer::wait_for_async(tab, "input".into(), FIELD_WAIT)
        .await
        .is_err()
    {
        tracing::warn!(target: "login", "\x1b[31mno input fields on the login page\x1b[0m");
        return Ok(LoginOutcome::Rejected);
    }

    let Some((strategy, user_field, password_field)) = locate_fields(tab).await else {
        tracing::warn!(target: "login", "\x1b[31mno locator strategy matched\x1b[0m");
        return Ok(LoginOutcome::Rejected);
    };
    tracing::info!(target: "login", "fields located via \x1b[36m{}\x1b[0m", strategy.tag);

    puppeteer::focus_async(tab, &user_field).await?;
    puppeteer::type_str_async(tab, config.club_user.to_string()).await?;
    puppeteer::focus_async(tab, &password_field).await?;
    puppeteer::type_str_async(tab, config.club_password.to_string()).await?;

    let before = tab.get_url();

    match puppeteer::find_async(tab, strategy.submit.into()).await {
        Ok(submit) => {
            puppeteer::click_async(tab, &submit).await?;
            tracing::info!(target: "login", "submitted via {:?}", strategy.submit);
        }
        Err(_) => {
            puppeteer::focus_async(tab, &password_field).await?;
            puppeteer::press_key_async(tab, "Enter").await?;
            tracing::info!(target: "login", "no submit control, sent Enter");
        }
    }
    sleep(SUBMIT_SETTLE).await;

    let page = puppeteer::page_content(tab).await.unwrap_or_default();
    let outcome = judge_outcome(&before, &tab.get_url(), &page.to_lowercase());
    tracing::info!(target: "login", "outcome: \x1b[33m{outcome:?}\x1b[0m");
    Ok(outcome)
}

async fn locate_fields<'tab>(
    tab: &'tab Arc<Tab>,
) -> Option<(&'static Strategy, Element<'tab>, Element<'tab>)> {
    for strategy in &STRATEGIES {
        let Ok(user_field) = puppeteer::find_async(tab, strategy.user.into()).await else {
            continue;
        };
        let Ok(password_field) = puppeteer::find_async(tab, strategy.password.into()).await else {
            continue;
        };
        return Some((strategy, user_field, password_field));
    }
    None
}

const REJECT_MARKERS: [&str; 5] = [
    "credenciales",
    "contraseña incorrecta",
    "incorrect",
    "invalid",
    "error",
];

const SUCCESS_MARKERS: [&str; 6] = [
    "cerrar sesión",
    "cerrar sesion",
    "logout",
    "mi cuenta",
    "account",
    "salir",
];

/// The site has no authoritative logged-in signal. Rejection text wins,
/// then account/logout text, then a URL change. Anything else is
/// ambiguous, not success.
pub fn judge_outcome(before_url: &str, after_url: &str, page_lower: &str) -> LoginOutcome {
    if REJECT_MARKERS.iter().any(|m| page_lower.contains(m)) {
        return LoginOutcome::Rejected;
    }
    if SUCCESS_MARKERS.iter().any(|m| page_lower.contains(m)) {
        return LoginOutcome::Success;
    }
    if before_url != after_url {
        return LoginOutcome::Success;
    }
    LoginOutcome::Ambiguous
}

#[cfg(test)]
mod tests {
    use super::{LoginOutcome, judge_outcome};

    const URL: &str = "https://tuclub.com/login";

    #[test]
    fn rejection_text_beats_everything() {
        let page = "<p>usuario o contraseña incorrecta</p> <a>mi cuenta</a>";
        assert_eq!(
            judge_outcome(URL, "https://tuclub.com/home", page),
            LoginOutcome::Rejected,
        );
    }

    #[test]
    fn account_text_means_success() {
        let page = "<nav><a href=\"/logout\">cerrar sesión</a></nav>";
        assert_eq!(judge_outcome(URL, URL, page), LoginOutcome::Success);
    }

    #[test]
    fn url_change_alone_means_success() {
        assert_eq!(
            judge_outcome(URL, "https://tuclub.com/inicio", "<p>bienvenido</p>"),
            LoginOutcome::Success,
        );
    }

    #[test]
    fn no_signal_is_ambiguous_not_success() {
        assert_eq!(
            judge_outcome(URL, URL, "<p>bienvenido</p>"),
            LoginOutcome::Ambiguous,
        );
    }
}

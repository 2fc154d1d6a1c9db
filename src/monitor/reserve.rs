use std::{borrow::Cow, sync::Arc};

use headless_chrome::Tab;
use pmon::scrape::puppeteer;
use serde_json::Value;
use tokio::time::sleep;

use crate::slots::SlotMatch;

const CONFIRM_SETTLE: core::time::Duration = core::time::Duration::from_secs(2);

const CONFIRM_XPATH: &str =
    "//button[contains(text(), 'Confirmar') or contains(text(), 'confirmar')]";

/// Climbs from the matched text node towards the root, clicking the first
/// control that reads like a reserve button. Returns whether a click landed.
const CLICK_NEARBY_RESERVE: &str = r"function() {
    let node = this;
    for (let depth = 0; node && depth < 8; ++depth) {
        if (node.querySelectorAll) {
            for (const control of node.querySelectorAll('button, a, input[type=submit]')) {
                const label = ((control.innerText || control.value) || '').toLowerCase();
                if (label.includes('reservar') || label.includes('reserva') || label.includes('book')) {
                    control.click();
                    return true;
                }
            }
        }
        node = node.parentElement;
    }
    return false;
}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A reserve control was clicked. The booking is NOT verified
    /// server-side; the user has to check the club account.
    Clicked,
    NoControl,
    Error,
}

pub async fn attempt(tab: &Arc<Tab>, slot: &SlotMatch) -> AttemptOutcome {
    tracing::info!(target: "reserve", "trying to claim \x1b[36m{}\x1b[0m", slot.label);

    let candidates = match puppeteer::find_all_xpath(tab, contains_text_xpath(&slot.label)).await {
        Ok(elements) => elements,
        Err(e) => {
            tracing::warn!(target: "reserve", "\x1b[31mcandidate lookup failed\x1b[0m: {e:?}");
            return AttemptOutcome::Error;
        }
    };
    if candidates.is_empty() {
        tracing::warn!(target: "reserve", "matched text is gone from the live page");
        return AttemptOutcome::NoControl;
    }

    for candidate in &candidates {
        let clicked = puppeteer::call_js_on(
            tab,
            candidate.remote_object_id.clone(),
            CLICK_NEARBY_RESERVE,
        )
        .await;

        match clicked {
            Ok(Some(Value::Bool(true))) => {
                tracing::info!(target: "reserve", "\x1b[32mclicked reserve near {}\x1b[0m", slot.label);
                confirm_if_prompted(tab).await;
                return AttemptOutcome::Clicked;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(target: "reserve", "click attempt failed: {e:?}");
                return AttemptOutcome::Error;
            }
        }
    }

    tracing::warn!(target: "reserve", "no reserve control near {} candidates", candidates.len());
    AttemptOutcome::NoControl
}

/// Some revisions of the site pop a confirmation dialog, some book on the
/// first click. Missing dialog still counts as done.
async fn confirm_if_prompted(tab: &Arc<Tab>) {
    sleep(CONFIRM_SETTLE).await;

    match puppeteer::find_all_xpath(tab, CONFIRM_XPATH.into()).await {
        Ok(buttons) => {
            if let Some(button) = buttons.first() {
                match puppeteer::click_async(tab, button).await {
                    Ok(()) => tracing::info!(target: "reserve", "confirmation accepted"),
                    Err(e) => tracing::warn!(target: "reserve", "confirmation click failed: {e:?}"),
                }
            } else {
                tracing::info!(target: "reserve", "no confirmation dialog");
            }
        }
        Err(e) => tracing::warn!(target: "reserve", "confirmation lookup failed: {e:?}"),
    }
}

fn contains_text_xpath(label: &str) -> Cow<'static, str> {
    // labels come from the fixed pattern list or collapsed element text;
    // stripping quotes keeps the expression well-formed either way
    let clean = label.replace(['"', '\''], "");
    format!(r#"//*[contains(text(), "{clean}")]"#).into()
}

#[cfg(test)]
mod tests {
    use super::contains_text_xpath;

    #[test]
    fn xpath_embeds_the_label() {
        assert_eq!(
            contains_text_xpath("20:00 a 22:00"),
            r#"//*[contains(text(), "20:00 a 22:00")]"#,
        );
    }

    #[test]
    fn quotes_cannot_break_the_expression() {
        let xpath = contains_text_xpath(r#"turno "20hs" d'oro"#);
        assert_eq!(xpath, r#"//*[contains(text(), "turno 20hs doro")]"#);
    }
}

use std::sync::{Arc, LazyLock};

use compact_str::CompactString;
use headless_chrome::Tab;
use pmon::{scrape::puppeteer, util};
use regex::Regex;
use scraper::{Html, Node, Selector};
use tokio::time::sleep;

/// Every spelling of the 20-22 window the club site has been seen to use.
pub const TIME_PATTERNS: [&str; 10] = [
    "20:00", "20 hs", "20hs", "20.00",
    "20 a 22", "20-22", "20:00 a 22:00",
    "8 pm", "20h", "20:00hs",
];

const CONTEXT_PAD: usize = 60;
const LABEL_MAX: usize = 48;
const WIDGET_TEXT_MAX: usize = 120;

static SLOT_WIDGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b20\s*(?:[:.]00|hs?\b)|\b20\s*(?:a|-)\s*22\b|\b8\s*pm\b").unwrap()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchSource {
    TextPattern,
    DomElement,
}

/// One notification-worthy hit. Lives for the run, then is discarded.
#[derive(Clone, Debug)]
pub struct SlotMatch {
    pub label: CompactString,
    pub occurrences: usize,
    pub context: Option<String>,
    pub source: MatchSource,
}

/// Literal substring pass over the rendered markup, case-insensitive.
/// Patterns are counted independently, so "20:00 a 22:00" also scores
/// "20:00"; the notifier reports each spelling on its own, like the
/// original alerts did.
pub fn scan_text(page: &str) -> Vec<SlotMatch> {
    let lower = page.to_lowercase();
    let mut found = Vec::new();

    for pattern in TIME_PATTERNS {
        let mut indices = lower.match_indices(pattern);
        let Some((first, _)) = indices.next() else {
            continue;
        };
        let occurrences = 1 + indices.count();
        let context = util::collapse_ws(util::char_window(
            &lower,
            first,
            first + pattern.len(),
            CONTEXT_PAD,
        ));

        tracing::info!(target: "scan", "\x1b[32mpattern hit\x1b[0m {pattern:?} x{occurrences}");
        found.push(SlotMatch {
            label: pattern.into(),
            occurrences,
            context: Some(context),
            source: MatchSource::TextPattern,
        });
    }

    found
}

/// Element-level pass for slot widgets that render the window with spacing
/// or separators the literal list misses. Only an element's own text nodes
/// count, so a hit names the widget and not its whole ancestor chain.
pub fn scan_dom(html: &str) -> Vec<SlotMatch> {
    let document = Html::parse_document(html);
    let any = Selector::parse("*").unwrap();
    let mut found = Vec::new();

    for element in document.select(&any) {
        let mut own_text = String::new();
        for child in element.children() {
            if let Node::Text(text) = child.value() {
                own_text.push_str(text);
            }
        }

        let own_text = util::collapse_ws(&own_text);
        if own_text.is_empty()
            || own_text.chars().count() > WIDGET_TEXT_MAX
            || !SLOT_WIDGET.is_match(&own_text)
        {
            continue;
        }

        tracing::info!(target: "scan", "\x1b[32mwidget hit\x1b[0m <{}> {own_text:?}", element.value().name());
        found.push(SlotMatch {
            label: util::truncate_chars(&own_text, LABEL_MAX).into(),
            occurrences: 1,
            context: None,
            source: MatchSource::DomElement,
        });
    }

    found
}

/// Both passes over one snapshot of the page, deduplicated: a widget whose
/// text repeats a literal pattern already found is the same slot, not a new
/// one.
pub fn scan_page(html: &str) -> Vec<SlotMatch> {
    let mut found = scan_text(html);

    let mut seen = found
        .iter()
        .map(|m| m.label.clone())
        .collect::<hashbrown::HashSet<_>>();

    for widget in scan_dom(html) {
        let lower = widget.label.to_lowercase();
        if found
            .iter()
            .filter(|m| m.source == MatchSource::TextPattern)
            .any(|m| lower.contains(m.label.as_str()))
        {
            continue;
        }
        if seen.insert(widget.label.clone()) {
            found.push(widget);
        }
    }

    found
}

/// Navigate to the reservations page and scan its rendered content. Callers
/// treat an `Err` as "nothing found"; a changed site and an empty schedule
/// are indistinguishable from here.
pub async fn scan(tab: &Arc<Tab>, url: &'static str) -> anyhow::Result<Vec<SlotMatch>> {
    tracing::info!(target: "scan", "looking for 20-22 slots at {url}");

    puppeteer::navigate_to(tab, url.into()).await?;
    sleep(const { core::time::Duration::from_secs(4) }).await;

    let html = puppeteer::page_content(tab).await?;
    tracing::info!(target: "scan", "captured {} bytes of rendered markup", html.len());

    Ok(scan_page(&html))
}

#[cfg(test)]
mod tests {
    use super::{MatchSource, TIME_PATTERNS, scan_dom, scan_page, scan_text};

    #[test]
    fn literal_window_is_reported() {
        let page = "<html><body><td>Cancha 3: 20:00 a 22:00</td></body></html>";
        let found = scan_text(page);

        let hit = found
            .iter()
            .find(|m| m.label == "20:00 a 22:00")
            .expect("full spelling reported");
        assert!(hit.occurrences >= 1);
        assert_eq!(hit.source, MatchSource::TextPattern);
        assert!(hit.context.as_deref().unwrap().contains("20:00 a 22:00"));

        // the embedded short spelling counts on its own
        assert!(found.iter().any(|m| m.label == "20:00"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let found = scan_text("PARTIDO A LAS 8 PM EN CANCHA 1");
        assert!(found.iter().any(|m| m.label == "8 pm"));
    }

    #[test]
    fn occurrences_are_counted() {
        let found = scan_text("20hs ... 20hs ... 20hs");
        let hit = found.iter().find(|m| m.label == "20hs").unwrap();
        assert_eq!(hit.occurrences, 3);
    }

    #[test]
    fn clean_page_yields_nothing() {
        let page = "<html><body>\
            <td>18:00 a 19:30</td><td>22:30</td>\
            <p>temporada 2022, cancha 20</p>\
            </body></html>";
        assert!(scan_page(page).is_empty());
    }

    #[test]
    fn spaced_widget_is_caught_by_dom_pass() {
        // double spacing defeats the literal list but not the element scan
        let page = "<html><body><table><tr><td>20  a  22</td></tr></table></body></html>";

        assert!(scan_text(page).is_empty());

        let found = scan_page(page);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, MatchSource::DomElement);
        assert_eq!(found[0].occurrences, 1);
        assert_eq!(found[0].label, "20 a 22");
    }

    #[test]
    fn widget_repeating_a_literal_hit_is_deduplicated() {
        let page = "<html><body><div><span>20:00</span></div></body></html>";
        let found = scan_page(page);

        assert!(!found.is_empty());
        assert!(found.iter().all(|m| m.source == MatchSource::TextPattern));
    }

    #[test]
    fn dom_pass_ignores_container_elements() {
        // the hour lives in the span's own text; body/div contribute none
        let page = "<html><body><div><span>hoy 20:00hs</span></div></body></html>";
        let widgets = scan_dom(page);
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].label, "hoy 20:00hs");
    }

    #[test]
    fn every_allow_listed_spelling_matches_itself() {
        for pattern in TIME_PATTERNS {
            let page = format!("<p>turno {pattern} libre</p>");
            assert!(
                scan_text(&page).iter().any(|m| m.label == pattern),
                "{pattern} should match",
            );
        }
    }
}

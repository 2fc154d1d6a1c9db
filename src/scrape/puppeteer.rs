use std::{borrow::Cow, ffi::OsStr, sync::Arc, time::Duration};

use headless_chrome::{
    Browser, Element, LaunchOptions, Tab,
    browser::tab::NoElementFound,
    protocol::cdp::{Page, Runtime},
};
use serde_json::Value;
use tokio::{task::spawn_blocking, time::sleep};

/// Launch Chrome dressed up as a regular desktop session. The sandbox is off
/// and `/dev/shm` unused so the same binary runs inside CI containers.
pub fn launch(headless: bool) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
        ],
        headless,
        sandbox: false,
        window_size: Some((1920, 1080)),
        ..LaunchOptions::default()
    })
}

#[allow(clippy::significant_drop_tightening)]
pub fn first_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    {
        let tabs_guard = browser
            .get_tabs()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for remain in &*tabs_guard {
            if !Arc::ptr_eq(&tab, remain) {
                remain.close(true)?;
            }
        }
    }

    Ok(tab)
}

pub async fn navigate_to(tab: &Arc<Tab>, url: Cow<'static, str>) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.navigate_to(&url).map(|_| ())).await?
}

pub async fn set_user_agent(tab: &Arc<Tab>, user_agent: &'static str) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.set_user_agent(user_agent, None, None)).await?
}

pub async fn find_async<'tab>(
    tab: &'tab Arc<Tab>,
    selector: Cow<'static, str>,
) -> anyhow::Result<Element<'tab>> {
    let arc_tab = Arc::clone(tab);

    let result = spawn_blocking(move || {
        match arc_tab.find_element(&selector) {
            Ok(element) => Ok((element.remote_object_id, element.backend_node_id, element.node_id, element.attributes, element.tag_name, element.value)),
            Err(err) => Err(err)
        }
    }).await?;

    match result {
        Ok((remote_object_id, backend_node_id, node_id, attributes, tag_name, value)) => Ok(Element { remote_object_id, backend_node_id, node_id, parent: tab.as_ref(), attributes, tag_name, value }),
        Err(err) => Err(err),
    }
}

pub async fn find_all_xpath<'tab>(
    tab: &'tab Arc<Tab>,
    query: Cow<'static, str>,
) -> anyhow::Result<Vec<Element<'tab>>> {
    let arc_tab = Arc::clone(tab);

    let parts = spawn_blocking(move || {
        arc_tab.find_elements_by_xpath(&query).map(|elements| {
            elements
                .into_iter()
                .map(|element| (element.remote_object_id, element.backend_node_id, element.node_id, element.attributes, element.tag_name, element.value))
                .collect::<Vec<_>>()
        })
    }).await??;

    Ok(parts
        .into_iter()
        .map(|(remote_object_id, backend_node_id, node_id, attributes, tag_name, value)| Element {
            remote_object_id,
            backend_node_id,
            node_id,
            parent: tab.as_ref(),
            attributes,
            tag_name,
            value,
        })
        .collect())
}

/// Poll for `selector` until it appears or `timeout` elapses. The only
/// bounded wait in the whole flow; everything else is fixed sleeps.
pub async fn wait_for_async<'tab>(
    tab: &'tab Arc<Tab>,
    selector: Cow<'static, str>,
    timeout: Duration,
) -> anyhow::Result<Element<'tab>> {
    const PERIOD: Duration = Duration::from_millis(1832 / 4);

    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match find_async(tab, selector.clone()).await {
            Ok(element) => break Ok(element),
            Err(err) => {
                if !err.is::<NoElementFound>() {
                    break Err(err);
                }
                if tokio::time::Instant::now() >= deadline {
                    break Err(err.context(format!("no {selector:?} after {timeout:?}")));
                }
            }
        }

        sleep(PERIOD).await;
    }
}

/// Run a zero-argument JS function with the element as `this`, returning its
/// value by serialization.
pub async fn call_js_on(
    tab: &Arc<Tab>,
    remote_object_id: Runtime::RemoteObjectId,
    function_declaration: &'static str,
) -> anyhow::Result<Option<Value>> {
    let tab = Arc::clone(tab);

    let ret = spawn_blocking(move ||
        tab.call_method(Runtime::CallFunctionOn {
            object_id: Some(remote_object_id),
            function_declaration: function_declaration.to_owned(),
            arguments: Some(Vec::new()),
            return_by_value: Some(true),
            generate_preview: Some(false),
            silent: Some(false),
            await_promise: Some(false),
            user_gesture: Some(true),
            execution_context_id: None,
            object_group: None,
            throw_on_side_effect: None,
            serialization_options: None,
            unique_context_id: None,
        })
    ).await??;

    Ok(ret.result.value)
}

pub async fn click_async(tab: &Arc<Tab>, element: &Element<'_>) -> anyhow::Result<()> {
    call_js_on(tab, element.remote_object_id.clone(), "function(){this.click()}").await?;
    Ok(())
}

pub async fn focus_async(tab: &Arc<Tab>, element: &Element<'_>) -> anyhow::Result<()> {
    call_js_on(tab, element.remote_object_id.clone(), "function(){this.focus()}").await?;
    Ok(())
}

pub async fn type_str_async(tab: &Arc<Tab>, text: String) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.type_str(&text).map(|_| ())).await?
}

pub async fn press_key_async(tab: &Arc<Tab>, key: &'static str) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.press_key(key).map(|_| ())).await?
}

pub async fn page_content(tab: &Arc<Tab>) -> anyhow::Result<String> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.get_content()).await?
}

pub async fn screenshot_png(tab: &Arc<Tab>) -> anyhow::Result<Vec<u8>> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || {
        tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
    })
    .await?
}

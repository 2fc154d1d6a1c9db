use compact_str::CompactString;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::Config;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Bot API transport. Delivery is best-effort: failures of any kind are
/// logged and reported as `false`, never raised, so a dead chat endpoint
/// cannot take the monitor down with it.
pub struct Notifier {
    client: Client,
    token: CompactString,
    chat_id: CompactString,
    api_base: String,
}

impl Notifier {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Self::with_api_base(config, TELEGRAM_API.to_owned())
    }

    pub fn with_api_base(config: &Config, api_base: String) -> reqwest::Result<Self> {
        Ok(Self {
            client: crate::scrape::basic()?,
            token: config.telegram_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
            api_base,
        })
    }

    pub async fn send(&self, text: &str) -> bool {
        #[derive(Serialize)]
        struct Payload<'a> {
            chat_id: &'a str,
            text: &'a str,
            parse_mode: &'static str,
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let payload = Payload {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                log::info!(target: "telegram", "\x1b[36mmessage delivered\x1b[0m ({} chars)", text.chars().count());
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                log::warn!(target: "telegram", "\x1b[31mrejected\x1b[0m with {status}: {}", body.trim());
                false
            }
            Err(e) => {
                log::warn!(target: "telegram", "\x1b[31msend failed\x1b[0m: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::post};

    use super::Notifier;
    use crate::config::Config;

    fn test_config() -> Config {
        Config::from_lookup(|name| {
            Some(
                match name {
                    "TELEGRAM_TOKEN" => "42:testtoken",
                    "TELEGRAM_CHAT_ID" => "7",
                    _ => "x",
                }
                .to_owned(),
            )
        })
        .unwrap()
    }

    async fn stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn ok_response_counts_as_delivered() {
        let router = Router::new().route(
            "/bot{token}/sendMessage",
            post(|| async { (StatusCode::OK, r#"{"ok":true}"#) }),
        );
        let base = stub(router).await;

        let notifier = Notifier::with_api_base(&test_config(), base).unwrap();
        assert!(notifier.send("🎾 <b>prueba</b>").await);
    }

    #[tokio::test]
    async fn non_200_is_swallowed_not_raised() {
        let router = Router::new().route(
            "/bot{token}/sendMessage",
            post(|| async { (StatusCode::FORBIDDEN, r#"{"ok":false}"#) }),
        );
        let base = stub(router).await;

        let notifier = Notifier::with_api_base(&test_config(), base).unwrap();
        assert!(!notifier.send("hola").await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_swallowed() {
        // nothing listens here
        let notifier =
            Notifier::with_api_base(&test_config(), "http://127.0.0.1:1".to_owned()).unwrap();
        assert!(!notifier.send("hola").await);
    }
}

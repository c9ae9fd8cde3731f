use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use state::Observation;
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "坤哥发现又有新货上架了，速速来看！！！";

const API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("telegram rejected message: status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Outbound alert channel. The monitor loop only sees this seam, so tests
/// drive it with a recording implementation.
#[async_trait]
pub trait Alerter: Send + Sync {
    /// Deliver one consolidated message for the given snapshot. The caller
    /// has already sorted the snapshot into its display order.
    async fn send_snapshot(&self, observations: &[Observation]) -> Result<(), NotifyError>;
}

/// Sends via the Bot API `sendMessage` call, one inline url-button per item.
pub struct TelegramNotifier {
    http: reqwest::Client,
    endpoint: String,
    chat_id: String,
    title: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str, title: &str) -> Result<Self, reqwest::Error> {
        Self::with_api_base(API_BASE, token, chat_id, title)
    }

    /// Point at a different Bot API host (self-hosted bot-api servers).
    pub fn with_api_base(
        base: &str,
        token: &str,
        chat_id: &str,
        title: &str,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: format!("{base}/bot{token}/sendMessage"),
            chat_id: chat_id.to_string(),
            title: title.to_string(),
        })
    }
}

#[async_trait]
impl Alerter for TelegramNotifier {
    async fn send_snapshot(&self, observations: &[Observation]) -> Result<(), NotifyError> {
        let reply_markup = inline_keyboard(observations).to_string();
        let params = [
            ("chat_id", self.chat_id.as_str()),
            ("text", self.title.as_str()),
            ("reply_markup", reply_markup.as_str()),
        ];
        let response = self.http.post(&self.endpoint).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }
        Ok(())
    }
}

/// `{name}|库存{stock}|价格：{price}`, with 未知 standing in for the
/// price-unknown sentinel.
pub fn button_label(obs: &Observation) -> String {
    let price_text = if obs.price_known() {
        format!("¥{}", obs.price)
    } else {
        "未知".to_string()
    };
    format!("{}|库存{}|价格：{}", obs.name, obs.stock, price_text)
}

fn inline_keyboard(observations: &[Observation]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = observations
        .iter()
        .map(|obs| json!([{ "text": button_label(obs), "url": obs.url }]))
        .collect();
    json!({ "inline_keyboard": rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(name: &str, url: &str, stock: u32, price: f64) -> Observation {
        Observation {
            url: url.to_string(),
            name: name.to_string(),
            stock,
            price,
            fetched_at_ms: 0,
        }
    }

    #[test]
    fn label_with_known_price() {
        let label = button_label(&obs("小黑子注册码", "https://example.com/buy/5", 12, 19.9));
        assert_eq!(label, "小黑子注册码|库存12|价格：¥19.9");
    }

    #[test]
    fn label_with_unknown_price() {
        let label = button_label(&obs("小黑子续费码", "https://example.com/buy/6", 3, 0.0));
        assert_eq!(label, "小黑子续费码|库存3|价格：未知");
    }

    #[test]
    fn keyboard_has_one_button_row_per_item_in_order() {
        let keyboard = inline_keyboard(&[
            obs("a", "https://example.com/a", 1, 2.0),
            obs("b", "https://example.com/b", 3, 0.0),
        ]);

        let rows = keyboard["inline_keyboard"].as_array().expect("rows");
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.as_array().expect("row").len(), 1);
        }
        assert_eq!(rows[0][0]["url"], "https://example.com/a");
        assert_eq!(rows[0][0]["text"], "a|库存1|价格：¥2");
        assert_eq!(rows[1][0]["url"], "https://example.com/b");
        assert_eq!(rows[1][0]["text"], "b|库存3|价格：未知");
    }
}

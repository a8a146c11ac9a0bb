use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use url::Url;

/// Split long messages for Telegram's 4096 char limit
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Bot API client sharing the bridge's HTTP client and pointed at `api_url`.
pub fn create_bot(http: reqwest::Client, token: &str, api_url: &Url) -> Bot {
    Bot::with_client(token, http).set_api_url(api_url.clone())
}

/// Send a possibly oversized report as consecutive messages.
pub async fn send_chunked(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    parse_mode: Option<ParseMode>,
) -> Result<()> {
    for chunk in split_message(text, 4000) {
        let mut request = bot.send_message(chat_id, chunk);
        if let Some(mode) = parse_mode {
            request = request.parse_mode(mode);
        }
        request
            .await
            .context("Failed to send Telegram message")?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::{api_method, mount_bot_api};
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bot_for(server: &MockServer) -> Bot {
        let url = Url::parse(&server.uri()).unwrap();
        create_bot(reqwest::Client::new(), "123:abc", &url)
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_on_newline() {
        let chunks = split_message("line one\nline two\nline three", 12);
        assert_eq!(chunks.concat(), "line one\nline two\nline three");
        assert!(chunks.iter().all(|c| c.len() <= 12));
        assert_eq!(chunks[0], "line one\n");
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "أهلاً بك ".repeat(50);
        let chunks = split_message(&text, 64);
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn test_send_chunked_uses_token_path_and_parse_mode() {
        let server = MockServer::start().await;
        mount_bot_api(&server).await;

        #[allow(deprecated)]
        let mode = ParseMode::Markdown;
        send_chunked(&bot_for(&server), ChatId(42), "*hi*", Some(mode))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.path().starts_with("/bot123:abc/"));
        assert_eq!(api_method(&requests[0]), "sendmessage");

        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["chat_id"], 42);
        assert_eq!(body["text"], "*hi*");
        assert_eq!(body["parse_mode"], "Markdown");
    }

    #[tokio::test]
    async fn test_send_chunked_splits_long_reports() {
        let server = MockServer::start().await;
        mount_bot_api(&server).await;

        let report = "row of stats\n".repeat(700);
        send_chunked(&bot_for(&server), ChatId(42), &report, None)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests.len() >= 3);
        let sent: String = requests
            .iter()
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                body["text"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(sent, report);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let result = send_chunked(&bot_for(&server), ChatId(1), "x", None).await;
        assert!(result.is_err());
    }
}

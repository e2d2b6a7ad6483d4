use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use image::imageops::FilterType;
use reqwest::Client;
use serde_json::{Value, json};
use std::fmt::Write;
use std::io::Cursor;
use tracing::{debug, info, warn};

use vision_rpa::{Action, ActionBatch, PlanError, PlanRequest, Planner, Screenshot};

/// Screenshots are scaled to this width before upload.
const IMAGE_WIDTH: u32 = 1080;

const SYSTEM_PROMPT: &str = r#"You are a browser automation assistant. Your job is to determine the next course of action for the task given to you. The set of actions that you are able to take are click, type, wait, error, or finish.
- Select click as the next action when you need to click something on the screen to best proceed with the given task
- Select type as the next action when you need to type something to best proceed with the given task
- Select finish as the next action when the given task has been successfully accomplished
- Select error as the next action when you have run into an unrecoverable error
- Select wait as the next action when you need to wait, for example if the page is loading

You will be given a screenshot of the current page, the previous actions you have taken and a summary of your exploration progress.

CRITICAL RULE FOR INPUT FIELDS: Before typing into ANY input field (username, password, search box, text area, etc.), you MUST first click on that field to focus it. Always return a click action followed by a type action when filling in forms. Never return a type action alone for input fields.

Examples of correct action sequences:
- Login form: [{"action":"click","text":"AB","explanation":"Click username field"}, {"action":"type","text":"admin","explanation":"Enter username"}, {"action":"click","text":"CD","explanation":"Click password field"}, {"action":"type","text":"password123","explanation":"Enter password"}, {"action":"click","text":"EF","explanation":"Click login button"}]
- Search box: [{"action":"click","text":"AB","explanation":"Click search field"}, {"action":"type","text":"my query","explanation":"Enter search term"}, {"action":"click","text":"CD","explanation":"Click search button"}]

To determine the best next action:

## Step 1
List the steps needed to accomplish the task from the current page, broken down into the simplest steps. Every input field takes TWO steps: click the field, then type the text.

## Step 2
Take the first step from that list and pick the action (click, type, wait, error, or finish) that moves the task forward.
To click something, find the yellow box attached to the item and use only the characters inside that yellow box.
If the exploration summary lists BLOCKED actions, never propose them again.

## Step 3
Return the chosen actions as JSON in this format: [{ "action": "ACTION_GOES_HERE", "text": "VALUE_HERE", "explanation": "EXPLANATION_GOES_HERE" }]. The yellow box characters and any text to type both go into the text property. Keep explanations brief. Return JSON only, not inside a code block."#;

/// Planner backed by an OpenAI-compatible vision chat endpoint.
pub struct VisionPlanner {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl VisionPlanner {
    pub fn new(base_url: &str, api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            max_tokens,
        }
    }

    async fn complete(&self, body: &Value) -> Result<String, PlanError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| PlanError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlanError::Transport(e.to_string()))?;
        read_reply(status.as_u16(), &body)
    }
}

/// Extract the message content from a chat-completions reply. The status is
/// checked before the body is decoded so gateway errors keep their code.
fn read_reply(status: u16, body: &str) -> Result<String, PlanError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| {
                let text: String = body.trim().chars().take(200).collect();
                if text.is_empty() {
                    "Unknown API error".to_string()
                } else {
                    text
                }
            });
        return Err(PlanError::Api { status, message });
    }

    let json_resp: Value = serde_json::from_str(body)?;

    let usage = &json_resp["usage"];
    if let Some(total) = usage["total_tokens"].as_u64() {
        info!(
            total,
            prompt = usage["prompt_tokens"].as_u64().unwrap_or(0),
            completion = usage["completion_tokens"].as_u64().unwrap_or(0),
            "token usage"
        );
    }

    json_resp["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or(PlanError::MissingContent)
}

#[async_trait]
impl Planner for VisionPlanner {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<ActionBatch, PlanError> {
        let image_url = format!("data:image/png;base64,{}", encode_screenshot(request.screenshot));
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": [
                    {"type": "text", "text": user_prompt(&request)},
                    {"type": "image_url", "image_url": {"url": image_url}},
                ]},
            ],
        });

        let content = self.complete(&body).await?;
        debug!("model replied: {}", content);
        ActionBatch::parse(&content)
    }
}

fn user_prompt(request: &PlanRequest<'_>) -> String {
    format!(
        "Your task is: {}. The previous actions you took are: {}\n{}\nDetermine the next best action to take given a screenshot of the current page you are on. Remember to respond in JSON only.",
        request.task,
        render_previous(request.previous_actions),
        request.state_summary,
    )
}

fn render_previous(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "none".to_string();
    }
    let mut out = String::new();
    for action in actions {
        let _ = write!(
            out,
            "The action: {}. Explanation of why you took that action: {}\n\n",
            action,
            action.rationale()
        );
    }
    out
}

/// Scale to [`IMAGE_WIDTH`] and base64-encode. Falls back to the original
/// bytes when the image cannot be decoded.
fn encode_screenshot(screenshot: &Screenshot) -> String {
    match resize_png(screenshot.as_png(), IMAGE_WIDTH) {
        Ok(png) => STANDARD.encode(png),
        Err(e) => {
            warn!("screenshot resize failed, sending original: {}", e);
            STANDARD.encode(screenshot.as_png())
        }
    }
}

fn resize_png(png: &[u8], width: u32) -> image::ImageResult<Vec<u8>> {
    let img = image::load_from_memory(png)?;
    let height = ((width as u64 * img.height() as u64) / img.width().max(1) as u64).max(1) as u32;
    let resized = img.resize_exact(width, height, FilterType::Triangle);
    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn resize_keeps_aspect_ratio() {
        let resized = resize_png(&png(1920, 1080), IMAGE_WIDTH).unwrap();
        let img = image::load_from_memory(&resized).unwrap();
        assert_eq!((img.width(), img.height()), (1080, 607));
    }

    #[test]
    fn undecodable_screenshot_is_sent_as_is() {
        let shot = Screenshot::from_png(b"not a png".to_vec());
        assert_eq!(encode_screenshot(&shot), STANDARD.encode(b"not a png"));
    }

    #[test]
    fn prompt_lists_previous_actions_and_summary() {
        let shot = Screenshot::from_png(Vec::new());
        let previous = vec![
            Action::click("AB", "Click username field"),
            Action::type_text("admin", "Enter username"),
        ];
        let request = PlanRequest {
            task: "Sign in",
            screenshot: &shot,
            previous_actions: &previous,
            state_summary: "Exploration progress:\n- Currently exploring: none\n",
        };
        let prompt = user_prompt(&request);
        assert!(prompt.starts_with("Your task is: Sign in."));
        assert!(prompt.contains(
            "The action: click \"AB\". Explanation of why you took that action: Click username field"
        ));
        assert!(prompt.contains("The action: type (5 chars). Explanation of why you took that action: Enter username"));
        assert!(!prompt.contains("admin"));
        assert!(prompt.contains("Currently exploring: none"));
    }

    #[test]
    fn error_status_survives_non_json_body() {
        match read_reply(502, "<html>Bad Gateway</html>") {
            Err(PlanError::Api { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "<html>Bad Gateway</html>");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn error_status_uses_api_message_when_present() {
        let body = r#"{"error":{"message":"model not loaded"}}"#;
        assert!(matches!(
            read_reply(503, body),
            Err(PlanError::Api { status: 503, ref message }) if message == "model not loaded"
        ));
        assert!(matches!(
            read_reply(500, ""),
            Err(PlanError::Api { ref message, .. }) if message == "Unknown API error"
        ));
    }

    #[test]
    fn success_reply_yields_content() {
        let body = r#"{"choices":[{"message":{"content":"[{\"action\":\"finish\"}]"}}],
            "usage":{"total_tokens":10,"prompt_tokens":8,"completion_tokens":2}}"#;
        assert_eq!(read_reply(200, body).unwrap(), r#"[{"action":"finish"}]"#);
        assert!(matches!(read_reply(200, "{}"), Err(PlanError::MissingContent)));
    }

    #[test]
    fn empty_history_renders_as_none() {
        assert_eq!(render_previous(&[]), "none");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let planner = VisionPlanner::new("http://host:8000/v1/", "k".into(), "m".into(), 16);
        assert_eq!(planner.endpoint, "http://host:8000/v1/chat/completions");
    }
}

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use vision_rpa::LoopConfig;

pub const DEFAULT_URL: &str = "http://10.160.13.192";

pub const DEFAULT_TASK: &str = r#"Your task is to follow the following series of steps:
1. Sign into the FGT. The username is "admin". The password is "fortinet".
2. Once you are signed into the FGT, check the side bar and click each one of them to expand.
3. Once expanded, click the second layer buttons to check each button's dashboard on the right.
4. Repeat steps 2-3 for every button.
5. Record any typo or incorrect English words used."#;

/// Drive a browser through a task with a vision model.
#[derive(Debug, Parser)]
#[command(name = "agent", version, about)]
pub struct Args {
    /// Page to open before the first observation.
    #[arg(long, env = "RPA_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Free-text description of what to accomplish.
    #[arg(long, env = "RPA_TASK", default_value = DEFAULT_TASK)]
    pub task: String,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "sk-fakekey", hide_env_values = true)]
    pub api_key: String,

    /// OpenAI-compatible endpoint serving the vision model.
    #[arg(long, env = "VISION_BASE_URL", default_value = "http://10.160.13.123:8000/v1")]
    pub base_url: String,

    #[arg(long, env = "VISION_MODEL", default_value = "Qwen/Qwen3-VL-4B-Instruct-FP8")]
    pub model: String,

    #[arg(long, env = "VISION_MAX_TOKENS", default_value_t = 4096)]
    pub max_tokens: u32,

    /// Pause before each screenshot, in milliseconds.
    #[arg(long, env = "RPA_SETTLE_MS", default_value_t = 1500)]
    pub settle_ms: u64,

    #[arg(long, env = "RPA_HEADLESS")]
    pub headless: bool,

    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// DevTools URL of an already running Chrome to attach to.
    #[arg(long, env = "CHROME_DEVTOOLS_URL")]
    pub attach: Option<String>,
}

impl Args {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            settle_delay: Duration::from_millis(self.settle_ms),
            ..LoopConfig::default()
        }
    }
}

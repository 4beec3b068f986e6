use super::super::value_objects::{ChatFailure, FailureKind};
use crate::shared::MIN_BROWSER_MAJOR;

const CANARY_URL: &str = "https://www.google.com/chrome/canary/";

/// 错误分类器
///
/// 领域服务：把失败映射到固定的几类说明，渲染成可直接插入对话的 HTML。
/// 纯函数，任何输入都返回非空文本，不会 panic
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    /// 版本门槛，出现在升级提示里
    min_major: u32,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(MIN_BROWSER_MAJOR)
    }
}

/// 单条说明的组成部分
struct Explanation<'a> {
    headline: String,
    solutions: &'a [String],
}

impl ErrorClassifier {
    pub fn new(min_major: u32) -> Self {
        Self { min_major }
    }

    pub fn min_major(&self) -> u32 {
        self.min_major
    }

    /// 按结构化类别渲染
    pub fn render(&self, failure: &ChatFailure) -> String {
        let detail = escape_html(&failure.detail);

        match failure.kind {
            FailureKind::CapabilityUnavailable | FailureKind::SessionUninitialized => self
                .compose(Explanation {
                    headline: format!("Error: {}", detail),
                    solutions: &[
                        "Ensure you have an active internet connection.".to_string(),
                        "Verify that the AI service is operational and not under maintenance."
                            .to_string(),
                    ],
                }),
            FailureKind::Network => self.compose(Explanation {
                headline: "Error: Network issue detected.".to_string(),
                solutions: &[
                    "Check your internet connection.".to_string(),
                    "Retry sending the message.".to_string(),
                ],
            }),
            FailureKind::Credentials => self.compose(Explanation {
                headline: "Error: Invalid AI service API key.".to_string(),
                solutions: &[
                    "Check if the AI service API key is correct.".to_string(),
                    "Obtain a valid API key from the AI service provider.".to_string(),
                ],
            }),
            FailureKind::VersionTooLow => self.compose(Explanation {
                headline: format!("Error: {}", detail),
                solutions: &[format!(
                    "Update to Chrome {} or later. You can download the latest version from \
                     <a href=\"{}\" class=\"text-blue-600 hover:underline\" target=\"_blank\" \
                     rel=\"noopener noreferrer\">Chrome Canary</a>.",
                    self.min_major, CANARY_URL
                )],
            }),
            FailureKind::StreamReadFailure | FailureKind::Unknown => self.compose(Explanation {
                headline: "An unknown error occurred.".to_string(),
                solutions: &["Try refreshing the page.".to_string()],
            }),
        }
    }

    /// 按自由文本渲染
    ///
    /// 有序子串匹配，先命中者为准；缺失或空文本走兜底分支
    pub fn render_description(&self, description: Option<&str>) -> String {
        let failure = ChatFailure::from_description(description.unwrap_or_default());
        self.render(&failure)
    }

    fn compose(&self, explanation: Explanation<'_>) -> String {
        let items: String = explanation
            .solutions
            .iter()
            .map(|s| format!("\n          <li>{}</li>", s))
            .collect();

        format!(
            r#"
    <div class="p-4 border-l-4 border-red-700">
      <div class="text-lg font-semibold text-red-700">{headline}</div>
      <div class="mt-2">
        <span class="font-semibold">Possible solutions:</span>
        <ul class="list-disc list-inside ml-4 mt-1">{items}
        </ul>
      </div>
      {tips}
    </div>
  "#,
            headline = explanation.headline,
            items = items,
            tips = self.tips(),
        )
    }

    /// 每个分支都附带的环境配置提示
    fn tips(&self) -> String {
        format!(
            r#"<div class="mt-2">
        <span class="font-semibold">Troubleshooting:</span>
        <ul class="list-disc list-inside ml-4 mt-1">
          <li>Requires Chrome {min} or later: <a href="{url}" class="text-blue-600 hover:underline" target="_blank" rel="noopener noreferrer">Chrome Canary</a></li>
          <li>Enable: <code class="bg-accent px-1 rounded">chrome://flags/#prompt-api-for-gemini-nano</code></li>
          <li>Enable: <code class="bg-accent px-1 rounded">chrome://flags/#optimization-guide-on-device-model</code></li>
          <li>Click "Optimization Guide On Device Model" in <code class="bg-accent px-1 rounded">chrome://components/</code></li>
          <li>Wait for the model to download.</li>
        </ul>
      </div>"#,
            min = self.min_major,
            url = CANARY_URL,
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

//! 浏览器版本探测 - 从 User-Agent 中解析 Chrome 版本号
//!
//! 版本号只作为错误分类器的版本门槛输入，不参与其他逻辑

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// 内置模型能力要求的最低主版本号
pub const MIN_BROWSER_MAJOR: u32 = 127;

fn chrome_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"Chrome/(\d+)\.(\d+)\.(\d+)\.(\d+)").ok())
        .as_ref()
}

/// 四段式浏览器版本号 (major.minor.build.patch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BrowserVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub patch: u32,
}

impl BrowserVersion {
    pub fn new(major: u32, minor: u32, build: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            build,
            patch,
        }
    }

    /// 从 User-Agent 字符串解析
    ///
    /// 未匹配到 `Chrome/a.b.c.d` 时返回 None
    pub fn from_user_agent(user_agent: &str) -> Option<Self> {
        let caps = chrome_pattern()?.captures(user_agent)?;
        let part = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

        Some(Self::new(part(1)?, part(2)?, part(3)?, part(4)?))
    }

    /// 是否满足最低主版本要求
    ///
    /// 主版本为 0 视为未知，不做拦截
    pub fn meets_minimum(&self, min_major: u32) -> bool {
        self.major == 0 || self.major >= min_major
    }

    /// 四个数字组成的元组
    pub fn as_tuple(&self) -> [u32; 4] {
        [self.major, self.minor, self.build, self.patch]
    }
}

impl fmt::Display for BrowserVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.patch
        )
    }
}

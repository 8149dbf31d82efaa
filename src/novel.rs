use serde::{Deserialize, Serialize};

/// 小说基本信息，解析目录页后不再改变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelMetadata {
    pub title: String,
    pub author: String,
    pub cover: String,
}

/// 目录页解析结果
#[derive(Debug, Clone)]
pub struct NovelInfo {
    pub metadata: NovelMetadata,
    /// 章节绝对链接，顺序即章节序号（从0开始）
    pub chapters: Vec<String>,
}

/// 是否按卷分组
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VolumeMode {
    #[default]
    Off,
    On,
}

impl VolumeMode {
    /// 只认 `true`（不区分大小写）和 `1`，其余一律视为关闭
    pub fn from_flag(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(flag) if flag.eq_ignore_ascii_case("true") || flag == "1" => Self::On,
            _ => Self::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// 单个章节的标准化结果，交给存储后即丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub url: String,
    pub novel: String,
    pub cover: String,
    pub author: String,
    pub volume_no: String,
    pub chapter_no: String,
    pub chapter_title: String,
    pub body: String,
}

impl ChapterRecord {
    /// 章节号解析失败时排在最后
    pub fn chapter_number(&self) -> usize {
        self.chapter_no.parse().unwrap_or(usize::MAX)
    }

    pub fn volume_number(&self) -> usize {
        self.volume_no.parse().unwrap_or(0)
    }
}

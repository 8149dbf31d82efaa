use thiserror::Error;

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;

/// 爬取过程中的所有错误，任何一种都会终止本次爬取
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("配置加载失败: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("请求失败 {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("页面解析失败 {url}: 找不到{what}")]
    Parse { url: String, what: &'static str },

    #[error("无效的章节号: {0}")]
    InvalidChapterNumber(String),

    #[error("无效的章节链接: {0}")]
    InvalidChapterUrl(String),

    #[error("章节保存失败: {0:#}")]
    Storage(anyhow::Error),

    #[error("打包失败: {0:#}")]
    Package(anyhow::Error),

    #[error("章节任务异常退出: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("任务池已关闭: {0}")]
    Pool(#[from] tokio::sync::AcquireError),

    #[error("文件操作失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("无效的网址: {0}")]
    Url(#[from] url::ParseError),
}

impl CrawlError {
    pub(crate) fn parse(url: impl Into<String>, what: &'static str) -> Self {
        Self::Parse {
            url: url.into(),
            what,
        }
    }
}

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{CrawlError, Result};

static DEFAULT_CONFIG_FILE: &str = "wuxia";
static ENV_PREFIX: &str = "WUXIA";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// 同时下载的章节数上限
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// 站点证书经常失效，默认不校验
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            output_dir: default_output_dir(),
            workers: default_workers(),
            lang: default_lang(),
            accept_invalid_certs: default_accept_invalid_certs(),
            user_agent: None,
        }
    }
}

fn default_base_url() -> String {
    "https://www.wuxiaworld.com".to_owned()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("_novel")
}

fn default_workers() -> usize {
    10
}

fn default_lang() -> String {
    "en".to_owned()
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Config {
    /// 依次读取 `wuxia.toml`（或指定文件）与 `WUXIA_` 前缀的环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE)
                .format(config::FileFormat::Toml)
                .required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("配置已加载: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CrawlError::Config("workers 必须大于0".to_owned()));
        }
        url::Url::parse(&self.base_url)?;
        Ok(())
    }
}

use std::path::Path;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::Config;
use crate::error::{CrawlError, Result};

#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    base_url: Url,
}

impl Downloader {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder.build().map_err(|source| CrawlError::Fetch {
            url: config.base_url.clone(),
            source,
        })?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
        })
    }

    /// `<base_url>/novel/<id>`，ID作为单个路径片段编码
    pub fn novel_url(&self, novel_id: &str) -> Result<Url> {
        let not_a_base = |_| CrawlError::Config(format!("无效的 base_url: {}", self.base_url));
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(not_a_base)?
            .pop_if_empty()
            .extend(["novel", novel_id]);
        Ok(url)
    }

    #[instrument(skip(self))]
    pub async fn novel_info(&self, novel_id: &str) -> Result<String> {
        let url = self.novel_url(novel_id)?;
        info!("正在访问: {}", url);
        self.html(url.as_str()).await
    }

    pub async fn chapter(&self, url: &str) -> Result<String> {
        info!("正在下载: {}", url);
        self.html(url).await
    }

    /// 返回图片内容和扩展名
    pub async fn image(&self, url: &str) -> Result<(Bytes, String)> {
        debug!("正在下载图片: {}", url);
        let bytes = self.bytes(url).await?;
        let path = Url::parse(url)?.path().to_owned();
        let extension = Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("jpg")
            .to_ascii_lowercase();
        Ok((bytes, extension))
    }

    /// 不管响应声明的编码，一律按UTF-8解码
    async fn html(&self, url: &str) -> Result<String> {
        let bytes = self.bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn bytes(&self, url: &str) -> Result<Bytes> {
        let fetch_error = |source| CrawlError::Fetch {
            url: url.to_owned(),
            source,
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)
    }
}

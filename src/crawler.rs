pub mod downloader;
pub mod index;
pub mod normalizer;
pub mod parser;
pub mod task;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{error, info, instrument, warn};

pub use downloader::Downloader;
pub use index::{chapter_range, resolve_index};
pub use normalizer::Normalizer;
pub use parser::Parser;
pub use task::{TaskManager, WorkerPool};

use crate::config::Config;
use crate::epub::Packager;
use crate::error::{CrawlError, Result};
use crate::novel::{NovelInfo, VolumeMode};
use crate::store::ChapterStore;

/// 一次爬取的参数
///
/// 小说ID会拼到输出目录下，必须是单个普通路径片段。
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub novel_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub volume: VolumeMode,
}

impl CrawlRequest {
    pub fn new(novel_id: impl Into<String>) -> Result<Self> {
        let novel_id = novel_id.into();
        if novel_id.trim().is_empty() {
            return Err(CrawlError::Config("缺少小说ID".to_owned()));
        }
        if !is_single_segment(&novel_id) {
            return Err(CrawlError::Config(format!("无效的小说ID: {}", novel_id)));
        }
        Ok(Self {
            novel_id,
            start: None,
            end: None,
            volume: VolumeMode::Off,
        })
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn volume(mut self, volume: VolumeMode) -> Self {
        self.volume = volume;
        self
    }
}

fn is_single_segment(novel_id: &str) -> bool {
    let mut components = Path::new(novel_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == novel_id
    )
}

pub struct WuxiaCrawler {
    output_dir: PathBuf,
    downloader: Downloader,
    parser: Parser,
    normalizer: Normalizer,
    pool: WorkerPool,
    store: Arc<dyn ChapterStore>,
    packager: Arc<dyn Packager>,
}

impl WuxiaCrawler {
    pub fn new(
        config: &Config,
        pool: WorkerPool,
        store: Arc<dyn ChapterStore>,
        packager: Arc<dyn Packager>,
    ) -> Result<Self> {
        config.validate()?;
        let downloader = Downloader::new(config)?;
        let parser = Parser;
        Ok(Self {
            output_dir: config.output_dir.clone(),
            normalizer: Normalizer::new(downloader.clone(), parser),
            downloader,
            parser,
            pool,
            store,
            packager,
        })
    }

    /// 小说的输出目录，ID不是单个路径片段时拒绝
    pub fn output_path(&self, novel_id: &str) -> Result<PathBuf> {
        if !is_single_segment(novel_id) {
            return Err(CrawlError::Config(format!("无效的小说ID: {}", novel_id)));
        }
        Ok(self.output_dir.join(novel_id))
    }

    /// 清理输出目录、下载章节，最后无论成败都打包一次
    ///
    /// 成功时返回保存的章节数。下载阶段的错误会在打包结束后返回。
    #[instrument(skip_all, fields(novel = %request.novel_id))]
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<usize> {
        let output = self.output_path(&request.novel_id)?;
        self.prepare(&output).await?;

        let fetched = self.fetch_phase(request, &output).await;

        info!("正在打包: {}", output.display());
        let packaged = self.packager.package(&output, request.volume).await;

        match (fetched, packaged) {
            (Ok(saved), Ok(())) => {
                info!("完成，共保存 {} 章", saved);
                Ok(saved)
            }
            (Ok(_), Err(e)) => Err(CrawlError::Package(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(package_error)) => {
                error!("打包也失败了: {:#}", package_error);
                Err(e)
            }
        }
    }

    /// 删除上次留下的目录，重新创建空目录
    async fn prepare(&self, output: &Path) -> Result<()> {
        if fs::try_exists(output).await? {
            info!("正在清理旧目录: {}", output.display());
            fs::remove_dir_all(output).await?;
        }
        fs::create_dir_all(output).await?;
        Ok(())
    }

    async fn fetch_phase(&self, request: &CrawlRequest, output: &Path) -> Result<usize> {
        let novel = self.discover(&request.novel_id).await?;
        let start = resolve_index(request.start.as_deref(), &novel.chapters)?;
        let end = resolve_index(request.end.as_deref(), &novel.chapters)?;
        self.fetch_chapters(Arc::new(novel), start, end, request.volume, output)
            .await
    }

    /// 获取书名、作者、封面和章节列表
    pub async fn discover(&self, novel_id: &str) -> Result<NovelInfo> {
        let html = self.downloader.novel_info(novel_id).await?;
        let page_url = self.downloader.novel_url(novel_id)?;
        let novel = self.parser.novel_info(&html, &page_url)?;
        info!(
            "[{}] 作者: {} 封面: {}",
            novel.metadata.title, novel.metadata.author, novel.metadata.cover
        );
        Ok(novel)
    }

    /// 在任务池里并发下载 `[start, end]` 内的章节
    ///
    /// 起点为空时什么都不做；终点为空或越界时取最后一章。
    /// 全部任务结束后才返回，多个任务失败时只返回最先收到的错误。
    #[instrument(skip(self, novel, output))]
    pub async fn fetch_chapters(
        &self,
        novel: Arc<NovelInfo>,
        start: Option<usize>,
        end: Option<usize>,
        mode: VolumeMode,
        output: &Path,
    ) -> Result<usize> {
        let Some(range) = chapter_range(start, end, novel.chapters.len()) else {
            warn!("没有需要下载的章节");
            return Ok(0);
        };

        let mut tasks = self.pool.task_manager();
        for index in range {
            let novel = Arc::clone(&novel);
            let normalizer = self.normalizer.clone();
            let store = Arc::clone(&self.store);
            let output = output.to_path_buf();
            tasks.spawn(async move {
                let url = &novel.chapters[index];
                let record = normalizer
                    .normalize(index, url, &novel.metadata, mode)
                    .await?;
                store
                    .save_chapter(&record, &output)
                    .await
                    .map_err(CrawlError::Storage)
            });
        }
        info!("已提交 {} 个章节任务", tasks.len());

        let saved = tasks.wait().await?.len();
        info!("全部章节下载完成");
        Ok(saved)
    }
}

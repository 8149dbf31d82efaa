use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use wuxia_fetch::crawler::Downloader;
use wuxia_fetch::utils::display_elapsed_time;
use wuxia_fetch::{
    Config, CrawlRequest, EpubPackager, JsonStore, VolumeMode, WorkerPool, WuxiaCrawler, logger,
};

/// 下载 WuxiaWorld 小说章节并打包为 EPUB
#[derive(Parser, Debug)]
#[command(name = "wuxia-fetch", version)]
struct Cli {
    /// 小说ID，即 /novel/<ID> 中的部分
    novel_id: String,

    /// 起始章节号（从2开始）或章节链接，省略时不下载任何章节
    start: Option<String>,

    /// 结束章节号或章节链接，省略时下载到最后一章
    end: Option<String>,

    /// 是否分卷：true / 1 为开启，其余为关闭
    volume: Option<String>,

    /// 配置文件路径，默认读取当前目录下的 wuxia.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 输出更详细的日志 (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let volume = VolumeMode::from_flag(cli.volume.as_deref());

    let mut request = CrawlRequest::new(cli.novel_id)?.volume(volume);
    request.start = cli.start;
    request.end = cli.end;

    let pool = WorkerPool::new(config.workers);
    let packager = EpubPackager::new(Downloader::new(&config)?, config.lang.clone());
    let crawler = WuxiaCrawler::new(&config, pool, Arc::new(JsonStore), Arc::new(packager))?;

    info!("正在爬取 ID为 {} 的小说...", request.novel_id);
    let start = Instant::now();
    match crawler.crawl(&request).await {
        Ok(saved) => {
            info!("共保存 {} 章", saved);
            display_elapsed_time(start.elapsed());
            Ok(())
        }
        Err(e) => {
            error!("爬取失败: {}", e);
            Err(e.into())
        }
    }
}

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::crawler::downloader::Downloader;
use crate::crawler::parser::{ChapterPage, Parser};
use crate::error::Result;
use crate::novel::{ChapterRecord, NovelMetadata, VolumeMode};

static BOOK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"book-(\d+)").expect("正则表达式编译失败"));

static CHAPTERS_PER_VOLUME: usize = 100;

/// 下载并解析单个章节
#[derive(Debug, Clone)]
pub struct Normalizer {
    downloader: Downloader,
    parser: Parser,
}

impl Normalizer {
    pub fn new(downloader: Downloader, parser: Parser) -> Self {
        Self { downloader, parser }
    }

    #[instrument(skip(self, metadata, mode))]
    pub async fn normalize(
        &self,
        index: usize,
        url: &str,
        metadata: &NovelMetadata,
        mode: VolumeMode,
    ) -> Result<ChapterRecord> {
        let html = self.downloader.chapter(url).await?;
        let page = self.parser.chapter_page(&html, url)?;
        debug!("章节解析完成: {}", page.title);
        Ok(build_record(index, url, metadata, mode, page))
    }
}

pub fn build_record(
    index: usize,
    url: &str,
    metadata: &NovelMetadata,
    mode: VolumeMode,
    page: ChapterPage,
) -> ChapterRecord {
    let chapter_no = index + 1;
    ChapterRecord {
        url: url.to_owned(),
        novel: metadata.title.clone(),
        cover: metadata.cover.clone(),
        author: metadata.author.clone(),
        volume_no: volume_number(url, chapter_no, mode),
        chapter_no: chapter_no.to_string(),
        body: format!("<h1>{}</h1>{}", page.title, page.body),
        chapter_title: page.title,
    }
}

/// 链接里带 `book-N` 时用N，否则每100章分一卷；关闭分卷时固定为 "0"
pub fn volume_number(url: &str, chapter_no: usize, mode: VolumeMode) -> String {
    if !mode.is_on() {
        return "0".to_owned();
    }
    match BOOK_PATTERN.captures(url) {
        Some(caps) => caps[1].to_owned(),
        None => ((chapter_no - 1) / CHAPTERS_PER_VOLUME + 1).to_string(),
    }
}

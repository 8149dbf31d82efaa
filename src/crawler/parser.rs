use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

use crate::error::{CrawlError, Result};
use crate::novel::{NovelInfo, NovelMetadata};

static NOVEL_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".section-content h4"));
static NOVEL_COVER: LazyLock<Selector> = LazyLock::new(|| selector("img.media-object"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static CHAPTER_LIST: LazyLock<Selector> = LazyLock::new(|| selector("ul.list-chapters"));
static CHAPTER_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("ul.list-chapters li.chapter-item a"));
static CHAPTER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(".panel-default .caption h4"));
static CHAPTER_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| selector(".panel-default .fr-view"));
static CHAPTER_PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| selector(".panel-default .fr-view p"));

static AUTHOR_PREFIX: &str = "Author: ";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("无法创建选择器")
}

/// 章节页解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPage {
    pub title: String,
    /// 非空段落的原始HTML，按文档顺序拼接
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    #[instrument(skip_all, fields(url = %page_url))]
    pub fn novel_info(&self, novel_html: &str, page_url: &Url) -> Result<NovelInfo> {
        info!("正在解析书名和章节列表");
        let document = Html::parse_document(novel_html);
        let missing = |what| CrawlError::parse(page_url.as_str(), what);

        let title = document
            .select(&NOVEL_TITLE)
            .next()
            .ok_or_else(|| missing("书名"))?
            .text()
            .collect::<String>();

        let cover = document
            .select(&NOVEL_COVER)
            .next()
            .and_then(|img| img.value().attr("src"))
            .ok_or_else(|| missing("封面"))?
            .to_owned();

        let author = document
            .select(&PARAGRAPH)
            .nth(1)
            .ok_or_else(|| missing("作者"))?
            .text()
            .collect::<String>();
        let author = author
            .strip_prefix(AUTHOR_PREFIX)
            .unwrap_or(&author)
            .to_owned();

        if document.select(&CHAPTER_LIST).next().is_none() {
            return Err(missing("章节列表"));
        }

        // 每卷一个列表，按文档顺序收集全部章节；链接相对站点根路径解析
        let origin = page_url.join("/").map_err(|_| missing("站点根路径"))?;
        let mut chapters = Vec::new();
        for link in document.select(&CHAPTER_LINK) {
            let href = link
                .value()
                .attr("href")
                .ok_or_else(|| missing("章节链接"))?;
            let url = origin.join(href).map_err(|_| missing("有效的章节链接"))?;
            chapters.push(url.to_string());
        }

        let title = title.trim().to_owned();
        if chapters.is_empty() {
            warn!("[{}] 章节列表为空", title);
        } else {
            info!("[{}] 共找到 {} 章", title, chapters.len());
        }

        Ok(NovelInfo {
            metadata: NovelMetadata {
                title,
                author,
                cover,
            },
            chapters,
        })
    }

    pub fn chapter_page(&self, chapter_html: &str, page_url: &str) -> Result<ChapterPage> {
        let document = Html::parse_document(chapter_html);

        let title = document
            .select(&CHAPTER_TITLE)
            .next()
            .ok_or_else(|| CrawlError::parse(page_url, "章节标题"))?
            .text()
            .collect::<String>();

        if document.select(&CHAPTER_CONTENT).next().is_none() {
            return Err(CrawlError::parse(page_url, "章节内容"));
        }

        let body = document
            .select(&CHAPTER_PARAGRAPH)
            .filter(|p| !p.text().collect::<String>().trim().is_empty())
            .map(|p| p.html())
            .collect::<String>();

        Ok(ChapterPage {
            title: title.trim().to_owned(),
            body,
        })
    }
}

//! 使用 wiremock 模拟站点，测试完整的爬取流程

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wuxia_fetch::crawler::Downloader;
use wuxia_fetch::{
    ChapterRecord, Config, CrawlError, CrawlRequest, EpubPackager, JsonStore, NovelInfo,
    NovelMetadata, Packager, VolumeMode, WorkerPool, WuxiaCrawler,
};

/// 记录每次打包调用以及当时已保存的章节数
#[derive(Default)]
struct RecordingPackager {
    calls: Mutex<Vec<(PathBuf, VolumeMode, usize)>>,
}

impl RecordingPackager {
    fn calls(&self) -> Vec<(PathBuf, VolumeMode, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Packager for RecordingPackager {
    async fn package(&self, output: &Path, mode: VolumeMode) -> anyhow::Result<()> {
        let saved = JsonStore::load_records(output).await?.len();
        self.calls
            .lock()
            .unwrap()
            .push((output.to_path_buf(), mode, saved));
        Ok(())
    }
}

struct Site {
    server: MockServer,
    output: TempDir,
}

impl Site {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            output: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self) -> Config {
        Config {
            base_url: self.server.uri(),
            output_dir: self.output.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn chapter_url(&self, n: usize) -> String {
        format!("{}/novel/mga/mga-chapter-{}", self.server.uri(), n)
    }

    fn crawler(&self, packager: Arc<dyn Packager>) -> WuxiaCrawler {
        let config = self.config();
        WuxiaCrawler::new(
            &config,
            WorkerPool::new(config.workers),
            Arc::new(JsonStore),
            packager,
        )
        .unwrap()
    }

    fn novel_dir(&self) -> PathBuf {
        self.output.path().join("mga")
    }

    async fn mount_landing(&self, chapters: usize) {
        let items: String = (1..=chapters)
            .map(|n| {
                format!(
                    r#"<li class="chapter-item"><a href="/novel/mga/mga-chapter-{n}">Chapter {n}</a></li>"#
                )
            })
            .collect();
        let html = format!(
            r#"<html><body>
            <div class="section-content"><h4>Martial God Asura</h4></div>
            <img class="media-object" src="{}/cover.jpg">
            <p>Translator: Yang</p>
            <p>Author: Kindhearted Bee</p>
            <ul class="list-chapters">{}</ul>
            </body></html>"#,
            self.server.uri(),
            items
        );
        Mock::given(method("GET"))
            .and(path("/novel/mga"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&self.server)
            .await;
    }

    async fn mount_chapter(&self, n: usize) {
        Mock::given(method("GET"))
            .and(path(format!("/novel/mga/mga-chapter-{}", n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(n)))
            .mount(&self.server)
            .await;
    }

    async fn mount_chapters(&self, chapters: usize) {
        for n in 1..=chapters {
            self.mount_chapter(n).await;
        }
    }

    async fn expect_no_chapter_requests(&self) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/novel/mga/.+"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    async fn saved(&self) -> Vec<ChapterRecord> {
        let mut records = JsonStore::load_records(&self.novel_dir()).await.unwrap();
        records.sort_by_key(ChapterRecord::chapter_number);
        records
    }
}

fn chapter_page(n: usize) -> String {
    format!(
        r#"<html><body><div class="panel panel-default">
        <div class="caption"><h4>Chapter {n}</h4></div>
        <div class="fr-view"><p>Line {n}</p><p> </p></div>
        </div></body></html>"#
    )
}

fn chapter_numbers(records: &[ChapterRecord]) -> Vec<usize> {
    records.iter().map(ChapterRecord::chapter_number).collect()
}

#[tokio::test]
async fn crawl_saves_requested_range_and_packages_once() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    site.mount_chapters(5).await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga").unwrap().start("2").end("4");

    let saved = crawler.crawl(&request).await.unwrap();

    assert_eq!(saved, 3);
    let records = site.saved().await;
    assert_eq!(chapter_numbers(&records), vec![2, 3, 4]);
    let second = &records[0];
    assert_eq!(second.url, site.chapter_url(2));
    assert_eq!(second.novel, "Martial God Asura");
    assert_eq!(second.author, "Kindhearted Bee");
    assert_eq!(second.cover, format!("{}/cover.jpg", site.server.uri()));
    assert_eq!(second.volume_no, "0");
    assert_eq!(second.chapter_title, "Chapter 2");
    assert_eq!(second.body, "<h1>Chapter 2</h1><p>Line 2</p>");

    assert_eq!(
        packager.calls(),
        vec![(site.novel_dir(), VolumeMode::Off, 3)]
    );
}

#[tokio::test]
async fn start_url_with_open_end_fetches_to_the_last_chapter() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    site.mount_chapters(5).await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga").unwrap().start(site.chapter_url(1));

    assert_eq!(crawler.crawl(&request).await.unwrap(), 5);
    assert_eq!(chapter_numbers(&site.saved().await), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn missing_start_fetches_nothing_but_still_packages() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    site.expect_no_chapter_requests().await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga").unwrap().end("3");

    assert_eq!(crawler.crawl(&request).await.unwrap(), 0);
    assert_eq!(packager.calls().len(), 1);
}

#[tokio::test]
async fn landing_page_failure_is_returned_after_packaging() {
    let site = Site::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/mga"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&site.server)
        .await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga").unwrap().start("2");

    let result = crawler.crawl(&request).await;

    assert!(matches!(result, Err(CrawlError::Fetch { .. })));
    assert_eq!(
        packager.calls(),
        vec![(site.novel_dir(), VolumeMode::Off, 0)]
    );
}

#[tokio::test]
async fn broken_landing_page_is_a_parse_error() {
    let site = Site::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/mga"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&site.server)
        .await;

    let packager = Arc::new(RecordingPackager::default());
    let result = site
        .crawler(packager.clone())
        .crawl(&CrawlRequest::new("mga").unwrap().start("2"))
        .await;

    assert!(matches!(result, Err(CrawlError::Parse { .. })));
    assert_eq!(packager.calls().len(), 1);
}

#[tokio::test]
async fn chapter_one_as_start_aborts_before_fetching() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    site.expect_no_chapter_requests().await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga").unwrap().start("1");

    let result = crawler.crawl(&request).await;

    assert!(matches!(result, Err(CrawlError::InvalidChapterNumber(n)) if n == "1"));
    assert_eq!(packager.calls().len(), 1);
}

#[tokio::test]
async fn unknown_end_url_aborts_before_fetching() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    site.expect_no_chapter_requests().await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga")
        .unwrap()
        .start("2")
        .end("https://elsewhere.example.com/chapter-3");

    let result = crawler.crawl(&request).await;

    assert!(matches!(result, Err(CrawlError::InvalidChapterUrl(_))));
    assert_eq!(packager.calls().len(), 1);
}

#[tokio::test]
async fn failed_chapter_does_not_stop_its_siblings() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    for n in [1, 2, 4, 5] {
        site.mount_chapter(n).await;
    }
    Mock::given(method("GET"))
        .and(path("/novel/mga/mga-chapter-3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site.server)
        .await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga").unwrap().start(site.chapter_url(1));

    let result = crawler.crawl(&request).await;

    let failed_url = site.chapter_url(3);
    assert!(matches!(result, Err(CrawlError::Fetch { url, .. }) if url == failed_url));
    assert_eq!(chapter_numbers(&site.saved().await), vec![1, 2, 4, 5]);
    assert_eq!(packager.calls()[0].2, 4);
}

#[tokio::test]
async fn rerun_starts_from_an_empty_output_location() {
    let site = Site::start().await;
    site.mount_landing(5).await;
    site.mount_chapters(5).await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());

    let first = CrawlRequest::new("mga").unwrap().start(site.chapter_url(1));
    crawler.crawl(&first).await.unwrap();
    std::fs::write(site.novel_dir().join("stale.txt"), "old").unwrap();

    let second = CrawlRequest::new("mga").unwrap().start("4");
    assert_eq!(crawler.crawl(&second).await.unwrap(), 2);

    assert!(!site.novel_dir().join("stale.txt").exists());
    assert_eq!(chapter_numbers(&site.saved().await), vec![4, 5]);
    let saw: Vec<usize> = packager.calls().iter().map(|call| call.2).collect();
    assert_eq!(saw, vec![5, 2]);
}

#[tokio::test]
async fn volume_mode_uses_book_token_then_buckets() {
    let site = Site::start().await;
    let html = format!(
        r#"<div class="section-content"><h4>Coiling Dragon</h4></div>
        <img class="media-object" src="{0}/cover.jpg"><p>x</p><p>Author: Tomato</p>
        <ul class="list-chapters">
            <li class="chapter-item"><a href="/novel/mga/cd-book-7-chapter-1">1</a></li>
            <li class="chapter-item"><a href="/novel/mga/cd-chapter-2">2</a></li>
        </ul>"#,
        site.server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/novel/mga"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&site.server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/novel/mga/cd-.+"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(1)))
        .mount(&site.server)
        .await;

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let request = CrawlRequest::new("mga")
        .unwrap()
        .start(format!("{}/novel/mga/cd-book-7-chapter-1", site.server.uri()))
        .volume(VolumeMode::On);

    assert_eq!(crawler.crawl(&request).await.unwrap(), 2);
    let records = site.saved().await;
    assert_eq!(records[0].volume_no, "7");
    assert_eq!(records[1].volume_no, "1");
    assert_eq!(packager.calls()[0].1, VolumeMode::On);
}

#[tokio::test]
async fn fetch_clamps_end_to_the_chapter_list() {
    let site = Site::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/novel/mga/mga-chapter-\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(1)))
        .expect(250)
        .mount(&site.server)
        .await;

    let novel = Arc::new(NovelInfo {
        metadata: NovelMetadata {
            title: "Martial God Asura".to_owned(),
            author: "Kindhearted Bee".to_owned(),
            cover: String::new(),
        },
        chapters: (1..=250).map(|n| site.chapter_url(n)).collect(),
    });
    let crawler = site.crawler(Arc::new(RecordingPackager::default()));
    let output = site.novel_dir();

    let saved = crawler
        .fetch_chapters(novel, Some(0), Some(9999), VolumeMode::Off, &output)
        .await
        .unwrap();

    assert_eq!(saved, 250);
    assert_eq!(site.saved().await.len(), 250);
}

#[tokio::test]
async fn fetch_without_start_dispatches_nothing() {
    let site = Site::start().await;
    site.expect_no_chapter_requests().await;

    let novel = Arc::new(NovelInfo {
        metadata: NovelMetadata {
            title: "T".to_owned(),
            author: "A".to_owned(),
            cover: String::new(),
        },
        chapters: (1..=10).map(|n| site.chapter_url(n)).collect(),
    });
    let crawler = site.crawler(Arc::new(RecordingPackager::default()));

    for end in [None, Some(3), Some(9999)] {
        let saved = crawler
            .fetch_chapters(novel.clone(), None, end, VolumeMode::On, &site.novel_dir())
            .await
            .unwrap();
        assert_eq!(saved, 0);
    }
}

#[tokio::test]
async fn crawl_with_epub_packager_produces_a_book() {
    let site = Site::start().await;
    site.mount_landing(3).await;
    site.mount_chapters(3).await;
    Mock::given(method("GET"))
        .and(path("/cover.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xffu8, 0xd8, 0xff]))
        .mount(&site.server)
        .await;

    let config = site.config();
    let packager = EpubPackager::new(Downloader::new(&config).unwrap(), config.lang.clone());
    let crawler = site.crawler(Arc::new(packager));
    let request = CrawlRequest::new("mga").unwrap().start("2");

    assert_eq!(crawler.crawl(&request).await.unwrap(), 2);
    assert!(site.novel_dir().join("mga.epub").is_file());
}

#[tokio::test]
async fn novel_id_outside_output_dir_touches_nothing() {
    let site = Site::start().await;
    site.expect_no_chapter_requests().await;
    let other = tempfile::tempdir().unwrap();
    std::fs::write(other.path().join("keep.txt"), "keep").unwrap();

    let packager = Arc::new(RecordingPackager::default());
    let crawler = site.crawler(packager.clone());
    let novel_id = other.path().to_string_lossy().into_owned();
    assert!(matches!(
        CrawlRequest::new(novel_id.as_str()),
        Err(CrawlError::Config(_))
    ));

    let request = CrawlRequest {
        novel_id,
        start: Some("2".to_owned()),
        end: None,
        volume: VolumeMode::Off,
    };
    let result = crawler.crawl(&request).await;

    assert!(matches!(result, Err(CrawlError::Config(_))));
    assert!(other.path().join("keep.txt").is_file());
    assert!(packager.calls().is_empty());
}

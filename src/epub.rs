pub mod chapter;
pub mod compression;
pub mod metadata;
pub mod volume;

pub use chapter::Chapter;
pub use compression::Compressor;
pub use metadata::Metadata;
pub use volume::Volume;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::crawler::Downloader;
use crate::novel::VolumeMode;
use crate::store::JsonStore;

/// 把已保存的章节打包成电子书，每次爬取调用一次
#[async_trait]
pub trait Packager: Send + Sync {
    async fn package(&self, output: &Path, mode: VolumeMode) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Epub {
    pub id: String,
    pub title: String,
    pub lang: String,
    pub author: String,
    pub cover: Option<String>, // images目录下的封面文件名
    pub chapters: Vec<Chapter>,
    pub epub_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub oebps_dir: PathBuf,
    pub image_dir: PathBuf,
    pub text_dir: PathBuf,
}

impl Epub {
    /// 在 `parent/<stem>` 下建立EPUB目录结构
    pub async fn create_dirs(parent: &Path, stem: &str) -> Result<Self> {
        let epub_dir = parent.join(stem);
        if fs::try_exists(&epub_dir).await? {
            fs::remove_dir_all(&epub_dir).await?;
        }
        let meta_dir = epub_dir.join("META-INF");
        let oebps_dir = epub_dir.join("OEBPS");
        let image_dir = oebps_dir.join("images");
        let text_dir = oebps_dir.join("text");

        fs::create_dir_all(&meta_dir).await?;
        fs::create_dir_all(&image_dir).await?;
        fs::create_dir_all(&text_dir).await?;

        Ok(Self {
            id: stem.to_owned(),
            title: String::new(),
            lang: String::new(),
            author: String::new(),
            cover: None,
            chapters: Vec::new(),
            epub_dir,
            meta_dir,
            oebps_dir,
            image_dir,
            text_dir,
        })
    }

    /// 图片按内容哈希命名，重复内容只保存一次
    #[instrument(skip_all)]
    pub async fn write_image(&self, image_bytes: Bytes, extension: &str) -> Result<String> {
        let hash = Sha256::digest(&image_bytes);
        let filename = format!("{:x}.{}", hash, extension);
        let image_path = self.image_dir.join(&filename);
        if fs::try_exists(&image_path).await? {
            info!("重复图片: {}", image_path.display());
            return Ok(filename);
        }
        fs::write(&image_path, &image_bytes).await?;
        info!("图片已保存到: {}", image_path.display());
        Ok(filename)
    }

    #[instrument(skip_all)]
    pub async fn generate(&self) -> Result<PathBuf> {
        info!("正在生成EPUB文件: {}", self.title);

        let metadata = Metadata::new();
        metadata.generate(self).await?;

        let compressor = Compressor::new();
        compressor.compress_epub(&self.epub_dir).await
    }
}

/// 默认打包实现：按卷生成EPUB文件
#[derive(Debug, Clone)]
pub struct EpubPackager {
    downloader: Downloader,
    lang: String,
}

impl EpubPackager {
    pub fn new(downloader: Downloader, lang: impl Into<String>) -> Self {
        Self {
            downloader,
            lang: lang.into(),
        }
    }

    #[instrument(skip_all, fields(volume = volume.index))]
    async fn build(&self, novel_id: &str, volume: &Volume, output: &Path) -> Result<PathBuf> {
        let Some(first) = volume.chapters.first() else {
            anyhow::bail!("第 {} 卷没有章节", volume.index);
        };

        let mut epub = Epub::create_dirs(output, &volume.stem(novel_id)).await?;
        epub.title = volume.title(&first.novel);
        epub.author = first.author.clone();
        epub.lang = self.lang.clone();
        epub.cover = self.cover(&epub, &first.cover).await;

        for (i, record) in volume.chapters.iter().enumerate() {
            let chapter = Chapter::new(i + 1, record);
            chapter.write(&epub.text_dir, &record.body).await?;
            epub.chapters.push(chapter);
        }

        epub.generate().await
    }

    /// 封面下载失败不影响打包
    async fn cover(&self, epub: &Epub, cover_url: &str) -> Option<String> {
        if cover_url.is_empty() {
            return None;
        }
        let (bytes, extension) = match self.downloader.image(cover_url).await {
            Ok(image) => image,
            Err(e) => {
                warn!("封面下载失败: {}", e);
                return None;
            }
        };
        match epub.write_image(bytes, &extension).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!("封面保存失败: {:#}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Packager for EpubPackager {
    #[instrument(skip_all, fields(output = %output.display()))]
    async fn package(&self, output: &Path, mode: VolumeMode) -> Result<()> {
        let records = JsonStore::load_records(output).await?;
        if records.is_empty() {
            warn!("没有可打包的章节: {}", output.display());
            return Ok(());
        }

        let novel_id = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "novel".to_owned());

        for volume in Volume::group(records, mode) {
            let epub_path = self.build(&novel_id, &volume, output).await?;
            info!("EPUB文件生成成功: {}", epub_path.display());
        }
        Ok(())
    }
}

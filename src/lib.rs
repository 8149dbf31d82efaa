pub mod config;
pub mod crawler;
pub mod epub;
pub mod error;
pub mod logger;
pub mod novel;
pub mod store;
pub mod utils;

pub use config::Config;
pub use crawler::{CrawlRequest, WorkerPool, WuxiaCrawler};
pub use epub::{EpubPackager, Packager};
pub use error::CrawlError;
pub use novel::{ChapterRecord, NovelInfo, NovelMetadata, VolumeMode};
pub use store::{ChapterStore, JsonStore};

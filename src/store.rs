use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};

use crate::novel::ChapterRecord;

static JSON_DIR: &str = "json";

/// 章节落盘接口，每个成功解析的章节调用一次
#[async_trait]
pub trait ChapterStore: Send + Sync {
    async fn save_chapter(&self, record: &ChapterRecord, output: &Path) -> Result<()>;
}

/// 每章一个JSON文件: `<output>/json/<卷号>/<章节号>.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStore;

impl JsonStore {
    pub fn chapter_path(record: &ChapterRecord, output: &Path) -> PathBuf {
        output
            .join(JSON_DIR)
            .join(&record.volume_no)
            .join(format!("{:0>5}.json", record.chapter_no))
    }

    /// 读取目录下所有已保存的章节，顺序不保证
    #[instrument(skip_all, fields(output = %output.display()))]
    pub async fn load_records(output: &Path) -> Result<Vec<ChapterRecord>> {
        let json_dir = output.join(JSON_DIR);
        let mut records = Vec::new();
        if !fs::try_exists(&json_dir).await? {
            return Ok(records);
        }

        let mut stack = vec![json_dir];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                } else if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                    let content = fs::read(&path).await?;
                    let record: ChapterRecord = serde_json::from_slice(&content)
                        .with_context(|| format!("章节文件损坏: {}", path.display()))?;
                    records.push(record);
                }
            }
        }
        debug!("读取到 {} 个章节", records.len());
        Ok(records)
    }
}

#[async_trait]
impl ChapterStore for JsonStore {
    async fn save_chapter(&self, record: &ChapterRecord, output: &Path) -> Result<()> {
        let path = Self::chapter_path(record, output);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(record)?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("保存章节失败: {}", path.display()))?;
        debug!("章节已保存到: {}", path.display());
        Ok(())
    }
}

use std::collections::BTreeMap;

use crate::novel::{ChapterRecord, VolumeMode};

/// 打包单位，`index` 为0时表示不分卷的整本书
#[derive(Debug, Clone)]
pub struct Volume {
    pub index: usize,
    pub chapters: Vec<ChapterRecord>,
}

impl Volume {
    /// 按章节号排序后分组，卷号升序
    pub fn group(mut records: Vec<ChapterRecord>, mode: VolumeMode) -> Vec<Volume> {
        if records.is_empty() {
            return Vec::new();
        }
        records.sort_by_key(ChapterRecord::chapter_number);

        if !mode.is_on() {
            return vec![Volume {
                index: 0,
                chapters: records,
            }];
        }

        let mut volumes: BTreeMap<usize, Vec<ChapterRecord>> = BTreeMap::new();
        for record in records {
            volumes.entry(record.volume_number()).or_default().push(record);
        }
        volumes
            .into_iter()
            .map(|(index, chapters)| Volume { index, chapters })
            .collect()
    }

    pub fn stem(&self, novel_id: &str) -> String {
        if self.index == 0 {
            novel_id.to_owned()
        } else {
            format!("{}_v{}", novel_id, self.index)
        }
    }

    pub fn title(&self, novel_title: &str) -> String {
        if self.index == 0 {
            novel_title.to_owned()
        } else {
            format!("{} Volume {}", novel_title, self.index)
        }
    }
}

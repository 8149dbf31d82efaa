use std::ops::RangeInclusive;

use crate::error::{CrawlError, Result};

/// 把章节号或章节链接解析为章节下标
///
/// 空引用返回 `None`：作为起点时表示不下载，作为终点时表示下载到最后一章。
/// 数字按从1开始的章节号处理，但第1章会被判为无效。
pub fn resolve_index(reference: Option<&str>, chapters: &[String]) -> Result<Option<usize>> {
    let Some(reference) = reference.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if reference.chars().all(|c| c.is_ascii_digit()) {
        return match reference.parse::<usize>() {
            Ok(number) if (2..=chapters.len()).contains(&number) => Ok(Some(number - 1)),
            _ => Err(CrawlError::InvalidChapterNumber(reference.to_owned())),
        };
    }

    chapters
        .iter()
        .position(|link| link == reference)
        .map(Some)
        .ok_or_else(|| CrawlError::InvalidChapterUrl(reference.to_owned()))
}

/// 计算要下载的下标区间，终点会被截断到最后一章
pub fn chapter_range(
    start: Option<usize>,
    end: Option<usize>,
    len: usize,
) -> Option<RangeInclusive<usize>> {
    let start = start?;
    let last = len.checked_sub(1)?;
    let end = end.map_or(last, |end| end.min(last));
    Some(start..=end)
}

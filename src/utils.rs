use std::time::Duration;

use tracing::info;

pub fn display_elapsed_time(duration: Duration) {
    info!("✅ 爬取完成！耗时: {}", format_elapsed(duration));
}

/// 超过1分钟显示分秒，超过1秒显示秒，余下的毫秒为0时省略
pub fn format_elapsed(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let mins = total_ms / 60000;
    let secs = (total_ms % 60000) / 1000;
    let ms_remaining = total_ms % 1000;

    let mut text = String::new();
    if mins > 0 {
        text.push_str(&format!("{}分", mins));
    }
    if total_ms >= 1000 {
        text.push_str(&format!("{}秒", secs));
    }
    if ms_remaining > 0 || total_ms < 1000 {
        text.push_str(&format!("{}毫秒", ms_remaining));
    }
    text
}

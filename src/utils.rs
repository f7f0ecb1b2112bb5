use indicatif::ProgressStyle;

use crate::pipeline::IndexEvent;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// 将编码进度转换为可读的描述
pub fn describe_event(collection: &str, event: &IndexEvent) -> String {
    match event {
        IndexEvent::Scanned { total } => format!("{}: 扫描到 {} 张图片", collection, total),
        IndexEvent::NoImages => format!("{}: 没有找到图片", collection),
        IndexEvent::Filtered { new, skipped } => {
            format!("{}: 待编码 {} 张，跳过已编码 {} 张", collection, new, skipped)
        }
        IndexEvent::AlreadyIndexed => format!("{}: 所有图片均已编码", collection),
        IndexEvent::BatchStarted { batch, batches, size } => {
            format!("{}: 正在编码第 {}/{} 批 ({} 张)", collection, batch + 1, batches, size)
        }
        IndexEvent::BatchEncoded { batch, encoded, failed } => {
            format!("{}: 第 {} 批完成，成功 {}，失败 {}", collection, batch + 1, encoded, failed)
        }
        IndexEvent::BatchFailed { batch, size, error } => {
            format!("{}: 第 {} 批编码失败 ({} 张): {}", collection, batch + 1, size, error)
        }
        IndexEvent::Cancelled => format!("{}: 已取消", collection),
        IndexEvent::Finished(summary) => format!(
            "{}: 新增 {}，跳过 {}，失败 {}",
            collection, summary.encoded, summary.skipped, summary.failed
        ),
    }
}

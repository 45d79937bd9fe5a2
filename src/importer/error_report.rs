// ==========================================
// 线索导入引擎 - 错误报告导出
// ==========================================
// 用途: 将逐行失败明细导出为 CSV，供人工下载核对
// 格式: row,identity,message
// ==========================================

use crate::domain::outcome::ImportOutcome;
use crate::importer::error::{ImportError, ImportResult};
use csv::WriterBuilder;
use std::io::Write;

/// 写出错误报告
///
/// # 返回
/// - Ok(usize): 写出的错误行数
pub fn write_error_report<W: Write>(outcome: &ImportOutcome, writer: W) -> ImportResult<usize> {
    let mut csv_writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    csv_writer.write_record(["row", "identity", "message"])?;
    for error in &outcome.errors {
        let row = error.row_number.to_string();
        csv_writer.write_record([
            row.as_str(),
            error.identity.as_deref().unwrap_or(""),
            error.message.as_str(),
        ])?;
    }

    csv_writer
        .flush()
        .map_err(|e| ImportError::ReportError(e.to_string()))?;
    Ok(outcome.errors.len())
}

/// 导出为内存字符串
pub fn error_report_string(outcome: &ImportOutcome) -> ImportResult<String> {
    let mut buffer = Vec::new();
    write_error_report(outcome, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ImportError::ReportError(e.to_string()))
}

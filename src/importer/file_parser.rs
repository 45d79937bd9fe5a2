// ==========================================
// 线索导入引擎 - 表格解码器
// ==========================================
// 支持: 表格二进制 (.xlsx/.xlsm/.xlsb/.xls/.ods，仅第一个工作表)
//       分隔文本 (.csv/.tsv/.txt，分隔符自动推断)
// 输出: RawTable（表头 + 规整后的行）
// ==========================================

use crate::domain::table::{RawTable, SourceFormat};
use crate::importer::error::DecodeError;
use crate::importer::separator::{finish_field, infer_separator, split_line, DEFAULT_CANDIDATES};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::io::Cursor;
use tracing::{debug, warn};

/// 默认参与推断的样本行数
pub const DEFAULT_SAMPLE_LINES: usize = 50;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

// ==========================================
// 解码选项与结果
// ==========================================
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub sample_lines: usize,
    pub candidates: Vec<char>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            sample_lines: DEFAULT_SAMPLE_LINES,
            candidates: DEFAULT_CANDIDATES.to_vec(),
        }
    }
}

/// 解码结果（表格 + 来源格式诊断）
#[derive(Debug, Clone)]
pub struct DecodedTable {
    pub table: RawTable,
    pub format: SourceFormat,
}

/// 输入类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Delimited,
    Spreadsheet,
}

/// 判定输入类别：先看声明的扩展名，未知时按文件头魔数嗅探
pub fn detect_kind(bytes: &[u8], declared_extension: Option<&str>) -> InputKind {
    let ext = declared_extension
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "ods" => InputKind::Spreadsheet,
        "csv" | "tsv" | "txt" | "tab" => InputKind::Delimited,
        _ => {
            if bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&OLE_MAGIC) {
                InputKind::Spreadsheet
            } else {
                InputKind::Delimited
            }
        }
    }
}

// ==========================================
// TableDecoder Trait
// ==========================================
pub trait TableDecoder: Send + Sync {
    /// 将原始字节解码为表格
    fn decode(&self, bytes: &[u8]) -> Result<DecodedTable, DecodeError>;
}

// ==========================================
// 分隔文本解码器
// ==========================================
pub struct DelimitedTextDecoder {
    options: DecodeOptions,
}

impl DelimitedTextDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }
}

impl Default for DelimitedTextDecoder {
    fn default() -> Self {
        Self::new(DecodeOptions::default())
    }
}

impl TableDecoder for DelimitedTextDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedTable, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyInput);
        }

        let text = decode_text(bytes);

        // 统一换行: CRLF/CR → LF，丢弃空白行
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let lines: Vec<&str> = normalized
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .collect();

        if lines.is_empty() {
            return Err(DecodeError::NoDataLines);
        }

        let sample_len = self.options.sample_lines.max(1).min(lines.len());
        let inference = infer_separator(&lines[..sample_len], &self.options.candidates);

        let split = |line: &str| -> Vec<String> {
            match inference {
                Some(inf) => split_line(line, inf.separator),
                None => vec![finish_field(line)],
            }
        };

        let headers = split(lines[0]);
        let rows: Vec<Vec<String>> = lines[1..]
            .iter()
            .map(|line| split(*line))
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        let (separator, expected_columns) = match inference {
            Some(inf) => {
                debug!(
                    separator = ?inf.separator,
                    expected_columns = inf.expected_columns,
                    "分隔符推断完成"
                );
                (Some(inf.separator), inf.expected_columns)
            }
            None => {
                warn!(lines = lines.len(), "分隔符推断失败，按单列处理");
                (None, 1)
            }
        };

        Ok(DecodedTable {
            table: RawTable::new(headers, rows),
            format: SourceFormat::Delimited {
                separator,
                expected_columns,
            },
        })
    }
}

/// 字节 → 文本：去 UTF-8 BOM，非法序列按替换字符处理
fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&UTF8_BOM[..]).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!("输入不是合法 UTF-8，按有损方式解码");
            String::from_utf8_lossy(body).into_owned()
        }
    }
}

// ==========================================
// 表格二进制解码器
// ==========================================
pub struct SpreadsheetDecoder;

impl TableDecoder for SpreadsheetDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedTable, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyInput);
        }

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(DecodeError::NoSheet)?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（已用区域第一行）
        let mut rows = range.rows();
        let header_row = rows.next().ok_or(DecodeError::NoDataLines)?;
        let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();

        // 读取数据行，跳过完全空白的行
        let data_rows: Vec<Vec<String>> = rows
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        debug!(
            sheet = %sheet_name,
            columns = headers.len(),
            rows = data_rows.len(),
            "工作表读取完成"
        );

        Ok(DecodedTable {
            table: RawTable::new(headers, data_rows),
            format: SourceFormat::Spreadsheet { sheet: sheet_name },
        })
    }
}

/// 单元格转显示文本：数值/日期转文本，其余去空白
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string().trim().to_string(),
        },
        _ => cell.to_string().trim().to_string(),
    }
}

// ==========================================
// 通用解码器（根据扩展名/魔数自动选择）
// ==========================================
pub struct UniversalDecoder {
    options: DecodeOptions,
}

impl UniversalDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn decode(
        &self,
        bytes: &[u8],
        declared_extension: Option<&str>,
    ) -> Result<DecodedTable, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyInput);
        }

        match detect_kind(bytes, declared_extension) {
            InputKind::Spreadsheet => SpreadsheetDecoder.decode(bytes),
            InputKind::Delimited => DelimitedTextDecoder::new(self.options.clone()).decode(bytes),
        }
    }
}

impl Default for UniversalDecoder {
    fn default() -> Self {
        Self::new(DecodeOptions::default())
    }
}

/// 解码入口（默认选项）
pub fn decode(bytes: &[u8], declared_extension: Option<&str>) -> Result<RawTable, DecodeError> {
    UniversalDecoder::default()
        .decode(bytes, declared_extension)
        .map(|decoded| decoded.table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes_is_error() {
        assert!(matches!(decode(b"", Some("csv")), Err(DecodeError::EmptyInput)));
        assert!(matches!(decode(b"", Some("xlsx")), Err(DecodeError::EmptyInput)));
        assert!(matches!(decode(b"", None), Err(DecodeError::EmptyInput)));
    }

    #[test]
    fn test_blank_lines_only_is_error() {
        let result = decode(b"\r\n  \n\r\n", Some("csv"));
        assert!(matches!(result, Err(DecodeError::NoDataLines)));
    }

    #[test]
    fn test_csv_basic() {
        let bytes = b"First Name,Last Name,E-Mail,Phone\r\nJane,Doe,jane@x.com,555-0100\r\n";
        let table = decode(bytes, Some("csv")).unwrap();

        assert_eq!(table.headers(), &["First Name", "Last Name", "E-Mail", "Phone"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows()[0], vec!["Jane", "Doe", "jane@x.com", "555-0100"]);
    }

    #[test]
    fn test_semicolon_with_bom_and_cr_line_breaks() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("nombre;correo\rAna;ana@x.es\r\rLuis;luis@x.es".as_bytes());

        let decoded = UniversalDecoder::default().decode(&bytes, Some(".CSV")).unwrap();

        assert_eq!(decoded.table.headers(), &["nombre", "correo"]);
        assert_eq!(decoded.table.row_count(), 2);
        assert_eq!(
            decoded.format,
            SourceFormat::Delimited {
                separator: Some(';'),
                expected_columns: 2
            }
        );
    }

    #[test]
    fn test_ragged_rows_padded_and_truncated() {
        let bytes = b"a,b,c\n1,2\n1,2,3,4\n";
        let table = decode(bytes, Some("csv")).unwrap();

        assert_eq!(table.rows()[0], vec!["1", "2", ""]);
        assert_eq!(table.rows()[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_empty_cell_rows_skipped() {
        let bytes = b"a,b\n1,2\n , \n,\n3,4\n";
        let table = decode(bytes, Some("csv")).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[1], vec!["3", "4"]);
    }

    #[test]
    fn test_single_column_fallback() {
        let bytes = b"email\nx@a.com\ny@a.com\n";
        let decoded = UniversalDecoder::default().decode(bytes, Some("txt")).unwrap();

        assert_eq!(decoded.table.headers(), &["email"]);
        assert_eq!(decoded.table.row_count(), 2);
        assert!(matches!(
            decoded.format,
            SourceFormat::Delimited { separator: None, .. }
        ));
    }

    #[test]
    fn test_blank_header_named() {
        let bytes = b"email,,phone\nx@a.com,1,2\n";
        let table = decode(bytes, Some("csv")).unwrap();
        assert_eq!(table.headers(), &["email", "Column_2", "phone"]);
    }

    #[test]
    fn test_spreadsheet_first_sheet_decoded() {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/leads_sheet.xlsx"
        ));
        let decoded = UniversalDecoder::default().decode(bytes, Some("xlsx")).unwrap();

        assert_eq!(
            decoded.format,
            SourceFormat::Spreadsheet {
                sheet: "Leads".to_string()
            }
        );
        assert_eq!(decoded.table.headers(), &["First Name", "Column_2", "Phone", "Since"]);
        // 只含空白的第 3 行被丢弃
        assert_eq!(decoded.table.row_count(), 2);
        assert_eq!(decoded.table.rows()[0], vec!["Jane", "", "34600123456", "2024-03-05"]);
        assert_eq!(decoded.table.rows()[1], vec!["", "", "1.5", ""]);
    }

    #[test]
    fn test_spreadsheet_detected_by_magic_without_extension() {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/leads_sheet.xlsx"
        ));
        let table = decode(bytes, None).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_unreadable_spreadsheet_is_error() {
        let result = decode(b"not a workbook at all", Some("xlsx"));
        assert!(matches!(result, Err(DecodeError::UnreadableContainer(_))));
    }

    #[test]
    fn test_detect_kind_by_magic() {
        assert_eq!(detect_kind(&[0x50, 0x4B, 0x03, 0x04, 0x00], None), InputKind::Spreadsheet);
        assert_eq!(detect_kind(&[0xD0, 0xCF, 0x11, 0xE0], Some("bin")), InputKind::Spreadsheet);
        assert_eq!(detect_kind(b"a,b", None), InputKind::Delimited);
        assert_eq!(detect_kind(b"PK\x03\x04", Some("csv")), InputKind::Delimited);
    }

    #[test]
    fn test_invalid_utf8_decoded_lossily() {
        let bytes = b"name,city\nJos\xe9,Madrid\n";
        let table = decode(bytes, Some("csv")).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows()[0][1], "Madrid");
    }
}

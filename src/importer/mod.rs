// ==========================================
// 线索导入引擎 - 导入层
// ==========================================
// 职责: 外部文件 → 原始表格 → 标准字段 → 查重判定
// 支持: 表格二进制 (第一个工作表), 分隔文本
// ==========================================

// 模块声明
pub mod conflict_handler;
pub mod error;
pub mod error_report;
pub mod field_mapper;
pub mod file_parser;
pub mod separator;

// 重导出核心类型
pub use conflict_handler::{resolve, DuplicateResolver, Resolution};
pub use error::{DecodeError, ImportError, ImportResult};
pub use error_report::{error_report_string, write_error_report};
pub use field_mapper::{
    auto_map, map_row, normalize_header, preview_rows, FieldMapping, MappingWarning, PreviewRow,
    SynonymRule, MAPPING_RULES,
};
pub use file_parser::{
    decode, detect_kind, DecodeOptions, DecodedTable, DelimitedTextDecoder, InputKind,
    SpreadsheetDecoder, TableDecoder, UniversalDecoder,
};
pub use separator::{
    infer_separator, infer_separator_default, score_separators, split_line, CandidateSeparator,
    SeparatorInference, DEFAULT_CANDIDATES,
};

// ==========================================
// 线索导入引擎 - 原始表格
// ==========================================
// 职责: 解码结果的统一表示（表头 + 行）
// 不变量: 每行长度 == 表头长度（解码时补齐/截断）
// ==========================================

use serde::{Deserialize, Serialize};

/// 原始表格：每次上传创建一次，之后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// 构造并规整表格
    ///
    /// - 空白表头替换为 `Column_<n>`（n 从 1 开始）
    /// - 行长度按表头补齐空串或截断
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers
            .into_iter()
            .enumerate()
            .map(|(idx, h)| {
                let trimmed = h.trim();
                if trimmed.is_empty() {
                    format!("Column_{}", idx + 1)
                } else {
                    trimmed.to_string()
                }
            })
            .collect();

        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self, column: usize) -> Option<&str> {
        self.headers.get(column).map(String::as_str)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }
}

// ==========================================
// 来源格式 (解码诊断信息)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    /// 分隔文本；separator 为 None 表示推断失败，按单列处理
    Delimited {
        separator: Option<char>,
        expected_columns: usize,
    },
    /// 表格二进制（仅第一个工作表）
    Spreadsheet { sheet: String },
}

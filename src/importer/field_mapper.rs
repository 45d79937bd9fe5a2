// ==========================================
// 线索导入引擎 - 字段映射器
// ==========================================
// 职责: 表头 → 标准字段自动映射 + 用户覆写 + 行记录规范化
// 规则: 有序 (标准字段, 同义词谓词) 列表，按声明顺序求值
// ==========================================

use crate::domain::lead::{ImportRecord, LeadDefaults};
use crate::domain::table::RawTable;
use crate::domain::types::{CanonicalField, WorkerId};
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 反向匹配（同义词包含表头）时表头的最小长度
const MIN_REVERSE_MATCH_LEN: usize = 3;

// ==========================================
// SynonymRule - 同义词谓词
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct SynonymRule {
    pub field: CanonicalField,
    pub tokens: &'static [&'static str],
    pub excludes: &'static [&'static str],
}

impl SynonymRule {
    /// 判断规范化后的表头是否命中本规则
    ///
    /// - 排除词命中 → 不匹配
    /// - 表头包含同义词，或同义词包含表头（双向子串）→ 匹配
    pub fn matches(&self, normalized_header: &str) -> bool {
        if normalized_header.is_empty() {
            return false;
        }
        if self.excludes.iter().any(|ex| normalized_header.contains(ex)) {
            return false;
        }
        let reverse_allowed = normalized_header.chars().count() >= MIN_REVERSE_MATCH_LEN;
        self.tokens.iter().any(|token| {
            normalized_header.contains(token) || (reverse_allowed && token.contains(normalized_header))
        })
    }
}

/// 自动映射规则表（顺序即优先级）
pub const MAPPING_RULES: [SynonymRule; 11] = [
    SynonymRule {
        field: CanonicalField::FirstName,
        tokens: &["first", "fname", "given", "forename", "nombre"],
        excludes: &["apellido", "completo", "full"],
    },
    SynonymRule {
        field: CanonicalField::LastName,
        tokens: &["last", "lname", "surname", "family", "apellido"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Email,
        tokens: &["email", "mail", "correo"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Phone,
        tokens: &["phone", "tel", "teléfono", "telefono", "mobile", "móvil", "movil", "celular"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Country,
        tokens: &["country", "país", "pais", "nation"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::City,
        tokens: &["city", "ciudad", "town"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Address,
        tokens: &["address", "dirección", "direccion", "street", "calle"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Company,
        tokens: &["company", "empresa", "compañía", "compania", "organization", "organisation"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Source,
        tokens: &["source", "origen", "fuente", "campaign", "campaña"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Status,
        tokens: &["status", "estado"],
        excludes: &[],
    },
    SynonymRule {
        field: CanonicalField::Notes,
        tokens: &["note", "comment", "comentario", "observ", "nota"],
        excludes: &[],
    },
];

/// 表头规范化：小写，`_ - .` 视为空格，压缩空白
pub fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace(['_', '-', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ==========================================
// FieldMapping - 标准字段 → 源列序号
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    bindings: BTreeMap<CanonicalField, usize>,
}

/// 映射告警
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingWarning {
    /// 同一列被多个标准字段复用
    ColumnReused {
        column: usize,
        fields: Vec<CanonicalField>,
    },
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.bindings.get(&field).copied()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.bindings.iter().map(|(f, c)| (*f, *c))
    }

    /// 绑定字段到列（不做越界检查）
    pub fn bind(&mut self, field: CanonicalField, column: usize) -> Option<usize> {
        self.bindings.insert(field, column)
    }

    /// 绑定字段到列，列序号需小于 column_count
    pub fn bind_checked(
        &mut self,
        field: CanonicalField,
        column: usize,
        column_count: usize,
    ) -> ImportResult<Option<usize>> {
        if column >= column_count {
            return Err(ImportError::ColumnOutOfRange {
                column,
                column_count,
            });
        }
        Ok(self.bind(field, column))
    }

    pub fn unbind(&mut self, field: CanonicalField) -> Option<usize> {
        self.bindings.remove(&field)
    }

    /// 未绑定的必填字段（按声明顺序）
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .iter()
            .copied()
            .filter(|f| !self.bindings.contains_key(f))
            .collect()
    }

    /// 必填字段是否全部绑定
    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// 校验必填字段
    pub fn validate(&self) -> ImportResult<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ImportError::MappingIncomplete { missing })
        }
    }

    /// 同一列被多个字段使用时给出告警
    pub fn warnings(&self) -> Vec<MappingWarning> {
        let mut by_column: BTreeMap<usize, Vec<CanonicalField>> = BTreeMap::new();
        for (field, column) in self.bindings() {
            by_column.entry(column).or_default().push(field);
        }
        by_column
            .into_iter()
            .filter(|(_, fields)| fields.len() > 1)
            .map(|(column, fields)| MappingWarning::ColumnReused { column, fields })
            .collect()
    }
}

// ==========================================
// 自动映射
// ==========================================

/// 按规则表为表头生成映射建议（不会失败，返回能绑定的子集）
///
/// - 每个字段取第一个命中的未占用表头
/// - 必填字段找不到未占用表头时，允许复用已占用表头（见 `FieldMapping::warnings`）
pub fn auto_map<S: AsRef<str>>(headers: &[S]) -> FieldMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
    let mut mapping = FieldMapping::new();
    let mut used: BTreeSet<usize> = BTreeSet::new();

    for rule in MAPPING_RULES.iter() {
        let candidates: Vec<usize> = normalized
            .iter()
            .enumerate()
            .filter(|(_, header)| rule.matches(header))
            .map(|(idx, _)| idx)
            .collect();

        let chosen = candidates
            .iter()
            .copied()
            .find(|idx| !used.contains(idx))
            .or_else(|| {
                if rule.field.is_required() {
                    candidates.first().copied()
                } else {
                    None
                }
            });

        if let Some(column) = chosen {
            if used.contains(&column) {
                tracing::warn!(
                    field = %rule.field,
                    column = column,
                    "必填字段复用已映射的列"
                );
            }
            used.insert(column);
            mapping.bind(rule.field, column);
        }
    }

    mapping
}

// ==========================================
// 行记录规范化
// ==========================================

/// 读取映射列的值（去空白），未绑定返回空串
fn mapped_value(table: &RawTable, row: usize, mapping: &FieldMapping, field: CanonicalField) -> String {
    mapping
        .get(field)
        .and_then(|column| table.cell(row, column))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// 将一行规范化为 ImportRecord
///
/// 来源/状态列有值时优先于会话默认值
pub fn map_row(
    table: &RawTable,
    row: usize,
    mapping: &FieldMapping,
    defaults: &LeadDefaults,
    assignee: Option<WorkerId>,
) -> ImportRecord {
    let value = |field| mapped_value(table, row, mapping, field);

    ImportRecord {
        row_number: row + 1,
        first_name: value(CanonicalField::FirstName),
        last_name: value(CanonicalField::LastName),
        email: value(CanonicalField::Email),
        phone: value(CanonicalField::Phone),
        country: non_empty(value(CanonicalField::Country)),
        city: non_empty(value(CanonicalField::City)),
        address: non_empty(value(CanonicalField::Address)),
        company: non_empty(value(CanonicalField::Company)),
        notes: non_empty(value(CanonicalField::Notes)),
        source: non_empty(value(CanonicalField::Source)).unwrap_or_else(|| defaults.source.clone()),
        status: non_empty(value(CanonicalField::Status)).unwrap_or_else(|| defaults.status.clone()),
        desk: defaults.desk.clone(),
        assignee,
    }
}

// ==========================================
// 预览
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    pub row_number: usize,
    pub values: BTreeMap<CanonicalField, String>,
}

/// 按当前映射展示前 limit 行（只读）
pub fn preview_rows(table: &RawTable, mapping: &FieldMapping, limit: usize) -> Vec<PreviewRow> {
    (0..table.row_count().min(limit))
        .map(|row| PreviewRow {
            row_number: row + 1,
            values: mapping
                .bindings()
                .map(|(field, _)| (field, mapped_value(table, row, mapping, field)))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_map_english_headers() {
        let mapping = auto_map(&["First Name", "Last Name", "E-Mail", "Phone"]);

        assert_eq!(mapping.get(CanonicalField::FirstName), Some(0));
        assert_eq!(mapping.get(CanonicalField::LastName), Some(1));
        assert_eq!(mapping.get(CanonicalField::Email), Some(2));
        assert_eq!(mapping.get(CanonicalField::Phone), Some(3));
        assert!(mapping.is_complete());
        assert!(mapping.warnings().is_empty());
    }

    #[test]
    fn test_auto_map_spanish_headers() {
        let mapping = auto_map(&[
            "Nombre",
            "Apellidos",
            "Correo electrónico",
            "Teléfono",
            "País",
            "Ciudad",
        ]);

        assert_eq!(mapping.get(CanonicalField::FirstName), Some(0));
        assert_eq!(mapping.get(CanonicalField::LastName), Some(1));
        assert_eq!(mapping.get(CanonicalField::Email), Some(2));
        assert_eq!(mapping.get(CanonicalField::Phone), Some(3));
        assert_eq!(mapping.get(CanonicalField::Country), Some(4));
        assert_eq!(mapping.get(CanonicalField::City), Some(5));
    }

    #[test]
    fn test_first_name_excludes_qualifiers() {
        let mapping = auto_map(&["Nombre completo", "Email"]);
        assert_eq!(mapping.get(CanonicalField::FirstName), None);
        assert_eq!(mapping.get(CanonicalField::Email), Some(1));
        assert_eq!(
            mapping.missing_required(),
            vec![
                CanonicalField::FirstName,
                CanonicalField::LastName,
                CanonicalField::Phone
            ]
        );
    }

    #[test]
    fn test_required_field_reuses_header_with_warning() {
        // "name" 同时被 fname / lname 反向包含
        let mapping = auto_map(&["Name", "Email", "Phone"]);

        assert_eq!(mapping.get(CanonicalField::FirstName), Some(0));
        assert_eq!(mapping.get(CanonicalField::LastName), Some(0));
        assert_eq!(
            mapping.warnings(),
            vec![MappingWarning::ColumnReused {
                column: 0,
                fields: vec![CanonicalField::FirstName, CanonicalField::LastName],
            }]
        );
    }

    #[test]
    fn test_optional_field_never_reuses() {
        // "Email Address" 已被 email 占用，address 保持未绑定
        let mapping = auto_map(&["Email Address"]);
        assert_eq!(mapping.get(CanonicalField::Email), Some(0));
        assert_eq!(mapping.get(CanonicalField::Address), None);
    }

    #[test]
    fn test_auto_map_empty_headers() {
        let headers: Vec<String> = vec![];
        let mapping = auto_map(&headers);
        assert_eq!(mapping.bindings().count(), 0);
        assert!(!mapping.is_complete());
    }

    #[test]
    fn test_validate_reports_missing() {
        let mut mapping = FieldMapping::new();
        mapping.bind(CanonicalField::FirstName, 0);
        mapping.bind(CanonicalField::LastName, 1);

        match mapping.validate() {
            Err(ImportError::MappingIncomplete { missing }) => {
                assert_eq!(missing, vec![CanonicalField::Email, CanonicalField::Phone]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bind_checked_rejects_out_of_range() {
        let mut mapping = FieldMapping::new();
        let result = mapping.bind_checked(CanonicalField::Email, 4, 4);
        assert!(matches!(
            result,
            Err(ImportError::ColumnOutOfRange { column: 4, column_count: 4 })
        ));
        assert_eq!(mapping.get(CanonicalField::Email), None);
    }

    #[test]
    fn test_map_row_uses_defaults_and_column_overrides() {
        let table = RawTable::new(
            vec!["first".into(), "last".into(), "mail".into(), "tel".into(), "status".into()],
            vec![
                vec![" Jane ".into(), "Doe".into(), "jane@x.com".into(), "1".into(), "".into()],
                vec!["Bo".into(), "Li".into(), "bo@x.com".into(), "2".into(), "hot".into()],
            ],
        );
        let mapping = auto_map(table.headers());
        let defaults = LeadDefaults {
            desk: Some("EU".into()),
            ..Default::default()
        };

        let first = map_row(&table, 0, &mapping, &defaults, None);
        assert_eq!(first.row_number, 1);
        assert_eq!(first.first_name, "Jane");
        assert_eq!(first.status, "new");
        assert_eq!(first.source, "import");
        assert_eq!(first.desk.as_deref(), Some("EU"));

        let second = map_row(&table, 1, &mapping, &defaults, Some(WorkerId::from("w1")));
        assert_eq!(second.status, "hot");
        assert_eq!(second.assignee, Some(WorkerId::from("w1")));
    }

    #[test]
    fn test_preview_limited() {
        let rows = (0..25)
            .map(|i| vec![format!("n{}", i), format!("e{}@x.com", i)])
            .collect();
        let table = RawTable::new(vec!["Nombre".into(), "Email".into()], rows);
        let mapping = auto_map(table.headers());

        let preview = preview_rows(&table, &mapping, 10);
        assert_eq!(preview.len(), 10);
        assert_eq!(preview[9].row_number, 10);
        assert_eq!(
            preview[0].values.get(&CanonicalField::Email).map(String::as_str),
            Some("e0@x.com")
        );
    }
}

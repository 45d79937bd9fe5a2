// ==========================================
// 线索导入引擎 - 分隔符推断与引号感知切分
// ==========================================
// 职责: 对分隔文本的样本行统计列数一致性，选出最优分隔符
// 评分: consistency = mean / (1 + variance)，mean <= 1 时为 0
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 默认候选分隔符（顺序即同分时的最终次序）
pub const DEFAULT_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];

// ==========================================
// CandidateSeparator - 候选分隔符评分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSeparator {
    pub character: char,
    pub consistency_score: f64,
    pub mean_columns: f64,
    pub observed_column_count: usize,
}

/// 推断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatorInference {
    pub separator: char,
    pub expected_columns: usize,
}

/// 对每个候选分隔符打分
///
/// observed_column_count 取样本中出现次数最多的列数（同频取较大值）
pub fn score_separators<S: AsRef<str>>(
    sample_lines: &[S],
    candidates: &[char],
) -> Vec<CandidateSeparator> {
    candidates
        .iter()
        .map(|&candidate| {
            let counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| split_line(line.as_ref(), candidate).len())
                .collect();

            if counts.is_empty() {
                return CandidateSeparator {
                    character: candidate,
                    consistency_score: 0.0,
                    mean_columns: 0.0,
                    observed_column_count: 0,
                };
            }

            let n = counts.len() as f64;
            let mean = counts.iter().sum::<usize>() as f64 / n;
            let variance = counts
                .iter()
                .map(|&c| (c as f64 - mean).powi(2))
                .sum::<f64>()
                / n;

            let consistency_score = if mean > 1.0 {
                mean / (1.0 + variance)
            } else {
                0.0
            };

            CandidateSeparator {
                character: candidate,
                consistency_score,
                mean_columns: mean,
                observed_column_count: modal_count(&counts),
            }
        })
        .collect()
}

fn modal_count(counts: &[usize]) -> usize {
    let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
    for &c in counts {
        *freq.entry(c).or_insert(0) += 1;
    }
    // BTreeMap 升序遍历，>= 保证同频时取较大列数
    let mut best = (0usize, 0usize);
    for (count, hits) in freq {
        if hits >= best.1 {
            best = (count, hits);
        }
    }
    best.0
}

/// 推断分隔符
///
/// # 返回
/// - Some: 一致性最高的候选（同分取平均列数更大者）
/// - None: 所有候选得分均为 0，调用方应按单列处理每一行
pub fn infer_separator<S: AsRef<str>>(
    sample_lines: &[S],
    candidates: &[char],
) -> Option<SeparatorInference> {
    let scores = score_separators(sample_lines, candidates);

    let mut best: Option<&CandidateSeparator> = None;
    for candidate in scores.iter().filter(|c| c.consistency_score > 0.0) {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let better = candidate.consistency_score > current.consistency_score
                    || (candidate.consistency_score == current.consistency_score
                        && candidate.mean_columns > current.mean_columns);
                if better {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }

    best.map(|c| SeparatorInference {
        separator: c.character,
        expected_columns: c.observed_column_count,
    })
}

/// 使用默认候选推断分隔符
pub fn infer_separator_default<S: AsRef<str>>(sample_lines: &[S]) -> Option<SeparatorInference> {
    infer_separator(sample_lines, &DEFAULT_CANDIDATES)
}

// ==========================================
// 引号感知切分
// ==========================================

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// 按分隔符切分一行
///
/// - 引号内分隔符按字面处理；同一字段只认一种引号（`"` 或 `'`）
/// - 引号内连续两个引号输出一个字面引号，不结束引号段
/// - 引号外遇到引号立即进入引号模式
/// - 输出字段去掉一对首尾匹配的引号并去除两端空白
pub fn split_line(line: &str, separator: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == quote_char {
                if chars.peek() == Some(&quote_char) {
                    // 转义引号：保留一个，仍在引号内
                    chars.next();
                    current.push(c);
                } else {
                    in_quotes = false;
                    current.push(c);
                }
            } else {
                current.push(c);
            }
        } else if c == separator {
            fields.push(finish_field(&current));
            current.clear();
        } else if is_quote(c) {
            in_quotes = true;
            quote_char = c;
            current.push(c);
        } else {
            current.push(c);
        }
    }
    fields.push(finish_field(&current));

    fields
}

/// 字段收尾：去两端空白并剥离一对首尾匹配的引号
pub(crate) fn finish_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if is_quote(first) && first == last => {
            let inner = &trimmed[first.len_utf8()..trimmed.len() - last.len_utf8()];
            inner.trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

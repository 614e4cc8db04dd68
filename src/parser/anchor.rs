use regex::Regex;

use super::Row;

pub const PLATE_PATTERN: &str = r"\b[A-Z]{3}[0-9][A-Z0-9][0-9]{2}\b";

/// 车牌在文档中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPosition {
    /// 文本模式下的字节区间
    Offset { start: usize, end: usize },
    /// 表格模式：行号与该行内第几个车牌
    Row { row: usize, slot: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub plate: String,
    pub position: AnchorPosition,
}

pub struct AnchorLocator {
    plate_re: Regex,
}

impl AnchorLocator {
    pub fn new() -> Self {
        Self {
            plate_re: Regex::new(PLATE_PATTERN).unwrap(),
        }
    }

    pub fn locate_in_text(&self, text: &str) -> Vec<Anchor> {
        self.plate_re
            .find_iter(text)
            .map(|m| Anchor {
                plate: m.as_str().to_string(),
                position: AnchorPosition::Offset {
                    start: m.start(),
                    end: m.end(),
                },
            })
            .collect()
    }

    /// 单元格内可能用换行拼接了多个车牌，每个车牌按出现顺序得到一个槽位
    pub fn locate_in_row(&self, row_index: usize, row: &Row) -> Vec<Anchor> {
        let mut anchors = Vec::new();
        for cell in row.iter().flatten() {
            for line in cell.split('\n') {
                for m in self.plate_re.find_iter(line) {
                    anchors.push(Anchor {
                        plate: m.as_str().to_string(),
                        position: AnchorPosition::Row {
                            row: row_index,
                            slot: anchors.len(),
                        },
                    });
                }
            }
        }
        anchors
    }

    /// 首个非空单元格是表头关键字
    pub fn is_header_row(row: &Row, keywords: &[String]) -> bool {
        let first = row
            .iter()
            .flatten()
            .map(|cell| cell.trim())
            .find(|cell| !cell.is_empty());

        match first {
            Some(cell) => keywords.iter().any(|k| k.eq_ignore_ascii_case(cell)),
            None => false,
        }
    }
}

use regex::Regex;
use tracing::{debug, info};

use super::{Row, Table};

/// 一个单元格在行内的字符区间
#[derive(Debug, Clone, PartialEq)]
struct Span {
    start: usize,
    end: usize,
    text: String,
}

impl Span {
    /// 两个区间重叠时为 0
    fn distance(&self, column: &Span) -> usize {
        if self.end <= column.start {
            column.start - self.end
        } else if column.end <= self.start {
            self.start - column.end
        } else {
            0
        }
    }
}

pub struct TableParser {
    column_gap_re: Regex,
    cell_re: Regex,
    min_rows: usize,
}

impl TableParser {
    pub fn new() -> Self {
        Self {
            column_gap_re: Regex::new(r"\t|\s{2,}").unwrap(),
            // 单个空格连接的词属于同一单元格
            cell_re: Regex::new(r"\S(?:\S| \S)*").unwrap(),
            min_rows: 2,
        }
    }

    /// 从页面文本中检测按列对齐的块，每块还原成一张表
    pub fn extract(&self, page_text: &str) -> Vec<Table> {
        let lines: Vec<&str> = page_text.lines().collect();
        let mut tables: Vec<Table> = Vec::new();
        let mut caption: Option<String> = None;

        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();

            if !self.looks_like_table_row(trimmed) {
                if !trimmed.is_empty() {
                    caption = Some(trimmed.to_string());
                }
                i += 1;
                continue;
            }

            let mut block: Vec<&str> = Vec::new();
            let mut blank_count = 0;
            while i < lines.len() {
                let line = lines[i].trim_end();
                if line.trim().is_empty() {
                    blank_count += 1;
                    if blank_count > 1 {
                        break; // Two consecutive blanks end the table
                    }
                    i += 1;
                    continue;
                }
                blank_count = 0;
                if !self.looks_like_table_row(line.trim()) {
                    break;
                }
                block.push(line);
                i += 1;
            }

            if block.len() >= self.min_rows {
                let rows = self.align_rows(&block);
                debug!("检测到表格: {:?}, {} 行", caption, rows.len());
                tables.push(Table {
                    caption: caption.take(),
                    rows,
                });
            }
        }

        if !tables.is_empty() {
            info!("表格解析完成，共 {} 个", tables.len());
        }
        tables
    }

    /// 至少两个被制表符或连续空格隔开的片段
    fn looks_like_table_row(&self, line: &str) -> bool {
        if line.len() < 5 {
            return false;
        }
        self.column_gap_re
            .split(line)
            .filter(|s| !s.trim().is_empty())
            .count()
            >= 2
    }

    fn spans(&self, line: &str) -> Vec<Span> {
        self.cell_re
            .find_iter(line)
            .map(|m| {
                let start = line[..m.start()].chars().count();
                Span {
                    start,
                    end: start + m.as_str().chars().count(),
                    text: m.as_str().to_string(),
                }
            })
            .collect()
    }

    /// 以单元格最多的一行为列基准，缺格的行按位置归入最近的列，空列为 None
    fn align_rows(&self, block: &[&str]) -> Vec<Row> {
        let lines: Vec<Vec<Span>> = block.iter().map(|line| self.spans(line)).collect();
        let columns = lines
            .iter()
            .fold(&[] as &[Span], |widest, spans| {
                if spans.len() > widest.len() {
                    spans.as_slice()
                } else {
                    widest
                }
            })
            .to_vec();

        lines
            .into_iter()
            .map(|spans| {
                if spans.len() >= columns.len() {
                    return spans.into_iter().map(|span| Some(span.text)).collect();
                }

                let mut row: Row = vec![None; columns.len()];
                for span in spans {
                    let Some(column) = (0..columns.len()).min_by_key(|&c| span.distance(&columns[c])) else {
                        continue;
                    };
                    row[column] = Some(match row[column].take() {
                        Some(existing) => format!("{} {}", existing, span.text),
                        None => span.text,
                    });
                }
                row
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuilds_rows_from_aligned_columns() {
        let text = "ESTOQUE ALPHAVILLE\n\
                    LOJA    MODELO        KM      FIPE\n\
                    ABC1D23   COROLLA XEI   45.000   R$ 98.000,00\n\
                    \n\
                    DEF4G56\tONIX LT\t30.000\tR$ 70.000,00\n\
                    \n\
                    \n\
                    Rodape da pagina";

        let tables = TableParser::new().extract(text);

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.caption.as_deref(), Some("ESTOQUE ALPHAVILLE"));
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1][1].as_deref(), Some("COROLLA XEI"));
        assert_eq!(table.rows[2][3].as_deref(), Some("R$ 70.000,00"));
    }

    #[test]
    fn blank_cells_keep_their_column() {
        let text = "PLACA     LOJA      MODELO        FAB     MOD     KM\n\
                    ABC1D23   LOJA1     COROLLA XEI   2022    2023    45.000\n\
                    DEF4G56             ONIX LT       2021    2022    30.000";

        let tables = TableParser::new().extract(text);

        let row = &tables[0].rows[2];
        assert_eq!(row.len(), 6);
        assert_eq!(row[0].as_deref(), Some("DEF4G56"));
        assert_eq!(row[1], None);
        assert_eq!(row[2].as_deref(), Some("ONIX LT"));
        assert_eq!(row[3].as_deref(), Some("2021"));
        assert_eq!(row[4].as_deref(), Some("2022"));
        assert_eq!(row[5].as_deref(), Some("30.000"));
    }

    #[test]
    fn single_aligned_line_is_not_a_table() {
        let tables = TableParser::new().extract("Titulo\nLOJA    MODELO\nTexto corrido aqui.");
        assert!(tables.is_empty());
    }
}

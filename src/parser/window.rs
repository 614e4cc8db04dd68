use crate::config::WindowMode;

use super::anchor::{Anchor, AnchorPosition};
use super::Row;

/// 单条记录的证据窗口
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceWindow {
    Text(String),
    /// 表格行中与车牌同一槽位的单元格切片
    Cells(Vec<String>),
}

impl EvidenceWindow {
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Cells(cells) => cells.join(" "),
        }
    }
}

pub struct WindowBuilder {
    mode: WindowMode,
    left: usize,
    right: usize,
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn text_start(anchor: &Anchor) -> Option<usize> {
    match anchor.position {
        AnchorPosition::Offset { start, .. } => Some(start),
        AnchorPosition::Row { .. } => None,
    }
}

fn text_end(anchor: &Anchor) -> Option<usize> {
    match anchor.position {
        AnchorPosition::Offset { end, .. } => Some(end),
        AnchorPosition::Row { .. } => None,
    }
}

fn line_start(text: &str, index: usize) -> usize {
    text[..index].rfind('\n').map_or(0, |i| i + 1)
}

/// 车牌所在行的行首到下一个车牌所在行的行首；与相邻车牌同一行时在车牌处切开
fn segment_bounds(
    text: &str,
    start: usize,
    end: usize,
    previous_end: Option<usize>,
    next_start: Option<usize>,
) -> (usize, usize) {
    let own_line = line_start(text, start);
    let from = match previous_end {
        Some(prev) if prev > own_line => start,
        _ => own_line,
    };

    let to = match next_start {
        Some(next) => {
            let next_line = line_start(text, next);
            if next_line > start {
                next_line
            } else {
                next
            }
        }
        None => text.len(),
    };
    (from, to.max(end))
}

impl WindowBuilder {
    pub fn new(mode: WindowMode, left: usize, right: usize) -> Self {
        Self { mode, left, right }
    }

    /// 为每个文本锚点切出窗口，`anchors` 需按出现顺序排列
    pub fn text_windows(&self, text: &str, anchors: &[Anchor]) -> Vec<EvidenceWindow> {
        anchors
            .iter()
            .enumerate()
            .map(|(i, anchor)| {
                let (start, end) = match anchor.position {
                    AnchorPosition::Offset { start, end } => (start, end),
                    AnchorPosition::Row { .. } => (0, 0),
                };

                let (from, to) = match self.mode {
                    WindowMode::Bidirectional => (
                        floor_boundary(text, start.saturating_sub(self.left)),
                        ceil_boundary(text, end.saturating_add(self.right)),
                    ),
                    WindowMode::Segment => {
                        let previous = anchors[..i].iter().rev().find_map(text_end);
                        let next = anchors[i + 1..].iter().find_map(text_start);
                        segment_bounds(text, start, end, previous, next)
                    }
                };

                EvidenceWindow::Text(text[from..to].to_string())
            })
            .collect()
    }

    /// 一行只有一个车牌时取整行；多个车牌时每格按换行拆分后取同序号的片段
    pub fn row_window(row: &Row, slot: usize, plates_in_row: usize) -> EvidenceWindow {
        let cells = row
            .iter()
            .map(|cell| match cell {
                Some(cell) if plates_in_row > 1 => slot_line(cell, slot),
                Some(cell) => cell.trim().to_string(),
                None => String::new(),
            })
            .collect();
        EvidenceWindow::Cells(cells)
    }
}

/// 取单元格第 `slot` 个非空行，不够时退回最后一个
pub fn slot_line(cell: &str, slot: usize) -> String {
    let lines: Vec<&str> = cell
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .get(slot)
        .or_else(|| lines.last())
        .map(|line| line.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::anchor::AnchorLocator;

    #[test]
    fn bidirectional_windows_clamp_and_overlap() {
        let text = "AAA ABC1D23 R$ 95.000,00 R$ 80.000,00 DEF4G56 R$ 50.000,00";
        let anchors = AnchorLocator::new().locate_in_text(text);
        let windows = WindowBuilder::new(WindowMode::Bidirectional, 4, 40).text_windows(text, &anchors);

        assert_eq!(windows.len(), 2);
        let first = windows[0].text();
        assert!(first.starts_with("AAA ABC1D23"));
        assert!(first.contains("DEF4G56"));
        assert!(windows[1].text().ends_with("R$ 50.000,00"));
    }

    #[test]
    fn segment_windows_stop_at_next_plate() {
        let text = "ABC1D23 R$ 95.000,00 DEF4G56 R$ 50.000,00";
        let anchors = AnchorLocator::new().locate_in_text(text);
        let windows = WindowBuilder::new(WindowMode::Segment, 0, 0).text_windows(text, &anchors);

        assert_eq!(windows[0].text(), "ABC1D23 R$ 95.000,00 ");
        assert_eq!(windows[1].text(), "DEF4G56 R$ 50.000,00");
    }

    #[test]
    fn segment_windows_follow_lines() {
        let text = "TOYOTA COROLLA ABC1D23 R$ 98.000,00\nKM 45.000\nFIAT ARGO DEF4G56 R$ 70.000,00";
        let anchors = AnchorLocator::new().locate_in_text(text);
        let windows = WindowBuilder::new(WindowMode::Segment, 0, 0).text_windows(text, &anchors);

        assert_eq!(windows[0].text(), "TOYOTA COROLLA ABC1D23 R$ 98.000,00\nKM 45.000\n");
        assert_eq!(windows[1].text(), "FIAT ARGO DEF4G56 R$ 70.000,00");
    }

    #[test]
    fn windows_respect_char_boundaries() {
        let text = "ÁÉÍ ABC1D23 preço";
        let anchors = AnchorLocator::new().locate_in_text(text);
        let windows = WindowBuilder::new(WindowMode::Bidirectional, 2, 3).text_windows(text, &anchors);

        assert!(windows[0].text().contains("ABC1D23"));
    }

    #[test]
    fn multi_plate_rows_take_matching_slot() {
        let row = vec![
            Some("ABC1D23\nDEF4G56".to_string()),
            Some("ONIX\nHB20".to_string()),
            Some("PRETO".to_string()),
            None,
        ];

        let window = WindowBuilder::row_window(&row, 1, 2);
        assert_eq!(
            window,
            EvidenceWindow::Cells(vec![
                "DEF4G56".to_string(),
                "HB20".to_string(),
                "PRETO".to_string(),
                String::new(),
            ])
        );
    }
}

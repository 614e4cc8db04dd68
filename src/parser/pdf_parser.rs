use lopdf::Document;
use tracing::{debug, info, warn};
use std::path::Path;

use super::{Page, RawDocument, TableParser};
use crate::utils::{FipeError, FipeResult};

pub struct PdfParser {
    table_parser: TableParser,
}

impl PdfParser {
    pub fn new() -> Self {
        Self {
            table_parser: TableParser::new(),
        }
    }

    /// 读取PDF文件并逐页提取文本与表格
    pub fn load(&self, pdf_path: impl AsRef<Path>) -> FipeResult<RawDocument> {
        let pdf_path = pdf_path.as_ref();
        info!("解析PDF: {}", pdf_path.display());

        if !pdf_path.exists() {
            return Err(FipeError::PdfError(format!("PDF文件不存在: {}", pdf_path.display())));
        }

        let bytes = std::fs::read(pdf_path)?;
        self.parse_bytes(&bytes)
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> FipeResult<RawDocument> {
        let doc = Document::load_mem(bytes).map_err(|e| FipeError::PdfError(e.to_string()))?;
        let mut pages: Vec<Page> = Vec::new();

        for (number, _) in doc.get_pages() {
            let text = match doc.extract_text(&[number]) {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    debug!("第 {} 页文本提取失败: {}", number, e);
                    None
                }
            };
            pages.push(self.build_page(number as usize, text));
        }

        // lopdf can't decode some font encodings; pdf-extract handles more of them
        if pages.iter().all(|p| p.text.is_none()) {
            match pdf_extract::extract_text_from_mem(bytes) {
                Ok(text) if !text.trim().is_empty() => {
                    info!("lopdf 未取到文本，改用 pdf-extract");
                    pages = vec![self.build_page(1, Some(text))];
                }
                Ok(_) => warn!("PDF中未提取到文本内容，可能是扫描件"),
                Err(e) => warn!("pdf-extract 提取失败: {}", e),
            }
        }

        let document = RawDocument { pages };
        let text_len: usize = document
            .pages
            .iter()
            .filter_map(|p| p.text.as_ref().map(String::len))
            .sum();
        info!(
            "提取完成: {} 页, 文本 {} 字符, 表格 {} 个",
            document.pages.len(),
            text_len,
            document.tables().count()
        );

        Ok(document)
    }

    fn build_page(&self, number: usize, text: Option<String>) -> Page {
        let tables = text
            .as_deref()
            .map(|t| self.table_parser.extract(t))
            .unwrap_or_default();
        Page {
            number,
            text,
            tables,
        }
    }
}

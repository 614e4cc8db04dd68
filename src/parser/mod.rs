pub mod anchor;
pub mod assembler;
pub mod fields;
pub mod layout;
pub mod money;
pub mod pdf_parser;
pub mod table_parser;
pub mod vocabulary;
pub mod window;

pub use assembler::Extraction;
pub use layout::{ExtractionContext, LayoutRegistry};
pub use pdf_parser::PdfParser;
pub use table_parser::TableParser;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::config::{AppConfig, VocabularyConfig};
use crate::utils::FipeResult;
use fields::ModelYears;
use vocabulary::Category;

/// 表格行，单元格可能为空
pub type Row = Vec<Option<String>>;

/// 提取的表格
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub caption: Option<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub text: Option<String>,
    #[serde(default)]
    pub tables: Vec<Table>,
}

/// 一次上传对应的原始文档，处理结束即丢弃
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub pages: Vec<Page>,
}

impl RawDocument {
    /// 所有页文本按页顺序拼接
    pub fn full_text(&self) -> String {
        let mut full_text = String::new();
        for text in self.pages.iter().filter_map(|p| p.text.as_deref()) {
            full_text.push_str(text);
            full_text.push('\n');
        }
        full_text
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.pages.iter().flat_map(|p| p.tables.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| {
            p.text.as_deref().map_or(true, |t| t.trim().is_empty()) && p.tables.is_empty()
        })
    }

    /// 读取预先提取好的 JSON 文档
    pub fn load_json(path: impl AsRef<Path>) -> FipeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let document: RawDocument = serde_json::from_str(&content)?;
        Ok(document)
    }
}

/// 从一个锚点提取出的候选车辆记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub plate: String,
    pub brand: Category,
    pub model: String,
    pub color: Category,
    pub years: ModelYears,
    /// 0 表示未识别
    pub mileage: u32,
    pub reference_price: f64,
    pub cost_price: f64,
    pub fee: Option<f64>,
    pub store: Option<String>,
    pub layout: String,
}

/// 统一提取管道
pub struct ExtractionPipeline {
    registry: LayoutRegistry,
    context: ExtractionContext,
}

impl ExtractionPipeline {
    pub fn new(config: &AppConfig, vocabulary: &VocabularyConfig) -> Self {
        Self {
            registry: LayoutRegistry::from_config(config),
            context: ExtractionContext::new(&config.extraction, vocabulary),
        }
    }

    pub fn selected_layout(&self, document: &RawDocument) -> &str {
        self.registry.select(document, &self.context).name()
    }

    /// 选中布局在提取时会处理的车牌数
    pub fn anchor_count(&self, document: &RawDocument) -> usize {
        self.registry
            .select(document, &self.context)
            .anchors(document, &self.context)
            .len()
    }

    /// 处理一份文档，返回候选记录与统计
    pub fn process(&self, document: &RawDocument) -> Extraction {
        if document.is_empty() {
            warn!("文档中没有可提取的文本或表格，可能是扫描件");
            return Extraction::empty("none");
        }

        let layout = self.registry.select(document, &self.context);
        info!("使用布局: {}", layout.name());

        let extraction = layout.extract(document, &self.context);
        let stats = &extraction.stats;
        info!(
            "提取完成: 车牌 {} 个, 记录 {} 条, 缺少价格 {} 个, 低于成本下限 {} 个, 重复 {} 个",
            stats.anchors,
            stats.accepted,
            stats.missing_price,
            stats.below_cost_floor,
            stats.duplicates
        );

        extraction
    }
}

use tracing::{debug, info, warn};

use crate::config::{AppConfig, ExtractionConfig, TableSchema, VocabularyConfig, WindowMode};

use super::anchor::{Anchor, AnchorLocator, AnchorPosition};
use super::assembler::{Extraction, RecordAssembler, RecordDraft};
use super::fields::{ColumnPriceRoles, FieldExtractor, ModelYears, PriceRoleClassifier, RankedPriceRoles};
use super::money::MoneyParser;
use super::vocabulary::{Category, Vocabulary};
use super::window::{EvidenceWindow, WindowBuilder};
use super::{RawDocument, Row};

/// 各布局共用的解析器与阈值
pub struct ExtractionContext {
    pub money: MoneyParser,
    pub anchors: AnchorLocator,
    pub windows: WindowBuilder,
    /// 兜底文本策略使用的不重叠窗口
    pub segments: WindowBuilder,
    pub fields: FieldExtractor,
    pub vocabulary: Vocabulary,
    min_cost: f64,
    dedupe: bool,
    fee_band: Option<(f64, f64)>,
    text_fallback_threshold: usize,
}

impl ExtractionContext {
    pub fn new(config: &ExtractionConfig, vocabulary: &VocabularyConfig) -> Self {
        Self {
            money: MoneyParser::new(config.noise_floor),
            anchors: AnchorLocator::new(),
            windows: WindowBuilder::new(config.window_mode, config.window_left, config.window_right),
            segments: WindowBuilder::new(WindowMode::Segment, config.window_left, config.window_right),
            fields: FieldExtractor::new(config),
            vocabulary: Vocabulary::new(vocabulary),
            min_cost: config.min_cost,
            dedupe: config.dedupe,
            fee_band: config.detect_fee.then_some((config.fee_min, config.fee_max)),
            text_fallback_threshold: config.text_fallback_threshold,
        }
    }

    fn assembler(&self, layout: &str) -> RecordAssembler {
        RecordAssembler::new(layout, self.min_cost, self.dedupe)
    }

    fn ranked_roles(&self) -> RankedPriceRoles {
        RankedPriceRoles::new(self.fee_band)
    }

    fn is_header_row(&self, row: &Row) -> bool {
        AnchorLocator::is_header_row(row, self.vocabulary.header_keywords())
    }

    /// 所有表格中跳过表头后的数据行及其行号
    fn data_rows<'a>(&'a self, document: &'a RawDocument) -> impl Iterator<Item = (usize, &'a Row)> + 'a {
        document
            .tables()
            .flat_map(|table| table.rows.iter().enumerate())
            .filter(move |(_, row)| !self.is_header_row(row))
    }

    /// 先在局部文本里分类，未命中再看整个窗口
    fn classify_with_fallback(
        &self,
        local: Option<&str>,
        whole: &str,
        classify: impl Fn(&Vocabulary, &str) -> Category,
    ) -> Category {
        match local.map(|text| classify(&self.vocabulary, text)) {
            Some(Category::Known(name)) => Category::Known(name),
            _ => classify(&self.vocabulary, whole),
        }
    }
}

fn slot_of(anchor: &Anchor) -> usize {
    match anchor.position {
        AnchorPosition::Row { slot, .. } => slot,
        AnchorPosition::Offset { .. } => 0,
    }
}

/// 一种文档版式：检测条件 + 提取实现
pub trait Layout: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, document: &RawDocument, ctx: &ExtractionContext) -> bool;
    fn extract(&self, document: &RawDocument, ctx: &ExtractionContext) -> Extraction;
    /// `extract` 会处理的车牌锚点
    fn anchors(&self, document: &RawDocument, ctx: &ExtractionContext) -> Vec<Anchor>;
}

/// 全文按车牌切窗口
pub struct TextLayout {
    segmented: bool,
}

impl TextLayout {
    /// 使用 `extraction.window_mode` 配置的窗口
    pub const CONFIGURED: Self = Self { segmented: false };
    /// 固定按车牌所在行分段
    pub const SEGMENTED: Self = Self { segmented: true };

    fn window_builder<'a>(&self, ctx: &'a ExtractionContext) -> &'a WindowBuilder {
        if self.segmented {
            &ctx.segments
        } else {
            &ctx.windows
        }
    }
}

impl Layout for TextLayout {
    fn name(&self) -> &str {
        "text"
    }

    fn detect(&self, document: &RawDocument, _ctx: &ExtractionContext) -> bool {
        document.pages.iter().any(|p| p.text.is_some())
    }

    fn anchors(&self, document: &RawDocument, ctx: &ExtractionContext) -> Vec<Anchor> {
        ctx.anchors.locate_in_text(&document.full_text())
    }

    fn extract(&self, document: &RawDocument, ctx: &ExtractionContext) -> Extraction {
        let full_text = document.full_text();
        let anchors = ctx.anchors.locate_in_text(&full_text);
        let windows = self.window_builder(ctx).text_windows(&full_text, &anchors);
        let roles = ctx.ranked_roles();
        let mut assembler = ctx.assembler(self.name());

        for (anchor, window) in anchors.iter().zip(windows) {
            assembler.anchor_found();
            let Some(price) = roles.classify(&window, &ctx.money) else {
                assembler.reject_missing_price(&anchor.plate);
                continue;
            };

            let text = window.text();
            assembler.push(RecordDraft {
                plate: anchor.plate.clone(),
                brand: ctx.vocabulary.classify_brand(&text),
                model: ctx.fields.model(&text, &ctx.money, &ctx.vocabulary),
                color: ctx.vocabulary.classify_color(&text),
                years: ctx.fields.years(&text),
                mileage: ctx.fields.mileage(&text, &ctx.money),
                store: None,
                price,
            });
        }

        assembler.finish()
    }
}

/// 不认识列结构的表格：整行作为证据
pub struct TableLayout;

impl Layout for TableLayout {
    fn name(&self) -> &str {
        "table"
    }

    fn detect(&self, document: &RawDocument, _ctx: &ExtractionContext) -> bool {
        document.tables().next().is_some()
    }

    fn anchors(&self, document: &RawDocument, ctx: &ExtractionContext) -> Vec<Anchor> {
        ctx.data_rows(document)
            .flat_map(|(row_index, row)| ctx.anchors.locate_in_row(row_index, row))
            .collect()
    }

    fn extract(&self, document: &RawDocument, ctx: &ExtractionContext) -> Extraction {
        let roles = ctx.ranked_roles();
        let mut assembler = ctx.assembler(self.name());

        for (row_index, row) in ctx.data_rows(document) {
            let anchors = ctx.anchors.locate_in_row(row_index, row);
            for anchor in &anchors {
                assembler.anchor_found();
                let window = WindowBuilder::row_window(row, slot_of(anchor), anchors.len());
                let Some(price) = roles.classify(&window, &ctx.money) else {
                    assembler.reject_missing_price(&anchor.plate);
                    continue;
                };

                let mileage = match &window {
                    EvidenceWindow::Cells(cells) => cells
                        .iter()
                        .filter(|cell| ctx.fields.year_cell(cell).is_none())
                        .map(|cell| ctx.fields.mileage_cell(cell))
                        .max()
                        .unwrap_or(0),
                    EvidenceWindow::Text(text) => ctx.fields.mileage(text, &ctx.money),
                };

                let text = window.text();
                assembler.push(RecordDraft {
                    plate: anchor.plate.clone(),
                    brand: ctx.vocabulary.classify_brand(&text),
                    model: ctx.fields.model(&text, &ctx.money, &ctx.vocabulary),
                    color: ctx.vocabulary.classify_color(&text),
                    years: ctx.fields.years(&text),
                    mileage,
                    store: None,
                    price,
                });
            }
        }

        assembler.finish()
    }
}

/// 声明式列映射的厂商表格
pub struct SchemaLayout {
    schema: TableSchema,
    roles: ColumnPriceRoles,
}

impl SchemaLayout {
    pub fn new(schema: TableSchema, fee_band: Option<(f64, f64)>) -> Self {
        let roles = ColumnPriceRoles::new(
            schema.columns.reference,
            schema.columns.cost,
            RankedPriceRoles::new(fee_band),
        );
        Self { schema, roles }
    }

    fn is_schema_header(&self, row: &Row) -> bool {
        let labels: Vec<String> = row
            .iter()
            .flatten()
            .map(|cell| cell.trim().to_uppercase())
            .collect();
        !self.schema.detect_keywords.is_empty()
            && self
                .schema
                .detect_keywords
                .iter()
                .all(|k| labels.iter().any(|label| label == &k.to_uppercase()))
    }

    /// 只看车牌列，跳过通用表头和本布局的表头
    fn plate_anchors(&self, row_index: usize, row: &Row, ctx: &ExtractionContext) -> Vec<Anchor> {
        if self.is_schema_header(row) {
            return Vec::new();
        }
        let plate_cell: Row = vec![row.get(self.schema.columns.plate).cloned().flatten()];
        ctx.anchors.locate_in_row(row_index, &plate_cell)
    }

    fn years_from_columns(&self, cells: &[String], text: &str, ctx: &ExtractionContext) -> ModelYears {
        let year_at = |index: Option<usize>| {
            index
                .and_then(|i| cells.get(i))
                .and_then(|cell| ctx.fields.year_cell(cell))
        };
        let columns = &self.schema.columns;
        match (year_at(columns.fabrication_year), year_at(columns.model_year)) {
            (Some(fab), Some(model)) => ModelYears {
                fabrication: Some(fab),
                model: Some(model),
            },
            (Some(year), None) | (None, Some(year)) => ModelYears::single(year),
            (None, None) => ctx.fields.years(text),
        }
    }
}

impl Layout for SchemaLayout {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn detect(&self, document: &RawDocument, _ctx: &ExtractionContext) -> bool {
        document
            .tables()
            .any(|table| table.rows.iter().any(|row| self.is_schema_header(row)))
    }

    fn anchors(&self, document: &RawDocument, ctx: &ExtractionContext) -> Vec<Anchor> {
        ctx.data_rows(document)
            .flat_map(|(row_index, row)| self.plate_anchors(row_index, row, ctx))
            .collect()
    }

    fn extract(&self, document: &RawDocument, ctx: &ExtractionContext) -> Extraction {
        let columns = &self.schema.columns;
        let mut assembler = ctx.assembler(self.name());

        for (row_index, row) in ctx.data_rows(document) {
            let anchors = self.plate_anchors(row_index, row, ctx);
            for anchor in &anchors {
                assembler.anchor_found();
                let window = WindowBuilder::row_window(row, slot_of(anchor), anchors.len());
                let Some(price) = self.roles.classify(&window, &ctx.money) else {
                    assembler.reject_missing_price(&anchor.plate);
                    continue;
                };

                let text = window.text();
                let cells: &[String] = match &window {
                    EvidenceWindow::Cells(cells) => cells.as_slice(),
                    EvidenceWindow::Text(_) => &[],
                };
                let cell = |index: Option<usize>| {
                    index
                        .and_then(|i| cells.get(i))
                        .map(|c| c.trim())
                        .filter(|c| !c.is_empty())
                };

                let model = cell(columns.model)
                    .map(|c| ctx.fields.model(c, &ctx.money, &ctx.vocabulary))
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| ctx.fields.model(&text, &ctx.money, &ctx.vocabulary));

                assembler.push(RecordDraft {
                    plate: anchor.plate.clone(),
                    brand: ctx.classify_with_fallback(cell(columns.model), &text, Vocabulary::classify_brand),
                    model,
                    color: ctx.classify_with_fallback(cell(columns.color), &text, Vocabulary::classify_color),
                    years: self.years_from_columns(cells, &text, ctx),
                    mileage: cell(columns.mileage).map_or(0, |c| ctx.fields.mileage_cell(c)),
                    store: cell(columns.store).map(str::to_string),
                    price,
                });
            }
        }

        assembler.finish()
    }
}

/// 兜底：先按表格提取，记录太少时改用按行分段的全文策略并取较多的一方
pub struct UniversalLayout;

impl Layout for UniversalLayout {
    fn name(&self) -> &str {
        "universal"
    }

    fn detect(&self, _document: &RawDocument, _ctx: &ExtractionContext) -> bool {
        true
    }

    fn anchors(&self, document: &RawDocument, ctx: &ExtractionContext) -> Vec<Anchor> {
        let tables = TableLayout.anchors(document, ctx);
        let text = TextLayout::SEGMENTED.anchors(document, ctx);
        if text.len() > tables.len() {
            text
        } else {
            tables
        }
    }

    fn extract(&self, document: &RawDocument, ctx: &ExtractionContext) -> Extraction {
        let tables = TableLayout.extract(document, ctx);
        if tables.records.len() >= ctx.text_fallback_threshold {
            return tables;
        }

        debug!("表格策略只得到 {} 条记录，尝试全文策略", tables.records.len());
        let text = TextLayout::SEGMENTED.extract(document, ctx);
        if text.records.len() > tables.records.len() {
            text
        } else {
            tables
        }
    }
}

static TEXT: TextLayout = TextLayout::CONFIGURED;
static TABLE: TableLayout = TableLayout;
static UNIVERSAL: UniversalLayout = UniversalLayout;

fn builtin(name: &str) -> Option<&'static dyn Layout> {
    match name {
        "text" => Some(&TEXT),
        "table" => Some(&TABLE),
        "universal" => Some(&UNIVERSAL),
        _ => None,
    }
}

/// 按优先级依次尝试的版式注册表，兜底为 `UniversalLayout`
pub struct LayoutRegistry {
    layouts: Vec<Box<dyn Layout>>,
    /// 指定后跳过检测
    forced: Option<String>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self {
            layouts: Vec::new(),
            forced: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let fee_band = config
            .extraction
            .detect_fee
            .then_some((config.extraction.fee_min, config.extraction.fee_max));

        let mut registry = Self::new();
        for schema in &config.layouts {
            registry.register(Box::new(SchemaLayout::new(schema.clone(), fee_band)));
        }
        info!("已注册 {} 个表格布局", registry.layouts.len());
        if let Some(name) = &config.extraction.layout {
            registry.force(name);
        }
        registry
    }

    pub fn force(&mut self, name: &str) {
        info!("指定布局: {}", name);
        self.forced = Some(name.to_string());
    }

    pub fn register(&mut self, layout: Box<dyn Layout>) {
        self.layouts.push(layout);
    }

    pub fn select(&self, document: &RawDocument, ctx: &ExtractionContext) -> &dyn Layout {
        if let Some(name) = self.forced.as_deref() {
            let forced = self
                .layouts
                .iter()
                .find(|layout| layout.name() == name)
                .map(|layout| layout.as_ref())
                .or_else(|| builtin(name));
            match forced {
                Some(layout) => return layout,
                None => warn!("未知的布局 '{}'，改为自动检测", name),
            }
        }

        self.layouts
            .iter()
            .find(|layout| layout.detect(document, ctx))
            .map(|layout| layout.as_ref())
            .unwrap_or(&UNIVERSAL)
    }
}

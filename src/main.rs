mod access;
mod config;
mod parser;
mod pricing;
mod report;
mod utils;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use access::AccessGate;
use config::{AppConfig, MarginKind, VocabularyConfig, SETTINGS_PATH};
use config::vocabulary::VOCABULARY_PATH;
use parser::{ExtractionPipeline, PdfParser, RawDocument};
use pricing::{FilterSet, Pricer, ProfitMode};
use report::{ExportFormat, Exporter};
use utils::{logger, FipeError};

#[derive(Parser)]
#[command(name = "fipehunter")]
#[command(about = "二手车批发价格表提取与利润计算工具", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成默认配置文件
    Init,
    /// 解析价格表，计算售价并导出
    Scan(ScanArgs),
    /// 查看文档结构和将使用的布局
    Inspect {
        /// PDF 或 RawDocument JSON
        file: PathBuf,
        /// 把提取出的原始文档写成 JSON
        #[arg(long)]
        dump: Option<PathBuf>,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// PDF 或 RawDocument JSON
    file: PathBuf,
    /// 固定加价金额 (R$)
    #[arg(long, conflicts_with = "margin_percent")]
    margin: Option<f64>,
    /// 按收购价百分比加价
    #[arg(long)]
    margin_percent: Option<f64>,
    #[arg(long, value_enum)]
    profit_mode: Option<ProfitMode>,
    #[arg(long)]
    brand: Vec<String>,
    /// 车型年份
    #[arg(long)]
    year: Vec<u16>,
    #[arg(long)]
    color: Vec<String>,
    /// 车型名称包含的文字
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    max_km: Option<u32>,
    /// 收购价上限
    #[arg(long)]
    max_invest: Option<f64>,
    /// 最低利润率 (%)
    #[arg(long)]
    min_margin: Option<f64>,
    /// 屏幕上展示的推荐数量
    #[arg(long)]
    top: Option<usize>,
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum)]
    format: Option<ExportFormat>,
    /// 跳过检测，直接使用指定布局 (text / table / universal / 表格布局名)
    #[arg(long)]
    layout: Option<String>,
    #[arg(long)]
    no_export: bool,
    #[arg(long)]
    password: Option<String>,
}

impl ScanArgs {
    fn filters(&self) -> FilterSet {
        FilterSet {
            brands: self.brand.clone(),
            years: self.year.clone(),
            colors: self.color.clone(),
            model_query: self.model.clone(),
            max_mileage: self.max_km,
            max_investment: self.max_invest,
            min_margin_pct: self.min_margin,
        }
    }

    /// 命令行参数覆盖本次运行的定价配置
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(amount) = self.margin {
            config.pricing.margin_kind = MarginKind::Fixed;
            config.pricing.margin_value = amount;
        }
        if let Some(pct) = self.margin_percent {
            config.pricing.margin_kind = MarginKind::Percent;
            config.pricing.margin_value = pct;
        }
        if let Some(mode) = self.profit_mode {
            config.pricing.profit_mode = mode;
        }
        if let Some(top) = self.top {
            config.pricing.top_n = top;
        }
        if let Some(format) = self.format {
            config.export.format = format;
        }
        if let Some(layout) = &self.layout {
            config.extraction.layout = Some(layout.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init_logger();
    info!("fipehunter 启动");

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Scan(args) => scan_command(args).await,
        Commands::Inspect {
            file,
            dump,
            password,
        } => inspect_command(file, dump, password).await,
    };

    if let Err(ref e) = result {
        for cause in e.chain().skip(1) {
            warn!("原因: {}", cause);
        }
    }
    result
}

async fn init_command() -> Result<()> {
    info!("初始化配置...");

    // 创建必要的目录
    tokio::fs::create_dir_all("config").await?;
    tokio::fs::create_dir_all("data/exports").await?;

    // 生成默认配置文件
    let app_config = AppConfig::default();
    app_config.save(SETTINGS_PATH)?;
    info!("已生成配置文件: {}", SETTINGS_PATH);

    let vocabulary = VocabularyConfig::default();
    let vocabulary_toml = toml::to_string_pretty(&vocabulary)?;
    tokio::fs::write(VOCABULARY_PATH, vocabulary_toml).await?;
    info!("已生成词表配置: {}", VOCABULARY_PATH);

    info!("✅ 初始化完成！");
    info!("下一步:");
    info!("  1. 编辑 {} 调整加价、利润模式和表格布局", SETTINGS_PATH);
    info!("  2. 编辑 {} 补充品牌和颜色", VOCABULARY_PATH);
    info!("  3. 运行 'fipehunter scan <PDF>' 生成报价单");

    Ok(())
}

/// PDF 在阻塞线程中解析，JSON 直接反序列化
async fn load_document(file: &Path) -> Result<RawDocument> {
    let extension = file
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let document = match extension.as_str() {
        "json" => RawDocument::load_json(file)?,
        "pdf" => {
            let path = file.to_path_buf();
            tokio::task::spawn_blocking(move || PdfParser::new().load(path)).await??
        }
        other => {
            return Err(FipeError::ParseError(format!(
                "不支持的文件类型 '{}': {}",
                other,
                file.display()
            ))
            .into())
        }
    };
    Ok(document)
}

fn check_access(config: &AppConfig, password: Option<&str>) -> Result<()> {
    let gate = AccessGate::new(&config.access);
    gate.verify(password)?;
    if gate.is_enabled() {
        info!("访问密码校验通过");
    }
    Ok(())
}

async fn scan_command(args: ScanArgs) -> Result<()> {
    let mut app_config = AppConfig::load()?;
    check_access(&app_config, args.password.as_deref())?;

    let vocabulary = VocabularyConfig::load()?;
    args.apply_overrides(&mut app_config);
    app_config.validate()?;

    info!("开始处理: {}", args.file.display());
    let document = load_document(&args.file).await?;

    let extraction_config = app_config.clone();
    let extraction = tokio::task::spawn_blocking(move || {
        ExtractionPipeline::new(&extraction_config, &vocabulary).process(&document)
    })
    .await?;

    if extraction.records.is_empty() {
        warn!("未检测到车辆，请检查PDF版式或是否为扫描件");
        return Ok(());
    }

    let filters = args.filters();
    if !filters.is_empty() {
        info!("应用筛选条件: {:?}", filters);
    }

    let pricer = Pricer::from_config(&app_config.pricing);
    let priced = pricer.apply(&extraction.records, &filters);
    info!(
        "候选 {} 条，筛选后 {} 条 (布局: {})",
        extraction.records.len(),
        priced.len(),
        extraction.layout
    );

    println!("{}", report::render(&priced, app_config.pricing.top_n));

    if priced.is_empty() {
        info!("筛选后没有车辆，跳过导出");
        return Ok(());
    }

    if args.no_export {
        return Ok(());
    }

    let exporter = Exporter::new(app_config.export.format);
    exporter
        .write(&priced, &app_config.export, args.output.as_deref())
        .await?;

    Ok(())
}

async fn inspect_command(file: PathBuf, dump: Option<PathBuf>, password: Option<String>) -> Result<()> {
    let app_config = AppConfig::load()?;
    check_access(&app_config, password.as_deref())?;
    let vocabulary = VocabularyConfig::load()?;

    let document = load_document(&file).await?;
    let pipeline = ExtractionPipeline::new(&app_config, &vocabulary);

    println!("文件: {}", file.display());
    for page in &document.pages {
        println!(
            "  第 {} 页: 文本 {} 字符, 表格 {} 个",
            page.number,
            page.text.as_deref().map_or(0, |t| t.chars().count()),
            page.tables.len()
        );
    }

    println!("布局: {}", pipeline.selected_layout(&document));
    println!("车牌: {} 个", pipeline.anchor_count(&document));

    if let Some(path) = dump {
        let json = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&path, json).await?;
        info!("✅ 已写出原始文档: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_flags_override_pricing() {
        let cli = Cli::parse_from([
            "fipehunter",
            "scan",
            "lista.pdf",
            "--margin-percent",
            "8",
            "--profit-mode",
            "opportunity",
            "--brand",
            "TOYOTA",
            "--brand",
            "FIAT",
            "--top",
            "5",
            "--layout",
            "text",
        ]);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };

        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.pricing.margin_kind, MarginKind::Percent);
        assert_eq!(config.pricing.margin_value, 8.0);
        assert_eq!(config.pricing.profit_mode, ProfitMode::Opportunity);
        assert_eq!(config.pricing.top_n, 5);
        assert_eq!(config.extraction.layout.as_deref(), Some("text"));
        assert_eq!(args.filters().brands, vec!["TOYOTA", "FIAT"]);
    }

    #[test]
    fn fixed_and_percent_margin_conflict() {
        let parsed = Cli::try_parse_from([
            "fipehunter",
            "scan",
            "lista.pdf",
            "--margin",
            "2000",
            "--margin-percent",
            "8",
        ]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let result = load_document(Path::new("lista.xlsx")).await;
        assert!(result.is_err());
    }
}

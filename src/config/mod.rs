pub mod vocabulary;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::{FipeError, FipeResult};

pub use vocabulary::VocabularyConfig;

use crate::pricing::ProfitMode;
use crate::report::ExportFormat;

pub const SETTINGS_PATH: &str = "config/settings.toml";

/// 内置布局名称，可在 `extraction.layout` 中指定
pub const BUILTIN_LAYOUTS: [&str; 3] = ["text", "table", "universal"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default = "default_layouts")]
    pub layouts: Vec<TableSchema>,
}

/// 文本窗口的切分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// 车牌前后各取固定字符数，窗口之间可能重叠
    Bidirectional,
    /// 车牌所在行到下一个车牌所在行为止，窗口互不重叠
    Segment,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub noise_floor: f64,
    pub min_cost: f64,
    pub window_mode: WindowMode,
    pub window_left: usize,
    pub window_right: usize,
    pub model_max_tokens: usize,
    pub mileage_min: u32,
    pub mileage_max: u32,
    pub year_min: u16,
    pub year_max: u16,
    pub dedupe: bool,
    pub detect_fee: bool,
    pub fee_min: f64,
    pub fee_max: f64,
    /// 表格策略少于该数量时改用文本策略
    pub text_fallback_threshold: usize,
    /// 指定布局名称（text、table、universal 或表格布局名），为空时自动检测
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginKind {
    Fixed,
    Percent,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingConfig {
    pub margin_kind: MarginKind,
    pub margin_value: f64,
    pub profit_mode: ProfitMode,
    pub band_min: f64,
    pub band_max: f64,
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: String,
    pub file_prefix: String,
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// 为空表示不启用密码
    pub password: String,
}

/// 厂商表格的列映射，下标从0开始
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnMap {
    pub plate: usize,
    pub store: Option<usize>,
    pub model: Option<usize>,
    pub fabrication_year: Option<usize>,
    pub model_year: Option<usize>,
    pub mileage: Option<usize>,
    pub color: Option<usize>,
    pub reference: Option<usize>,
    pub cost: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableSchema {
    pub name: String,
    /// 表头行同时包含这些关键字时启用该布局
    pub detect_keywords: Vec<String>,
    pub columns: ColumnMap,
}

impl AppConfig {
    pub fn load() -> FipeResult<Self> {
        Self::load_from(SETTINGS_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> FipeResult<Self> {
        let config_path = path.as_ref();

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 区间上下限颠倒或表格布局缺少车牌列名时拒绝加载
    pub fn validate(&self) -> FipeResult<()> {
        let extraction = &self.extraction;
        if extraction.mileage_min >= extraction.mileage_max {
            return Err(FipeError::ConfigError(format!(
                "mileage_min ({}) 必须小于 mileage_max ({})",
                extraction.mileage_min, extraction.mileage_max
            )));
        }
        if extraction.year_min > extraction.year_max {
            return Err(FipeError::ConfigError(format!(
                "year_min ({}) 不能大于 year_max ({})",
                extraction.year_min, extraction.year_max
            )));
        }
        if self.pricing.band_min >= self.pricing.band_max {
            return Err(FipeError::ConfigError(format!(
                "band_min ({}) 必须小于 band_max ({})",
                self.pricing.band_min, self.pricing.band_max
            )));
        }
        if let Some(forced) = extraction.layout.as_deref() {
            let known = BUILTIN_LAYOUTS.contains(&forced) || self.layouts.iter().any(|s| s.name == forced);
            if !known {
                return Err(FipeError::ConfigError(format!("未知的布局: {}", forced)));
            }
        }
        if let Some(schema) = self.layouts.iter().find(|s| s.name.trim().is_empty()) {
            return Err(FipeError::ConfigError(format!(
                "表格布局缺少名称: {:?}",
                schema.detect_keywords
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &str) -> FipeResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            pricing: PricingConfig::default(),
            export: ExportConfig::default(),
            access: AccessConfig::default(),
            layouts: default_layouts(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            noise_floor: 2000.0,
            min_cost: 10000.0,
            window_mode: WindowMode::Bidirectional,
            window_left: 250,
            window_right: 500,
            model_max_tokens: 6,
            mileage_min: 1000,
            mileage_max: 300_000,
            year_min: 2010,
            year_max: 2029,
            dedupe: true,
            detect_fee: false,
            fee_min: 2000.0,
            fee_max: 18000.0,
            text_fallback_threshold: 3,
            layout: None,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            margin_kind: MarginKind::Fixed,
            margin_value: 2000.0,
            profit_mode: ProfitMode::Simple,
            band_min: 1.0,
            band_max: 70.0,
            top_n: 3,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: "data/exports".to_string(),
            file_prefix: "Lista_FipeHunter".to_string(),
            format: ExportFormat::Csv,
        }
    }
}

fn default_layouts() -> Vec<TableSchema> {
    vec![TableSchema {
        name: "alphaville".to_string(),
        detect_keywords: vec!["LOJA".to_string(), "MODELO".to_string()],
        columns: ColumnMap {
            plate: 0,
            store: Some(1),
            model: Some(2),
            fabrication_year: Some(3),
            model_year: Some(4),
            mileage: Some(5),
            color: Some(6),
            reference: Some(7),
            cost: Some(9),
        },
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [pricing]
            margin_value = 3500.0
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing.margin_value, 3500.0);
        assert_eq!(config.pricing.margin_kind, MarginKind::Fixed);
        assert_eq!(config.extraction.window_left, 250);
        assert_eq!(config.layouts.len(), 1);
        assert_eq!(config.layouts[0].columns.cost, Some(9));
    }

    #[test]
    fn default_settings_survive_toml_round_trip() {
        let content = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.layouts, AppConfig::default().layouts);
        assert_eq!(parsed.extraction.window_mode, WindowMode::Bidirectional);
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.extraction.mileage_min = 400_000;
        assert!(matches!(config.validate(), Err(FipeError::ConfigError(_))));

        let mut config = AppConfig::default();
        config.pricing.band_min = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn forced_layout_must_exist() {
        let mut config = AppConfig::default();
        config.extraction.layout = Some("text".to_string());
        assert!(config.validate().is_ok());
        config.extraction.layout = Some("alphaville".to_string());
        assert!(config.validate().is_ok());
        config.extraction.layout = Some("localiza".to_string());
        assert!(matches!(config.validate(), Err(FipeError::ConfigError(_))));
    }

    #[test]
    fn missing_settings_file_gives_defaults() {
        let config = AppConfig::load_from("config/does-not-exist.toml").unwrap();
        assert_eq!(config.pricing.top_n, 3);
    }
}

pub mod filter;

pub use filter::FilterSet;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::config::{MarginKind, PricingConfig};
use crate::parser::CandidateRecord;

/// 在收购价上加的利润
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MarginMode {
    /// 固定金额
    Fixed(f64),
    /// 百分比，10.0 表示 10%
    Percent(f64),
}

impl MarginMode {
    pub fn sale_price(&self, cost: f64) -> f64 {
        match self {
            Self::Fixed(amount) => cost + amount,
            Self::Percent(pct) => cost * (1.0 + pct / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfitMode {
    /// 利润 = 售价 - 收购价
    Simple,
    /// 利润 = 参考价 - 收购价，按接近 Fipe 转手计算
    Opportunity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedRecord {
    #[serde(flatten)]
    pub record: CandidateRecord,
    pub sale_price: f64,
    pub profit: f64,
    pub margin_pct: f64,
}

pub struct Pricer {
    margin: MarginMode,
    profit_mode: ProfitMode,
    band: (f64, f64),
}

impl Pricer {
    pub fn new(margin: MarginMode, profit_mode: ProfitMode, band: (f64, f64)) -> Self {
        Self {
            margin,
            profit_mode,
            band,
        }
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        let margin = match config.margin_kind {
            MarginKind::Fixed => MarginMode::Fixed(config.margin_value),
            MarginKind::Percent => MarginMode::Percent(config.margin_value),
        };
        Self::new(margin, config.profit_mode, (config.band_min, config.band_max))
    }

    pub fn price(&self, record: &CandidateRecord) -> PricedRecord {
        let sale_price = self.margin.sale_price(record.cost_price);
        let profit = match self.profit_mode {
            ProfitMode::Simple => sale_price - record.cost_price,
            ProfitMode::Opportunity => {
                record.reference_price - record.cost_price - record.fee.unwrap_or(0.0)
            }
        };
        let margin_pct = if record.reference_price > 0.0 {
            profit / record.reference_price * 100.0
        } else {
            0.0
        };

        PricedRecord {
            record: record.clone(),
            sale_price,
            profit,
            margin_pct,
        }
    }

    /// 机会模式下超出合理利润率区间的多半是提取噪声
    fn within_band(&self, priced: &PricedRecord) -> bool {
        match self.profit_mode {
            ProfitMode::Simple => true,
            ProfitMode::Opportunity => priced.margin_pct > self.band.0 && priced.margin_pct < self.band.1,
        }
    }

    /// 定价、过滤并排序：简单模式按售价升序，机会模式按利润降序
    pub fn apply(&self, records: &[CandidateRecord], filters: &FilterSet) -> Vec<PricedRecord> {
        let mut priced: Vec<PricedRecord> = records
            .iter()
            .map(|record| self.price(record))
            .filter(|priced| {
                let keep = self.within_band(priced);
                if !keep {
                    debug!("车牌 {} 利润率 {:.1}% 超出区间", priced.record.plate, priced.margin_pct);
                }
                keep
            })
            .filter(|priced| filters.matches(priced))
            .collect();

        match self.profit_mode {
            ProfitMode::Simple => priced.sort_by(|a, b| {
                a.sale_price.partial_cmp(&b.sale_price).unwrap_or(Ordering::Equal)
            }),
            ProfitMode::Opportunity => {
                priced.sort_by(|a, b| b.profit.partial_cmp(&a.profit).unwrap_or(Ordering::Equal))
            }
        }
        priced
    }
}

pub mod export;

pub use export::Exporter;

use serde::{Deserialize, Serialize};

use crate::pricing::PricedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xlsx => "xlsx",
        }
    }
}

/// 巴西货币格式: R$ 98.000,00
pub fn format_brl(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let integer = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::new();
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{:02}", if negative { "-" } else { "" }, grouped, fraction)
}

fn format_km(mileage: u32) -> String {
    if mileage == 0 {
        return "N/D".to_string();
    }
    let digits = mileage.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{} km", grouped)
}

/// 屏幕顶部的汇总指标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub vehicles: usize,
    pub total_purchase: f64,
    pub estimated_profit: f64,
}

impl Summary {
    pub fn from_records(records: &[PricedRecord]) -> Self {
        Self {
            vehicles: records.len(),
            total_purchase: records.iter().map(|r| r.record.cost_price).sum(),
            estimated_profit: records.iter().map(|r| r.profit).sum(),
        }
    }
}

/// 生成控制台报告：汇总、前 N 名卡片和完整排行表
pub fn render(records: &[PricedRecord], top_n: usize) -> String {
    let summary = Summary::from_records(records);
    let mut out = String::new();

    out.push_str(&format!(
        "Veículos: {}  |  Total Compra: {}  |  Lucro Estimado: {}\n\n",
        summary.vehicles,
        format_brl(summary.total_purchase),
        format_brl(summary.estimated_profit)
    ));

    if top_n > 0 && !records.is_empty() {
        out.push_str(&format!("TOP {}\n", top_n.min(records.len())));
        for (rank, priced) in records.iter().take(top_n).enumerate() {
            out.push_str(&render_card(rank + 1, priced));
        }
        out.push('\n');
    }

    out.push_str(&render_table(records));
    out
}

fn render_card(rank: usize, priced: &PricedRecord) -> String {
    let record = &priced.record;
    format!(
        "#{} {} {} [{}]\n   {} | {} | {}\n   Fipe {}  Custo {}  Venda {}  Lucro {} ({:.1}%)\n",
        rank,
        record.brand,
        record.model,
        record.plate,
        record.years,
        format_km(record.mileage),
        record.color,
        format_brl(record.reference_price),
        format_brl(record.cost_price),
        format_brl(priced.sale_price),
        format_brl(priced.profit),
        priced.margin_pct
    )
}

fn render_table(records: &[PricedRecord]) -> String {
    let mut out = format!(
        "{:<8} {:<14} {:<32} {:<10} {:<10} {:>11} {:>15} {:>15} {:>15} {:>8}\n",
        "PLACA", "MARCA", "MODELO", "ANO", "COR", "KM", "FIPE", "CUSTO", "VENDA", "MARGEM"
    );
    out.push_str(&"-".repeat(146));
    out.push('\n');

    for priced in records {
        let record = &priced.record;
        let model: String = record.model.chars().take(32).collect();
        out.push_str(&format!(
            "{:<8} {:<14} {:<32} {:<10} {:<10} {:>11} {:>15} {:>15} {:>15} {:>7.1}%\n",
            record.plate,
            record.brand.as_str(),
            model,
            record.years.to_string(),
            record.color.as_str(),
            format_km(record.mileage),
            format_brl(record.reference_price),
            format_brl(record.cost_price),
            format_brl(priced.sale_price),
            priced.margin_pct
        ));
    }
    out
}

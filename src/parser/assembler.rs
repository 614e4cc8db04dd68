use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::fields::{ModelYears, PricePair};
use super::vocabulary::Category;
use super::CandidateRecord;

/// 单次提取的计数，被丢弃的锚点不单独报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub anchors: usize,
    pub accepted: usize,
    pub missing_price: usize,
    pub below_cost_floor: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub layout: String,
    pub records: Vec<CandidateRecord>,
    pub stats: ExtractionStats,
}

impl Extraction {
    pub fn empty(layout: &str) -> Self {
        Self {
            layout: layout.to_string(),
            records: Vec::new(),
            stats: ExtractionStats::default(),
        }
    }
}

/// 锚点字段提取后的中间结果
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub plate: String,
    pub brand: Category,
    pub model: String,
    pub color: Category,
    pub years: ModelYears,
    pub mileage: u32,
    pub store: Option<String>,
    pub price: PricePair,
}

pub struct RecordAssembler {
    layout: String,
    min_cost: f64,
    dedupe: bool,
    seen: HashSet<String>,
    records: Vec<CandidateRecord>,
    stats: ExtractionStats,
}

impl RecordAssembler {
    pub fn new(layout: &str, min_cost: f64, dedupe: bool) -> Self {
        Self {
            layout: layout.to_string(),
            min_cost,
            dedupe,
            seen: HashSet::new(),
            records: Vec::new(),
            stats: ExtractionStats::default(),
        }
    }

    pub fn anchor_found(&mut self) {
        self.stats.anchors += 1;
    }

    /// 窗口里不足两个合格金额，静默丢弃
    pub fn reject_missing_price(&mut self, plate: &str) {
        debug!("车牌 {} 附近没有足够的价格", plate);
        self.stats.missing_price += 1;
    }

    pub fn push(&mut self, draft: RecordDraft) -> bool {
        if draft.price.cost < self.min_cost {
            debug!("车牌 {} 成本 {} 低于下限", draft.plate, draft.price.cost);
            self.stats.below_cost_floor += 1;
            return false;
        }

        // first occurrence wins
        if self.dedupe && !self.seen.insert(draft.plate.clone()) {
            debug!("重复车牌 {}", draft.plate);
            self.stats.duplicates += 1;
            return false;
        }

        self.records.push(CandidateRecord {
            plate: draft.plate,
            brand: draft.brand,
            model: draft.model,
            color: draft.color,
            years: draft.years,
            mileage: draft.mileage,
            reference_price: draft.price.reference,
            cost_price: draft.price.cost,
            fee: draft.price.fee,
            store: draft.store,
            layout: self.layout.clone(),
        });
        self.stats.accepted += 1;
        true
    }

    pub fn finish(self) -> Extraction {
        Extraction {
            layout: self.layout,
            records: self.records,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(plate: &str, reference: f64, cost: f64) -> RecordDraft {
        RecordDraft {
            plate: plate.to_string(),
            brand: Category::Unclassified,
            model: "ONIX LT".to_string(),
            color: Category::Unclassified,
            years: ModelYears::default(),
            mileage: 0,
            store: None,
            price: PricePair {
                reference,
                cost,
                fee: None,
            },
        }
    }

    #[test]
    fn first_occurrence_of_a_plate_wins() {
        let mut assembler = RecordAssembler::new("text", 10000.0, true);
        assert!(assembler.push(draft("ABC1D23", 95000.0, 80000.0)));
        assert!(!assembler.push(draft("ABC1D23", 60000.0, 50000.0)));

        let extraction = assembler.finish();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].reference_price, 95000.0);
        assert_eq!(extraction.stats.duplicates, 1);
    }

    #[test]
    fn duplicates_kept_when_dedupe_disabled() {
        let mut assembler = RecordAssembler::new("text", 10000.0, false);
        assembler.push(draft("ABC1D23", 95000.0, 80000.0));
        assembler.push(draft("ABC1D23", 60000.0, 50000.0));
        assert_eq!(assembler.finish().records.len(), 2);
    }

    #[test]
    fn cost_below_floor_is_rejected() {
        let mut assembler = RecordAssembler::new("text", 10000.0, true);
        assert!(!assembler.push(draft("ABC1D23", 12000.0, 8000.0)));

        let extraction = assembler.finish();
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.stats.below_cost_floor, 1);
    }
}

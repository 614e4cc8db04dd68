use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ExtractionConfig;

use super::anchor::PLATE_PATTERN;
use super::money::MoneyParser;
use super::vocabulary::{normalize_token, Vocabulary};
use super::window::EvidenceWindow;

/// 参考价（Fipe）与收购价（repasse）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePair {
    pub reference: f64,
    pub cost: f64,
    /// 第三个落在税费区间的金额
    pub fee: Option<f64>,
}

/// 决定窗口里哪个金额是参考价、哪个是收购价
pub trait PriceRoleClassifier: Send + Sync {
    fn classify(&self, window: &EvidenceWindow, money: &MoneyParser) -> Option<PricePair>;
}

/// 去重后降序排列
pub fn rank_prices(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| b.total_cmp(a));
    values.dedup_by(|a, b| (*a - *b).abs() < 0.005);
    values
}

/// 最大值为参考价，第二大为收购价
pub struct RankedPriceRoles {
    fee_band: Option<(f64, f64)>,
}

impl RankedPriceRoles {
    pub fn new(fee_band: Option<(f64, f64)>) -> Self {
        Self { fee_band }
    }

    pub fn pair_from_values(&self, values: Vec<f64>) -> Option<PricePair> {
        let ranked = rank_prices(values);
        if ranked.len() < 2 {
            return None;
        }

        let (reference, cost) = (ranked[0], ranked[1]);
        let fee = self.fee_among(reference, cost, &ranked[2..]);

        Some(PricePair { reference, cost, fee })
    }

    /// 其余金额中第一个落在税费区间、且不等于差价的值
    pub fn fee_among(&self, reference: f64, cost: f64, rest: &[f64]) -> Option<f64> {
        let spread = reference - cost;
        self.fee_band.and_then(|(min, max)| {
            rest.iter()
                .copied()
                .find(|v| *v >= min && *v <= max && (*v - spread).abs() >= 1.0)
        })
    }
}

impl PriceRoleClassifier for RankedPriceRoles {
    fn classify(&self, window: &EvidenceWindow, money: &MoneyParser) -> Option<PricePair> {
        let values = match window {
            EvidenceWindow::Text(text) => money.qualifying_in_text(text),
            EvidenceWindow::Cells(cells) => cells
                .iter()
                .filter_map(|cell| money.qualifying_cell(cell))
                .collect(),
        };
        self.pair_from_values(values)
    }
}

/// 按声明的列读取价格，任一列缺失时退回排序策略
pub struct ColumnPriceRoles {
    reference: Option<usize>,
    cost: Option<usize>,
    fallback: RankedPriceRoles,
}

impl ColumnPriceRoles {
    pub fn new(reference: Option<usize>, cost: Option<usize>, fallback: RankedPriceRoles) -> Self {
        Self {
            reference,
            cost,
            fallback,
        }
    }
}

impl PriceRoleClassifier for ColumnPriceRoles {
    fn classify(&self, window: &EvidenceWindow, money: &MoneyParser) -> Option<PricePair> {
        if let EvidenceWindow::Cells(cells) = window {
            let read = |index: Option<usize>| {
                index
                    .and_then(|i| cells.get(i))
                    .and_then(|cell| money.qualifying(cell))
            };
            if let (Some(reference), Some(cost)) = (read(self.reference), read(self.cost)) {
                let rest: Vec<f64> = cells
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| Some(*i) != self.reference && Some(*i) != self.cost)
                    .filter_map(|(_, cell)| money.qualifying_cell(cell))
                    .collect();
                return Some(PricePair {
                    reference,
                    cost,
                    fee: self.fallback.fee_among(reference, cost, &rank_prices(rest)),
                });
            }
        }
        self.fallback.classify(window, money)
    }
}

/// 出厂年份/车型年份，未识别时为 None
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelYears {
    pub fabrication: Option<u16>,
    pub model: Option<u16>,
}

impl ModelYears {
    pub fn single(year: u16) -> Self {
        Self {
            fabrication: Some(year),
            model: Some(year),
        }
    }
}

impl fmt::Display for ModelYears {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.fabrication, self.model) {
            (Some(fab), Some(model)) => write!(f, "{}/{}", fab, model),
            (Some(year), None) | (None, Some(year)) => write!(f, "{}", year),
            (None, None) => f.write_str("N/D"),
        }
    }
}

pub struct FieldExtractor {
    plate_re: Regex,
    km_prefix_re: Regex,
    km_suffix_re: Regex,
    loose_km_re: Regex,
    grouped_number_re: Regex,
    short_year_re: Regex,
    year_re: Regex,
    mileage_min: u32,
    mileage_max: u32,
    year_min: u16,
    year_max: u16,
    model_max_tokens: usize,
}

impl FieldExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            plate_re: Regex::new(PLATE_PATTERN).unwrap(),
            km_prefix_re: Regex::new(r"(?i)\bKM\s*:?\s*(\d{1,3}(?:\.\d{3})+|\d{4,6})\b").unwrap(),
            km_suffix_re: Regex::new(r"(?i)\b(\d{1,3}(?:\.\d{3})+|\d{4,6})\s*KM\b").unwrap(),
            loose_km_re: Regex::new(r"\b\d{1,3}\.?\d{3}\b").unwrap(),
            grouped_number_re: Regex::new(r"^\d{1,3}(?:\.\d{3})+$").unwrap(),
            short_year_re: Regex::new(r"\b(\d{2})/(\d{2})\b").unwrap(),
            year_re: Regex::new(r"\b(\d{4})\b").unwrap(),
            mileage_min: config.mileage_min,
            mileage_max: config.mileage_max,
            year_min: config.year_min,
            year_max: config.year_max,
            model_max_tokens: config.model_max_tokens,
        }
    }

    fn mileage_in_range(&self, value: u32) -> bool {
        value > self.mileage_min && value < self.mileage_max
    }

    fn year_in_range(&self, year: u16) -> bool {
        year >= self.year_min && year <= self.year_max
    }

    fn digits_value(token: &str) -> Option<u32> {
        token.replace('.', "").parse().ok()
    }

    /// 不带千分位的四位数落在年份区间时按年份处理
    fn is_bare_year(&self, token: &str, value: u32) -> bool {
        !token.contains('.') && token.len() == 4 && self.year_in_range(value as u16)
    }

    fn km_candidate(&self, token: &str) -> Option<u32> {
        Self::digits_value(token)
            .filter(|value| !self.is_bare_year(token, *value) && self.mileage_in_range(*value))
    }

    /// 依次尝试 `KM 45.000`、`45.000 KM`、任意千分位数字；找不到为 0
    pub fn mileage(&self, text: &str, money: &MoneyParser) -> u32 {
        let text = money.strip_tokens(text);

        for labelled in [&self.km_prefix_re, &self.km_suffix_re] {
            let found = labelled
                .captures_iter(&text)
                .find_map(|caps| self.km_candidate(&caps[1]));
            if let Some(value) = found {
                return value;
            }
        }

        self.loose_km_re
            .find_iter(&text)
            .find_map(|m| self.km_candidate(m.as_str()))
            .unwrap_or(0)
    }

    /// 表格里的里程单元格：带 R$ 或逗号的是金额，不是里程
    pub fn mileage_cell(&self, cell: &str) -> u32 {
        if MoneyParser::looks_like_money(cell) {
            return 0;
        }
        let digits: String = cell.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(value) if self.mileage_in_range(value) => value,
            _ => 0,
        }
    }

    pub fn years(&self, text: &str) -> ModelYears {
        for caps in self.short_year_re.captures_iter(text) {
            let fab = caps[1].parse::<u16>().map(|y| y + 2000);
            let model = caps[2].parse::<u16>().map(|y| y + 2000);
            if let (Ok(fab), Ok(model)) = (fab, model) {
                if self.year_in_range(fab) && self.year_in_range(model) && model >= fab {
                    return ModelYears {
                        fabrication: Some(fab),
                        model: Some(model),
                    };
                }
            }
        }

        let mut found: Vec<u16> = Vec::new();
        for caps in self.year_re.captures_iter(text) {
            if let Ok(year) = caps[1].parse::<u16>() {
                if self.year_in_range(year) && !found.contains(&year) {
                    found.push(year);
                }
            }
            if found.len() == 2 {
                break;
            }
        }

        match found.as_slice() {
            [a, b, ..] => ModelYears {
                fabrication: Some(*a.min(b)),
                model: Some(*a.max(b)),
            },
            [year] => ModelYears::single(*year),
            [] => ModelYears::default(),
        }
    }

    /// 单个年份单元格，接受四位或两位年份
    pub fn year_cell(&self, cell: &str) -> Option<u16> {
        let digits: String = cell.chars().filter(|c| c.is_ascii_digit()).collect();
        let year = match digits.len() {
            2 => digits.parse::<u16>().ok()? + 2000,
            4 => digits.parse::<u16>().ok()?,
            _ => return None,
        };
        self.year_in_range(year).then_some(year)
    }

    /// 去掉车牌、金额、年份与停用词后剩下的前几个词
    pub fn model(&self, text: &str, money: &MoneyParser, vocabulary: &Vocabulary) -> String {
        let text = text.replace(['\n', '"', '\''], " ");
        let text = self.plate_re.replace_all(&text, " ");
        let text = money.strip_tokens(&text);
        let text = self.year_re.replace_all(&text, |caps: &regex::Captures| {
            match caps[1].parse::<u16>() {
                Ok(year) if self.year_in_range(year) => " ".to_string(),
                _ => caps[0].to_string(),
            }
        });

        text.split_whitespace()
            .map(normalize_token)
            .filter(|token| {
                token.chars().count() >= 3
                    && !token.chars().all(|c| c.is_ascii_digit())
                    && !self.grouped_number_re.is_match(token)
                    && !vocabulary.is_stopword(token)
                    && !vocabulary.is_brand_word(token)
                    && !vocabulary.is_color_word(token)
            })
            .take(self.model_max_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabularyConfig;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(&ExtractionConfig::default())
    }

    fn money() -> MoneyParser {
        MoneyParser::new(2000.0)
    }

    #[test]
    fn highest_two_prices_become_reference_and_cost() {
        let window = EvidenceWindow::Text(
            "ABC1D23 COROLLA R$ 80.000,00 FIPE R$ 95.000,00 R$ 80.000,00".to_string(),
        );
        let pair = RankedPriceRoles::new(None).classify(&window, &money()).unwrap();

        assert_eq!(pair.reference, 95000.0);
        assert_eq!(pair.cost, 80000.0);
        assert_eq!(pair.fee, None);
    }

    #[test]
    fn single_qualifying_price_is_not_a_pair() {
        let window = EvidenceWindow::Text("ABC1D23 R$ 95.000,00 R$ 1.500,00".to_string());
        assert!(RankedPriceRoles::new(None).classify(&window, &money()).is_none());
    }

    #[test]
    fn fee_is_a_third_value_that_is_not_the_spread() {
        let roles = RankedPriceRoles::new(Some((2000.0, 18000.0)));

        let pair = roles.pair_from_values(vec![95000.0, 80000.0, 15000.0, 4500.0]).unwrap();
        assert_eq!(pair.fee, Some(4500.0));

        let pair = roles.pair_from_values(vec![95000.0, 80000.0, 15000.0]).unwrap();
        assert_eq!(pair.fee, None);
    }

    #[test]
    fn column_roles_read_declared_cells() {
        let cells: Vec<String> = ["ABC1D23", "R$ 10.000,00", "R$ 98.000,00", "", "R$ 82.000,00"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let roles = ColumnPriceRoles::new(Some(2), Some(4), RankedPriceRoles::new(None));
        let pair = roles.classify(&EvidenceWindow::Cells(cells), &money()).unwrap();

        assert_eq!((pair.reference, pair.cost), (98000.0, 82000.0));
        assert_eq!(pair.fee, None);
    }

    #[test]
    fn column_roles_pick_fee_from_remaining_cells() {
        let cells: Vec<String> = ["ABC1D23", "R$ 98.000,00", "R$ 4.500,00", "R$ 82.000,00", "45.000"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let roles = ColumnPriceRoles::new(Some(1), Some(3), RankedPriceRoles::new(Some((2000.0, 18000.0))));
        let pair = roles.classify(&EvidenceWindow::Cells(cells), &money()).unwrap();

        assert_eq!((pair.reference, pair.cost), (98000.0, 82000.0));
        assert_eq!(pair.fee, Some(4500.0));
    }

    #[test]
    fn mileage_prefers_labelled_values() {
        let fx = extractor();
        assert_eq!(fx.mileage("ONIX KM: 45.000 IPVA 2.500 2023", &money()), 45000);
        assert_eq!(fx.mileage("ONIX 2022 33.120 R$ 70.309,00", &money()), 33120);
    }

    #[test]
    fn year_before_km_label_is_not_mileage() {
        let fx = extractor();
        assert_eq!(
            fx.mileage("ONIX LT ABC1D23 2022 KM 33.000 R$ 70.000,00 R$ 61.000,00", &money()),
            33000
        );
        assert_eq!(fx.mileage("HB20 2021 KM: 58.400", &money()), 58400);
        assert_eq!(fx.mileage("ARGO 45.000 KM 2023", &money()), 45000);
        assert_eq!(fx.mileage("MOBI 2021 KM", &money()), 0);
    }

    #[test]
    fn mileage_out_of_range_is_unknown() {
        let fx = extractor();
        assert_eq!(fx.mileage("ABC1D23 450000", &money()), 0);
        assert_eq!(fx.mileage_cell("450000"), 0);
        assert_eq!(fx.mileage_cell("45.000"), 45000);
        assert_eq!(fx.mileage_cell("R$ 45.000,00"), 0);
        assert_eq!(fx.mileage_cell("abc"), 0);
    }

    #[test]
    fn years_from_short_pair_or_four_digits() {
        let fx = extractor();
        assert_eq!(fx.years("HB20 22/23 FLEX").to_string(), "2022/2023");
        assert_eq!(fx.years("COROLLA 2023 2022").to_string(), "2022/2023");
        assert_eq!(fx.years("ONIX 2021").to_string(), "2021/2021");
        assert_eq!(fx.years("GOL 1998").to_string(), "N/D");
        assert_eq!(fx.year_cell("23"), Some(2023));
        assert_eq!(fx.year_cell("1999"), None);
    }

    #[test]
    fn model_drops_noise_tokens() {
        let fx = extractor();
        let vocab = Vocabulary::new(&VocabularyConfig::default());
        let model = fx.model(
            "ABC1D23 TOYOTA COROLLA XEI 2.0 FLEX 2023 PRETO 45.000 BARUERI SP R$ 98.000,00 123",
            &money(),
            &vocab,
        );
        assert_eq!(model, "COROLLA XEI 2.0");
    }
}

use super::PricedRecord;

/// 用户筛选条件，互相独立取交集；未填写的条件不过滤任何记录
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub brands: Vec<String>,
    /// 车型年份
    pub years: Vec<u16>,
    pub colors: Vec<String>,
    pub model_query: Option<String>,
    pub max_mileage: Option<u32>,
    pub max_investment: Option<f64>,
    pub min_margin_pct: Option<f64>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
            && self.years.is_empty()
            && self.colors.is_empty()
            && self.model_query.as_deref().map_or(true, |q| q.trim().is_empty())
            && self.max_mileage.is_none()
            && self.max_investment.is_none()
            && self.min_margin_pct.is_none()
    }

    pub fn matches(&self, priced: &PricedRecord) -> bool {
        let record = &priced.record;

        let brand_ok = self.brands.is_empty() || self.brands.iter().any(|b| record.brand.matches(b));
        let year_ok = self.years.is_empty()
            || record.years.model.map_or(false, |year| self.years.contains(&year));
        let color_ok = self.colors.is_empty() || self.colors.iter().any(|c| record.color.matches(c));
        let model_ok = match self.model_query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                record.model.to_uppercase().contains(&query.to_uppercase())
            }
            _ => true,
        };
        let mileage_ok = self.max_mileage.map_or(true, |max| record.mileage <= max);
        let investment_ok = self.max_investment.map_or(true, |max| record.cost_price <= max);
        let margin_ok = self.min_margin_pct.map_or(true, |min| priced.margin_pct >= min);

        brand_ok && year_ok && color_ok && model_ok && mileage_ok && investment_ok && margin_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tests::record;
    use crate::pricing::{MarginMode, Pricer, ProfitMode};

    fn priced() -> Vec<PricedRecord> {
        let pricer = Pricer::new(MarginMode::Fixed(2000.0), ProfitMode::Opportunity, (1.0, 70.0));
        vec![
            pricer.price(&record("AAA1A11", "TOYOTA", 100000.0, 80000.0)),
            pricer.price(&record("BBB2B22", "FIAT", 60000.0, 57000.0)),
            pricer.price(&record("CCC3C33", "OTHER", 40000.0, 30000.0)),
        ]
    }

    fn kept(filters: &FilterSet) -> Vec<PricedRecord> {
        priced().into_iter().filter(|r| filters.matches(r)).collect()
    }

    #[test]
    fn empty_filter_passes_everything() {
        let filters = FilterSet::default();
        assert!(filters.is_empty());
        assert_eq!(kept(&filters), priced());
    }

    #[test]
    fn brand_filter_keeps_only_that_brand() {
        let filters = FilterSet {
            brands: vec!["toyota".to_string()],
            ..FilterSet::default()
        };
        let kept = kept(&filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.plate, "AAA1A11");
    }

    #[test]
    fn predicates_combine_conjunctively() {
        let filters = FilterSet {
            model_query: Some("corolla".to_string()),
            max_investment: Some(70000.0),
            min_margin_pct: Some(10.0),
            ..FilterSet::default()
        };
        let kept = kept(&filters);
        let plates: Vec<&str> = kept.iter().map(|p| p.record.plate.as_str()).collect();
        assert_eq!(plates, vec!["CCC3C33"]);
    }

    #[test]
    fn year_and_mileage_filters() {
        let filters = FilterSet {
            years: vec![2022],
            ..FilterSet::default()
        };
        assert!(kept(&filters).is_empty());

        let filters = FilterSet {
            years: vec![2023],
            max_mileage: Some(50000),
            ..FilterSet::default()
        };
        assert_eq!(kept(&filters).len(), 3);
    }
}

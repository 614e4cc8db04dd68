use regex::Regex;

/// 巴西格式金额解析：有逗号时逗号为小数点、点为千分位；否则点全部视为千分位
pub fn parse_money(token: &str) -> Option<f64> {
    let clean: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if !clean.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = if clean.contains(',') {
        clean.replace('.', "").replace(',', ".")
    } else {
        clean.replace('.', "")
    };

    normalized.parse::<f64>().ok()
}

pub struct MoneyParser {
    noise_floor: f64,
    token_re: Regex,
}

impl MoneyParser {
    pub fn new(noise_floor: f64) -> Self {
        Self {
            noise_floor,
            // R$-prefixed amounts, or bare amounts with a two-digit decimal part
            token_re: Regex::new(r"R\$\s?[\d.,]*\d|\b\d{1,3}(?:\.\d{3})+,\d{2}\b|\b\d{4,6},\d{2}\b")
                .unwrap(),
        }
    }

    /// 低于噪声阈值的金额不可能是车价
    pub fn qualifying(&self, token: &str) -> Option<f64> {
        parse_money(token).filter(|value| *value >= self.noise_floor)
    }

    /// 表格单元格只有带 R$ 或逗号时才当作金额，纯数字点分组留给里程
    pub fn looks_like_money(cell: &str) -> bool {
        cell.contains("R$") || cell.contains(',')
    }

    pub fn qualifying_cell(&self, cell: &str) -> Option<f64> {
        if !Self::looks_like_money(cell) {
            return None;
        }
        self.qualifying(cell)
    }

    /// 文本中所有像金额的片段（字节区间）
    pub fn find_tokens<'t>(&self, text: &'t str) -> Vec<regex::Match<'t>> {
        self.token_re.find_iter(text).collect()
    }

    pub fn qualifying_in_text(&self, text: &str) -> Vec<f64> {
        self.find_tokens(text)
            .into_iter()
            .filter_map(|m| self.qualifying(m.as_str()))
            .collect()
    }

    pub fn strip_tokens(&self, text: &str) -> String {
        self.token_re.replace_all(text, " ").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_is_the_decimal_separator() {
        assert_eq!(parse_money("R$ 70.309,00"), Some(70309.0));
        assert_eq!(parse_money("123456,78"), Some(123456.78));
    }

    #[test]
    fn dots_without_comma_are_thousands() {
        assert_eq!(parse_money("131.638"), Some(131638.0));
        assert_eq!(parse_money("1.234.567"), Some(1234567.0));
    }

    #[test]
    fn empty_or_garbage_has_no_value() {
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("R$"), None);
        assert_eq!(parse_money("1,2,3"), None);
    }

    #[test]
    fn noise_floor_discards_small_amounts() {
        let parser = MoneyParser::new(2000.0);
        assert_eq!(parser.qualifying("1.500"), None);
        assert_eq!(parser.qualifying("R$ 2.000,00"), Some(2000.0));
        assert_eq!(parser.qualifying("R$ 98.000,00"), Some(98000.0));
    }

    #[test]
    fn bare_dotted_cells_are_not_money() {
        let parser = MoneyParser::new(2000.0);
        assert_eq!(parser.qualifying_cell("45.000"), None);
        assert_eq!(parser.qualifying_cell("R$ 82.000,00"), Some(82000.0));
        assert_eq!(parser.qualifying_cell("82.000,00"), Some(82000.0));
    }

    #[test]
    fn finds_prefixed_and_bare_decimal_amounts() {
        let parser = MoneyParser::new(2000.0);
        let text = "COROLLA 45.000 km FIPE R$ 98.000,00 REPASSE 82.000,00 ANO 2023";
        assert_eq!(parser.qualifying_in_text(text), vec![98000.0, 82000.0]);
    }
}

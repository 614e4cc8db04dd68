use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::VocabularyConfig;

pub const UNCLASSIFIED_LABEL: &str = "OTHER";

/// 封闭词表分类结果，未命中时为 `Unclassified`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Known(String),
    Unclassified,
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(name) => name,
            Self::Unclassified => UNCLASSIFIED_LABEL,
        }
    }

    /// 过滤条件里的名字与分类是否一致（忽略大小写）
    pub fn matches(&self, name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        if value.is_empty() || value == UNCLASSIFIED_LABEL {
            Self::Unclassified
        } else {
            Self::Known(value)
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

/// 去掉词两端的标点并转大写，保留连字符（MERCEDES-BENZ）
pub fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
        .to_uppercase()
}

pub struct Vocabulary {
    brands: HashMap<String, String>,
    brand_words: HashSet<String>,
    colors: HashMap<String, String>,
    stopwords: HashSet<String>,
    header_keywords: Vec<String>,
}

impl Vocabulary {
    pub fn new(config: &VocabularyConfig) -> Self {
        let mut brands = HashMap::new();
        for brand in &config.brands {
            let canonical = brand.to_uppercase();
            brands.insert(canonical.clone(), canonical);
        }
        for (alias, brand) in &config.brand_synonyms {
            brands.insert(alias.to_uppercase(), brand.to_uppercase());
        }

        let brand_words = brands
            .keys()
            .flat_map(|key| key.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .collect();

        let mut colors = HashMap::new();
        for color in &config.colors {
            let canonical = color.to_uppercase();
            colors.insert(canonical.clone(), canonical);
        }
        for (alias, color) in &config.color_synonyms {
            colors.insert(alias.to_uppercase(), color.to_uppercase());
        }

        let stopwords = config.stopwords.iter().map(|w| w.to_uppercase()).collect();

        Self {
            brands,
            brand_words,
            colors,
            stopwords,
            header_keywords: config.header_keywords.clone(),
        }
    }

    pub fn header_keywords(&self) -> &[String] {
        &self.header_keywords
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(normalize_token)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// 按词序查找第一个品牌，双词品牌（CAOA CHERY）优先于单词
    pub fn classify_brand(&self, text: &str) -> Category {
        let tokens = Self::tokens(text);
        for (i, token) in tokens.iter().enumerate() {
            if let Some(next) = tokens.get(i + 1) {
                if let Some(brand) = self.brands.get(&format!("{} {}", token, next)) {
                    return Category::Known(brand.clone());
                }
            }
            if let Some(brand) = self.brands.get(token) {
                return Category::Known(brand.clone());
            }
        }
        Category::Unclassified
    }

    pub fn classify_color(&self, text: &str) -> Category {
        Self::tokens(text)
            .iter()
            .find_map(|token| self.colors.get(token))
            .map(|color| Category::Known(color.clone()))
            .unwrap_or(Category::Unclassified)
    }

    pub fn is_brand_word(&self, token: &str) -> bool {
        self.brand_words.contains(token)
    }

    pub fn is_color_word(&self, token: &str) -> bool {
        self.colors.contains_key(token)
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> Vocabulary {
        Vocabulary::new(&VocabularyConfig::default())
    }

    #[test]
    fn brand_synonyms_fold_to_canonical_name() {
        let vocab = vocabulary();
        assert_eq!(vocab.classify_brand("vw gol 1.0"), Category::Known("VOLKSWAGEN".into()));
        assert_eq!(vocab.classify_brand("GM Onix LT"), Category::Known("CHEVROLET".into()));
        assert_eq!(vocab.classify_brand("Caoa Chery Tiggo 5X"), Category::Known("CAOA CHERY".into()));
    }

    #[test]
    fn unknown_brand_is_unclassified() {
        let vocab = vocabulary();
        let brand = vocab.classify_brand("LADA NIVA");
        assert_eq!(brand, Category::Unclassified);
        assert_eq!(brand.to_string(), "OTHER");
    }

    #[test]
    fn color_matching_is_order_independent_of_vocabulary() {
        let vocab = vocabulary();
        assert_eq!(vocab.classify_color("COROLLA branca 2023"), Category::Known("BRANCO".into()));
        assert_eq!(vocab.classify_color("PRATA/PRETO"), Category::Unclassified);
        assert_eq!(vocab.classify_color("cor: preto, teto prata"), Category::Known("PRETO".into()));
    }

    #[test]
    fn category_serializes_as_plain_label() {
        let json = serde_json::to_string(&vec![Category::Known("FIAT".into()), Category::Unclassified]).unwrap();
        assert_eq!(json, r#"["FIAT","OTHER"]"#);
    }
}

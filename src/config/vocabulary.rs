use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::FipeResult;

pub const VOCABULARY_PATH: &str = "config/vocabulary.toml";

/// 品牌、颜色、停用词等固定词表
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub brands: Vec<String>,
    /// 缩写 -> 标准品牌名
    pub brand_synonyms: BTreeMap<String, String>,
    pub colors: Vec<String>,
    pub color_synonyms: BTreeMap<String, String>,
    /// 城市、地址、车况等与车型无关的词
    pub stopwords: Vec<String>,
    /// 表头行首格关键字
    pub header_keywords: Vec<String>,
}

impl VocabularyConfig {
    pub fn load() -> FipeResult<Self> {
        Self::load_from(VOCABULARY_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> FipeResult<Self> {
        let config_path = path.as_ref();

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: VocabularyConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn owned_pairs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            brands: owned(&[
                "CHEVROLET", "VOLKSWAGEN", "FIAT", "TOYOTA", "HONDA", "HYUNDAI", "JEEP",
                "RENAULT", "NISSAN", "PEUGEOT", "CITROEN", "FORD", "MITSUBISHI", "BMW",
                "MERCEDES-BENZ", "AUDI", "KIA", "CAOA CHERY", "RAM", "BYD", "GWM",
            ]),
            brand_synonyms: owned_pairs(&[
                ("VW", "VOLKSWAGEN"),
                ("VOLKS", "VOLKSWAGEN"),
                ("GM", "CHEVROLET"),
                ("CHEV", "CHEVROLET"),
                ("MERCEDES", "MERCEDES-BENZ"),
                ("CHERY", "CAOA CHERY"),
                ("CITROËN", "CITROEN"),
            ]),
            colors: owned(&[
                "BRANCO", "PRETO", "PRATA", "CINZA", "VERMELHO", "AZUL", "BEGE", "AMARELO",
                "VERDE", "MARROM", "DOURADO", "LARANJA", "VINHO",
            ]),
            color_synonyms: owned_pairs(&[
                ("BRANCA", "BRANCO"),
                ("PRETA", "PRETO"),
                ("VERMELHA", "VERMELHO"),
                ("AMARELA", "AMARELO"),
                ("DOURADA", "DOURADO"),
            ]),
            stopwords: owned(&[
                "OFERTA", "DISPONIVEL", "DISPONÍVEL", "VCPBR", "VCPER", "APROVADO", "BARUERI",
                "ALPHAVILLE", "MAUA", "MAUÁ", "SOROCABA", "CAMPINAS", "MARGEM", "MARGIN",
                "FIPE", "ORCAMENTO", "ORÇAMENTO", "LOJA", "ENDERECO", "ENDEREÇO", "PRECO",
                "PREÇO", "ESTOQUE", "GANHO", "IPVA", "FLEX", "DIESEL", "MANUAL", "AUTOMATICO",
                "AUTOMÁTICO", "AUT", "REPASSE", "CUSTO", "PLACA", "MODELO", "COR", "ANO",
                "RUA", "AVENIDA", "AV.",
            ]),
            header_keywords: owned(&["LOJA", "PLACA", "MODELO", "MARCA"]),
        }
    }
}

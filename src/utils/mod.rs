pub mod logger;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FipeError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("配置文件解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("配置文件序列化错误: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV导出错误: {0}")]
    CsvError(#[from] csv::Error),

    #[error("XLSX导出错误: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),

    #[error("PDF处理错误: {0}")]
    PdfError(String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("访问被拒绝: {0}")]
    AccessDenied(String),
}

pub type FipeResult<T> = Result<T, FipeError>;

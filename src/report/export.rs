use rust_xlsxwriter::{Format, Workbook};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::info;

use super::ExportFormat;
use crate::config::ExportConfig;
use crate::pricing::PricedRecord;
use crate::utils::FipeResult;

/// 导出文件中的一行，表头用葡萄牙语
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "MARCA")]
    brand: &'a str,
    #[serde(rename = "MODELO")]
    model: &'a str,
    #[serde(rename = "PLACA")]
    plate: &'a str,
    #[serde(rename = "ANO")]
    years: String,
    #[serde(rename = "COR")]
    color: &'a str,
    #[serde(rename = "KM")]
    mileage: u32,
    #[serde(rename = "FIPE", serialize_with = "two_decimals")]
    reference_price: f64,
    #[serde(rename = "CUSTO COMPRA", serialize_with = "two_decimals")]
    cost_price: f64,
    #[serde(rename = "PREÇO VENDA", serialize_with = "two_decimals")]
    sale_price: f64,
    #[serde(rename = "LUCRO", serialize_with = "two_decimals")]
    profit: f64,
    #[serde(rename = "MARGEM %", serialize_with = "two_decimals")]
    margin_pct: f64,
}

impl<'a> From<&'a PricedRecord> for ExportRow<'a> {
    fn from(priced: &'a PricedRecord) -> Self {
        let record = &priced.record;
        Self {
            brand: record.brand.as_str(),
            model: &record.model,
            plate: &record.plate,
            years: record.years.to_string(),
            color: record.color.as_str(),
            mileage: record.mileage,
            reference_price: record.reference_price,
            cost_price: record.cost_price,
            sale_price: priced.sale_price,
            profit: priced.profit,
            margin_pct: priced.margin_pct,
        }
    }
}

const HEADERS: [&str; 11] = [
    "MARCA",
    "MODELO",
    "PLACA",
    "ANO",
    "COR",
    "KM",
    "FIPE",
    "CUSTO COMPRA",
    "PREÇO VENDA",
    "LUCRO",
    "MARGEM %",
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

/// 单工作表，表头加粗，金额列用 R$ 格式
fn xlsx_bytes(rows: &[ExportRow]) -> FipeResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("R$ #,##0.00");
    let percent = Format::new().set_num_format("0.00");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Oportunidades")?;
    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        worksheet.write_string(line, 0, row.brand)?;
        worksheet.write_string(line, 1, row.model)?;
        worksheet.write_string(line, 2, row.plate)?;
        worksheet.write_string(line, 3, row.years.as_str())?;
        worksheet.write_string(line, 4, row.color)?;
        worksheet.write_number(line, 5, row.mileage)?;
        let amounts = [row.reference_price, row.cost_price, row.sale_price, row.profit];
        for (offset, amount) in amounts.into_iter().enumerate() {
            worksheet.write_number_with_format(line, 6 + offset as u16, round2(amount), &money)?;
        }
        worksheet.write_number_with_format(line, 10, round2(row.margin_pct), &percent)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// 默认文件名: Lista_FipeHunter_20260101_120000.csv
pub fn default_file_name(prefix: &str, format: ExportFormat) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}

pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    pub fn to_bytes(&self, records: &[PricedRecord]) -> FipeResult<Vec<u8>> {
        let rows: Vec<ExportRow> = records.iter().map(ExportRow::from).collect();
        match self.format {
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                for row in &rows {
                    writer.serialize(row)?;
                }
                writer
                    .into_inner()
                    .map_err(|e| crate::utils::FipeError::IoError(e.into_error()))
            }
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(&rows)?),
            ExportFormat::Xlsx => xlsx_bytes(&rows),
        }
    }

    /// 写入导出文件；`output` 为空时按配置生成带时间戳的文件名
    pub async fn write(
        &self,
        records: &[PricedRecord],
        config: &ExportConfig,
        output: Option<&Path>,
    ) -> FipeResult<PathBuf> {
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => Path::new(&config.directory).join(default_file_name(&config.file_prefix, self.format)),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = self.to_bytes(records)?;
        tokio::fs::write(&path, bytes).await?;
        info!("✅ 已导出 {} 条记录: {}", records.len(), path.display());

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tests::record;
    use crate::pricing::{MarginMode, Pricer, ProfitMode};

    fn priced() -> Vec<PricedRecord> {
        let pricer = Pricer::new(MarginMode::Fixed(2000.0), ProfitMode::Simple, (1.0, 70.0));
        vec![pricer.price(&record("ABC1D23", "TOYOTA", 98000.0, 82000.0))]
    }

    #[test]
    fn csv_has_portuguese_headers() {
        let bytes = Exporter::new(ExportFormat::Csv).to_bytes(&priced()).unwrap();
        let content = String::from_utf8(bytes).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next(),
            Some("MARCA,MODELO,PLACA,ANO,COR,KM,FIPE,CUSTO COMPRA,PREÇO VENDA,LUCRO,MARGEM %")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("TOYOTA,COROLLA XEI,ABC1D23,2023/2023,PRETO,45000,98000"));
        assert!(row.contains(",84000"));
    }

    #[test]
    fn json_rows_use_same_keys() {
        let bytes = Exporter::new(ExportFormat::Json).to_bytes(&priced()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value[0]["PLACA"], "ABC1D23");
        assert_eq!(value[0]["PREÇO VENDA"], 84000.0);
        assert_eq!(value[0]["MARGEM %"], 2.04);
    }

    #[test]
    fn xlsx_is_a_zip_workbook() {
        let bytes = Exporter::new(ExportFormat::Xlsx).to_bytes(&priced()).unwrap();
        assert!(bytes.starts_with(b"PK"));

        let empty = Exporter::new(ExportFormat::Xlsx).to_bytes(&[]).unwrap();
        assert!(empty.starts_with(b"PK"));
    }

    #[test]
    fn csv_header_matches_spreadsheet_header() {
        let bytes = Exporter::new(ExportFormat::Csv).to_bytes(&priced()).unwrap();
        let content = String::from_utf8(bytes).unwrap();
        assert_eq!(content.lines().next(), Some(HEADERS.join(",").as_str()));
    }

    #[test]
    fn default_name_carries_prefix_and_extension() {
        let name = default_file_name("Lista_FipeHunter", ExportFormat::Csv);
        assert!(name.starts_with("Lista_FipeHunter_"));
        assert!(name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn writes_into_configured_directory() {
        let directory = std::env::temp_dir().join(format!("fipehunter-export-{}", std::process::id()));
        let config = ExportConfig {
            directory: directory.to_string_lossy().to_string(),
            file_prefix: "Lista_FipeHunter".to_string(),
            format: ExportFormat::Json,
        };

        let path = Exporter::new(ExportFormat::Json)
            .write(&priced(), &config, None)
            .await
            .unwrap();

        assert!(path.starts_with(&directory));
        assert!(tokio::fs::metadata(&path).await.is_ok());
        tokio::fs::remove_dir_all(&directory).await.unwrap();
    }
}

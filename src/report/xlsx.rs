//! Excel workbook writer

use super::{Cell, Report, Sheet};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};

/// Excel's limit on worksheet name length
const MAX_SHEET_NAME_LENGTH: usize = 31;

/// Sheet written when a report has no sheets at all
const FALLBACK_SHEET_NAME: &str = "Sheet1";

/// Make a sheet name acceptable to Excel
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME_LENGTH)
        .collect();

    if cleaned.trim().is_empty() {
        FALLBACK_SHEET_NAME.to_string()
    } else {
        cleaned
    }
}

/// Write the report into `dir` and return the path of the new file
pub fn write_xlsx(report: &Report, dir: &Path, generated_at: &DateTime<Local>) -> Result<PathBuf> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let path = dir.join(report.file_name(generated_at));
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    if report.sheets.is_empty() {
        workbook
            .add_worksheet()
            .set_name(FALLBACK_SHEET_NAME)
            .context("Failed to name worksheet")?;
    }

    for sheet in &report.sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet, &header)
            .with_context(|| format!("Failed to write sheet '{}'", sheet.name))?;
    }

    workbook
        .save(&path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    tracing::info!("Wrote {} sheet(s) to {}", report.sheets.len(), path.display());

    Ok(path)
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, header: &Format) -> Result<()> {
    worksheet.set_name(sanitize_sheet_name(&sheet.name))?;

    for (col, name) in sheet.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, header)?;
    }

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                Cell::Int(i) => {
                    worksheet.write_number(row_num, col, *i as f64)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
            }
        }
    }

    if !sheet.columns.is_empty() {
        worksheet.set_freeze_panes(1, 0)?;
        worksheet.autofit();
    }

    Ok(())
}

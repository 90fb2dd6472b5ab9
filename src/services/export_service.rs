//! Renders the catalog as an xlsx workbook.
//!
//! One bold header row on a grey fill, one row per record, columns sized to
//! the longest cell. Row shaping is kept separate from workbook writing so
//! the formatting rules are testable without parsing xlsx output.

use crate::models::image::ImageRecord;
use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};

pub const SPREADSHEET_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Image URLs";
const HEADERS: [&str; 5] = [
    "Image Name",
    "Image URL",
    "Upload Date",
    "File Size (MB)",
    "File Type",
];

/// Shape one record into its five display cells.
fn record_row(record: &ImageRecord) -> [String; 5] {
    [
        record.original_filename.clone(),
        record.remote_url.clone(),
        record.upload_timestamp.format("%m/%d/%Y").to_string(),
        format!("{:.2}", record.file_size_bytes as f64 / 1024.0 / 1024.0),
        record.content_type.clone(),
    ]
}

/// All data rows for the sheet, one per record, in catalog order.
fn sheet_rows(records: &[ImageRecord]) -> Vec<[String; 5]> {
    records.iter().map(record_row).collect()
}

/// Width of each column: the longest cell in it, header included.
fn column_widths(rows: &[[String; 5]]) -> [usize; 5] {
    let mut widths = HEADERS.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}

/// Build the full workbook as an in-memory buffer ready to stream out.
pub fn render_workbook(records: &[ImageRecord]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xE0E0E0));
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    let rows = sheet_rows(records);
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            worksheet.write_string(row_idx as u32 + 1, col as u16, cell)?;
        }
    }

    for (col, width) in column_widths(&rows).iter().enumerate() {
        worksheet.set_column_width(col as u16, *width as f64)?;
    }

    workbook.save_to_buffer()
}

/// Download filename stamped with the given calendar date.
pub fn attachment_filename(date: NaiveDate) -> String {
    format!("image-urls-{}.xlsx", date.format("%Y-%m-%d"))
}

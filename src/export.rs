//! Spreadsheet export of message records
//!
//! The workbook is built entirely in memory; nothing touches the disk.

use std::io::Cursor;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::config::FILENAME_MAX_CHARS;
use crate::error::Result;
use crate::record::MessageRecord;

pub const SHEET_NAME: &str = "data";

/// Serialized `.xlsx` document.
#[derive(Debug, Clone)]
pub struct ExportBuffer {
    data: Vec<u8>,
}

impl ExportBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Fresh reader positioned at the start of the document.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Build a single-sheet workbook: header row, then one row per record in
/// input order. Missing values stay empty cells.
pub fn export(records: &[MessageRecord]) -> Result<ExportBuffer> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in MessageRecord::COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (idx, record) in records.iter().enumerate() {
        write_record(worksheet, idx as u32 + 1, record)?;
    }

    let data = workbook.save_to_buffer()?;
    Ok(ExportBuffer { data })
}

fn write_record(worksheet: &mut Worksheet, row: u32, record: &MessageRecord) -> Result<()> {
    worksheet.write_string(row, 0, record.channel_title.as_str())?;
    worksheet.write_number(row, 1, record.channel_id as f64)?;
    worksheet.write_string(row, 2, record.is_private.as_str())?;
    worksheet.write_number(row, 3, f64::from(record.message_id))?;
    write_optional_string(worksheet, row, 4, record.message_date.as_deref())?;
    write_optional_string(worksheet, row, 5, record.post_link.as_deref())?;
    write_optional_string(worksheet, row, 6, record.file_name.as_deref())?;
    if let Some(size) = record.file_size_bytes {
        worksheet.write_number(row, 7, size as f64)?;
    }
    write_optional_string(worksheet, row, 8, record.file_mime.as_deref())?;
    write_optional_string(worksheet, row, 9, record.text_snippet.as_deref())?;
    Ok(())
}

fn write_optional_string(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<&str>,
) -> Result<()> {
    if let Some(value) = value {
        worksheet.write_string(row, col, value)?;
    }
    Ok(())
}

/// File name for an export of `title`: reserved characters become `_`,
/// length is capped, `.xlsx` is appended.
pub fn export_file_name(title: &str) -> String {
    let name = if title.is_empty() {
        "telegram_channel"
    } else {
        title
    };
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let stem: String = replaced.trim().chars().take(FILENAME_MAX_CHARS).collect();
    format!("{}.xlsx", stem)
}

/// Caption sent with the delivered document.
pub fn export_caption(rows: usize, title: &str) -> String {
    format!("✅ {} rows • {}", rows, title)
}

//! Ticket report rendering. Every format shares one column set and receives
//! tickets that are already filtered and hydrated.

use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::style::Style;
use genpdf::{Element, SimplePageDecorator};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use shared::report::{row, COLUMNS};
use shared::Ticket;
use std::path::Path;

const XLSX_WIDTHS: [f64; 12] = [
    16.0, 12.0, 28.0, 12.0, 22.0, 50.0, 14.0, 20.0, 20.0, 18.0, 18.0, 40.0,
];

// Relative column weights for the landscape PDF table.
const PDF_WEIGHTS: [usize; 12] = [4, 3, 5, 3, 4, 8, 3, 4, 4, 4, 4, 6];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("PDF error: {0}")]
    Pdf(#[from] genpdf::error::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn to_csv(tickets: &[Ticket]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for ticket in tickets {
        writer.write_record(row(ticket))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

pub fn to_xlsx(tickets: &[Ticket]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Tickets")?;

    let header = Format::new().set_bold();
    for (col, title) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header)?;
        worksheet.set_column_width(col, XLSX_WIDTHS[col as usize])?;
    }

    for (i, ticket) in tickets.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, value) in row(ticket).iter().enumerate() {
            worksheet.write_string(r, col as u16, value)?;
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    Ok(workbook.save_to_buffer()?)
}

/// Inserts spaces into runs longer than `max` so narrow table cells can wrap
/// instead of dropping the text.
fn wrap_long_words(s: &str, max: usize) -> String {
    s.split_whitespace()
        .map(|word| {
            let chars: Vec<char> = word.chars().collect();
            chars
                .chunks(max)
                .map(|c| c.iter().collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn to_pdf(
    tickets: &[Ticket],
    font_dir: &Path,
    font_name: &str,
    title: &str,
) -> Result<Vec<u8>, ExportError> {
    let font_family = genpdf::fonts::from_files(font_dir, font_name, None)?;
    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(title);
    doc.set_paper_size(genpdf::Size::new(297, 210));
    doc.set_font_size(7);

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    doc.push(Paragraph::default().styled_string(title, Style::new().bold().with_font_size(14)));
    doc.push(Paragraph::new(format!("{} ticket(s)", tickets.len())));
    doc.push(Break::new(1));

    let mut table = TableLayout::new(PDF_WEIGHTS.to_vec());
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let mut header = table.row();
    for column in COLUMNS {
        header.push_element(Paragraph::default().styled_string(column, Style::new().bold()));
    }
    header.push()?;

    for ticket in tickets {
        let mut r = table.row();
        for value in row(ticket) {
            r.push_element(Paragraph::new(wrap_long_words(&value, 14)).padded(1));
        }
        r.push()?;
    }
    doc.push(table);

    let mut buffer = Vec::new();
    doc.render(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::TicketStatus;

    fn ticket(id: &str, closed: bool) -> Ticket {
        let ts = NaiveDate::from_ymd_opt(2026, 9, 30)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        Ticket {
            ticket_id: id.into(),
            station_id: "34.101.02".into(),
            station_name: Some("SPBU Menteng".into()),
            station_type: None,
            issue_on: "Dispenser".into(),
            issue_type: "Meter Error".into(),
            description: "Pump 3 totalizer, reads \"0\"".into(),
            status: if closed { TicketStatus::Close } else { TicketStatus::Open },
            users_id: None,
            assignee_name: None,
            user_create_ticket: 1,
            creator_name: "Admin".into(),
            comment: closed.then(|| "Recalibrated".to_string()),
            created_at: ts,
            updated_at: ts,
            in_progress_at: None,
            on_hold_at: None,
            pending_vendor_at: None,
            closed_at: closed.then_some(ts),
            images: Vec::new(),
        }
    }

    #[test]
    fn csv_has_header_and_quotes_fields() {
        let bytes = to_csv(&[ticket("POS2609000001", false)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        let line = lines.next().unwrap();
        assert!(line.starts_with("POS2609000001,34.101.02,SPBU Menteng"));
        assert!(line.contains("\"Pump 3 totalizer, reads \"\"0\"\"\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn csv_of_nothing_is_just_the_header() {
        let text = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx(&[ticket("POS2609000001", true), ticket("POS2609000002", false)]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn pdf_without_fonts_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = to_pdf(&[], tmp.path(), "Missing", "Tickets");
        assert!(matches!(result, Err(ExportError::Pdf(_))));
    }

    #[test]
    fn long_words_are_broken_up() {
        assert_eq!(wrap_long_words("abcdefgh ij", 3), "abc def gh ij");
        assert_eq!(wrap_long_words("short words", 10), "short words");
    }
}

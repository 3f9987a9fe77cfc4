use std::io::BufWriter;

use printpdf::*;

use crate::error::{CuratelaError, Result};
use crate::fmt::{fold_diacritics, format_date_br, money};
use crate::reports::RegisterReport;

// A4 landscape (mm)
const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MARGIN_TOP: f32 = 18.0;
const MARGIN_BOTTOM: f32 = 18.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 15.0;
const ROW_H: f32 = 5.5;
const FONT_SIZE: f32 = 9.5;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;
const MAX_DESCRIPTION: usize = 60;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

// Builtin fonts get the raw bytes of the string, so keep text ASCII.
fn pdf_text(s: &str) -> String {
    fold_diacritics(s)
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(pdf_text(title), Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| CuratelaError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| CuratelaError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            pages: vec![(page, layer)],
            y: MARGIN_TOP,
        })
    }

    fn layer(&self, idx: usize) -> PdfLayerReference {
        let (page, layer) = self.pages[idx];
        self.doc.get_page(page).get_layer(layer)
    }

    fn current(&self) -> PdfLayerReference {
        self.layer(self.pages.len() - 1)
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.pages.push((page, layer));
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
            return true;
        }
        false
    }

    fn text_at(&self, layer: &PdfLayerReference, s: &str, x: f32, y: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        layer.use_text(pdf_text(s), size, Mm(x), Mm(PAGE_H - y), font);
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        self.text_at(&self.current(), s, x, self.y, size, bold);
    }

    fn hline(&self) {
        let layer = self.current();
        layer.set_outline_thickness(0.5);
        let y = Mm(PAGE_H - self.y);
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_LEFT), y), false),
                (Point::new(Mm(PAGE_W - MARGIN_RIGHT), y), false),
            ],
            is_closed: false,
        });
    }

    fn header(&mut self, title: &str, subtitle: &str) {
        self.text(title, MARGIN_LEFT, TITLE_SIZE, true);
        self.y += 7.0;
        if !subtitle.is_empty() {
            self.text(subtitle, MARGIN_LEFT, SUBTITLE_SIZE, false);
            self.y += 5.0;
        }
        let ts = chrono::Local::now().format("Gerado em %d/%m/%Y %H:%M").to_string();
        self.text(&ts, MARGIN_LEFT, FOOTER_SIZE, false);
        self.y += 5.0;
        self.hline();
        self.y += 5.0;
    }

    fn row(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            match col.align {
                Align::Left => self.text(value, x, FONT_SIZE, bold),
                Align::Right => {
                    let tw = approx_text_width(value, FONT_SIZE);
                    self.text(value, x + col.width - tw, FONT_SIZE, bold);
                }
            }
            x += col.width;
        }
        self.y += ROW_H;
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.row(cols, headers, true);
        self.y -= ROW_H - 1.5;
        self.hline();
        self.y += ROW_H - 1.5;
    }

    /// Stamp "Página i de n" at the bottom of every page.
    fn footers(&self) {
        let n = self.pages.len();
        for i in 0..n {
            let label = format!("Página {} de {}", i + 1, n);
            let x = PAGE_W - MARGIN_RIGHT - approx_text_width(&label, FOOTER_SIZE);
            self.text_at(&self.layer(i), &label, x, PAGE_H - MARGIN_BOTTOM / 2.0, FOOTER_SIZE, false);
        }
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        self.footers();
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| CuratelaError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| CuratelaError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Register report
// ---------------------------------------------------------------------------

const REGISTER_HEADERS: [&str; 5] = ["Data", "Descrição", "Conta", "Natureza", "Valor"];

fn register_cols() -> [Col; 5] {
    [
        Col { width: 28.0, align: Align::Left },
        Col { width: 112.0, align: Align::Left },
        Col { width: 55.0, align: Align::Left },
        Col { width: 30.0, align: Align::Left },
        Col { width: 42.0, align: Align::Right },
    ]
}

fn write_register(pdf: &mut PdfWriter, report: &RegisterReport, title: &str, subtitle: &str) {
    let cols = register_cols();
    pdf.header(title, subtitle);
    pdf.table_header(&cols, &REGISTER_HEADERS);

    if report.rows.is_empty() {
        pdf.row(&cols, &["", "Nenhum lançamento no período"], false);
    }
    for r in &report.rows {
        if pdf.ensure_space(ROW_H) {
            pdf.table_header(&cols, &REGISTER_HEADERS);
        }
        let date = format_date_br(r.date);
        let description = truncate(&r.description, MAX_DESCRIPTION);
        let value = money(r.value);
        pdf.row(
            &cols,
            &[&date, &description, &r.account_name, r.nature.as_str(), &value],
            false,
        );
    }

    pdf.ensure_space(ROW_H * 5.0);
    pdf.y += 2.0;
    pdf.hline();
    pdf.y += 4.0;
    let summary = [Col { width: 225.0, align: Align::Right }, Col { width: 42.0, align: Align::Right }];
    pdf.row(&summary, &["Total de receitas", &money(report.total_income)], false);
    pdf.row(&summary, &["Total de despesas", &money(report.total_expense)], false);
    pdf.row(&summary, &["Saldo líquido", &money(report.net)], true);
}

pub fn render_register(report: &RegisterReport, title: &str, subtitle: &str) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new(title)?;
    write_register(&mut pdf, report, title, subtitle);
    log::debug!(target: "pdf", "register rendered: {} rows, {} pages", report.rows.len(), pdf.pages.len());
    pdf.to_bytes()
}

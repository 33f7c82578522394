//! PDF rendering for invoices and quotes.

use std::ops::Range;

use concierge_config::BusinessConfig;
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point,
};

use super::billing::Totals;
use super::error::ServiceError;
use crate::routes::models::LineItem;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 7.0;
/// Item rows on the first page, below the letterhead and client block.
const FIRST_PAGE_ROWS: usize = 22;
/// Item rows on continuation pages.
const NEXT_PAGE_ROWS: usize = 32;
const DESCRIPTION_CHARS: usize = 58;

const COL_QTY: f32 = 120.0;
const COL_UNIT_RIGHT: f32 = 160.0;
const COL_AMOUNT_RIGHT: f32 = PAGE_WIDTH - MARGIN;

/// Sender details printed on every document.
#[derive(Debug, Clone)]
pub struct BusinessInfo {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl From<&BusinessConfig> for BusinessInfo {
    fn from(config: &BusinessConfig) -> Self {
        Self {
            name: config.company_name.clone(),
            email: config.company_email.clone(),
            address: config.company_address.clone(),
        }
    }
}

/// The printable parts of an invoice or quote.
#[derive(Debug, Clone)]
pub struct DocumentView {
    /// `INVOICE` or `QUOTE`.
    pub title: &'static str,
    pub number: String,
    pub status: String,
    pub client_name: String,
    pub client_email: String,
    pub issue_date: String,
    /// Due date or validity date, with its label.
    pub secondary_date: Option<(&'static str, String)>,
    pub line_items: Vec<LineItem>,
    pub tax_rate_bps: i64,
    pub totals: Totals,
    pub notes: Option<String>,
}

/// `$1,234.56` style formatting of an amount in cents.
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (index, digit) in dollars.chars().enumerate() {
        if index > 0 && (dollars.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}${grouped}.{:02}", cents % 100)
}

fn format_rate(bps: i64) -> String {
    let whole = bps / 100;
    let fraction = bps % 100;
    if fraction == 0 {
        format!("{whole}%")
    } else if fraction % 10 == 0 {
        format!("{whole}.{}%", fraction / 10)
    } else {
        format!("{whole}.{fraction:02}%")
    }
}

/// Split `count` item rows across pages.
pub fn paginate(count: usize, first_page: usize, next_pages: usize) -> Vec<Range<usize>> {
    let mut pages = vec![0..count.min(first_page)];
    let mut start = pages[0].end;
    while start < count {
        let end = (start + next_pages).min(count);
        pages.push(start..end);
        start = end;
    }
    pages
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Rough Helvetica width, good enough to right-align numbers.
fn text_width_mm(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * 0.3528
}

struct Canvas {
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Canvas {
    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.regular);
    }

    fn bold(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.bold);
    }

    fn right(&self, text: &str, size: f32, right_edge: f32, y: f32) {
        self.text(text, size, right_edge - text_width_mm(text, size), y);
    }

    fn rule(&self, y: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
            ],
            is_closed: false,
        });
    }

    fn table_header(&self, y: f32) -> f32 {
        self.bold("Description", 10.0, MARGIN, y);
        self.bold("Qty", 10.0, COL_QTY, y);
        self.bold("Unit", 10.0, COL_UNIT_RIGHT - text_width_mm("Unit", 10.0), y);
        self.bold("Amount", 10.0, COL_AMOUNT_RIGHT - text_width_mm("Amount", 10.0), y);
        self.rule(y - 2.0);
        y - ROW_HEIGHT - 1.0
    }

    fn item_row(&self, item: &LineItem, y: f32) {
        self.text(&truncate(&item.description, DESCRIPTION_CHARS), 10.0, MARGIN, y);
        self.text(&item.quantity.to_string(), 10.0, COL_QTY, y);
        self.right(&format_money(item.unit_price_cents), 10.0, COL_UNIT_RIGHT, y);
        self.right(&format_money(item.amount_cents()), 10.0, COL_AMOUNT_RIGHT, y);
    }
}

fn letterhead(canvas: &Canvas, business: &BusinessInfo, view: &DocumentView) -> f32 {
    let mut y = PAGE_HEIGHT - MARGIN;
    canvas.bold(&business.name, 18.0, MARGIN, y);
    canvas.bold(view.title, 18.0, 140.0, y);

    y -= 7.0;
    let mut left = y;
    for line in business.address.iter().chain(business.email.iter()) {
        canvas.text(line, 10.0, MARGIN, left);
        left -= 5.0;
    }

    let mut right = y;
    canvas.text(&format!("No. {}", view.number), 10.0, 140.0, right);
    right -= 5.0;
    canvas.text(&format!("Issued {}", view.issue_date), 10.0, 140.0, right);
    right -= 5.0;
    if let Some((label, date)) = &view.secondary_date {
        canvas.text(&format!("{label} {date}"), 10.0, 140.0, right);
        right -= 5.0;
    }
    canvas.text(&format!("Status: {}", view.status), 10.0, 140.0, right);

    let mut y = left.min(right - 5.0) - 8.0;
    canvas.bold("Bill to", 11.0, MARGIN, y);
    y -= 5.5;
    canvas.text(&view.client_name, 10.0, MARGIN, y);
    y -= 5.0;
    canvas.text(&view.client_email, 10.0, MARGIN, y);
    y - 12.0
}

fn summary(canvas: &Canvas, view: &DocumentView, mut y: f32) {
    canvas.rule(y + 4.0);
    let label_x = 120.0;
    let rows = [
        ("Subtotal".to_string(), view.totals.subtotal_cents),
        (
            format!("Tax ({})", format_rate(view.tax_rate_bps)),
            view.totals.tax_cents,
        ),
    ];
    for (label, cents) in rows {
        canvas.text(&label, 10.0, label_x, y);
        canvas.right(&format_money(cents), 10.0, COL_AMOUNT_RIGHT, y);
        y -= 6.0;
    }
    canvas.bold("Total", 12.0, label_x, y);
    let total = format_money(view.totals.total_cents);
    canvas.bold(&total, 12.0, COL_AMOUNT_RIGHT - text_width_mm(&total, 12.0), y);

    if let Some(notes) = view.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
        y -= 14.0;
        canvas.bold("Notes", 11.0, MARGIN, y);
        for line in notes.lines().take(6) {
            y -= 5.0;
            canvas.text(&truncate(line, 95), 10.0, MARGIN, y);
        }
    }
}

fn pdf_error<E: std::fmt::Debug>(error: E) -> ServiceError {
    ServiceError::internal(format!("pdf rendering failed: {error:?}"))
}

/// Render an invoice or quote as an A4 PDF.
pub fn render_document(
    business: &BusinessInfo,
    view: &DocumentView,
) -> Result<Vec<u8>, ServiceError> {
    render_pages(business, view).map(|(bytes, _)| bytes)
}

/// Render the document and report how many pages it took.
fn render_pages(
    business: &BusinessInfo,
    view: &DocumentView,
) -> Result<(Vec<u8>, usize), ServiceError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        format!("{} {}", view.title, view.number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let new_canvas = |layer: PdfLayerReference| Canvas {
        layer,
        regular: regular.clone(),
        bold: bold.clone(),
    };
    let continuation = || {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let canvas = new_canvas(doc.get_page(page).get_layer(layer));
        let y = PAGE_HEIGHT - MARGIN;
        canvas.bold(
            &format!("{} {} (continued)", view.title, view.number),
            11.0,
            MARGIN,
            y,
        );
        (canvas, y - 10.0)
    };

    let mut sheets = vec![new_canvas(doc.get_page(first_page).get_layer(first_layer))];
    let mut y = letterhead(&sheets[0], business, view);

    for (index, rows) in paginate(view.line_items.len(), FIRST_PAGE_ROWS, NEXT_PAGE_ROWS)
        .into_iter()
        .enumerate()
    {
        if index > 0 {
            let (canvas, top) = continuation();
            sheets.push(canvas);
            y = top;
        }

        let canvas = &sheets[index];
        y = canvas.table_header(y);
        for item in &view.line_items[rows] {
            canvas.item_row(item, y);
            y -= ROW_HEIGHT;
        }
    }

    // Totals and notes need about 70mm.
    if y < MARGIN + 70.0 {
        let (canvas, top) = continuation();
        sheets.push(canvas);
        y = top;
    }
    summary(&sheets[sheets.len() - 1], view, y - 4.0);

    // Footers go on last, once the summary page is known.
    let page_count = sheets.len();
    if page_count > 1 {
        for (index, canvas) in sheets.iter().enumerate() {
            canvas.right(
                &format!("Page {} of {}", index + 1, page_count),
                8.0,
                COL_AMOUNT_RIGHT,
                MARGIN / 2.0,
            );
        }
    }

    let bytes = doc.save_to_bytes().map_err(pdf_error)?;
    Ok((bytes, page_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(items: usize) -> DocumentView {
        let line_items: Vec<LineItem> = (0..items)
            .map(|n| LineItem {
                description: format!("Showing appointment {n}"),
                quantity: 1,
                unit_price_cents: 15_000,
            })
            .collect();
        let subtotal = 15_000 * items as i64;
        DocumentView {
            title: "INVOICE",
            number: "INV-2024-0001".into(),
            status: "sent".into(),
            client_name: "Jane Doe".into(),
            client_email: "jane@example.com".into(),
            issue_date: "2024-05-01".into(),
            secondary_date: Some(("Due", "2024-05-31".into())),
            line_items,
            tax_rate_bps: 650,
            totals: Totals {
                subtotal_cents: subtotal,
                tax_cents: 0,
                total_cents: subtotal,
            },
            notes: Some("Thank you!".into()),
        }
    }

    fn business() -> BusinessInfo {
        BusinessInfo {
            name: "Concierge Realty".into(),
            email: Some("billing@example.com".into()),
            address: Some("1 Main St, Miami, FL".into()),
        }
    }

    #[test]
    fn money_is_grouped_with_two_decimals() {
        assert_eq!(format_money(0), "$0.00");
        assert_eq!(format_money(5), "$0.05");
        assert_eq!(format_money(123_456), "$1,234.56");
        assert_eq!(format_money(100_000_000), "$1,000,000.00");
        assert_eq!(format_money(-2_500), "-$25.00");
    }

    #[test]
    fn tax_rates_print_as_percentages() {
        assert_eq!(format_rate(700), "7%");
        assert_eq!(format_rate(650), "6.5%");
        assert_eq!(format_rate(825), "8.25%");
        assert_eq!(format_rate(0), "0%");
    }

    #[test]
    fn pagination_fills_first_page_then_continues() {
        assert_eq!(paginate(0, 22, 32), vec![0..0]);
        assert_eq!(paginate(5, 22, 32), vec![0..5]);
        assert_eq!(paginate(60, 22, 32), vec![0..22, 22..54, 54..60]);
    }

    #[test]
    fn long_descriptions_are_truncated() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 10), "abcdefg...");
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = render_document(&business(), &view(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn totals_that_spill_over_get_their_own_counted_page() {
        // Three rows leave room for the totals on the first page.
        assert_eq!(render_pages(&business(), &view(3)).unwrap().1, 1);
        // A full first page pushes the totals onto a second one.
        assert_eq!(render_pages(&business(), &view(FIRST_PAGE_ROWS)).unwrap().1, 2);
        // 80 rows fill three item pages and the totals need a fourth.
        assert_eq!(render_pages(&business(), &view(80)).unwrap().1, 4);
    }

    #[test]
    fn long_item_lists_span_more_pages() {
        let short = render_document(&business(), &view(3)).unwrap();
        let long = render_document(&business(), &view(80)).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert!(long.len() > short.len());
    }
}

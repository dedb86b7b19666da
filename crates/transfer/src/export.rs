use rust_xlsxwriter::{Format, Workbook, XlsxError};
use shared::domain::Product;

use crate::COLUMNS;

const SHEET_NAME: &str = "products";

/// Writes one header row followed by one row per product, in column order.
pub fn write_products(products: &[Product]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    for (col, title) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    for (index, product) in products.iter().enumerate() {
        let row = (index + 1) as u32;
        sheet.write_number(row, 0, product.id.0 as f64)?;
        sheet.write_string(row, 1, product.name.as_str())?;
        sheet.write_string(row, 2, product.category.as_str())?;
        sheet.write_number(row, 3, product.quantity as f64)?;
    }

    workbook.save_to_buffer()
}

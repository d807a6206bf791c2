//! Export constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Worksheet name used for every export.
pub const C_SHEET_NAME_EXPORT: &str = "Sheet1";

/// Minimum column width in character units.
pub const N_WIDTH_COL_MIN: f64 = 12.0;
/// Maximum column width in character units.
pub const N_WIDTH_COL_MAX: f64 = 42.0;
/// Fixed width for date/datetime columns.
pub const N_WIDTH_COL_DATE: f64 = 12.0;
/// Quantile of printed cell lengths used as the data-width basis.
pub const N_QUANTILE_WIDTH_DATA: f64 = 0.75;
/// Shrink factor applied to the length quantile.
pub const N_RATIO_WIDTH_DATA: f64 = 0.75;
/// Header length wins over the data width when within this ratio of it.
pub const N_RATIO_HEADER_DOMINANCE: f64 = 1.3;
/// Padding added to whichever width ends up binding.
pub const N_WIDTH_COL_PADDING: f64 = 2.0;

/// Inward nudge applied to both `between` bounds.
pub const N_EPS_BETWEEN_BOUNDS: f64 = 0.0001;

/// Header row height in points.
pub const N_HEIGHT_ROW_HEADER: f64 = 28.0;

/// Anchor-tag pattern for in-cell hyperlink markup.
pub const R_ANCHOR_MARKUP: &str = r#"<a href="([^"]*)">([^<]*)</a>"#;

/// Number format for datetime columns without a display descriptor.
pub const C_NUM_FORMAT_DATETIME_DEFAULT: &str = "DD.MM.YYYY";

/// Fill color of the header band.
pub const C_COLOR_FILL_HEADER: &str = "CFE0F1";
/// Font color of rewritten hyperlink cells.
pub const C_COLOR_FONT_HYPERLINK: &str = "0000FF";
/// Font family used for every cell.
pub const C_FONT_NAME_EXPORT: &str = "Tahoma";
/// Font size used for every cell.
pub const N_FONT_SIZE_EXPORT: i64 = 8;

/// Build default named format presets used by [`crate::writer::XlsxExporter`].
pub fn derive_default_export_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some(C_FONT_NAME_EXPORT.to_string()),
        font_size: Some(N_FONT_SIZE_EXPORT),
        border: Some(1),
        text_wrap: Some(true),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(
        "body".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            valign: Some("top".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(false),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            bg_color: Some(C_COLOR_FILL_HEADER.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "hyperlink".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            valign: Some("top".to_string()),
            underline: Some(true),
            font_color: Some(C_COLOR_FONT_HYPERLINK.to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

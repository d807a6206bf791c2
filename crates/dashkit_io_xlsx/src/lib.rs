//! `dashkit_io_xlsx` v1:
//! Rust-side styled XLSX export kernel.
//!
//! Converts a tabular result set plus the visualization layer's display
//! descriptors into one styled single-sheet workbook buffer:
//! - `conf`   : constants and default presets
//! - `spec`   : specs/models/options
//! - `util`   : pure translators and helpers
//! - `writer` : exporter kernel
pub mod conf;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_NUM_FORMAT_DATETIME_DEFAULT, C_SHEET_NAME_EXPORT, N_EPS_BETWEEN_BOUNDS, N_WIDTH_COL_MAX,
    N_WIDTH_COL_MIN,
};
pub use spec::{
    EnumCellValue, EnumComparisonOperator, SpecCellFormat, SpecColumnDisplayFormat,
    SpecColumnStylePlan, SpecConditionDescriptor, SpecConditionalRule, SpecExportRequest,
    SpecStyledCell, SpecXlsxExportOptions,
};
pub use util::{
    calculate_length_quantile, collapse_anchor_markup, compile_anchor_pattern,
    derive_date_format_from_display_code, derive_hyperlink_parts,
    derive_num_format_from_display_code, estimate_column_width, plan_column_num_formats,
    plan_styled_cell, translate_condition_descriptors, validate_unique_columns,
};
pub use writer::XlsxExporter;

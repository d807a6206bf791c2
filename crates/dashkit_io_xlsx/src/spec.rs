//! Shared export specification models.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::conf::{C_NUM_FORMAT_DATETIME_DEFAULT, C_SHEET_NAME_EXPORT, N_HEIGHT_ROW_HEADER};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification mapped onto the workbook engine at write time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Single underline.
    pub underline: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            underline: other.underline.or(self.underline),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Normalized cell value during the conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Date or datetime value.
    DateTime(NaiveDateTime),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DisplayFormatSpecification

/// Display-format directives attached to one column by the visualization layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnDisplayFormat {
    /// Numeric display-format code (percent/fixed-point/integer grammar).
    pub number_format: Option<String>,
    /// Date/time display-format code (component-letter grammar).
    pub time_format: Option<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConditionSpecification

/// Comparison operator resolved from a display token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumComparisonOperator {
    /// Strictly greater than the target.
    GreaterThan,
    /// Strictly less than the target.
    LessThan,
    /// Greater than or equal to the target.
    GreaterOrEqual,
    /// Less than or equal to the target.
    LessOrEqual,
    /// Equal to the target.
    Equal,
    /// Not equal to the target.
    NotEqual,
    /// Between two bounds.
    Between,
}

impl EnumComparisonOperator {
    /// Resolve an operator from its display token; `None` for unknown tokens.
    pub fn parse_display_token(token: &str) -> Option<Self> {
        match token {
            ">" => Some(Self::GreaterThan),
            "<" => Some(Self::LessThan),
            "≥" => Some(Self::GreaterOrEqual),
            "≤" => Some(Self::LessOrEqual),
            "=" => Some(Self::Equal),
            "≠" => Some(Self::NotEqual),
            "< x <" => Some(Self::Between),
            _ => None,
        }
    }
}

/// Raw per-column highlight condition as supplied by the visualization layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecConditionDescriptor {
    /// Target column name.
    pub column: String,
    /// Operator display token.
    pub operator: String,
    /// Threshold for single-operand operators.
    pub target_value: Option<f64>,
    /// Lower bound for `between`.
    pub target_value_left: Option<f64>,
    /// Upper bound for `between`.
    pub target_value_right: Option<f64>,
    /// Fill color, optionally with a leading `#`.
    pub color_scheme: String,
}

/// Translated conditional-format rule ready for the workbook engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecConditionalRule {
    /// Target column name.
    pub column: String,
    /// Resolved comparison operator.
    pub operator: EnumComparisonOperator,
    /// First comparison operand.
    pub operand_first: f64,
    /// Second comparison operand, present only for `between`.
    pub operand_second: Option<f64>,
    /// Fill color without marker characters.
    pub bg_color: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RequestSpecification

/// Per-export request options supplied by the caller.
///
/// Both members are optional; an absent mapping means "nothing to apply".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecExportRequest {
    /// Column name to display-format directives.
    pub column_config: Option<BTreeMap<String, SpecColumnDisplayFormat>>,
    /// Highlight conditions in evaluation order.
    pub conditional_formatting: Option<Vec<SpecConditionDescriptor>>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StylePlanSpecification

/// Per-column style plan computed once before any cell is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnStylePlan {
    /// Column name.
    pub name: String,
    /// Final column width in character units.
    pub width: f64,
    /// Number format applied to data cells, when one was derived.
    pub num_format: Option<String>,
    /// Column holds date/datetime values.
    pub if_datetime: bool,
}

/// One cell's value plus the presentation derived for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecStyledCell {
    /// Value to write (numeric hyperlink labels are already numbers here).
    pub value: EnumCellValue,
    /// Hyperlink target, when anchor markup was rewritten.
    pub hyperlink: Option<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Exporter-wide options controlling sheet naming and presentation presets.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxExportOptions {
    /// Worksheet name.
    pub sheet_name: String,
    /// Number format for datetime columns without an explicit descriptor.
    pub num_format_datetime_default: String,
    /// Header row height in points.
    pub height_row_header: f64,
    /// Data cell format preset.
    pub fmt_body: SpecCellFormat,
    /// Header cell format preset.
    pub fmt_header: SpecCellFormat,
    /// Rewritten hyperlink cell format preset.
    pub fmt_hyperlink: SpecCellFormat,
}

impl Default for SpecXlsxExportOptions {
    fn default() -> Self {
        let dict_fmt = crate::conf::derive_default_export_formats();
        let derive_preset = |key: &str| dict_fmt.get(key).cloned().unwrap_or_default();

        Self {
            sheet_name: C_SHEET_NAME_EXPORT.to_string(),
            num_format_datetime_default: C_NUM_FORMAT_DATETIME_DEFAULT.to_string(),
            height_row_header: N_HEIGHT_ROW_HEADER,
            fmt_body: derive_preset("body"),
            fmt_header: derive_preset("header"),
            fmt_hyperlink: derive_preset("hyperlink"),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_right_side_non_none_fields() {
        let fmt_base = SpecCellFormat {
            font_name: Some("Tahoma".to_string()),
            font_size: Some(8),
            border: Some(1),
            ..Default::default()
        };
        let fmt_patch = SpecCellFormat {
            font_size: Some(10),
            num_format: Some("0.00%".to_string()),
            ..Default::default()
        };

        let fmt_merged = fmt_base.with_(fmt_patch);

        assert_eq!(fmt_merged.font_name.as_deref(), Some("Tahoma"));
        assert_eq!(fmt_merged.font_size, Some(10));
        assert_eq!(fmt_merged.border, Some(1));
        assert_eq!(fmt_merged.num_format.as_deref(), Some("0.00%"));
    }

    #[test]
    fn test_parse_display_token_covers_operator_table() {
        assert_eq!(
            EnumComparisonOperator::parse_display_token(">"),
            Some(EnumComparisonOperator::GreaterThan)
        );
        assert_eq!(
            EnumComparisonOperator::parse_display_token("≥"),
            Some(EnumComparisonOperator::GreaterOrEqual)
        );
        assert_eq!(
            EnumComparisonOperator::parse_display_token("< x <"),
            Some(EnumComparisonOperator::Between)
        );
        assert_eq!(EnumComparisonOperator::parse_display_token("~"), None);
    }
}

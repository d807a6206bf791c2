//! Stateless helper functions used by the XLSX export kernel.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::conf::{
    N_EPS_BETWEEN_BOUNDS, N_QUANTILE_WIDTH_DATA, N_RATIO_HEADER_DOMINANCE, N_RATIO_WIDTH_DATA,
    N_WIDTH_COL_DATE, N_WIDTH_COL_MAX, N_WIDTH_COL_MIN, N_WIDTH_COL_PADDING, R_ANCHOR_MARKUP,
};
use crate::spec::{
    EnumCellValue, EnumComparisonOperator, SpecColumnDisplayFormat, SpecConditionDescriptor,
    SpecConditionalRule, SpecStyledCell,
};

////////////////////////////////////////////////////////////////////////////////
// #region DisplayFormatTranslation

/// Translate a numeric display-format code into a workbook number format.
///
/// The grammar is closed: percent with one-digit precision, fixed-point with
/// one-digit precision, or the bare integer code. Anything else yields `None`
/// and the cell keeps the general format.
pub fn derive_num_format_from_display_code(code: &str) -> Option<String> {
    if let Some(c_head) = code.strip_suffix('%') {
        let n_precision = c_head.chars().last()?.to_digit(10)? as usize;
        return Some(if n_precision == 0 {
            "0%".to_string()
        } else {
            format!("0.{}%", "0".repeat(n_precision))
        });
    }
    if let Some(c_head) = code.strip_suffix('f') {
        let n_precision = c_head.chars().last()?.to_digit(10)? as usize;
        return Some(if n_precision == 0 {
            "# ##0".to_string()
        } else {
            format!("# ##0.{}", "0".repeat(n_precision))
        });
    }
    if code == "d" {
        return Some("0".to_string());
    }
    None
}

/// Translate a date/time display-format code into a workbook number format.
///
/// Component letters are membership-tested, not positionally parsed, so any
/// letter ordering is accepted.
pub fn derive_date_format_from_display_code(code: &str) -> Option<String> {
    let if_has_date = code.contains('d') && code.contains('m') && code.contains('Y');
    let if_has_time = code.contains('H') && code.contains('M') && code.contains('S');

    if if_has_date && if_has_time {
        return Some("DD.MM.YYYY HH:MM:SS".to_string());
    }
    if if_has_date {
        return Some("DD.MM.YYYY".to_string());
    }
    if if_has_time {
        return Some("HH:MM:SS".to_string());
    }
    None
}

/// Resolve one workbook number format per configured column.
///
/// The numeric directive wins over the time directive when both translate;
/// columns whose directives translate to nothing are omitted entirely.
pub fn plan_column_num_formats(
    column_config: &BTreeMap<String, SpecColumnDisplayFormat>,
) -> BTreeMap<String, String> {
    let mut dict_num_format_by_col = BTreeMap::new();
    for (c_column, display_format) in column_config {
        let num_format = display_format
            .number_format
            .as_deref()
            .and_then(derive_num_format_from_display_code)
            .or_else(|| {
                display_format
                    .time_format
                    .as_deref()
                    .and_then(derive_date_format_from_display_code)
            });
        if let Some(c_num_format) = num_format {
            dict_num_format_by_col.insert(c_column.clone(), c_num_format);
        }
    }
    dict_num_format_by_col
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConditionTranslation

/// Translate raw highlight conditions into workbook-ready rules.
///
/// Unknown operator tokens and descriptors missing their required operands
/// are skipped without error. `between` bounds are nudged inward by
/// [`N_EPS_BETWEEN_BOUNDS`] since the engine primitive is inclusive.
pub fn translate_condition_descriptors(
    descriptors: &[SpecConditionDescriptor],
) -> Vec<SpecConditionalRule> {
    let mut l_rules = Vec::new();
    for descriptor in descriptors {
        let Some(operator) = EnumComparisonOperator::parse_display_token(&descriptor.operator)
        else {
            continue;
        };
        let c_bg_color = descriptor
            .color_scheme
            .strip_prefix('#')
            .unwrap_or(&descriptor.color_scheme)
            .to_string();

        let rule = if operator == EnumComparisonOperator::Between {
            let (Some(n_left), Some(n_right)) =
                (descriptor.target_value_left, descriptor.target_value_right)
            else {
                continue;
            };
            SpecConditionalRule {
                column: descriptor.column.clone(),
                operator,
                operand_first: n_left + N_EPS_BETWEEN_BOUNDS,
                operand_second: Some(n_right - N_EPS_BETWEEN_BOUNDS),
                bg_color: c_bg_color,
            }
        } else {
            let Some(n_target) = descriptor.target_value else {
                continue;
            };
            SpecConditionalRule {
                column: descriptor.column.clone(),
                operator,
                operand_first: n_target,
                operand_second: None,
                bg_color: c_bg_color,
            }
        };
        l_rules.push(rule);
    }
    l_rules
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnWidthEstimation

/// Linear-interpolation quantile over printed cell lengths.
pub fn calculate_length_quantile(l_len_cells: &[usize], quantile: f64) -> Option<f64> {
    if l_len_cells.is_empty() {
        return None;
    }

    let mut l_sorted = l_len_cells.to_vec();
    l_sorted.sort_unstable();

    let n_pos = quantile * (l_sorted.len() - 1) as f64;
    let n_idx_lo = n_pos.floor() as usize;
    let n_idx_hi = n_pos.ceil() as usize;
    let n_lo = l_sorted[n_idx_lo] as f64;
    let n_hi = l_sorted[n_idx_hi] as f64;

    Some(n_lo + (n_hi - n_lo) * (n_pos - n_idx_lo as f64))
}

/// Estimate one column's width in character units.
///
/// Date columns are fixed. Otherwise the 75th percentile of printed lengths
/// (scaled down to discount outliers) is bounded below/above, the header wins
/// when the data width lands within 30% of it, and the result is clamped so
/// the padding can never push past the bounds.
pub fn estimate_column_width(l_len_cells: &[usize], len_header: usize, if_datetime: bool) -> f64 {
    if if_datetime {
        return N_WIDTH_COL_DATE;
    }

    let n_width_data = calculate_length_quantile(l_len_cells, N_QUANTILE_WIDTH_DATA)
        .unwrap_or(0.0)
        * N_RATIO_WIDTH_DATA;
    let n_width_header = len_header as f64;

    let n_width = if n_width_data < N_WIDTH_COL_MIN {
        N_WIDTH_COL_MIN
    } else if n_width_data > N_WIDTH_COL_MAX {
        N_WIDTH_COL_MAX
    } else if n_width_data < n_width_header
        && n_width_data * N_RATIO_HEADER_DOMINANCE > n_width_header
    {
        n_width_header + N_WIDTH_COL_PADDING
    } else {
        n_width_data + N_WIDTH_COL_PADDING
    };

    n_width.clamp(N_WIDTH_COL_MIN, N_WIDTH_COL_MAX)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HyperlinkMarkup

/// Compile the anchor-tag pattern once per export call.
pub fn compile_anchor_pattern() -> Result<Regex, String> {
    Regex::new(R_ANCHOR_MARKUP).map_err(|err| format!("Invalid anchor pattern: {err}"))
}

/// Split anchor markup into `(url, label)`; `None` unless the whole cell
/// text is one anchor tag, so partial or malformed markup stays literal.
pub fn derive_hyperlink_parts(re_anchor: &Regex, text: &str) -> Option<(String, String)> {
    let caps = re_anchor.captures(text)?;
    let m_full = caps.get(0)?;
    if m_full.start() != 0 || m_full.end() != text.len() {
        return None;
    }
    Some((
        caps.get(1)?.as_str().to_string(),
        caps.get(2)?.as_str().to_string(),
    ))
}

/// Collapse every anchor tag to its label text (used for width estimation).
pub fn collapse_anchor_markup(re_anchor: &Regex, text: &str) -> String {
    re_anchor.replace_all(text, "$2").into_owned()
}

/// Compute the styled form of one cell value.
///
/// A cell whose whole text is an anchor tag with an all-digit label becomes a
/// numeric value with a hyperlink target; every other value passes through
/// unchanged. Non-numeric labels keep their literal markup.
pub fn plan_styled_cell(re_anchor: &Regex, value: EnumCellValue) -> SpecStyledCell {
    if let EnumCellValue::String(text) = &value
        && let Some((c_url, c_label)) = derive_hyperlink_parts(re_anchor, text)
        && !c_label.is_empty()
        && c_label.chars().all(|chr| chr.is_ascii_digit())
        && let Ok(n_label) = c_label.parse::<f64>()
    {
        return SpecStyledCell {
            value: EnumCellValue::Number(n_label),
            hyperlink: Some(c_url),
        };
    }

    SpecStyledCell {
        value,
        hyperlink: None,
    }
}

/// Printed form of one cell value, with anchor markup collapsed to its label.
pub fn derive_display_text(re_anchor: &Regex, value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::String(val) => collapse_anchor_markup(re_anchor, val),
        EnumCellValue::Number(val) => val.to_string(),
        EnumCellValue::DateTime(val) => val.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnValidation

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    let mut set_seen = BTreeSet::new();
    let l_duplicates: Vec<&str> = columns
        .iter()
        .filter(|c_name| !set_seen.insert(c_name.as_str()))
        .map(String::as_str)
        .collect();

    if l_duplicates.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Duplicate column names detected: {l_duplicates:?}"
        ))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_num_format_translates_percent_codes() {
        assert_eq!(
            derive_num_format_from_display_code(",.2%").as_deref(),
            Some("0.00%")
        );
        assert_eq!(
            derive_num_format_from_display_code(",.0%").as_deref(),
            Some("0%")
        );
    }

    #[test]
    fn test_derive_num_format_translates_fixed_point_codes() {
        assert_eq!(
            derive_num_format_from_display_code(",.1f").as_deref(),
            Some("# ##0.0")
        );
        assert_eq!(
            derive_num_format_from_display_code(",.3f").as_deref(),
            Some("# ##0.000")
        );
        assert_eq!(
            derive_num_format_from_display_code(",.0f").as_deref(),
            Some("# ##0")
        );
    }

    #[test]
    fn test_derive_num_format_translates_integer_code() {
        assert_eq!(derive_num_format_from_display_code("d").as_deref(), Some("0"));
    }

    #[test]
    fn test_derive_num_format_rejects_unrecognized_codes() {
        assert_eq!(derive_num_format_from_display_code("xyz"), None);
        assert_eq!(derive_num_format_from_display_code(""), None);
        assert_eq!(derive_num_format_from_display_code("%"), None);
        assert_eq!(derive_num_format_from_display_code(".x%"), None);
        assert_eq!(derive_num_format_from_display_code("dd"), None);
    }

    #[test]
    fn test_derive_date_format_prefers_full_datetime() {
        assert_eq!(
            derive_date_format_from_display_code("%d.%m.%Y %H:%M:%S").as_deref(),
            Some("DD.MM.YYYY HH:MM:SS")
        );
        // Membership testing: ordering of component letters is irrelevant.
        assert_eq!(
            derive_date_format_from_display_code("SMHYmd").as_deref(),
            Some("DD.MM.YYYY HH:MM:SS")
        );
    }

    #[test]
    fn test_derive_date_format_handles_date_and_time_only() {
        assert_eq!(
            derive_date_format_from_display_code("%d.%m.%Y").as_deref(),
            Some("DD.MM.YYYY")
        );
        assert_eq!(
            derive_date_format_from_display_code("%H:%M:%S").as_deref(),
            Some("HH:MM:SS")
        );
        assert_eq!(derive_date_format_from_display_code("%Y"), None);
        assert_eq!(derive_date_format_from_display_code(""), None);
    }

    #[test]
    fn test_plan_column_num_formats_skips_untranslatable_directives() {
        let mut dict_config = BTreeMap::new();
        dict_config.insert(
            "ratio".to_string(),
            SpecColumnDisplayFormat {
                number_format: Some(",.2%".to_string()),
                time_format: None,
            },
        );
        dict_config.insert(
            "created".to_string(),
            SpecColumnDisplayFormat {
                number_format: None,
                time_format: Some("%d.%m.%Y".to_string()),
            },
        );
        dict_config.insert(
            "city".to_string(),
            SpecColumnDisplayFormat {
                number_format: Some("weird".to_string()),
                time_format: None,
            },
        );

        let dict_num_format_by_col = plan_column_num_formats(&dict_config);

        assert_eq!(
            dict_num_format_by_col.get("ratio").map(String::as_str),
            Some("0.00%")
        );
        assert_eq!(
            dict_num_format_by_col.get("created").map(String::as_str),
            Some("DD.MM.YYYY")
        );
        assert!(!dict_num_format_by_col.contains_key("city"));
    }

    #[test]
    fn test_translate_condition_descriptors_nudges_between_bounds() {
        let descriptor = SpecConditionDescriptor {
            column: "amount".to_string(),
            operator: "< x <".to_string(),
            target_value_left: Some(10.0),
            target_value_right: Some(20.0),
            color_scheme: "#FFEB84".to_string(),
            ..Default::default()
        };

        let l_rules = translate_condition_descriptors(&[descriptor]);

        assert_eq!(l_rules.len(), 1);
        assert_eq!(l_rules[0].operator, EnumComparisonOperator::Between);
        assert!((l_rules[0].operand_first - 10.0001).abs() < 1e-9);
        assert!((l_rules[0].operand_second.unwrap() - 19.9999).abs() < 1e-9);
        assert_eq!(l_rules[0].bg_color, "FFEB84");
    }

    #[test]
    fn test_translate_condition_descriptors_skips_unknown_and_incomplete() {
        let l_descriptors = vec![
            SpecConditionDescriptor {
                column: "amount".to_string(),
                operator: "~".to_string(),
                target_value: Some(1.0),
                color_scheme: "FF0000".to_string(),
                ..Default::default()
            },
            SpecConditionDescriptor {
                column: "amount".to_string(),
                operator: ">".to_string(),
                target_value: None,
                color_scheme: "FF0000".to_string(),
                ..Default::default()
            },
            SpecConditionDescriptor {
                column: "amount".to_string(),
                operator: "≤".to_string(),
                target_value: Some(5.0),
                color_scheme: "00FF00".to_string(),
                ..Default::default()
            },
        ];

        let l_rules = translate_condition_descriptors(&l_descriptors);

        assert_eq!(l_rules.len(), 1);
        assert_eq!(l_rules[0].operator, EnumComparisonOperator::LessOrEqual);
        assert_eq!(l_rules[0].operand_first, 5.0);
        assert_eq!(l_rules[0].operand_second, None);
    }

    #[test]
    fn test_calculate_length_quantile_interpolates_linearly() {
        assert_eq!(calculate_length_quantile(&[1, 2, 3, 4], 0.75), Some(3.25));
        assert_eq!(calculate_length_quantile(&[7], 0.75), Some(7.0));
        assert_eq!(calculate_length_quantile(&[], 0.75), None);
    }

    #[test]
    fn test_estimate_column_width_floors_short_content() {
        let l_len_cells = vec![5; 40];
        assert_eq!(estimate_column_width(&l_len_cells, 2, false), 12.0);
    }

    #[test]
    fn test_estimate_column_width_ceils_long_content() {
        let l_len_cells = vec![60; 40];
        assert_eq!(estimate_column_width(&l_len_cells, 2, false), 42.0);
    }

    #[test]
    fn test_estimate_column_width_fixed_for_date_columns() {
        let l_len_cells = vec![60; 40];
        assert_eq!(estimate_column_width(&l_len_cells, 30, true), 12.0);
    }

    #[test]
    fn test_estimate_column_width_header_dominates_when_close() {
        // Data width = 16 * 0.75 = 12, header 15: within 30%, header + 2 wins.
        let l_len_cells = vec![16; 40];
        assert_eq!(estimate_column_width(&l_len_cells, 15, false), 17.0);
        // Header 16 is no longer within 30% of the data width.
        assert_eq!(estimate_column_width(&l_len_cells, 16, false), 14.0);
    }

    #[test]
    fn test_estimate_column_width_empty_column_floors() {
        assert_eq!(estimate_column_width(&[], 4, false), 12.0);
    }

    #[test]
    fn test_derive_hyperlink_parts_requires_full_match() {
        let re_anchor = compile_anchor_pattern().unwrap();

        assert_eq!(
            derive_hyperlink_parts(&re_anchor, r#"<a href="http://x">42</a>"#),
            Some(("http://x".to_string(), "42".to_string()))
        );
        assert_eq!(
            derive_hyperlink_parts(&re_anchor, r#"see <a href="http://x">42</a>"#),
            None
        );
        assert_eq!(
            derive_hyperlink_parts(&re_anchor, r#"<a href="http://x">42"#),
            None
        );
    }

    #[test]
    fn test_plan_styled_cell_rewrites_numeric_labels() {
        let re_anchor = compile_anchor_pattern().unwrap();

        let styled = plan_styled_cell(
            &re_anchor,
            EnumCellValue::String(r#"<a href="http://x">42</a>"#.to_string()),
        );

        assert_eq!(styled.value, EnumCellValue::Number(42.0));
        assert_eq!(styled.hyperlink.as_deref(), Some("http://x"));
    }

    #[test]
    fn test_plan_styled_cell_keeps_non_numeric_labels_literal() {
        let re_anchor = compile_anchor_pattern().unwrap();
        let c_markup = r#"<a href="http://x">Label</a>"#.to_string();

        let styled = plan_styled_cell(&re_anchor, EnumCellValue::String(c_markup.clone()));

        assert_eq!(styled.value, EnumCellValue::String(c_markup));
        assert_eq!(styled.hyperlink, None);
    }

    #[test]
    fn test_plan_styled_cell_ignores_partial_markup() {
        let re_anchor = compile_anchor_pattern().unwrap();
        let c_partial = r#"<a href="http://x">broken"#.to_string();

        let styled = plan_styled_cell(&re_anchor, EnumCellValue::String(c_partial.clone()));

        assert_eq!(styled.value, EnumCellValue::String(c_partial));
        assert_eq!(styled.hyperlink, None);
    }

    #[test]
    fn test_collapse_anchor_markup_keeps_label_for_width() {
        let re_anchor = compile_anchor_pattern().unwrap();

        assert_eq!(
            collapse_anchor_markup(&re_anchor, r#"<a href="http://long.example/path">42</a>"#),
            "42"
        );
        assert_eq!(collapse_anchor_markup(&re_anchor, "plain"), "plain");
    }

    #[test]
    fn test_validate_unique_columns_reports_duplicates() {
        assert!(validate_unique_columns(&["a".to_string(), "b".to_string()]).is_ok());
        assert!(
            validate_unique_columns(&["a".to_string(), "b".to_string(), "a".to_string()]).is_err()
        );
    }
}

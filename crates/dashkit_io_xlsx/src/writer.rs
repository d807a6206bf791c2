//! XLSX export kernel that converts a DataFrame into a styled workbook buffer.

use std::collections::BTreeMap;
use std::io::Cursor;

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::{AnyValue, DataFrame, DataType, IpcReader, SerReader, TimeUnit};
use regex::Regex;
use rust_xlsxwriter::{
    ConditionalFormatCell, ConditionalFormatCellRule, Format, FormatAlign, FormatBorder,
    FormatUnderline, Url, Workbook, Worksheet, XlsxError,
};

use crate::spec::{
    EnumCellValue, EnumComparisonOperator, SpecCellFormat, SpecColumnStylePlan,
    SpecConditionalRule, SpecExportRequest, SpecStyledCell, SpecXlsxExportOptions,
};
use crate::util::{
    compile_anchor_pattern, derive_display_text, estimate_column_width, plan_column_num_formats,
    plan_styled_cell, translate_condition_descriptors, validate_unique_columns,
};

/// Stateless exporter producing one styled single-sheet workbook per call.
#[derive(Debug, Clone, Default)]
pub struct XlsxExporter {
    options: SpecXlsxExportOptions,
}

impl XlsxExporter {
    /// Create an exporter bound to presentation presets and the default
    /// datetime format (passed explicitly, never read from ambient state).
    pub fn new(options: SpecXlsxExportOptions) -> Self {
        Self { options }
    }

    /// Export one DataFrame as a complete `.xlsx` byte buffer.
    pub fn export_dataframe(
        &self,
        df: &DataFrame,
        request: &SpecExportRequest,
    ) -> Result<Vec<u8>, String> {
        let l_colnames: Vec<String> = df
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        validate_unique_columns(&l_colnames)?;

        let re_anchor = compile_anchor_pattern()?;
        let n_height_df = df.height();
        let n_width_df = l_colnames.len();

        let dict_num_format_by_col = match &request.column_config {
            Some(column_config) => plan_column_num_formats(column_config),
            None => BTreeMap::new(),
        };
        let l_rules =
            translate_condition_descriptors(request.conditional_formatting.as_deref().unwrap_or(&[]));
        tracing::debug!(
            "Translated {} column formats and {} conditional rules.",
            dict_num_format_by_col.len(),
            l_rules.len()
        );

        let l_col_plans = self.plan_column_styles(df, &dict_num_format_by_col, &re_anchor)?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&self.options.sheet_name)
            .map_err(derive_xlsx_error_text)?;

        self.write_header_row(worksheet, &l_col_plans)?;
        self.write_data_rows(worksheet, df, &l_col_plans, &re_anchor)?;
        apply_conditional_rules(worksheet, &l_colnames, &l_rules, n_height_df)?;

        if n_width_df > 0 {
            worksheet
                .autofilter(0, 0, cast_row_num(n_height_df)?, cast_col_num(n_width_df - 1)?)
                .map_err(derive_xlsx_error_text)?;
        }

        let v_bytes = workbook.save_to_buffer().map_err(derive_xlsx_error_text)?;
        tracing::debug!("Styled export produced {} bytes.", v_bytes.len());
        Ok(v_bytes)
    }

    /// Export from IPC-serialized dataframe bytes.
    ///
    /// `v_ipc_df` must be a valid Polars IPC payload.
    pub fn export_from_ipc_bytes(
        &self,
        v_ipc_df: &[u8],
        request: &SpecExportRequest,
    ) -> Result<Vec<u8>, String> {
        let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
        self.export_dataframe(&df, request)
    }

    /// Build the per-column style plan: width, number format, datetime flag.
    ///
    /// Widths are estimated against anchor-collapsed cell text so markup
    /// characters never skew the estimate. Datetime columns without an
    /// explicit descriptor fall back to the configured default format.
    pub fn plan_column_styles(
        &self,
        df: &DataFrame,
        dict_num_format_by_col: &BTreeMap<String, String>,
        re_anchor: &Regex,
    ) -> Result<Vec<SpecColumnStylePlan>, String> {
        let mut l_plans = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let c_name = col.name().to_string();
            let if_datetime = matches!(col.dtype(), DataType::Date | DataType::Datetime(_, _));

            let num_format = dict_num_format_by_col.get(&c_name).cloned().or_else(|| {
                if_datetime.then(|| self.options.num_format_datetime_default.clone())
            });

            let mut l_len_cells = Vec::new();
            if !if_datetime {
                l_len_cells.reserve(df.height());
                for n_idx_row in 0..df.height() {
                    let value = derive_cell_value_from_any_value(
                        col.get(n_idx_row)
                            .map_err(|err| format!("Failed to access cell value: {err}"))?,
                    );
                    l_len_cells.push(derive_display_text(re_anchor, &value).chars().count());
                }
            }
            let n_width =
                estimate_column_width(&l_len_cells, c_name.chars().count(), if_datetime);

            l_plans.push(SpecColumnStylePlan {
                name: c_name,
                width: n_width,
                num_format,
                if_datetime,
            });
        }
        Ok(l_plans)
    }

    fn write_header_row(
        &self,
        worksheet: &mut Worksheet,
        l_col_plans: &[SpecColumnStylePlan],
    ) -> Result<(), String> {
        let fmt_header = derive_rust_xlsx_format(&self.options.fmt_header);
        worksheet
            .set_row_height(0, self.options.height_row_header)
            .map_err(derive_xlsx_error_text)?;

        for (n_idx_col, plan) in l_col_plans.iter().enumerate() {
            worksheet
                .write_string_with_format(0, cast_col_num(n_idx_col)?, &plan.name, &fmt_header)
                .map_err(derive_xlsx_error_text)?;
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, plan.width)
                .map_err(derive_xlsx_error_text)?;
        }
        Ok(())
    }

    fn write_data_rows(
        &self,
        worksheet: &mut Worksheet,
        df: &DataFrame,
        l_col_plans: &[SpecColumnStylePlan],
        re_anchor: &Regex,
    ) -> Result<(), String> {
        for (n_idx_col, plan) in l_col_plans.iter().enumerate() {
            let patch_num_format = SpecCellFormat {
                num_format: plan.num_format.clone(),
                ..Default::default()
            };
            let fmt_data =
                derive_rust_xlsx_format(&self.options.fmt_body.with_(patch_num_format.clone()));
            let fmt_link =
                derive_rust_xlsx_format(&self.options.fmt_hyperlink.with_(patch_num_format));

            let col = &df.get_columns()[n_idx_col];
            for n_idx_row in 0..df.height() {
                let value_raw = derive_cell_value_from_any_value(
                    col.get(n_idx_row)
                        .map_err(|err| format!("Failed to access cell value: {err}"))?,
                );
                let styled = plan_styled_cell(re_anchor, value_raw);
                write_styled_cell(
                    worksheet,
                    n_idx_row + 1,
                    n_idx_col,
                    &styled,
                    &fmt_data,
                    &fmt_link,
                )?;
            }
        }
        Ok(())
    }
}

/// Attach every translated rule to the data range of its target column.
///
/// Rules naming absent columns are inert; each attached rule stops the
/// engine's evaluation chain on first match.
fn apply_conditional_rules(
    worksheet: &mut Worksheet,
    l_colnames: &[String],
    l_rules: &[SpecConditionalRule],
    n_height_df: usize,
) -> Result<(), String> {
    if n_height_df == 0 {
        return Ok(());
    }

    for rule in l_rules {
        let Some(n_idx_col) = l_colnames.iter().position(|c_name| c_name == &rule.column) else {
            continue;
        };
        let Some(cell_rule) =
            derive_cell_rule(rule.operator, rule.operand_first, rule.operand_second)
        else {
            continue;
        };

        let fmt_fill = Format::new().set_background_color(rule.bg_color.as_str());
        let cond_format = ConditionalFormatCell::new()
            .set_rule(cell_rule)
            .set_format(fmt_fill)
            .set_stop_if_true(true);

        worksheet
            .add_conditional_format(
                1,
                cast_col_num(n_idx_col)?,
                cast_row_num(n_height_df)?,
                cast_col_num(n_idx_col)?,
                &cond_format,
            )
            .map_err(derive_xlsx_error_text)?;
    }
    Ok(())
}

fn derive_cell_rule(
    operator: EnumComparisonOperator,
    operand_first: f64,
    operand_second: Option<f64>,
) -> Option<ConditionalFormatCellRule<f64>> {
    match operator {
        EnumComparisonOperator::GreaterThan => {
            Some(ConditionalFormatCellRule::GreaterThan(operand_first))
        }
        EnumComparisonOperator::LessThan => {
            Some(ConditionalFormatCellRule::LessThan(operand_first))
        }
        EnumComparisonOperator::GreaterOrEqual => {
            Some(ConditionalFormatCellRule::GreaterThanOrEqualTo(operand_first))
        }
        EnumComparisonOperator::LessOrEqual => {
            Some(ConditionalFormatCellRule::LessThanOrEqualTo(operand_first))
        }
        EnumComparisonOperator::Equal => Some(ConditionalFormatCellRule::EqualTo(operand_first)),
        EnumComparisonOperator::NotEqual => {
            Some(ConditionalFormatCellRule::NotEqualTo(operand_first))
        }
        EnumComparisonOperator::Between => {
            operand_second.map(|n_second| ConditionalFormatCellRule::Between(operand_first, n_second))
        }
    }
}

fn write_styled_cell(
    worksheet: &mut Worksheet,
    n_idx_row: usize,
    n_idx_col: usize,
    styled: &SpecStyledCell,
    fmt_data: &Format,
    fmt_link: &Format,
) -> Result<(), String> {
    let n_row = cast_row_num(n_idx_row)?;
    let n_col = cast_col_num(n_idx_col)?;

    if let Some(c_link) = &styled.hyperlink {
        // The engine carries url display text as a string; the numeric label
        // is rendered back without loss for integer labels.
        let c_label = match &styled.value {
            EnumCellValue::Number(val) => val.to_string(),
            EnumCellValue::String(val) => val.clone(),
            EnumCellValue::DateTime(val) => val.to_string(),
            EnumCellValue::None => String::new(),
        };
        worksheet
            .write_url_with_format(n_row, n_col, Url::new(c_link.as_str()).set_text(c_label), fmt_link)
            .map_err(derive_xlsx_error_text)?;
        return Ok(());
    }

    match &styled.value {
        EnumCellValue::None => worksheet.write_blank(n_row, n_col, fmt_data),
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, fmt_data)
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, fmt_data)
        }
        EnumCellValue::DateTime(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, val, fmt_data)
        }
    }
    .map_err(derive_xlsx_error_text)?;
    Ok(())
}

fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, String> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| format!("Failed to read IPC DataFrame bytes: {err}"))
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int128(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        AnyValue::Date(val) => {
            convert_days_to_naive_datetime(val).map_or(EnumCellValue::None, EnumCellValue::DateTime)
        }
        AnyValue::Datetime(val, time_unit, _) => convert_epoch_to_naive_datetime(val, time_unit)
            .map_or(EnumCellValue::None, EnumCellValue::DateTime),
        AnyValue::DatetimeOwned(val, time_unit, _) => {
            convert_epoch_to_naive_datetime(val, time_unit)
                .map_or(EnumCellValue::None, EnumCellValue::DateTime)
        }
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn convert_epoch_to_naive_datetime(n_value: i64, time_unit: TimeUnit) -> Option<NaiveDateTime> {
    let n_units_per_sec: i64 = match time_unit {
        TimeUnit::Nanoseconds => 1_000_000_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Milliseconds => 1_000,
    };
    let n_secs = n_value.div_euclid(n_units_per_sec);
    let n_nanos = (n_value.rem_euclid(n_units_per_sec) * (1_000_000_000 / n_units_per_sec)) as u32;
    DateTime::from_timestamp(n_secs, n_nanos).map(|val| val.naive_utc())
}

fn convert_days_to_naive_datetime(n_days: i32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(i64::from(n_days) * 86_400, 0).map(|val| val.naive_utc())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.underline.unwrap_or(false) {
        format = format.set_underline(FormatUnderline::Single);
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        0 => FormatBorder::None,
        2 => FormatBorder::Medium,
        _ => FormatBorder::Thin,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

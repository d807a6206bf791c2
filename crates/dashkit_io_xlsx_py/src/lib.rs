use std::collections::BTreeMap;

use dashkit_io_xlsx::spec::{
    SpecColumnDisplayFormat, SpecConditionDescriptor, SpecExportRequest, SpecXlsxExportOptions,
};
use dashkit_io_xlsx::XlsxExporter;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes, PyDict, PyList};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "dashkit.xlsx.export.v1";
const C_BRIDGE_TRANSPORT: &str = "polars_ipc";

/// Export one sheet from IPC-serialized dataframe bytes plus the chart
/// request's formatting members, returning the finished workbook bytes.
#[pyfunction]
#[pyo3(signature = (
    v_ipc_df,
    column_config = None,
    conditional_formatting = None,
    num_format_datetime_default = None,
    sheet_name = None
))]
fn export_sheet<'py>(
    py: Python<'py>,
    v_ipc_df: &[u8],
    column_config: Option<&Bound<'py, PyAny>>,
    conditional_formatting: Option<&Bound<'py, PyAny>>,
    num_format_datetime_default: Option<String>,
    sheet_name: Option<String>,
) -> PyResult<Bound<'py, PyBytes>> {
    let mut options = SpecXlsxExportOptions::default();
    if let Some(c_num_format) = num_format_datetime_default {
        options.num_format_datetime_default = c_num_format;
    }
    if let Some(c_sheet_name) = sheet_name {
        options.sheet_name = c_sheet_name;
    }

    let request = SpecExportRequest {
        column_config: parse_column_config(column_config)?,
        conditional_formatting: parse_condition_descriptors(conditional_formatting)?,
    };

    let exporter = XlsxExporter::new(options);
    let v_bytes = exporter
        .export_from_ipc_bytes(v_ipc_df, &request)
        .map_err(PyValueError::new_err)?;

    Ok(PyBytes::new(py, &v_bytes))
}

fn parse_column_config(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<BTreeMap<String, SpecColumnDisplayFormat>>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let dict_config = obj
        .downcast::<PyDict>()
        .map_err(|_| PyValueError::new_err("column_config must be a dict of dicts."))?;

    let mut dict_formats = BTreeMap::new();
    for (key, val) in dict_config.iter() {
        let c_column = key.extract::<String>()?;
        let dict_column = val
            .downcast::<PyDict>()
            .map_err(|_| PyValueError::new_err("column_config values must be dicts."))?;
        dict_formats.insert(
            c_column,
            SpecColumnDisplayFormat {
                number_format: extract_optional_key::<String>(dict_column, "d3NumberFormat")?,
                time_format: extract_optional_key::<String>(dict_column, "d3TimeFormat")?,
            },
        );
    }
    Ok(Some(dict_formats))
}

fn parse_condition_descriptors(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<Vec<SpecConditionDescriptor>>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let list_conditions = obj
        .downcast::<PyList>()
        .map_err(|_| PyValueError::new_err("conditional_formatting must be a list of dicts."))?;

    let mut l_descriptors = Vec::with_capacity(list_conditions.len());
    for item in list_conditions.iter() {
        let dict_condition = item.downcast::<PyDict>().map_err(|_| {
            PyValueError::new_err("conditional_formatting entries must be dicts.")
        })?;
        l_descriptors.push(SpecConditionDescriptor {
            column: extract_optional_key::<String>(dict_condition, "column")?.unwrap_or_default(),
            operator: extract_optional_key::<String>(dict_condition, "operator")?
                .unwrap_or_default(),
            target_value: extract_optional_number(dict_condition, "targetValue")?,
            target_value_left: extract_optional_number(dict_condition, "targetValueLeft")?,
            target_value_right: extract_optional_number(dict_condition, "targetValueRight")?,
            color_scheme: extract_optional_key::<String>(dict_condition, "colorScheme")?
                .unwrap_or_default(),
        });
    }
    Ok(Some(l_descriptors))
}

fn extract_optional_key<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    let Some(val) = dict.get_item(key)? else {
        return Ok(None);
    };
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val.extract::<T>()?))
}

/// Threshold values arrive as numbers or numeric strings depending on the
/// host form; both are accepted.
fn extract_optional_number(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<Option<f64>> {
    let Some(val) = dict.get_item(key)? else {
        return Ok(None);
    };
    if val.is_none() {
        return Ok(None);
    }
    if let Ok(n_val) = val.extract::<f64>() {
        return Ok(Some(n_val));
    }

    let c_val = val.extract::<String>()?;
    c_val
        .trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|err| PyValueError::new_err(format!("{key} must be numeric: {err}")))
}

#[pymodule]
fn _dashkit_io_xlsx_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(export_sheet, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}

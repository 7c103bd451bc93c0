use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::weighting::{io_common::normalize_header, *};

/// Reads a table from an Excel worksheet. The first row is the header.
///
/// Rows where every cell is empty are skipped.
pub fn read_excel_dataset(path: &str, worksheet_name: Option<&str>) -> CliResult<Dataset> {
    let wrange = get_range(path, worksheet_name)?;
    let mut iter = wrange.rows();

    let header_cells = iter.next().context(EmptyExcelSnafu { path })?;
    let header: Vec<String> = header_cells
        .iter()
        .map(cell_to_string)
        .collect::<CliResult<Vec<String>>>()?;
    let columns = normalize_header(&header);
    debug!("read_excel_dataset: {:?}: header: {:?}", path, columns);

    let mut ds = Dataset::new(&columns).context(InvalidDatasetSnafu { path })?;
    for (idx, row) in iter.enumerate() {
        if row.iter().all(|c| matches!(c, DataType::Empty)) {
            debug!("read_excel_dataset: skipping empty row {:?}", idx + 2);
            continue;
        }
        let cells: Vec<String> = row
            .iter()
            .map(cell_to_string)
            .collect::<CliResult<Vec<String>>>()?;
        ds.push_row(cells).context(InvalidDatasetSnafu { path })?;
    }
    Ok(ds)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> CliResult<Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

/// The text of a cell, as it would be displayed.
///
/// Numbers without a fractional part are written as integers: Excel stores
/// most of them as floats.
fn cell_to_string(cell: &DataType) -> CliResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Empty => Ok("".to_string()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        DataType::Error(e) => whatever!("Excel cell error: {:?}", e),
        x => Ok(x.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_as_text() {
        assert_eq!(cell_to_string(&DataType::Float(12.0)).unwrap(), "12");
        assert_eq!(cell_to_string(&DataType::Float(0.25)).unwrap(), "0.25");
        assert_eq!(cell_to_string(&DataType::Int(-3)).unwrap(), "-3");
        assert_eq!(cell_to_string(&DataType::String("A ".to_string())).unwrap(), "A ");
        assert_eq!(cell_to_string(&DataType::Empty).unwrap(), "");
        assert_eq!(cell_to_string(&DataType::Bool(true)).unwrap(), "true");
        assert!(cell_to_string(&DataType::Error(calamine::CellErrorType::Div0)).is_err());
    }

    #[test]
    fn missing_workbook() {
        let path = format!("{}/tests/data/missing.xlsx", env!("CARGO_MANIFEST_DIR"));
        let res = read_excel_dataset(&path, None);
        assert!(matches!(res, Err(CliError::OpeningExcel { .. })));
    }
}

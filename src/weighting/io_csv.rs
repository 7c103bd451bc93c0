// Primitives for reading and writing CSV files.

use std::io::Write;

use crate::weighting::{io_common::normalize_header, *};

/// Reads a CSV file with a header row.
///
/// The cells are kept as they are: only the header is trimmed.
pub fn read_csv_dataset(path: &str) -> CliResult<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let columns = normalize_header(&header);
    debug!("read_csv_dataset: {:?}: header: {:?}", path, columns);

    let mut ds = Dataset::new(&columns).context(InvalidDatasetSnafu { path })?;
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        ds.push_row(cells).context(InvalidDatasetSnafu { path })?;
    }
    Ok(ds)
}

pub fn write_csv_dataset<W: Write>(ds: &Dataset, w: W) -> CliResult<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(ds.columns()).context(CsvWriteSnafu {})?;
    for row in ds.rows() {
        wtr.write_record(row).context(CsvWriteSnafu {})?;
    }
    wtr.flush().context(WritingOutputSnafu { path: "csv output" })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_path(lpath: &str) -> String {
        format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), lpath)
    }

    #[test]
    fn reads_a_sample() {
        let ds = read_csv_dataset(&data_path("poststrat_counts/sample.csv")).unwrap();
        assert_eq!(ds.columns(), &["id".to_string(), "region".to_string()][..]);
        assert_eq!(ds.len(), 100);
        assert_eq!(ds.column("region").unwrap().filter(|r| *r == "A").count(), 60);
    }

    #[test]
    fn missing_file() {
        let res = read_csv_dataset(&data_path("does_not_exist.csv"));
        assert!(matches!(res, Err(CliError::CsvOpen { .. })));
    }

    #[test]
    fn writes_header_and_rows() {
        let ds = Dataset::from_rows(
            &["region".to_string(), "w".to_string()],
            vec![
                vec!["A".to_string(), "0.5".to_string()],
                vec!["B, north".to_string(), "1.25".to_string()],
            ],
        )
        .unwrap();
        let mut buf: Vec<u8> = Vec::new();
        write_csv_dataset(&ds, &mut buf).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert_eq!(s, "region,w\nA,0.5\n\"B, north\",1.25\n");
    }
}

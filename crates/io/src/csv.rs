// CSV/TSV export of the project table

use std::io::Write;
use std::path::Path;

use dbforestale_engine::model::RecordSet;
use dbforestale_engine::summary::{project_table, ParcelSummary};

pub fn export(records: &RecordSet, path: &Path) -> Result<(), String> {
    export_with_delimiter(records, path, b',')
}

pub fn export_tsv(records: &RecordSet, path: &Path) -> Result<(), String> {
    export_with_delimiter(records, path, b'\t')
}

fn export_with_delimiter(records: &RecordSet, path: &Path, delimiter: u8) -> Result<(), String> {
    let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
    write_table(records, file, delimiter)
}

/// Write the project table (header row plus one row per parcel) to `out`.
pub fn write_table<W: Write>(records: &RecordSet, out: W, delimiter: u8) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);

    writer
        .write_record(ParcelSummary::HEADERS)
        .map_err(|e| e.to_string())?;
    for row in project_table(records) {
        writer.write_record(row.columns()).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use dbforestale_engine::model::{Parcel, SpeciesRow};

    fn records() -> RecordSet {
        let mut a = Parcel::new();
        a.form.main_unit = "12".into();
        a.form.sub_unit = "a".into();
        a.form.parcel_area = "3.75".into();
        a.form.species.push(SpeciesRow { species: "Faggio, ceduo".into(), ..Default::default() });
        a.form.last_intervention = "diradamento".into();
        a.form.last_intervention_year = "2019".into();

        RecordSet::from(vec![a, Parcel::new()])
    }

    #[test]
    fn test_csv_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        export(&records(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "main_unit,sub_unit,parcel_area,species,last_intervention,year"
        );
        assert_eq!(lines[1], "12,a,3.7500,\"Faggio, ceduo\",diradamento,2019");
        assert_eq!(
            lines[2],
            "not specified,not specified,not specified,not specified,not specified,not specified"
        );
    }

    #[test]
    fn test_tsv_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        export_tsv(&records(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.lines().nth(1).unwrap().starts_with("12\ta\t3.7500\tFaggio, ceduo\t"));
    }

    #[test]
    fn test_write_table_to_buffer() {
        let mut buf = Vec::new();
        write_table(&RecordSet::new(), &mut buf, b',').unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "main_unit,sub_unit,parcel_area,species,last_intervention,year\n"
        );
    }
}

use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

use tracing::{info, instrument};

use crate::error::Result;
use crate::store::Store;
use crate::structs::Observation;

/// Parses `Time,Asset,APY,Bonus` rows; the header row is required.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Loads a CSV export into the store in a single transaction.
#[instrument(skip(store))]
pub async fn convert(store: &Store, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    let rows = read_csv(file)?;
    info!("read {} rows from {}", rows.len(), path.display());
    store.migrate().await?;
    let written = store.insert_batch(&rows).await?;
    info!("inserted {} rows", written);
    Ok(written)
}

/// Appends rows to a CSV export, writing the header first when the file is new or empty.
pub fn append_csv(path: &Path, rows: &[Observation]) -> Result<()> {
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[test]
pub fn test_read_csv_parses_rows() {
    let data = "Time,Asset,APY,Bonus\n\
                2023-03-14 09:26:53,USDT,0.0512,0.012\n\
                2023-03-14 09:26:53,DAI,0.03,0\n";
    let rows = read_csv(data.as_bytes()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].asset, "USDT");
    assert_eq!(rows[0].apy, 0.0512);
    assert_eq!(rows[0].bonus, 0.012);
    assert_eq!(rows[1].time.timestamp(), 1678786013);
}

#[test]
pub fn test_read_csv_rejects_bad_time() {
    let data = "Time,Asset,APY,Bonus\nyesterday,USDT,0.05,0\n";
    assert!(read_csv(data.as_bytes()).is_err());
}

#[test]
pub fn test_append_csv_writes_header_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apr.csv");
    let t = crate::structs::parse_time("2024-01-02 03:04:05").unwrap();
    append_csv(&path, &[Observation::new(t, "USDT", 0.05, 0.01)]).unwrap();
    append_csv(&path, &[Observation::new(t, "DAI", 0.04, 0.0)]).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.matches("Time,Asset,APY,Bonus").count(), 1);
    let rows = read_csv(text.as_bytes()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].asset, "DAI");
    assert_eq!(rows[0].time, t);
}

#[tokio::test]
pub async fn test_convert_loads_file_into_store() {
    use crate::store::ObservationSource;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binance_apr.csv");
    std::fs::write(
        &path,
        "Time,Asset,APY,Bonus\n\
         2023-03-14 09:00:00,USDT,0.05,0\n\
         2023-03-14 10:00:00,USDT,0.06,0\n\
         2023-03-14 10:00:00,BUSD,0.04,0.01\n",
    )
    .unwrap();
    let store = Store::in_memory().await.unwrap();
    assert_eq!(convert(&store, &path).await.unwrap(), 3);
    let snapshot = store.load_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.asset_count(), 2);
}

//! The file-writing half of the backpressure coupling: receives one record
//! at a time over a bounded channel and encodes it straight to disk.

use std::path::PathBuf;

use export_csv::CsvDialect;
use export_db::Record;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::Receiver;

/// Capacity of the channel between the row-to-record formatter and this
/// writer task. A capacity of one record is what keeps the in-flight bound
/// tight: `send` on a full channel is the producer's drain wait.
pub const CHANNEL_CAPACITY: usize = 1;

/// Write the header and then every record received on `rx`, in order,
/// until the channel closes. Returns the number of bytes written.
pub async fn run(
    path: PathBuf,
    dialect: CsvDialect,
    columns: Vec<&'static str>,
    mut rx: Receiver<Record>,
) -> std::io::Result<u64> {
    let file = File::create(&path).await?;
    let mut out = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    bytes_written += write_header(&mut out, &dialect, &columns).await?;

    while let Some(record) = rx.recv().await {
        bytes_written += write_record(&mut out, &dialect, &record).await?;
    }

    out.flush().await?;
    out.get_ref().sync_all().await?;
    Ok(bytes_written)
}

/// Write only the header line -- used for the `totalRows == 0` special
/// case, which never opens a row source or a channel.
pub async fn write_header_only(
    path: PathBuf,
    dialect: CsvDialect,
    columns: Vec<&'static str>,
) -> std::io::Result<u64> {
    let file = File::create(&path).await?;
    let mut out = BufWriter::new(file);
    let bytes = write_header(&mut out, &dialect, &columns).await?;
    out.flush().await?;
    out.get_ref().sync_all().await?;
    Ok(bytes)
}

async fn write_header<W: AsyncWriteExt + Unpin>(
    out: &mut W,
    dialect: &CsvDialect,
    columns: &[&'static str],
) -> std::io::Result<u64> {
    let mut buf = Vec::new();
    export_csv::write_header(&mut buf, dialect, columns)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;
    out.write_all(&buf).await?;
    Ok(buf.len() as u64)
}

async fn write_record<W: AsyncWriteExt + Unpin>(
    out: &mut W,
    dialect: &CsvDialect,
    record: &Record,
) -> std::io::Result<u64> {
    let fields: Vec<Option<&str>> = record.iter().map(|f| f.as_deref()).collect();
    let mut buf = Vec::new();
    export_csv::write_record(&mut buf, dialect, &fields)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;
    out.write_all(&buf).await?;
    Ok(buf.len() as u64)
}

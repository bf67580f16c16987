use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use crate::error::Result;

/// Downloads a CSV file to `path` and returns the path.
pub fn download_csv_file(url: &str, path: impl AsRef<Path>) -> Result<String> {
    info!(url, "downloading CSV file");

    // get the response from the URL
    let response = reqwest::blocking::get(url)?.error_for_status()?;

    // Copy these bytes to a file on disk
    let bytes = response.bytes()?;
    std::fs::write(path.as_ref(), bytes)?;

    Ok(path.as_ref().display().to_string())
}

/// Reads a CSV with a header row. Empty fields and `NA` are nulls.
pub fn load_csv_file(path: impl AsRef<Path>) -> Result<DataFrame> {
    let df = CsvReader::from_path(path.as_ref())?
        .has_header(true)
        .with_null_values(Some(NullValues::AllColumnsSingle("NA".to_string())))
        .finish()?;

    info!(rows = df.height(), columns = df.width(), "loaded CSV file");
    debug!("{:?}", df.head(Some(5)));

    Ok(df)
}

pub fn write_csv_file(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).finish(df)?;
    info!(path = %path.as_ref().display(), rows = df.height(), "wrote CSV file");
    Ok(())
}

/// Shuffles `0..n` with a fixed seed and splits it into (train, test) row
/// indices, `test_size` being the held-out fraction.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    // generate vector from 0 to # of rows
    let mut indices: Vec<usize> = (0..n).collect();

    // shuffle indices
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    // split the indices into training and testing
    let n_test = ((n as f64) * test_size.clamp(0.0, 1.0)).round() as usize;
    let test = indices.split_off(n - n_test);

    (indices, test)
}

//! Gzip + NetCDF-3 decoding for the DSCOVR and GOES products.
//!
//! `netcdf3` reads from a path, so the decompressed payload is spooled to a
//! temporary file first. Decoding is blocking and runs on the blocking pool.

use flate2::read::GzDecoder;
use netcdf3::{DataVector, FileReader};
use std::io::{Read, Write};

use super::TransportError;

const HDF5_MAGIC: &[u8] = b"\x89HDF\r\n\x1a\n";

/// Decompress a gzip payload.
pub(crate) fn gunzip(compressed: &[u8], what: &str) -> Result<Vec<u8>, TransportError> {
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| TransportError::parse(what, format!("gzip: {e}")))?;
    Ok(out)
}

/// Read the named variables from a NetCDF-3 file image, flattened to `f64`.
///
/// Multi-dimensional variables come back in row-major order.
pub(crate) fn read_variables(
    image: &[u8],
    names: &[&str],
    what: &str,
) -> Result<Vec<Vec<f64>>, TransportError> {
    check_classic_header(image, what)?;

    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(image)?;
    file.flush()?;

    let mut reader = FileReader::open(file.path())
        .map_err(|e| TransportError::parse(what, format!("netcdf open: {e:?}")))?;

    names
        .iter()
        .map(|name| {
            reader
                .read_var(name)
                .map(to_f64)
                .map_err(|e| TransportError::parse(what, format!("variable '{name}': {e:?}")))
        })
        .collect()
}

/// Accept `CDF\x01` (classic) and `CDF\x02` (64-bit offset) images only.
fn check_classic_header(image: &[u8], what: &str) -> Result<(), TransportError> {
    let unsupported = |format| TransportError::UnsupportedFormat {
        what: what.to_string(),
        format,
    };
    match image {
        [b'C', b'D', b'F', 1 | 2, ..] => Ok(()),
        [b'C', b'D', b'F', 5, ..] => Err(unsupported("NetCDF CDF-5")),
        _ if image.starts_with(HDF5_MAGIC) => Err(unsupported("NetCDF-4/HDF5")),
        _ => Err(TransportError::parse(what, "missing NetCDF header")),
    }
}

/// Decode on the blocking pool.
pub(crate) async fn decode_gzip_variables(
    compressed: Vec<u8>,
    names: &'static [&'static str],
    what: String,
) -> Result<Vec<Vec<f64>>, TransportError> {
    tokio::task::spawn_blocking(move || {
        let image = gunzip(&compressed, &what)?;
        read_variables(&image, names, &what)
    })
    .await
    .map_err(|e| TransportError::Task(e.to_string()))?
}

fn to_f64(data: DataVector) -> Vec<f64> {
    match data {
        DataVector::I8(v) => v.into_iter().map(f64::from).collect(),
        DataVector::U8(v) => v.into_iter().map(f64::from).collect(),
        DataVector::I16(v) => v.into_iter().map(f64::from).collect(),
        DataVector::I32(v) => v.into_iter().map(f64::from).collect(),
        DataVector::F32(v) => v.into_iter().map(f64::from).collect(),
        DataVector::F64(v) => v,
    }
}

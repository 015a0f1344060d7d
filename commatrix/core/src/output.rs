//! Matrix output encodings.

use crate::{
    custom::Format,
    entity::Matrix,
    error::{EncodeError, Error},
};

/// Encodes the matrix under the given format.
pub fn encode(matrix: &Matrix, format: Format) -> Result<Vec<u8>, Error> {
    match format {
        Format::Json => to_json(matrix),
        Format::Yaml => to_yaml(matrix),
        Format::Csv => to_csv(matrix),
    }
}

/// Renders the matrix as a JSON array of flow records.
pub fn to_json(matrix: &Matrix) -> Result<Vec<u8>, Error> {
    serde_json::to_vec_pretty(matrix).map_err(|source| encode_error(Format::Json, source.into()))
}

/// Renders the matrix as a YAML sequence of flow records.
pub fn to_yaml(matrix: &Matrix) -> Result<Vec<u8>, Error> {
    serde_yaml::to_string(matrix)
        .map(String::into_bytes)
        .map_err(|source| encode_error(Format::Yaml, source.into()))
}

/// Renders the matrix as CSV: a header row of the field names, one data row
/// per record.
pub fn to_csv(matrix: &Matrix) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    let mut writer = csv::Writer::from_writer(&mut buf);
    for flow in &matrix.flows {
        writer
            .serialize(flow)
            .map_err(|source| encode_error(Format::Csv, source.into()))?;
    }
    writer
        .flush()
        .map_err(|source| encode_error(Format::Csv, source.into()))?;
    drop(writer);
    Ok(buf)
}

fn encode_error(format: Format, source: EncodeError) -> Error {
    Error::Encode { format, source }
}

use tracing::debug;

use super::result_set::ResultValue;
use super::row::{ResolvedColumn, Row, build_row};
use crate::driver::DataReader;
use crate::error::SqlDispatchError;

/// Drain every result set of `reader` into memory.
///
/// Result sets are kept even when empty. Any error aborts the whole call and
/// the rows read so far are dropped.
///
/// # Errors
/// Returns `SqlDispatchError::UnrecognizedNativeType` for an unmapped column type,
/// or the driver's error if advancing the reader fails.
pub async fn materialize(
    mut reader: Box<dyn DataReader + '_>,
) -> Result<ResultValue, SqlDispatchError> {
    let mut result_sets: Vec<Vec<Row>> = Vec::new();

    while let Some(metadata) = reader.next_result().await? {
        let columns = metadata
            .iter()
            .map(ResolvedColumn::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        while let Some(values) = reader.next_row().await? {
            rows.push(build_row(&columns, values));
        }
        debug!(
            result_set = result_sets.len(),
            rows = rows.len(),
            "drained result set"
        );
        result_sets.push(rows);
    }

    Ok(ResultValue::from_result_sets(result_sets))
}

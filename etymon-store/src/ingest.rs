//! Validation and extraction of the partition's Arrow columns.
use arrow_array::{Array, ArrayRef, FixedSizeBinaryArray, FixedSizeListArray, Float32Array};
use arrow_schema::{DataType, Field};

use crate::errors::StoreError;

pub(crate) fn validate_fixed_size_list_field(
    field: &Field,
    column: &str,
) -> Result<usize, StoreError> {
    match field.data_type() {
        DataType::FixedSizeList(child, width) => {
            if field.is_nullable() || child.is_nullable() {
                return Err(StoreError::NullableField {
                    column: column.to_owned(),
                });
            }
            if child.data_type() != &DataType::Float32 {
                return Err(StoreError::InvalidColumnType {
                    column: column.to_owned(),
                    expected: "FixedSizeList<Float32, _>",
                    actual: field.data_type().clone(),
                });
            }
            usize::try_from(*width).map_err(|_| StoreError::InvalidDimension { actual: *width })
        }
        other => Err(StoreError::InvalidColumnType {
            column: column.to_owned(),
            expected: "FixedSizeList<Float32, _>",
            actual: other.clone(),
        }),
    }
}

pub(crate) fn validate_fixed_size_binary_field(
    field: &Field,
    column: &str,
    width: usize,
) -> Result<(), StoreError> {
    match field.data_type() {
        DataType::FixedSizeBinary(actual) if usize::try_from(*actual).ok() == Some(width) => Ok(()),
        other => Err(StoreError::InvalidColumnType {
            column: column.to_owned(),
            expected: "FixedSizeBinary of the declared width",
            actual: other.clone(),
        }),
    }
}

pub(crate) fn as_fixed_size_binary<'a>(
    array: &'a ArrayRef,
    column: &str,
) -> Result<&'a FixedSizeBinaryArray, StoreError> {
    array
        .as_any()
        .downcast_ref::<FixedSizeBinaryArray>()
        .ok_or_else(|| StoreError::InvalidColumnType {
            column: column.to_owned(),
            expected: "FixedSizeBinary",
            actual: array.data_type().clone(),
        })
}

pub(crate) fn as_fixed_size_list<'a>(
    array: &'a ArrayRef,
    column: &str,
) -> Result<&'a FixedSizeListArray, StoreError> {
    array
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| StoreError::InvalidColumnType {
            column: column.to_owned(),
            expected: "FixedSizeList<Float32, _>",
            actual: array.data_type().clone(),
        })
}

/// Copies every row of `array` into `out` as 0/1 bytes.
///
/// `start_row` offsets the row numbers reported in errors so they refer to
/// the whole partition rather than the current batch.
pub(crate) fn append_binary_rows(
    array: &FixedSizeListArray,
    dimension: usize,
    start_row: usize,
    out: &mut Vec<Vec<u8>>,
) -> Result<(), StoreError> {
    let value_length = array.value_length();
    if usize::try_from(value_length).ok() != Some(dimension) {
        return Err(StoreError::InvalidDimension {
            actual: value_length,
        });
    }
    out.reserve(array.len());
    for row_index in 0..array.len() {
        let row = start_row + row_index;
        if array.is_null(row_index) {
            return Err(StoreError::NullRow {
                column: crate::store::FEATURE_MATRIX.to_owned(),
                row,
            });
        }
        let values = array.value(row_index);
        let floats = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| StoreError::InvalidColumnType {
                column: crate::store::FEATURE_MATRIX.to_owned(),
                expected: "FixedSizeList<Float32, _>",
                actual: values.data_type().clone(),
            })?;
        if let Some(value_index) = (0..floats.len()).find(|&index| floats.is_null(index)) {
            return Err(StoreError::NullValue { row, value_index });
        }
        let binary = floats
            .values()
            .iter()
            .enumerate()
            .map(|(value_index, &value)| to_binary(value).ok_or(StoreError::NonBinaryValue {
                row,
                value_index,
                value,
            }))
            .collect::<Result<Vec<u8>, _>>()?;
        out.push(binary);
    }
    Ok(())
}

fn to_binary(value: f32) -> Option<u8> {
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

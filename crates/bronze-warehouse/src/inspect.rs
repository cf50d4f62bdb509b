//! Target-table reflection.

use tracing::debug;

use bronze_model::{DatasetConfig, TableRef, TargetTable, WarehouseError};

use crate::{Result, Warehouse};

/// Reflects `table` from the catalog and attaches the configured unique
/// constraint of `dataset`.
pub fn inspect_target<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    table: &TableRef,
    dataset: Option<&DatasetConfig>,
) -> Result<TargetTable> {
    let columns = warehouse.describe_table(table)?;
    if columns.is_empty() {
        return Err(WarehouseError::TableNotFound {
            table: table.to_string(),
        });
    }
    debug!(
        table = %table,
        columns = columns.len(),
        primary_key = columns.iter().filter(|column| column.is_primary_key).count(),
        "reflected target table"
    );
    let target = TargetTable::new(table.clone(), columns);
    Ok(match dataset {
        Some(config) => target
            .with_unique_columns(config.unique_columns.iter().cloned())
            .with_nullable_unique_columns(config.nullable_unique_columns.iter().cloned()),
        None => target,
    })
}

use polars::prelude::{col, lit, DataFrame, IntoLazy, UniqueKeepStrategy};
use std::collections::BTreeMap;

/// Partition the [`DataFrame`] by the unique values of a string column.
///
/// Returns the sub-frame for each value, keyed by that value.
pub fn partition_by_column(
    data_frame: &DataFrame,
    column: &str,
) -> anyhow::Result<BTreeMap<String, DataFrame>> {
    let keys = data_frame
        .clone()
        .lazy()
        .select([col(column)])
        .unique(Some(vec![column.to_string()]), UniqueKeepStrategy::Any)
        .collect()?;

    let mut partitioned = BTreeMap::new();
    for key in keys.column(column)?.str()?.into_iter().flatten() {
        log::debug!("Partition for {column}={key}");

        let filtered = data_frame
            .clone()
            .lazy()
            .filter(col(column).eq(lit(key)))
            .collect()?;
        partitioned.insert(key.to_string(), filtered);
    }

    Ok(partitioned)
}

//! Layer name to table name mapping.

use arcrest_core_common::{DestinationStore, StoreResult};

/// Turns a layer display name into a candidate table identifier.
///
/// Spaces and hyphens become underscores and every other character that is
/// neither alphanumeric nor an underscore is dropped. Reserved words, length
/// limits and collisions are left to the destination container.
///
/// ```
/// use arcrest_core::sanitize::sanitize;
///
/// assert_eq!(sanitize("Flood Zones - 100yr (2020)"), "Flood_Zones___100yr_2020");
/// assert_eq!(sanitize("Parcels"), "Parcels");
/// ```
#[must_use]
pub fn sanitize(raw_name: &str) -> String {
    raw_name
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' => Some('_'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Sanitizes a layer name and lets the container validate it into a legal,
/// unused table name.
///
/// # Errors
///
/// Returns the container's error if it cannot inspect its existing tables.
pub async fn table_name_for(store: &dyn DestinationStore, raw_name: &str) -> StoreResult<String> {
    store.validate_table_name(&sanitize(raw_name)).await
}

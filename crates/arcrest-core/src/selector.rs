//! Layer selection.

use std::collections::BTreeSet;

use crate::types::LayerDescriptor;

/// Reduces the service's layer list to the requested ids.
///
/// The result keeps the service order, not the request order. Requested ids
/// the service does not have are skipped without error. `None` selects every
/// layer.
///
/// ```
/// use std::collections::BTreeSet;
/// use arcrest_core::selector::select;
/// use arcrest_core::types::LayerDescriptor;
///
/// let layers = vec![LayerDescriptor::new(0, "Roads"), LayerDescriptor::new(1, "Parcels")];
/// let requested: BTreeSet<i64> = [1, 42].into_iter().collect();
///
/// let selected = select(&layers, Some(&requested));
/// assert_eq!(selected.len(), 1);
/// assert_eq!(selected[0].name, "Parcels");
/// ```
#[must_use]
pub fn select(all_layers: &[LayerDescriptor], requested_ids: Option<&BTreeSet<i64>>) -> Vec<LayerDescriptor> {
    match requested_ids {
        None => all_layers.to_vec(),
        Some(ids) => all_layers
            .iter()
            .filter(|layer| ids.contains(&layer.id))
            .cloned()
            .collect(),
    }
}

/// Requested ids the service does not have.
#[must_use]
pub fn unmatched_ids(all_layers: &[LayerDescriptor], requested_ids: &BTreeSet<i64>) -> Vec<i64> {
    requested_ids
        .iter()
        .copied()
        .filter(|id| !all_layers.iter().any(|layer| layer.id == *id))
        .collect()
}

//! Tag-association reconciliation.
//!
//! Given a product's persisted join rows and a desired tag set, compute the minimal
//! change (rows to delete, tag ids to insert) and apply it through an
//! [`AssociationGateway`]. Creation-time attachment is the degenerate case with no prior
//! rows and shares the same bulk-insert primitive.
//!
//! The functions here do not open transactions. Callers that need the read-diff-apply
//! sequence to be atomic run them against a gateway bound to a transaction (see
//! `plugins::products`), so a failure in either mutation rolls both back.

use crate::core::error::CatalogError;
use crate::core::gateway::AssociationGateway;
use crate::core::model::{Association, NewAssociation, ProductId, ProductTag, RowId, TagId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimal change set turning current associations into the desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Desired tag ids with no current row, ascending.
    pub to_add: Vec<TagId>,
    /// Row ids whose tag is no longer desired, in current-row order.
    pub to_remove: Vec<RowId>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// What a reconcile or attach call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub removed: usize,
    pub removed_row_ids: Vec<RowId>,
    pub added: Vec<ProductTag>,
}

pub fn diff_associations(current: &[Association], desired: &BTreeSet<TagId>) -> TagDiff {
    let current_tag_ids: BTreeSet<TagId> = current.iter().map(|a| a.tag_id).collect();
    let to_add = desired.difference(&current_tag_ids).copied().collect();
    let to_remove = current
        .iter()
        .filter(|a| !desired.contains(&a.tag_id))
        .map(|a| a.id)
        .collect();
    TagDiff { to_add, to_remove }
}

/// Make the persisted tag set of `product_id` equal `desired`.
///
/// Duplicates in `desired` collapse. Gateway errors propagate unchanged; nothing here
/// retries or compensates.
pub fn reconcile<G, I>(
    gateway: &G,
    product_id: ProductId,
    desired: I,
) -> Result<ReconcileOutcome, CatalogError>
where
    G: AssociationGateway + ?Sized,
    I: IntoIterator<Item = TagId>,
{
    let desired: BTreeSet<TagId> = desired.into_iter().collect();
    let current = gateway.find_associations(product_id)?;
    let diff = diff_associations(&current, &desired);
    apply_diff(gateway, product_id, diff)
}

/// Attach tags to a product that has no associations yet (creation time).
pub fn attach_tags<G, I>(
    gateway: &G,
    product_id: ProductId,
    tag_ids: I,
) -> Result<ReconcileOutcome, CatalogError>
where
    G: AssociationGateway + ?Sized,
    I: IntoIterator<Item = TagId>,
{
    let to_add: BTreeSet<TagId> = tag_ids.into_iter().collect();
    apply_diff(
        gateway,
        product_id,
        TagDiff {
            to_add: to_add.into_iter().collect(),
            to_remove: Vec::new(),
        },
    )
}

fn apply_diff<G>(
    gateway: &G,
    product_id: ProductId,
    diff: TagDiff,
) -> Result<ReconcileOutcome, CatalogError>
where
    G: AssociationGateway + ?Sized,
{
    if diff.is_empty() {
        return Ok(ReconcileOutcome::default());
    }

    // Disjoint row sets; deleting first keeps the (product_id, tag_id) uniqueness
    // constraint satisfied at every step.
    let removed = if diff.to_remove.is_empty() {
        0
    } else {
        gateway.bulk_delete_associations(&diff.to_remove)?
    };

    let rows: Vec<NewAssociation> = diff
        .to_add
        .iter()
        .map(|&tag_id| NewAssociation { product_id, tag_id })
        .collect();
    let added = if rows.is_empty() {
        Vec::new()
    } else {
        gateway.bulk_insert_associations(&rows)?
    };

    Ok(ReconcileOutcome {
        removed,
        removed_row_ids: diff.to_remove,
        added,
    })
}

//! End-to-end catalog behavior over the in-memory store: ordinal density,
//! cascade deletes, duplication, reorder sessions and archive filtering,
//! plus partial-failure manifests under an injected store outage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bidcat_catalog::{BidCatalog, CatalogError, ReorderTarget, SessionState, COPY_SUFFIX};
use bidcat_core::{
    BidTypePatch, FieldType, LineItemType, NewBidCategory, NewBidLineItem, NewBidLineItemField,
    NewBidType,
};
use bidcat_store::{CatalogStore, Filter, MemStore, OrderBy, Row, StoreError, Table};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
enum Fault {
    Unavailable,
    Timeout,
}

/// Store wrapper that lets a fixed number of writes (insert, update,
/// delete) through to the inner store, then fails every further write.
/// Reads always pass through.
struct FlakyStore {
    inner: Arc<MemStore>,
    writes_left: AtomicUsize,
    fault: Fault,
}

impl FlakyStore {
    fn new(inner: Arc<MemStore>, writes_left: usize, fault: Fault) -> Self {
        Self {
            inner,
            writes_left: AtomicUsize::new(writes_left),
            fault,
        }
    }

    fn take_budget(&self) -> Result<(), StoreError> {
        let taken = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            });
        match (taken, self.fault) {
            (Ok(_), _) => Ok(()),
            (Err(_), Fault::Unavailable) => {
                Err(StoreError::Unavailable("injected outage".to_string()))
            }
            (Err(_), Fault::Timeout) => Err(StoreError::Timeout(Duration::from_secs(1))),
        }
    }
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn select(
        &self,
        table: Table,
        filters: &[Filter],
        order_by: &[OrderBy],
    ) -> Result<Vec<Row>, StoreError> {
        self.inner.select(table, filters, order_by).await
    }

    async fn insert(&self, table: Table, fields: Row) -> Result<Row, StoreError> {
        self.take_budget()?;
        self.inner.insert(table, fields).await
    }

    async fn update(&self, table: Table, id: Uuid, fields: Row) -> Result<Row, StoreError> {
        self.take_budget()?;
        self.inner.update(table, id, fields).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), StoreError> {
        self.take_budget()?;
        self.inner.delete(table, id).await
    }
}

fn catalog() -> BidCatalog {
    BidCatalog::new(Arc::new(MemStore::new()))
}

fn new_type(name: &str) -> NewBidType {
    NewBidType {
        name: name.to_string(),
        ..Default::default()
    }
}

fn new_category(name: &str) -> NewBidCategory {
    NewBidCategory {
        name: name.to_string(),
        ..Default::default()
    }
}

fn new_line_item(name: &str) -> NewBidLineItem {
    NewBidLineItem {
        name: name.to_string(),
        line_item_type: LineItemType::LaborMaterialCombo,
        show_on_worksheet: true,
        show_on_workorder: true,
        retail_formula: "qty * rate".to_string(),
        ..Default::default()
    }
}

fn new_field(name: &str) -> NewBidLineItemField {
    NewBidLineItemField {
        field_name: name.to_string(),
        field_type: FieldType::Number,
        ..Default::default()
    }
}

/// Seeds one bid type with `categories` categories, each holding `items`
/// line items, each holding `fields` fields. Returns the bid type id.
async fn seed_tree(
    catalog: &BidCatalog,
    categories: usize,
    items: usize,
    fields: usize,
) -> anyhow::Result<Uuid> {
    let bid_type = catalog.create_bid_type(new_type("Tile")).await?;
    for c in 0..categories {
        let category = catalog
            .create_bid_category(bid_type.id, new_category(&format!("Category {c}")))
            .await?;
        for i in 0..items {
            let line_item = catalog
                .create_bid_line_item(category.id, new_line_item(&format!("Item {c}.{i}")))
                .await?;
            for f in 0..fields {
                catalog
                    .create_bid_line_item_field(line_item.id, new_field(&format!("Qty {c}.{i}.{f}")))
                    .await?;
            }
        }
    }
    Ok(bid_type.id)
}

#[tokio::test]
async fn creates_append_dense_ordinals_counting_archived_siblings() -> anyhow::Result<()> {
    let catalog = catalog();
    let a = catalog.create_bid_type(new_type("Tile")).await?;
    let b = catalog.create_bid_type(new_type("Roofing")).await?;
    let c = catalog.create_bid_type(new_type("Paint")).await?;
    assert_eq!((a.sort_order, b.sort_order, c.sort_order), (0, 1, 2));

    // Archived siblings keep their ordinal slot.
    catalog.set_bid_type_archived(b.id, true).await?;
    let d = catalog.create_bid_type(new_type("Decking")).await?;
    assert_eq!(d.sort_order, 3);

    let visible = catalog.list_bid_types(false).await?;
    assert_eq!(
        visible.iter().map(|t| t.sort_order).collect::<Vec<_>>(),
        vec![0, 2, 3]
    );
    Ok(())
}

#[tokio::test]
async fn delete_resequences_surviving_siblings() -> anyhow::Result<()> {
    let catalog = catalog();
    let a = catalog.create_bid_type(new_type("Tile")).await?;
    let b = catalog.create_bid_type(new_type("Roofing")).await?;
    let c = catalog.create_bid_type(new_type("Paint")).await?;

    catalog.delete_bid_type(b.id).await?;

    let remaining = catalog.list_bid_types(true).await?;
    assert_eq!(
        remaining.iter().map(|t| (t.id, t.sort_order)).collect::<Vec<_>>(),
        vec![(a.id, 0), (c.id, 1)]
    );

    // Deleting again reports the missing root.
    match catalog.delete_bid_type(b.id).await {
        Err(CatalogError::NotFound { table, id }) => {
            assert_eq!(table, Table::BidTypes);
            assert_eq!(id, b.id);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn cascade_delete_removes_every_descendant() -> anyhow::Result<()> {
    let catalog = catalog();
    let doomed = seed_tree(&catalog, 2, 2, 2).await?;
    let survivor = catalog.create_bid_type(new_type("Roofing")).await?;

    let categories = catalog.list_bid_categories(doomed, true).await?;
    let line_items = catalog.list_bid_line_items(categories[0].id, true).await?;

    catalog.delete_bid_type(doomed).await?;

    assert!(matches!(
        catalog.get_bid_type(doomed).await,
        Err(CatalogError::NotFound { .. })
    ));
    assert!(matches!(
        catalog.get_bid_category(categories[0].id).await,
        Err(CatalogError::NotFound { .. })
    ));
    assert!(matches!(
        catalog.get_bid_line_item(line_items[0].id).await,
        Err(CatalogError::NotFound { .. })
    ));

    // The unrelated sibling is untouched and re-densified to the front.
    let remaining = catalog.list_bid_types(true).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, survivor.id);
    assert_eq!(remaining[0].sort_order, 0);
    Ok(())
}

#[tokio::test]
async fn create_under_missing_parent_is_rejected() -> anyhow::Result<()> {
    let catalog = catalog();
    let ghost = Uuid::new_v4();
    match catalog.create_bid_category(ghost, new_category("Floors")).await {
        Err(CatalogError::ParentNotFound { table, id }) => {
            assert_eq!(table, Table::BidTypes);
            assert_eq!(id, ghost);
        }
        other => panic!("expected ParentNotFound, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_produces_independent_unarchived_clone() -> anyhow::Result<()> {
    let catalog = catalog();
    let source_id = seed_tree(&catalog, 1, 1, 2).await?;

    // Archive one descendant; the clone must still carry it, unarchived.
    let category = catalog.list_bid_categories(source_id, true).await?.remove(0);
    let line_item = catalog.list_bid_line_items(category.id, true).await?.remove(0);
    let field = catalog
        .list_bid_line_item_fields(line_item.id, true)
        .await?
        .remove(0);
    catalog
        .set_bid_line_item_field_archived(field.id, true)
        .await?;

    let clone_id = catalog.duplicate_bid_type(source_id).await?;
    assert_ne!(clone_id, source_id);

    let source = catalog.get_bid_type(source_id).await?;
    let clone = catalog.get_bid_type(clone_id).await?;
    assert_eq!(clone.name, format!("{}{COPY_SUFFIX}", source.name));
    assert!(!clone.is_archived);
    assert_eq!(clone.sort_order, source.sort_order + 1);

    let clone_tree = catalog.load_bid_type(clone_id, true).await?;
    assert_eq!(clone_tree.categories.len(), 1);
    assert_eq!(clone_tree.categories[0].line_items.len(), 1);
    let cloned_fields = &clone_tree.categories[0].line_items[0].fields;
    assert_eq!(cloned_fields.len(), 2);
    assert!(cloned_fields.iter().all(|f| !f.is_archived));
    assert!(cloned_fields.iter().all(|f| f.id != field.id));

    // Mutating the clone leaves the source untouched.
    catalog
        .update_bid_type(
            clone_id,
            BidTypePatch {
                name: Some("Stone".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(catalog.get_bid_type(source_id).await?.name, "Tile");

    let source_tree = catalog.load_bid_type(source_id, true).await?;
    assert_eq!(source_tree.categories[0].line_items[0].fields.len(), 2);
    Ok(())
}

#[tokio::test]
async fn reorder_commits_dense_permutation() -> anyhow::Result<()> {
    let catalog = catalog();
    let a = catalog.create_bid_type(new_type("A")).await?;
    let b = catalog.create_bid_type(new_type("B")).await?;
    let c = catalog.create_bid_type(new_type("C")).await?;

    let report = catalog
        .reorder(ReorderTarget::BidTypes, vec![c.id, a.id, b.id])
        .await?;
    assert!(report.is_committed());
    assert_eq!(report.applied.len(), 3);
    assert!(report.failed.is_none());
    assert!(report.skipped.is_empty());

    let listed = catalog.list_bid_types(true).await?;
    assert_eq!(
        listed.iter().map(|t| (t.id, t.sort_order)).collect::<Vec<_>>(),
        vec![(c.id, 0), (a.id, 1), (b.id, 2)]
    );

    // Round trip back to the original order.
    let report = catalog
        .reorder(ReorderTarget::BidTypes, vec![a.id, b.id, c.id])
        .await?;
    assert!(report.is_committed());
    let listed = catalog.list_bid_types(true).await?;
    assert_eq!(
        listed.iter().map(|t| (t.id, t.sort_order)).collect::<Vec<_>>(),
        vec![(a.id, 0), (b.id, 1), (c.id, 2)]
    );
    Ok(())
}

#[tokio::test]
async fn reorder_rejects_non_permutations_without_writing() -> anyhow::Result<()> {
    let catalog = catalog();
    let bid_type = catalog.create_bid_type(new_type("Tile")).await?;
    let a = catalog
        .create_bid_category(bid_type.id, new_category("A"))
        .await?;
    let b = catalog
        .create_bid_category(bid_type.id, new_category("B"))
        .await?;
    catalog.set_bid_category_archived(b.id, true).await?;

    // Archived siblings are still part of the ordinal set, so a proposal
    // covering only the visible ones is not a permutation.
    match catalog
        .reorder(ReorderTarget::CategoriesOf(bid_type.id), vec![a.id])
        .await
    {
        Err(CatalogError::OrderMismatch(mismatch)) => {
            assert_eq!(mismatch.missing, vec![b.id]);
            assert!(mismatch.unexpected.is_empty());
        }
        other => panic!("expected OrderMismatch, got {other:?}"),
    }

    // Nothing was persisted.
    let listed = catalog.list_bid_categories(bid_type.id, true).await?;
    assert_eq!(
        listed.iter().map(|cat| (cat.id, cat.sort_order)).collect::<Vec<_>>(),
        vec![(a.id, 0), (b.id, 1)]
    );

    match catalog
        .reorder(ReorderTarget::CategoriesOf(Uuid::new_v4()), vec![])
        .await
    {
        Err(CatalogError::ParentNotFound { .. }) => {}
        other => panic!("expected ParentNotFound, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn archive_filter_applies_independently_per_level() -> anyhow::Result<()> {
    let catalog = catalog();
    let bid_type = catalog.create_bid_type(new_type("Tile")).await?;
    let hidden_cat = catalog
        .create_bid_category(bid_type.id, new_category("Hidden"))
        .await?;
    let visible_cat = catalog
        .create_bid_category(bid_type.id, new_category("Visible"))
        .await?;
    catalog.set_bid_category_archived(hidden_cat.id, true).await?;

    let kept_item = catalog
        .create_bid_line_item(visible_cat.id, new_line_item("Kept"))
        .await?;
    let dropped_item = catalog
        .create_bid_line_item(visible_cat.id, new_line_item("Dropped"))
        .await?;
    catalog
        .set_bid_line_item_archived(dropped_item.id, true)
        .await?;

    let hidden_field = catalog
        .create_bid_line_item_field(kept_item.id, new_field("Hidden"))
        .await?;
    let visible_field = catalog
        .create_bid_line_item_field(kept_item.id, new_field("Visible"))
        .await?;
    catalog
        .set_bid_line_item_field_archived(hidden_field.id, true)
        .await?;

    let tree = catalog.load_catalog(false).await?;
    assert_eq!(tree.bid_types.len(), 1);
    let node = &tree.bid_types[0];
    assert_eq!(node.categories.len(), 1);
    assert_eq!(node.categories[0].category.id, visible_cat.id);
    assert_eq!(node.categories[0].line_items.len(), 1);
    assert_eq!(node.categories[0].line_items[0].line_item.id, kept_item.id);
    assert_eq!(node.categories[0].line_items[0].fields.len(), 1);
    assert_eq!(node.categories[0].line_items[0].fields[0].id, visible_field.id);

    // include_archived restores every level, still in ordinal order.
    let full = catalog.load_catalog(true).await?;
    let node = &full.bid_types[0];
    assert_eq!(
        node.categories.iter().map(|c| c.category.id).collect::<Vec<_>>(),
        vec![hidden_cat.id, visible_cat.id]
    );
    assert_eq!(node.categories[1].line_items.len(), 2);
    assert_eq!(node.categories[1].line_items[0].fields.len(), 2);

    // A subtree read returns the root even when the root is archived.
    catalog.set_bid_type_archived(bid_type.id, true).await?;
    let subtree = catalog.load_bid_type(bid_type.id, false).await?;
    assert_eq!(subtree.bid_type.id, bid_type.id);
    assert_eq!(subtree.categories.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cascade_outage_reports_exact_completed_prefix() -> anyhow::Result<()> {
    let inner = Arc::new(MemStore::new());
    let seeded = BidCatalog::new(inner.clone());
    let bid_type = seeded.create_bid_type(new_type("Tile")).await?;
    let category = seeded
        .create_bid_category(bid_type.id, new_category("Floors"))
        .await?;
    let line_item = seeded
        .create_bid_line_item(category.id, new_line_item("Install"))
        .await?;
    seeded
        .create_bid_line_item_field(line_item.id, new_field("Qty"))
        .await?;
    seeded
        .create_bid_line_item_field(line_item.id, new_field("Rate"))
        .await?;

    // Full cascade needs five deletes; allow three.
    let flaky = BidCatalog::new(Arc::new(FlakyStore::new(
        inner.clone(),
        3,
        Fault::Unavailable,
    )));
    match flaky.delete_bid_type(bid_type.id).await {
        Err(CatalogError::PartialCascadeFailure {
            operation,
            completed,
            cause,
        }) => {
            assert_eq!(operation, "delete bid type");
            assert_eq!(completed.len(), 3);
            assert_eq!(completed[0].table, Table::BidLineItemFields);
            assert_eq!(completed[1].table, Table::BidLineItemFields);
            assert_eq!(completed[2].table, Table::BidLineItems);
            assert_eq!(completed[2].id, line_item.id);
            assert!(matches!(*cause, CatalogError::Store(StoreError::Unavailable(_))));
        }
        other => panic!("expected PartialCascadeFailure, got {other:?}"),
    }

    // Nothing is rolled back: the category and root survive the outage.
    assert!(seeded.get_bid_category(category.id).await.is_ok());
    assert!(seeded.get_bid_type(bid_type.id).await.is_ok());
    assert!(matches!(
        seeded.get_bid_line_item(line_item.id).await,
        Err(CatalogError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn duplication_outage_leaves_partial_clone_with_manifest() -> anyhow::Result<()> {
    let inner = Arc::new(MemStore::new());
    let seeded = BidCatalog::new(inner.clone());
    let source_id = seed_tree(&seeded, 1, 1, 1).await?;

    // The clone needs four inserts; allow two (bid type + category).
    let flaky = BidCatalog::new(Arc::new(FlakyStore::new(
        inner.clone(),
        2,
        Fault::Unavailable,
    )));
    match flaky.duplicate_bid_type(source_id).await {
        Err(CatalogError::PartialCascadeFailure {
            operation,
            completed,
            ..
        }) => {
            assert_eq!(operation, "duplicate bid type");
            assert_eq!(completed.len(), 2);
            assert_eq!(completed[0].table, Table::BidTypes);
            assert_eq!(completed[1].table, Table::BidCategories);

            // The partial clone stays in place for manual cleanup.
            let clone = seeded.get_bid_type(completed[0].id).await?;
            assert!(clone.name.ends_with(COPY_SUFFIX));
        }
        other => panic!("expected PartialCascadeFailure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn reorder_outage_yields_partially_failed_report() -> anyhow::Result<()> {
    let inner = Arc::new(MemStore::new());
    let seeded = BidCatalog::new(inner.clone());
    let a = seeded.create_bid_type(new_type("A")).await?;
    let b = seeded.create_bid_type(new_type("B")).await?;
    let c = seeded.create_bid_type(new_type("C")).await?;

    // [c, a, b] changes all three ordinals; allow a single write.
    let flaky = BidCatalog::new(Arc::new(FlakyStore::new(
        inner.clone(),
        1,
        Fault::Unavailable,
    )));
    let report = flaky
        .reorder(ReorderTarget::BidTypes, vec![c.id, a.id, b.id])
        .await?;
    assert_eq!(report.state, SessionState::PartiallyFailed);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].id, c.id);
    assert_eq!(report.applied[0].new_sort_order, 0);
    let (failed_id, err) = report.failed.as_ref().expect("failed write");
    assert_eq!(*failed_id, a.id);
    assert!(matches!(err, CatalogError::Store(StoreError::Unavailable(_))));
    assert_eq!(report.skipped, vec![b.id]);

    // The persisted write stands and the rest kept their old ordinals;
    // nothing was rolled back.
    assert_eq!(seeded.get_bid_type(c.id).await?.sort_order, 0);
    assert_eq!(seeded.get_bid_type(a.id).await?.sort_order, 0);
    assert_eq!(seeded.get_bid_type(b.id).await?.sort_order, 1);

    // The caller reconciles by re-reading and diffing again.
    let report = seeded
        .reorder(ReorderTarget::BidTypes, vec![c.id, a.id, b.id])
        .await?;
    assert!(report.is_committed());
    let listed = seeded.list_bid_types(true).await?;
    assert_eq!(
        listed.iter().map(|t| (t.id, t.sort_order)).collect::<Vec<_>>(),
        vec![(c.id, 0), (a.id, 1), (b.id, 2)]
    );
    Ok(())
}

#[tokio::test]
async fn store_timeout_surfaces_through_catalog_errors() -> anyhow::Result<()> {
    let inner = Arc::new(MemStore::new());
    let seeded = BidCatalog::new(inner.clone());
    let bid_type = seeded.create_bid_type(new_type("Tile")).await?;

    let flaky = BidCatalog::new(Arc::new(FlakyStore::new(inner, 0, Fault::Timeout)));
    match flaky.set_bid_type_archived(bid_type.id, true).await {
        Err(CatalogError::Store(StoreError::Timeout(_))) => {}
        other => panic!("expected Timeout, got {other:?}"),
    }
    Ok(())
}

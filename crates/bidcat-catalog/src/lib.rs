//! Bid catalog hierarchy: ordering engine, repository, hierarchy
//! assembler, duplication service and reorder sessions over a generic
//! relational store.
//!
//! The four entity tables are flat, keyed by id with explicit parent-id
//! foreign keys; nesting is assembled only at read time. Per-level
//! `sort_order` ordinals are kept dense (`0..n-1`) across every create,
//! delete and reorder.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bidcat_core::{
    BidCategory, BidCategoryNode, BidCategoryPatch, BidLineItem, BidLineItemField,
    BidLineItemFieldPatch, BidLineItemNode, BidLineItemPatch, BidType, BidTypeNode, BidTypePatch,
    CatalogTree, FieldSize, FieldType, LineItemType, NewBidCategory, NewBidLineItem,
    NewBidLineItemField, NewBidType,
};
use bidcat_store::{sql_row, CatalogStore, Filter, OrderBy, Row, SqlValue, StoreError, Table};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "bidcat-catalog";

/// Suffix appended to the root name of a duplicated bid type.
pub const COPY_SUFFIX: &str = " (Copy)";

/// Sibling reads always break ordinal ties by creation order, then id, so
/// a corrupt equal-ordinal state still renders deterministically.
const SIBLING_ORDER: [OrderBy; 3] = [
    OrderBy {
        column: "sort_order",
        descending: false,
    },
    OrderBy {
        column: "created_at",
        descending: false,
    },
    OrderBy {
        column: "id",
        descending: false,
    },
];

/// One completed step of a cascade delete or a deep clone, reported back
/// to the caller when the walk stops partway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeStep {
    pub table: Table,
    pub id: Uuid,
}

/// A reorder proposal that is not a permutation of the current siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("missing {missing:?}, unexpected {unexpected:?}, duplicated {duplicated:?}")]
pub struct OrderMismatch {
    pub missing: Vec<Uuid>,
    pub unexpected: Vec<Uuid>,
    pub duplicated: Vec<Uuid>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: Uuid },
    #[error("parent {table} row {id} not found")]
    ParentNotFound { table: Table, id: Uuid },
    #[error("reorder proposal is not a permutation of the current siblings: {0}")]
    OrderMismatch(#[from] OrderMismatch),
    #[error("{operation} stopped after {} completed steps", .completed.len())]
    PartialCascadeFailure {
        operation: &'static str,
        completed: Vec<CascadeStep>,
        #[source]
        cause: Box<CatalogError>,
    },
    #[error("corrupt {table} row: {message}")]
    Corrupt { table: Table, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single `(id, new_sort_order)` assignment produced by the ordering
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrdinalChange {
    pub id: Uuid,
    pub new_sort_order: i32,
}

/// Diffs the current sibling ordinals against a proposed ordering.
///
/// The proposal must be a permutation of the current id set; assignments
/// are the dense `0..n-1` positions of the proposed order, and only pairs
/// whose ordinal actually changes are emitted. Pure computation, no
/// persistence.
pub fn reorder_diff(
    current: &[(Uuid, i32)],
    proposed: &[Uuid],
) -> Result<Vec<OrdinalChange>, OrderMismatch> {
    let current_ids: HashSet<Uuid> = current.iter().map(|(id, _)| *id).collect();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut mismatch = OrderMismatch::default();
    for id in proposed {
        if !seen.insert(*id) {
            mismatch.duplicated.push(*id);
        }
        if !current_ids.contains(id) {
            mismatch.unexpected.push(*id);
        }
    }
    for (id, _) in current {
        if !seen.contains(id) {
            mismatch.missing.push(*id);
        }
    }
    if !mismatch.missing.is_empty()
        || !mismatch.unexpected.is_empty()
        || !mismatch.duplicated.is_empty()
    {
        return Err(mismatch);
    }

    let current_orders: HashMap<Uuid, i32> = current.iter().copied().collect();
    Ok(proposed
        .iter()
        .enumerate()
        .filter(|(position, id)| current_orders[*id] != *position as i32)
        .map(|(position, id)| OrdinalChange {
            id: *id,
            new_sort_order: position as i32,
        })
        .collect())
}

/// Dense `0..n-1` assignment in the *current* order, used to compact
/// ordinals after a sibling is deleted. Emits only changed pairs.
pub fn dense_resequence(current: &[(Uuid, i32)]) -> Vec<OrdinalChange> {
    current
        .iter()
        .enumerate()
        .filter(|(position, (_, sort_order))| *sort_order != *position as i32)
        .map(|(position, (id, _))| OrdinalChange {
            id: *id,
            new_sort_order: position as i32,
        })
        .collect()
}

fn column<'r>(table: Table, row: &'r Row, name: &'static str) -> Result<&'r SqlValue, CatalogError> {
    row.get(name).ok_or_else(|| CatalogError::Corrupt {
        table,
        message: format!("missing column {name}"),
    })
}

fn type_mismatch(table: Table, name: &'static str) -> CatalogError {
    CatalogError::Corrupt {
        table,
        message: format!("column {name} has an unexpected type"),
    }
}

fn text_column(table: Table, row: &Row, name: &'static str) -> Result<String, CatalogError> {
    column(table, row, name)?
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| type_mismatch(table, name))
}

fn bool_column(table: Table, row: &Row, name: &'static str) -> Result<bool, CatalogError> {
    column(table, row, name)?
        .as_bool()
        .ok_or_else(|| type_mismatch(table, name))
}

fn int_column(table: Table, row: &Row, name: &'static str) -> Result<i32, CatalogError> {
    column(table, row, name)?
        .as_int()
        .ok_or_else(|| type_mismatch(table, name))
}

fn uuid_column(table: Table, row: &Row, name: &'static str) -> Result<Uuid, CatalogError> {
    column(table, row, name)?
        .as_uuid()
        .ok_or_else(|| type_mismatch(table, name))
}

fn timestamp_column(
    table: Table,
    row: &Row,
    name: &'static str,
) -> Result<chrono::DateTime<Utc>, CatalogError> {
    column(table, row, name)?
        .as_timestamp()
        .ok_or_else(|| type_mismatch(table, name))
}

/// Row codec implemented by the four entity kinds so the repository
/// internals stay generic while its public surface is per-kind.
trait CatalogRecord: Sized + Send {
    const TABLE: Table;
    fn id(&self) -> Uuid;
    fn sort_order(&self) -> i32;
    fn is_archived(&self) -> bool;
    fn from_row(row: &Row) -> Result<Self, CatalogError>;
    fn to_row(&self) -> Row;
}

impl CatalogRecord for BidType {
    const TABLE: Table = Table::BidTypes;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn is_archived(&self) -> bool {
        self.is_archived
    }

    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        let table = Self::TABLE;
        Ok(Self {
            id: uuid_column(table, row, "id")?,
            name: text_column(table, row, "name")?,
            description: text_column(table, row, "description")?,
            sort_order: int_column(table, row, "sort_order")?,
            is_archived: bool_column(table, row, "is_archived")?,
            created_at: timestamp_column(table, row, "created_at")?,
            updated_at: timestamp_column(table, row, "updated_at")?,
        })
    }

    fn to_row(&self) -> Row {
        sql_row([
            ("id", SqlValue::Uuid(self.id)),
            ("name", SqlValue::Text(self.name.clone())),
            ("description", SqlValue::Text(self.description.clone())),
            ("sort_order", SqlValue::Int(self.sort_order)),
            ("is_archived", SqlValue::Bool(self.is_archived)),
            ("created_at", SqlValue::Timestamp(self.created_at)),
            ("updated_at", SqlValue::Timestamp(self.updated_at)),
        ])
    }
}

impl CatalogRecord for BidCategory {
    const TABLE: Table = Table::BidCategories;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn is_archived(&self) -> bool {
        self.is_archived
    }

    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        let table = Self::TABLE;
        Ok(Self {
            id: uuid_column(table, row, "id")?,
            bid_type_id: uuid_column(table, row, "bid_type_id")?,
            name: text_column(table, row, "name")?,
            description: text_column(table, row, "description")?,
            sort_order: int_column(table, row, "sort_order")?,
            is_archived: bool_column(table, row, "is_archived")?,
            created_at: timestamp_column(table, row, "created_at")?,
            updated_at: timestamp_column(table, row, "updated_at")?,
        })
    }

    fn to_row(&self) -> Row {
        sql_row([
            ("id", SqlValue::Uuid(self.id)),
            ("bid_type_id", SqlValue::Uuid(self.bid_type_id)),
            ("name", SqlValue::Text(self.name.clone())),
            ("description", SqlValue::Text(self.description.clone())),
            ("sort_order", SqlValue::Int(self.sort_order)),
            ("is_archived", SqlValue::Bool(self.is_archived)),
            ("created_at", SqlValue::Timestamp(self.created_at)),
            ("updated_at", SqlValue::Timestamp(self.updated_at)),
        ])
    }
}

impl CatalogRecord for BidLineItem {
    const TABLE: Table = Table::BidLineItems;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn is_archived(&self) -> bool {
        self.is_archived
    }

    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        let table = Self::TABLE;
        let line_item_type = text_column(table, row, "line_item_type")?;
        Ok(Self {
            id: uuid_column(table, row, "id")?,
            bid_category_id: uuid_column(table, row, "bid_category_id")?,
            name: text_column(table, row, "name")?,
            line_item_type: LineItemType::parse(&line_item_type).ok_or_else(|| {
                CatalogError::Corrupt {
                    table,
                    message: format!("unknown line_item_type {line_item_type:?}"),
                }
            })?,
            description: text_column(table, row, "description")?,
            show_on_worksheet: bool_column(table, row, "show_on_worksheet")?,
            show_on_workorder: bool_column(table, row, "show_on_workorder")?,
            sort_order: int_column(table, row, "sort_order")?,
            is_archived: bool_column(table, row, "is_archived")?,
            retail_formula: text_column(table, row, "retail_formula")?,
            material_retail_formula: text_column(table, row, "material_retail_formula")?,
            material_cogs_formula: text_column(table, row, "material_cogs_formula")?,
            labor_retail_formula: text_column(table, row, "labor_retail_formula")?,
            labor_cogs_formula: text_column(table, row, "labor_cogs_formula")?,
            created_at: timestamp_column(table, row, "created_at")?,
            updated_at: timestamp_column(table, row, "updated_at")?,
        })
    }

    fn to_row(&self) -> Row {
        sql_row([
            ("id", SqlValue::Uuid(self.id)),
            ("bid_category_id", SqlValue::Uuid(self.bid_category_id)),
            ("name", SqlValue::Text(self.name.clone())),
            (
                "line_item_type",
                SqlValue::Text(self.line_item_type.as_str().to_string()),
            ),
            ("description", SqlValue::Text(self.description.clone())),
            ("show_on_worksheet", SqlValue::Bool(self.show_on_worksheet)),
            ("show_on_workorder", SqlValue::Bool(self.show_on_workorder)),
            ("sort_order", SqlValue::Int(self.sort_order)),
            ("is_archived", SqlValue::Bool(self.is_archived)),
            ("retail_formula", SqlValue::Text(self.retail_formula.clone())),
            (
                "material_retail_formula",
                SqlValue::Text(self.material_retail_formula.clone()),
            ),
            (
                "material_cogs_formula",
                SqlValue::Text(self.material_cogs_formula.clone()),
            ),
            (
                "labor_retail_formula",
                SqlValue::Text(self.labor_retail_formula.clone()),
            ),
            (
                "labor_cogs_formula",
                SqlValue::Text(self.labor_cogs_formula.clone()),
            ),
            ("created_at", SqlValue::Timestamp(self.created_at)),
            ("updated_at", SqlValue::Timestamp(self.updated_at)),
        ])
    }
}

impl CatalogRecord for BidLineItemField {
    const TABLE: Table = Table::BidLineItemFields;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn is_archived(&self) -> bool {
        self.is_archived
    }

    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        let table = Self::TABLE;
        let field_type = text_column(table, row, "field_type")?;
        let field_size = text_column(table, row, "field_size")?;
        Ok(Self {
            id: uuid_column(table, row, "id")?,
            bid_line_item_id: uuid_column(table, row, "bid_line_item_id")?,
            field_name: text_column(table, row, "field_name")?,
            field_type: FieldType::parse(&field_type).ok_or_else(|| CatalogError::Corrupt {
                table,
                message: format!("unknown field_type {field_type:?}"),
            })?,
            default_value: text_column(table, row, "default_value")?,
            field_size: FieldSize::parse(&field_size).ok_or_else(|| CatalogError::Corrupt {
                table,
                message: format!("unknown field_size {field_size:?}"),
            })?,
            is_hidden: bool_column(table, row, "is_hidden")?,
            is_required: bool_column(table, row, "is_required")?,
            is_taxed: bool_column(table, row, "is_taxed")?,
            sort_order: int_column(table, row, "sort_order")?,
            is_archived: bool_column(table, row, "is_archived")?,
            retail_formula: text_column(table, row, "retail_formula")?,
            sub_rate_formula: text_column(table, row, "sub_rate_formula")?,
            created_at: timestamp_column(table, row, "created_at")?,
            updated_at: timestamp_column(table, row, "updated_at")?,
        })
    }

    fn to_row(&self) -> Row {
        sql_row([
            ("id", SqlValue::Uuid(self.id)),
            ("bid_line_item_id", SqlValue::Uuid(self.bid_line_item_id)),
            ("field_name", SqlValue::Text(self.field_name.clone())),
            (
                "field_type",
                SqlValue::Text(self.field_type.as_str().to_string()),
            ),
            ("default_value", SqlValue::Text(self.default_value.clone())),
            (
                "field_size",
                SqlValue::Text(self.field_size.as_str().to_string()),
            ),
            ("is_hidden", SqlValue::Bool(self.is_hidden)),
            ("is_required", SqlValue::Bool(self.is_required)),
            ("is_taxed", SqlValue::Bool(self.is_taxed)),
            ("sort_order", SqlValue::Int(self.sort_order)),
            ("is_archived", SqlValue::Bool(self.is_archived)),
            ("retail_formula", SqlValue::Text(self.retail_formula.clone())),
            (
                "sub_rate_formula",
                SqlValue::Text(self.sub_rate_formula.clone()),
            ),
            ("created_at", SqlValue::Timestamp(self.created_at)),
            ("updated_at", SqlValue::Timestamp(self.updated_at)),
        ])
    }
}

fn bid_type_patch_fields(patch: BidTypePatch) -> Row {
    let mut fields = Row::new();
    if let Some(name) = patch.name {
        fields.insert("name".to_string(), SqlValue::Text(name));
    }
    if let Some(description) = patch.description {
        fields.insert("description".to_string(), SqlValue::Text(description));
    }
    if let Some(sort_order) = patch.sort_order {
        fields.insert("sort_order".to_string(), SqlValue::Int(sort_order));
    }
    if let Some(is_archived) = patch.is_archived {
        fields.insert("is_archived".to_string(), SqlValue::Bool(is_archived));
    }
    fields
}

fn bid_category_patch_fields(patch: BidCategoryPatch) -> Row {
    let mut fields = Row::new();
    if let Some(name) = patch.name {
        fields.insert("name".to_string(), SqlValue::Text(name));
    }
    if let Some(description) = patch.description {
        fields.insert("description".to_string(), SqlValue::Text(description));
    }
    if let Some(sort_order) = patch.sort_order {
        fields.insert("sort_order".to_string(), SqlValue::Int(sort_order));
    }
    if let Some(is_archived) = patch.is_archived {
        fields.insert("is_archived".to_string(), SqlValue::Bool(is_archived));
    }
    fields
}

fn bid_line_item_patch_fields(patch: BidLineItemPatch) -> Row {
    let mut fields = Row::new();
    if let Some(name) = patch.name {
        fields.insert("name".to_string(), SqlValue::Text(name));
    }
    if let Some(line_item_type) = patch.line_item_type {
        fields.insert(
            "line_item_type".to_string(),
            SqlValue::Text(line_item_type.as_str().to_string()),
        );
    }
    if let Some(description) = patch.description {
        fields.insert("description".to_string(), SqlValue::Text(description));
    }
    if let Some(show_on_worksheet) = patch.show_on_worksheet {
        fields.insert(
            "show_on_worksheet".to_string(),
            SqlValue::Bool(show_on_worksheet),
        );
    }
    if let Some(show_on_workorder) = patch.show_on_workorder {
        fields.insert(
            "show_on_workorder".to_string(),
            SqlValue::Bool(show_on_workorder),
        );
    }
    if let Some(sort_order) = patch.sort_order {
        fields.insert("sort_order".to_string(), SqlValue::Int(sort_order));
    }
    if let Some(is_archived) = patch.is_archived {
        fields.insert("is_archived".to_string(), SqlValue::Bool(is_archived));
    }
    if let Some(retail_formula) = patch.retail_formula {
        fields.insert("retail_formula".to_string(), SqlValue::Text(retail_formula));
    }
    if let Some(material_retail_formula) = patch.material_retail_formula {
        fields.insert(
            "material_retail_formula".to_string(),
            SqlValue::Text(material_retail_formula),
        );
    }
    if let Some(material_cogs_formula) = patch.material_cogs_formula {
        fields.insert(
            "material_cogs_formula".to_string(),
            SqlValue::Text(material_cogs_formula),
        );
    }
    if let Some(labor_retail_formula) = patch.labor_retail_formula {
        fields.insert(
            "labor_retail_formula".to_string(),
            SqlValue::Text(labor_retail_formula),
        );
    }
    if let Some(labor_cogs_formula) = patch.labor_cogs_formula {
        fields.insert(
            "labor_cogs_formula".to_string(),
            SqlValue::Text(labor_cogs_formula),
        );
    }
    fields
}

fn bid_line_item_field_patch_fields(patch: BidLineItemFieldPatch) -> Row {
    let mut fields = Row::new();
    if let Some(field_name) = patch.field_name {
        fields.insert("field_name".to_string(), SqlValue::Text(field_name));
    }
    if let Some(field_type) = patch.field_type {
        fields.insert(
            "field_type".to_string(),
            SqlValue::Text(field_type.as_str().to_string()),
        );
    }
    if let Some(default_value) = patch.default_value {
        fields.insert("default_value".to_string(), SqlValue::Text(default_value));
    }
    if let Some(field_size) = patch.field_size {
        fields.insert(
            "field_size".to_string(),
            SqlValue::Text(field_size.as_str().to_string()),
        );
    }
    if let Some(is_hidden) = patch.is_hidden {
        fields.insert("is_hidden".to_string(), SqlValue::Bool(is_hidden));
    }
    if let Some(is_required) = patch.is_required {
        fields.insert("is_required".to_string(), SqlValue::Bool(is_required));
    }
    if let Some(is_taxed) = patch.is_taxed {
        fields.insert("is_taxed".to_string(), SqlValue::Bool(is_taxed));
    }
    if let Some(sort_order) = patch.sort_order {
        fields.insert("sort_order".to_string(), SqlValue::Int(sort_order));
    }
    if let Some(is_archived) = patch.is_archived {
        fields.insert("is_archived".to_string(), SqlValue::Bool(is_archived));
    }
    if let Some(retail_formula) = patch.retail_formula {
        fields.insert("retail_formula".to_string(), SqlValue::Text(retail_formula));
    }
    if let Some(sub_rate_formula) = patch.sub_rate_formula {
        fields.insert(
            "sub_rate_formula".to_string(),
            SqlValue::Text(sub_rate_formula),
        );
    }
    fields
}

fn parent_filters(table: Table, parent: Option<Uuid>) -> Vec<Filter> {
    match (table.parent_column(), parent) {
        (Some(column), Some(id)) => vec![Filter::Eq(column, SqlValue::Uuid(id))],
        _ => Vec::new(),
    }
}

fn finalize_cascade(
    operation: &'static str,
    completed: Vec<CascadeStep>,
    result: Result<(), CatalogError>,
) -> Result<(), CatalogError> {
    match result {
        Ok(()) => Ok(()),
        Err(cause) if completed.is_empty() => Err(cause),
        Err(cause) => {
            warn!(
                operation,
                completed = completed.len(),
                error = %cause,
                "cascade stopped partway; nothing is rolled back"
            );
            Err(CatalogError::PartialCascadeFailure {
                operation,
                completed,
                cause: Box::new(cause),
            })
        }
    }
}

/// CRUD over the four entity kinds with cascade deletes and dense-ordinal
/// maintenance. Each operation fully applies or fully fails per entity;
/// cascades are best-effort top-down with a completed-step manifest on
/// failure.
#[derive(Clone)]
pub struct CatalogRepository {
    store: Arc<dyn CatalogStore>,
}

impl CatalogRepository {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    async fn fetch<R: CatalogRecord>(&self, id: Uuid) -> Result<Option<R>, CatalogError> {
        let rows = self
            .store
            .select(R::TABLE, &[Filter::Eq("id", SqlValue::Uuid(id))], &[])
            .await?;
        rows.first().map(R::from_row).transpose()
    }

    async fn require<R: CatalogRecord>(&self, id: Uuid) -> Result<R, CatalogError> {
        self.fetch(id)
            .await?
            .ok_or(CatalogError::NotFound { table: R::TABLE, id })
    }

    async fn require_parent<R: CatalogRecord>(&self, id: Uuid) -> Result<R, CatalogError> {
        self.fetch(id)
            .await?
            .ok_or(CatalogError::ParentNotFound { table: R::TABLE, id })
    }

    /// Full sibling set (archived included), in render order.
    async fn siblings<R: CatalogRecord>(&self, parent: Option<Uuid>) -> Result<Vec<R>, CatalogError> {
        let filters = parent_filters(R::TABLE, parent);
        let rows = self.store.select(R::TABLE, &filters, &SIBLING_ORDER).await?;
        rows.iter().map(R::from_row).collect()
    }

    /// Fan-out read: all children under any of `parent_ids`, in render
    /// order, optionally filtered by the archive flag.
    async fn children_of_many<R: CatalogRecord>(
        &self,
        parent_ids: &[Uuid],
        include_archived: bool,
    ) -> Result<Vec<R>, CatalogError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let Some(parent_column) = R::TABLE.parent_column() else {
            return Ok(Vec::new());
        };
        let filters = [Filter::In(parent_column, parent_ids.to_vec())];
        let rows = self.store.select(R::TABLE, &filters, &SIBLING_ORDER).await?;
        let records: Vec<R> = rows.iter().map(R::from_row).collect::<Result<_, _>>()?;
        Ok(records
            .into_iter()
            .filter(|record| include_archived || !record.is_archived())
            .collect())
    }

    async fn next_sort_order<R: CatalogRecord>(
        &self,
        parent: Option<Uuid>,
    ) -> Result<i32, CatalogError> {
        let siblings: Vec<R> = self.siblings(parent).await?;
        Ok(siblings
            .iter()
            .map(|record| record.sort_order() + 1)
            .max()
            .unwrap_or(0))
    }

    async fn insert_record<R: CatalogRecord>(&self, record: R) -> Result<R, CatalogError> {
        let row = self.store.insert(R::TABLE, record.to_row()).await?;
        R::from_row(&row)
    }

    async fn apply_update<R: CatalogRecord>(
        &self,
        id: Uuid,
        mut fields: Row,
    ) -> Result<R, CatalogError> {
        fields.insert("updated_at".to_string(), SqlValue::Timestamp(Utc::now()));
        match self.store.update(R::TABLE, id, fields).await {
            Ok(row) => R::from_row(&row),
            Err(StoreError::RowMissing { .. }) => {
                Err(CatalogError::NotFound { table: R::TABLE, id })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_sort_order(
        &self,
        table: Table,
        change: OrdinalChange,
    ) -> Result<(), CatalogError> {
        debug!(%table, id = %change.id, new_sort_order = change.new_sort_order, "write ordinal");
        let mut fields = sql_row([("sort_order", SqlValue::Int(change.new_sort_order))]);
        fields.insert("updated_at".to_string(), SqlValue::Timestamp(Utc::now()));
        match self.store.update(table, change.id, fields).await {
            Ok(_) => Ok(()),
            Err(StoreError::RowMissing { .. }) => Err(CatalogError::NotFound {
                table,
                id: change.id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Restores the `0..n-1` ordinal set for one sibling group, writing
    /// only the rows whose ordinal actually changes.
    async fn resequence_siblings<R: CatalogRecord>(
        &self,
        parent: Option<Uuid>,
    ) -> Result<(), CatalogError> {
        let siblings: Vec<R> = self.siblings(parent).await?;
        let current: Vec<(Uuid, i32)> = siblings
            .iter()
            .map(|record| (record.id(), record.sort_order()))
            .collect();
        for change in dense_resequence(&current) {
            self.write_sort_order(R::TABLE, change).await?;
        }
        Ok(())
    }

    pub(crate) async fn sibling_ordinals(
        &self,
        target: ReorderTarget,
    ) -> Result<Vec<(Uuid, i32)>, CatalogError> {
        match target {
            ReorderTarget::BidTypes => Ok(self
                .siblings::<BidType>(None)
                .await?
                .iter()
                .map(|record| (record.id, record.sort_order))
                .collect()),
            ReorderTarget::CategoriesOf(parent) => {
                self.require_parent::<BidType>(parent).await?;
                Ok(self
                    .siblings::<BidCategory>(Some(parent))
                    .await?
                    .iter()
                    .map(|record| (record.id, record.sort_order))
                    .collect())
            }
            ReorderTarget::LineItemsOf(parent) => {
                self.require_parent::<BidCategory>(parent).await?;
                Ok(self
                    .siblings::<BidLineItem>(Some(parent))
                    .await?
                    .iter()
                    .map(|record| (record.id, record.sort_order))
                    .collect())
            }
            ReorderTarget::FieldsOf(parent) => {
                self.require_parent::<BidLineItem>(parent).await?;
                Ok(self
                    .siblings::<BidLineItemField>(Some(parent))
                    .await?
                    .iter()
                    .map(|record| (record.id, record.sort_order))
                    .collect())
            }
        }
    }

    // --- bid types ---

    pub async fn create_bid_type(&self, new: NewBidType) -> Result<BidType, CatalogError> {
        let now = Utc::now();
        let record = BidType {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            sort_order: self.next_sort_order::<BidType>(None).await?,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        self.insert_record(record).await
    }

    pub async fn get_bid_type(&self, id: Uuid) -> Result<BidType, CatalogError> {
        self.require(id).await
    }

    pub async fn update_bid_type(
        &self,
        id: Uuid,
        patch: BidTypePatch,
    ) -> Result<BidType, CatalogError> {
        self.apply_update(id, bid_type_patch_fields(patch)).await
    }

    pub async fn set_bid_type_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidType, CatalogError> {
        self.update_bid_type(
            id,
            BidTypePatch {
                is_archived: Some(archived),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn list_bid_types(&self, include_archived: bool) -> Result<Vec<BidType>, CatalogError> {
        Ok(self
            .siblings::<BidType>(None)
            .await?
            .into_iter()
            .filter(|record| include_archived || !record.is_archived)
            .collect())
    }

    /// Cascade delete: fields, then line items, then categories, then the
    /// bid type itself; surviving top-level ordinals are re-densified.
    pub async fn delete_bid_type(&self, id: Uuid) -> Result<(), CatalogError> {
        self.require::<BidType>(id).await?;
        let mut completed = Vec::new();
        let result = self.delete_bid_type_tree(id, &mut completed).await;
        let result = match result {
            Ok(()) => self.resequence_siblings::<BidType>(None).await,
            Err(err) => Err(err),
        };
        finalize_cascade("delete bid type", completed, result)
    }

    // --- bid categories ---

    pub async fn create_bid_category(
        &self,
        bid_type_id: Uuid,
        new: NewBidCategory,
    ) -> Result<BidCategory, CatalogError> {
        self.require_parent::<BidType>(bid_type_id).await?;
        let now = Utc::now();
        let record = BidCategory {
            id: Uuid::new_v4(),
            bid_type_id,
            name: new.name,
            description: new.description,
            sort_order: self.next_sort_order::<BidCategory>(Some(bid_type_id)).await?,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        self.insert_record(record).await
    }

    pub async fn get_bid_category(&self, id: Uuid) -> Result<BidCategory, CatalogError> {
        self.require(id).await
    }

    pub async fn update_bid_category(
        &self,
        id: Uuid,
        patch: BidCategoryPatch,
    ) -> Result<BidCategory, CatalogError> {
        self.apply_update(id, bid_category_patch_fields(patch)).await
    }

    pub async fn set_bid_category_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidCategory, CatalogError> {
        self.update_bid_category(
            id,
            BidCategoryPatch {
                is_archived: Some(archived),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn list_bid_categories(
        &self,
        bid_type_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<BidCategory>, CatalogError> {
        Ok(self
            .siblings::<BidCategory>(Some(bid_type_id))
            .await?
            .into_iter()
            .filter(|record| include_archived || !record.is_archived)
            .collect())
    }

    pub async fn delete_bid_category(&self, id: Uuid) -> Result<(), CatalogError> {
        let category: BidCategory = self.require(id).await?;
        let mut completed = Vec::new();
        let result = self.delete_category_tree(id, &mut completed).await;
        let result = match result {
            Ok(()) => {
                self.resequence_siblings::<BidCategory>(Some(category.bid_type_id))
                    .await
            }
            Err(err) => Err(err),
        };
        finalize_cascade("delete bid category", completed, result)
    }

    // --- bid line items ---

    pub async fn create_bid_line_item(
        &self,
        bid_category_id: Uuid,
        new: NewBidLineItem,
    ) -> Result<BidLineItem, CatalogError> {
        self.require_parent::<BidCategory>(bid_category_id).await?;
        let now = Utc::now();
        let record = BidLineItem {
            id: Uuid::new_v4(),
            bid_category_id,
            name: new.name,
            line_item_type: new.line_item_type,
            description: new.description,
            show_on_worksheet: new.show_on_worksheet,
            show_on_workorder: new.show_on_workorder,
            sort_order: self
                .next_sort_order::<BidLineItem>(Some(bid_category_id))
                .await?,
            is_archived: false,
            retail_formula: new.retail_formula,
            material_retail_formula: new.material_retail_formula,
            material_cogs_formula: new.material_cogs_formula,
            labor_retail_formula: new.labor_retail_formula,
            labor_cogs_formula: new.labor_cogs_formula,
            created_at: now,
            updated_at: now,
        };
        self.insert_record(record).await
    }

    pub async fn get_bid_line_item(&self, id: Uuid) -> Result<BidLineItem, CatalogError> {
        self.require(id).await
    }

    pub async fn update_bid_line_item(
        &self,
        id: Uuid,
        patch: BidLineItemPatch,
    ) -> Result<BidLineItem, CatalogError> {
        self.apply_update(id, bid_line_item_patch_fields(patch)).await
    }

    pub async fn set_bid_line_item_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidLineItem, CatalogError> {
        self.update_bid_line_item(
            id,
            BidLineItemPatch {
                is_archived: Some(archived),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn list_bid_line_items(
        &self,
        bid_category_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<BidLineItem>, CatalogError> {
        Ok(self
            .siblings::<BidLineItem>(Some(bid_category_id))
            .await?
            .into_iter()
            .filter(|record| include_archived || !record.is_archived)
            .collect())
    }

    pub async fn delete_bid_line_item(&self, id: Uuid) -> Result<(), CatalogError> {
        let line_item: BidLineItem = self.require(id).await?;
        let mut completed = Vec::new();
        let result = self.delete_line_item_tree(id, &mut completed).await;
        let result = match result {
            Ok(()) => {
                self.resequence_siblings::<BidLineItem>(Some(line_item.bid_category_id))
                    .await
            }
            Err(err) => Err(err),
        };
        finalize_cascade("delete bid line item", completed, result)
    }

    // --- bid line item fields ---

    pub async fn create_bid_line_item_field(
        &self,
        bid_line_item_id: Uuid,
        new: NewBidLineItemField,
    ) -> Result<BidLineItemField, CatalogError> {
        self.require_parent::<BidLineItem>(bid_line_item_id).await?;
        let now = Utc::now();
        let record = BidLineItemField {
            id: Uuid::new_v4(),
            bid_line_item_id,
            field_name: new.field_name,
            field_type: new.field_type,
            default_value: new.default_value,
            field_size: new.field_size,
            is_hidden: new.is_hidden,
            is_required: new.is_required,
            is_taxed: new.is_taxed,
            sort_order: self
                .next_sort_order::<BidLineItemField>(Some(bid_line_item_id))
                .await?,
            is_archived: false,
            retail_formula: new.retail_formula,
            sub_rate_formula: new.sub_rate_formula,
            created_at: now,
            updated_at: now,
        };
        self.insert_record(record).await
    }

    pub async fn get_bid_line_item_field(
        &self,
        id: Uuid,
    ) -> Result<BidLineItemField, CatalogError> {
        self.require(id).await
    }

    pub async fn update_bid_line_item_field(
        &self,
        id: Uuid,
        patch: BidLineItemFieldPatch,
    ) -> Result<BidLineItemField, CatalogError> {
        self.apply_update(id, bid_line_item_field_patch_fields(patch))
            .await
    }

    pub async fn set_bid_line_item_field_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidLineItemField, CatalogError> {
        self.update_bid_line_item_field(
            id,
            BidLineItemFieldPatch {
                is_archived: Some(archived),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn list_bid_line_item_fields(
        &self,
        bid_line_item_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<BidLineItemField>, CatalogError> {
        Ok(self
            .siblings::<BidLineItemField>(Some(bid_line_item_id))
            .await?
            .into_iter()
            .filter(|record| include_archived || !record.is_archived)
            .collect())
    }

    pub async fn delete_bid_line_item_field(&self, id: Uuid) -> Result<(), CatalogError> {
        let field: BidLineItemField = self.require(id).await?;
        let mut completed = Vec::new();
        let result = match self.store.delete(Table::BidLineItemFields, id).await {
            Ok(()) => {
                completed.push(CascadeStep {
                    table: Table::BidLineItemFields,
                    id,
                });
                self.resequence_siblings::<BidLineItemField>(Some(field.bid_line_item_id))
                    .await
            }
            Err(err) => Err(err.into()),
        };
        finalize_cascade("delete bid line item field", completed, result)
    }

    // --- cascade walkers (children first, then the node itself) ---

    async fn delete_bid_type_tree(
        &self,
        id: Uuid,
        completed: &mut Vec<CascadeStep>,
    ) -> Result<(), CatalogError> {
        let categories: Vec<BidCategory> = self.siblings(Some(id)).await?;
        for category in categories {
            self.delete_category_tree(category.id, completed).await?;
        }
        self.store.delete(Table::BidTypes, id).await?;
        completed.push(CascadeStep {
            table: Table::BidTypes,
            id,
        });
        Ok(())
    }

    async fn delete_category_tree(
        &self,
        id: Uuid,
        completed: &mut Vec<CascadeStep>,
    ) -> Result<(), CatalogError> {
        let line_items: Vec<BidLineItem> = self.siblings(Some(id)).await?;
        for line_item in line_items {
            self.delete_line_item_tree(line_item.id, completed).await?;
        }
        self.store.delete(Table::BidCategories, id).await?;
        completed.push(CascadeStep {
            table: Table::BidCategories,
            id,
        });
        Ok(())
    }

    async fn delete_line_item_tree(
        &self,
        id: Uuid,
        completed: &mut Vec<CascadeStep>,
    ) -> Result<(), CatalogError> {
        let fields: Vec<BidLineItemField> = self.siblings(Some(id)).await?;
        for field in fields {
            self.store.delete(Table::BidLineItemFields, field.id).await?;
            completed.push(CascadeStep {
                table: Table::BidLineItemFields,
                id: field.id,
            });
        }
        self.store.delete(Table::BidLineItems, id).await?;
        completed.push(CascadeStep {
            table: Table::BidLineItems,
            id,
        });
        Ok(())
    }
}

/// Materializes the nested catalog read model with one fan-out read per
/// level, never per-node recursive queries.
#[derive(Clone)]
pub struct HierarchyAssembler {
    repo: CatalogRepository,
}

impl HierarchyAssembler {
    pub fn new(repo: CatalogRepository) -> Self {
        Self { repo }
    }

    pub async fn load_catalog(&self, include_archived: bool) -> Result<CatalogTree, CatalogError> {
        let roots = self.repo.list_bid_types(include_archived).await?;
        Ok(CatalogTree {
            bid_types: self.assemble(roots, include_archived).await?,
        })
    }

    /// Loads a single subtree. The root itself is returned regardless of
    /// its archive state; the filter applies to its descendants.
    pub async fn load_bid_type(
        &self,
        id: Uuid,
        include_archived: bool,
    ) -> Result<BidTypeNode, CatalogError> {
        let root = self.repo.get_bid_type(id).await?;
        let mut nodes = self.assemble(vec![root], include_archived).await?;
        nodes.pop().ok_or(CatalogError::NotFound {
            table: Table::BidTypes,
            id,
        })
    }

    async fn assemble(
        &self,
        roots: Vec<BidType>,
        include_archived: bool,
    ) -> Result<Vec<BidTypeNode>, CatalogError> {
        let type_ids: Vec<Uuid> = roots.iter().map(|bid_type| bid_type.id).collect();
        let categories: Vec<BidCategory> = self
            .repo
            .children_of_many(&type_ids, include_archived)
            .await?;
        let category_ids: Vec<Uuid> = categories.iter().map(|category| category.id).collect();
        let line_items: Vec<BidLineItem> = self
            .repo
            .children_of_many(&category_ids, include_archived)
            .await?;
        let line_item_ids: Vec<Uuid> = line_items.iter().map(|line_item| line_item.id).collect();
        let fields: Vec<BidLineItemField> = self
            .repo
            .children_of_many(&line_item_ids, include_archived)
            .await?;

        let mut fields_by_line_item: HashMap<Uuid, Vec<BidLineItemField>> = HashMap::new();
        for field in fields {
            fields_by_line_item
                .entry(field.bid_line_item_id)
                .or_default()
                .push(field);
        }

        let mut line_items_by_category: HashMap<Uuid, Vec<BidLineItemNode>> = HashMap::new();
        for line_item in line_items {
            let parent = line_item.bid_category_id;
            let fields = fields_by_line_item
                .remove(&line_item.id)
                .unwrap_or_default();
            line_items_by_category
                .entry(parent)
                .or_default()
                .push(BidLineItemNode { line_item, fields });
        }

        let mut categories_by_type: HashMap<Uuid, Vec<BidCategoryNode>> = HashMap::new();
        for category in categories {
            let parent = category.bid_type_id;
            let line_items = line_items_by_category
                .remove(&category.id)
                .unwrap_or_default();
            categories_by_type
                .entry(parent)
                .or_default()
                .push(BidCategoryNode {
                    category,
                    line_items,
                });
        }

        Ok(roots
            .into_iter()
            .map(|bid_type| {
                let categories = categories_by_type.remove(&bid_type.id).unwrap_or_default();
                BidTypeNode {
                    bid_type,
                    categories,
                }
            })
            .collect())
    }
}

/// Deep-clones a bid type subtree through the repository's normal create
/// path: fresh ids, ordinals appended after existing siblings, archive
/// flags reset at every level, scalar and formula fields copied verbatim.
#[derive(Clone)]
pub struct DuplicationService {
    repo: CatalogRepository,
}

impl DuplicationService {
    pub fn new(repo: CatalogRepository) -> Self {
        Self { repo }
    }

    /// Returns the new bid type's id. A mid-clone failure leaves the
    /// partial clone in place and reports the created nodes in the
    /// manifest; callers inspect and clean up manually.
    pub async fn duplicate_bid_type(&self, source_id: Uuid) -> Result<Uuid, CatalogError> {
        let source = self.repo.get_bid_type(source_id).await?;
        let mut completed = Vec::new();
        match self.clone_tree(&source, &mut completed).await {
            Ok(new_id) => {
                debug!(%source_id, %new_id, nodes = completed.len(), "duplicated bid type");
                Ok(new_id)
            }
            Err(cause) if completed.is_empty() => Err(cause),
            Err(cause) => {
                warn!(
                    %source_id,
                    created = completed.len(),
                    error = %cause,
                    "duplication stopped partway; partial clone left in place"
                );
                Err(CatalogError::PartialCascadeFailure {
                    operation: "duplicate bid type",
                    completed,
                    cause: Box::new(cause),
                })
            }
        }
    }

    async fn clone_tree(
        &self,
        source: &BidType,
        completed: &mut Vec<CascadeStep>,
    ) -> Result<Uuid, CatalogError> {
        let clone = self
            .repo
            .create_bid_type(NewBidType {
                name: format!("{}{COPY_SUFFIX}", source.name),
                description: source.description.clone(),
            })
            .await?;
        completed.push(CascadeStep {
            table: Table::BidTypes,
            id: clone.id,
        });

        // Walk the source in ordinal order so the fresh ordinals reproduce
        // the same relative order. Archived descendants are cloned too.
        for category in self.repo.list_bid_categories(source.id, true).await? {
            let category_clone = self
                .repo
                .create_bid_category(
                    clone.id,
                    NewBidCategory {
                        name: category.name.clone(),
                        description: category.description.clone(),
                    },
                )
                .await?;
            completed.push(CascadeStep {
                table: Table::BidCategories,
                id: category_clone.id,
            });

            for line_item in self.repo.list_bid_line_items(category.id, true).await? {
                let line_item_clone = self
                    .repo
                    .create_bid_line_item(
                        category_clone.id,
                        NewBidLineItem {
                            name: line_item.name.clone(),
                            line_item_type: line_item.line_item_type,
                            description: line_item.description.clone(),
                            show_on_worksheet: line_item.show_on_worksheet,
                            show_on_workorder: line_item.show_on_workorder,
                            retail_formula: line_item.retail_formula.clone(),
                            material_retail_formula: line_item.material_retail_formula.clone(),
                            material_cogs_formula: line_item.material_cogs_formula.clone(),
                            labor_retail_formula: line_item.labor_retail_formula.clone(),
                            labor_cogs_formula: line_item.labor_cogs_formula.clone(),
                        },
                    )
                    .await?;
                completed.push(CascadeStep {
                    table: Table::BidLineItems,
                    id: line_item_clone.id,
                });

                for field in self
                    .repo
                    .list_bid_line_item_fields(line_item.id, true)
                    .await?
                {
                    let field_clone = self
                        .repo
                        .create_bid_line_item_field(
                            line_item_clone.id,
                            NewBidLineItemField {
                                field_name: field.field_name.clone(),
                                field_type: field.field_type,
                                default_value: field.default_value.clone(),
                                field_size: field.field_size,
                                is_hidden: field.is_hidden,
                                is_required: field.is_required,
                                is_taxed: field.is_taxed,
                                retail_formula: field.retail_formula.clone(),
                                sub_rate_formula: field.sub_rate_formula.clone(),
                            },
                        )
                        .await?;
                    completed.push(CascadeStep {
                        table: Table::BidLineItemFields,
                        id: field_clone.id,
                    });
                }
            }
        }

        Ok(clone.id)
    }
}

/// One sibling set eligible for reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderTarget {
    BidTypes,
    CategoriesOf(Uuid),
    LineItemsOf(Uuid),
    FieldsOf(Uuid),
}

impl ReorderTarget {
    pub fn table(&self) -> Table {
        match self {
            Self::BidTypes => Table::BidTypes,
            Self::CategoriesOf(_) => Table::BidCategories,
            Self::LineItemsOf(_) => Table::BidLineItems,
            Self::FieldsOf(_) => Table::BidLineItemFields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Pending,
    Diffing,
    Persisting,
    Committed,
    PartiallyFailed,
}

/// Outcome of one reorder session. `PartiallyFailed` is terminal: the
/// caller re-reads and re-diffs; nothing is rolled back or retried here.
#[derive(Debug)]
pub struct ReorderReport {
    pub state: SessionState,
    /// Ordinal writes that were persisted, in issue order.
    pub applied: Vec<OrdinalChange>,
    /// The write that failed, if any.
    pub failed: Option<(Uuid, CatalogError)>,
    /// Queued writes never attempted after the failure.
    pub skipped: Vec<Uuid>,
}

impl ReorderReport {
    pub fn is_committed(&self) -> bool {
        self.state == SessionState::Committed
    }
}

/// Persists one drag-reorder of a sibling set.
///
/// The proposal must be a permutation of the *full* current sibling set,
/// archived rows included, since ordinals span all siblings. Dropping the
/// session (or its future) before the persisting step begins abandons it
/// with nothing written; once persisting has begun, already-issued
/// updates stand and only the remaining queued ones are abandoned.
pub struct ReorderSession {
    repo: CatalogRepository,
    target: ReorderTarget,
    proposed: Vec<Uuid>,
    state: SessionState,
}

impl ReorderSession {
    pub fn new(repo: CatalogRepository, target: ReorderTarget, proposed: Vec<Uuid>) -> Self {
        Self {
            repo,
            target,
            proposed,
            state: SessionState::Pending,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn run(mut self) -> Result<ReorderReport, CatalogError> {
        self.state = SessionState::Diffing;
        let current = self.repo.sibling_ordinals(self.target).await?;
        let changes = reorder_diff(&current, &self.proposed)?;

        self.state = SessionState::Persisting;
        let table = self.target.table();
        let mut applied = Vec::new();
        for (index, change) in changes.iter().enumerate() {
            match self.repo.write_sort_order(table, *change).await {
                Ok(()) => applied.push(*change),
                Err(err) => {
                    self.state = SessionState::PartiallyFailed;
                    let skipped: Vec<Uuid> =
                        changes[index + 1..].iter().map(|change| change.id).collect();
                    warn!(
                        %table,
                        applied = applied.len(),
                        skipped = skipped.len(),
                        failed = %change.id,
                        "reorder persisted partially; caller must re-read and reconcile"
                    );
                    return Ok(ReorderReport {
                        state: SessionState::PartiallyFailed,
                        applied,
                        failed: Some((change.id, err)),
                        skipped,
                    });
                }
            }
        }

        self.state = SessionState::Committed;
        Ok(ReorderReport {
            state: SessionState::Committed,
            applied,
            failed: None,
            skipped: Vec::new(),
        })
    }
}

/// Facade the UI layer talks to: every repository operation plus tree
/// reads, duplication and reorder sessions, over one shared store handle.
#[derive(Clone)]
pub struct BidCatalog {
    repo: CatalogRepository,
    assembler: HierarchyAssembler,
    duplicator: DuplicationService,
}

impl BidCatalog {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        let repo = CatalogRepository::new(store);
        let assembler = HierarchyAssembler::new(repo.clone());
        let duplicator = DuplicationService::new(repo.clone());
        Self {
            repo,
            assembler,
            duplicator,
        }
    }

    pub fn repository(&self) -> &CatalogRepository {
        &self.repo
    }

    pub async fn load_catalog(&self, include_archived: bool) -> Result<CatalogTree, CatalogError> {
        self.assembler.load_catalog(include_archived).await
    }

    pub async fn load_bid_type(
        &self,
        id: Uuid,
        include_archived: bool,
    ) -> Result<BidTypeNode, CatalogError> {
        self.assembler.load_bid_type(id, include_archived).await
    }

    pub async fn duplicate_bid_type(&self, id: Uuid) -> Result<Uuid, CatalogError> {
        self.duplicator.duplicate_bid_type(id).await
    }

    /// Builds a session without running it; the caller drives (or drops)
    /// it.
    pub fn begin_reorder(&self, target: ReorderTarget, proposed: Vec<Uuid>) -> ReorderSession {
        ReorderSession::new(self.repo.clone(), target, proposed)
    }

    /// Runs a reorder session to completion.
    pub async fn reorder(
        &self,
        target: ReorderTarget,
        proposed: Vec<Uuid>,
    ) -> Result<ReorderReport, CatalogError> {
        self.begin_reorder(target, proposed).run().await
    }

    pub async fn create_bid_type(&self, new: NewBidType) -> Result<BidType, CatalogError> {
        self.repo.create_bid_type(new).await
    }

    pub async fn get_bid_type(&self, id: Uuid) -> Result<BidType, CatalogError> {
        self.repo.get_bid_type(id).await
    }

    pub async fn update_bid_type(
        &self,
        id: Uuid,
        patch: BidTypePatch,
    ) -> Result<BidType, CatalogError> {
        self.repo.update_bid_type(id, patch).await
    }

    pub async fn set_bid_type_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidType, CatalogError> {
        self.repo.set_bid_type_archived(id, archived).await
    }

    pub async fn delete_bid_type(&self, id: Uuid) -> Result<(), CatalogError> {
        self.repo.delete_bid_type(id).await
    }

    pub async fn list_bid_types(&self, include_archived: bool) -> Result<Vec<BidType>, CatalogError> {
        self.repo.list_bid_types(include_archived).await
    }

    pub async fn create_bid_category(
        &self,
        bid_type_id: Uuid,
        new: NewBidCategory,
    ) -> Result<BidCategory, CatalogError> {
        self.repo.create_bid_category(bid_type_id, new).await
    }

    pub async fn get_bid_category(&self, id: Uuid) -> Result<BidCategory, CatalogError> {
        self.repo.get_bid_category(id).await
    }

    pub async fn update_bid_category(
        &self,
        id: Uuid,
        patch: BidCategoryPatch,
    ) -> Result<BidCategory, CatalogError> {
        self.repo.update_bid_category(id, patch).await
    }

    pub async fn set_bid_category_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidCategory, CatalogError> {
        self.repo.set_bid_category_archived(id, archived).await
    }

    pub async fn delete_bid_category(&self, id: Uuid) -> Result<(), CatalogError> {
        self.repo.delete_bid_category(id).await
    }

    pub async fn list_bid_categories(
        &self,
        bid_type_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<BidCategory>, CatalogError> {
        self.repo.list_bid_categories(bid_type_id, include_archived).await
    }

    pub async fn create_bid_line_item(
        &self,
        bid_category_id: Uuid,
        new: NewBidLineItem,
    ) -> Result<BidLineItem, CatalogError> {
        self.repo.create_bid_line_item(bid_category_id, new).await
    }

    pub async fn get_bid_line_item(&self, id: Uuid) -> Result<BidLineItem, CatalogError> {
        self.repo.get_bid_line_item(id).await
    }

    pub async fn update_bid_line_item(
        &self,
        id: Uuid,
        patch: BidLineItemPatch,
    ) -> Result<BidLineItem, CatalogError> {
        self.repo.update_bid_line_item(id, patch).await
    }

    pub async fn set_bid_line_item_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidLineItem, CatalogError> {
        self.repo.set_bid_line_item_archived(id, archived).await
    }

    pub async fn delete_bid_line_item(&self, id: Uuid) -> Result<(), CatalogError> {
        self.repo.delete_bid_line_item(id).await
    }

    pub async fn list_bid_line_items(
        &self,
        bid_category_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<BidLineItem>, CatalogError> {
        self.repo
            .list_bid_line_items(bid_category_id, include_archived)
            .await
    }

    pub async fn create_bid_line_item_field(
        &self,
        bid_line_item_id: Uuid,
        new: NewBidLineItemField,
    ) -> Result<BidLineItemField, CatalogError> {
        self.repo
            .create_bid_line_item_field(bid_line_item_id, new)
            .await
    }

    pub async fn get_bid_line_item_field(
        &self,
        id: Uuid,
    ) -> Result<BidLineItemField, CatalogError> {
        self.repo.get_bid_line_item_field(id).await
    }

    pub async fn update_bid_line_item_field(
        &self,
        id: Uuid,
        patch: BidLineItemFieldPatch,
    ) -> Result<BidLineItemField, CatalogError> {
        self.repo.update_bid_line_item_field(id, patch).await
    }

    pub async fn set_bid_line_item_field_archived(
        &self,
        id: Uuid,
        archived: bool,
    ) -> Result<BidLineItemField, CatalogError> {
        self.repo.set_bid_line_item_field_archived(id, archived).await
    }

    pub async fn delete_bid_line_item_field(&self, id: Uuid) -> Result<(), CatalogError> {
        self.repo.delete_bid_line_item_field(id).await
    }

    pub async fn list_bid_line_item_fields(
        &self,
        bid_line_item_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<BidLineItemField>, CatalogError> {
        self.repo
            .list_bid_line_item_fields(bid_line_item_id, include_archived)
            .await
    }
}

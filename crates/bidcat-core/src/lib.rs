//! Core domain model for the bid catalog hierarchy.
//!
//! Four entity kinds form a strict tree: BidType -> BidCategory ->
//! BidLineItem -> BidLineItemField. Every node carries a dense per-level
//! `sort_order` ordinal and a soft `is_archived` flag. Formula strings are
//! opaque to this subsystem and are stored verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "bidcat-core";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    #[default]
    Labor,
    Material,
    Note,
    LaborMaterialCombo,
}

impl LineItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Labor => "labor",
            Self::Material => "material",
            Self::Note => "note",
            Self::LaborMaterialCombo => "labor_material_combo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "labor" => Some(Self::Labor),
            "material" => Some(Self::Material),
            "note" => Some(Self::Note),
            "labor_material_combo" => Some(Self::LaborMaterialCombo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Select,
    Checkbox,
    Textarea,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Textarea => "textarea",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            "checkbox" => Some(Self::Checkbox),
            "textarea" => Some(Self::Textarea),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FieldSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }
}

/// Top-level catalog entry representing a category of work (e.g. "Tile").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidType {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grouping of line items within a bid type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidCategory {
    pub id: Uuid,
    pub bid_type_id: Uuid,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable/quotable unit of work or material within a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLineItem {
    pub id: Uuid,
    pub bid_category_id: Uuid,
    pub name: String,
    pub line_item_type: LineItemType,
    pub description: String,
    pub show_on_worksheet: bool,
    pub show_on_workorder: bool,
    pub sort_order: i32,
    pub is_archived: bool,
    pub retail_formula: String,
    pub material_retail_formula: String,
    pub material_cogs_formula: String,
    pub labor_retail_formula: String,
    pub labor_cogs_formula: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A custom input attached to a line item (e.g. a numeric quantity field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLineItemField {
    pub id: Uuid,
    pub bid_line_item_id: Uuid,
    pub field_name: String,
    pub field_type: FieldType,
    pub default_value: String,
    pub field_size: FieldSize,
    pub is_hidden: bool,
    pub is_required: bool,
    pub is_taxed: bool,
    pub sort_order: i32,
    pub is_archived: bool,
    pub retail_formula: String,
    pub sub_rate_formula: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create payload for a bid type. Id, ordinal, archive flag and timestamps
/// are assigned by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBidType {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBidCategory {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBidLineItem {
    pub name: String,
    pub line_item_type: LineItemType,
    pub description: String,
    pub show_on_worksheet: bool,
    pub show_on_workorder: bool,
    pub retail_formula: String,
    pub material_retail_formula: String,
    pub material_cogs_formula: String,
    pub labor_retail_formula: String,
    pub labor_cogs_formula: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBidLineItemField {
    pub field_name: String,
    pub field_type: FieldType,
    pub default_value: String,
    pub field_size: FieldSize,
    pub is_hidden: bool,
    pub is_required: bool,
    pub is_taxed: bool,
    pub retail_formula: String,
    pub sub_rate_formula: String,
}

/// Partial update for a bid type: `None` means "leave unchanged".
///
/// Setting `sort_order` directly bypasses the ordinal density guarantee;
/// multi-item reorders go through the reorder session instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTypePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidCategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLineItemPatch {
    pub name: Option<String>,
    pub line_item_type: Option<LineItemType>,
    pub description: Option<String>,
    pub show_on_worksheet: Option<bool>,
    pub show_on_workorder: Option<bool>,
    pub sort_order: Option<i32>,
    pub is_archived: Option<bool>,
    pub retail_formula: Option<String>,
    pub material_retail_formula: Option<String>,
    pub material_cogs_formula: Option<String>,
    pub labor_retail_formula: Option<String>,
    pub labor_cogs_formula: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLineItemFieldPatch {
    pub field_name: Option<String>,
    pub field_type: Option<FieldType>,
    pub default_value: Option<String>,
    pub field_size: Option<FieldSize>,
    pub is_hidden: Option<bool>,
    pub is_required: Option<bool>,
    pub is_taxed: Option<bool>,
    pub sort_order: Option<i32>,
    pub is_archived: Option<bool>,
    pub retail_formula: Option<String>,
    pub sub_rate_formula: Option<String>,
}

/// Fully materialized catalog read model: every level sorted ascending by
/// ordinal, assembled at read time from the flat tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTree {
    pub bid_types: Vec<BidTypeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTypeNode {
    pub bid_type: BidType,
    pub categories: Vec<BidCategoryNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidCategoryNode {
    pub category: BidCategory,
    pub line_items: Vec<BidLineItemNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLineItemNode {
    pub line_item: BidLineItem,
    pub fields: Vec<BidLineItemField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_item_type_spellings_round_trip() {
        for variant in [
            LineItemType::Labor,
            LineItemType::Material,
            LineItemType::Note,
            LineItemType::LaborMaterialCombo,
        ] {
            assert_eq!(LineItemType::parse(variant.as_str()), Some(variant));
        }
        assert_eq!(LineItemType::parse("labour"), None);
    }

    #[test]
    fn field_enum_spellings_round_trip() {
        for variant in [
            FieldType::Text,
            FieldType::Number,
            FieldType::Select,
            FieldType::Checkbox,
            FieldType::Textarea,
        ] {
            assert_eq!(FieldType::parse(variant.as_str()), Some(variant));
        }
        for variant in [FieldSize::Small, FieldSize::Medium, FieldSize::Large] {
            assert_eq!(FieldSize::parse(variant.as_str()), Some(variant));
        }
    }

    #[test]
    fn patches_default_to_no_changes() {
        assert_eq!(BidTypePatch::default(), BidTypePatch { name: None, description: None, sort_order: None, is_archived: None });
        assert!(BidLineItemPatch::default().retail_formula.is_none());
    }
}

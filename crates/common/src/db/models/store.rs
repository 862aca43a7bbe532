//! Store entity, the customer-facing storefront of a tenant

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Globally unique across tenants
    #[sea_orm(column_type = "Text", unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub currency: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub contact_email: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub contact_phone: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub location: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// JSON array of category names
    #[sea_orm(column_type = "JsonBinary")]
    pub categories: Json,

    #[sea_orm(column_type = "Text", nullable)]
    pub theme: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub logo_url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub primary_color: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub secondary_color: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Category names stored in the JSON column
    pub fn category_list(&self) -> Vec<String> {
        self.categories
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Branding fields; `None` leaves the column untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreBranding {
    pub theme: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
}

impl StoreBranding {
    /// Apply the set fields to a store row
    pub fn apply_to(&self, store: &mut Model) {
        if let Some(theme) = &self.theme {
            store.theme = Some(theme.clone());
        }
        if let Some(logo) = &self.logo_url {
            store.logo_url = Some(logo.clone());
        }
        if let Some(color) = &self.primary_color {
            store.primary_color = Some(color.clone());
        }
        if let Some(color) = &self.secondary_color {
            store.secondary_color = Some(color.clone());
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,

    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

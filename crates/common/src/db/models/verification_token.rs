//! Email verification / magic-link token entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verification_tokens")]
pub struct Model {
    /// Email address the token was issued for
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub identifier: String,

    /// SHA-256 of the token sent by email
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub token_hash: String,

    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

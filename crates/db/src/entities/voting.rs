//! Voting entity: one HOA question put to the owners of one or more houses.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voting")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub question_put: String,

    /// Response options (JSON array of strings, fixed at creation)
    #[sea_orm(column_type = "Json")]
    pub response_options: JsonValue,

    pub start_time: DateTimeWithTimeZone,

    #[sea_orm(indexed)]
    pub end_time: DateTimeWithTimeZone,

    #[sea_orm(indexed)]
    pub completed: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub decision: Option<String>,
}

impl Model {
    /// Response options as plain strings.
    ///
    /// Entries that are not strings are skipped; the column is only ever
    /// written from a `Vec<String>`.
    #[must_use]
    pub fn options(&self) -> Vec<String> {
        self.response_options
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::voting_owner::Entity")]
    VotingOwner,
}

impl Related<super::voting_owner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingOwner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

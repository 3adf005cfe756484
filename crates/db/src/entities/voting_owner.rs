//! Owner snapshot entity: one (user, apartment) eligibility record within a voting.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voting_owner")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub voting_id: Uuid,

    #[sea_orm(indexed)]
    pub user_id: Uuid,

    pub apartment_id: Uuid,

    pub house_id: Uuid,

    /// Apartment total area at snapshot time
    pub apartment_area: f64,

    /// Ownership share of the apartment, in (0, 1]
    pub share: f64,

    /// Recorded response; empty until the owner votes
    pub response: String,

    /// Computed when the response is recorded
    pub vote_weight: f64,
}

impl Model {
    /// Whether this owner has recorded a response.
    #[must_use]
    pub fn has_voted(&self) -> bool {
        !self.response.is_empty()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::voting::Entity",
        from = "Column::VotingId",
        to = "super::voting::Column::Id",
        on_delete = "Cascade"
    )]
    Voting,
}

impl Related<super::voting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Voting.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

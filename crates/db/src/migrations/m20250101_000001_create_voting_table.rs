//! Create voting and voting_owner tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create voting table
        manager
            .create_table(
                Table::create()
                    .table(Voting::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Voting::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Voting::QuestionPut).text().not_null())
                    .col(ColumnDef::new(Voting::ResponseOptions).json().not_null())
                    .col(
                        ColumnDef::new(Voting::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Voting::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Voting::Completed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Voting::Decision).text())
                    .check(Expr::col(Voting::EndTime).gt(Expr::col(Voting::StartTime)))
                    .to_owned(),
            )
            .await?;

        // Index: (completed, end_time) for the expiration sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_voting_completed_end_time")
                    .table(Voting::Table)
                    .col(Voting::Completed)
                    .col(Voting::EndTime)
                    .to_owned(),
            )
            .await?;

        // Create voting_owner table
        manager
            .create_table(
                Table::create()
                    .table(VotingOwner::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VotingOwner::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(VotingOwner::VotingId).uuid().not_null())
                    .col(ColumnDef::new(VotingOwner::UserId).uuid().not_null())
                    .col(ColumnDef::new(VotingOwner::ApartmentId).uuid().not_null())
                    .col(ColumnDef::new(VotingOwner::HouseId).uuid().not_null())
                    .col(ColumnDef::new(VotingOwner::ApartmentArea).double().not_null())
                    .col(ColumnDef::new(VotingOwner::Share).double().not_null())
                    .col(
                        ColumnDef::new(VotingOwner::Response)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(VotingOwner::VoteWeight)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_voting_owner_voting")
                            .from(VotingOwner::Table, VotingOwner::VotingId)
                            .to(Voting::Table, Voting::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one owner record per (voting, user, apartment)
        manager
            .create_index(
                Index::create()
                    .name("idx_voting_owner_unique")
                    .table(VotingOwner::Table)
                    .col(VotingOwner::VotingId)
                    .col(VotingOwner::UserId)
                    .col(VotingOwner::ApartmentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for per-user voting listings)
        manager
            .create_index(
                Index::create()
                    .name("idx_voting_owner_user_id")
                    .table(VotingOwner::Table)
                    .col(VotingOwner::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VotingOwner::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Voting::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Voting {
    Table,
    Id,
    QuestionPut,
    ResponseOptions,
    StartTime,
    EndTime,
    Completed,
    Decision,
}

#[derive(Iden)]
enum VotingOwner {
    Table,
    Id,
    VotingId,
    UserId,
    ApartmentId,
    HouseId,
    ApartmentArea,
    Share,
    Response,
    VoteWeight,
}

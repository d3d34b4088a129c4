use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_tables::{Users, Videos};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Likes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Likes::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Likes::UserId).string().not_null())
                    .col(ColumnDef::new(Likes::VideoId).string().not_null())
                    .col(ColumnDef::new(Likes::Created).string().not_null())
                    .index(
                        Index::create()
                            .name("idx_like_pair")
                            .col(Likes::UserId)
                            .col(Likes::VideoId)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_like_user")
                            .from(Likes::Table, Likes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_like_video")
                            .from(Likes::Table, Likes::VideoId)
                            .to(Videos::Table, Videos::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Views::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Views::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Views::UserId).string().not_null())
                    .col(ColumnDef::new(Views::VideoId).string().not_null())
                    .col(ColumnDef::new(Views::Created).string().not_null())
                    .index(
                        Index::create()
                            .name("idx_view_pair")
                            .col(Views::UserId)
                            .col(Views::VideoId)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_view_user")
                            .from(Views::Table, Views::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_view_video")
                            .from(Views::Table, Views::VideoId)
                            .to(Videos::Table, Videos::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Comments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Comments::UserId).string().not_null())
                    .col(ColumnDef::new(Comments::VideoId).string().not_null())
                    .col(ColumnDef::new(Comments::Text).string().not_null())
                    .col(ColumnDef::new(Comments::Created).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_user")
                            .from(Comments::Table, Comments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_video")
                            .from(Comments::Table, Comments::VideoId)
                            .to(Videos::Table, Videos::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Views::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Likes::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Likes {
    Table,
    Id,
    UserId,
    VideoId,
    Created,
}

#[derive(DeriveIden)]
enum Views {
    Table,
    Id,
    UserId,
    VideoId,
    Created,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    UserId,
    VideoId,
    Text,
    Created,
}

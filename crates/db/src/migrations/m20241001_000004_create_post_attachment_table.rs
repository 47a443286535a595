//! Create post attachment table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostAttachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostAttachment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostAttachment::PostId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PostAttachment::StoragePath)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PostAttachment::Position).integer().not_null())
                    .col(
                        ColumnDef::new(PostAttachment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_attachment_post")
                            .from(PostAttachment::Table, PostAttachment::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (post_id, position) keeps attachment order unambiguous
        manager
            .create_index(
                Index::create()
                    .name("idx_post_attachment_post_position")
                    .table(PostAttachment::Table)
                    .col(PostAttachment::PostId)
                    .col(PostAttachment::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostAttachment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PostAttachment {
    Table,
    Id,
    PostId,
    StoragePath,
    Position,
    CreatedAt,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}

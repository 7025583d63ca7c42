use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240801_000001_create_tables" // Make sure this matches with the file name
    }
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Songs {
    Table,
    Id,
    GroupId,
    SongName,
    ReleaseDate,
    Link,
    Text,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    // Define how to apply this migration: create both tables
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create table for Groups
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .col(
                        ColumnDef::new(Groups::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Groups::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // Create table for Songs
        manager
            .create_table(
                Table::create()
                    .table(Songs::Table)
                    .col(
                        ColumnDef::new(Songs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // Can't have a song without a group
                    .col(ColumnDef::new(Songs::GroupId).integer().not_null())
                    .col(ColumnDef::new(Songs::SongName).string().not_null())
                    .col(ColumnDef::new(Songs::ReleaseDate).date().not_null())
                    .col(ColumnDef::new(Songs::Link).string().not_null())
                    .col(ColumnDef::new(Songs::Text).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-songs-group_id")
                            .from(Songs::Table, Songs::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    // Define how to rollback this migration: drop both tables
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Songs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        Ok(())
    }
}

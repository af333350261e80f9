use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_customers_table::Migration),
            Box::new(m20240301_000003_create_providers_table::Migration),
            Box::new(m20240301_000004_create_work_orders_table::Migration),
            Box::new(m20240301_000005_create_work_order_notes_table::Migration),
            Box::new(m20240301_000006_create_work_order_resources_table::Migration),
            Box::new(m20240301_000007_create_invoices_table::Migration),
        ]
    }
}

mod m20240301_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        Role,
        Phone,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_customers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Email).string().null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::Address).string().null())
                        .col(ColumnDef::new(Customers::Notes).text().null())
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_name")
                        .table(Customers::Table)
                        .col(Customers::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Address,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_providers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_providers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Providers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Providers::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Providers::Name).string().not_null())
                        .col(ColumnDef::new(Providers::ContactName).string().null())
                        .col(ColumnDef::new(Providers::Email).string().null())
                        .col(ColumnDef::new(Providers::Phone).string().null())
                        .col(ColumnDef::new(Providers::Specialty).string().null())
                        .col(
                            ColumnDef::new(Providers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Providers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Providers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Providers {
        Table,
        Id,
        Name,
        ContactName,
        Email,
        Phone,
        Specialty,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_work_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_work_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrders::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(WorkOrders::Title).string().not_null())
                        .col(ColumnDef::new(WorkOrders::Description).text().null())
                        .col(ColumnDef::new(WorkOrders::Status).string().not_null())
                        .col(ColumnDef::new(WorkOrders::Priority).string().not_null())
                        .col(ColumnDef::new(WorkOrders::CustomerId).string().null())
                        .col(ColumnDef::new(WorkOrders::ProviderId).string().null())
                        .col(ColumnDef::new(WorkOrders::Address).string().null())
                        .col(
                            ColumnDef::new(WorkOrders::ScheduledStart)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::ScheduledEnd)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::TechnicianIds)
                                .text()
                                .not_null()
                                .default("[]"),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::Price)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(WorkOrders::CreatedBy).string().null())
                        .col(
                            ColumnDef::new(WorkOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_customer_id")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_status")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_scheduled_start")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::ScheduledStart)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkOrders {
        Table,
        Id,
        Title,
        Description,
        Status,
        Priority,
        CustomerId,
        ProviderId,
        Address,
        ScheduledStart,
        ScheduledEnd,
        TechnicianIds,
        Price,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_work_order_notes_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_work_order_notes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrderNotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrderNotes::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderNotes::WorkOrderId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkOrderNotes::AuthorId).string().null())
                        .col(ColumnDef::new(WorkOrderNotes::AuthorName).string().null())
                        .col(ColumnDef::new(WorkOrderNotes::Body).text().not_null())
                        .col(
                            ColumnDef::new(WorkOrderNotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_order_notes_work_order_id")
                        .table(WorkOrderNotes::Table)
                        .col(WorkOrderNotes::WorkOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkOrderNotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkOrderNotes {
        Table,
        Id,
        WorkOrderId,
        AuthorId,
        AuthorName,
        Body,
        CreatedAt,
    }
}

mod m20240301_000006_create_work_order_resources_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_work_order_resources_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrderResources::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrderResources::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::WorkOrderId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::FileName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::ContentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::SizeBytes)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::StoragePath)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::ClientToken)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::UploadedBy)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrderResources::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_order_resources_work_order_id")
                        .table(WorkOrderResources::Table)
                        .col(WorkOrderResources::WorkOrderId)
                        .to_owned(),
                )
                .await?;

            // Upload retries carry the same token and must not create a second row.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_work_order_resources_client_token")
                        .table(WorkOrderResources::Table)
                        .col(WorkOrderResources::WorkOrderId)
                        .col(WorkOrderResources::ClientToken)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkOrderResources::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkOrderResources {
        Table,
        Id,
        WorkOrderId,
        FileName,
        ContentType,
        SizeBytes,
        StoragePath,
        ClientToken,
        UploadedBy,
        CreatedAt,
    }
}

mod m20240301_000007_create_invoices_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_invoices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Invoices::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Invoices::Number)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Invoices::WorkOrderId).string().null())
                        .col(ColumnDef::new(Invoices::CustomerId).string().null())
                        .col(ColumnDef::new(Invoices::Status).string().not_null())
                        .col(
                            ColumnDef::new(Invoices::Total)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Invoices::IssuedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Invoices::DueAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Invoices::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Invoices::Notes).text().null())
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Invoices::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_work_order_id")
                        .table(Invoices::Table)
                        .col(Invoices::WorkOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Invoices {
        Table,
        Id,
        Number,
        WorkOrderId,
        CustomerId,
        Status,
        Total,
        IssuedAt,
        DueAt,
        PaidAt,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

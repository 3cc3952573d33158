use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_service_definitions_table::Migration),
            Box::new(m20240101_000002_create_time_slots_table::Migration),
            Box::new(m20240101_000003_create_orders_table::Migration),
            Box::new(m20240101_000004_create_order_service_lines_table::Migration),
            Box::new(m20240101_000005_create_inspections_table::Migration),
            Box::new(m20240101_000006_create_appointments_table::Migration),
            Box::new(m20240101_000007_create_invoices_table::Migration),
            Box::new(m20240101_000008_create_invoice_items_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_service_definitions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_service_definitions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create service_definitions table aligned with entities::service_definition Model
            manager
                .create_table(
                    Table::create()
                        .table(ServiceDefinitions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceDefinitions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceDefinitions::Name).string().not_null())
                        .col(
                            ColumnDef::new(ServiceDefinitions::Category)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::SubCategory)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::Description)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ServiceDefinitions::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_service_definitions_category")
                        .table(ServiceDefinitions::Table)
                        .col(ServiceDefinitions::Category)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_service_definitions_is_active")
                        .table(ServiceDefinitions::Table)
                        .col(ServiceDefinitions::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ServiceDefinitions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ServiceDefinitions {
        Table,
        Id,
        Name,
        Category,
        SubCategory,
        Description,
        Price,
        IsActive,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000002_create_time_slots_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_time_slots_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create time_slots table aligned with entities::time_slot Model
            manager
                .create_table(
                    Table::create()
                        .table(TimeSlots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TimeSlots::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TimeSlots::SlotDate).date().not_null())
                        .col(ColumnDef::new(TimeSlots::SlotLabel).string().not_null())
                        .col(
                            ColumnDef::new(TimeSlots::TotalCapacity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TimeSlots::ReservedCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(TimeSlots::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(TimeSlots::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // One bucket per (date, label); lazy day creation relies on
            // insert-or-ignore against this constraint
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_time_slots_date_label")
                        .table(TimeSlots::Table)
                        .col(TimeSlots::SlotDate)
                        .col(TimeSlots::SlotLabel)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TimeSlots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum TimeSlots {
        Table,
        Id,
        SlotDate,
        SlotLabel,
        TotalCapacity,
        ReservedCount,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create orders table aligned with entities::order Model
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::VehicleId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::IncludesInspection)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::PaymentMethod).string().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::InvoiceId).uuid().null())
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        VehicleId,
        Status,
        IncludesInspection,
        PaymentMethod,
        TotalAmount,
        InvoiceId,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000004_create_order_service_lines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_service_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create order_service_lines table aligned with
            // entities::order_service_line Model. ServiceId deliberately has no
            // foreign key: lines are priced snapshots and must survive catalog
            // deletions.
            manager
                .create_table(
                    Table::create()
                        .table(OrderServiceLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderServiceLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderServiceLines::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderServiceLines::ServiceId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderServiceLines::LineKind)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderServiceLines::ServiceName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderServiceLines::Category)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderServiceLines::SubCategory)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderServiceLines::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderServiceLines::Notes).string().null())
                        .col(
                            ColumnDef::new(OrderServiceLines::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderServiceLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_service_lines_order_id")
                                .from(OrderServiceLines::Table, OrderServiceLines::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_service_lines_order_id")
                        .table(OrderServiceLines::Table)
                        .col(OrderServiceLines::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_service_lines_service_id")
                        .table(OrderServiceLines::Table)
                        .col(OrderServiceLines::ServiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderServiceLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderServiceLines {
        Table,
        Id,
        OrderId,
        ServiceId,
        LineKind,
        ServiceName,
        Category,
        SubCategory,
        UnitPrice,
        Notes,
        Position,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20240101_000005_create_inspections_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_inspections_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create inspections table aligned with entities::inspection Model
            manager
                .create_table(
                    Table::create()
                        .table(Inspections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inspections::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Inspections::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Inspections::Status).string().not_null())
                        .col(ColumnDef::new(Inspections::SubCategory).string().null())
                        .col(
                            ColumnDef::new(Inspections::ScheduledDate)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Inspections::TimeSlot).string().not_null())
                        .col(
                            ColumnDef::new(Inspections::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Inspections::BodyCondition).string().null())
                        .col(
                            ColumnDef::new(Inspections::EngineCondition)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Inspections::ElectricalCondition)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Inspections::TireCondition).string().null())
                        .col(ColumnDef::new(Inspections::BrakeCondition).string().null())
                        .col(
                            ColumnDef::new(Inspections::TransmissionCondition)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Inspections::InteriorCondition)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Inspections::SuspensionCondition)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Inspections::Notes).string().null())
                        .col(
                            ColumnDef::new(Inspections::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Inspections::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Inspections::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inspections_order_id")
                                .from(Inspections::Table, Inspections::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_inspections_order_id")
                        .table(Inspections::Table)
                        .col(Inspections::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inspections_scheduled_date")
                        .table(Inspections::Table)
                        .col(Inspections::ScheduledDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inspections::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Inspections {
        Table,
        Id,
        OrderId,
        Status,
        SubCategory,
        ScheduledDate,
        TimeSlot,
        Price,
        BodyCondition,
        EngineCondition,
        ElectricalCondition,
        TireCondition,
        BrakeCondition,
        TransmissionCondition,
        InteriorCondition,
        SuspensionCondition,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20240101_000006_create_appointments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_appointments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create appointments table aligned with entities::appointment Model
            manager
                .create_table(
                    Table::create()
                        .table(Appointments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Appointments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Appointments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Appointments::MechanicId).uuid().not_null())
                        .col(
                            ColumnDef::new(Appointments::AppointmentDate)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Appointments::TimeSlot).string().not_null())
                        .col(ColumnDef::new(Appointments::Status).string().not_null())
                        .col(ColumnDef::new(Appointments::Notes).string().null())
                        .col(
                            ColumnDef::new(Appointments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Appointments::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Appointments::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_appointments_order_id")
                                .from(Appointments::Table, Appointments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_appointments_order_id")
                        .table(Appointments::Table)
                        .col(Appointments::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // Mechanic double-booking checks scan by mechanic and date
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_appointments_mechanic_date")
                        .table(Appointments::Table)
                        .col(Appointments::MechanicId)
                        .col(Appointments::AppointmentDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Appointments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Appointments {
        Table,
        Id,
        OrderId,
        MechanicId,
        AppointmentDate,
        TimeSlot,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20240101_000007_create_invoices_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_invoices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create invoices table aligned with entities::invoice Model
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceNumber).string().not_null())
                        .col(ColumnDef::new(Invoices::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Invoices::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Invoices::Status).string().not_null())
                        .col(ColumnDef::new(Invoices::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceDate).timestamp().not_null())
                        .col(ColumnDef::new(Invoices::DueDate).timestamp().not_null())
                        .col(
                            ColumnDef::new(Invoices::SubTotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Invoices::TaxAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Invoices::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Invoices::PaymentReference)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Invoices::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Invoices::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Invoices::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Invoices::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_order_id")
                                .from(Invoices::Table, Invoices::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One invoice per order; generation is idempotent
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_invoices_order_id")
                        .table(Invoices::Table)
                        .col(Invoices::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_invoices_invoice_number")
                        .table(Invoices::Table)
                        .col(Invoices::InvoiceNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_customer_id")
                        .table(Invoices::Table)
                        .col(Invoices::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_status")
                        .table(Invoices::Table)
                        .col(Invoices::Status)
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
        InvoiceNumber,
        OrderId,
        CustomerId,
        Status,
        PaymentMethod,
        InvoiceDate,
        DueDate,
        SubTotal,
        TaxAmount,
        TotalAmount,
        PaymentReference,
        PaidAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20240101_000008_create_invoice_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_invoice_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create invoice_items table aligned with entities::invoice_item Model
            manager
                .create_table(
                    Table::create()
                        .table(InvoiceItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InvoiceItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InvoiceItems::InvoiceId).uuid().not_null())
                        .col(
                            ColumnDef::new(InvoiceItems::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(InvoiceItems::UnitPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(InvoiceItems::TotalPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InvoiceItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoice_items_invoice_id")
                                .from(InvoiceItems::Table, InvoiceItems::InvoiceId)
                                .to(Invoices::Table, Invoices::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoice_items_invoice_id")
                        .table(InvoiceItems::Table)
                        .col(InvoiceItems::InvoiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InvoiceItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InvoiceItems {
        Table,
        Id,
        InvoiceId,
        Description,
        Quantity,
        UnitPrice,
        TotalPrice,
        Position,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Invoices {
        Table,
        Id,
    }
}

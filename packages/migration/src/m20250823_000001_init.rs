use sea_orm::Statement;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::extension::postgres::Type as PgType;
use sea_orm_migration::sea_query::{ColumnDef, ForeignKeyAction, Index, Table};

#[derive(DeriveMigrationName)]
pub struct Migration;

// ----- Iden enums for tables & columns -----
#[derive(Iden, Clone, Copy)]
enum Games {
    Table,
    Id,
    Name,
    Status,
    CurrentTurn,
    HiddenRolePlayerId,
    Winner,
    RosterVersion,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
enum Players {
    Table,
    Id,
    GameId,
    UserId,
    Role,
    CurrentPosition,
    IsActive,
    TaxiTickets,
    BusTickets,
    UndergroundTickets,
    SpecialTickets,
    JoinedAt,
}

#[derive(Iden, Clone, Copy)]
enum Moves {
    Table,
    Id,
    GameId,
    PlayerId,
    TurnNumber,
    FromPosition,
    ToPosition,
    Ticket,
    Revealed,
    CreatedAt,
}

#[derive(Iden)]
enum GameStatusEnum {
    #[iden = "game_status"]
    Type,
}

#[derive(Iden)]
enum PlayerRoleEnum {
    #[iden = "player_role"]
    Type,
}

#[derive(Iden)]
enum TicketKindEnum {
    #[iden = "ticket_kind"]
    Type,
}

// Names matched by the backend's database error mapping.
const MOVES_GAME_TURN_KEY: &str = "moves_game_turn_key";
const PLAYERS_GAME_USER_KEY: &str = "players_game_user_key";

fn non_negative_int<T: Iden + Copy + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .default(0)
        .check(Expr::col(col).gte(0))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create Postgres enums (PostgreSQL only)
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                async fn enum_exists(
                    manager: &SchemaManager<'_>,
                    enum_name: &str,
                ) -> Result<bool, DbErr> {
                    let result = manager
                        .get_connection()
                        .query_one(Statement::from_string(
                            sea_orm::DatabaseBackend::Postgres,
                            format!("SELECT 1 FROM pg_type WHERE typname = '{enum_name}'"),
                        ))
                        .await?;
                    Ok(result.is_some())
                }

                if !enum_exists(manager, "game_status").await? {
                    manager
                        .create_type(
                            PgType::create()
                                .as_enum(GameStatusEnum::Type)
                                .values(["WAITING", "IN_PROGRESS", "FINISHED"])
                                .to_owned(),
                        )
                        .await?;
                }

                if !enum_exists(manager, "player_role").await? {
                    manager
                        .create_type(
                            PgType::create()
                                .as_enum(PlayerRoleEnum::Type)
                                .values(["SEEKER", "EVADER"])
                                .to_owned(),
                        )
                        .await?;
                }

                if !enum_exists(manager, "ticket_kind").await? {
                    manager
                        .create_type(
                            PgType::create()
                                .as_enum(TicketKindEnum::Type)
                                .values(["TAXI", "BUS", "UNDERGROUND", "SPECIAL"])
                                .to_owned(),
                        )
                        .await?;
                }
            }
            sea_orm::DatabaseBackend::Sqlite => {
                // Stored as TEXT
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".into()));
            }
        }

        // games
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Games::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(Games::Name).string().not_null())
                    .col(
                        ColumnDef::new(Games::Status)
                            .custom(GameStatusEnum::Type)
                            .not_null()
                            .default("WAITING"),
                    )
                    .col(&mut non_negative_int(Games::CurrentTurn))
                    // No FK: the evader's player row is created after the game.
                    .col(ColumnDef::new(Games::HiddenRolePlayerId).big_integer().null())
                    .col(ColumnDef::new(Games::Winner).custom(PlayerRoleEnum::Type).null())
                    .col(&mut non_negative_int(Games::RosterVersion))
                    .col(
                        ColumnDef::new(Games::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // players
        manager
            .create_table(
                Table::create()
                    .table(Players::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Players::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(Players::GameId).big_integer().not_null())
                    .col(ColumnDef::new(Players::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Players::Role)
                            .custom(PlayerRoleEnum::Type)
                            .not_null(),
                    )
                    .col(&mut non_negative_int(Players::CurrentPosition))
                    .col(
                        ColumnDef::new(Players::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(&mut non_negative_int(Players::TaxiTickets))
                    .col(&mut non_negative_int(Players::BusTickets))
                    .col(&mut non_negative_int(Players::UndergroundTickets))
                    .col(&mut non_negative_int(Players::SpecialTickets))
                    .col(
                        ColumnDef::new(Players::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_players_game_id")
                            .from(Players::Table, Players::GameId)
                            .to(Games::Table, Games::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One seat per user per game
        manager
            .create_index(
                Index::create()
                    .name(PLAYERS_GAME_USER_KEY)
                    .table(Players::Table)
                    .col(Players::GameId)
                    .col(Players::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Roster reads sort by join time
        manager
            .create_index(
                Index::create()
                    .name("ix_players_game_joined")
                    .table(Players::Table)
                    .col(Players::GameId)
                    .col(Players::JoinedAt)
                    .col(Players::Id)
                    .to_owned(),
            )
            .await?;

        // moves
        manager
            .create_table(
                Table::create()
                    .table(Moves::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Moves::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(Moves::GameId).big_integer().not_null())
                    .col(ColumnDef::new(Moves::PlayerId).big_integer().not_null())
                    .col(&mut non_negative_int(Moves::TurnNumber))
                    .col(&mut non_negative_int(Moves::FromPosition))
                    .col(&mut non_negative_int(Moves::ToPosition))
                    // NULL marks a pass for a departed seat
                    .col(ColumnDef::new(Moves::Ticket).custom(TicketKindEnum::Type).null())
                    .col(
                        ColumnDef::new(Moves::Revealed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Moves::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_moves_game_id")
                            .from(Moves::Table, Moves::GameId)
                            .to(Games::Table, Games::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_moves_player_id")
                            .from(Moves::Table, Moves::PlayerId)
                            .to(Players::Table, Players::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one accepted move per turn
        manager
            .create_index(
                Index::create()
                    .name(MOVES_GAME_TURN_KEY)
                    .table(Moves::Table)
                    .col(Moves::GameId)
                    .col(Moves::TurnNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // drop in reverse order + drop index before table
        manager
            .drop_index(
                Index::drop()
                    .name(MOVES_GAME_TURN_KEY)
                    .table(Moves::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Moves::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("ix_players_game_joined")
                    .table(Players::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name(PLAYERS_GAME_USER_KEY)
                    .table(Players::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Players::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await?;

        // Drop enum types (PostgreSQL only)
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                for name in ["ticket_kind", "player_role", "game_status"] {
                    manager
                        .drop_type(PgType::drop().name(Alias::new(name)).if_exists().to_owned())
                        .await?;
                }
            }
            sea_orm::DatabaseBackend::Sqlite => {
                // SQLite doesn't have enum types to drop
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".into()));
            }
        }

        Ok(())
    }
}

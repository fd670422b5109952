//! Append-only audit trail (spec.md §9).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(AuditLog::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(AuditLog::Id)
							.big_integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(AuditLog::TenantId).string().not_null())
					.col(ColumnDef::new(AuditLog::ActorType).string().not_null())
					.col(ColumnDef::new(AuditLog::ActorId).string().not_null())
					.col(ColumnDef::new(AuditLog::Action).string().not_null())
					.col(ColumnDef::new(AuditLog::ObjectType).string())
					.col(ColumnDef::new(AuditLog::ObjectId).string())
					.col(ColumnDef::new(AuditLog::Payload).text().not_null())
					.col(ColumnDef::new(AuditLog::CreatedAt).timestamp().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_audit_log_tenant_created")
					.table(AuditLog::Table)
					.col(AuditLog::TenantId)
					.col(AuditLog::CreatedAt)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_audit_log_action")
					.table(AuditLog::Table)
					.col(AuditLog::Action)
					.to_owned(),
			)
			.await?;

		// Append-only at the database level: no application bug or future
		// migration can quietly start mutating history out from under it
		// (spec.md §4.3, §9 "the store refuses UPDATE/DELETE on this table").
		if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
			manager
				.get_connection()
				.execute_unprepared(
					"CREATE TRIGGER audit_log_no_update
					 BEFORE UPDATE ON audit_log
					 BEGIN
					     SELECT RAISE(ABORT, 'audit_log is append-only');
					 END;",
				)
				.await?;
			manager
				.get_connection()
				.execute_unprepared(
					"CREATE TRIGGER audit_log_no_delete
					 BEFORE DELETE ON audit_log
					 BEGIN
					     SELECT RAISE(ABORT, 'audit_log is append-only');
					 END;",
				)
				.await?;
		} else {
			manager
				.get_connection()
				.execute_unprepared(
					"CREATE OR REPLACE FUNCTION audit_log_reject_mutation() RETURNS TRIGGER AS $$
					 BEGIN
					     RAISE EXCEPTION 'audit_log is append-only';
					 END;
					 $$ LANGUAGE plpgsql;",
				)
				.await?;
			manager
				.get_connection()
				.execute_unprepared(
					"CREATE TRIGGER audit_log_no_mutation
					 BEFORE UPDATE OR DELETE ON audit_log
					 FOR EACH ROW EXECUTE FUNCTION audit_log_reject_mutation();",
				)
				.await?;
		}

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
			manager.get_connection().execute_unprepared("DROP TRIGGER IF EXISTS audit_log_no_update;").await?;
			manager.get_connection().execute_unprepared("DROP TRIGGER IF EXISTS audit_log_no_delete;").await?;
		} else {
			manager.get_connection().execute_unprepared("DROP TRIGGER IF EXISTS audit_log_no_mutation ON audit_log;").await?;
			manager.get_connection().execute_unprepared("DROP FUNCTION IF EXISTS audit_log_reject_mutation;").await?;
		}
		manager.drop_table(Table::drop().table(AuditLog::Table).to_owned()).await
	}
}

#[derive(DeriveIden)]
enum AuditLog {
	Table,
	Id,
	TenantId,
	ActorType,
	ActorId,
	Action,
	ObjectType,
	ObjectId,
	Payload,
	CreatedAt,
}

//! Tuples, namespace configs, records, content, users and API keys.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Tuples::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Tuples::Id)
							.big_integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Tuples::TenantId).string().not_null())
					.col(ColumnDef::new(Tuples::SubjectType).string().not_null())
					.col(ColumnDef::new(Tuples::SubjectId).string().not_null())
					.col(
						ColumnDef::new(Tuples::SubjectRelation)
							.string()
							.not_null()
							.default(""),
					)
					.col(ColumnDef::new(Tuples::Relation).string().not_null())
					.col(ColumnDef::new(Tuples::ObjectType).string().not_null())
					.col(ColumnDef::new(Tuples::ObjectId).string().not_null())
					.col(ColumnDef::new(Tuples::CreatedAt).timestamp().not_null())
					.col(ColumnDef::new(Tuples::ExpiresAt).timestamp())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_tuples_unique_fact")
					.table(Tuples::Table)
					.col(Tuples::TenantId)
					.col(Tuples::SubjectType)
					.col(Tuples::SubjectId)
					.col(Tuples::SubjectRelation)
					.col(Tuples::Relation)
					.col(Tuples::ObjectType)
					.col(Tuples::ObjectId)
					.unique()
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_tuples_forward")
					.table(Tuples::Table)
					.col(Tuples::TenantId)
					.col(Tuples::ObjectType)
					.col(Tuples::ObjectId)
					.col(Tuples::Relation)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_tuples_reverse")
					.table(Tuples::Table)
					.col(Tuples::TenantId)
					.col(Tuples::SubjectType)
					.col(Tuples::SubjectId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(NamespaceConfigs::Table)
					.if_not_exists()
					.col(ColumnDef::new(NamespaceConfigs::ObjectType).string().not_null())
					.col(ColumnDef::new(NamespaceConfigs::TenantId).string().not_null())
					.col(ColumnDef::new(NamespaceConfigs::ConfigJson).text().not_null())
					.col(ColumnDef::new(NamespaceConfigs::UpdatedAt).timestamp().not_null())
					.primary_key(
						Index::create()
							.col(NamespaceConfigs::ObjectType)
							.col(NamespaceConfigs::TenantId),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Content::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Content::ContentHash)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(Content::Size).big_integer().not_null())
					.col(ColumnDef::new(Content::RefCount).big_integer().not_null())
					.col(ColumnDef::new(Content::BackendLocator).string().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Records::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Records::Id)
							.big_integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Records::TenantId).string().not_null())
					.col(ColumnDef::new(Records::Path).string().not_null())
					.col(ColumnDef::new(Records::ParentPath).string())
					.col(ColumnDef::new(Records::Kind).string().not_null())
					.col(ColumnDef::new(Records::ContentHash).string())
					.col(ColumnDef::new(Records::Size).big_integer().not_null())
					.col(ColumnDef::new(Records::Etag).string().not_null())
					.col(ColumnDef::new(Records::OwnerType).string().not_null())
					.col(ColumnDef::new(Records::OwnerId).string().not_null())
					.col(ColumnDef::new(Records::Metadata).text().not_null())
					.col(ColumnDef::new(Records::CreatedAt).timestamp().not_null())
					.col(ColumnDef::new(Records::UpdatedAt).timestamp().not_null())
					.col(ColumnDef::new(Records::Version).big_integer().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_records_tenant_path")
					.table(Records::Table)
					.col(Records::TenantId)
					.col(Records::Path)
					.unique()
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_records_parent")
					.table(Records::Table)
					.col(Records::TenantId)
					.col(Records::ParentPath)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Users::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Users::UserId)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(Users::TenantId).string().not_null())
					.col(ColumnDef::new(Users::DisplayName).string().not_null())
					.col(ColumnDef::new(Users::IsAdmin).boolean().not_null())
					.col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(ApiKeys::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(ApiKeys::KeyId)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(ApiKeys::TenantId).string().not_null())
					.col(ColumnDef::new(ApiKeys::SubjectType).string().not_null())
					.col(ColumnDef::new(ApiKeys::SubjectId).string().not_null())
					.col(ColumnDef::new(ApiKeys::Prefix).string().not_null())
					.col(ColumnDef::new(ApiKeys::HmacDigest).string().not_null())
					.col(ColumnDef::new(ApiKeys::Scopes).text().not_null())
					.col(ColumnDef::new(ApiKeys::CreatedAt).timestamp().not_null())
					.col(ColumnDef::new(ApiKeys::RevokedAt).timestamp())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_api_keys_prefix")
					.table(ApiKeys::Table)
					.col(ApiKeys::Prefix)
					.unique()
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager.drop_table(Table::drop().table(ApiKeys::Table).to_owned()).await?;
		manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
		manager.drop_table(Table::drop().table(Records::Table).to_owned()).await?;
		manager.drop_table(Table::drop().table(Content::Table).to_owned()).await?;
		manager
			.drop_table(Table::drop().table(NamespaceConfigs::Table).to_owned())
			.await?;
		manager.drop_table(Table::drop().table(Tuples::Table).to_owned()).await
	}
}

#[derive(DeriveIden)]
enum Tuples {
	Table,
	Id,
	TenantId,
	SubjectType,
	SubjectId,
	SubjectRelation,
	Relation,
	ObjectType,
	ObjectId,
	CreatedAt,
	ExpiresAt,
}

#[derive(DeriveIden)]
enum NamespaceConfigs {
	Table,
	ObjectType,
	TenantId,
	ConfigJson,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum Content {
	Table,
	ContentHash,
	Size,
	RefCount,
	BackendLocator,
}

#[derive(DeriveIden)]
enum Records {
	Table,
	Id,
	TenantId,
	Path,
	ParentPath,
	Kind,
	ContentHash,
	Size,
	Etag,
	OwnerType,
	OwnerId,
	Metadata,
	CreatedAt,
	UpdatedAt,
	Version,
}

#[derive(DeriveIden)]
enum Users {
	Table,
	UserId,
	TenantId,
	DisplayName,
	IsAdmin,
	CreatedAt,
}

#[derive(DeriveIden)]
enum ApiKeys {
	Table,
	KeyId,
	TenantId,
	SubjectType,
	SubjectId,
	Prefix,
	HmacDigest,
	Scopes,
	CreatedAt,
	RevokedAt,
}

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    #[sea_orm(column_name = "key_hash")]
    #[sea_orm(unique_key = "user_key_hash")]
    pub api_key: String,
    /// First 10 characters of the plaintext key, kept for UI display only.
    pub key_prefix: Option<String>,
    pub label: Option<String>,
    pub enabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    // Ceilings: null/0 means unlimited.
    pub daily_request_ceiling: Option<i64>,
    pub monthly_request_ceiling: Option<i64>,
    pub lifetime_request_ceiling: Option<i64>,
    pub daily_cost_ceiling: Option<f64>,
    pub monthly_cost_ceiling: Option<f64>,
    pub lifetime_cost_ceiling: Option<f64>,
    pub per_minute_ceiling: Option<i64>,
    pub per_ip_concurrency_ceiling: Option<i64>,
    pub validity_days: Option<i64>,
    #[sea_orm(belongs_to, from = "user_id", to = "id", on_delete = "Cascade")]
    pub user: HasOne<super::users::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}

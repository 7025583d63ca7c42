use serde::Serialize;
use sqlx::FromRow;

#[derive(FromRow, PartialEq, Eq, Clone, Debug, Serialize)]
pub struct GroupSqlxModel {
    pub id: i32,
    pub name: String,
}

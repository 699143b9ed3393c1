use async_trait::async_trait;

use crate::{
    application::repos::{ColorsRepo, ColorsWriteRepo, RepoError},
    domain::{colors::normalize_name, entities::ColorRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ColorRow {
    id: i64,
    name: String,
    hex: String,
}

impl From<ColorRow> for ColorRecord {
    fn from(row: ColorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            hex: row.hex,
        }
    }
}

#[async_trait]
impl ColorsRepo for PostgresRepositories {
    async fn list_all_colors(&self) -> Result<Vec<ColorRecord>, RepoError> {
        let rows: Vec<ColorRow> = sqlx::query_as("SELECT id, name, hex FROM colors ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ColorRecord::from).collect())
    }
}

#[async_trait]
impl ColorsWriteRepo for PostgresRepositories {
    async fn create_color(&self, name: &str, hex: &str) -> Result<i64, RepoError> {
        let name = normalize_name(name).map_err(|err| RepoError::invalid_input(err.to_string()))?;

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM colors WHERE name = $1")
            .bind(&name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if let Some((id,)) = existing {
            return Ok(id);
        }

        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO colors (name, hex) VALUES ($1, $2) RETURNING id")
                .bind(&name)
                .bind(hex)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(id)
    }

    async fn delete_color(&self, name: &str) -> Result<(), RepoError> {
        let name = normalize_name(name).map_err(|err| RepoError::invalid_input(err.to_string()))?;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let color: Option<(i64,)> = sqlx::query_as("SELECT id FROM colors WHERE name = $1")
            .bind(&name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let Some((color_id,)) = color else {
            return Err(RepoError::NotFound);
        };

        // Observed policy: deleting a color deletes every bear associated
        // with it, even partially tagged ones.
        let bear_ids: Vec<(i64,)> =
            sqlx::query_as("SELECT bear_id FROM bear_colors WHERE color_id = $1")
                .bind(color_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        if !bear_ids.is_empty() {
            let bear_ids: Vec<i64> = bear_ids.into_iter().map(|(id,)| id).collect();
            sqlx::query("DELETE FROM bears WHERE id = ANY($1)")
                .bind(&bear_ids)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        sqlx::query("DELETE FROM colors WHERE id = $1")
            .bind(color_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::{
    application::repos::{BearsRepo, BearsWriteRepo, CreateBearParams, RepoError},
    domain::{colors::normalize_names, entities::BearRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct BearRow {
    id: i64,
    name: String,
    size: i64,
}

#[derive(sqlx::FromRow)]
struct BearColorRow {
    bear_id: i64,
    color_id: i64,
}

#[async_trait]
impl BearsRepo for PostgresRepositories {
    async fn list_bears_in_range(&self, min: i64, max: i64) -> Result<Vec<BearRecord>, RepoError> {
        let rows: Vec<BearRow> = sqlx::query_as(
            "SELECT id, name, size FROM bears WHERE size BETWEEN $1 AND $2 ORDER BY size, id",
        )
        .bind(min)
        .bind(max)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let links: Vec<BearColorRow> = sqlx::query_as(
            "SELECT bear_id, color_id FROM bear_colors \
             WHERE bear_id = ANY($1) ORDER BY bear_id, color_id",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut colors_by_bear: HashMap<i64, Vec<i64>> = HashMap::new();
        for link in links {
            colors_by_bear
                .entry(link.bear_id)
                .or_default()
                .push(link.color_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| BearRecord {
                id: row.id,
                name: row.name,
                size: row.size,
                color_ids: colors_by_bear.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl BearsWriteRepo for PostgresRepositories {
    async fn create_bear(&self, params: CreateBearParams) -> Result<BearRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO bears (name, size) VALUES ($1, $2) RETURNING id")
                .bind(&params.name)
                .bind(params.size)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let wanted = normalize_names(&params.colors);
        let mut color_ids = if wanted.is_empty() {
            Vec::new()
        } else {
            ensure_colors(&mut tx, &wanted).await?
        };
        link_colors(&mut tx, id, &color_ids).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        color_ids.sort_unstable();
        Ok(BearRecord {
            id,
            name: params.name,
            size: params.size,
            color_ids,
        })
    }

    async fn rename_bear(&self, id: i64, name: &str) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE bears SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn resize_bear(&self, id: i64, size: i64) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE bears SET size = $2 WHERE id = $1")
            .bind(id)
            .bind(size)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_bear_colors(&self, id: i64, colors: &[String]) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM bears WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if exists.is_none() {
            return Err(RepoError::NotFound);
        }

        sqlx::query("DELETE FROM bear_colors WHERE bear_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let wanted = normalize_names(colors);
        if !wanted.is_empty() {
            let color_ids = ensure_colors(&mut tx, &wanted).await?;
            link_colors(&mut tx, id, &color_ids).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_bear(&self, id: i64) -> Result<(), RepoError> {
        // bear_colors rows go with the bear via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM bears WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

/// Insert any missing colors (empty `hex`) and return the ids of every
/// wanted name. Names must already be normalized.
async fn ensure_colors(
    tx: &mut Transaction<'_, Postgres>,
    names: &[String],
) -> Result<Vec<i64>, RepoError> {
    for name in names {
        sqlx::query("INSERT INTO colors (name, hex) VALUES ($1, '') ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM colors WHERE name = ANY($1) ORDER BY id")
            .bind(names.to_vec())
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn link_colors(
    tx: &mut Transaction<'_, Postgres>,
    bear_id: i64,
    color_ids: &[i64],
) -> Result<(), RepoError> {
    for color_id in color_ids {
        sqlx::query(
            "INSERT INTO bear_colors (bear_id, color_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(bear_id)
        .bind(color_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    }
    Ok(())
}

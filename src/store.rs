// src/store.rs
//! SQLite persistence for videos and their categorized comment summaries.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::summarize::CategorySummary;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub created_at: NaiveDateTime,
}

impl Video {
    pub async fn create(url: &str, title: &str, summary: &str, pool: &SqlitePool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO videos (url, title, summary) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(url)
        .bind(title)
        .bind(summary)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: i64, pool: &SqlitePool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_url(url: &str, pool: &SqlitePool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM videos WHERE url = $1")
            .bind(url)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list(skip: i64, limit: i64, pool: &SqlitePool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM videos ORDER BY id LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(skip)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoCategorySummary {
    pub id: i64,
    pub video_id: i64,
    pub category: String,
    pub summary: String,
    pub category_count: i64,
    /// JSON-serialized string array.
    pub insights: String,
    /// JSON-serialized string array.
    pub representative_comments: String,
}

impl VideoCategorySummary {
    pub async fn create(
        video_id: i64,
        category: &str,
        summary: &CategorySummary,
        pool: &SqlitePool,
    ) -> Result<Self> {
        let insights = serde_json::to_string(&summary.insights)?;
        let representative = serde_json::to_string(&summary.representative_comments)?;
        sqlx::query_as::<_, Self>(
            "INSERT INTO video_category_summaries
                 (video_id, category, summary, category_count, insights, representative_comments)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(video_id)
        .bind(category)
        .bind(&summary.summary)
        .bind(i64::from(summary.category_count))
        .bind(insights)
        .bind(representative)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn list_for_video(video_id: i64, pool: &SqlitePool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM video_category_summaries WHERE video_id = $1 ORDER BY category",
        )
        .bind(video_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Typed view of the stored row; tolerates hand-edited rows by falling
    /// back to empty lists.
    pub fn to_category_summary(&self) -> CategorySummary {
        CategorySummary {
            summary: self.summary.clone(),
            category_count: self.category_count.max(0) as u32,
            insights: serde_json::from_str(&self.insights).unwrap_or_default(),
            representative_comments: serde_json::from_str(&self.representative_comments)
                .unwrap_or_default(),
        }
    }
}

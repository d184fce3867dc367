// Read-only queries against the property inventory database.

use adsdash_common::{Developer, Project};
use sqlx::PgPool;

use crate::error::Result;

/// Unit statuses that count as currently on the market.
pub const LISTED_UNIT_STATUSES: [&str; 2] = ["available", "for_sale"];

#[derive(Clone)]
pub struct InventoryReader {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRecord {
    id: i64,
    name: String,
    developer_id: i64,
    status: Option<String>,
    units_count: i64,
}

impl InventoryReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All developers, alphabetically.
    pub async fn developers(&self) -> Result<Vec<Developer>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id::BIGINT, name::TEXT FROM developers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Developer { id, name })
            .collect())
    }

    /// A developer's projects with their count of listed units, most units first.
    pub async fn projects_by_developer(&self, developer_id: i64) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRecord>(
            r#"
            SELECT p.id::BIGINT                                    AS id,
                   p.name::TEXT                                    AS name,
                   p.developer_id::BIGINT                          AS developer_id,
                   p.status::TEXT                                  AS status,
                   COUNT(u.id) FILTER (WHERE u.status::TEXT = ANY($2)) AS units_count
            FROM projects p
            LEFT JOIN units u ON u.project_id = p.id
            WHERE p.developer_id = $1
            GROUP BY p.id, p.name, p.developer_id, p.status
            ORDER BY units_count DESC, p.name
            "#,
        )
        .bind(developer_id)
        .bind(&LISTED_UNIT_STATUSES[..])
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Project {
                id: r.id,
                name: r.name,
                developer_id: r.developer_id,
                status: r.status,
                units_count: r.units_count,
            })
            .collect())
    }
}

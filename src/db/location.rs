use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct LocationStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Region {
    pub id: i64,
    pub country_id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct City {
    pub id: i64,
    pub region_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Commune {
    pub id: i64,
    pub city_id: i64,
    pub name: String,
}

impl LocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_region(
        &self,
        country_id: i64,
        name: &str,
        code: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO regions (country_id, name, code) VALUES (?, ?, ?)")
            .bind(country_id)
            .bind(name)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn create_city(&self, region_id: i64, name: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO cities (region_id, name) VALUES (?, ?)")
            .bind(region_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn create_commune(&self, city_id: i64, name: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO communes (city_id, name) VALUES (?, ?)")
            .bind(city_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// All regions, ordered by name.
    pub async fn list_regions(&self) -> Result<Vec<Region>, sqlx::Error> {
        sqlx::query_as("SELECT id, country_id, name, code FROM regions ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
    }

    /// Cities of a region, ordered by name. Unknown region gives an empty list.
    pub async fn list_cities(&self, region_id: i64) -> Result<Vec<City>, sqlx::Error> {
        sqlx::query_as("SELECT id, region_id, name FROM cities WHERE region_id = ? ORDER BY name, id")
            .bind(region_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Communes of a city, ordered by name. Unknown city gives an empty list.
    pub async fn list_communes(&self, city_id: i64) -> Result<Vec<Commune>, sqlx::Error> {
        sqlx::query_as("SELECT id, city_id, name FROM communes WHERE city_id = ? ORDER BY name, id")
            .bind(city_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn commune_exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM communes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

//! Postal addresses owned by users.
//!
//! Every query is scoped by owner: an address that belongs to someone else
//! behaves exactly like one that does not exist.

use serde::Serialize;
use sqlx::QueryBuilder;
use sqlx::sqlite::{Sqlite, SqlitePool};

#[derive(Clone)]
pub struct AddressStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub commune_id: i64,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for a new address. Callers validate and trim before insert.
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub commune_id: i64,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
}

/// Partial update. `apartment: Some(None)` clears the apartment.
#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
    pub commune_id: Option<i64>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub apartment: Option<Option<String>>,
}

impl AddressPatch {
    pub fn is_empty(&self) -> bool {
        self.commune_id.is_none()
            && self.street.is_none()
            && self.number.is_none()
            && self.apartment.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionRef {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// Address with its commune, city and region resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AddressView {
    pub id: i64,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub commune: NamedRef,
    pub city: NamedRef,
    pub region: RegionRef,
}

#[derive(sqlx::FromRow)]
struct AddressViewRow {
    id: i64,
    street: String,
    number: String,
    apartment: Option<String>,
    created_at: i64,
    updated_at: i64,
    commune_id: i64,
    commune_name: String,
    city_id: i64,
    city_name: String,
    region_id: i64,
    region_name: String,
    region_code: String,
}

impl From<AddressViewRow> for AddressView {
    fn from(row: AddressViewRow) -> Self {
        Self {
            id: row.id,
            street: row.street,
            number: row.number,
            apartment: row.apartment,
            created_at: row.created_at,
            updated_at: row.updated_at,
            commune: NamedRef {
                id: row.commune_id,
                name: row.commune_name,
            },
            city: NamedRef {
                id: row.city_id,
                name: row.city_name,
            },
            region: RegionRef {
                id: row.region_id,
                name: row.region_name,
                code: row.region_code,
            },
        }
    }
}

const VIEW_SELECT: &str = "SELECT a.id, a.street, a.number, a.apartment, a.created_at, a.updated_at,
        co.id AS commune_id, co.name AS commune_name,
        ci.id AS city_id, ci.name AS city_name,
        r.id AS region_id, r.name AS region_name, r.code AS region_code
     FROM addresses a
     JOIN communes co ON co.id = a.commune_id
     JOIN cities ci ON ci.id = co.city_id
     JOIN regions r ON r.id = ci.region_id";

impl AddressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an address for a user. Returns the address ID.
    /// An unknown commune surfaces as a foreign key violation.
    pub async fn create_for_user(
        &self,
        user_id: i64,
        address: &NewAddress,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO addresses (user_id, commune_id, street, number, apartment) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(address.commune_id)
        .bind(&address.street)
        .bind(&address.number)
        .bind(&address.apartment)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_for_user(&self, user_id: i64, id: i64) -> Result<Option<Address>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, commune_id, street, number, apartment, created_at, updated_at
             FROM addresses WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_view_for_user(
        &self,
        user_id: i64,
        id: i64,
    ) -> Result<Option<AddressView>, sqlx::Error> {
        let row: Option<AddressViewRow> =
            sqlx::query_as(&format!("{VIEW_SELECT} WHERE a.id = ? AND a.user_id = ?"))
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(AddressView::from))
    }

    /// The user's addresses, newest first, fully expanded.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<AddressView>, sqlx::Error> {
        let rows: Vec<AddressViewRow> = sqlx::query_as(&format!(
            "{VIEW_SELECT} WHERE a.user_id = ? ORDER BY a.created_at DESC, a.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AddressView::from).collect())
    }

    /// Apply a partial update. Returns false if the address is not the user's.
    pub async fn update_for_user(
        &self,
        user_id: i64,
        id: i64,
        patch: &AddressPatch,
    ) -> Result<bool, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE addresses SET updated_at = unixepoch()");
        if let Some(commune_id) = patch.commune_id {
            query.push(", commune_id = ").push_bind(commune_id);
        }
        if let Some(street) = &patch.street {
            query.push(", street = ").push_bind(street);
        }
        if let Some(number) = &patch.number {
            query.push(", number = ").push_bind(number);
        }
        if let Some(apartment) = &patch.apartment {
            query.push(", apartment = ").push_bind(apartment);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an address. Returns false if the address is not the user's.
    pub async fn delete_for_user(&self, user_id: i64, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, is_foreign_key_violation};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db.users().create("alice", "digest", "user").await.unwrap();
        let locations = db.locations();
        let region = locations.create_region(1, "Metropolitana", "RM").await.unwrap();
        let city = locations.create_city(region, "Santiago").await.unwrap();
        let commune = locations.create_commune(city, "Providencia").await.unwrap();
        (db, user_id, commune)
    }

    fn new_address(commune_id: i64, street: &str) -> NewAddress {
        NewAddress {
            commune_id,
            street: street.to_string(),
            number: "123".to_string(),
            apartment: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_expanded() {
        let (db, user_id, commune) = setup().await;
        let store = db.addresses();

        let first = store
            .create_for_user(user_id, &new_address(commune, "Av. Providencia"))
            .await
            .unwrap();
        let second = store
            .create_for_user(user_id, &new_address(commune, "Los Leones"))
            .await
            .unwrap();

        let list = store.list_for_user(user_id).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].id, first);
        assert_eq!(list[0].commune.name, "Providencia");
        assert_eq!(list[0].city.name, "Santiago");
        assert_eq!(list[0].region.code, "RM");
    }

    #[tokio::test]
    async fn test_unknown_commune_is_foreign_key_violation() {
        let (db, user_id, commune) = setup().await;

        let err = db
            .addresses()
            .create_for_user(user_id, &new_address(commune + 100, "Nowhere"))
            .await
            .unwrap_err();
        assert!(is_foreign_key_violation(&err));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_owner_scoped() {
        let (db, user_id, commune) = setup().await;
        let other = db.users().create("bob", "digest", "user").await.unwrap();
        let store = db.addresses();

        let mut address = new_address(commune, "Av. Providencia");
        address.apartment = Some("4B".to_string());
        let id = store.create_for_user(user_id, &address).await.unwrap();

        let patch = AddressPatch {
            number: Some("456".to_string()),
            ..Default::default()
        };
        assert!(!store.update_for_user(other, id, &patch).await.unwrap());
        assert!(store.update_for_user(user_id, id, &patch).await.unwrap());

        let row = store.get_for_user(user_id, id).await.unwrap().unwrap();
        assert_eq!(row.number, "456");
        assert_eq!(row.street, "Av. Providencia");
        assert_eq!(row.apartment.as_deref(), Some("4B"));

        let clear = AddressPatch {
            apartment: Some(None),
            ..Default::default()
        };
        assert!(store.update_for_user(user_id, id, &clear).await.unwrap());
        let row = store.get_for_user(user_id, id).await.unwrap().unwrap();
        assert!(row.apartment.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let (db, user_id, commune) = setup().await;
        let other = db.users().create("bob", "digest", "user").await.unwrap();
        let store = db.addresses();

        let id = store
            .create_for_user(user_id, &new_address(commune, "Av. Providencia"))
            .await
            .unwrap();

        assert!(!store.delete_for_user(other, id).await.unwrap());
        assert!(store.delete_for_user(user_id, id).await.unwrap());
        assert!(!store.delete_for_user(user_id, id).await.unwrap());
        assert!(store.list_for_user(user_id).await.unwrap().is_empty());
    }

    #[test]
    fn test_empty_patch() {
        assert!(AddressPatch::default().is_empty());
        let patch = AddressPatch {
            apartment: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}

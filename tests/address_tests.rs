//! Tests for per-user address CRUD and the profile endpoint.

mod common;

use axum::http::StatusCode;
use common::{TestApp, access_token, create_user, setup};
use facility_api::db::Database;
use serde_json::json;

/// Seed one region, city and commune. Returns the commune ID.
async fn seed_catalog(db: &Database) -> i64 {
    let locations = db.locations();
    let region = locations.create_region(1, "Metropolitana", "RM").await.unwrap();
    let city = locations.create_city(region, "Santiago").await.unwrap();
    locations.create_commune(city, "Providencia").await.unwrap()
}

async fn login_token(t: &TestApp, username: &str) -> String {
    create_user(&t.db, username, "user").await;
    access_token(&t.login(username).await).to_string()
}

#[tokio::test]
async fn test_create_and_list_addresses() {
    let t = setup().await;
    let commune = seed_catalog(&t.db).await;
    let token = login_token(&t, "alice").await;

    let (status, created) = t
        .send(
            "POST",
            "/api/v1/addresses",
            Some(&token),
            Some(json!({
                "commune_id": commune,
                "street": "  Av. Providencia ",
                "number": "1234",
                "apartment": "  "
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["street"], "Av. Providencia");
    assert!(created.get("apartment").is_none());
    assert_eq!(created["commune"]["name"], "Providencia");
    assert_eq!(created["city"]["name"], "Santiago");
    assert_eq!(created["region"]["code"], "RM");

    let (status, list) = t.get_auth("/api/v1/addresses", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], created["id"]);

    let (status, me) = t.get_auth("/api/v1/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["addresses"].as_array().unwrap().len(), 1);
    assert_eq!(me["addresses"][0]["region"]["name"], "Metropolitana");
    assert_eq!(me["issuer"], common::ISSUER);
    assert_eq!(me["audience"], json!(["web", "ios", "android"]));
    assert_eq!(me["is_active"], true);
}

#[tokio::test]
async fn test_create_address_validation() {
    let t = setup().await;
    let commune = seed_catalog(&t.db).await;
    let token = login_token(&t, "alice").await;

    let invalid = [
        json!({"commune_id": commune, "street": "", "number": "1"}),
        json!({"commune_id": commune, "street": "Main", "number": "  "}),
        json!({"commune_id": 0, "street": "Main", "number": "1"}),
        json!({"street": "Main", "number": "1"}),
        json!({"commune_id": commune + 50, "street": "Main", "number": "1"}),
    ];
    for body in invalid {
        let (status, _) = t
            .send("POST", "/api/v1/addresses", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = t
        .send(
            "POST",
            "/api/v1/addresses",
            None,
            Some(json!({"commune_id": commune, "street": "Main", "number": "1"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_address() {
    let t = setup().await;
    let commune = seed_catalog(&t.db).await;
    let token = login_token(&t, "alice").await;

    let (_, created) = t
        .send(
            "POST",
            "/api/v1/addresses",
            Some(&token),
            Some(json!({"commune_id": commune, "street": "Main", "number": "1", "apartment": "4B"})),
        )
        .await;
    let uri = format!("/api/v1/addresses/{}", created["id"]);

    let (status, updated) = t
        .send("PATCH", &uri, Some(&token), Some(json!({"number": " 2 "})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["number"], "2");
    assert_eq!(updated["street"], "Main");
    assert_eq!(updated["apartment"], "4B");

    let (status, cleared) = t
        .send("PATCH", &uri, Some(&token), Some(json!({"apartment": ""})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared.get("apartment").is_none());

    let (status, _) = t.send("PATCH", &uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("PATCH", &uri, Some(&token), Some(json!({"commune_id": commune + 50})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("PATCH", "/api/v1/addresses/abc", Some(&token), Some(json!({"number": "3"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_addresses_are_owner_scoped() {
    let t = setup().await;
    let commune = seed_catalog(&t.db).await;
    let alice = login_token(&t, "alice").await;
    let bob = login_token(&t, "bob").await;

    let (_, created) = t
        .send(
            "POST",
            "/api/v1/addresses",
            Some(&alice),
            Some(json!({"commune_id": commune, "street": "Main", "number": "1"})),
        )
        .await;
    let uri = format!("/api/v1/addresses/{}", created["id"]);

    let (_, list) = t.get_auth("/api/v1/addresses", &bob).await;
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = t
        .send("PATCH", &uri, Some(&bob), Some(json!({"number": "9"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.send("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_addresses_listed_newest_first() {
    let t = setup().await;
    let commune = seed_catalog(&t.db).await;
    let token = login_token(&t, "alice").await;

    for street in ["First", "Second"] {
        let (status, _) = t
            .send(
                "POST",
                "/api/v1/addresses",
                Some(&token),
                Some(json!({"commune_id": commune, "street": street, "number": "1"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, list) = t.get_auth("/api/v1/addresses", &token).await;
    assert_eq!(list[0]["street"], "Second");
    assert_eq!(list[1]["street"], "First");
}

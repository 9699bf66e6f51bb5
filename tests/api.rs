use axum::{
    body::{Body, Bytes},
    http::{header, Request, StatusCode},
    Router,
};
use brokerage::{
    app,
    auth::TokenKeys,
    config::SuperAdminSeed,
    db,
    form::UploadedFile,
    houses::PageSize,
    media::MediaStore,
    models::Role,
    super_admin::{create_admin, NewAdmin},
    AppState,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

const SUPER_PHONE: &str = "0900000000";
const SUPER_PASSWORD: &str = "root-password";

struct Harness {
    app: Router,
    db_pool: SqlitePool,
    keys: TokenKeys,
    media: MediaStore,
    _media_dir: TempDir,
}

async fn harness() -> Harness {
    let db_pool = db::memory_pool().await.unwrap();
    let media_dir = tempfile::tempdir().unwrap();
    let keys = TokenKeys::new("integration-secret", Duration::minutes(60));
    let media = MediaStore::new(media_dir.path());

    db::seed_super_admin(
        &db_pool,
        &SuperAdminSeed {
            name: "Root".to_owned(),
            phone: SUPER_PHONE.to_owned(),
            password: SUPER_PASSWORD.to_owned(),
        },
    )
    .await
    .unwrap();
    sqlx::query("INSERT INTO areas (code,name) VALUES (1,'Bole'), (2,'Piassa')")
        .execute(&db_pool)
        .await
        .unwrap();

    let app = app(AppState {
        db_pool: db_pool.clone(),
        tokens: keys.clone(),
        media: media.clone(),
        page_size: PageSize(10),
        max_upload_bytes: 5 * 1024 * 1024,
    });
    Harness { app, db_pool, keys, media, _media_dir: media_dir }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let res = self.app.clone().oneshot(request).await.unwrap();
        let status = res.status();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn multipart(&self, uri: &str, token: &str, form: MultipartBody) -> (StatusCode, Value) {
        let (content_type, body) = form.finish();
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn signup(&self, phone: &str) -> (i64, String) {
        let (status, body) = self
            .json(
                "POST",
                "/auth/signup",
                None,
                json!({ "name": "Selam", "phone": phone, "password": "user-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (body["user"]["id"].as_i64().unwrap(), body["access_token"].as_str().unwrap().to_owned())
    }

    async fn login(&self, phone: &str, password: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={phone}&password={password}")))
            .unwrap();
        self.send(request).await
    }

    async fn token_for(&self, phone: &str, password: &str) -> String {
        let (status, body) = self.login(phone, password).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_owned()
    }

    /// A plain admin serving `areas`, logged in.
    async fn admin(&self, phone: &str, areas: Vec<i64>) -> (i64, String) {
        let created = create_admin(
            &self.db_pool,
            &self.media,
            NewAdmin {
                name: "Dawit".to_owned(),
                phone: phone.to_owned(),
                password: "admin-pass".to_owned(),
                area_codes: areas,
                id_front: photo("front.jpg"),
                id_back: photo("back.jpg"),
            },
        )
        .await
        .unwrap();
        (created.admin.id, self.token_for(phone, "admin-pass").await)
    }
}

fn photo(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_owned(),
        content_type: Some("image/jpeg".to_owned()),
        bytes: Bytes::from_static(b"\xff\xd8\xff\xe0"),
    }
}

/// Hand-rolled multipart/form-data body.
struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    fn new() -> Self {
        Self { boundary: "brokerage-test-boundary", body: Vec::new() }
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (format!("multipart/form-data; boundary={}", self.boundary), self.body)
    }
}

fn house_form() -> MultipartBody {
    MultipartBody::new()
        .text("category", "sell")
        .text("area_code", "1")
        .text("location", "Bole Atlas")
        .text("address", "Behind the Atlas hotel")
        .text("size", "180")
        .text("condition", "newly_built")
        .text("bedrooms", "3")
        .text("toilets", "2")
        .text("bathrooms", "2")
        .text("property_type", "villa")
        .text("furnish_status", "furnished")
        .text("facilities", r#"["garden", "generator"]"#)
        .text("description", "Spacious villa with a garden and a generator")
        .text("price", "250000")
        .text("negotiable", "true")
        .file("photos", "front.jpg", "image/jpeg", b"\xff\xd8\xff\xe0")
}

async fn house_for(h: &Harness, admin_id: i64) -> i64 {
    let (_, user_token) = h.signup("0911999999").await;
    let (status, house) = h.multipart("/houses", &user_token, house_form()).await;
    assert_eq!(status, StatusCode::CREATED, "{house}");
    assert_eq!(house["assigned_admin_id"], json!(admin_id));
    house["id"].as_i64().unwrap()
}

#[tokio::test]
async fn duplicate_user_phone_is_rejected() {
    let h = harness().await;
    h.signup("0911223344").await;

    let (status, body) = h
        .json(
            "POST",
            "/auth/signup",
            None,
            json!({ "name": "Other", "phone": "0911 22 33 44", "password": "another-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Phone number already registered.");
}

#[tokio::test]
async fn duplicate_admin_phone_is_rejected() {
    let h = harness().await;
    let root = h.token_for(SUPER_PHONE, SUPER_PASSWORD).await;

    let form = || {
        MultipartBody::new()
            .text("name", "Hana")
            .text("phone", "0933000001")
            .text("password", "admin-pass")
            .text("area_codes", "1,2")
            .file("id_front", "front.png", "image/png", b"\x89PNG")
            .file("id_back", "back.png", "image/png", b"\x89PNG")
    };

    let (status, created) = h.multipart("/super-admin/admins", &root, form()).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["role"], "admin");
    assert_eq!(created["area_codes"], json!([1, 2]));
    assert!(created.get("password_hash").is_none());

    let (status, _) = h.multipart("/super-admin/admins", &root, form()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_token_carries_stored_id_and_role() {
    let h = harness().await;
    let (user_id, _) = h.signup("0911000001").await;

    let (status, body) = h.login("0911000001", "user-pass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap();
    assert_eq!(h.keys.verify_token(token).unwrap(), (user_id, Role::User));

    let (root_id,): (i64,) = sqlx::query_as("SELECT id FROM admins WHERE phone=?")
        .bind(SUPER_PHONE)
        .fetch_one(&h.db_pool)
        .await
        .unwrap();
    let root = h.token_for(SUPER_PHONE, SUPER_PASSWORD).await;
    assert_eq!(h.keys.verify_token(&root).unwrap(), (root_id, Role::SuperAdmin));

    let (status, _) = h.login("0911000001", "wrong-pass").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = h.json("POST", "/auth/login", None, json!({ "phone": "0911000001", "password": "user-pass" })).await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["role"], "user");
}

#[tokio::test]
async fn expired_and_tampered_tokens_are_rejected_everywhere() {
    let h = harness().await;
    let (user_id, valid) = h.signup("0911000001").await;
    let (other_id, _) = h.signup("0911000002").await;

    let expired = h
        .keys
        .issue_token_at(user_id, Role::User, OffsetDateTime::now_utc() - Duration::hours(3))
        .unwrap();

    // payload of another user's token under this token's signature
    let other = h.keys.issue_token(other_id, Role::SuperAdmin).unwrap();
    let parts: Vec<&str> = valid.split('.').collect();
    let other_payload = other.split('.').nth(1).unwrap();
    let tampered = format!("{}.{}.{}", parts[0], other_payload, parts[2]);

    for token in [expired.as_str(), tampered.as_str(), "not-a-token"] {
        for uri in ["/users/me", "/visits", "/admin/dashboard", "/super-admin/admins"] {
            let (status, body) = h.get(uri, Some(token)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}: {body}");
        }
        let (status, _) = h.json("POST", "/visits", Some(token), json!({ "house_id": 1 })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = h.get("/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, me) = h.get("/users/me", Some(&valid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], json!(user_id));
}

#[tokio::test]
async fn only_the_assigned_admin_may_edit_a_house() {
    let h = harness().await;
    let (assigned_id, assigned) = h.admin("0933000001", vec![1]).await;
    let (_, outsider) = h.admin("0933000002", vec![2]).await;
    let house_id = house_for(&h, assigned_id).await;
    let uri = format!("/admin/houses/{house_id}");

    let (status, _) = h.json("PATCH", &uri, Some(&outsider), json!({ "price": 1.0 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let delete = |token: &str| {
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = h.send(delete(&outsider)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, house) = h
        .json("PATCH", &uri, Some(&assigned), json!({ "price": 240000.0, "status": "available" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{house}");
    assert_eq!(house["status"], "available");

    let (status, _) = h.send(delete(&assigned)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h.get(&format!("/houses/{house_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plain_admins_cannot_create_admins() {
    let h = harness().await;
    let (_, admin) = h.admin("0933000001", vec![1]).await;
    let (_, user) = h.signup("0911000001").await;

    let form = || {
        MultipartBody::new()
            .text("name", "Hana")
            .text("phone", "0933000009")
            .text("password", "admin-pass")
            .file("id_front", "front.png", "image/png", b"\x89PNG")
            .file("id_back", "back.png", "image/png", b"\x89PNG")
    };
    let (status, _) = h.multipart("/super-admin/admins", &admin, form()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.multipart("/super-admin/admins", &user, form()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn visit_to_missing_house_is_not_found() {
    let h = harness().await;
    let (_, user) = h.signup("0911000001").await;

    let (status, body) = h.json("POST", "/visits", Some(&user), json!({ "house_id": 4242 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "House not found");
}

#[tokio::test]
async fn house_form_errors_name_exactly_the_bad_fields() {
    let h = harness().await;
    let (_, user) = h.signup("0911000001").await;

    let form = house_form().text("size", "0").text("description", "Too short");
    let (status, body) = h.multipart("/houses", &user, form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&String> = body["errors"].as_object().unwrap().keys().collect();
    assert_eq!(fields, vec!["description", "size"]);
}

#[tokio::test]
async fn listing_filters_compose() {
    let h = harness().await;
    let (_, user) = h.signup("0911000001").await;
    for (price, bedrooms) in [("90000", "3"), ("150000", "2"), ("150000", "3")] {
        let form = house_form().text("price", price).text("bedrooms", bedrooms);
        let (status, _) = h.multipart("/houses", &user, form).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = h.get("/houses?min_price=100000&bedrooms=3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_count"], 1);
    assert_eq!(page["houses"][0]["price"], 150000.0);
    assert_eq!(page["houses"][0]["bedrooms"], 3);
    assert_eq!(page["page_size"], 10);

    let (status, _) = h.get("/houses/featured", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn success_report_closes_the_listing() {
    let h = harness().await;
    let (admin_id, admin) = h.admin("0933000001", vec![1]).await;
    let house_id = house_for(&h, admin_id).await;
    let (_, visitor) = h.signup("0911000001").await;

    let (status, visit) = h
        .json(
            "POST",
            "/visits",
            Some(&visitor),
            json!({ "house_id": house_id, "preferred_date": "2030-05-01T09:00:00+03:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{visit}");
    assert_eq!(visit["preferred_date"], "2030-05-01T06:00:00Z");
    let visit_id = visit["id"].as_i64().unwrap();

    let (status, visits) = h.get("/admin/visits", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visits[0]["id"], json!(visit_id));

    let report = MultipartBody::new()
        .text("invitation_id", &visit_id.to_string())
        .text("price", "245000")
        .text("commission", "7350")
        .file("transaction_photo", "receipt.jpg", "image/jpeg", b"\xff\xd8");
    let (status, body) = h.multipart("/admin/reports/success", &admin, report).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, house) = h.get(&format!("/houses/{house_id}"), None).await;
    assert_eq!(house["status"], "sold");

    let (_, dashboard) = h.get("/admin/dashboard", Some(&admin)).await;
    assert_eq!(dashboard["total_commission"], 7350.0);
    assert_eq!(dashboard["success_rate"], 100.0);

    let (status, _) = h
        .json("POST", "/admin/reports/failure", Some(&admin), json!({ "invitation_id": visit_id, "reason": "late" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vip_houses_are_featured() {
    let h = harness().await;
    let (admin_id, admin) = h.admin("0933000001", vec![1]).await;
    let house_id = house_for(&h, admin_id).await;

    let (status, vip) = h
        .json(
            "PUT",
            &format!("/admin/houses/{house_id}/vip"),
            Some(&admin),
            json!({ "duration_days": 14, "price": 500.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{vip}");

    let (status, featured) = h.get("/houses/featured", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(featured[0]["id"], json!(house_id));
    assert!(featured[0]["image_url"].as_str().unwrap().starts_with("/media/house_photos/"));
}

#[tokio::test]
async fn malformed_input_gets_a_json_bad_request() {
    let h = harness().await;

    let (status, body) = h
        .json("POST", "/auth/signup", None, json!({ "name": "Selam", "phone": "0911000001" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("password"), "{body}");

    let (status, body) = h.get("/houses?category=lease", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string(), "{body}");

    let (status, body) = h.get("/houses/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string(), "{body}");

    let (_, admin) = h.admin("0933000001", vec![1]).await;
    let (status, body) = h
        .json("PATCH", "/admin/houses/abc", Some(&admin), json!({ "price": 10.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string(), "{body}");

    let (status, body) = h
        .json("PUT", "/admin/houses/1/vip", Some(&admin), json!({ "duration_days": "soon" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string(), "{body}");
}

#[tokio::test]
async fn huge_page_numbers_are_rejected() {
    let h = harness().await;

    let (status, body) = h.get("/houses?page=9223372036854775807", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string(), "{body}");
}

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{backends, connect, create_table, doc, users_blueprint, users_fixture};
use serde_json::json;
use tessera_orm::{
    Cast, ColumnDefinition, ColumnType, DatabaseConfig, DatabaseService, Encrypter, EventError,
    Model, ModelDefinition, ModelObserver, OrmError, TableBlueprint,
};

struct User;

impl ModelDefinition for User {
    fn table() -> &'static str {
        "users"
    }

    fn fillable() -> &'static [&'static str] {
        &["name", "email", "age", "role"]
    }

    fn guarded() -> &'static [&'static str] {
        &["role"]
    }

    fn hidden() -> &'static [&'static str] {
        &["password"]
    }

    fn timestamps() -> bool {
        true
    }
}

struct ApiToken;

impl ModelDefinition for ApiToken {
    fn table() -> &'static str {
        "api_tokens"
    }

    fn guarded() -> &'static [&'static str] {
        &["*"]
    }
}

#[tokio::test]
async fn test_create_and_find() {
    for (backend, config) in backends() {
        let db = users_fixture(config).await;
        let created = Model::<User>::create(&db, doc(json!({"name": "Ada", "age": 36})))
            .await
            .unwrap();
        assert!(created.exists(), "{}", backend);
        assert!(!created.is_dirty(), "{}", backend);
        assert!(created.get_attribute("created_at").is_some(), "{}", backend);

        let id = created.id().cloned().unwrap();
        let found = Model::<User>::find(&db, id.clone()).await.unwrap().unwrap();
        assert_eq!(found.get::<String>("name").unwrap().as_deref(), Some("Ada"));
        assert_eq!(found.get::<i64>("age").unwrap(), Some(36), "{}", backend);

        assert!(Model::<User>::find(&db, "missing").await.unwrap().is_none());
        let err = Model::<User>::find_or_fail(&db, "missing").await.unwrap_err();
        assert!(err.is_not_found(), "{}", backend);
    }
}

#[tokio::test]
async fn test_fill_respects_guarded_attributes() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let mut user = Model::<User>::make(
            &db,
            doc(json!({"name": "Mallory", "role": "admin", "password": "secret"})),
        );
        assert_eq!(user.get_attribute("name"), Some(&json!("Mallory")), "{}", backend);
        assert!(user.get_attribute("role").is_none(), "{}", backend);
        assert!(user.get_attribute("password").is_none(), "{}", backend);

        user.set("role", "admin");
        assert_eq!(user.get_attribute("role"), Some(&json!("admin")));

        let mut token = Model::<ApiToken>::make(&db, doc(json!({"token": "abc"})));
        assert!(token.attributes().is_empty());
        token.set("token", "abc");
        assert!(token.is_dirty_attribute("token"));
    }
}

#[tokio::test]
async fn test_strip_sensitive_data() {
    let db = connect(tessera_orm::ConnectionConfig::memory()).await;
    let mut user = Model::<User>::make(&db, doc(json!({"name": "Eve"})));
    user.set("password", "hunter2").set("role", "admin");

    let public = user.strip_sensitive_data();
    assert_eq!(public.get("name"), Some(&json!("Eve")));
    assert!(!public.contains_key("password"));
    assert!(!public.contains_key("role"));
}

#[tokio::test]
async fn test_save_sends_only_dirty_attributes() {
    for (backend, config) in backends() {
        let db = users_fixture(config).await;
        let mut john = User::query(&db).where_eq("name", "John").first().await.unwrap().unwrap();
        let id = john.id().cloned().unwrap();

        // Changed behind the model's back; an update of `age` must not undo it
        db.table("users")
            .where_eq("id", id.clone())
            .update(doc(json!({"email": "john@new.example.com"})))
            .await
            .unwrap();

        john.set("age", 31);
        assert_eq!(john.dirty_attributes(), vec!["age".to_string()]);
        john.save().await.unwrap();
        assert!(!john.is_dirty());

        let stored = db.table("users").find(id).await.unwrap().unwrap();
        assert_eq!(stored["age"], json!(31), "{}", backend);
        assert_eq!(stored["email"], json!("john@new.example.com"), "{}", backend);
    }
}

#[tokio::test]
async fn test_setting_original_value_clears_dirty_flag() {
    let db = users_fixture(tessera_orm::ConnectionConfig::memory()).await;
    let mut jane = User::query(&db).where_eq("name", "Jane").first().await.unwrap().unwrap();
    jane.set("age", 26);
    assert!(jane.is_dirty_attribute("age"));
    jane.set("age", 25);
    assert!(!jane.is_dirty());
}

#[tokio::test]
async fn test_delete_and_refresh() {
    for (backend, config) in backends() {
        let db = users_fixture(config).await;
        let mut tim = User::query(&db).where_eq("name", "Tim").first().await.unwrap().unwrap();

        tim.set("age", 99);
        tim.refresh().await.unwrap();
        assert_eq!(tim.get::<i64>("age").unwrap(), Some(12), "{}", backend);

        assert!(tim.delete().await.unwrap());
        assert!(!tim.exists());
        assert_eq!(User::query(&db).count().await.unwrap(), 2, "{}", backend);

        let mut unsaved = Model::<User>::new(&db);
        assert!(!unsaved.delete().await.unwrap());
    }
}

#[tokio::test]
async fn test_hydrating_without_primary_key_fails() {
    let db = connect(tessera_orm::ConnectionConfig::memory()).await;
    let err = Model::<User>::hydrate(&db, doc(json!({"name": "Ghost"}))).unwrap_err();
    assert!(matches!(err, OrmError::UnidentifiableDocument { .. }));
}

struct AuditObserver {
    created: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelObserver<Model<User>> for AuditObserver {
    async fn creating(&self, model: &mut Model<User>) -> Result<(), EventError> {
        if model.get_attribute("role").is_none() {
            model.set("role", "member");
        }
        Ok(())
    }

    async fn created(&self, _model: &Model<User>) -> Result<(), EventError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deleting(&self, model: &Model<User>) -> Result<(), EventError> {
        if model.get_attribute("role") == Some(&json!("admin")) {
            return Err(EventError::validation("admins cannot be deleted"));
        }
        Ok(())
    }

    fn watches(&self) -> &[&'static str] {
        &["email"]
    }

    async fn attribute_changed(
        &self,
        model: &mut Model<User>,
        attribute: &str,
    ) -> Result<(), EventError> {
        let lowered = model
            .get::<String>(attribute)
            .map_err(|e| EventError::observer(&e.to_string()))?
            .map(|value| value.to_lowercase());
        if let Some(lowered) = lowered {
            model.set(attribute, lowered);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_observers_mutate_and_abort() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        create_table(&db, None, &users_blueprint()).await;
        let created = Arc::new(AtomicUsize::new(0));
        db.observe::<User>(AuditObserver {
            created: Arc::clone(&created),
        });

        let mut user =
            Model::<User>::create(&db, doc(json!({"name": "Ada", "email": "ADA@Example.COM"})))
                .await
                .unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1, "{}", backend);

        let stored = db.table("users").find(user.id().cloned().unwrap()).await.unwrap().unwrap();
        assert_eq!(stored["role"], json!("member"), "{}", backend);
        assert_eq!(stored["email"], json!("ada@example.com"), "{}", backend);

        user.set("role", "admin");
        user.save().await.unwrap();
        let err = user.delete().await.unwrap_err();
        assert!(matches!(err, OrmError::Event(EventError::Validation { .. })), "{}", backend);
        assert!(user.exists());
        assert_eq!(db.table("users").count().await.unwrap(), 1, "{}", backend);
    }
}

struct Profile;

impl ModelDefinition for Profile {
    fn table() -> &'static str {
        "profiles"
    }

    fn fillable() -> &'static [&'static str] {
        &["settings", "tags", "born", "secret", "score"]
    }

    fn casts() -> &'static [(&'static str, Cast)] {
        &[
            ("settings", Cast::Json),
            ("tags", Cast::Array),
            ("born", Cast::Date),
            ("secret", Cast::EncryptedString),
            ("score", Cast::Integer),
        ]
    }
}

struct Reverse;

impl Encrypter for Reverse {
    fn encrypt(&self, plain: &str) -> anyhow::Result<String> {
        Ok(plain.chars().rev().collect())
    }

    fn decrypt(&self, cipher: &str) -> anyhow::Result<String> {
        Ok(cipher.chars().rev().collect())
    }
}

#[tokio::test]
async fn test_casts_round_trip() {
    for (backend, config) in backends() {
        let db = DatabaseService::register(DatabaseConfig::new("main", config))
            .unwrap()
            .with_encrypter(Arc::new(Reverse))
            .into_shared();

        let mut blueprint = TableBlueprint::new("profiles");
        blueprint
            .id()
            .json("settings")
            .json("tags")
            .column(ColumnDefinition::new("born", ColumnType::Date).nullable())
            .column(ColumnDefinition::new("secret", ColumnType::Text).nullable())
            .column(ColumnDefinition::new("score", ColumnType::Integer).nullable());
        create_table(&db, None, &blueprint).await;

        let profile = Model::<Profile>::create(
            &db,
            doc(json!({
                "settings": {"theme": "dark"},
                "tags": ["rust", "sql"],
                "born": "1990-05-17",
                "secret": "swordfish",
                "score": "42",
            })),
        )
        .await
        .unwrap();
        let id = profile.id().cloned().unwrap();

        let raw = db.table("profiles").find(id.clone()).await.unwrap().unwrap();
        assert_eq!(raw["secret"], json!("hsifdrows"), "{}", backend);

        let loaded = Model::<Profile>::find_or_fail(&db, id).await.unwrap();
        assert_eq!(loaded.get_attribute("settings"), Some(&json!({"theme": "dark"})), "{}", backend);
        assert_eq!(loaded.get_attribute("tags"), Some(&json!(["rust", "sql"])), "{}", backend);
        assert_eq!(loaded.get_attribute("secret"), Some(&json!("swordfish")), "{}", backend);
        assert_eq!(loaded.get_attribute("score"), Some(&json!(42)), "{}", backend);
        assert_eq!(
            loaded.get::<String>("born").unwrap().as_deref(),
            Some("1990-05-17T00:00:00+00:00"),
            "{}",
            backend
        );
    }
}

#[tokio::test]
async fn test_uncastable_value_fails_save() {
    let db = connect(tessera_orm::ConnectionConfig::memory()).await;
    let mut profile = Model::<Profile>::new(&db);
    profile.set("score", "not a number");
    let err = profile.save().await.unwrap_err();
    assert!(matches!(err, OrmError::Cast { .. }));
    assert!(!profile.exists());
}

#[tokio::test]
async fn test_encrypted_cast_without_encrypter_fails() {
    let db = connect(tessera_orm::ConnectionConfig::memory()).await;
    let mut profile = Model::<Profile>::new(&db);
    profile.set("secret", "swordfish");
    assert!(matches!(profile.save().await.unwrap_err(), OrmError::Cast { .. }));
}

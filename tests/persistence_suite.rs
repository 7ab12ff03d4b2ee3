mod common;

use chrono::Weekday;
use common::{expense, fixture, fixture_with_store, march_2024, USER};
use money_manager_core::{
    auth::{InMemoryAuth, RegistrationForm},
    config::{Config, ConfigManager},
    domain::{Category, TransactionKind},
    storage::{
        CategoryRepository, JsonDocumentStorage, Query, SnapshotBackend, TransactionRepository,
        TRANSACTIONS_COLLECTION,
    },
    MoneyError,
};
use tempfile::tempdir;

#[tokio::test]
async fn store_survives_save_and_reload() {
    let temp = tempdir().unwrap();
    let storage = JsonDocumentStorage::new(temp.path(), None).unwrap();

    let fx = fixture();
    let stored = fx
        .transactions
        .add(expense(42.0, "Food", march_2024(9)).with_description("market"))
        .await
        .unwrap();
    let food = fx
        .categories
        .add(Category::new("Food", TransactionKind::Expense))
        .await
        .unwrap();
    storage.save(&fx.store).unwrap();

    let reloaded = fixture_with_store(storage.load().unwrap());
    let txn = reloaded.transactions.get(&stored.id).await.unwrap();
    assert_eq!(txn, stored);
    assert_eq!(txn.user_id, USER);
    let category = reloaded.categories.get(&food.id).await.unwrap();
    assert_eq!(category.name, "Food");

    let raw = reloaded
        .store
        .query(&Query::collection(TRANSACTIONS_COLLECTION))
        .unwrap();
    assert_eq!(raw[0].fields["date"], march_2024(9).timestamp_millis());
    assert_eq!(raw[0].fields["type"], "expense");
    assert!(raw[0].fields.get("id").is_none());
}

#[tokio::test]
async fn restore_rolls_back_to_backup() {
    let temp = tempdir().unwrap();
    let storage = JsonDocumentStorage::new(temp.path(), Some(3)).unwrap();
    let fx = fixture();
    let kept = fx
        .transactions
        .add(expense(1.0, "Food", march_2024(1)))
        .await
        .unwrap();
    let backup = storage.backup(&fx.store, Some("pre cleanup")).unwrap();

    fx.transactions.delete(&kept.id).await.unwrap();
    storage.save(&fx.store).unwrap();
    let emptied = fixture_with_store(storage.load().unwrap());
    assert!(matches!(
        emptied.transactions.get(&kept.id).await,
        Err(MoneyError::NotFound(_))
    ));

    let restored = fixture_with_store(storage.restore(&backup).unwrap());
    assert!(restored.transactions.get(&kept.id).await.is_ok());
    let reloaded = fixture_with_store(storage.load().unwrap());
    assert!(reloaded.transactions.get(&kept.id).await.is_ok());
}

#[test]
fn config_round_trip_and_backups() {
    let temp = tempdir().unwrap();
    let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).unwrap();
    assert_eq!(manager.load().unwrap(), Config::default());

    let config = Config {
        currency: "EUR".into(),
        first_day_of_week: Weekday::Sun,
        budget_alert_threshold: 0.9,
        ..Config::default()
    };
    manager.save(&config).unwrap();
    assert_eq!(manager.load().unwrap(), config);

    let name = manager.backup(&config, Some("euro switch")).unwrap();
    assert!(name.starts_with("config_") && name.ends_with("_euro-switch.json"));
    manager.save(&Config::default()).unwrap();
    assert_eq!(manager.restore(&name).unwrap(), config);
    assert!(manager.restore("config_19990101_0000.json").is_err());
}

#[test]
fn registration_flow() {
    let auth = InMemoryAuth::new();
    let form = RegistrationForm {
        email: "sam@example.com".into(),
        password: "hunter22".into(),
        confirm_password: "hunter22".into(),
    };
    let user = form.submit(&auth).unwrap();
    assert_eq!(auth.current_user().unwrap().uid, user.uid);
}

#[tokio::test]
async fn users_never_see_each_other() {
    let fx = fixture();
    fx.transactions
        .add(expense(5.0, "Food", march_2024(2)))
        .await
        .unwrap();

    let other = fixture_with_store(fx.store.clone());
    other.auth.sign_out();
    other.auth.register("other@example.com", "secret99").unwrap();
    let visible = other.transactions.all().unwrap().next().await.unwrap().unwrap();
    assert!(visible.is_empty());
}

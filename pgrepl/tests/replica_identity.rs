#![cfg(feature = "test-utils")]

use pgrepl::error::ErrorKind;
use pgrepl::provider::Provider;
use pgrepl::resources::ResourceType;
use pgrepl::test_utils::database::{
    local_provider_config, replica_identity_data, spawn_source_database, test_table_name,
};
use pgrepl_postgres::identifier::TableIdentifier;
use pgrepl_postgres::replication::replica_identity::ReplicaIdentity;
use pgrepl_telemetry::tracing::init_test_tracing;

fn provider() -> Provider {
    Provider::new(local_provider_config())
}

#[tokio::test(flavor = "multi_thread")]
async fn create_sets_replica_identity_full() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = TableIdentifier::parse("foo").unwrap();
    database
        .create_table(&table, true, &[("name", "text")])
        .await
        .unwrap();
    assert_eq!(
        database.replica_identity(&table).await,
        ReplicaIdentity::Default
    );

    let mut data = replica_identity_data("foo", &database.name);
    provider
        .create(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();

    assert_eq!(data.id(), Some("foo"));
    assert_eq!(database.replica_identity(&table).await, ReplicaIdentity::Full);
}

#[tokio::test(flavor = "multi_thread")]
async fn create_on_a_full_table_keeps_it_full() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = test_table_name("already_full");
    database
        .create_table(&table, true, &[("name", "text")])
        .await
        .unwrap();
    database.alter_replica_identity(&table, "full").await.unwrap();

    let mut data = replica_identity_data("test.already_full", &database.name);
    provider
        .create(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();

    assert_eq!(data.id(), Some("test.already_full"));
    assert_eq!(database.replica_identity(&table).await, ReplicaIdentity::Full);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_leaves_replica_identity_unchanged() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = test_table_name("orders");
    database
        .create_table(&table, true, &[("amount", "numeric")])
        .await
        .unwrap();

    let mut data = replica_identity_data("test.orders", &database.name);
    provider
        .create(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();
    provider
        .delete(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();

    assert_eq!(data.id(), None);
    assert_eq!(database.replica_identity(&table).await, ReplicaIdentity::Full);
}

#[tokio::test(flavor = "multi_thread")]
async fn quoted_table_names_are_resolved_verbatim() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = test_table_name("Order Lines");
    database
        .create_table(&table, true, &[("sku", "text")])
        .await
        .unwrap();

    let mut data = replica_identity_data(r#"test."Order Lines""#, &database.name);
    provider
        .create(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();

    assert_eq!(database.replica_identity(&table).await, ReplicaIdentity::Full);
}

#[tokio::test(flavor = "multi_thread")]
async fn table_names_with_sql_are_rejected() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();

    let mut data = replica_identity_data("foo; drop schema test cascade", &database.name);
    let err = provider
        .create(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(data.id(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn read_surfaces_missing_tables() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();

    let mut data = replica_identity_data("test.missing", &database.name);
    data.set_id("test.missing");
    let err = provider
        .read(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn read_tolerates_identity_drift() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = test_table_name("drifted");
    database
        .create_table(&table, true, &[("name", "text")])
        .await
        .unwrap();

    let mut data = replica_identity_data("test.drifted", &database.name);
    provider
        .create(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();
    database
        .alter_replica_identity(&table, "default")
        .await
        .unwrap();

    provider
        .read(ResourceType::ReplicaIdentity, &mut data)
        .await
        .unwrap();

    assert_eq!(data.id(), Some("test.drifted"));
    assert_eq!(
        database.replica_identity(&table).await,
        ReplicaIdentity::Default
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn import_reads_a_full_table() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = test_table_name("imported");
    database
        .create_table(&table, true, &[("name", "text")])
        .await
        .unwrap();
    database.alter_replica_identity(&table, "full").await.unwrap();

    let imported = provider
        .import(
            ResourceType::ReplicaIdentity,
            &format!("{}/test.imported", database.name),
        )
        .await
        .unwrap();

    assert_eq!(imported.id(), Some("test.imported"));
    assert_eq!(imported.get_string("table_name"), Some("test.imported"));
    assert_eq!(imported.get_string("database"), Some(database.name.as_str()));
}

#[tokio::test(flavor = "multi_thread")]
async fn import_rejects_tables_without_full_identity() {
    init_test_tracing();
    let database = spawn_source_database().await;
    let provider = provider();
    let table = test_table_name("not_full");
    database
        .create_table(&table, true, &[("name", "text")])
        .await
        .unwrap();

    let err = provider
        .import(
            ResourceType::ReplicaIdentity,
            &format!("{}/test.not_full", database.name),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(
        database.replica_identity(&table).await,
        ReplicaIdentity::Default
    );
}

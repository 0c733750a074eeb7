//! End-to-end resource scenarios against the in-memory fakes.

use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use stackit_provider::client::dsa::{Offering, OfferingPlan};
use stackit_provider::client::iaas::{NetworkAreaRef, Route, RouteList, RoutingTableRef};
use stackit_provider::client::postgresflex::{Database, Flavor, Instance, PartialUpdateInstancePayload};
use stackit_provider::client::{ApiError, ProjectRef};
use stackit_provider::testing::{
    assert_error_contains, assert_plan_replaces, FakeClientFactory, ProviderTester, TestError,
};
use stackit_provider::union::TaggedObject;
use stackit_provider::{ProviderError, StackitProvider};

const ROUTE: &str = "stackit_routing_table_route";
const DATABASE: &str = "stackit_postgresflex_database";

async fn configured(clients: &FakeClientFactory) -> ProviderTester<StackitProvider> {
    let tester = ProviderTester::stackit(clients.clone());
    tester.configure_with(&["routing-tables"]).await.unwrap();
    tester
}

fn table_ref(routing_table_id: &str) -> RoutingTableRef {
    NetworkAreaRef {
        organization_id: "org".into(),
        network_area_id: "area".into(),
        region: "eu01".into(),
    }
    .table(routing_table_id)
}

async fn create_table(tester: &ProviderTester<StackitProvider>) -> Value {
    tester
        .lifecycle_create(
            "stackit_routing_table",
            json!({"organization_id": "org", "network_area_id": "area", "name": "main"}),
        )
        .await
        .unwrap()
}

fn route_config(routing_table_id: &Value) -> Value {
    json!({
        "organization_id": "org",
        "network_area_id": "area",
        "routing_table_id": routing_table_id,
        "destination": {"type": "cidrv4", "value": "10.0.0.0/24"},
        "next_hop": {"type": "internet"},
        "labels": {"team": "net"},
    })
}

#[tokio::test]
async fn test_route_create_read_delete() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let table = create_table(&tester).await;

    let route = tester
        .lifecycle_create(ROUTE, route_config(&table["routing_table_id"]))
        .await
        .unwrap();

    let route_id = route["route_id"].as_str().unwrap();
    let table_id = table["routing_table_id"].as_str().unwrap();
    assert_eq!(route["id"], format!("org,eu01,area,{},{}", table_id, route_id));
    assert_eq!(route["destination"], json!({"type": "cidrv4", "value": "10.0.0.0/24"}));
    assert_eq!(route["next_hop"]["type"], "internet");
    assert!(route["next_hop"]["value"].is_null());
    assert_eq!(route["labels"], json!({"team": "net"}));

    tester.lifecycle_delete(ROUTE, route.clone()).await.unwrap();
    assert!(clients.stackit.routes(&table_ref(table_id)).is_empty());

    // gone remotely: read drops it, delete still succeeds
    assert_eq!(assert_ok!(tester.read(ROUTE, route.clone()).await), None);
    assert_ok!(tester.delete(ROUTE, route).await);
}

#[tokio::test]
async fn test_route_label_update_is_a_patch() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let table = create_table(&tester).await;
    let route = tester
        .lifecycle_create(ROUTE, route_config(&table["routing_table_id"]))
        .await
        .unwrap();

    let mut config = route_config(&table["routing_table_id"]);
    config["labels"] = json!({"team": "platform", "env": "prod"});
    let updated = tester.lifecycle_update(ROUTE, route, config).await.unwrap();
    assert_eq!(updated["labels"], json!({"env": "prod", "team": "platform"}));

    let mut config = route_config(&table["routing_table_id"]);
    config["labels"] = Value::Null;
    let cleared = tester.lifecycle_update(ROUTE, updated, config).await.unwrap();
    assert!(cleared["labels"].is_null());
}

#[tokio::test]
async fn test_route_next_hop_change_replaces() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let table = create_table(&tester).await;
    let route = tester
        .lifecycle_create(ROUTE, route_config(&table["routing_table_id"]))
        .await
        .unwrap();

    let mut config = route_config(&table["routing_table_id"]);
    config["next_hop"] = json!({"type": "ipv4", "value": "10.1.1.1"});
    let plan = tester.plan_update(ROUTE, route, config).await.unwrap();
    assert_plan_replaces(&plan);
}

#[tokio::test]
async fn test_route_with_empty_next_hop_is_rejected() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let table = create_table(&tester).await;

    clients.stackit.set_add_routes_response(RouteList {
        items: Some(vec![Route {
            id: Some("r-broken".into()),
            destination: Some(TaggedObject {
                kind: Some("cidrv4".into()),
                value: Some("10.0.0.0/24".into()),
            }),
            nexthop: Some(TaggedObject::default()),
            ..Default::default()
        }]),
    });
    let plan = tester
        .plan_create(ROUTE, route_config(&table["routing_table_id"]))
        .await
        .unwrap();
    let err = tester.create(ROUTE, plan.planned_state).await.unwrap_err();
    assert!(matches!(err, ProviderError::Mapping(_)));
    assert_error_contains(&err, "empty next_hop");
}

#[tokio::test]
async fn test_routes_data_source_lists_every_route() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let table = create_table(&tester).await;
    for cidr in ["10.0.0.0/24", "10.0.1.0/24"] {
        let mut config = route_config(&table["routing_table_id"]);
        config["destination"]["value"] = json!(cidr);
        tester.lifecycle_create(ROUTE, config).await.unwrap();
    }

    let listed = tester
        .read_data_source(
            "stackit_routing_table_routes",
            json!({"organization_id": "org", "network_area_id": "area", "routing_table_id": table["routing_table_id"]}),
        )
        .await
        .unwrap();
    assert_eq!(listed["routes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_routing_needs_experiment() {
    let clients = FakeClientFactory::default();
    let tester = ProviderTester::stackit(clients.clone());
    tester.configure_with(&[]).await.unwrap();

    let config = json!({"organization_id": "org", "network_area_id": "area", "name": "main"});
    let plan = tester.plan_create("stackit_routing_table", config).await.unwrap();
    let err = tester
        .create("stackit_routing_table", plan.planned_state)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
    assert_error_contains(&err, "routing-tables");
    assert!(clients.stackit.calls().is_empty());
}

#[tokio::test]
async fn test_configure_twice_fails() {
    let tester = configured(&FakeClientFactory::default()).await;
    let err = assert_err!(tester.configure_with(&["routing-tables"]).await);
    assert!(matches!(err, TestError::Provider(ProviderError::FailedPrecondition(_))));
}

#[tokio::test]
async fn test_unknown_experiment_is_rejected() {
    let tester = ProviderTester::stackit(FakeClientFactory::default());
    let err = tester.configure_with(&["time-travel"]).await.unwrap_err();
    assert!(matches!(err, TestError::Provider(ProviderError::Configuration(_))));
}

fn pg_instance() -> stackit_provider::client::InstanceRef {
    ProjectRef::new("p", "eu01").instance("pg-1")
}

fn seed_databases(clients: &FakeClientFactory, count: usize) {
    clients.stackit.insert_instance(pg_instance(), Instance::default());
    clients.stackit.set_database_page_size(2);
    for i in 0..count {
        clients.stackit.insert_database(
            &pg_instance(),
            Database {
                id: Some(format!("db-{}", i)),
                name: Some(format!("app{}", i)),
                options: Some([("owner".to_string(), json!("admin"))].into_iter().collect()),
            },
        );
    }
}

#[tokio::test]
async fn test_database_lookup_walks_pages() {
    let clients = FakeClientFactory::default();
    seed_databases(&clients, 5);
    let tester = configured(&clients).await;

    let found = tester
        .read_data_source(DATABASE, json!({"project_id": "p", "instance_id": "pg-1", "name": "app4"}))
        .await
        .unwrap();
    assert_eq!(found["database_id"], "db-4");
    assert_eq!(found["owner"], "admin");
    assert_eq!(found["id"], "p,eu01,pg-1,db-4");
    assert_eq!(clients.stackit.call_count("list_databases"), 3);
}

#[tokio::test]
async fn test_database_lookup_not_found_after_all_pages() {
    let clients = FakeClientFactory::default();
    seed_databases(&clients, 5);
    let tester = configured(&clients).await;

    let err = tester
        .read_data_source(DATABASE, json!({"project_id": "p", "instance_id": "pg-1", "name": "missing"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
    assert_eq!(clients.stackit.call_count("list_databases"), 3);
}

#[tokio::test]
async fn test_database_lookup_forbidden() {
    let clients = FakeClientFactory::default();
    seed_databases(&clients, 1);
    clients.stackit.fail("list_databases", ApiError::http(403, "forbidden"));
    let tester = configured(&clients).await;

    let err = tester
        .read_data_source(DATABASE, json!({"project_id": "p", "instance_id": "pg-1", "database_id": "db-0"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::PermissionDenied(_)));
    assert_error_contains(&err, "forbidden");
}

#[tokio::test]
async fn test_database_resource_lifecycle() {
    let clients = FakeClientFactory::default();
    seed_databases(&clients, 0);
    let tester = configured(&clients).await;

    let db = tester
        .lifecycle_create(DATABASE, json!({"project_id": "p", "instance_id": "pg-1", "name": "orders", "owner": "app"}))
        .await
        .unwrap();
    assert_eq!(db["owner"], "app");

    tester.lifecycle_delete(DATABASE, db.clone()).await.unwrap();
    assert!(clients.stackit.databases(&pg_instance()).is_empty());
    assert_eq!(tester.read(DATABASE, db).await.unwrap(), None);
}

fn instance_config(cpu: i64, ram: i64) -> Value {
    json!({
        "project_id": "p",
        "name": "pg",
        "acl": ["10.0.0.0/8"],
        "backup_schedule": "0 0 * * *",
        "replicas": 1,
        "version": "16",
        "flavor": {"cpu": cpu, "ram": ram},
        "storage": {"class": "premium-perf2-stackit", "size": 10},
    })
}

#[tokio::test]
async fn test_postgres_instance_lifecycle() {
    let clients = FakeClientFactory::default();
    clients.stackit.set_flavors(vec![Flavor {
        id: Some("2.4".into()),
        description: Some("small".into()),
        cpu: Some(2),
        memory: Some(4),
    }]);
    let tester = configured(&clients).await;

    let state = tester
        .lifecycle_create("stackit_postgresflex_instance", instance_config(2, 4))
        .await
        .unwrap();
    assert_eq!(state["flavor"]["id"], "2.4");
    assert_eq!(state["flavor"]["ram"], 4);

    tester
        .lifecycle_delete("stackit_postgresflex_instance", state)
        .await
        .unwrap();
    assert_eq!(clients.stackit.call_count("force_delete_instance"), 1);

    let err = tester
        .lifecycle_create("stackit_postgresflex_instance", instance_config(8, 64))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));
    assert_error_contains(&err, "cpu=2 ram=4");
}

#[tokio::test]
async fn test_postgres_instance_resize_sends_only_changed_fields() {
    let clients = FakeClientFactory::default();
    clients.stackit.set_flavors(vec![
        Flavor {
            id: Some("2.4".into()),
            description: Some("small".into()),
            cpu: Some(2),
            memory: Some(4),
        },
        Flavor {
            id: Some("4.8".into()),
            description: Some("medium".into()),
            cpu: Some(4),
            memory: Some(8),
        },
    ]);
    let tester = configured(&clients).await;
    let created = tester
        .lifecycle_create("stackit_postgresflex_instance", instance_config(2, 4))
        .await
        .unwrap();
    assert_eq!(created["flavor"]["id"], "2.4");

    let mut config = instance_config(4, 8);
    config["replicas"] = json!(3);
    let plan = tester
        .plan_update("stackit_postgresflex_instance", created.clone(), config.clone())
        .await
        .unwrap();
    assert!(!plan.requires_replace);
    assert_eq!(plan.planned_state["flavor"]["id"], stackit_provider::value::UNKNOWN);
    assert_eq!(plan.planned_state["instance_id"], created["instance_id"]);

    let updated = tester
        .lifecycle_update("stackit_postgresflex_instance", created, config)
        .await
        .unwrap();
    assert_eq!(
        clients.stackit.instance_updates(),
        vec![PartialUpdateInstancePayload {
            flavor_id: Some("4.8".into()),
            replicas: Some(3),
            ..Default::default()
        }]
    );
    assert_eq!(clients.stackit.call_count("wait_instance_updated"), 1);
    assert_eq!(updated["flavor"]["id"], "4.8");
    assert_eq!(updated["flavor"]["description"], "medium");
    assert_eq!(updated["flavor"]["cpu"], 4);
    assert_eq!(updated["replicas"], 3);
    assert_eq!(updated["name"], "pg");
}

#[tokio::test]
async fn test_postgres_user_keeps_create_only_secrets() {
    let clients = FakeClientFactory::default();
    clients.stackit.insert_instance(pg_instance(), Instance::default());
    let tester = configured(&clients).await;

    let config = json!({"project_id": "p", "instance_id": "pg-1", "username": "app", "roles": ["login"]});
    let created = tester
        .lifecycle_create("stackit_postgresflex_user", config)
        .await
        .unwrap();
    assert_eq!(created["password"], "fake-password");
    assert!(created["uri"].as_str().unwrap().starts_with("postgresql://app:"));

    let config = json!({"project_id": "p", "instance_id": "pg-1", "username": "app", "roles": ["login", "createdb"]});
    let updated = tester
        .lifecycle_update("stackit_postgresflex_user", created, config)
        .await
        .unwrap();
    assert_eq!(updated["roles"], json!(["login", "createdb"]));
    assert_eq!(updated["password"], "fake-password");
}

#[tokio::test]
async fn test_rabbitmq_plan_resolution() {
    let clients = FakeClientFactory::default();
    clients.rabbitmq.set_offerings(vec![Offering {
        name: Some("rabbitmq".into()),
        version: Some("3.13".into()),
        plans: Some(vec![
            OfferingPlan {
                id: Some("plan-single".into()),
                name: Some("stackit-rabbitmq-1.2.10-single".into()),
            },
            OfferingPlan {
                id: Some("plan-replica".into()),
                name: Some("stackit-rabbitmq-2.4.10-replica".into()),
            },
        ]),
    }]);
    let tester = configured(&clients).await;

    let config = |plan: &str| {
        json!({"project_id": "p", "name": "mq", "version": "3.13", "plan_name": plan})
    };
    let state = tester
        .lifecycle_create("stackit_rabbitmq_instance", config("stackit-rabbitmq-1.2.10-single"))
        .await
        .unwrap();
    assert_eq!(state["plan_id"], "plan-single");
    assert_eq!(state["plan_name"], "stackit-rabbitmq-1.2.10-single");

    let updated = tester
        .lifecycle_update("stackit_rabbitmq_instance", state, config("stackit-rabbitmq-2.4.10-replica"))
        .await
        .unwrap();
    assert_eq!(updated["plan_id"], "plan-replica");

    let err = tester
        .lifecycle_create("stackit_rabbitmq_instance", config("stackit-rabbitmq-9-huge"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));
    assert_error_contains(&err, "available options");
}

#[tokio::test]
async fn test_mariadb_missing_dashboard_url_is_tolerated() {
    let clients = FakeClientFactory::default();
    clients.mariadb.set_dashboard_urls(false);
    clients.mariadb.set_offerings(vec![Offering {
        name: Some("mariadb".into()),
        version: Some("10.11".into()),
        plans: Some(vec![OfferingPlan {
            id: Some("plan-1".into()),
            name: Some("stackit-mariadb-1.4.10-single".into()),
        }]),
    }]);
    let tester = configured(&clients).await;

    let state = tester
        .lifecycle_create(
            "stackit_mariadb_instance",
            json!({"project_id": "p", "name": "db", "version": "10.11", "plan_name": "stackit-mariadb-1.4.10-single"}),
        )
        .await
        .unwrap();
    assert!(state["dashboard_url"].is_null());
    assert_eq!(state["cf_space_guid"], "cf-space");
}

#[tokio::test]
async fn test_credential_create_sends_fresh_request_ids() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let config = json!({"project_id": "p", "display_name": "metrics", "username": "u", "password": "secret"});

    let first = tester
        .lifecycle_create("stackit_loadbalancer_observability_credential", config.clone())
        .await
        .unwrap();
    tester
        .lifecycle_create("stackit_loadbalancer_observability_credential", config)
        .await
        .unwrap();

    assert_eq!(first["password"], "secret");
    let ids = clients.stackit.request_ids();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_org_manager_import_then_read() {
    let clients = FakeClientFactory::default();
    let tester = configured(&clients).await;
    let created = tester
        .lifecycle_create(
            "stackit_scf_organization_manager",
            json!({"project_id": "p", "org_id": "org-1"}),
        )
        .await
        .unwrap();

    let imported = tester
        .import("stackit_scf_organization_manager", created["id"].as_str().unwrap())
        .await
        .unwrap();
    let state = tester
        .read("stackit_scf_organization_manager", imported)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state["user_id"], created["user_id"]);
    assert_eq!(state["username"], "manager-org-1");
    assert!(state["password"].is_null());
}

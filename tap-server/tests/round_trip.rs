use serde_json::{json, Value};
use tap_core::keys;
use tap_server::{EntityRef, Response, TapConfig, TapSystem};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn system() -> TapSystem {
    init_tracing();
    TapSystem::new(&TapConfig::new().with(keys::IDS_STRATEGY, "sequential"))
}

fn created_id(res: &Response) -> String {
    assert_eq!(res.status_code, 200, "unexpected response: {res:?}");
    res.data.as_str().expect("id").to_string()
}

fn from(kind: &str, id: &str) -> Value {
    json!({"type": kind, "id": id})
}

/// Channel, customer, user and token created through the servers.
fn populate(system: &mut TapSystem) -> (String, String, String, String) {
    let channel = created_id(&system.management().send_command("post", "channels", Some(json!({"name": "C1"}))));
    let customer = created_id(&system.management().send_command(
        "post",
        &format!("channels/{channel}/customers"),
        Some(json!({"name": "Cust1", "from": from("channels", &channel)})),
    ));
    let user = created_id(&system.main().send_command(
        "post",
        &format!("customers/{customer}/users"),
        Some(json!({"name": "U1", "from": from("customers", &customer)})),
    ));
    let token = created_id(&system.main().send_command(
        "post",
        &format!("customers/{customer}/users/{user}/accessTokens"),
        Some(json!({"from": from("users", &user)})),
    ));
    (channel, customer, user, token)
}

#[test]
fn create_read_delete_round_trip() {
    let mut system = system();
    let (_, customer, user, token) = populate(&mut system);
    let token_path = format!("customers/{customer}/users/{user}/accessTokens/{token}");

    let res = system.main().send_command("get", &token_path, None);
    assert_eq!(res, Response::new(200, json!({})));

    let res = system.main().send_command("delete", &token_path, None);
    assert_eq!(res, Response::new(200, json!({"message": "deleted"})));

    let res = system.main().send_command("get", &token_path, None);
    assert_eq!(res, Response::new(404, json!({"message": "Not found"})));
    assert!(system.entity(&EntityRef::access_token(&token)).is_none());
    system.check_consistency().unwrap();
}

#[test]
fn unsupported_verbs_get_a_fixed_405() {
    let mut system = system();
    for path in ["channels", "customers/nope", ""] {
        let res = system.main().send_command("patch", path, Some(json!({"name": "x"})));
        assert_eq!(res, Response::new(405, json!({"message": "Request not allowed"})));
    }
    let res = system.management().send_command("GET", "channels", None);
    assert_eq!(res, Response::new(200, json!({})));
}

#[test]
fn customers_resolve_from_both_servers() {
    let mut system = system();
    let (channel, customer, _, _) = populate(&mut system);

    let res = system.management().send_command("get", &format!("channels/{channel}/customers/{customer}"), None);
    assert_eq!(res.status_code, 200);

    let res = system.main().send_command("get", &format!("customers/{customer}"), None);
    assert_eq!(res.status_code, 200);
    assert_eq!(res.data["users"].as_object().unwrap().len(), 1);

    let res = system.management().send_command("get", "channels", None);
    assert_eq!(res.data, json!({channel: {"customers": {customer: {}}}}));
}

#[test]
fn get_on_missing_paths_is_404_and_read_only() {
    let mut system = system();
    populate(&mut system);
    let before = system.clone();

    for path in ["customers/ghost", "channels", "customers/", "", "customers/customer-1/users/ghost"] {
        let res = system.main().send_command("get", path, None);
        assert_eq!(res, Response::new(404, json!({"message": "Not found"})), "path {path}");
    }
    assert_eq!(system.registry(), before.registry());
    system.check_consistency().unwrap();
}

#[test]
fn put_renames_through_the_registry() {
    let mut system = system();
    let (channel, customer, user, _) = populate(&mut system);

    let res = system.management().send_command("put", &format!("channels/{channel}"), Some(json!({"name": "Renamed"})));
    assert_eq!(res, Response::new(201, json!({"message": "updated"})));
    assert_eq!(system.entity(&EntityRef::channel(&channel)).unwrap().name(), "Renamed");

    let res = system.main().send_command(
        "put",
        &format!("customers/{customer}/users/{user}"),
        Some(json!({"name": "U2"})),
    );
    assert_eq!(res.status_code, 201);
    assert_eq!(system.entity(&EntityRef::user(&user)).unwrap().name(), "U2");
}

#[test]
fn put_on_missing_paths_changes_nothing() {
    let mut system = system();
    let (channel, _, _, _) = populate(&mut system);
    let before = system.clone();
    let customers = format!("channels/{channel}/customers");

    for path in ["channels/ghost", "channels", customers.as_str()] {
        let res = system.management().send_command("put", path, Some(json!({"name": "X"})));
        assert_eq!(res, Response::new(404, json!({"message": "Not found"})), "path {path}");
    }
    assert_eq!(system.registry(), before.registry());
}

#[test]
fn put_rejects_bad_bodies() {
    let mut system = system();
    let (channel, _, _, _) = populate(&mut system);
    let path = format!("channels/{channel}");

    let res = system.management().send_command("put", &path, Some(json!({"name": ""})));
    assert_eq!(res.status_code, 422);
    assert_eq!(res.data["errors"]["name"][0], "must not be empty");

    let res = system.management().send_command("put", &path, None);
    assert_eq!(res.status_code, 400);
    assert_eq!(system.entity(&EntityRef::channel(&channel)).unwrap().name(), "C1");
}

#[test]
fn unnamed_tokens_are_numbered() {
    let mut system = system();
    let (_, customer, user, first) = populate(&mut system);

    let second = created_id(&system.main().send_command(
        "post",
        "accessTokens",
        Some(json!({"from": from("users", &user)})),
    ));
    assert_eq!(system.entity(&EntityRef::access_token(&first)).unwrap().name(), "Token 1");
    assert_eq!(system.entity(&EntityRef::access_token(&second)).unwrap().name(), "Token 2");

    let res = system.main().send_command("get", &format!("customers/{customer}/users/{user}/accessTokens"), None);
    assert_eq!(res.data.as_object().unwrap().len(), 2);
}

#[test]
fn customers_need_a_name() {
    let mut system = system();
    let (channel, _, _, _) = populate(&mut system);
    let before = system.clone();

    let res = system.management().send_command("post", "customers", Some(json!({"from": from("channels", &channel)})));
    assert_eq!(res.status_code, 422);
    assert_eq!(res.data["errors"]["name"][0], "is required");
    assert_eq!(system.registry(), before.registry());
}

#[test]
fn children_are_listed_per_parent() {
    let mut system = system();
    let (channel, customer, user, token) = populate(&mut system);

    assert_eq!(system.children(&EntityRef::channel(&channel)).unwrap(), vec![customer.clone()]);
    assert_eq!(system.children(&EntityRef::customer(&customer)).unwrap(), vec![user.clone()]);
    assert_eq!(system.children(&EntityRef::user(&user)).unwrap(), vec![token.clone()]);
    assert!(system.children(&EntityRef::access_token(&token)).unwrap().is_empty());
}

#[test]
fn method_lists_reach_the_servers() {
    init_tracing();
    let config = TapConfig::new().with(keys::MAIN_METHODS, " get, post ,");
    let mut system = TapSystem::new(&config);

    let res = system.main().send_command("delete", "customers/x", None);
    assert_eq!(res, Response::new(405, json!({"message": "Request not allowed"})));
    let res = system.main().send_command("get", "customers", None);
    assert_eq!(res.status_code, 200);
    let res = system.management().send_command("delete", "channels/x", None);
    assert_eq!(res.status_code, 404);
}

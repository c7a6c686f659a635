mod common;

use std::sync::Arc;

use carrier_infinity::{
    ActivityType, Error, FanMode, HumidifierSettings, InfinityClient, JournalMode, MessageJournal, RealtimeSender,
    SystemMode,
};
use chrono::NaiveTime;
use common::{login_response, ENERGY_RESPONSE, SERIAL, SYSTEMS_RESPONSE};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> InfinityClient {
    InfinityClient::builder("user@example.com", "hunter2")
        .graphql_url(format!("{}/graphql", server.uri()))
        .login_url(format!("{}/graphql-no-auth", server.uri()))
        .token_url(format!("{}/token", server.uri()))
        .realtime_url("ws://127.0.0.1:9/")
        .build()
        .expect("client should build")
}

async fn mount_login(server: &MockServer, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/graphql-no-auth"))
        .and(body_string_contains("assistedLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_response(expires_in)))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_mutation(server: &MockServer, operation: &str) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({"operationName": operation})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {operation: {"etag": "etag-2"}}
        })))
        .mount(server)
        .await;
}

/// `variables.input` of every request that reached the GraphQL endpoint.
async fn graphql_inputs(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/graphql")
        .map(|r| r.body_json::<Value>().unwrap()["variables"]["input"].clone())
        .collect()
}

#[tokio::test]
async fn login_then_token_is_reused() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;

    let client = client_for(&server);
    client.login().await.expect("login should succeed");
    assert_eq!(client.access_token().await.unwrap(), "access-1");
    assert_eq!(client.access_token().await.unwrap(), "access-1");

    let login = &server.received_requests().await.unwrap()[0];
    let body: Value = login.body_json().unwrap();
    assert_eq!(body["operationName"], "assistedLogin");
    assert_eq!(body["variables"]["input"]["username"], "user@example.com");
    assert!(login.headers.get("authorization").is_none());
}

#[tokio::test]
async fn rejected_login_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql-no-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"assistedLogin": {
                "success": false,
                "status": "FAILURE",
                "errorMessage": "bad credentials",
                "data": null
            }}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).login().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref msg) if msg == "bad credentials"));
}

#[tokio::test]
async fn first_query_logs_in_lazily() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("getInfinitySystems"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SYSTEMS_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let systems = client_for(&server).get_systems().await.unwrap();
    assert_eq!(systems.len(), 1);
    assert_eq!(systems[0]["profile"]["serial"], SERIAL);
}

#[tokio::test]
async fn load_systems_builds_snapshot() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({
            "operationName": "getInfinitySystems",
            "variables": {"userName": "user@example.com"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(SYSTEMS_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "getInfinityEnergy",
            "variables": {"serial": SERIAL}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ENERGY_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let systems = client_for(&server).load_systems().await.unwrap();
    assert_eq!(systems.len(), 1);
    let system = &systems[0];
    assert_eq!(system.serial(), SERIAL);
    assert_eq!(system.status.zones.len(), 2);
    assert_eq!(system.config.mode, Some(SystemMode::Heat));
    assert!(system.energy.is_some());
}

#[tokio::test]
async fn graphql_errors_are_surfaced() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "boom"}, {"message": "again"}],
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).get_systems().await.unwrap_err();
    match err {
        Error::Graphql { operation, message } => {
            assert_eq!(operation, "getInfinitySystems");
            assert_eq!(message, "boom; again");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_a_status_error() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_energy(SERIAL).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Status { status: 500, ref endpoint, ref body } if endpoint == "getInfinityEnergy" && body == "upstream down"
    ));
    assert!(err.is_transport());
}

#[tokio::test]
async fn unauthorized_is_an_authentication_error() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).user_info().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}

#[tokio::test]
async fn expired_token_is_refreshed() {
    let server = MockServer::start().await;
    mount_login(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains("scope=offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "access-2",
            "expires_in": 3600,
            "scope": "offline_access"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();
    assert_eq!(client.access_token().await.unwrap(), "access-2");
    assert_eq!(client.access_token().await.unwrap(), "access-2");
}

#[tokio::test]
async fn rejected_refresh_is_an_authentication_error() {
    let server = MockServer::start().await;
    mount_login(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login().await.unwrap();
    let err = client.access_token().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref msg) if msg.contains("invalid_grant")));
}

#[tokio::test]
async fn set_mode_returns_etag() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    mount_mutation(&server, "updateInfinityConfig").await;

    let etag = client_for(&server).set_mode(SERIAL, SystemMode::Cool).await.unwrap();
    assert_eq!(etag, "etag-2");
    assert_eq!(graphql_inputs(&server).await, [json!({"serial": SERIAL, "mode": "cool"})]);
}

#[tokio::test]
async fn hold_and_resume_variables() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    mount_mutation(&server, "updateInfinityZoneConfig").await;

    let client = client_for(&server);
    client
        .set_hold(SERIAL, "1", ActivityType::Away, NaiveTime::from_hms_opt(22, 30, 0))
        .await
        .unwrap();
    client.set_hold(SERIAL, "2", ActivityType::Home, None).await.unwrap();
    client.resume_schedule(SERIAL, "1").await.unwrap();

    let inputs = graphql_inputs(&server).await;
    assert_eq!(inputs.len(), 3);
    assert_eq!(inputs[0]["hold"], "on");
    assert_eq!(inputs[0]["holdActivity"], "away");
    assert_eq!(inputs[0]["otmr"], "22:30");
    assert_eq!(inputs[0]["zoneId"], "1");
    assert_eq!(inputs[1]["otmr"], Value::Null);
    assert_eq!(inputs[2]["hold"], "off");
    assert_eq!(inputs[2]["holdActivity"], Value::Null);
}

#[tokio::test]
async fn manual_activity_and_fan_variables() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    mount_mutation(&server, "updateInfinityZoneActivity").await;

    let client = client_for(&server);
    client
        .set_manual_activity(SERIAL, "1", 68.0, 74.5, FanMode::Low)
        .await
        .unwrap();
    client
        .set_activity_fan(SERIAL, "2", ActivityType::Sleep, FanMode::High)
        .await
        .unwrap();

    let inputs = graphql_inputs(&server).await;
    assert_eq!(inputs[0]["activityType"], "manual");
    assert_eq!(inputs[0]["htsp"], 68.0);
    assert_eq!(inputs[0]["clsp"], 74.5);
    assert_eq!(inputs[0]["fan"], "low");
    assert_eq!(inputs[1], json!({"serial": SERIAL, "activityType": "sleep", "fan": "high", "zoneId": "2"}));
}

#[tokio::test]
async fn invalid_arguments_send_nothing() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client
        .set_manual_activity(SERIAL, "1", 76.0, 70.0, FanMode::Off)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let settings = HumidifierSettings {
        on: true,
        heating_percent: Some(12),
        ..Default::default()
    };
    let err = client.set_humidifier(SERIAL, &settings).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn humidifier_percentages_are_sent_as_steps() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    mount_mutation(&server, "updateInfinityConfig").await;

    let settings = HumidifierSettings {
        on: true,
        over_cooling: Some(true),
        cooling_percent: Some(10),
        heating_percent: Some(35),
    };
    client_for(&server).set_humidifier(SERIAL, &settings).await.unwrap();

    let home = &graphql_inputs(&server).await[0]["humidityHome"];
    assert_eq!(home["humidifier"], "on");
    assert_eq!(home["rclgovercool"], "on");
    assert_eq!(home["rclg"], 2);
    assert_eq!(home["rhtg"], 7);
}

#[tokio::test]
async fn command_without_etag_is_an_error() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"updateInfinityConfig": {}}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .set_heat_source(SERIAL, carrier_infinity::HeatSource::OduOnly)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingField("etag")));
}

#[tokio::test]
async fn commands_succeed_without_open_socket() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    mount_mutation(&server, "updateInfinityConfig").await;

    let client = client_for(&server);
    client.request_reconcile().await;
    client.attach_realtime(RealtimeSender::default());
    assert_eq!(client.set_mode(SERIAL, SystemMode::Off).await.unwrap(), "etag-2");
    client.detach_realtime();
    assert_eq!(client.set_mode(SERIAL, SystemMode::Auto).await.unwrap(), "etag-2");
}

#[tokio::test]
async fn commands_are_journaled() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;
    mount_mutation(&server, "updateInfinityConfig").await;

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let journal = Arc::new(MessageJournal::open(JournalMode::Full, tmp.path()).unwrap());
    let client = InfinityClient::builder("user@example.com", "hunter2")
        .graphql_url(format!("{}/graphql", server.uri()))
        .login_url(format!("{}/graphql-no-auth", server.uri()))
        .journal(journal)
        .build()
        .unwrap();
    client.set_mode(SERIAL, SystemMode::FanOnly).await.unwrap();

    let contents = std::fs::read_to_string(tmp.path()).unwrap();
    let entry: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(entry["dir"], "cmd");
    assert_eq!(entry["operation"], "updateInfinityConfig");
    assert_eq!(entry["serial"], SERIAL);
    assert_eq!(entry["variables"]["input"]["mode"], "fanonly");
}

#[tokio::test]
async fn realtime_endpoint_carries_token() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;

    let url = client_for(&server).realtime_endpoint().await.unwrap();
    assert_eq!(url.as_str(), "ws://127.0.0.1:9/?Token=access-1");
}

#[test]
fn invalid_realtime_url_is_rejected() {
    let result = InfinityClient::builder("u", "p").realtime_url("not a url").build();
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

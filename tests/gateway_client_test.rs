//! HTTP tests for the FHIR gateway client against a mock server

use chrono::{TimeZone, Utc};
use meridian::adapters::clinical::{
    FhirGateway, FhirGatewayClient, ObservationQuery, TokenGrant, TokenRequest,
};
use meridian::config::{secret_string, AuthMethod, ClinicalConfig, RetryConfig, SecretString};
use meridian::domain::{
    GatewayError, MeridianError, MetricKind, Observation, TimeRange, UserId,
};
use mockito::{Matcher, Server};
use secrecy::ExposeSecret;
use serde_json::json;

fn config(server: &Server) -> ClinicalConfig {
    ClinicalConfig {
        base_url: format!("{}/fhir", server.url()),
        auth_method: AuthMethod::ClientCredentials,
        token_url: Some(format!("{}/oauth/token", server.url())),
        client_id: Some("meridian".to_string()),
        client_secret: Some(secret_string("s3cret".to_string())),
        username: None,
        password: None,
        scope: None,
        default_token_lifetime_secs: 3600,
        tls_verify: true,
        timeout_seconds: 5,
        page_size: 50,
        retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
    }
}

fn token() -> SecretString {
    secret_string("tok-1".to_string())
}

fn query() -> ObservationQuery {
    ObservationQuery {
        patient_id: "p-17".to_string(),
        code: "8867-4".to_string(),
        range: TimeRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
        )
        .unwrap(),
    }
}

#[tokio::test]
async fn test_client_credentials_token_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("client_id".into(), "meridian".into()),
            Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"abc","expires_in":300,"token_type":"Bearer"}"#)
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    let response = client
        .request_token(&TokenRequest {
            token_url: format!("{}/oauth/token", server.url()),
            grant: TokenGrant::ClientCredentials {
                client_id: "meridian".to_string(),
                client_secret: secret_string("s3cret".to_string()),
            },
            scope: None,
        })
        .await
        .unwrap();

    assert_eq!(response.access_token.expose_secret().as_str(), "abc");
    assert_eq!(response.expires_in, Some(300));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_token_request_is_authentication_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_client"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    let err = client
        .request_token(&TokenRequest {
            token_url: format!("{}/oauth/token", server.url()),
            grant: TokenGrant::Password {
                client_id: "meridian".to_string(),
                username: "clinician".to_string(),
                password: secret_string("wrong".to_string()),
            },
            scope: Some("system/Observation.read".to_string()),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, MeridianError::Authentication(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_smart_configuration_discovery() {
    let mut server = Server::new_async().await;
    let token_endpoint = format!("{}/auth/token", server.url());
    let _discovery = server
        .mock("GET", "/fhir/.well-known/smart-configuration")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "token_endpoint": token_endpoint }).to_string())
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    assert_eq!(client.discover_token_endpoint().await.unwrap(), token_endpoint);
}

#[tokio::test]
async fn test_search_follows_next_links() {
    let mut server = Server::new_async().await;
    let observation = |id: &str, value: f64| {
        json!({
            "resourceType": "Observation",
            "id": id,
            "status": "final",
            "code": {"coding": [{"system": "http://loinc.org", "code": "8867-4"}]},
            "effectiveDateTime": "2025-03-01T08:00:00Z",
            "valueQuantity": {"value": value, "code": "/min"}
        })
    };

    let first_page = server
        .mock("GET", "/fhir/Observation")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("patient".into(), "p-17".into()),
            Matcher::UrlEncoded("code".into(), "http://loinc.org|8867-4".into()),
            Matcher::UrlEncoded("date".into(), "ge2025-03-01T00:00:00Z".into()),
            Matcher::UrlEncoded("date".into(), "lt2025-03-02T00:00:00Z".into()),
            Matcher::UrlEncoded("_count".into(), "50".into()),
        ]))
        .match_header("authorization", "Bearer tok-1")
        .with_status(200)
        .with_header("content-type", "application/fhir+json")
        .with_body(
            json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "link": [{
                    "relation": "next",
                    "url": format!("{}/fhir/Observation?page=2", server.url())
                }],
                "entry": [
                    {"resource": observation("a", 70.0)},
                    {"resource": {"resourceType": "OperationOutcome"}}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second_page = server
        .mock("GET", "/fhir/Observation")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/fhir+json")
        .with_body(
            json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "entry": [{"resource": observation("b", 75.0)}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    let resources = client.search_observations(&token(), &query()).await.unwrap();

    let ids: Vec<_> = resources.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    first_page.assert_async().await;
    second_page.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/fhir/Patient/p-17")
        .with_status(503)
        .with_body("maintenance")
        .expect(3)
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    let err = client.read_patient(&token(), "p-17").await.unwrap_err();

    assert!(matches!(
        err,
        MeridianError::Gateway(GatewayError::ServerError { status: 503, .. })
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let missing = server
        .mock("GET", "/fhir/Patient/nobody")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let unauthorized = server
        .mock("GET", "/fhir/Patient/p-17")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    assert!(matches!(
        client.read_patient(&token(), "nobody").await,
        Err(MeridianError::Gateway(GatewayError::NotFound(_)))
    ));
    assert!(matches!(
        client.read_patient(&token(), "p-17").await,
        Err(MeridianError::Authentication(_))
    ));
    missing.assert_async().await;
    unauthorized.assert_async().await;
}

#[tokio::test]
async fn test_read_patient() {
    let mut server = Server::new_async().await;
    let _patient = server
        .mock("GET", "/fhir/Patient/p-17")
        .with_status(200)
        .with_header("content-type", "application/fhir+json")
        .with_body(
            json!({
                "resourceType": "Patient",
                "id": "p-17",
                "name": [{"given": ["Ada"], "family": "Example"}],
                "birthDate": "1985-12-10",
                "gender": "female"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    let patient = client.read_patient(&token(), "p-17").await.unwrap();

    assert_eq!(patient.name.as_deref(), Some("Ada Example"));
    assert_eq!(patient.birth_date.as_deref(), Some("1985-12-10"));
}

#[tokio::test]
async fn test_submit_transaction_bundle() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/fhir/")
        .match_header("content-type", "application/fhir+json")
        .match_body(Matcher::PartialJson(json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [{"request": {"method": "POST", "url": "Observation"}}]
        })))
        .with_status(200)
        .with_header("content-type", "application/fhir+json")
        .with_body(
            json!({
                "resourceType": "Bundle",
                "type": "transaction-response",
                "entry": [{"response": {
                    "status": "201 Created",
                    "location": "Observation/srv-1/_history/1"
                }}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let observation: Observation = Observation::builder(MetricKind::HeartRate)
        .subject(&UserId::new("u1").unwrap())
        .effective(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap())
        .canonical_quantity(72.0)
        .build()
        .unwrap();

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    let outcomes = client
        .submit_observations(&token(), &[observation])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_success());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_capability_probe() {
    let mut server = Server::new_async().await;
    let _metadata = server
        .mock("GET", "/fhir/metadata")
        .with_status(200)
        .with_body(r#"{"resourceType":"CapabilityStatement"}"#)
        .create_async()
        .await;

    let client = FhirGatewayClient::new(&config(&server)).unwrap();
    assert!(client.is_reachable().await);

    let mut down = Server::new_async().await;
    let _failing = down
        .mock("GET", "/fhir/metadata")
        .with_status(500)
        .create_async()
        .await;
    let client = FhirGatewayClient::new(&config(&down)).unwrap();
    assert!(!client.is_reachable().await);
}

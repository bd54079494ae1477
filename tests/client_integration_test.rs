//! End-to-end tests against a mocked TL1 portal: credential discovery,
//! login, card info, transactions and the error classification.

use anyhow::Result;
use chrono::{Days, Local};
use httpmock::prelude::*;
use kartenservice::{
    CardClient, CardStatus, ClientConfig, Credentials, KartenError, Location, PortalUrls,
    Tl1Portal,
};
use rust_decimal::Decimal;
use serde_json::json;

// base64("KASVC:token123"), the header reqwest derives from the fixture
// user/password pair below.
const BASIC_AUTH: &str = "Basic S0FTVkM6dG9rZW4xMjM=";

const DATAPROVIDER_JS: &str = r#"
    var dataProvider = {
        authClientId: 42,
        authRegKey: "regkey123",
        authHeader: "Basic S0FTVkM6dG9rZW4xMjM=",
        authUsername: "KASVC",
        authPassword: "token123",
    };
"#;

fn client_for(server: &MockServer, location: Location) -> CardClient<Tl1Portal> {
    let urls = PortalUrls::from_base(&server.base_url()).unwrap();
    CardClient::from_portal(Tl1Portal::with_urls(location, urls, ClientConfig::default()))
}

fn credentials() -> Credentials {
    Credentials::new("600123", "secret")
}

fn mock_dataprovider(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/KartenService/scripts/dataprovider.js");
        then.status(200).body(DATAPROVIDER_JS);
    })
}

fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/TL1/TLM/KASVC/LOGIN")
            .query_param("karteNr", "600123")
            .query_param("format", "JSON")
            .header("authorization", BASIC_AUTH)
            .json_body(json!({"BenutzerID": "600123", "Passwort": "secret"}));
        then.status(200)
            .header("set-cookie", "SESSIONID=abc123; Path=/")
            .json_body(json!([{"authToken": "tok-1", "lTransTage": 90}]));
    })
}

#[test]
fn connect_then_card_info_returns_a_well_formed_balance() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    let login = mock_login(&server);
    let karte = server.mock(|when, then| {
        when.method(GET)
            .path("/TL1/TLM/KASVC/KARTE")
            .query_param("authToken", "tok-1")
            .query_param("karteNr", "600123")
            .header("authorization", BASIC_AUTH);
        then.status(200).json_body(json!([{
            "karteNr": 600123,
            "inhaber": "Erika Mustermann",
            "kontoStand": "12,34",
            "gesperrt": 0
        }]));
    });

    let client = client_for(&server, Location::Dresden);
    let session = client.connect(&credentials())?;
    let info = client.get_card_info(&session)?;

    login.assert();
    karte.assert();
    assert_eq!(info.balance, Decimal::new(1234, 2));
    assert!(info.balance >= Decimal::ZERO);
    assert_eq!(info.balance.scale(), 2);
    assert_eq!(info.holder.as_deref(), Some("Erika Mustermann"));
    assert_eq!(info.status, CardStatus::Active);
    Ok(())
}

#[test]
fn session_cookie_is_carried_and_markup_balance_is_scraped() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);
    let karte = server.mock(|when, then| {
        when.method(GET)
            .path("/TL1/TLM/KASVC/KARTE")
            .header("cookie", "SESSIONID=abc123");
        then.status(200)
            .body("<html><body>Saldo: 12,34 \u{20ac}</body></html>");
    });

    let client = client_for(&server, Location::Freiburg);
    let session = client.connect(&credentials())?;
    let info = client.get_card_info(&session)?;

    karte.assert();
    assert_eq!(info.balance, Decimal::new(1234, 2));
    assert_eq!(info.status, CardStatus::Unknown);
    assert_eq!(info.card_number, "600123");
    Ok(())
}

#[test]
fn wrong_password_is_authentication_not_transport() {
    let server = MockServer::start();
    mock_dataprovider(&server);
    server.mock(|when, then| {
        when.method(POST).path("/TL1/TLM/KASVC/LOGIN");
        then.status(500).body("Passwort oder BenutzerID falsch");
    });

    let client = client_for(&server, Location::Aachen);
    let err = client.connect(&credentials()).unwrap_err();
    match err {
        KartenError::Authentication {
            location,
            status,
            ref message,
            ..
        } => {
            assert_eq!(location, Location::Aachen);
            assert_eq!(status, 500);
            assert!(message.contains("Passwort"));
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[test]
fn dresden_style_599_rejection_is_authentication_too() {
    let server = MockServer::start();
    mock_dataprovider(&server);
    server.mock(|when, then| {
        when.method(POST).path("/TL1/TLM/KASVC/LOGIN");
        then.status(599).body("Login fehlgeschlagen");
    });

    let client = client_for(&server, Location::Dresden);
    assert!(matches!(
        client.connect(&credentials()),
        Err(KartenError::Authentication { status: 599, .. })
    ));
}

#[test]
fn gateway_errors_on_login_are_retryable_transport() {
    let server = MockServer::start();
    mock_dataprovider(&server);
    server.mock(|when, then| {
        when.method(POST).path("/TL1/TLM/KASVC/LOGIN");
        then.status(502).body("Bad Gateway");
    });

    let client = client_for(&server, Location::Stuttgart);
    let err = client.connect(&credentials()).unwrap_err();
    assert!(matches!(err, KartenError::Transport { status: Some(502), .. }));
    assert!(err.is_retryable());
}

#[test]
fn transactions_keep_portal_order_newest_first() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);
    let trans = server.mock(|when, then| {
        when.method(GET)
            .path("/TL1/TLM/KASVC/TRANS")
            .query_param("datumVon", "01.08.2026")
            .query_param("datumBis", "21.08.2026");
        then.status(200).json_body(json!([
            {"transFullId": "3", "datum": "21.08.2026 12:05", "zahlBetrag": "-3,50", "ortName": "Mensa Mitte"},
            {"transFullId": "2", "datum": "20.08.2026 11:40", "zahlBetrag": "-2,80", "ortName": "Cafeteria"},
            {"transFullId": "1", "datum": "18.08.2026 09:00", "zahlBetrag": "20,00", "typName": "Aufwertung"}
        ]));
    });

    let client = client_for(&server, Location::Leipzig);
    let session = client.connect(&credentials())?;
    let range = kartenservice::DateRange::new(
        chrono::NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2026, 8, 21).unwrap(),
    );
    let transactions = client.get_transactions(&session, Some(range))?;

    trans.assert();
    assert_eq!(transactions.len(), 3);
    assert!(transactions
        .windows(2)
        .all(|w| w[0].timestamp >= w[1].timestamp));
    assert_eq!(transactions[0].amount, Decimal::new(-350, 2));
    assert_eq!(transactions[2].amount, Decimal::new(2000, 2));
    Ok(())
}

#[test]
fn omitted_range_defaults_to_the_retention_window() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);

    // lTransTage = 90 from the login fixture: today and the 89 days before.
    let to = Local::now().date_naive();
    let from = to.checked_sub_days(Days::new(89)).unwrap();
    let trans = server.mock(|when, then| {
        when.method(GET)
            .path("/TL1/TLM/KASVC/TRANS")
            .query_param("datumVon", from.format("%d.%m.%Y").to_string())
            .query_param("datumBis", to.format("%d.%m.%Y").to_string());
        then.status(200).json_body(json!([]));
    });

    let client = client_for(&server, Location::Paderborn);
    let session = client.connect(&credentials())?;
    assert_eq!(session.retention_days(), 90);
    let transactions = client.get_transactions(&session, None)?;

    trans.assert();
    assert!(transactions.is_empty());
    Ok(())
}

#[test]
fn token_complaints_and_401_are_session_expired() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);
    server.mock(|when, then| {
        when.method(GET).path("/TL1/TLM/KASVC/TRANS");
        then.status(500).body("Der authToken ist abgelaufen");
    });
    server.mock(|when, then| {
        when.method(GET).path("/TL1/TLM/KASVC/KARTE");
        then.status(401).body("Unauthorized");
    });

    let client = client_for(&server, Location::Augsburg);
    let session = client.connect(&credentials())?;

    assert!(matches!(
        client.get_transactions(&session, None),
        Err(KartenError::SessionExpired { status: Some(500), .. })
    ));
    assert!(matches!(
        client.get_card_info(&session),
        Err(KartenError::SessionExpired { status: Some(401), .. })
    ));
    Ok(())
}

#[test]
fn unexplained_500_on_fetch_is_transport() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);
    server.mock(|when, then| {
        when.method(GET).path("/TL1/TLM/KASVC/TRANS");
        then.status(500).body("Datenbank nicht erreichbar");
    });

    let client = client_for(&server, Location::Freiberg);
    let session = client.connect(&credentials())?;
    let err = client.get_transactions(&session, None).unwrap_err();
    match err {
        KartenError::Transport {
            status: Some(500),
            ref message,
            ..
        } => assert!(message.contains("Datenbank")),
        other => panic!("expected Transport, got {other:?}"),
    }
    Ok(())
}

#[test]
fn truncated_transactions_body_is_a_parse_error() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);
    server.mock(|when, then| {
        when.method(GET).path("/TL1/TLM/KASVC/TRANS");
        then.status(200).body(r#"[{"transFullId": "1", "datum""#);
    });

    let client = client_for(&server, Location::Mannheim);
    let session = client.connect(&credentials())?;
    assert!(matches!(
        client.get_transactions(&session, None),
        Err(KartenError::Parse { .. })
    ));
    Ok(())
}

#[test]
fn missing_credential_marker_fails_discovery_with_parse() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/KartenService/scripts/dataprovider.js");
        then.status(200)
            .body("var dataProvider = { authClientId: 42, };");
    });

    let client = client_for(&server, Location::Dresden);
    let err = client.connect(&credentials()).unwrap_err();
    assert!(matches!(err, KartenError::Parse { .. }));
}

#[test]
fn pre_supplied_credentials_skip_the_discovery_round_trip() -> Result<()> {
    let server = MockServer::start();
    // No dataprovider.js mock: a discovery attempt would 404 and fail.
    mock_login(&server);

    let creds = kartenservice::ApiCredentials {
        client_id: "42".into(),
        reg_key: "regkey123".into(),
        header: BASIC_AUTH.into(),
        user: "KASVC".into(),
        password: "token123".into(),
    };
    let urls = PortalUrls::from_base(&server.base_url()).unwrap();
    let portal = Tl1Portal::with_urls(
        Location::Dresden,
        urls,
        ClientConfig::default().with_api_credentials(creds.clone()),
    );
    let client = CardClient::from_portal(portal);
    let session = client.connect(&credentials())?;
    assert_eq!(session.api_credentials(), &creds);
    Ok(())
}

#[test]
fn a_session_is_rejected_by_a_client_for_another_institution() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    mock_login(&server);

    let dresden = client_for(&server, Location::Dresden);
    let leipzig = client_for(&server, Location::Leipzig);
    let session = dresden.connect(&credentials())?;

    assert!(matches!(
        leipzig.get_card_info(&session),
        Err(KartenError::SessionMismatch {
            expected: Location::Leipzig,
            got: Location::Dresden,
        })
    ));
    Ok(())
}

#[test]
fn texts_need_no_login() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    let textres = server.mock(|when, then| {
        when.method(GET)
            .path("/TL1/TLM/KASVC/TEXTRES")
            .query_param("LangId", "de")
            .header("authorization", BASIC_AUTH);
        then.status(200).json_body(json!([
            {"id": 1, "text": "Willkommen"},
            {"id": 2, "text": "Guthaben"}
        ]));
    });

    let client = client_for(&server, Location::Dresden);
    let texts = client.get_texts("de")?;

    textres.assert();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0].id, "1");
    assert_eq!(texts[1].text, "Guthaben");
    Ok(())
}

#[test]
fn client_registration_posts_the_discovered_identity() -> Result<()> {
    let server = MockServer::start();
    mock_dataprovider(&server);
    let reg = server.mock(|when, then| {
        when.method(POST)
            .path("/TL1/TLA/ClientReg")
            .query_param("ClientID", "42")
            .query_param("RegKey", "regkey123")
            .header("authorization", BASIC_AUTH);
        then.status(200).json_body(json!([]));
    });

    let client = client_for(&server, Location::Aachen);
    client.register_client()?;
    reg.assert();
    Ok(())
}

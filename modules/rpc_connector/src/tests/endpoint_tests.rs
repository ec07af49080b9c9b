// modules/rpc_connector/src/tests/endpoint_tests.rs
use crate::{Endpoint, RpcError, RpcErrorKind, RpcRequest};
use serde_json::json;

#[test]
fn test_trailing_slash_is_stripped() {
    let with_slash = Endpoint::new("http://host:1234/", None, None).unwrap();
    let without_slash = Endpoint::new("http://host:1234", None, None).unwrap();
    assert_eq!(with_slash.url(), "http://host:1234");
    assert_eq!(with_slash, without_slash);
}

#[test]
fn test_rejects_unsupported_scheme_and_garbage() {
    let err = Endpoint::new("ftp://host:1234", None, None).unwrap_err();
    assert!(matches!(err, RpcError::InvalidEndpoint { .. }));
    assert!(Endpoint::new("not a url", None, None).is_err());
    assert!(Endpoint::new("https://node.example:443", None, None).is_ok());
}

#[test]
fn test_credentials_require_both_halves() {
    let full = Endpoint::new("http://h:1", Some("user".into()), Some("pass".into())).unwrap();
    assert_eq!(full.credentials(), Some(("user", "pass")));

    let user_only = Endpoint::new("http://h:1", Some("user".into()), None).unwrap();
    assert_eq!(user_only.credentials(), None);

    let empty_password = Endpoint::new("http://h:1", Some("user".into()), Some(String::new())).unwrap();
    assert_eq!(empty_password.credentials(), None);
}

#[test]
fn test_password_never_leaks_into_logs() {
    let ep = Endpoint::new("http://h:1", Some("user".into()), Some("hunter2".into())).unwrap();
    assert!(!ep.redacted().contains("hunter2"));
    assert!(!format!("{:?}", ep).contains("hunter2"));
    assert!(ep.redacted().contains("user"));
}

#[test]
fn test_envelope_shape() {
    let request = RpcRequest::new("generate").param(1).param(5_000_000);
    let encoded = serde_json::to_value(request.envelope()).unwrap();
    assert_eq!(
        encoded,
        json!({"jsonrpc": "2.0", "id": 1, "method": "generate", "params": [1, 5_000_000]})
    );

    let no_params = serde_json::to_value(RpcRequest::new("getblockcount").envelope()).unwrap();
    assert_eq!(no_params["params"], json!([]));
}

#[test]
fn test_error_value_normalization() {
    let structured = RpcError::from_error_value(&json!({"code": -1, "message": "boom"}));
    match &structured {
        RpcError::Rpc { code, message } => {
            assert_eq!(*code, Some(-1));
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(structured.to_string(), "RPC error (code -1): boom");
    assert_eq!(structured.kind(), RpcErrorKind::Rpc);

    let scalar = RpcError::from_error_value(&json!("wallet locked"));
    assert_eq!(scalar.to_string(), "RPC error: wallet locked");

    let numeric = RpcError::from_error_value(&json!(42));
    assert!(numeric.to_string().contains("42"));

    let no_message = RpcError::from_error_value(&json!({"code": -5}));
    assert!(no_message.to_string().contains("-5"));
}

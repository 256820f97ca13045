use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(TransferError::SessionInvalid { key: "abc123".into() }.http_status(), 404);
    assert_eq!(TransferError::FileNotFound { key: "abc123".into(), name: "a.txt".into() }.http_status(), 404);
    assert_eq!(TransferError::InvalidFileName("..".into()).http_status(), 400);
    assert_eq!(TransferError::RegistryUnavailable { cause: RegistryError::Timeout(5000) }.http_status(), 503);
    assert_eq!(TransferError::StoreUnavailable { cause: StoreError::Backend("down".into()) }.http_status(), 503);
    let partial = TransferError::PartialCleanupFailure { key: "abc123".into(), cause: StoreError::Backend("x".into()) };
    assert_eq!(partial.http_status(), 500);
}

#[test]
fn categories_are_distinct_codes() {
    let partial = TransferError::PartialCleanupFailure { key: "k".into(), cause: StoreError::Backend("x".into()) };
    assert_eq!(partial.code_str(), "partial_cleanup_failure");
    assert_ne!(partial.code_str(), TransferError::StoreUnavailable { cause: StoreError::Backend("x".into()) }.code_str());
    assert_eq!(TransferError::SessionInvalid { key: "k".into() }.code_str(), "session_invalid");
}

#[test]
fn retryable_only_for_infrastructure_failures() {
    assert!(TransferError::RegistryUnavailable { cause: RegistryError::Status { code: 502 } }.is_retryable());
    assert!(TransferError::StoreUnavailable { cause: StoreError::Timeout(10) }.is_retryable());
    assert!(!TransferError::SessionInvalid { key: "k".into() }.is_retryable());
    assert!(!TransferError::PartialCleanupFailure { key: "k".into(), cause: StoreError::Timeout(10) }.is_retryable());
}

#[test]
fn body_carries_cause() {
    let err = TransferError::RegistryUnavailable { cause: RegistryError::Status { code: 502 } };
    let body = err.body();
    assert_eq!(body.status, "error");
    assert_eq!(body.code, "registry_unavailable");
    assert!(body.message.contains("HTTP 502"));
}

#[test]
fn aborted_upload_is_client_side_and_not_retryable() {
    let err = TransferError::UploadAborted("connection reset".into());
    assert_eq!(err.http_status(), 400);
    assert_eq!(err.code_str(), "upload_aborted");
    assert!(!err.is_retryable());
}

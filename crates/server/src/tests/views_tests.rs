use super::*;

#[test]
fn import_message_reads_counts_from_query() {
    assert_eq!(
        import_message("2,1").as_deref(),
        Some("Import finished: 2 product(s) added, 1 updated.")
    );
    assert_eq!(import_message("2"), None);
    assert_eq!(import_message("x,1"), None);
}

#[test]
fn api_errors_map_to_page_statuses() {
    let page = PageError::from(ApiError::not_found("product"));
    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert_eq!(page.message, "Product not found.");

    let page = PageError::from(ApiError::new(ErrorCode::Internal, "disk I/O error"));
    assert_eq!(page.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!page.message.contains("disk"));
}

#[test]
fn page_error_response_carries_marker_for_error_page_layer() {
    let response = PageError::not_found("gone").into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.extensions().get::<PageError>().is_some());
}

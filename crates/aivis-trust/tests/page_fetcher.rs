//! Page fetching and end-to-end verification against wiremock pages.

use aivis_core::{RiskCutPoints, VerificationStatus, VerifierThresholds};
use aivis_trust::{CitationVerifier, HttpPageFetcher, LexicalOverlap, PageFetcher, TrustError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> HttpPageFetcher {
    HttpPageFetcher::new(5, "aivis-test/0.1").expect("fetcher construction should not fail")
}

#[tokio::test]
async fn html_page_is_reduced_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    "<html><body><h1>Acme</h1><p>Free tier &amp; teams</p></body></html>",
                    "text/html; charset=utf-8",
                ),
        )
        .mount(&server)
        .await;

    let text = fetcher()
        .fetch_text(&format!("{}/pricing", server.uri()))
        .await
        .expect("page should be fetched");
    assert_eq!(text, "Acme Free tier & teams");
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch_text(&format!("{}/gone", server.uri()))
        .await
        .expect_err("404 should fail");
    assert!(matches!(err, TrustError::PageStatus { status: 404, .. }));
}

#[tokio::test]
async fn blank_page_is_empty_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><script>x()</script></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch_text(&format!("{}/blank", server.uri()))
        .await
        .expect_err("blank page should fail");
    assert!(matches!(err, TrustError::EmptyPage { .. }));
}

#[tokio::test]
async fn invalid_url_is_rejected_without_request() {
    let err = fetcher()
        .fetch_text("not a url")
        .await
        .expect_err("invalid url should fail");
    assert!(matches!(err, TrustError::InvalidUrl(_)));
}

#[tokio::test]
async fn supporting_page_verifies_claim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/review"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("Reviewers agree Acme offers unlimited storage on every plan."),
        )
        .mount(&server)
        .await;

    let verifier = CitationVerifier::new(
        fetcher(),
        LexicalOverlap,
        VerifierThresholds::default(),
        RiskCutPoints::default(),
    );
    let v = verifier
        .verify(
            &format!("{}/review", server.uri()),
            "Acme offers unlimited storage",
            None,
        )
        .await;
    assert_eq!(v.status, VerificationStatus::Verified);
    assert!((v.trust_score - 1.0).abs() < 1e-9);
    assert!(v.content_hash.is_some());
}

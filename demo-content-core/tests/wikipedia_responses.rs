use demo_content_core::config::WikipediaConfig;
use demo_content_core::contract::{EncyclopediaApi, PageLookup};
use demo_content_core::error::SourceError;
use demo_content_core::wikipedia::{parse_category_members, parse_page_lookup, WikipediaClient};

#[test]
fn category_members_are_read_in_api_order() {
    let body = r#"{
        "batchcomplete": "",
        "query": {
            "categorymembers": [
                {"pageid": 1, "ns": 0, "title": "Beagle"},
                {"pageid": 2, "ns": 0, "title": "Dachshund"},
                {"pageid": 3, "ns": 0, "title": "Poodle"}
            ]
        }
    }"#;
    let titles = parse_category_members(body).expect("valid body");
    assert_eq!(titles, vec!["Beagle", "Dachshund", "Poodle"]);
}

#[test]
fn category_without_members_is_empty_not_error() {
    let body = r#"{"batchcomplete": "", "query": {"categorymembers": []}}"#;
    assert!(parse_category_members(body).expect("valid body").is_empty());
}

#[test]
fn empty_or_garbage_body_is_empty_response() {
    assert!(matches!(
        parse_category_members("   "),
        Err(SourceError::EmptyResponse)
    ));
    assert!(matches!(
        parse_category_members("<html>nope</html>"),
        Err(SourceError::EmptyResponse)
    ));
    assert!(matches!(
        parse_page_lookup("Beagle", ""),
        Err(SourceError::EmptyResponse)
    ));
}

#[test]
fn found_page_carries_extract_and_categories() {
    let body = r#"{
        "batchcomplete": "",
        "query": {
            "pages": {
                "4421": {
                    "pageid": 4421,
                    "ns": 0,
                    "title": "Beagle",
                    "extract": "<p>The <b>beagle</b> is a breed of small scent hound.</p>",
                    "categories": [
                        {"ns": 14, "title": "Category:Dog breeds originating in England"},
                        {"ns": 14, "title": "Category:Scent hounds"}
                    ]
                }
            }
        }
    }"#;
    match parse_page_lookup("Beagle", body).expect("valid body") {
        PageLookup::Found(page) => {
            assert_eq!(page.page_id, 4421);
            assert_eq!(page.title, "Beagle");
            assert!(page.extract.unwrap().contains("scent hound"));
            assert_eq!(
                page.categories,
                vec![
                    "Category:Dog breeds originating in England",
                    "Category:Scent hounds"
                ]
            );
        }
        other => panic!("expected a found page, got {other:?}"),
    }
}

#[test]
fn minus_one_sentinel_is_missing() {
    let body = r#"{
        "batchcomplete": "",
        "query": {"pages": {"-1": {"ns": 0, "title": "No Such Dog", "missing": ""}}}
    }"#;
    assert_eq!(
        parse_page_lookup("No Such Dog", body).expect("valid body"),
        PageLookup::Missing {
            title: "No Such Dog".to_string()
        }
    );
}

#[test]
fn page_without_categories_or_extract_still_parses() {
    let body = r#"{"query": {"pages": {"12": {"pageid": 12, "ns": 0, "title": "Stub"}}}}"#;
    match parse_page_lookup("Stub", body).expect("valid body") {
        PageLookup::Found(page) => {
            assert!(page.extract.is_none());
            assert!(page.categories.is_empty());
        }
        other => panic!("expected a found page, got {other:?}"),
    }
}

#[test]
fn article_url_is_derived_from_api_url() {
    let client = WikipediaClient::new(&WikipediaConfig::default()).expect("client builds");
    assert_eq!(
        client.article_url("German Shepherd"),
        "https://en.wikipedia.org/wiki/German_Shepherd"
    );
}

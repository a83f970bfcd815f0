// tests/fetcher_parse.rs
//
// Page-parsing contract of the Comment Fetcher: success requires both
// `comments` and `has_more`; retained comments must carry every projected
// field; entries dropped by the language filter never fail the page.

use commentsense::scrape::fetcher::parse_comment_page;

const PAGE: &str = include_str!("fixtures/comment_page.json");

#[test]
fn fixture_page_filters_language_and_projects_fields() {
    let (comments, has_more) = parse_comment_page(PAGE, "en").expect("fixture page parses");

    assert!(has_more, "has_more: 1 must read as true");
    assert_eq!(comments.len(), 2, "only en comments are retained");
    assert_eq!(comments[0].title, "My 60-second pasta recipe");
    assert_eq!(
        comments[0].text, "This is so good & easy to follow",
        "HTML entities are decoded"
    );
    assert_eq!(comments[0].likes, 120);
    assert_eq!(comments[1].likes, 3);
}

#[test]
fn other_target_language_retains_the_other_entry() {
    let (comments, _) = parse_comment_page(PAGE, "es").unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].likes, 999);
}

#[test]
fn missing_has_more_is_a_failure() {
    assert!(parse_comment_page(r#"{"comments": []}"#, "en").is_err());
}

#[test]
fn missing_comments_is_a_failure() {
    assert!(parse_comment_page(r#"{"has_more": true}"#, "en").is_err());
}

#[test]
fn non_array_comments_is_a_failure() {
    assert!(parse_comment_page(r#"{"comments": "nope", "has_more": true}"#, "en").is_err());
}

#[test]
fn not_json_is_a_failure() {
    assert!(parse_comment_page("<html>blocked</html>", "en").is_err());
}

#[test]
fn retained_comment_missing_projected_field_fails_the_page() {
    let body = r#"{
        "comments": [
            {"share_info": {"title": "t"}, "text": "hi", "comment_language": "en"}
        ],
        "has_more": false
    }"#;
    assert!(parse_comment_page(body, "en").is_err(), "missing digg_count");
}

#[test]
fn malformed_entry_outside_target_language_is_ignored() {
    let body = r#"{
        "comments": [
            {"text": "sin titulo", "comment_language": "es"},
            {"share_info": {"title": "t"}, "text": "ok", "digg_count": 5, "comment_language": "en"}
        ],
        "has_more": 0
    }"#;
    let (comments, has_more) = parse_comment_page(body, "en").unwrap();
    assert!(!has_more);
    assert_eq!(comments.len(), 1);
}

#[test]
fn negative_like_counts_clamp_to_zero() {
    let body = r#"{
        "comments": [
            {"share_info": {"title": "t"}, "text": "odd", "digg_count": -7, "comment_language": "en"}
        ],
        "has_more": false
    }"#;
    let (comments, _) = parse_comment_page(body, "en").unwrap();
    assert_eq!(comments[0].likes, 0);
}

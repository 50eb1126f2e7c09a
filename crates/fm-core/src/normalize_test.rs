use super::*;

#[test]
fn test_normalize_email_lowercases_and_trims() {
    assert_eq!(
        normalize_email("  John.Doe@Example.COM "),
        Some("john.doe@example.com".to_string())
    );
}

#[test]
fn test_normalize_email_strips_wrapping_quotes() {
    assert_eq!(
        normalize_email("\"a@x.com\""),
        Some("a@x.com".to_string())
    );
    assert_eq!(normalize_email("' a@x.com '"), Some("a@x.com".to_string()));
}

#[test]
fn test_normalize_email_empty_is_absent() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("   "), None);
    assert_eq!(normalize_email("\"\""), None);
    assert_eq!(normalize_email("\\N"), None);
}

#[test]
fn test_valid_email_shapes() {
    assert!(is_valid_email("a@x.com"));
    assert!(is_valid_email("first.last+tag@mail.example.org"));
    assert!(!is_valid_email("no-at-sign.com"));
    assert!(!is_valid_email("a@nodot"));
    assert!(!is_valid_email("a b@x.com"));
    assert!(!is_valid_email("a@x."));
}

#[test]
fn test_timestamp_is_never_an_email() {
    assert!(!is_valid_email("2014-07-25 21:00:00"));
    assert!(!is_valid_email("2014-07-25@21.00.com"));
    assert!(!is_valid_email("x@21:00:00.com"));
    assert!(!is_valid_email("2014/07/25@x.com"));
    assert!(!is_valid_email("07/25/2014@x.com"));
}

#[test]
fn test_normalize_name_title_cases_and_collapses() {
    assert_eq!(
        normalize_name("  jOHN   van   DYKE "),
        Some("John Van Dyke".to_string())
    );
}

#[test]
fn test_normalize_name_null_sentinel() {
    assert_eq!(normalize_name("\\N"), None);
    assert_eq!(normalize_name(""), None);
    assert_eq!(normalize_name("  "), None);
}

#[test]
fn test_parse_date_iso_forms() {
    let expected = NaiveDate::from_ymd_opt(2014, 7, 25)
        .unwrap()
        .and_hms_opt(21, 0, 0)
        .unwrap();
    assert_eq!(parse_date("2014-07-25 21:00:00"), Some(expected));
    assert_eq!(parse_date("2014-07-25T21:00:00"), Some(expected));
    assert_eq!(parse_date("2014-07-25T21:00:00Z"), Some(expected));
    assert_eq!(parse_date("2014-07-25 21:00"), Some(expected));
}

#[test]
fn test_parse_date_slash_forms() {
    let with_time = NaiveDate::from_ymd_opt(2013, 11, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    assert_eq!(parse_date("2013/11/02, 09:30"), Some(with_time));
    assert_eq!(
        parse_date("2013/11/02"),
        NaiveDate::from_ymd_opt(2013, 11, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
    );
}

#[test]
fn test_parse_date_rejects_zero_date_and_garbage() {
    assert_eq!(parse_date("0000-00-00 00:00:00"), None);
    assert_eq!(parse_date("0000-00-00"), None);
    assert_eq!(parse_date("yesterday"), None);
    assert_eq!(parse_date("\\N"), None);
    assert_eq!(parse_date(""), None);
}

#[test]
fn test_parse_amount_strips_separators() {
    assert_eq!(parse_amount("$1,234.50"), 123_450);
    assert_eq!(parse_amount("USD 25"), 2_500);
    assert_eq!(parse_amount("25.00 USD"), 2_500);
    assert_eq!(parse_amount("-10.5"), -1_050);
}

#[test]
fn test_parse_amount_rounds_sub_cent() {
    assert_eq!(parse_amount("0.125"), 13);
    assert_eq!(parse_amount("0.124"), 12);
    assert_eq!(parse_amount("19.999"), 2_000);
}

#[test]
fn test_parse_amount_unparseable_is_zero() {
    assert_eq!(parse_amount(""), 0);
    assert_eq!(parse_amount("n/a"), 0);
    assert_eq!(parse_amount("\\N"), 0);
}

#[test]
fn test_parse_flag() {
    assert!(parse_flag("1"));
    assert!(parse_flag("Admin"));
    assert!(parse_flag(" yes "));
    assert!(!parse_flag("0"));
    assert!(!parse_flag("user"));
    assert!(!parse_flag("\\N"));
}

#[test]
fn test_format_cents() {
    assert_eq!(format_cents(123_450), "1234.50");
    assert_eq!(format_cents(5), "0.05");
    assert_eq!(format_cents(-1_050), "-10.50");
}

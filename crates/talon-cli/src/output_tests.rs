use super::*;

#[test]
fn format_time_ago_zero_is_dash() {
    assert_eq!(format_time_ago(0), "-");
}

#[test]
fn format_time_ago_seconds() {
    let now_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    assert_eq!(format_time_ago(now_ms - 5_000), "5s");
}

#[test]
fn format_time_ago_minutes() {
    let now_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    assert_eq!(format_time_ago(now_ms - 120_000), "2m");
}

#[test]
fn format_time_ago_hours() {
    let now_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    assert_eq!(format_time_ago(now_ms - 7_200_000), "2h");
}

#[test]
fn format_time_ago_days() {
    let now_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    assert_eq!(format_time_ago(now_ms - 2 * 86_400_000), "2d");
}

use super::*;

#[test]
fn message_words_join_with_single_space() {
    let args = SendArgs { session: "eng:main".to_string(), message: vec!["hello".to_string(), "there".to_string()] };
    assert_eq!(args.message.join(" "), "hello there");
}

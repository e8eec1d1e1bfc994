use super::{PathTemplate, RequestMapper, RequestPath};

fn terminal(t: &str, v: &'static str) -> RequestPath<&'static str> {
    RequestPath::new(PathTemplate::terminal(t).unwrap(), v)
}

fn prefix(t: &str, v: &'static str) -> RequestPath<&'static str> {
    RequestPath::new(PathTemplate::prefix(t).unwrap(), v)
}

#[test]
fn test_longest_literal_prefix_wins() {
    let mapper = RequestMapper::new(vec![
        terminal("/items/{id}", "by_id"),
        terminal("/items/special", "special"),
    ]);
    assert_eq!(mapper.map("/items/special").unwrap().value, "special");
    assert_eq!(mapper.map("/items/other").unwrap().value, "by_id");
}

#[test]
fn test_ties_go_to_first_declared() {
    let mapper = RequestMapper::new(vec![
        terminal("/a/{x}", "first"),
        terminal("/a/{y}", "second"),
    ]);
    assert_eq!(mapper.map("/a/1").unwrap().value, "first");
}

#[test]
fn test_no_match_returns_none() {
    let mapper = RequestMapper::new(vec![terminal("/hello", "hello")]);
    assert!(mapper.map("/nope").is_none());
    assert!(RequestMapper::<&str>::default().map("/").is_none());
}

#[test]
fn test_param_values_are_padded_to_mapper_max() {
    let mapper = RequestMapper::new(vec![
        terminal("/a/{x}/b/{y}", "two"),
        terminal("/c/{z}", "one"),
    ]);
    assert_eq!(mapper.max_path_params(), 2);

    let m = mapper.map("/c/9").unwrap();
    assert_eq!(m.value, "one");
    assert_eq!(m.path_param_values.len(), 2);
    assert_eq!(m.path_param_values[0].as_deref(), Some("9"));
    assert_eq!(m.path_param_values[1], None);

    let named = m.named_params();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].0.as_ref(), "z");
}

#[test]
fn test_prefix_match_reports_matched_and_remaining() {
    let mapper = RequestMapper::new(vec![prefix("/orders/{id}", "order")]);
    let m = mapper.map("/orders/5/lines/2").unwrap();
    assert_eq!(m.matched, "/orders/5");
    assert_eq!(m.remaining, "/lines/2");
    assert!(m.remaining.len() < "/orders/5/lines/2".len());
}

#[test]
fn test_empty_locator_template_consumes_nothing() {
    let mapper = RequestMapper::new(vec![prefix("/", "passthrough")]);
    let m = mapper.map("/x/y").unwrap();
    assert_eq!(m.remaining, "/x/y");
    assert_eq!(m.matched, "");
}

#[test]
fn test_terminal_and_locator_side_by_side() {
    let mapper = RequestMapper::new(vec![
        terminal("/sub", "terminal"),
        prefix("/sub", "locator"),
    ]);
    assert_eq!(mapper.map("/sub").unwrap().value, "terminal");
    assert_eq!(mapper.map("/sub/leaf").unwrap().value, "locator");
}

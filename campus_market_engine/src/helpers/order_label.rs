/// The structured label embedded in gateway descriptions so that webhook events can be routed
/// back to an order even when the event carries no metadata.
pub fn order_label(order_id: i64) -> String {
    format!("[order:{order_id}]")
}

/// Parses an order id out of free-text such as `"Campus market order [order:42]"`.
/// Returns `None` for anything that does not carry a well-formed label.
pub fn extract_order_id_from_label(text: &str) -> Option<i64> {
    let label = regex::Regex::new(r"\[order:(\d+)\]").unwrap();
    label.captures(text).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<i64>().ok())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn find_order_ids() {
        assert_eq!(extract_order_id_from_label(""), None);
        assert_eq!(extract_order_id_from_label("Some random text"), None);
        assert_eq!(extract_order_id_from_label("[order:1234]"), Some(1234));
        assert_eq!(extract_order_id_from_label("Campus market order [order:42], thanks!"), Some(42));
        assert_eq!(extract_order_id_from_label("[order:not-a-number]"), None);
        assert_eq!(extract_order_id_from_label("[order: 7]"), None);
    }

    #[test]
    fn label_round_trips() {
        assert_eq!(extract_order_id_from_label(&order_label(99)), Some(99));
    }
}

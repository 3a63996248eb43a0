mod order_label;

pub use order_label::{extract_order_id_from_label, order_label};

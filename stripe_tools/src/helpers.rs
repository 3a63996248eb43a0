use cmp_common::Money;

/// Currencies that Stripe treats as having no minor unit (amounts are whole units).
const ZERO_DECIMAL: [&str; 16] = [
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV", "XAF", "XOF", "XPF",
];

/// Currencies with three-decimal minor units.
const THREE_DECIMAL: [&str; 5] = ["BHD", "JOD", "KWD", "OMR", "TND"];

/// The number of minor units in one major unit of `currency`.
pub fn minor_unit_scale(currency: &str) -> i64 {
    let code = currency.to_ascii_uppercase();
    if ZERO_DECIMAL.contains(&code.as_str()) {
        1
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        1000
    } else {
        100
    }
}

/// Convert a gateway minor-unit amount into [`Money`] (hundredths of a major unit).
pub fn money_from_minor_units(minor: i64, currency: &str) -> Money {
    Money::from_cents(minor * 100 / minor_unit_scale(currency))
}

/// Convert a [`Money`] amount into the gateway's minor unit for `currency`.
pub fn money_to_minor_units(amount: Money, currency: &str) -> i64 {
    amount.value() * minor_unit_scale(currency) / 100
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scales() {
        assert_eq!(minor_unit_scale("usd"), 100);
        assert_eq!(minor_unit_scale("JPY"), 1);
        assert_eq!(minor_unit_scale("kwd"), 1000);
    }

    #[test]
    fn minor_unit_round_trips() {
        assert_eq!(money_from_minor_units(8500, "usd").value(), 8500);
        assert_eq!(money_from_minor_units(850, "jpy").value(), 85_000);
        assert_eq!(money_from_minor_units(8500, "KWD").value(), 850);
        assert_eq!(money_to_minor_units(Money::from_dollars(85), "usd"), 8500);
        assert_eq!(money_to_minor_units(Money::from_cents(85_000), "jpy"), 850);
    }
}

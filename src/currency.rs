//! Static currency table and amount formatting

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
}

const fn currency(code: &'static str, symbol: &'static str, name: &'static str) -> Currency {
    Currency { code, symbol, name }
}

/// Symbol used when a code is not in the table.
pub const FALLBACK_SYMBOL: &str = "$";

/// All supported currencies, sorted by display name.
pub static CURRENCIES: [Currency; 50] = [
    currency("ARS", "$", "Argentine Peso"),
    currency("AUD", "A$", "Australian Dollar"),
    currency("BDT", "৳", "Bangladeshi Taka"),
    currency("BRL", "R$", "Brazilian Real"),
    currency("GBP", "£", "British Pound"),
    currency("BGN", "лв", "Bulgarian Lev"),
    currency("CAD", "C$", "Canadian Dollar"),
    currency("CLP", "$", "Chilean Peso"),
    currency("CNY", "¥", "Chinese Yuan"),
    currency("COP", "$", "Colombian Peso"),
    currency("CZK", "Kč", "Czech Koruna"),
    currency("DKK", "kr", "Danish Krone"),
    currency("EGP", "E£", "Egyptian Pound"),
    currency("EUR", "€", "Euro"),
    currency("GHS", "₵", "Ghanaian Cedi"),
    currency("HKD", "HK$", "Hong Kong Dollar"),
    currency("HUF", "Ft", "Hungarian Forint"),
    currency("ISK", "kr", "Icelandic Króna"),
    currency("INR", "₹", "Indian Rupee"),
    currency("IDR", "Rp", "Indonesian Rupiah"),
    currency("ILS", "₪", "Israeli New Shekel"),
    currency("JMD", "J$", "Jamaican Dollar"),
    currency("JPY", "¥", "Japanese Yen"),
    currency("KES", "KSh", "Kenyan Shilling"),
    currency("KWD", "KD", "Kuwaiti Dinar"),
    currency("MYR", "RM", "Malaysian Ringgit"),
    currency("MXN", "Mex$", "Mexican Peso"),
    currency("MAD", "DH", "Moroccan Dirham"),
    currency("NZD", "NZ$", "New Zealand Dollar"),
    currency("NGN", "₦", "Nigerian Naira"),
    currency("NOK", "kr", "Norwegian Krone"),
    currency("PKR", "₨", "Pakistani Rupee"),
    currency("PEN", "S/", "Peruvian Sol"),
    currency("PHP", "₱", "Philippine Peso"),
    currency("PLN", "zł", "Polish Złoty"),
    currency("QAR", "QR", "Qatari Riyal"),
    currency("RON", "lei", "Romanian Leu"),
    currency("RUB", "₽", "Russian Ruble"),
    currency("SAR", "﷼", "Saudi Riyal"),
    currency("SGD", "S$", "Singapore Dollar"),
    currency("ZAR", "R", "South African Rand"),
    currency("KRW", "₩", "South Korean Won"),
    currency("SEK", "kr", "Swedish Krona"),
    currency("CHF", "CHF", "Swiss Franc"),
    currency("TWD", "NT$", "Taiwan Dollar"),
    currency("THB", "฿", "Thai Baht"),
    currency("TRY", "₺", "Turkish Lira"),
    currency("AED", "د.إ", "UAE Dirham"),
    currency("USD", "$", "US Dollar"),
    currency("VND", "₫", "Vietnamese Dong"),
];

/// Look up a currency by ISO code (case-insensitive).
pub fn find(code: &str) -> Option<&'static Currency> {
    CURRENCIES.iter().find(|c| c.code.eq_ignore_ascii_case(code.trim()))
}

pub fn symbol_for(code: &str) -> &'static str {
    find(code).map_or(FALLBACK_SYMBOL, |c| c.symbol)
}

/// Format an amount as `symbol` + two decimal places, no thousands separator.
///
/// Non-finite amounts format as zero.
pub fn format_currency(amount: f64, code: &str) -> String {
    // Adding +0 turns -0 into 0
    let amount = if amount.is_finite() { amount + 0.0 } else { 0.0 };
    format!("{}{:.2}", symbol_for(code), amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_zero_usd() {
        assert_eq!(format_currency(0.0, "USD"), "$0.00");
        assert_eq!(format_currency(-0.0, "USD"), "$0.00");
    }

    #[test]
    fn test_format_non_numeric_as_zero() {
        assert_eq!(format_currency(f64::NAN, "EUR"), "€0.00");
        assert_eq!(format_currency(f64::INFINITY, "GBP"), "£0.00");
    }

    #[test]
    fn test_unknown_code_uses_dollar() {
        assert_eq!(format_currency(12.5, "XYZ"), "$12.50");
        assert_eq!(format_currency(3.0, ""), "$3.00");
    }

    #[test]
    fn test_two_decimals_without_grouping() {
        assert_eq!(format_currency(1234567.891, "USD"), "$1234567.89");
        assert_eq!(format_currency(1.9775, "JPY"), "¥1.98");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(find("eur").map(|c| c.name), Some("Euro"));
        assert!(find("???").is_none());
    }

    #[test]
    fn test_table_sorted_by_name_with_unique_codes() {
        for pair in CURRENCIES.windows(2) {
            assert!(pair[0].name < pair[1].name, "{} before {}", pair[0].name, pair[1].name);
        }
        let mut codes: Vec<_> = CURRENCIES.iter().map(|c| c.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), CURRENCIES.len());
    }
}

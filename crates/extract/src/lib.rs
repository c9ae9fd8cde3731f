use regex::Regex;
use thiserror::Error;

/// Stock figure as rendered by the shop template, e.g. `库存(12)`.
pub const DEFAULT_STOCK_PATTERN: &str = r"库存\((\d+)\)";
/// Price as rendered by the shop template.
pub const DEFAULT_PRICE_PATTERN: &str = r#"<span class="price-num">([0-9.]+)</span>"#;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {field} pattern: {source}")]
    Invalid {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("{field} pattern must contain a capture group")]
    MissingGroup { field: &'static str },
}

/// Result of scanning one page body.
///
/// Stock alone is usable (price falls back to the 0.0 sentinel downstream);
/// price alone is not, because stock changes are the primary trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scan {
    Full { stock: u32, price: f64 },
    StockOnly { stock: u32 },
    /// No usable stock figure. `price_found` tells the caller which
    /// warning to raise.
    Missing { price_found: bool },
}

/// The two configured page patterns, compiled once at startup.
#[derive(Debug, Clone)]
pub struct Patterns {
    stock: Regex,
    price: Regex,
}

impl Patterns {
    pub fn compile(stock: &str, price: &str) -> Result<Self, PatternError> {
        Ok(Self {
            stock: compile_one("stock", stock)?,
            price: compile_one("price", price)?,
        })
    }

    /// Scan raw page text. A captured group that fails numeric parsing
    /// counts as missing for that field.
    pub fn scan(&self, text: &str) -> Scan {
        let stock = capture_u32(&self.stock, text);
        let price = capture_f64(&self.price, text);
        match (stock, price) {
            (Some(stock), Some(price)) => Scan::Full { stock, price },
            (Some(stock), None) => Scan::StockOnly { stock },
            (None, price) => Scan::Missing {
                price_found: price.is_some(),
            },
        }
    }
}

fn compile_one(field: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    let re = Regex::new(pattern).map_err(|source| PatternError::Invalid { field, source })?;
    // captures_len counts the implicit whole-match group 0.
    if re.captures_len() < 2 {
        return Err(PatternError::MissingGroup { field });
    }
    Ok(re)
}

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    let value: f64 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
    (value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Patterns {
        Patterns::compile(DEFAULT_STOCK_PATTERN, DEFAULT_PRICE_PATTERN).expect("default patterns")
    }

    #[test]
    fn both_fields_extracted_exactly() {
        let page = r#"<h1>小黑子注册码</h1>库存(42)<span class="price-num">19.9</span>"#;
        assert_eq!(
            patterns().scan(page),
            Scan::Full {
                stock: 42,
                price: 19.9
            }
        );
    }

    #[test]
    fn stock_alone_is_usable() {
        let page = "库存(7) no price markup here";
        assert_eq!(patterns().scan(page), Scan::StockOnly { stock: 7 });
    }

    #[test]
    fn price_alone_is_not_usable() {
        let page = r#"<span class="price-num">19.9</span>"#;
        assert_eq!(patterns().scan(page), Scan::Missing { price_found: true });
    }

    #[test]
    fn neither_field_found() {
        assert_eq!(
            patterns().scan("sold out page"),
            Scan::Missing { price_found: false }
        );
    }

    #[test]
    fn unparseable_price_counts_as_missing() {
        // `[0-9.]+` can capture bare dots, which are not a number.
        let page = r#"库存(3)<span class="price-num">...</span>"#;
        assert_eq!(patterns().scan(page), Scan::StockOnly { stock: 3 });
    }

    #[test]
    fn zero_stock_is_a_valid_reading() {
        let page = "库存(0)";
        assert_eq!(patterns().scan(page), Scan::StockOnly { stock: 0 });
    }

    #[test]
    fn pattern_without_capture_group_rejected() {
        let err = Patterns::compile(r"库存\(\d+\)", DEFAULT_PRICE_PATTERN)
            .expect_err("should reject groupless pattern");
        assert!(matches!(err, PatternError::MissingGroup { field: "stock" }));
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = Patterns::compile(r"库存\((\d+", DEFAULT_PRICE_PATTERN)
            .expect_err("should reject malformed regex");
        assert!(matches!(err, PatternError::Invalid { field: "stock", .. }));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Price must be finite".to_string());
        }
        if value < 0.0 {
            return Err("Price must be non-negative".to_string());
        }
        Ok(Price(value))
    }

    /// Strictly positive price, used for order trigger levels.
    pub fn positive(value: f64) -> Result<Self, String> {
        let price = Price::new(value)?;
        if price.0 == 0.0 {
            return Err("Price must be positive".to_string());
        }
        Ok(price)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

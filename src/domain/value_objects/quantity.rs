#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quantity(f64);

impl Quantity {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Quantity must be finite".to_string());
        }
        if value < 0.0 {
            return Err("Quantity must be non-negative".to_string());
        }
        Ok(Quantity(value))
    }

    /// Strictly positive quantity, used for order and position sizes.
    pub fn positive(value: f64) -> Result<Self, String> {
        let qty = Quantity::new(value)?;
        if qty.0 == 0.0 {
            return Err("Quantity must be positive".to_string());
        }
        Ok(qty)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_new_valid() {
        let qty = Quantity::new(100.0);
        assert!(qty.is_ok());
        assert_eq!(qty.unwrap().value(), 100.0);
    }

    #[test]
    fn test_quantity_new_negative() {
        let qty = Quantity::new(-5.0);
        assert!(qty.is_err());
        assert_eq!(qty.unwrap_err(), "Quantity must be non-negative");
    }

    #[test]
    fn test_quantity_new_nan() {
        assert!(Quantity::new(f64::NAN).is_err());
    }

    #[test]
    fn test_quantity_positive_rejects_zero() {
        assert!(Quantity::positive(0.0).is_err());
        assert!(Quantity::positive(0.5).is_ok());
    }
}

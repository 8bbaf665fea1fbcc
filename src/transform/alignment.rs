//! Alignment record produced by the upstream registration step.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Four-field image alignment record
///
/// ```json
/// {"translation_x": 5.0, "translation_y": -3.0,
///  "scale_factor_x": 2.0, "scale_factor_y": 2.0}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlignmentRecord {
    pub translation_x: f64,
    pub translation_y: f64,
    pub scale_factor_x: f64,
    pub scale_factor_y: f64,
}

impl AlignmentRecord {
    /// Parse a record from its JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Offsets in `(x, y)` order
    pub fn translation(&self) -> [f64; 2] {
        [self.translation_x, self.translation_y]
    }

    /// Factors in `(x, y)` order
    pub fn scale(&self) -> [f64; 2] {
        [self.scale_factor_x, self.scale_factor_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let record = AlignmentRecord::from_json(
            r#"{"translation_x": 5, "translation_y": -3, "scale_factor_x": 2, "scale_factor_y": 2.5}"#,
        )
        .unwrap();
        assert_eq!(record.translation(), [5.0, -3.0]);
        assert_eq!(record.scale(), [2.0, 2.5]);
    }

    #[test]
    fn test_rejects_missing_and_extra_fields() {
        assert!(AlignmentRecord::from_json(r#"{"translation_x": 5}"#).is_err());
        assert!(AlignmentRecord::from_json(
            r#"{"translation_x": 0, "translation_y": 0, "scale_factor_x": 1,
                "scale_factor_y": 1, "rotation": 0}"#
        )
        .is_err());
    }
}

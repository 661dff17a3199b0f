//! Cell label categories and their render colors.

use serde::{Deserialize, Serialize};

/// The fixed set of cell categories a pathologist can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellLabel {
    #[default]
    Lymphocyte,
    Tumor,
    Stromal,
    Neutrophil,
    Eosinophil,
    Other,
}

impl CellLabel {
    /// Get all labels in toolbar order.
    pub fn all() -> &'static [CellLabel] {
        &[
            CellLabel::Lymphocyte,
            CellLabel::Tumor,
            CellLabel::Stromal,
            CellLabel::Neutrophil,
            CellLabel::Eosinophil,
            CellLabel::Other,
        ]
    }

    /// Wire name of the label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellLabel::Lymphocyte => "lymphocyte",
            CellLabel::Tumor => "tumor",
            CellLabel::Stromal => "stromal",
            CellLabel::Neutrophil => "neutrophil",
            CellLabel::Eosinophil => "eosinophil",
            CellLabel::Other => "other",
        }
    }

    /// Get the display name for this label.
    pub fn display_name(&self) -> &'static str {
        match self {
            CellLabel::Lymphocyte => "Lymphocyte",
            CellLabel::Tumor => "Tumor cell",
            CellLabel::Stromal => "Stromal cell",
            CellLabel::Neutrophil => "Neutrophil",
            CellLabel::Eosinophil => "Eosinophil",
            CellLabel::Other => "Other",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Parse an upstream label, mapping unknown or missing names to [`CellLabel::Other`].
    pub fn from_upstream(name: Option<&str>) -> Self {
        match name.and_then(Self::from_name) {
            Some(label) => label,
            None => {
                if let Some(name) = name {
                    log::debug!("Unknown label '{}' mapped to 'other'", name);
                }
                CellLabel::Other
            }
        }
    }

    /// RGB render color for this label.
    pub fn color(&self) -> [u8; 3] {
        match self {
            CellLabel::Lymphocyte => [0x3b, 0x82, 0xf6],
            CellLabel::Tumor => [0xef, 0x44, 0x44],
            CellLabel::Stromal => [0x10, 0xb9, 0x81],
            CellLabel::Neutrophil => [0xf5, 0x9e, 0x0b],
            CellLabel::Eosinophil => [0x8b, 0x5c, 0xf6],
            CellLabel::Other => [0x6b, 0x72, 0x80],
        }
    }
}

impl std::fmt::Display for CellLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

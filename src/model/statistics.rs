//! Per-image label and shape counts.

use crate::model::{AnnotationKind, AnnotationRecord, CellLabel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count of annotations carrying one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: CellLabel,
    pub count: usize,
}

/// Count of annotations of one shape kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub count: usize,
}

/// Summary shown next to the canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub by_label: Vec<LabelCount>,
    pub by_type: Vec<KindCount>,
}

impl Statistics {
    /// Group records by label and by kind. Groups are sorted and empty groups omitted.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AnnotationRecord>) -> Self {
        let mut by_label: BTreeMap<CellLabel, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<AnnotationKind, usize> = BTreeMap::new();
        let mut total = 0;

        for record in records {
            total += 1;
            *by_label.entry(record.cell_label()).or_default() += 1;
            *by_type.entry(record.annotation_type).or_default() += 1;
        }

        Self {
            total,
            by_label: by_label
                .into_iter()
                .map(|(label, count)| LabelCount { label, count })
                .collect(),
            by_type: by_type
                .into_iter()
                .map(|(kind, count)| KindCount { kind, count })
                .collect(),
        }
    }

    /// Count for a single label, zero if absent.
    pub fn count_for(&self, label: CellLabel) -> usize {
        self.by_label
            .iter()
            .find(|entry| entry.label == label)
            .map_or(0, |entry| entry.count)
    }
}

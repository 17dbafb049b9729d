use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

/// Model output for one image, best category first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    categories: Vec<Category>,
}

impl Classification {
    /// Pairs each score with the label at the same class index, then sorts by
    /// descending score. The sort is stable, so ties keep class order.
    pub fn from_scores(labels: &[String], scores: &[f32]) -> Result<Self, ModelError> {
        if labels.len() != scores.len() {
            return Err(ModelError::LabelMismatch {
                labels: labels.len(),
                scores: scores.len(),
            });
        }
        let mut categories: Vec<Category> = labels
            .iter()
            .zip(scores)
            .map(|(label, score)| Category {
                label: label.clone(),
                score: if score.is_finite() {
                    score.clamp(0.0, 1.0)
                } else {
                    0.0
                },
            })
            .collect();
        categories.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(Self { categories })
    }

    pub fn top(&self) -> Option<&Category> {
        self.categories.first()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

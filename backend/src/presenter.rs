use chrono::{DateTime, Utc};
use shared::{AnalysisResponse, ClassInfo};
use uuid::Uuid;

use crate::inference::{LabelSet, PredictionResult};

pub const RECOMMENDATIONS: [&str; 3] = [
    "Regular monitoring of plant health",
    "Proper irrigation and drainage",
    "Application of appropriate fungicides if needed",
];

pub const TIPS: [&str; 3] = [
    "Ensure the leaf is well-lit and centered in the image",
    "Use a solid background for better contrast",
    "Take close-up shots of affected areas",
];

pub fn present(
    result: &PredictionResult,
    request_id: Uuid,
    analyzed_at: DateTime<Utc>,
) -> AnalysisResponse {
    AnalysisResponse {
        request_id: request_id.to_string(),
        analyzed_at: analyzed_at.to_rfc3339(),
        label: result.label.as_str().to_string(),
        plant_type: result.label.plant_type().to_string(),
        condition: result.label.condition().to_string(),
        class_index: result.class_index,
        confidence: result.confidence,
        probabilities: result.probabilities.clone(),
        recommendations: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
        tips: TIPS.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn class_infos(labels: &LabelSet) -> Vec<ClassInfo> {
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| ClassInfo {
            index,
            label: label.as_str().to_string(),
            plant_type: label.plant_type().to_string(),
            condition: label.condition().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::labels::ClassLabel;

    #[test]
    fn presents_split_label_and_static_advice() {
        let result = PredictionResult {
            class_index: 1,
            label: ClassLabel::parse("Potato-Barly blight").unwrap(),
            confidence: 90.0,
            probabilities: vec![0.05, 0.90, 0.05],
        };
        let id = Uuid::new_v4();
        let response = present(&result, id, Utc::now());

        assert_eq!(response.request_id, id.to_string());
        assert_eq!(response.label, "Potato-Barly blight");
        assert_eq!(response.plant_type, "Potato");
        assert_eq!(response.condition, "Barly blight");
        assert_eq!(response.class_index, 1);
        assert_eq!(response.confidence, 90.0);
        assert_eq!(response.probabilities, vec![0.05, 0.90, 0.05]);
        assert_eq!(response.recommendations.len(), 3);
        assert_eq!(response.tips[0], TIPS[0]);
    }

    #[test]
    fn class_infos_follow_label_order() {
        let labels = LabelSet::new(["Tomato-Bacterial_spot", "Corn-Common_rust"]).unwrap();
        let infos = class_infos(&labels);

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].index, 1);
        assert_eq!(infos[1].plant_type, "Corn");
        assert_eq!(infos[1].condition, "Common_rust");
    }
}

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisResponse {
    pub request_id: String,
    pub analyzed_at: String,
    pub label: String,
    pub plant_type: String,
    pub condition: String,
    pub class_index: usize,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub recommendations: Vec<String>,
    pub tips: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassInfo {
    pub index: usize,
    pub label: String,
    pub plant_type: String,
    pub condition: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassesResponse {
    pub classes: Vec<ClassInfo>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub classes: usize,
}

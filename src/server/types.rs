use crate::vision::Prediction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CritiqueApiResponse {
    pub request_id: String,
    pub target_role: String,
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyApiResponse {
    pub request_id: String,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub classifier: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

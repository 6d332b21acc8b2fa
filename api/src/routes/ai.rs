use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::mood;
use crate::responses::SongDto;
use crate::AppState;

const MAX_SUGGESTIONS: i64 = 10;
const MAX_TEXT_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct MoodRequest {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationRef {
    pub name: &'static str,
    pub tag: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodResponse {
    pub input: String,
    pub model_label: Option<String>,
    pub emotion: &'static str,
    pub recommendation: RecommendationRef,
    pub categories: &'static [&'static str],
    pub suggestions: Vec<SongDto>,
}

pub async fn analyze_mood(
    State(state): State<AppState>,
    body: Result<Json<MoodRequest>, JsonRejection>,
) -> ApiResult<Json<MoodResponse>> {
    let Json(body) = body?;
    let text = body
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("text is required".to_string()))?;
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "text must be at most {} characters",
            MAX_TEXT_CHARS
        )));
    }

    let label = state.inference.detect_mood(&text).await.map_err(|e| {
        tracing::error!("mood inference failed: {}", e);
        ApiError::Upstream("Failed to analyze mood".to_string())
    })?;

    let rec = mood::map(label.as_deref());
    tracing::info!(
        "mood label {:?} mapped to {} ({})",
        label,
        rec.emotion,
        rec.tag
    );

    let categories: Vec<String> = rec.categories.iter().map(|c| c.to_string()).collect();
    let suggestions = db::public_songs_in_categories(&state.db, &categories, MAX_SUGGESTIONS)
        .await
        .map_err(|e| ApiError::store("Failed to fetch mood suggestions", e))?;

    Ok(Json(MoodResponse {
        input: text,
        model_label: label,
        emotion: rec.emotion,
        recommendation: RecommendationRef {
            name: rec.display_name,
            tag: rec.tag,
        },
        categories: rec.categories,
        suggestions: suggestions.into_iter().map(SongDto::from).collect(),
    }))
}

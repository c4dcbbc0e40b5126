//! Route handlers

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use vim_deepl_core::{AppError, SelectionResult, TrainerItem, WordResult};

use crate::{ApiError, AppState};

/// Gap between the two plays of a clip.
const DOUBLE_PLAY_GAP: Duration = Duration::from_secs(1);

type ApiResult<T> = Result<T, ApiError>;

/// Audio ids are simple tokens like `lovesi01`; anything path-like is refused.
fn validate_audio_id(audio_id: &str) -> Result<(), ApiError> {
    let mut chars = audio_id.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Args("invalid audio_id".to_string()).into())
    }
}

// -------------------------
// /entries
// -------------------------

#[derive(Deserialize)]
pub struct EntryQuery {
    term: String,
    dst_lang: String,
}

#[derive(Serialize)]
pub struct EntryResponse {
    term: String,
    translation: String,
    src_lang: String,
    dst_lang: String,
    created_at: String,
    last_used: Option<String>,
    count: i64,
}

pub async fn get_entry(
    State(state): State<AppState>,
    Query(q): Query<EntryQuery>,
) -> ApiResult<Json<EntryResponse>> {
    let row = state.services.translation.get_entry(&q.term, &q.dst_lang)?;
    Ok(Json(EntryResponse {
        term: row.term,
        translation: row.translation,
        src_lang: row.src_lang,
        dst_lang: row.dst_lang,
        created_at: row.created_at,
        last_used: row.last_used,
        count: row.count,
    }))
}

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    term: String,
    translation: String,
    src_lang: String,
    dst_lang: String,
    #[serde(default)]
    detected_raw: Option<String>,
}

pub async fn create_entry(
    State(state): State<AppState>,
    Json(body): Json<CreateEntryRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.services.translation.put_entry(
        &body.term,
        &body.translation,
        &body.src_lang,
        &body.dst_lang,
        body.detected_raw.as_deref(),
    )?;
    Ok(Json(json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct MarkUsedQuery {
    term: String,
    #[allow(dead_code)]
    #[serde(default)]
    src_lang: Option<String>,
    dst_lang: String,
}

pub async fn mark_used(
    State(state): State<AppState>,
    Query(q): Query<MarkUsedQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.services.translation.mark_used(&q.term, &q.dst_lang)?;
    Ok(Json(json!({"status": "ok"})))
}

// -------------------------
// /translate
// -------------------------

#[derive(Deserialize)]
pub struct WordRequest {
    term: String,
    #[serde(default)]
    target_lang: Option<String>,
    #[serde(default)]
    src_hint: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

pub async fn translate_word(
    State(state): State<AppState>,
    Json(body): Json<WordRequest>,
) -> ApiResult<Json<WordResult>> {
    let result = state
        .services
        .translation
        .translate_word(
            &body.term,
            body.target_lang.as_deref(),
            body.src_hint.as_deref().unwrap_or(""),
            body.context.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct SelectionRequest {
    text: String,
    #[serde(default)]
    target_lang: Option<String>,
    #[serde(default)]
    src_hint: Option<String>,
}

pub async fn translate_selection(
    State(state): State<AppState>,
    Json(body): Json<SelectionRequest>,
) -> ApiResult<Json<SelectionResult>> {
    let result = state
        .services
        .translation
        .translate_selection(
            &body.text,
            body.target_lang.as_deref(),
            body.src_hint.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(Json(result))
}

// -------------------------
// /train
// -------------------------

#[derive(Deserialize)]
pub struct TrainNextRequest {
    #[serde(default)]
    src_filter: Option<String>,
    #[serde(default)]
    exclude_card_ids: Vec<i64>,
}

pub async fn train_next(
    State(state): State<AppState>,
    Json(body): Json<TrainNextRequest>,
) -> ApiResult<Json<TrainerItem>> {
    let item = state
        .services
        .trainer
        .pick_training_word(body.src_filter.as_deref(), &body.exclude_card_ids)?;
    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct TrainReviewRequest {
    card_id: i64,
    grade: i64,
    #[serde(default)]
    src_filter: Option<String>,
}

/// Grade a card, then hand back the next one.
pub async fn train_review(
    State(state): State<AppState>,
    Json(body): Json<TrainReviewRequest>,
) -> ApiResult<Json<TrainerItem>> {
    state
        .services
        .trainer
        .review_training_card(body.card_id, body.grade)?;
    let item = state
        .services
        .trainer
        .pick_training_word(body.src_filter.as_deref(), &[])?;
    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct MarkRequest {
    src_filter: String,
    #[serde(default)]
    word: Option<String>,
    #[serde(default)]
    entry_id: Option<i64>,
}

pub async fn train_mark_hard(
    State(state): State<AppState>,
    Json(body): Json<MarkRequest>,
) -> ApiResult<Json<vim_deepl_core::services::MarkHardAck>> {
    let word = body
        .word
        .as_deref()
        .filter(|w| !w.trim().is_empty())
        .ok_or_else(|| ApiError(AppError::Args("word is required".to_string())))?;
    let ack = state.services.trainer.mark_hard(word, &body.src_filter)?;
    Ok(Json(ack))
}

pub async fn train_mark_ignore(
    State(state): State<AppState>,
    Json(body): Json<MarkRequest>,
) -> ApiResult<Json<vim_deepl_core::services::IgnoreAck>> {
    let ack = state.services.trainer.mark_ignore(
        body.word.as_deref(),
        body.entry_id,
        &body.src_filter,
    )?;
    Ok(Json(ack))
}

// -------------------------
// /mw/audio
// -------------------------

#[derive(Deserialize)]
pub struct AudioPlayRequest {
    audio_id: String,
    /// Default: cache only. Playing on the host is an explicit request.
    #[serde(default)]
    play_server: bool,
}

pub async fn audio_play(
    State(state): State<AppState>,
    Json(body): Json<AudioPlayRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let audio_id = body.audio_id.trim();
    validate_audio_id(audio_id)?;

    let path = state.services.audio_cache.ensure_cached(audio_id).await?;

    let (status, playback) = if body.play_server {
        match state
            .services
            .audio_worker
            .play_twice(path.clone(), DOUBLE_PLAY_GAP)
        {
            Some(msg) => ("ok", msg),
            None => ("cached_only", "no player found".to_string()),
        }
    } else {
        ("cached_only", "cache_only".to_string())
    };

    Ok(Json(json!({
        "status": status,
        "audio_id": audio_id,
        "cached_path": path.to_string_lossy(),
        "playback": playback,
    })))
}

pub async fn audio_file(
    State(state): State<AppState>,
    Path(audio_id): Path<String>,
) -> ApiResult<Response> {
    let audio_id = audio_id.trim();
    validate_audio_id(audio_id)?;

    let path = state.services.audio_cache.ensure_cached(audio_id).await?;
    let bytes = tokio::fs::read(&path).await.map_err(AppError::Io)?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{audio_id}.mp3\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

// -------------------------
// /bookmarks
// -------------------------

#[derive(Deserialize)]
pub struct BookmarkMarkRequest {
    path: String,
    lnum: i64,
    col: i64,
    length: i64,
    term: String,
    kind: String,
}

pub async fn bookmarks_mark(
    State(state): State<AppState>,
    Json(body): Json<BookmarkMarkRequest>,
) -> ApiResult<Json<vim_deepl_core::services::MarkAck>> {
    if body.lnum < 1 || body.col < 1 || body.length < 1 {
        return Err(AppError::Args("lnum, col and length must be >= 1".to_string()).into());
    }
    if body.term.is_empty() || body.kind.is_empty() {
        return Err(AppError::Args("term and kind are required".to_string()).into());
    }
    let ack = state.services.bookmarks.upsert_mark(
        &body.path,
        body.lnum,
        body.col,
        body.length,
        &body.term,
        &body.kind,
    )?;
    Ok(Json(ack))
}

#[derive(Deserialize)]
pub struct BookmarkListQuery {
    path: String,
}

pub async fn bookmarks_list(
    State(state): State<AppState>,
    Query(q): Query<BookmarkListQuery>,
) -> ApiResult<Json<vim_deepl_core::services::MarkList>> {
    let list = state.services.bookmarks.list_marks_for_path(&q.path)?;
    Ok(Json(list))
}

//! Survey questions surface: a read-only listing of the active onboarding
//! questionnaire, ordered by its configured position.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::Question;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub title: String,
    pub question_type: String,
    pub options: serde_json::Value,
    pub order: i32,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            title: question.title,
            question_type: question.question_type,
            options: question.options,
            order: question.order,
        }
    }
}

pub async fn list_questions(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let questions = state.db.list_active_questions().await?;
    let questions: Vec<QuestionResponse> = questions.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(questions))
}

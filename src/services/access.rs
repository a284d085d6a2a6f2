// src/services/access.rs

use crate::{
    error::AppError,
    models::{exam::Exam, user::Role},
    store::ExamStore,
};

/// Authenticated identity of the user making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    pub fn require_student(&self) -> Result<(), AppError> {
        self.require_role(&[Role::Student])
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        self.require_role(&[Role::Teacher, Role::Admin])
    }

    /// Admins manage every exam, teachers only the ones they created.
    pub fn can_manage(&self, exam: &Exam) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Teacher => exam.created_by == self.id,
            Role::Student => false,
        }
    }

    /// `action` completes the sentence "You don't have permission to ... this exam".
    pub fn require_owner(&self, exam: &Exam, action: &str) -> Result<(), AppError> {
        if self.can_manage(exam) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "You don't have permission to {} this exam",
                action
            )))
        }
    }
}

pub async fn load_exam(store: &dyn ExamStore, exam_id: i64) -> Result<Exam, AppError> {
    store
        .find_exam(exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))
}

pub fn require_assigned(exam: &Exam, student_id: i64) -> Result<(), AppError> {
    if exam.is_assigned(student_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not assigned to this exam".to_string(),
        ))
    }
}

// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{ExamStore, StoreError, StoreResult};
use crate::models::{
    answer::{AnswerKey, AnswerResponse, StudentAnswer},
    attempt::{ExamAttempt, NewAttempt},
    exam::{Exam, ExamQuestion, NewExam},
    question::{Question, QuestionType},
    user::{Role, User},
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
    questions: BTreeMap<i64, Question>,
    exams: BTreeMap<i64, Exam>,
    attempts: BTreeMap<i64, ExamAttempt>,
    answers: HashMap<AnswerKey, StudentAnswer>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn touch_exam<F>(&mut self, exam_id: i64, update: F) -> Option<Exam>
    where
        F: FnOnce(&mut Exam),
    {
        let exam = self.exams.get_mut(&exam_id)?;
        update(exam);
        exam.updated_at = Utc::now();
        Some(exam.clone())
    }
}

/// In-process store used when no database is configured, and by tests.
/// Gives the same uniqueness guarantees as the PostgreSQL schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user record.
    pub async fn insert_user(&self, name: &str, email: &str, role: Role) -> User {
        let mut inner = self.inner.write().await;
        let user = User {
            id: inner.next_id(),
            name: name.to_string(),
            email: email.to_lowercase(),
            role,
            created_at: Some(Utc::now()),
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    /// Seeds a question bank entry.
    pub async fn insert_question(
        &self,
        question_type: QuestionType,
        text: &str,
        options: &[&str],
        correct_answers: &[&str],
    ) -> Question {
        let mut inner = self.inner.write().await;
        let question = Question {
            id: inner.next_id(),
            question_type,
            text: text.to_string(),
            options: Json(options.iter().map(|o| o.to_string()).collect()),
            correct_answers: Json(correct_answers.iter().map(|a| a.to_string()).collect()),
            difficulty: "medium".to_string(),
            created_at: Some(Utc::now()),
        };
        inner.questions.insert(question.id, question.clone());
        question
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_questions(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .values()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn find_exam(&self, id: i64) -> StoreResult<Option<Exam>> {
        Ok(self.inner.read().await.exams.get(&id).cloned())
    }

    async fn list_exams(&self, assigned_to: Option<i64>) -> StoreResult<Vec<Exam>> {
        let inner = self.inner.read().await;
        let mut exams: Vec<Exam> = inner
            .exams
            .values()
            .filter(|e| assigned_to.is_none_or(|student_id| e.is_assigned(student_id)))
            .cloned()
            .collect();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(exams)
    }

    async fn create_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let exam = Exam {
            id: inner.next_id(),
            title: exam.title,
            description: exam.description,
            start_time: exam.start_time,
            end_time: exam.end_time,
            duration: exam.duration,
            attempt_limit: exam.attempt_limit,
            questions: Json(Vec::new()),
            assigned_students: Vec::new(),
            is_finished: false,
            finished_at: None,
            created_by: exam.created_by,
            created_at: now,
            updated_at: now,
        };
        inner.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn update_exam_details(&self, exam: &Exam) -> StoreResult<Option<Exam>> {
        let mut inner = self.inner.write().await;
        Ok(inner.touch_exam(exam.id, |stored| {
            stored.title = exam.title.clone();
            stored.description = exam.description.clone();
            stored.start_time = exam.start_time;
            stored.end_time = exam.end_time;
            stored.duration = exam.duration;
            stored.attempt_limit = exam.attempt_limit;
        }))
    }

    async fn set_exam_questions(
        &self,
        exam_id: i64,
        questions: &[ExamQuestion],
    ) -> StoreResult<Option<Exam>> {
        let mut inner = self.inner.write().await;
        Ok(inner.touch_exam(exam_id, |exam| exam.questions = Json(questions.to_vec())))
    }

    async fn set_assigned_students(
        &self,
        exam_id: i64,
        student_ids: &[i64],
    ) -> StoreResult<Option<Exam>> {
        let mut inner = self.inner.write().await;
        Ok(inner.touch_exam(exam_id, |exam| exam.assigned_students = student_ids.to_vec()))
    }

    async fn finish_exam(&self, exam_id: i64, at: DateTime<Utc>) -> StoreResult<Option<Exam>> {
        let mut inner = self.inner.write().await;
        Ok(inner.touch_exam(exam_id, |exam| {
            exam.is_finished = true;
            exam.finished_at = Some(at);
        }))
    }

    async fn delete_exam(&self, exam_id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.exams.remove(&exam_id).is_none() {
            return Ok(false);
        }
        inner.attempts.retain(|_, a| a.exam_id != exam_id);
        inner.answers.retain(|key, _| key.exam_id != exam_id);
        Ok(true)
    }

    async fn count_attempts(&self, exam_id: i64, student_id: i64) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        let count = inner
            .attempts
            .values()
            .filter(|a| a.exam_id == exam_id && a.student_id == student_id)
            .count();
        i64::try_from(count).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn max_attempts_used(&self, exam_id: i64) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        let mut per_student: HashMap<i64, i64> = HashMap::new();
        for attempt in inner.attempts.values().filter(|a| a.exam_id == exam_id) {
            *per_student.entry(attempt.student_id).or_default() += 1;
        }
        Ok(per_student.into_values().max().unwrap_or(0))
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> StoreResult<ExamAttempt> {
        let mut inner = self.inner.write().await;
        let taken = inner.attempts.values().any(|a| {
            a.exam_id == attempt.exam_id
                && a.student_id == attempt.student_id
                && a.attempt_number == attempt.attempt_number
        });
        if taken {
            return Err(StoreError::UniqueViolation);
        }

        let attempt = ExamAttempt {
            id: inner.next_id(),
            exam_id: attempt.exam_id,
            student_id: attempt.student_id,
            attempt_number: attempt.attempt_number,
            started_at: attempt.started_at,
            completed_at: None,
            is_completed: false,
        };
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn find_attempt(&self, id: i64) -> StoreResult<Option<ExamAttempt>> {
        Ok(self.inner.read().await.attempts.get(&id).cloned())
    }

    async fn list_attempts(&self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>> {
        let inner = self.inner.read().await;
        Ok(inner
            .attempts
            .values()
            .filter(|a| a.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn complete_attempt(&self, id: i64, at: DateTime<Utc>) -> StoreResult<Option<ExamAttempt>> {
        let mut inner = self.inner.write().await;
        Ok(inner.attempts.get_mut(&id).map(|attempt| {
            attempt.is_completed = true;
            attempt.completed_at = Some(at);
            attempt.clone()
        }))
    }

    async fn upsert_answer(
        &self,
        key: AnswerKey,
        response: &AnswerResponse,
        at: DateTime<Utc>,
    ) -> StoreResult<StudentAnswer> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.answers.get_mut(&key) {
            existing.response = Json(response.clone());
            existing.submitted_at = at;
            return Ok(existing.clone());
        }

        let answer = StudentAnswer {
            id: inner.next_id(),
            exam_id: key.exam_id,
            student_id: key.student_id,
            question_id: key.question_id,
            attempt_number: key.attempt_number,
            response: Json(response.clone()),
            score: None,
            submitted_at: at,
        };
        inner.answers.insert(key, answer.clone());
        Ok(answer)
    }

    async fn list_answers(
        &self,
        exam_id: i64,
        student_id: i64,
        attempt_number: i32,
    ) -> StoreResult<Vec<StudentAnswer>> {
        let inner = self.inner.read().await;
        let mut answers: Vec<StudentAnswer> = inner
            .answers
            .values()
            .filter(|a| {
                a.exam_id == exam_id
                    && a.student_id == student_id
                    && a.attempt_number == attempt_number
            })
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.question_id);
        Ok(answers)
    }

    async fn set_answer_score(&self, key: AnswerKey, score: f64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(match inner.answers.get_mut(&key) {
            Some(answer) => {
                answer.score = Some(score);
                true
            }
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_attempt(number: i32) -> NewAttempt {
        NewAttempt {
            exam_id: 1,
            student_id: 2,
            attempt_number: number,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_attempt_number_is_rejected() {
        let store = MemoryStore::new();
        store.create_attempt(new_attempt(1)).await.unwrap();

        let err = store.create_attempt(new_attempt(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
        assert_eq!(store.count_attempts(1, 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_max_attempts_used_is_per_student() {
        let store = MemoryStore::new();
        assert_eq!(store.max_attempts_used(1).await.unwrap(), 0);

        store.create_attempt(new_attempt(1)).await.unwrap();
        store.create_attempt(new_attempt(2)).await.unwrap();
        store
            .create_attempt(NewAttempt { student_id: 3, ..new_attempt(1) })
            .await
            .unwrap();

        assert_eq!(store.max_attempts_used(1).await.unwrap(), 2);
        assert_eq!(store.max_attempts_used(9).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_response_and_keeps_score() {
        let store = MemoryStore::new();
        let key = AnswerKey {
            exam_id: 1,
            student_id: 2,
            question_id: 3,
            attempt_number: 1,
        };

        store
            .upsert_answer(key, &AnswerResponse::Text("first".into()), Utc::now())
            .await
            .unwrap();
        assert!(store.set_answer_score(key, 5.0).await.unwrap());
        store
            .upsert_answer(key, &AnswerResponse::Text("second".into()), Utc::now())
            .await
            .unwrap();

        let answers = store.list_answers(1, 2, 1).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].response.0, AnswerResponse::Text("second".into()));
        assert_eq!(answers[0].score, Some(5.0));
    }

    #[tokio::test]
    async fn test_score_update_without_answer_is_noop() {
        let store = MemoryStore::new();
        let key = AnswerKey {
            exam_id: 1,
            student_id: 2,
            question_id: 3,
            attempt_number: 1,
        };
        assert!(!store.set_answer_score(key, 5.0).await.unwrap());
    }
}

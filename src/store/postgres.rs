// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};

use super::{ExamStore, StoreError, StoreResult};
use crate::models::{
    answer::{AnswerKey, AnswerResponse, StudentAnswer},
    attempt::{ExamAttempt, NewAttempt},
    exam::{Exam, ExamQuestion, NewExam},
    question::Question,
    user::User,
};

const EXAM_COLUMNS: &str = r#"
    id, title, description, start_time, end_time, duration, attempt_limit,
    questions, assigned_students, is_finished, finished_at, created_by,
    created_at, updated_at
"#;

const ATTEMPT_COLUMNS: &str =
    "id, exam_id, student_id, attempt_number, started_at, completed_at, is_completed";

const ANSWER_COLUMNS: &str =
    "id, exam_id, student_id, question_id, attempt_number, response, score, submitted_at";

/// Translates driver errors, surfacing unique-key violations as their own variant.
fn map_db_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Database(err)
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at FROM users WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_questions(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
        sqlx::query_as::<_, Question>(
            r#"
            SELECT id, type, text, options, correct_answers, difficulty, created_at
            FROM questions
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_exam(&self, id: i64) -> StoreResult<Option<Exam>> {
        sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn list_exams(&self, assigned_to: Option<i64>) -> StoreResult<Vec<Exam>> {
        sqlx::query_as::<_, Exam>(&format!(
            r#"
            SELECT {EXAM_COLUMNS}
            FROM exams
            WHERE ($1::BIGINT IS NULL OR $1 = ANY(assigned_students))
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(assigned_to)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn create_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        sqlx::query_as::<_, Exam>(&format!(
            r#"
            INSERT INTO exams
            (title, description, start_time, end_time, duration, attempt_limit, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam.title)
        .bind(exam.description)
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration)
        .bind(exam.attempt_limit)
        .bind(exam.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn update_exam_details(&self, exam: &Exam) -> StoreResult<Option<Exam>> {
        sqlx::query_as::<_, Exam>(&format!(
            r#"
            UPDATE exams SET
                title = $2,
                description = $3,
                start_time = $4,
                end_time = $5,
                duration = $6,
                attempt_limit = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam.id)
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration)
        .bind(exam.attempt_limit)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn set_exam_questions(
        &self,
        exam_id: i64,
        questions: &[ExamQuestion],
    ) -> StoreResult<Option<Exam>> {
        sqlx::query_as::<_, Exam>(&format!(
            r#"
            UPDATE exams SET questions = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam_id)
        .bind(Json(questions.to_vec()))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn set_assigned_students(
        &self,
        exam_id: i64,
        student_ids: &[i64],
    ) -> StoreResult<Option<Exam>> {
        sqlx::query_as::<_, Exam>(&format!(
            r#"
            UPDATE exams SET assigned_students = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam_id)
        .bind(student_ids)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn finish_exam(&self, exam_id: i64, at: DateTime<Utc>) -> StoreResult<Option<Exam>> {
        sqlx::query_as::<_, Exam>(&format!(
            r#"
            UPDATE exams SET is_finished = TRUE, finished_at = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn delete_exam(&self, exam_id: i64) -> StoreResult<bool> {
        // Attempts and answers go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(exam_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_attempts(&self, exam_id: i64, student_id: i64) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM exam_attempts WHERE exam_id = $1 AND student_id = $2",
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn max_attempts_used(&self, exam_id: i64) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(used), 0)
            FROM (
                SELECT COUNT(*) AS used
                FROM exam_attempts
                WHERE exam_id = $1
                GROUP BY student_id
            ) per_student
            "#,
        )
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn create_attempt(&self, attempt: NewAttempt) -> StoreResult<ExamAttempt> {
        sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            INSERT INTO exam_attempts (exam_id, student_id, attempt_number, started_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt.exam_id)
        .bind(attempt.student_id)
        .bind(attempt.attempt_number)
        .bind(attempt.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_attempt(&self, id: i64) -> StoreResult<Option<ExamAttempt>> {
        sqlx::query_as::<_, ExamAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn list_attempts(&self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>> {
        sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM exam_attempts
            WHERE exam_id = $1
            ORDER BY student_id, attempt_number
            "#
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn complete_attempt(&self, id: i64, at: DateTime<Utc>) -> StoreResult<Option<ExamAttempt>> {
        sqlx::query_as::<_, ExamAttempt>(&format!(
            r#"
            UPDATE exam_attempts SET is_completed = TRUE, completed_at = $2
            WHERE id = $1
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn upsert_answer(
        &self,
        key: AnswerKey,
        response: &AnswerResponse,
        at: DateTime<Utc>,
    ) -> StoreResult<StudentAnswer> {
        sqlx::query_as::<_, StudentAnswer>(&format!(
            r#"
            INSERT INTO student_answers
            (exam_id, student_id, question_id, attempt_number, response, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (exam_id, student_id, question_id, attempt_number) DO UPDATE SET
                response = EXCLUDED.response,
                submitted_at = EXCLUDED.submitted_at
            RETURNING {ANSWER_COLUMNS}
            "#
        ))
        .bind(key.exam_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .bind(key.attempt_number)
        .bind(Json(response.clone()))
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn list_answers(
        &self,
        exam_id: i64,
        student_id: i64,
        attempt_number: i32,
    ) -> StoreResult<Vec<StudentAnswer>> {
        sqlx::query_as::<_, StudentAnswer>(&format!(
            r#"
            SELECT {ANSWER_COLUMNS}
            FROM student_answers
            WHERE exam_id = $1 AND student_id = $2 AND attempt_number = $3
            ORDER BY question_id
            "#
        ))
        .bind(exam_id)
        .bind(student_id)
        .bind(attempt_number)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn set_answer_score(&self, key: AnswerKey, score: f64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE student_answers SET score = $5
            WHERE exam_id = $1 AND student_id = $2 AND question_id = $3 AND attempt_number = $4
            "#,
        )
        .bind(key.exam_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .bind(key.attempt_number)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::Duration;
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::models::question::QuestionType;

    /// Connects to `DATABASE_URL` and applies migrations.
    /// Returns `None` when no database is configured, so these tests are skipped.
    async fn test_store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())?;

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("Failed to connect to Postgres for testing");
        let store = PgStore::new(pool);
        store.migrate().await.expect("Failed to migrate database");
        Some(store)
    }

    static SEQ: AtomicU64 = AtomicU64::new(0);

    fn unique(tag: &str) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}@example.com", tag, nanos, seq)
    }

    async fn insert_user(store: &PgStore, role: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING id")
            .bind(role)
            .bind(unique(role))
            .bind(role)
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    async fn insert_question(store: &PgStore, question_type: QuestionType) -> i64 {
        sqlx::query_scalar("INSERT INTO questions (type, text) VALUES ($1, 'Explain.') RETURNING id")
            .bind(question_type.as_str())
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    async fn create_exam(store: &PgStore, teacher_id: i64) -> Exam {
        let now = Utc::now();
        store
            .create_exam(NewExam {
                title: "Algebra".to_string(),
                description: String::new(),
                start_time: now - Duration::hours(1),
                end_time: now + Duration::hours(1),
                duration: 30,
                attempt_limit: 2,
                created_by: teacher_id,
            })
            .await
            .unwrap()
    }

    fn new_attempt(exam_id: i64, student_id: i64, number: i32) -> NewAttempt {
        NewAttempt {
            exam_id,
            student_id,
            attempt_number: number,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_attempt_number_is_unique_violation() {
        let Some(store) = test_store().await else { return };
        let teacher = insert_user(&store, "teacher").await;
        let student = insert_user(&store, "student").await;
        let exam = create_exam(&store, teacher).await;

        store.create_attempt(new_attempt(exam.id, student, 1)).await.unwrap();
        let err = store
            .create_attempt(new_attempt(exam.id, student, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation));
        assert_eq!(store.count_attempts(exam.id, student).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_answer_upsert_keeps_one_row_and_its_score() {
        let Some(store) = test_store().await else { return };
        let teacher = insert_user(&store, "teacher").await;
        let student = insert_user(&store, "student").await;
        let question = insert_question(&store, QuestionType::OpenEnded).await;
        let exam = create_exam(&store, teacher).await;
        let key = AnswerKey {
            exam_id: exam.id,
            student_id: student,
            question_id: question,
            attempt_number: 1,
        };

        store
            .upsert_answer(key, &AnswerResponse::Text("first".into()), Utc::now())
            .await
            .unwrap();
        assert!(store.set_answer_score(key, 6.5).await.unwrap());
        store
            .upsert_answer(key, &AnswerResponse::Text("second".into()), Utc::now())
            .await
            .unwrap();

        let answers = store.list_answers(exam.id, student, 1).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].response.0, AnswerResponse::Text("second".into()));
        assert_eq!(answers[0].score, Some(6.5));
    }

    #[tokio::test]
    async fn test_list_exams_filters_by_assignment() {
        let Some(store) = test_store().await else { return };
        let teacher = insert_user(&store, "teacher").await;
        let assigned = insert_user(&store, "student").await;
        let outsider = insert_user(&store, "student").await;
        let exam = create_exam(&store, teacher).await;
        store.set_assigned_students(exam.id, &[assigned]).await.unwrap();

        let visible = store.list_exams(Some(assigned)).await.unwrap();
        assert!(visible.iter().any(|e| e.id == exam.id));

        let hidden = store.list_exams(Some(outsider)).await.unwrap();
        assert!(hidden.iter().all(|e| e.id != exam.id));

        let all = store.list_exams(None).await.unwrap();
        assert!(all.iter().any(|e| e.id == exam.id));
    }

    #[tokio::test]
    async fn test_exam_questions_and_attempt_usage_round_trip() {
        let Some(store) = test_store().await else { return };
        let teacher = insert_user(&store, "teacher").await;
        let student = insert_user(&store, "student").await;
        let question = insert_question(&store, QuestionType::SingleChoice).await;
        let exam = create_exam(&store, teacher).await;

        let slots = [ExamQuestion { question_id: question, points: 10 }];
        let updated = store.set_exam_questions(exam.id, &slots).await.unwrap().unwrap();
        assert_eq!(updated.questions.0, slots.to_vec());

        assert_eq!(store.max_attempts_used(exam.id).await.unwrap(), 0);
        store.create_attempt(new_attempt(exam.id, student, 1)).await.unwrap();
        store.create_attempt(new_attempt(exam.id, student, 2)).await.unwrap();
        assert_eq!(store.max_attempts_used(exam.id).await.unwrap(), 2);
    }
}

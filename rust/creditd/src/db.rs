use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{CompletionRecord, Role, Semester, Student, Subject, Teacher};
use crate::store::{ChangeFeed, CreditStore, Subscription};

pub const DB_FILE: &str = "creditd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            roll_no TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            year_of_study TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            teacher_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY,
            semester INTEGER NOT NULL CHECK(semester BETWEEN 1 AND 8),
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            mode_of_study TEXT NOT NULL,
            credits INTEGER NOT NULL CHECK(credits > 0)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_semester ON subjects(semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS completion_records(
            id TEXT PRIMARY KEY,
            roll_no TEXT NOT NULL,
            subject_id INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            completed INTEGER NOT NULL,
            saved INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            FOREIGN KEY(roll_no) REFERENCES students(roll_no),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(roll_no, subject_id, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_completion_records_student ON completion_records(roll_no)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_completion_records_student_semester
         ON completion_records(roll_no, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn semester_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Semester> {
    let n: i64 = row.get(idx)?;
    Semester::new(n).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, n))
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        semester: semester_col(row, 1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        mode_of_study: row.get(4)?,
        credits: row.get(5)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CompletionRecord> {
    Ok(CompletionRecord {
        id: row.get(0)?,
        roll_no: row.get(1)?,
        subject_id: row.get(2)?,
        semester: semester_col(row, 3)?,
        completed: row.get::<_, i64>(4)? != 0,
        saved: row.get::<_, i64>(5)? != 0,
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        roll_no: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        year_of_study: row.get(3)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Workspace-backed store. All writes go through one connection, so a
/// session always reads its own acknowledged writes.
pub struct SqliteStore {
    conn: Connection,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            feed: ChangeFeed::new(),
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn insert_student(
        &self,
        roll_no: &str,
        name: &str,
        department: &str,
        year_of_study: &str,
        password_hash: &str,
    ) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO students(roll_no, name, department, year_of_study, password_hash, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    roll_no,
                    name,
                    department,
                    year_of_study,
                    password_hash,
                    Utc::now().to_rfc3339(),
                ),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::Duplicate {
                        entity: "student",
                        id: roll_no.to_string(),
                    }
                } else {
                    CoreError::Transient(e)
                }
            })?;
        Ok(())
    }

    pub fn insert_teacher(
        &self,
        teacher_id: &str,
        name: &str,
        department: &str,
        password_hash: &str,
    ) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO teachers(teacher_id, name, department, password_hash, created_at)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    teacher_id,
                    name,
                    department,
                    password_hash,
                    Utc::now().to_rfc3339(),
                ),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::Duplicate {
                        entity: "teacher",
                        id: teacher_id.to_string(),
                    }
                } else {
                    CoreError::Transient(e)
                }
            })?;
        Ok(())
    }

    pub fn fetch_teacher(&self, teacher_id: &str) -> Result<Teacher, CoreError> {
        self.conn
            .query_row(
                "SELECT teacher_id, name, department FROM teachers WHERE teacher_id = ?",
                [teacher_id],
                |r| {
                    Ok(Teacher {
                        teacher_id: r.get(0)?,
                        name: r.get(1)?,
                        department: r.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| CoreError::NotFound {
                entity: "teacher",
                id: teacher_id.to_string(),
            })
    }

    /// Stored credential digest for an account, if the account exists.
    pub fn password_hash(&self, role: Role, id: &str) -> Result<Option<String>, CoreError> {
        let sql = match role {
            Role::Student => "SELECT password_hash FROM students WHERE roll_no = ?",
            Role::Teacher => "SELECT password_hash FROM teachers WHERE teacher_id = ?",
        };
        Ok(self.conn.query_row(sql, [id], |r| r.get(0)).optional()?)
    }

    pub fn list_students(&self) -> Result<Vec<Student>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT roll_no, name, department, year_of_study FROM students ORDER BY roll_no",
        )?;
        let rows = stmt
            .query_map([], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Inserts or replaces a catalog subject. `id` of 0 allocates a new one.
    pub fn upsert_subject(&self, subject: &Subject) -> Result<i64, CoreError> {
        if subject.id == 0 {
            self.conn.execute(
                "INSERT INTO subjects(semester, code, name, mode_of_study, credits)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    subject.semester.number(),
                    &subject.code,
                    &subject.name,
                    &subject.mode_of_study,
                    subject.credits,
                ),
            )?;
            return Ok(self.conn.last_insert_rowid());
        }

        let tx = self.conn.unchecked_transaction()?;
        let current: Option<i64> = tx
            .query_row(
                "SELECT semester FROM subjects WHERE id = ?",
                [subject.id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(prev) = current {
            // Records denormalise the semester; moving a subject with records would split them.
            if prev != subject.semester.number() as i64 {
                let has_records: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM completion_records WHERE subject_id = ?)",
                    [subject.id],
                    |r| r.get(0),
                )?;
                if has_records {
                    return Err(CoreError::SemesterMismatch {
                        subject_id: subject.id,
                        expected: Semester::new(prev)?,
                        got: subject.semester,
                    });
                }
            }
        }
        tx.execute(
            "INSERT INTO subjects(id, semester, code, name, mode_of_study, credits)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               semester = excluded.semester,
               code = excluded.code,
               name = excluded.name,
               mode_of_study = excluded.mode_of_study,
               credits = excluded.credits",
            (
                subject.id,
                subject.semester.number(),
                &subject.code,
                &subject.name,
                &subject.mode_of_study,
                subject.credits,
            ),
        )?;
        tx.commit()?;
        Ok(subject.id)
    }
}

impl CreditStore for SqliteStore {
    fn fetch_student(&self, roll_no: &str) -> Result<Student, CoreError> {
        self.conn
            .query_row(
                "SELECT roll_no, name, department, year_of_study FROM students WHERE roll_no = ?",
                [roll_no],
                student_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::NotFound {
                entity: "student",
                id: roll_no.to_string(),
            })
    }

    fn fetch_subjects(&self) -> Result<Vec<Subject>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, semester, code, name, mode_of_study, credits
             FROM subjects ORDER BY semester, code, id",
        )?;
        let rows = stmt
            .query_map([], subject_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn fetch_completion_records(&self, roll_no: &str) -> Result<Vec<CompletionRecord>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, roll_no, subject_id, semester, completed, saved
             FROM completion_records WHERE roll_no = ? ORDER BY semester, subject_id",
        )?;
        let rows = stmt
            .query_map([roll_no], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn upsert_completion_record(
        &self,
        roll_no: &str,
        subject_id: i64,
        semester: Semester,
        completed: bool,
        saved: bool,
    ) -> Result<CompletionRecord, CoreError> {
        let record_id = Uuid::new_v4().to_string();
        // `saved` only ever moves forward, even if a caller passes false.
        self.conn.execute(
            "INSERT INTO completion_records(id, roll_no, subject_id, semester, completed, saved, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(roll_no, subject_id, semester) DO UPDATE SET
               completed = excluded.completed,
               saved = MAX(completion_records.saved, excluded.saved),
               updated_at = excluded.updated_at",
            (
                &record_id,
                roll_no,
                subject_id,
                semester.number(),
                completed as i64,
                saved as i64,
                Utc::now().to_rfc3339(),
            ),
        )?;
        let rec = self.conn.query_row(
            "SELECT id, roll_no, subject_id, semester, completed, saved
             FROM completion_records WHERE roll_no = ? AND subject_id = ? AND semester = ?",
            (roll_no, subject_id, semester.number()),
            record_from_row,
        )?;
        self.feed.publish(roll_no);
        Ok(rec)
    }

    fn mark_semester_saved(&self, roll_no: &str, semester: Semester) -> Result<usize, CoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE completion_records SET saved = 1, updated_at = ?
             WHERE roll_no = ? AND semester = ?",
            (Utc::now().to_rfc3339(), roll_no, semester.number()),
        )?;
        tx.commit()?;
        if changed > 0 {
            self.feed.publish(roll_no);
        }
        Ok(changed)
    }

    fn subscribe_to_changes(&self, roll_no: Option<&str>) -> Subscription {
        self.feed.subscribe(roll_no)
    }
}

//! SQLite-based storage implementation

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    Credential, CredentialStore, NewUser, PhoneVerification, ProfileUpdate, RefreshGrant,
    ResetCode, SessionStatus, SignupSession, SignupSessionId, SignupSessionStore, StoreResult,
    User, UserDirectory, UserId, UserSearch, VerifiedAttribute,
};
use crate::error::ApiError;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

const SESSION_COLUMNS: &str = "id, token, device_id, phone_number, phone_number_verified, \
     is_phone_number_taken, email, status, otp_try_count, expires_in, created_at, updated_at, version";

const USER_COLUMNS: &str = "id, name, birth_date, email, email_verified, phone_number, \
     phone_number_verified, subject, user_confirmed, created_at";

const CREDENTIAL_COLUMNS: &str = "subject, username, password_hash, email, phone_number, \
     confirmed, email_verified, phone_number_verified, created_at";

/// SQLite-based store implementing every store trait over one connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, ApiError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, ApiError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), ApiError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }
            if current_version < 2 {
                Self::migrate_v2(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, ApiError> {
        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })?)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), ApiError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS signup_sessions (
                id TEXT PRIMARY KEY,
                token TEXT NOT NULL UNIQUE,
                device_id TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                phone_number_verified TEXT NOT NULL,
                is_phone_number_taken INTEGER NOT NULL,
                email TEXT,
                status TEXT NOT NULL,
                otp_try_count INTEGER NOT NULL DEFAULT 0,
                -- unix millis, compared by the janitor
                expires_in INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                version INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT,
                birth_date TEXT,
                email TEXT NOT NULL UNIQUE,
                email_verified INTEGER NOT NULL DEFAULT 0,
                phone_number TEXT NOT NULL UNIQUE,
                phone_number_verified INTEGER NOT NULL DEFAULT 0,
                subject TEXT NOT NULL UNIQUE,
                user_confirmed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS follows (
                follower_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                followee_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            );
            CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id);

            CREATE TABLE IF NOT EXISTS credentials (
                subject TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                email TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                confirmed INTEGER NOT NULL DEFAULT 0,
                email_verified INTEGER NOT NULL DEFAULT 0,
                phone_number_verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS refresh_grants (
                token TEXT PRIMARY KEY,
                subject TEXT NOT NULL REFERENCES credentials(subject) ON DELETE CASCADE,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reset_codes (
                subject TEXT PRIMARY KEY REFERENCES credentials(subject) ON DELETE CASCADE,
                code TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Migration to version 2: one session per device/phone pair
    fn migrate_v2(conn: &Connection) -> Result<(), ApiError> {
        conn.execute_batch(
            r#"
            DELETE FROM signup_sessions WHERE rowid NOT IN (
                SELECT MAX(rowid) FROM signup_sessions GROUP BY device_id, phone_number
            );
            DROP INDEX IF EXISTS idx_signup_device_phone;
            CREATE UNIQUE INDEX idx_signup_device_phone
                ON signup_sessions(device_id, phone_number);
            "#,
        )?;

        Ok(())
    }
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Whether a constraint failure came from the device/phone unique index
fn is_device_phone_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("device_id")
    )
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SignupSession> {
    let verified: String = row.get(4)?;
    let status: String = row.get(7)?;
    let expires_in: i64 = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;
    let version: i64 = row.get(12)?;

    Ok(SignupSession {
        id: SignupSessionId(row.get(0)?),
        token: row.get(1)?,
        device_id: row.get(2)?,
        phone_number: row.get(3)?,
        phone_number_verified: PhoneVerification::from_str(&verified)
            .unwrap_or(PhoneVerification::NotVerified),
        is_phone_number_taken: row.get(5)?,
        email: row.get(6)?,
        status: SessionStatus::from_str(&status).unwrap_or(SessionStatus::Init),
        otp_try_count: row.get(8)?,
        expires_in: DateTime::from_timestamp_millis(expires_in).unwrap_or_else(Utc::now),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
        version: version as u64,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let birth_date: Option<String> = row.get(2)?;
    let created_at: String = row.get(9)?;

    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        birth_date: birth_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        email: row.get(3)?,
        email_verified: row.get(4)?,
        phone_number: row.get(5)?,
        phone_number_verified: row.get(6)?,
        subject: row.get(7)?,
        user_confirmed: row.get(8)?,
        created_at: parse_ts(&created_at),
    })
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let created_at: String = row.get(8)?;

    Ok(Credential {
        subject: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        phone_number: row.get(4)?,
        confirmed: row.get(5)?,
        email_verified: row.get(6)?,
        phone_number_verified: row.get(7)?,
        created_at: parse_ts(&created_at),
    })
}

fn find_session(conn: &Connection, clause: &str, args: &[&str]) -> StoreResult<Option<SignupSession>> {
    let sql = format!("SELECT {} FROM signup_sessions WHERE {}", SESSION_COLUMNS, clause);
    Ok(conn
        .query_row(&sql, rusqlite::params_from_iter(args.iter()), session_from_row)
        .optional()?)
}

fn find_user(conn: &Connection, column: &str, value: &str) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    Ok(conn.query_row(&sql, params![value], user_from_row).optional()?)
}

fn require_user(conn: &Connection, user_id: &UserId) -> StoreResult<User> {
    find_user(conn, "id", &user_id.0)?.ok_or(ApiError::UserNotFound)
}

fn query_users(conn: &Connection, sql: &str, value: &str) -> StoreResult<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params![value], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

impl SignupSessionStore for SqliteStore {
    fn find_by_token(&self, token: &str) -> StoreResult<Option<SignupSession>> {
        let conn = self.conn()?;
        find_session(&conn, "token = ?1", &[token])
    }

    fn find_by_device_and_phone(
        &self,
        device_id: &str,
        phone_number: &str,
    ) -> StoreResult<Option<SignupSession>> {
        let conn = self.conn()?;
        find_session(
            &conn,
            "device_id = ?1 AND phone_number = ?2",
            &[device_id, phone_number],
        )
    }

    fn save(&self, session: &SignupSession) -> StoreResult<SignupSession> {
        let conn = self.conn()?;

        let mut saved = session.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();

        let token_conflict = |e: rusqlite::Error| {
            if is_device_phone_violation(&e) {
                ApiError::SessionActive
            } else if is_constraint_violation(&e) {
                ApiError::Conflict("session token already in use".to_string())
            } else {
                ApiError::from(e)
            }
        };

        if session.version == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM signup_sessions WHERE id = ?1)",
                params![session.id.0],
                |row| row.get(0),
            )?;
            if exists {
                return Err(ApiError::SessionConflict);
            }

            conn.execute(
                &format!(
                    "INSERT INTO signup_sessions ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    SESSION_COLUMNS
                ),
                params![
                    saved.id.0,
                    saved.token,
                    saved.device_id,
                    saved.phone_number,
                    saved.phone_number_verified.as_str(),
                    saved.is_phone_number_taken,
                    saved.email,
                    saved.status.as_str(),
                    saved.otp_try_count,
                    saved.expires_in.timestamp_millis(),
                    ts(&saved.created_at),
                    ts(&saved.updated_at),
                    saved.version as i64,
                ],
            )
            .map_err(token_conflict)?;

            return Ok(saved);
        }

        let rows_affected = conn
            .execute(
                "UPDATE signup_sessions SET token = ?1, phone_number_verified = ?2, email = ?3, \
                 status = ?4, otp_try_count = ?5, expires_in = ?6, updated_at = ?7, version = ?8 \
                 WHERE id = ?9 AND version = ?10",
                params![
                    saved.token,
                    saved.phone_number_verified.as_str(),
                    saved.email,
                    saved.status.as_str(),
                    saved.otp_try_count,
                    saved.expires_in.timestamp_millis(),
                    ts(&saved.updated_at),
                    saved.version as i64,
                    saved.id.0,
                    session.version as i64,
                ],
            )
            .map_err(token_conflict)?;

        if rows_affected == 0 {
            return Err(ApiError::SessionConflict);
        }

        Ok(saved)
    }

    fn delete(&self, id: &SignupSessionId) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM signup_sessions WHERE id = ?1", params![id.0])?;
        Ok(())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let conn = self.conn()?;
        let rows_deleted = conn.execute(
            "DELETE FROM signup_sessions WHERE expires_in < ?1",
            params![now.timestamp_millis()],
        )?;
        Ok(rows_deleted as u64)
    }
}

impl UserDirectory for SqliteStore {
    fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let conn = self.conn()?;
        let user = User {
            id: UserId(uuid::Uuid::new_v4().to_string()),
            name: None,
            birth_date: None,
            email: new_user.email.to_lowercase(),
            email_verified: false,
            phone_number: new_user.phone_number,
            phone_number_verified: false,
            subject: new_user.subject,
            user_confirmed: new_user.user_confirmed,
            created_at: Utc::now(),
        };

        conn.execute(
            &format!(
                "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                USER_COLUMNS
            ),
            params![
                user.id.0,
                user.name,
                Option::<String>::None,
                user.email,
                user.email_verified,
                user.phone_number,
                user.phone_number_verified,
                user.subject,
                user.user_confirmed,
                ts(&user.created_at),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                return ApiError::Conflict("user already registered".to_string());
            }
            ApiError::from(e)
        })?;

        Ok(user)
    }

    fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        find_user(&conn, "id", &user_id.0)
    }

    fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        find_user(&conn, "phone_number", phone_number)
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        find_user(&conn, "email", &email.to_lowercase())
    }

    fn find_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        find_user(&conn, "subject", subject)
    }

    fn mark_confirmed(&self, user_id: &UserId, confirmed: bool) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET user_confirmed = ?1 WHERE id = ?2",
            params![confirmed, user_id.0],
        )?;
        require_user(&conn, user_id)
    }

    fn mark_attribute_verified(
        &self,
        user_id: &UserId,
        attribute: VerifiedAttribute,
    ) -> StoreResult<User> {
        let conn = self.conn()?;
        let sql = match attribute {
            VerifiedAttribute::EmailVerified => "UPDATE users SET email_verified = 1 WHERE id = ?1",
            VerifiedAttribute::PhoneNumberVerified => {
                "UPDATE users SET phone_number_verified = 1 WHERE id = ?1"
            }
        };
        conn.execute(sql, params![user_id.0])?;
        require_user(&conn, user_id)
    }

    fn update_profile(&self, user_id: &UserId, update: ProfileUpdate) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET name = COALESCE(?1, name), birth_date = COALESCE(?2, birth_date) \
             WHERE id = ?3",
            params![
                update.name,
                update.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                user_id.0,
            ],
        )?;
        require_user(&conn, user_id)
    }

    fn delete_user(&self, user_id: &UserId) -> StoreResult<()> {
        let conn = self.conn()?;
        // Follow edges go with the user via ON DELETE CASCADE
        conn.execute("DELETE FROM users WHERE id = ?1", params![user_id.0])?;
        Ok(())
    }

    fn search(&self, query: &UserSearch) -> StoreResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users.into_iter().filter(|u| query.matches(u)).collect())
    }

    fn follow(&self, follower: &UserId, followee: &UserId) -> StoreResult<()> {
        let conn = self.conn()?;
        require_user(&conn, follower)?;
        require_user(&conn, followee)?;

        conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
            params![follower.0, followee.0, ts(&Utc::now())],
        )?;
        Ok(())
    }

    fn unfollow(&self, follower: &UserId, followee: &UserId) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower.0, followee.0],
        )?;
        Ok(())
    }

    fn is_following(&self, follower: &UserId, followee: &UserId) -> StoreResult<bool> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
            params![follower.0, followee.0],
            |row| row.get(0),
        )?)
    }

    fn followers(&self, user_id: &UserId) -> StoreResult<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE id IN \
             (SELECT follower_id FROM follows WHERE followee_id = ?1) ORDER BY created_at",
            USER_COLUMNS
        );
        query_users(&conn, &sql, &user_id.0)
    }

    fn following(&self, user_id: &UserId) -> StoreResult<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE id IN \
             (SELECT followee_id FROM follows WHERE follower_id = ?1) ORDER BY created_at",
            USER_COLUMNS
        );
        query_users(&conn, &sql, &user_id.0)
    }

    fn popular(&self, exclude: Option<&UserId>, limit: usize) -> StoreResult<Vec<(User, u64)>> {
        let conn = self.conn()?;
        let columns: Vec<String> = USER_COLUMNS
            .split(", ")
            .map(|c| format!("u.{}", c))
            .collect();
        let sql = format!(
            "SELECT {}, COUNT(f.follower_id) AS follower_count \
             FROM users u LEFT JOIN follows f ON f.followee_id = u.id \
             WHERE ?1 IS NULL OR u.id != ?1 \
             GROUP BY u.id ORDER BY follower_count DESC, u.created_at ASC LIMIT ?2",
            columns.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let ranked = stmt
            .query_map(params![exclude.map(|id| id.0.as_str()), limit as i64], |row| {
                let count: i64 = row.get(10)?;
                Ok((user_from_row(row)?, count as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ranked)
    }
}

impl CredentialStore for SqliteStore {
    fn insert_credential(&self, credential: Credential) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO credentials ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                CREDENTIAL_COLUMNS
            ),
            params![
                credential.subject,
                credential.username,
                credential.password_hash,
                credential.email,
                credential.phone_number,
                credential.confirmed,
                credential.email_verified,
                credential.phone_number_verified,
                ts(&credential.created_at),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                return ApiError::Conflict("username already exists".to_string());
            }
            ApiError::from(e)
        })?;
        Ok(())
    }

    fn get_credential(&self, subject: &str) -> StoreResult<Option<Credential>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM credentials WHERE subject = ?1", CREDENTIAL_COLUMNS);
        Ok(conn.query_row(&sql, params![subject], credential_from_row).optional()?)
    }

    fn find_credential_by_username(&self, username: &str) -> StoreResult<Option<Credential>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM credentials WHERE username = ?1", CREDENTIAL_COLUMNS);
        Ok(conn.query_row(&sql, params![username], credential_from_row).optional()?)
    }

    fn update_credential(&self, credential: &Credential) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows_affected = conn.execute(
            "UPDATE credentials SET password_hash = ?1, email = ?2, phone_number = ?3, \
             confirmed = ?4, email_verified = ?5, phone_number_verified = ?6 WHERE subject = ?7",
            params![
                credential.password_hash,
                credential.email,
                credential.phone_number,
                credential.confirmed,
                credential.email_verified,
                credential.phone_number_verified,
                credential.subject,
            ],
        )?;

        if rows_affected == 0 {
            return Err(ApiError::UserNotFound);
        }
        Ok(())
    }

    fn delete_credential(&self, subject: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        // Grants and reset codes cascade
        conn.execute("DELETE FROM credentials WHERE subject = ?1", params![subject])?;
        Ok(())
    }

    fn store_refresh_grant(&self, grant: RefreshGrant) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO refresh_grants (token, subject, expires_at) VALUES (?1, ?2, ?3)",
            params![grant.token, grant.subject, ts(&grant.expires_at)],
        )?;
        Ok(())
    }

    fn get_refresh_grant(&self, token: &str) -> StoreResult<Option<RefreshGrant>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT token, subject, expires_at FROM refresh_grants WHERE token = ?1",
                params![token],
                |row| {
                    let expires_at: String = row.get(2)?;
                    Ok(RefreshGrant {
                        token: row.get(0)?,
                        subject: row.get(1)?,
                        expires_at: parse_ts(&expires_at),
                    })
                },
            )
            .optional()?)
    }

    fn store_reset_code(&self, code: ResetCode) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO reset_codes (subject, code, created_at) VALUES (?1, ?2, ?3)",
            params![code.subject, code.code, ts(&code.created_at)],
        )?;
        Ok(())
    }

    fn take_reset_code(&self, subject: &str) -> StoreResult<Option<ResetCode>> {
        let conn = self.conn()?;
        let code = conn
            .query_row(
                "SELECT subject, code, created_at FROM reset_codes WHERE subject = ?1",
                params![subject],
                |row| {
                    let created_at: String = row.get(2)?;
                    Ok(ResetCode {
                        subject: row.get(0)?,
                        code: row.get(1)?,
                        created_at: parse_ts(&created_at),
                    })
                },
            )
            .optional()?;

        if code.is_some() {
            conn.execute("DELETE FROM reset_codes WHERE subject = ?1", params![subject])?;
        }
        Ok(code)
    }
}

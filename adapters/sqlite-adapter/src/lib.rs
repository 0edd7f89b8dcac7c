//! sqlite-adapter — SQLite implementation of the MemberRepository port.
//!
//! Purpose
//! - Durable, file-based member store for the api-server.
//! - Implements the `MemberRepository` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as milliseconds since UNIX_EPOCH (i64).
//! - The `UNIQUE COLLATE NOCASE` index on `email` is what actually closes the
//!   check-then-insert race; the in-transaction lookup only gives a friendlier
//!   error first.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{CoreError, Member, MemberChanges, MemberId, MemberRepository, NewMember};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

const SELECT_MEMBER: &str =
    "SELECT id, name, email, phone_number, date_joined, updated_on, is_active FROM members";

/// SQLite-backed member repository.
pub struct SqliteMemberRepo {
    conn: Mutex<Connection>,
}

impl SqliteMemberRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    /// The parent directory is created when missing.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                CoreError::Repository(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "sqlite member store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            phone_number TEXT NOT NULL,
            date_joined INTEGER NOT NULL,
            updated_on INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

/// Writes that trip the unique index become a conflict on `email`.
fn map_write_err(e: rusqlite::Error, email: &str) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return CoreError::email_taken(email);
        }
    }
    map_sqerr(e)
}

/// Pre-epoch times clamp to 0; times beyond the i64 millisecond range are
/// rejected.
fn system_time_to_millis(t: SystemTime) -> Result<i64, CoreError> {
    let ms = t
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    i64::try_from(ms)
        .map_err(|_| CoreError::Repository(format!("timestamp out of range: {ms} ms")))
}

fn millis_to_system_time(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<Member> {
    let is_active: i64 = row.get(6)?;
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        date_joined: millis_to_system_time(row.get(4)?),
        updated_on: millis_to_system_time(row.get(5)?),
        is_active: is_active != 0,
    })
}

fn find(conn: &Connection, id: MemberId) -> Result<Option<Member>, CoreError> {
    conn.query_row(
        &format!("{SELECT_MEMBER} WHERE id = ?1"),
        params![id],
        row_to_member,
    )
    .optional()
    .map_err(map_sqerr)
}

/// Whether another row (optionally excluding `except`) already uses `email`.
fn email_taken(conn: &Connection, email: &str, except: Option<MemberId>) -> Result<bool, CoreError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM members WHERE email = ?1 AND (?2 IS NULL OR id <> ?2))",
        params![email, except],
        |row| row.get::<_, bool>(0),
    )
    .map_err(map_sqerr)
}

impl MemberRepository for SqliteMemberRepo {
    fn list_all(&self) -> Result<Vec<Member>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_MEMBER} ORDER BY id"))
            .map_err(map_sqerr)?;
        let rows = stmt.query_map([], row_to_member).map_err(map_sqerr)?;
        let members = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sqerr)?;
        Ok(members)
    }

    fn get(&self, id: MemberId) -> Result<Member, CoreError> {
        let conn = self.lock()?;
        find(&conn, id)?.ok_or_else(|| CoreError::member_not_found(id))
    }

    fn create(&self, input: NewMember, now: SystemTime) -> Result<Member, CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        if email_taken(&tx, &input.email, None)? {
            return Err(CoreError::email_taken(&input.email));
        }
        let ts = system_time_to_millis(now)?;
        tx.execute(
            "INSERT INTO members(name, email, phone_number, date_joined, updated_on, is_active) VALUES (?1, ?2, ?3, ?4, ?4, 1)",
            params![input.name, input.email, input.phone_number, ts],
        )
        .map_err(|e| map_write_err(e, &input.email))?;
        let id = tx.last_insert_rowid();
        let created = find(&tx, id)?
            .ok_or_else(|| CoreError::Repository(format!("inserted row {id} not readable")))?;
        tx.commit().map_err(map_sqerr)?;
        debug!(id, "member row inserted");
        Ok(created)
    }

    fn update(&self, changes: MemberChanges, now: SystemTime) -> Result<Member, CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let id = changes.id;
        let Some(mut member) = find(&tx, id)? else {
            return Err(CoreError::member_not_found(id));
        };
        if email_taken(&tx, &changes.email, Some(id))? {
            return Err(CoreError::email_taken(&changes.email));
        }
        member.apply(changes, now);
        let updated_on = system_time_to_millis(member.updated_on)?;
        tx.execute(
            "UPDATE members SET name = ?1, email = ?2, phone_number = ?3, is_active = ?4, updated_on = ?5 WHERE id = ?6",
            params![
                member.name,
                member.email,
                member.phone_number,
                member.is_active,
                updated_on,
                id,
            ],
        )
        .map_err(|e| map_write_err(e, &member.email))?;
        let updated = find(&tx, id)?.ok_or_else(|| CoreError::member_not_found(id))?;
        tx.commit().map_err(map_sqerr)?;
        debug!(id, "member row updated");
        Ok(updated)
    }

    fn delete(&self, id: MemberId) -> Result<bool, CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM members WHERE id = ?1", params![id])
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db() -> (SqliteMemberRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("App_Data").join("members.db");
        let repo = SqliteMemberRepo::new(path).unwrap();
        (repo, dir)
    }

    fn new_member(name: &str, email: &str) -> NewMember {
        NewMember {
            name: name.into(),
            email: email.into(),
            phone_number: "555".into(),
        }
    }

    fn changes(id: MemberId, email: &str) -> MemberChanges {
        MemberChanges {
            id,
            name: "Changed".into(),
            email: email.into(),
            phone_number: "777".into(),
            is_active: false,
        }
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn create_get_roundtrip() {
        let (repo, _dir) = tmp_db();
        let created = repo.create(new_member("Ann", "ann@x.com"), at(1000)).unwrap();
        assert_eq!(created.id, 1);
        assert!(created.is_active);
        assert_eq!(created.date_joined, at(1000));
        assert_eq!(created.updated_on, at(1000));

        let got = repo.get(created.id).unwrap();
        assert_eq!(got, created);
    }

    #[test]
    fn duplicate_email_conflicts_and_keeps_counter() {
        let (repo, _dir) = tmp_db();
        repo.create(new_member("Ann", "ann@x.com"), at(1)).unwrap();
        let err = repo.create(new_member("Other", "ANN@x.com"), at(2)).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(repo.list_all().unwrap().len(), 1);

        let next = repo.create(new_member("Bob", "bob@x.com"), at(3)).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn unique_index_rejects_raw_duplicate() {
        let (repo, _dir) = tmp_db();
        repo.create(new_member("Ann", "ann@x.com"), at(1)).unwrap();
        let conn = repo.conn.lock().unwrap();
        let err = conn
            .execute(
                "INSERT INTO members(name, email, phone_number, date_joined, updated_on) VALUES ('x', 'Ann@X.com', '1', 0, 0)",
                [],
            )
            .unwrap_err();
        assert!(matches!(
            map_write_err(err, "Ann@X.com"),
            CoreError::Conflict(_)
        ));
    }

    #[test]
    fn list_is_in_insertion_order() {
        let (repo, _dir) = tmp_db();
        assert!(repo.list_all().unwrap().is_empty());
        for i in 0..3 {
            repo.create(new_member(&format!("M{i}"), &format!("m{i}@x.com")), at(i))
                .unwrap();
        }
        let names: Vec<_> = repo.list_all().unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["M0", "M1", "M2"]);
    }

    #[test]
    fn update_merges_fields_and_refreshes_timestamp() {
        let (repo, _dir) = tmp_db();
        let created = repo.create(new_member("Ann", "ann@x.com"), at(100)).unwrap();
        let updated = repo.update(changes(created.id, "ann@x.com"), at(200)).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Changed");
        assert_eq!(updated.phone_number, "777");
        assert!(!updated.is_active);
        assert_eq!(updated.date_joined, at(100));
        assert_eq!(updated.updated_on, at(200));
        assert_eq!(repo.get(created.id).unwrap(), updated);
    }

    #[test]
    fn update_never_moves_updated_on_backwards() {
        let (repo, _dir) = tmp_db();
        let created = repo.create(new_member("Ann", "ann@x.com"), at(100)).unwrap();
        let updated = repo.update(changes(created.id, "ann@x.com"), at(50)).unwrap();
        assert_eq!(updated.updated_on, at(100));
    }

    #[test]
    fn updated_on_survives_clock_stepping_back() {
        let (repo, _dir) = tmp_db();
        let created = repo.create(new_member("Ann", "ann@x.com"), at(100)).unwrap();
        let first = repo.update(changes(created.id, "ann@x.com"), at(200)).unwrap();
        let second = repo.update(changes(created.id, "ann@x.com"), at(150)).unwrap();
        assert!(second.updated_on >= first.updated_on);
        assert_eq!(repo.get(created.id).unwrap().updated_on, at(200));
    }

    #[test]
    fn timestamp_beyond_millis_range_is_a_repository_error() {
        let (repo, _dir) = tmp_db();
        let far = UNIX_EPOCH.checked_add(Duration::from_secs(1 << 60)).unwrap();
        assert!(matches!(
            system_time_to_millis(far),
            Err(CoreError::Repository(_))
        ));
        let err = repo.create(new_member("Ann", "ann@x.com"), far).unwrap_err();
        assert!(matches!(err, CoreError::Repository(_)));
        assert!(repo.list_all().unwrap().is_empty());
        assert_eq!(system_time_to_millis(UNIX_EPOCH).unwrap(), 0);
    }

    #[test]
    fn update_rejects_taken_email() {
        let (repo, _dir) = tmp_db();
        let ann = repo.create(new_member("Ann", "ann@x.com"), at(1)).unwrap();
        repo.create(new_member("Bob", "bob@x.com"), at(2)).unwrap();
        let err = repo.update(changes(ann.id, "Bob@x.com"), at(3)).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(repo.get(ann.id).unwrap().email, "ann@x.com");
    }

    #[test]
    fn missing_ids() {
        let (repo, _dir) = tmp_db();
        assert_eq!(repo.get(99).unwrap_err(), CoreError::member_not_found(99));
        assert_eq!(
            repo.update(changes(99, "x@x.com"), at(1)).unwrap_err(),
            CoreError::member_not_found(99)
        );
        assert!(!repo.delete(99).unwrap());
    }

    #[test]
    fn delete_is_hard_and_ids_are_not_reused() {
        let (repo, _dir) = tmp_db();
        let ann = repo.create(new_member("Ann", "ann@x.com"), at(1)).unwrap();
        assert!(repo.delete(ann.id).unwrap());
        assert!(matches!(repo.get(ann.id), Err(CoreError::NotFound(_))));

        // Email is free again once the row is gone.
        let again = repo.create(new_member("Ann", "ann@x.com"), at(2)).unwrap();
        assert_eq!(again.id, 2);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.db");
        {
            let repo = SqliteMemberRepo::new(&path).unwrap();
            repo.create(new_member("Ann", "ann@x.com"), at(1)).unwrap();
        }
        let repo = SqliteMemberRepo::new(&path).unwrap();
        assert_eq!(repo.get(1).unwrap().email, "ann@x.com");
    }
}

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::{CoreError, Member, MemberChanges, MemberId, MemberRepository, NewMember};

/// Simple in-memory member store for tests and local demos. The uniqueness
/// check and the write happen under the same mutex guard.
pub struct InMemoryMemberRepo {
    inner: Mutex<Table>,
}

struct Table {
    rows: BTreeMap<MemberId, Member>,
    last_id: MemberId,
}

impl Table {
    fn email_taken(&self, email: &str, except: Option<MemberId>) -> bool {
        self.rows
            .values()
            .any(|m| Some(m.id) != except && m.email.eq_ignore_ascii_case(email))
    }
}

impl InMemoryMemberRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Table {
                rows: BTreeMap::new(),
                last_id: 0,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Table>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryMemberRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberRepository for InMemoryMemberRepo {
    fn list_all(&self) -> Result<Vec<Member>, CoreError> {
        let table = self.lock()?;
        Ok(table.rows.values().cloned().collect())
    }

    fn get(&self, id: MemberId) -> Result<Member, CoreError> {
        let table = self.lock()?;
        table
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::member_not_found(id))
    }

    fn create(&self, input: NewMember, now: SystemTime) -> Result<Member, CoreError> {
        let mut table = self.lock()?;
        if table.email_taken(&input.email, None) {
            return Err(CoreError::email_taken(&input.email));
        }
        let id = table.last_id + 1;
        let member = Member::create(id, input, now);
        table.last_id = id;
        table.rows.insert(id, member.clone());
        Ok(member)
    }

    fn update(&self, changes: MemberChanges, now: SystemTime) -> Result<Member, CoreError> {
        let mut table = self.lock()?;
        let id = changes.id;
        if !table.rows.contains_key(&id) {
            return Err(CoreError::member_not_found(id));
        }
        if table.email_taken(&changes.email, Some(id)) {
            return Err(CoreError::email_taken(&changes.email));
        }
        let member = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| CoreError::member_not_found(id))?;
        member.apply(changes, now);
        Ok(member.clone())
    }

    fn delete(&self, id: MemberId) -> Result<bool, CoreError> {
        let mut table = self.lock()?;
        Ok(table.rows.remove(&id).is_some())
    }
}

use crate::dto::{CreateMemberDto, MemberDto, UpdateMemberDto};
use crate::{Clock, CoreError, MemberId, MemberRepository};

/// Application service orchestrating member CRUD.
///
/// It converts between the API shapes and the stored record and delegates
/// everything else to the repository. Failures from the repository are
/// returned unchanged; validation happens before the service is called.
pub struct MemberService<R: MemberRepository, C: Clock> {
    repo: R,
    clock: C,
}

impl<R: MemberRepository, C: Clock> MemberService<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    pub fn get_all_members(&self) -> Result<Vec<MemberDto>, CoreError> {
        let members = self.repo.list_all()?;
        Ok(members.into_iter().map(MemberDto::from).collect())
    }

    pub fn get_member_by_id(&self, id: MemberId) -> Result<MemberDto, CoreError> {
        self.repo.get(id).map(MemberDto::from)
    }

    pub fn add_member(&self, dto: CreateMemberDto) -> Result<MemberDto, CoreError> {
        let created = self.repo.create(dto.into(), self.clock.now())?;
        Ok(created.into())
    }

    pub fn update_member(&self, dto: UpdateMemberDto) -> Result<MemberDto, CoreError> {
        let updated = self.repo.update(dto.into(), self.clock.now())?;
        Ok(updated.into())
    }

    /// Returns `false` when no member had this id.
    pub fn delete_member(&self, id: MemberId) -> Result<bool, CoreError> {
        self.repo.delete(id)
    }
}

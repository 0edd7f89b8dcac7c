//! API-facing shapes and their field-by-field conversions to and from the
//! stored record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Member, MemberChanges, MemberId, NewMember};

/// Body of a create request. Missing fields deserialize as empty so that
/// validation can report them by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberDto {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
}

/// Body of an update request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberDto {
    #[serde(default)]
    pub id: MemberId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Member as presented to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub date_joined: DateTime<Utc>,
    pub is_active: bool,
}

impl From<CreateMemberDto> for NewMember {
    fn from(dto: CreateMemberDto) -> Self {
        NewMember {
            name: dto.name,
            email: dto.email,
            phone_number: dto.phone_number,
        }
    }
}

impl From<UpdateMemberDto> for MemberChanges {
    fn from(dto: UpdateMemberDto) -> Self {
        MemberChanges {
            id: dto.id,
            name: dto.name,
            email: dto.email,
            phone_number: dto.phone_number,
            is_active: dto.is_active,
        }
    }
}

impl From<Member> for MemberDto {
    fn from(member: Member) -> Self {
        MemberDto {
            id: member.id,
            name: member.name,
            email: member.email,
            phone_number: member.phone_number,
            date_joined: member.date_joined.into(),
            is_active: member.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn member_dto_uses_camel_case_and_rfc3339() {
        let member = Member::create(
            3,
            NewMember {
                name: "Ann".into(),
                email: "ann@x.com".into(),
                phone_number: "555".into(),
            },
            UNIX_EPOCH + Duration::from_secs(86_400),
        );
        let json = serde_json::to_value(MemberDto::from(member)).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["phoneNumber"], "555");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["dateJoined"], "1970-01-02T00:00:00Z");
        assert!(json.get("updatedOn").is_none());
    }

    #[test]
    fn update_dto_defaults_to_active() {
        let dto: UpdateMemberDto =
            serde_json::from_str(r#"{"id":1,"name":"Ann","email":"a@x.com","phoneNumber":"5"}"#)
                .unwrap();
        assert!(dto.is_active);
        assert_eq!(dto.phone_number, "5");
    }

    #[test]
    fn create_dto_tolerates_missing_fields() {
        let dto: CreateMemberDto = serde_json::from_str(r#"{"name":"Ann"}"#).unwrap();
        assert_eq!(dto.email, "");
        assert_eq!(dto.phone_number, "");
    }
}

//! Group goals: several members paying into one shared target.

use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupTudo {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
}

/// Member of a group goal, joined with the fields needed to notify them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupMember {
    pub member_id: Uuid,
    pub first_name: String,
    pub account_type: String,
}

use crate::model::common::Role;

/// A kind of signed-in user, having defined rights.
pub trait User {
    /// The role a token must carry to act as this user type.
    const ROLE: Role;
}

/// A signed-in voter. Being signed in says nothing about eligibility to vote.
#[derive(Debug)]
pub struct Voter;

/// The signed-in administrator.
#[derive(Debug)]
pub struct Admin;

impl User for Voter {
    const ROLE: Role = Role::Voter;
}

impl User for Admin {
    const ROLE: Role = Role::Administrator;
}

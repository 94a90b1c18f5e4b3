use finbook_core::UserId;

/// Authenticated owner for a request.
///
/// Inserted by the auth middleware; every domain handler reads the owner from
/// here and passes it down, so no query can run without an owner scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OwnerContext {
    owner: UserId,
}

impl OwnerContext {
    pub fn new(owner: UserId) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }
}

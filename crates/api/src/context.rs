use stockwatch_core::{OwnerId, UserId};

/// Owner scope for a request.
///
/// This is immutable and must be present for all inventory routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OwnerContext {
    owner_id: OwnerId,
}

impl OwnerContext {
    pub fn new(owner_id: OwnerId) -> Self {
        Self { owner_id }
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

/// Who performed the request, for audit fields only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ActorContext {
    actor: Option<UserId>,
}

impl ActorContext {
    pub fn new(actor: Option<UserId>) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }
}

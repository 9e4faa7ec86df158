// capability.rs — The unforgeable handle required to invoke an operation.
//
// Only the kernel can mint a Capability. It is not Clone, not Copy, and has
// no public constructor or Deserialize impl, so code outside this crate can
// only ever borrow the one the kernel passes into `Operation::invoke`.
// Holding an operation therefore never lets a caller run it directly.

use std::fmt;

use uuid::Uuid;

/// Proof that a call was authorized by the gate kernel.
///
/// ```compile_fail
/// // Outside the kernel there is no way to make one.
/// let cap = tg_gate::Capability::mint();
/// ```
pub struct Capability {
    id: Uuid,
}

impl Capability {
    pub(crate) fn mint() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// True if `id` is this capability's private identity.
    pub(crate) fn same_as(&self, id: &Uuid) -> bool {
        self.id == *id
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }
}

// Never print the identity.
impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Capability(..)")
    }
}

mod manifest;

pub use manifest::{ContractManifest, MethodSignature, ParamType};

// Permission flags attached to every method descriptor and to every
// contract-call scope (u8 bitmask)
//
// Dispatch verifies that the method's required flags are covered by the
// caller's scope AND permitted by the current trigger: a read-only trigger
// such as Verification never grants WRITE_STATES.
#[allow(non_snake_case)]
pub mod CallFlags {
    /// No access to chain state
    pub const NONE: u8 = 0;

    /// Read persisted state through the storage accessor
    pub const READ_STATES: u8 = 1 << 0;

    /// Mutate persisted state through the storage accessor
    pub const WRITE_STATES: u8 = 1 << 1;

    /// Issue further contract calls from inside a handler
    pub const ALLOW_CALL: u8 = 1 << 2;

    /// Read and write state
    pub const STATES: u8 = READ_STATES | WRITE_STATES;

    /// Full scope, the default for a transaction entry script
    pub const ALL: u8 = STATES | ALLOW_CALL;

    /// True when `flags` covers every flag in `required`
    pub const fn contains(flags: u8, required: u8) -> bool {
        flags & required == required
    }
}

#[cfg(test)]
mod tests {
    use super::CallFlags;

    #[test]
    fn test_flag_containment() {
        assert!(CallFlags::contains(CallFlags::ALL, CallFlags::WRITE_STATES));
        assert!(CallFlags::contains(CallFlags::STATES, CallFlags::READ_STATES));
        assert!(!CallFlags::contains(
            CallFlags::READ_STATES,
            CallFlags::WRITE_STATES
        ));
        assert!(CallFlags::contains(CallFlags::NONE, CallFlags::NONE));
    }
}

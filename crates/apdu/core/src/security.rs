//! Security levels for commands travelling over a secure channel

/// Security level for a secure channel
///
/// Describes the protection a command needs from the channel carrying it,
/// or the protection a channel currently provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityLevel {
    /// Whether encryption is enabled
    pub encryption: bool,
    /// Whether integrity (MAC) is enabled
    pub integrity: bool,
    /// Whether the user has authenticated (PIN)
    pub authentication: bool,
}

impl SecurityLevel {
    /// Create a new security level
    pub const fn new(encryption: bool, integrity: bool, authentication: bool) -> Self {
        Self {
            encryption,
            integrity,
            authentication,
        }
    }

    /// Create a security level with no protection
    pub const fn none() -> Self {
        Self::new(false, false, false)
    }

    /// Create a security level with MAC protection (integrity) and encryption
    pub const fn enc_mac() -> Self {
        Self::new(true, true, false)
    }

    /// Create a security level with full protection (encryption, integrity, and authentication)
    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    /// Check if this security level satisfies the required level
    ///
    /// A security level satisfies another if it has at least the same
    /// protection mechanisms enabled.
    pub const fn satisfies(&self, required: &Self) -> bool {
        (self.encryption || !required.encryption)
            && (self.integrity || !required.integrity)
            && (self.authentication || !required.authentication)
    }

    /// Check if this security level has any protection
    pub const fn is_none(&self) -> bool {
        !self.encryption && !self.integrity && !self.authentication
    }

    /// Whether commands at this level travel through the protected transport
    pub const fn needs_channel(&self) -> bool {
        self.encryption || self.integrity
    }
}

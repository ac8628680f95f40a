/// Default Keycard applet instance AID
pub const KEYCARD_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01\x01";

/// Class byte for all proprietary Keycard commands
pub const CLA_GP: u8 = 0x80;

/// Class byte for ISO commands (SELECT)
pub const CLA_ISO7816: u8 = 0x00;

/// Number of pairing slots the applet provides
pub const PAIRING_MAX_CLIENT_COUNT: u8 = 5;

/// Largest plaintext that still fits a protected command once padded and MACed
pub const PAYLOAD_MAX_SIZE: usize = 223;

/// Length of secrets, challenges, cryptograms and AES-256 keys
pub const SECRET_LENGTH: usize = 32;

/// AES block size, also the length of the MAC and the chaining value
pub const BLOCK_SIZE: usize = 16;

/// Maximum number of components in a key path
pub const MAX_PATH_COMPONENTS: usize = 10;

/// Instruction bytes
pub mod ins {
    /// SELECT (ISO)
    pub const SELECT: u8 = 0xA4;
    /// INIT
    pub const INIT: u8 = 0xFE;
    /// GET STATUS
    pub const GET_STATUS: u8 = 0xF2;
    /// SET NDEF
    pub const SET_NDEF: u8 = 0xF3;
    /// VERIFY PIN
    pub const VERIFY_PIN: u8 = 0x20;
    /// CHANGE PIN
    pub const CHANGE_PIN: u8 = 0x21;
    /// UNBLOCK PIN
    pub const UNBLOCK_PIN: u8 = 0x22;
    /// OPEN SECURE CHANNEL
    pub const OPEN_SECURE_CHANNEL: u8 = 0x10;
    /// MUTUALLY AUTHENTICATE
    pub const MUTUALLY_AUTHENTICATE: u8 = 0x11;
    /// PAIR
    pub const PAIR: u8 = 0x12;
    /// UNPAIR
    pub const UNPAIR: u8 = 0x13;
    /// LOAD KEY
    pub const LOAD_KEY: u8 = 0xD0;
    /// DERIVE KEY
    pub const DERIVE_KEY: u8 = 0xD1;
    /// GENERATE MNEMONIC
    pub const GENERATE_MNEMONIC: u8 = 0xD2;
    /// REMOVE KEY
    pub const REMOVE_KEY: u8 = 0xD3;
    /// GENERATE KEY
    pub const GENERATE_KEY: u8 = 0xD4;
    /// DUPLICATE KEY
    pub const DUPLICATE_KEY: u8 = 0xD5;
    /// SIGN
    pub const SIGN: u8 = 0xC0;
    /// SET PINLESS PATH
    pub const SET_PINLESS_PATH: u8 = 0xC1;
    /// EXPORT KEY
    pub const EXPORT_KEY: u8 = 0xC2;
}

/// TLV tags used in card responses
pub mod tags {
    /// Signature template containing:
    /// - ECC_PUBLIC_KEY
    /// - ECDSA_SIGNATURE
    pub const TEMPLATE_SIGNATURE: u8 = 0xA0;
    /// Keypair template containing:
    /// - ECC_PUBLIC_KEY (optional)
    /// - ECC_PRIVATE_KEY (optional)
    /// - CHAIN_CODE (optional)
    pub const TEMPLATE_KEYPAIR: u8 = 0xA1;
    /// Application status template containing:
    /// - OTHER (PIN and PUK retry count)
    /// - KEY_INITIALIZED
    pub const TEMPLATE_APPLICATION_STATUS: u8 = 0xA3;
    /// Application info template containing:
    /// - INSTANCE_UID
    /// - ECC_PUBLIC_KEY
    /// - OTHER (application version and number of remaining pairing slots)
    /// - KEY_UID
    /// - CAPABILITIES
    pub const TEMPLATE_APPLICATION_INFO: u8 = 0xA4;

    /// Instance UID (16 bytes)
    pub const INSTANCE_UID: u8 = 0x8F;
    /// ECC public key (uncompressed, 65 bytes, or empty)
    pub const ECC_PUBLIC_KEY: u8 = 0x80;
    /// ECC private key (32 bytes)
    pub const ECC_PRIVATE_KEY: u8 = 0x81;
    /// Chain code (32 bytes)
    pub const CHAIN_CODE: u8 = 0x82;
    /// Integer values: version, pairing slots, retry counters, signature r/s
    pub const OTHER: u8 = 0x02;
    /// Key UID (32 bytes or empty)
    pub const KEY_UID: u8 = 0x8E;
    /// Capabilities (1 byte)
    pub const CAPABILITIES: u8 = 0x8D;
    /// ECDSA signature (contains OTHER for the r and s values)
    pub const ECDSA_SIGNATURE: u8 = 0x30;
    /// Key initialized (0xFF if a key is loaded)
    pub const KEY_INITIALIZED: u8 = 0x01;
}

//! In-memory Keycard applet used by the unit tests

use bytes::{BufMut, Bytes, BytesMut};
use k256::{
    PublicKey, SecretKey,
    ecdsa::SigningKey,
    elliptic_curve::sec1::ToEncodedPoint,
};
use keycard_apdu_core::{CardTransport, Command, Response, StatusWord, TransportError};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    config::ChainBinding,
    constants::{CLA_GP, CLA_ISO7816, ins, tags},
    crypto::{CryptoProvider, DefaultCrypto, Key, SharedSecret},
    pairing::PairingSecret,
    secure_channel::{ChainingValue, SessionKeys},
    types::{constructed, primitive},
};

pub(crate) const TEST_PIN: &str = "123456";
pub(crate) const TEST_PUK: &str = "123456789012";

const PIN_MAX_RETRIES: u8 = 3;
const PUK_MAX_RETRIES: u8 = 5;

const OK: StatusWord = StatusWord::new(0x90, 0x00);
const SECURITY_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);
const BLOCKED: StatusWord = StatusWord::new(0x69, 0x83);
const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x85);
const WRONG_DATA: StatusWord = StatusWord::new(0x6A, 0x80);
const NO_SLOTS: StatusWord = StatusWord::new(0x6A, 0x84);
const WRONG_P1P2: StatusWord = StatusWord::new(0x6A, 0x86);
const INVALID_INS: StatusWord = StatusWord::new(0x6D, 0x00);

/// Deterministic host crypto
pub(crate) fn seeded_crypto(seed: u64) -> DefaultCrypto<StdRng> {
    DefaultCrypto::with_rng(StdRng::seed_from_u64(seed))
}

/// Install a test subscriber once, honoring `RUST_LOG`
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
struct CardChannel {
    keys: SessionKeys,
    chaining: ChainingValue,
    pin_verified: bool,
}

#[derive(Debug, Default)]
struct Duplication {
    expected: u8,
    entropy: Vec<u8>,
    received: u8,
}

/// Card side of the protocol, answering over [`CardTransport`]
#[derive(Debug)]
pub(crate) struct SimulatedCard {
    crypto: DefaultCrypto<StdRng>,
    card_key: SecretKey,
    binding: ChainBinding,
    instance_uid: [u8; 16],
    secret: Option<PairingSecret>,
    pin: String,
    puk: String,
    pin_retries: u8,
    puk_retries: u8,
    slots: Vec<Option<Key>>,
    pair_challenge: Option<Key>,
    channel: Option<CardChannel>,
    master_key: Option<SecretKey>,
    duplication: Option<Duplication>,
    corrupt_next: bool,
    transmitted: usize,
}

impl SimulatedCard {
    /// A card that has not received INIT
    pub(crate) fn blank() -> Self {
        let mut crypto = DefaultCrypto::with_rng(StdRng::seed_from_u64(0xCA4D));
        let card_key = crypto.generate_secret_key();
        let mut instance_uid = [0u8; 16];
        crypto.fill_random(&mut instance_uid);
        Self {
            crypto,
            card_key,
            binding: ChainBinding::Bound,
            instance_uid,
            secret: None,
            pin: String::new(),
            puk: String::new(),
            pin_retries: PIN_MAX_RETRIES,
            puk_retries: PUK_MAX_RETRIES,
            slots: vec![None; 5],
            pair_challenge: None,
            channel: None,
            master_key: None,
            duplication: None,
            corrupt_next: false,
            transmitted: 0,
        }
    }

    /// A card initialized with the test PIN and PUK
    pub(crate) fn initialized(secret: PairingSecret) -> Self {
        let mut card = Self::blank();
        card.secret = Some(secret);
        card.pin = TEST_PIN.to_string();
        card.puk = TEST_PUK.to_string();
        card
    }

    /// Change the instance UID, making this a different card
    pub(crate) fn with_instance_uid(mut self, uid: [u8; 16]) -> Self {
        self.instance_uid = uid;
        self
    }

    pub(crate) fn with_pin(mut self, pin: &str) -> Self {
        self.pin = pin.to_string();
        self
    }

    pub(crate) fn with_pairing_slots(mut self, count: usize) -> Self {
        self.slots = vec![None; count];
        self
    }

    pub(crate) fn with_chain_binding(mut self, binding: ChainBinding) -> Self {
        self.binding = binding;
        self
    }

    pub(crate) fn with_master_key(mut self, key: SecretKey) -> Self {
        self.master_key = Some(key);
        self
    }

    pub(crate) fn pairing_key(&self, index: usize) -> Option<Key> {
        self.slots.get(index).copied().flatten()
    }

    pub(crate) fn master_key(&self) -> Option<&SecretKey> {
        self.master_key.as_ref()
    }

    pub(crate) fn pin(&self) -> &str {
        &self.pin
    }

    /// Number of APDUs received so far
    pub(crate) const fn transmitted(&self) -> usize {
        self.transmitted
    }

    /// Flip a MAC bit in the next protected response
    pub(crate) fn corrupt_next_response(&mut self) {
        self.corrupt_next = true;
    }

    /// Forget the secure channel, as after a card side reset
    pub(crate) fn drop_channel(&mut self) {
        self.channel = None;
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.card_key
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    fn key_uid(&self) -> Vec<u8> {
        self.master_key
            .as_ref()
            .map(|key| {
                let point = key.public_key().to_encoded_point(false);
                self.crypto.sha256(&[point.as_bytes()]).to_vec()
            })
            .unwrap_or_default()
    }

    fn select(&mut self) -> Response {
        self.channel = None;
        self.pair_challenge = None;

        let public_key = primitive(tags::ECC_PUBLIC_KEY, &self.public_key_bytes()).unwrap();
        if self.secret.is_none() {
            return Response::success(public_key.to_vec().into());
        }

        let free = self.slots.iter().filter(|slot| slot.is_none()).count() as u8;
        let info = constructed(
            tags::TEMPLATE_APPLICATION_INFO,
            vec![
                primitive(tags::INSTANCE_UID, &self.instance_uid).unwrap(),
                public_key,
                primitive(tags::OTHER, &[3, 1]).unwrap(),
                primitive(tags::OTHER, &[free]).unwrap(),
                primitive(tags::KEY_UID, &self.key_uid()).unwrap(),
                primitive(tags::CAPABILITIES, &[0x0F]).unwrap(),
            ],
        )
        .unwrap();
        Response::success(info.to_vec().into())
    }

    /// Decrypt a one-shot encrypted payload
    fn open_one_shot(&self, data: &[u8]) -> Option<Vec<u8>> {
        let (&len, rest) = data.split_first()?;
        let len = usize::from(len);
        if rest.len() < len + 16 {
            return None;
        }
        let host_key = PublicKey::from_sec1_bytes(&rest[..len]).ok()?;
        let iv: [u8; 16] = rest[len..len + 16].try_into().ok()?;
        let secret = self.crypto.ecdh(&self.card_key, &host_key);
        self.crypto
            .aes_cbc_decrypt(secret.as_bytes(), &iv, &rest[len + 16..])
            .ok()
    }

    fn init(&mut self, command: &Command) -> Response {
        if self.secret.is_some() {
            return Response::error(INVALID_INS);
        }
        let Some(plain) = self.open_one_shot(&command.data) else {
            return Response::error(WRONG_DATA);
        };
        if plain.len() != 6 + 12 + 32 {
            return Response::error(WRONG_DATA);
        }
        self.pin = String::from_utf8_lossy(&plain[..6]).into_owned();
        self.puk = String::from_utf8_lossy(&plain[6..18]).into_owned();
        self.secret = Some(PairingSecret::from_bytes(plain[18..].try_into().unwrap()));
        Response::success(Bytes::new())
    }

    fn pair(&mut self, command: &Command) -> Response {
        let Some(secret) = self.secret.clone() else {
            return Response::error(CONDITIONS_NOT_SATISFIED);
        };
        let Ok(challenge) = <[u8; 32]>::try_from(command.data.as_ref()) else {
            return Response::error(WRONG_DATA);
        };

        match command.p1 {
            0x00 => {
                if self.slots.iter().all(Option::is_some) {
                    return Response::error(NO_SLOTS);
                }
                let cryptogram = self.crypto.sha256(&[secret.as_bytes(), &challenge]);
                let card_challenge = self.crypto.random_secret();
                self.pair_challenge = Some(card_challenge);

                let mut out = BytesMut::with_capacity(64);
                out.put_slice(&cryptogram);
                out.put_slice(&card_challenge);
                Response::success(out.freeze())
            }
            0x01 => {
                let Some(card_challenge) = self.pair_challenge.take() else {
                    return Response::error(CONDITIONS_NOT_SATISFIED);
                };
                let expected = self.crypto.sha256(&[secret.as_bytes(), &card_challenge]);
                if expected != challenge {
                    return Response::error(SECURITY_NOT_SATISFIED);
                }
                let Some(index) = self.slots.iter().position(Option::is_none) else {
                    return Response::error(NO_SLOTS);
                };
                let salt = self.crypto.random_secret();
                self.slots[index] = Some(self.crypto.sha256(&[secret.as_bytes(), &salt]));

                let mut out = BytesMut::with_capacity(33);
                out.put_u8(index as u8);
                out.put_slice(&salt);
                Response::success(out.freeze())
            }
            _ => Response::error(WRONG_P1P2),
        }
    }

    fn open_secure_channel(&mut self, command: &Command) -> Response {
        self.channel = None;
        let Some(pairing_key) = self.pairing_key(usize::from(command.p1)) else {
            return Response::error(WRONG_P1P2);
        };
        let Ok(host_key) = PublicKey::from_sec1_bytes(&command.data) else {
            return Response::error(WRONG_DATA);
        };

        let secret: SharedSecret = self.crypto.ecdh(&self.card_key, &host_key);
        let salt = self.crypto.random_secret();
        let iv = self.crypto.random_block();
        let keys = SessionKeys::derive(&self.crypto, &secret, &pairing_key, &salt, self.binding);
        self.channel = Some(CardChannel {
            keys,
            chaining: ChainingValue::new(iv),
            pin_verified: false,
        });

        let mut out = BytesMut::with_capacity(48);
        out.put_slice(&salt);
        out.put_slice(&iv);
        Response::success(out.freeze())
    }

    fn protected(&mut self, command: &Command) -> Response {
        let Some(channel) = self.channel.as_mut() else {
            return Response::error(SECURITY_NOT_SATISFIED);
        };
        let opened = channel
            .keys
            .open_command(&self.crypto, &channel.chaining, command);
        let Ok((plain, chaining)) = opened else {
            self.channel = None;
            return Response::error(SECURITY_NOT_SATISFIED);
        };
        channel.chaining = chaining;

        let inner = self.dispatch(command, &plain);

        let Some(channel) = self.channel.as_mut() else {
            return inner;
        };
        let (sealed, chaining) =
            channel
                .keys
                .seal_response(&self.crypto, &channel.chaining, &inner.to_bytes());
        channel.chaining = chaining;

        if std::mem::take(&mut self.corrupt_next) {
            let mut payload = sealed.payload().to_vec();
            payload[0] ^= 0x01;
            return Response::success(payload.into());
        }
        sealed
    }

    fn pin_verified(&self) -> bool {
        self.channel.as_ref().is_some_and(|channel| channel.pin_verified)
    }

    fn set_pin_verified(&mut self, verified: bool) {
        if let Some(channel) = self.channel.as_mut() {
            channel.pin_verified = verified;
        }
    }

    fn dispatch(&mut self, command: &Command, data: &[u8]) -> Response {
        match command.ins {
            ins::MUTUALLY_AUTHENTICATE => {
                Response::success(self.crypto.random_secret().to_vec().into())
            }
            ins::VERIFY_PIN => self.verify_pin(data),
            ins::UNBLOCK_PIN => self.unblock_pin(data),
            ins::GET_STATUS => self.get_status(command.p1),
            _ if !self.pin_verified() => Response::error(SECURITY_NOT_SATISFIED),
            ins::CHANGE_PIN if command.p1 == 0x00 => {
                self.pin = String::from_utf8_lossy(data).into_owned();
                Response::success(Bytes::new())
            }
            ins::UNPAIR => match self.slots.get_mut(usize::from(command.p1)) {
                Some(slot) => {
                    *slot = None;
                    Response::success(Bytes::new())
                }
                None => Response::error(WRONG_P1P2),
            },
            ins::GENERATE_KEY => {
                let key = self.crypto.generate_secret_key();
                self.master_key = Some(key);
                Response::success(self.key_uid().into())
            }
            ins::REMOVE_KEY => {
                self.master_key = None;
                Response::success(Bytes::new())
            }
            ins::SIGN if command.p1 == 0x00 => self.sign(data),
            ins::EXPORT_KEY if command.p1 == 0x00 && command.p2 == 0x01 => self.export_public(),
            ins::DUPLICATE_KEY => self.duplicate(command.p1, command.p2, data),
            _ => Response::error(INVALID_INS),
        }
    }

    fn verify_pin(&mut self, pin: &[u8]) -> Response {
        if self.pin_retries == 0 {
            return Response::error(BLOCKED);
        }
        if pin == self.pin.as_bytes() {
            self.pin_retries = PIN_MAX_RETRIES;
            self.set_pin_verified(true);
            return Response::success(Bytes::new());
        }
        self.pin_retries -= 1;
        self.set_pin_verified(false);
        Response::error(StatusWord::new(0x63, 0xC0 | self.pin_retries))
    }

    fn unblock_pin(&mut self, data: &[u8]) -> Response {
        if self.puk_retries == 0 {
            return Response::error(BLOCKED);
        }
        if data.len() != 18 {
            return Response::error(WRONG_DATA);
        }
        if &data[..12] != self.puk.as_bytes() {
            self.puk_retries -= 1;
            return Response::error(StatusWord::new(0x63, 0xC0 | self.puk_retries));
        }
        self.puk_retries = PUK_MAX_RETRIES;
        self.pin = String::from_utf8_lossy(&data[12..]).into_owned();
        self.pin_retries = PIN_MAX_RETRIES;
        self.set_pin_verified(true);
        Response::success(Bytes::new())
    }

    fn get_status(&self, p1: u8) -> Response {
        match p1 {
            0x00 => {
                let status = constructed(
                    tags::TEMPLATE_APPLICATION_STATUS,
                    vec![
                        primitive(tags::OTHER, &[self.pin_retries]).unwrap(),
                        primitive(tags::OTHER, &[self.puk_retries]).unwrap(),
                        primitive(
                            tags::KEY_INITIALIZED,
                            &[if self.master_key.is_some() { 0xFF } else { 0x00 }],
                        )
                        .unwrap(),
                    ],
                )
                .unwrap();
                Response::success(status.to_vec().into())
            }
            0x01 => Response::success(Bytes::new()),
            _ => Response::error(WRONG_P1P2),
        }
    }

    fn sign(&self, hash: &[u8]) -> Response {
        let Some(key) = &self.master_key else {
            return Response::error(CONDITIONS_NOT_SATISFIED);
        };
        let (signature, _) = SigningKey::from(key).sign_prehash_recoverable(hash).unwrap();
        let (r, s) = signature.split_bytes();
        let template = constructed(
            tags::TEMPLATE_SIGNATURE,
            vec![
                primitive(
                    tags::ECC_PUBLIC_KEY,
                    key.public_key().to_encoded_point(false).as_bytes(),
                )
                .unwrap(),
                constructed(
                    tags::ECDSA_SIGNATURE,
                    vec![
                        primitive(tags::OTHER, &r).unwrap(),
                        primitive(tags::OTHER, &s).unwrap(),
                    ],
                )
                .unwrap(),
            ],
        )
        .unwrap();
        Response::success(template.to_vec().into())
    }

    fn export_public(&self) -> Response {
        let Some(key) = &self.master_key else {
            return Response::error(CONDITIONS_NOT_SATISFIED);
        };
        let template = constructed(
            tags::TEMPLATE_KEYPAIR,
            vec![
                primitive(
                    tags::ECC_PUBLIC_KEY,
                    key.public_key().to_encoded_point(false).as_bytes(),
                )
                .unwrap(),
            ],
        )
        .unwrap();
        Response::success(template.to_vec().into())
    }

    fn add_entropy(&mut self, command: &Command) -> Response {
        let Some(entropy) = self.open_one_shot(&command.data) else {
            return Response::error(WRONG_DATA);
        };
        let Some(duplication) = self.duplication.as_mut() else {
            return Response::error(CONDITIONS_NOT_SATISFIED);
        };
        if duplication.received >= duplication.expected {
            return Response::error(CONDITIONS_NOT_SATISFIED);
        }
        duplication.entropy.extend_from_slice(&entropy);
        duplication.received += 1;
        Response::success(Bytes::new())
    }

    fn duplication_key(&self) -> Option<Key> {
        let duplication = self.duplication.as_ref()?;
        (duplication.received == duplication.expected)
            .then(|| self.crypto.sha256(&[&duplication.entropy]))
    }

    fn duplicate(&mut self, p1: u8, p2: u8, data: &[u8]) -> Response {
        match p1 {
            0x00 => {
                self.duplication = Some(Duplication {
                    expected: p2,
                    entropy: data.to_vec(),
                    received: 1,
                });
                Response::success(Bytes::new())
            }
            0x02 => {
                let (Some(key), Some(master)) = (self.duplication_key(), &self.master_key) else {
                    return Response::error(CONDITIONS_NOT_SATISFIED);
                };
                let blob = self.crypto.aes_cbc_encrypt(&key, &[0; 16], &master.to_bytes());
                Response::success(blob.into())
            }
            0x03 => {
                let Some(key) = self.duplication_key() else {
                    return Response::error(CONDITIONS_NOT_SATISFIED);
                };
                let Ok(raw) = self.crypto.aes_cbc_decrypt(&key, &[0; 16], data) else {
                    return Response::error(WRONG_DATA);
                };
                let Ok(master) = SecretKey::from_slice(&raw) else {
                    return Response::error(WRONG_DATA);
                };
                self.master_key = Some(master);
                Response::success(self.key_uid().into())
            }
            _ => Response::error(WRONG_P1P2),
        }
    }

    fn handle(&mut self, command: &Command) -> Response {
        match (command.cla, command.ins) {
            (CLA_ISO7816, ins::SELECT) => self.select(),
            (CLA_GP, ins::INIT) => self.init(command),
            (CLA_GP, ins::PAIR) => self.pair(command),
            (CLA_GP, ins::OPEN_SECURE_CHANNEL) => self.open_secure_channel(command),
            (CLA_GP, ins::DUPLICATE_KEY) if command.p1 == 0x01 => self.add_entropy(command),
            (CLA_GP, _) => self.protected(command),
            _ => Response::error(StatusWord::new(0x6E, 0x00)),
        }
    }
}

impl CardTransport for SimulatedCard {
    fn do_transmit_raw(&mut self, raw: &[u8]) -> Result<Bytes, TransportError> {
        self.transmitted += 1;
        let command = Command::from_bytes(raw).map_err(|_| TransportError::Transmission)?;
        Ok(self.handle(&command).to_bytes())
    }
}

/// What a [`FaultyLink`] does instead of forwarding a command
#[derive(Debug, Clone, Copy)]
pub(crate) enum Fault {
    /// Answer with these bytes without reaching the card
    Reply(&'static [u8]),
    /// Fail the transmission
    Fail,
}

/// Link in front of a [`SimulatedCard`] that intercepts one instruction
#[derive(Debug)]
pub(crate) struct FaultyLink {
    card: SimulatedCard,
    armed: Option<(u8, Fault)>,
}

impl FaultyLink {
    pub(crate) const fn new(card: SimulatedCard) -> Self {
        Self { card, armed: None }
    }

    /// Apply `fault` to the next command with instruction `ins`
    pub(crate) fn arm(&mut self, ins: u8, fault: Fault) {
        self.armed = Some((ins, fault));
    }

    pub(crate) const fn card(&self) -> &SimulatedCard {
        &self.card
    }
}

impl CardTransport for FaultyLink {
    fn do_transmit_raw(&mut self, raw: &[u8]) -> Result<Bytes, TransportError> {
        match self.armed.take_if(|armed| raw.get(1) == Some(&armed.0)) {
            Some((_, Fault::Reply(bytes))) => Ok(Bytes::from_static(bytes)),
            Some((_, Fault::Fail)) => Err(TransportError::Transmission),
            None => self.card.transmit_raw(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_card_answers_select() {
        let mut card = SimulatedCard::blank();
        let response = card
            .transmit_raw(&hex::decode("00A4040008A00000080400010100").unwrap())
            .unwrap();
        let response = Response::from_bytes(&response).unwrap();
        assert_eq!(response.status(), OK);
        assert_eq!(response.payload()[0], tags::ECC_PUBLIC_KEY);
    }

    #[test]
    fn test_faulty_link_fires_once() {
        let mut link = FaultyLink::new(SimulatedCard::blank());
        link.arm(ins::SELECT, Fault::Reply(&[0x6A, 0x82]));
        let select = hex::decode("00A4040008A00000080400010100").unwrap();

        assert_eq!(link.transmit_raw(&select).unwrap().as_ref(), &[0x6A, 0x82]);
        assert_eq!(link.card().transmitted(), 0);
        let response = Response::from_bytes(&link.transmit_raw(&select).unwrap()).unwrap();
        assert_eq!(response.status(), OK);
        assert_eq!(link.card().transmitted(), 1);
    }
}

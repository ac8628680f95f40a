//! Card-to-card key duplication
//!
//! Every participating client holds a [`CardDuplicator`]. One client starts
//! duplication on each card with its own secret as the first entropy
//! contribution, every other client adds its secret to each card, and the
//! master key is then exported from the source card and imported into the
//! targets. A duplicator remembers which cards it already handled in each
//! phase and refuses to repeat a phase on the same card.

use std::{collections::HashSet, fmt};

use bytes::Bytes;
use keycard_apdu_core::CardTransport;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    Error, Result,
    crypto::{CryptoProvider, Key},
    session::KeycardSession,
    types::{ApplicationInfo, InstanceUid, PairingInfo},
};

/// Credentials a [`CardDuplicator`] needs for each card it authenticates to
pub trait DuplicatorCallback {
    /// Stored pairing for the card, or `None` if this client is not paired
    fn pairing(&mut self, info: &ApplicationInfo) -> Option<PairingInfo>;

    /// PIN to try next, given the attempts the card has left
    fn pin(&mut self, info: &ApplicationInfo, remaining_attempts: u8) -> String;
}

/// One client's side of a duplication session
pub struct CardDuplicator<Cb> {
    secret: Zeroizing<Key>,
    callback: Cb,
    started: HashSet<InstanceUid>,
    entropy_added: HashSet<InstanceUid>,
    finished: HashSet<InstanceUid>,
}

impl<Cb> fmt::Debug for CardDuplicator<Cb> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDuplicator")
            .field("started", &self.started.len())
            .field("entropy_added", &self.entropy_added.len())
            .field("finished", &self.finished.len())
            .finish_non_exhaustive()
    }
}

impl<Cb: DuplicatorCallback> CardDuplicator<Cb> {
    /// New duplicator with a fresh random entropy contribution
    pub fn new<C: CryptoProvider + ?Sized>(crypto: &mut C, callback: Cb) -> Self {
        Self {
            secret: Zeroizing::new(crypto.random_secret()),
            callback,
            started: HashSet::new(),
            entropy_added: HashSet::new(),
            finished: HashSet::new(),
        }
    }

    /// The callback supplying pairings and PINs
    pub const fn callback(&self) -> &Cb {
        &self.callback
    }

    /// Start duplication on a card, expecting `device_count` entropy contributions
    pub fn start_duplication<T, C>(
        &mut self,
        session: &mut KeycardSession<T, C>,
        device_count: u8,
    ) -> Result<()>
    where
        T: CardTransport,
        C: CryptoProvider,
    {
        let (info, uid) = select_and_check(session, &self.started)?;
        self.authenticate(session, &info)?;
        session.duplicate_key_start(device_count, &self.secret)?;
        self.started.insert(uid);
        debug!(device_count, "Duplication started");
        Ok(())
    }

    /// Add this client's entropy to a card
    ///
    /// Needs no pairing or PIN.
    pub fn add_entropy<T, C>(&mut self, session: &mut KeycardSession<T, C>) -> Result<()>
    where
        T: CardTransport,
        C: CryptoProvider,
    {
        let (_, uid) = select_and_check(session, &self.entropy_added)?;
        session.duplicate_key_add_entropy(&self.secret)?;
        self.entropy_added.insert(uid);
        debug!("Duplication entropy added");
        Ok(())
    }

    /// Export the master key of a card this duplicator started
    pub fn export_key<T, C>(&mut self, session: &mut KeycardSession<T, C>) -> Result<Bytes>
    where
        T: CardTransport,
        C: CryptoProvider,
    {
        let (info, uid) = self.select_started(session)?;
        self.authenticate(session, &info)?;
        let exported = session.duplicate_key_export()?;
        self.finished.insert(uid);
        debug!("Duplicated key exported");
        Ok(exported)
    }

    /// Import a key exported from another card, returning its key UID
    pub fn import_key<T, C>(
        &mut self,
        session: &mut KeycardSession<T, C>,
        exported: &[u8],
    ) -> Result<Bytes>
    where
        T: CardTransport,
        C: CryptoProvider,
    {
        let (info, uid) = self.select_started(session)?;
        self.authenticate(session, &info)?;
        let key_uid = session.duplicate_key_import(exported)?;
        self.finished.insert(uid);
        debug!("Duplicated key imported");
        Ok(key_uid)
    }

    fn select_started<T, C>(
        &self,
        session: &mut KeycardSession<T, C>,
    ) -> Result<(ApplicationInfo, InstanceUid)>
    where
        T: CardTransport,
        C: CryptoProvider,
    {
        let (info, uid) = select_and_check(session, &self.finished)?;
        if !self.started.contains(&uid) {
            return Err(Error::IllegalState("duplication not started on this card"));
        }
        Ok((info, uid))
    }

    /// Pair from the callback, open the channel and verify the PIN
    fn authenticate<T, C>(
        &mut self,
        session: &mut KeycardSession<T, C>,
        info: &ApplicationInfo,
    ) -> Result<()>
    where
        T: CardTransport,
        C: CryptoProvider,
    {
        let pairing = self
            .callback
            .pairing(info)
            .ok_or(Error::IllegalState("no pairing for card"))?;
        session.set_pairing(pairing);
        session.open_secure_channel()?;

        let mut remaining = session.get_status()?.pin_retry_count;
        while remaining > 0 {
            let mut pin = self.callback.pin(info, remaining);
            let result = session.verify_pin(&pin);
            pin.zeroize();
            match result {
                Ok(()) => return Ok(()),
                Err(Error::Authentication { remaining_attempts }) => {
                    warn!(remaining_attempts, "Duplication PIN rejected");
                    remaining = remaining_attempts;
                }
                Err(error) => return Err(error),
            }
        }
        Err(Error::Authentication {
            remaining_attempts: 0,
        })
    }
}

/// Select the applet and fail if the card is already in `processed`
fn select_and_check<T, C>(
    session: &mut KeycardSession<T, C>,
    processed: &HashSet<InstanceUid>,
) -> Result<(ApplicationInfo, InstanceUid)>
where
    T: CardTransport,
    C: CryptoProvider,
{
    let info = session.select()?;
    let uid = info
        .instance_uid
        .ok_or(Error::IllegalState("card is not initialized"))?;
    if processed.contains(&uid) {
        return Err(Error::IllegalState("card already processed"));
    }
    Ok((info, uid))
}

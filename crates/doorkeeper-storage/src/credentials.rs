//! Persistent password, allowed-card list and admin identity.
//!
//! Layout inside the namespace:
//!
//! | key            | value                         |
//! |----------------|-------------------------------|
//! | `pw`           | password                      |
//! | `n`            | number of allowed cards       |
//! | `uid0`..`uidN` | hex UID of each allowed card  |
//!
//! Cards keep insertion order. Removing one shifts every later entry down
//! one slot, deletes the last slot, then writes the new count.

use doorkeeper_core::constants::{KEY_CARD_COUNT, KEY_CARD_PREFIX, KEY_PASSWORD};
use doorkeeper_core::{ControllerConfig, Credential};

use crate::error::StorageResult;
use crate::kv::{AnyKvStore, KeyValueStore};

fn card_key(index: usize) -> String {
    format!("{KEY_CARD_PREFIX}{index}")
}

/// Credential store over a [`KeyValueStore`].
///
/// The store holds no cache: every query reads through, and every mutation
/// has been persisted when it returns.
///
/// # Examples
///
/// ```
/// use doorkeeper_core::Credential;
/// use doorkeeper_storage::{AnyKvStore, CredentialStore, MemoryKvStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let admin = Credential::new("AC649105")?;
/// let store = CredentialStore::new(AnyKvStore::Memory(MemoryKvStore::new()), admin, 60, "1234");
///
/// let card = Credential::new("aabbccdd")?;
/// assert!(store.add_card(&card).await?);
/// assert!(store.is_allowed(&card).await);
/// assert_eq!(store.load_password().await, "1234");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialStore {
    kv: AnyKvStore,
    admin: Credential,
    max_cards: usize,
    default_password: String,
}

impl CredentialStore {
    /// Create a store.
    pub fn new(
        kv: AnyKvStore,
        admin: Credential,
        max_cards: usize,
        default_password: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            admin,
            max_cards,
            default_password: default_password.into(),
        }
    }

    /// Create a store from controller configuration.
    ///
    /// # Errors
    /// Returns `StorageError::Configuration` if the admin UID is invalid.
    pub fn from_config(kv: AnyKvStore, config: &ControllerConfig) -> StorageResult<Self> {
        Ok(Self::new(
            kv,
            config.admin_credential()?,
            config.max_cards,
            config.default_password.clone(),
        ))
    }

    /// Capacity of the allowed set.
    pub fn max_cards(&self) -> usize {
        self.max_cards
    }

    /// Current password.
    ///
    /// On first run the default is written back. Never fails: any read
    /// error yields the default.
    pub async fn load_password(&self) -> String {
        match self.kv.get_string(KEY_PASSWORD).await {
            Ok(Some(password)) if !password.is_empty() => password,
            Ok(_) => {
                tracing::info!("No password stored, initializing default");
                if let Err(e) = self.kv.put_string(KEY_PASSWORD, &self.default_password).await {
                    tracing::warn!(error = %e, "Failed to persist default password");
                }
                self.default_password.clone()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Password read failed, using default");
                self.default_password.clone()
            }
        }
    }

    /// Replace the password. An empty password is ignored and reported as
    /// `false`.
    pub async fn change_password(&self, password: &str) -> StorageResult<bool> {
        if password.is_empty() {
            return Ok(false);
        }
        self.kv.put_string(KEY_PASSWORD, password).await?;
        tracing::info!("Password changed");
        Ok(true)
    }

    /// Whether `id` is the admin tag.
    ///
    /// Compares raw UID bytes, so the textual form of `id` does not matter.
    pub fn is_admin(&self, id: &Credential) -> bool {
        self.admin.matches_uid(&id.to_uid_bytes())
    }

    /// Whether `id` is in the allowed set. Fails closed on read errors.
    pub async fn is_allowed(&self, id: &Credential) -> bool {
        match self.position(id).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, uid = %id, "Card lookup failed, denying");
                false
            }
        }
    }

    /// Number of allowed cards.
    pub async fn card_count(&self) -> StorageResult<usize> {
        let count = self.kv.get_int(KEY_CARD_COUNT).await?.unwrap_or(0);
        Ok(usize::try_from(count).unwrap_or(0).min(self.max_cards))
    }

    /// Allowed cards in insertion order.
    ///
    /// Slots that are missing or unreadable are skipped with a warning.
    pub async fn cards(&self) -> StorageResult<Vec<Credential>> {
        let count = self.card_count().await?;
        let mut cards = Vec::with_capacity(count);

        for index in 0..count {
            match self.kv.get_string(&card_key(index)).await? {
                Some(raw) => match Credential::new(&raw) {
                    Ok(card) => cards.push(card),
                    Err(e) => tracing::warn!(index, error = %e, "Skipping corrupt card slot"),
                },
                None => tracing::warn!(index, "Card slot missing"),
            }
        }

        Ok(cards)
    }

    /// Append `id` to the allowed set.
    ///
    /// Returns `false` for the admin tag, a duplicate, or a full set.
    pub async fn add_card(&self, id: &Credential) -> StorageResult<bool> {
        if self.is_admin(id) {
            tracing::debug!("Refusing to store the admin tag");
            return Ok(false);
        }

        let count = self.card_count().await?;
        if count >= self.max_cards {
            tracing::warn!(count, max = self.max_cards, "Card store full");
            return Ok(false);
        }
        if self.position(id).await?.is_some() {
            return Ok(false);
        }

        self.kv.put_string(&card_key(count), id.as_str()).await?;
        self.kv.put_int(KEY_CARD_COUNT, count as i64 + 1).await?;

        tracing::info!(uid = %id, slot = count, "Card added");
        Ok(true)
    }

    /// Remove `id` from the allowed set, keeping the order of the rest.
    ///
    /// Returns `false` if `id` is the admin tag or not present.
    pub async fn remove_card(&self, id: &Credential) -> StorageResult<bool> {
        if self.is_admin(id) {
            return Ok(false);
        }

        let Some(index) = self.position(id).await? else {
            return Ok(false);
        };
        let count = self.card_count().await?;

        for slot in index..count - 1 {
            if let Some(next) = self.kv.get_string(&card_key(slot + 1)).await? {
                self.kv.put_string(&card_key(slot), &next).await?;
            }
        }
        self.kv.remove(&card_key(count - 1)).await?;
        self.kv.put_int(KEY_CARD_COUNT, count as i64 - 1).await?;

        tracing::info!(uid = %id, slot = index, "Card removed");
        Ok(true)
    }

    /// Slot index of `id`, if stored.
    async fn position(&self, id: &Credential) -> StorageResult<Option<usize>> {
        let count = self.card_count().await?;

        for index in 0..count {
            if let Some(raw) = self.kv.get_string(&card_key(index)).await?
                && raw.eq_ignore_ascii_case(id.as_str())
            {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use rstest::rstest;

    fn credential(hex: &str) -> Credential {
        Credential::new(hex).unwrap()
    }

    fn store_with(kv: MemoryKvStore, max_cards: usize) -> CredentialStore {
        CredentialStore::new(AnyKvStore::Memory(kv), credential("AC649105"), max_cards, "1234")
    }

    fn store() -> CredentialStore {
        store_with(MemoryKvStore::new(), 60)
    }

    #[tokio::test]
    async fn test_first_run_password_default_persisted() {
        let kv = MemoryKvStore::new();
        let store = store_with(kv.clone(), 60);

        assert_eq!(store.load_password().await, "1234");
        assert_eq!(kv.get_string("pw").await.unwrap().as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn test_password_read_error_falls_back() {
        let kv = MemoryKvStore::new();
        let store = store_with(kv.clone(), 60);
        store.change_password("5678").await.unwrap();

        kv.set_fail_reads(true);
        assert_eq!(store.load_password().await, "1234");
    }

    #[tokio::test]
    async fn test_change_password() {
        let store = store();

        assert!(store.change_password("42").await.unwrap());
        assert_eq!(store.load_password().await, "42");

        assert!(!store.change_password("").await.unwrap());
        assert_eq!(store.load_password().await, "42");
    }

    #[tokio::test]
    async fn test_add_card_duplicate() {
        let store = store();
        let card = credential("AABBCCDD");

        assert!(store.add_card(&card).await.unwrap());
        assert!(!store.add_card(&credential("aabbccdd")).await.unwrap());

        assert_eq!(store.cards().await.unwrap(), vec![card]);
    }

    #[tokio::test]
    async fn test_remove_card_twice() {
        let store = store();
        let card = credential("AABBCCDD");
        store.add_card(&card).await.unwrap();

        assert!(store.remove_card(&card).await.unwrap());
        assert!(!store.remove_card(&card).await.unwrap());
        assert!(!store.is_allowed(&card).await);
    }

    #[tokio::test]
    async fn test_remove_preserves_order_and_layout() {
        let kv = MemoryKvStore::new();
        let store = store_with(kv.clone(), 60);
        let cards: Vec<_> = ["01020304", "05060708", "090A0B0C", "0D0E0F10"]
            .into_iter()
            .map(credential)
            .collect();
        for card in &cards {
            store.add_card(card).await.unwrap();
        }

        assert!(store.remove_card(&cards[1]).await.unwrap());

        assert_eq!(
            store.cards().await.unwrap(),
            vec![cards[0].clone(), cards[2].clone(), cards[3].clone()]
        );
        assert_eq!(kv.get_int("n").await.unwrap(), Some(3));
        assert_eq!(kv.get_string("uid1").await.unwrap().as_deref(), Some("090A0B0C"));
        assert_eq!(kv.get_string("uid3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let store = store_with(MemoryKvStore::new(), 2);

        assert!(store.add_card(&credential("01010101")).await.unwrap());
        assert!(store.add_card(&credential("02020202")).await.unwrap());
        assert!(!store.add_card(&credential("03030303")).await.unwrap());
        assert_eq!(store.card_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_default_config_holds_sixty_cards() {
        let kv = MemoryKvStore::new();
        let store =
            CredentialStore::from_config(AnyKvStore::Memory(kv.clone()), &ControllerConfig::default())
                .unwrap();
        let cards: Vec<_> = (0..60u32)
            .map(|i| credential(&format!("{:08X}", 0x1000_0000 + i)))
            .collect();
        for card in &cards {
            assert!(store.add_card(card).await.unwrap());
        }

        let extra = credential("FEEDFACE");
        assert!(!store.add_card(&extra).await.unwrap());

        assert!(!store.is_allowed(&extra).await);
        assert_eq!(store.cards().await.unwrap(), cards);
        assert_eq!(kv.get_int("n").await.unwrap(), Some(60));
        assert_eq!(kv.get_string("uid60").await.unwrap(), None);
    }

    #[rstest]
    #[case("AC649105")]
    #[case("ac649105")]
    #[case(" Ac649105 ")]
    #[tokio::test]
    async fn test_admin_matches_any_case(#[case] hex: &str) {
        assert!(store().is_admin(&credential(hex)));
    }

    #[tokio::test]
    async fn test_admin_never_stored() {
        let store = store();
        let admin = credential("AC649105");

        assert!(!store.add_card(&admin).await.unwrap());
        assert!(!store.remove_card(&admin).await.unwrap());
        assert!(!store.is_allowed(&admin).await);
        assert_eq!(store.card_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_is_allowed_fails_closed() {
        let kv = MemoryKvStore::new();
        let store = store_with(kv.clone(), 60);
        let card = credential("AABBCCDD");
        store.add_card(&card).await.unwrap();

        kv.set_fail_reads(true);
        assert!(!store.is_allowed(&card).await);
    }

    #[tokio::test]
    async fn test_write_failure_reported() {
        let kv = MemoryKvStore::new();
        let store = store_with(kv.clone(), 60);

        kv.set_fail_writes(true);
        assert!(store.add_card(&credential("AABBCCDD")).await.is_err());
        assert!(store.change_password("9999").await.is_err());
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = ControllerConfig::default();
        let store = CredentialStore::from_config(AnyKvStore::Memory(MemoryKvStore::new()), &config)
            .unwrap();

        assert_eq!(store.max_cards(), 60);
        assert!(store.is_admin(&credential("AC649105")));
    }
}

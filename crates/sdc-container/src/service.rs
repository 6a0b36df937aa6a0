//! Container service: the create and read pipelines.
//!
//! ```text
//! create: keygen -> derive slot keys -> encrypt -> wrap data key -> sign -> store
//! read:   fetch -> access policy -> verify signature -> derive -> unwrap -> decrypt
//!         -> checksum -> record view (compare-and-swap)
//! ```
//!
//! The payload is encrypted under a random data key. That key is wrapped once
//! per accepted credential (always the private key, optionally a password),
//! each wrap under a PBKDF2 key with its own random salt. The wrapped keys
//! live in `metadata.security.key_slots`, inside the signature.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sdc_core::defaults::{self, MAX_COMPRESSION_LEVEL, MAX_PLAINTEXT_BYTES, MIN_KDF_ROUNDS};
use sdc_core::models::container_name;
use sdc_core::{
    AccessRestrictions, CompressionAlgorithm, ContainerEvent, ContainerStore, CreateOptions,
    Credentials, EncryptionAlgorithm, Error, EventBus, KeyDerivationAlgorithm, KeySlot,
    KeySlotKind, Metadata, MetadataFields, Result, SdcConfig, SdcFile, SecurityInfo,
};
use sdc_crypto::cipher::try_generate_random;
use sdc_crypto::{
    checksum, decrypt, derive_symmetric_key, encrypt, hash_key, hash_key_matches,
    validate_password, Keypair, PrivateKey, PublicKey, SymmetricKey,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::access::check_access;
use crate::codec;
use crate::locator::ShareLocator;
use crate::signing::{sign_container, verify_container};

/// Attempts at recording a view before giving up on contention.
const RECORD_VIEW_ATTEMPTS: usize = 3;

/// Result of [`ContainerService::create_container`].
#[derive(Debug)]
pub struct CreatedContainer {
    pub container: SdcFile,
    /// Surfaced exactly once. Only its hash is stored.
    pub private_key: PrivateKey,
    pub share_locator: Option<ShareLocator>,
}

/// Result of a successful [`ContainerService::read_container`].
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub plaintext: Vec<u8>,
    /// Metadata after this view was recorded.
    pub metadata: Metadata,
    pub views_remaining: Option<u32>,
}

/// Secret material a key slot is derived from.
enum SlotSecret {
    PrivateKey(PrivateKey),
    Password(String),
}

impl SlotSecret {
    fn as_bytes(&self) -> &[u8] {
        match self {
            SlotSecret::PrivateKey(key) => key.as_bytes(),
            SlotSecret::Password(password) => password.as_bytes(),
        }
    }
}

/// PBKDF2 on the blocking pool.
async fn derive_blocking(
    secret: SlotSecret,
    rounds: u32,
    salt: [u8; 32],
) -> Result<SymmetricKey> {
    tokio::task::spawn_blocking(move || derive_symmetric_key(secret.as_bytes(), rounds, &salt))
        .await
        .map_err(|e| Error::KeyDerivation(format!("Key derivation task failed: {}", e)))?
        .map_err(Error::from)
}

fn wrap_data_key(
    kind: KeySlotKind,
    salt: [u8; 32],
    wrap_key: &SymmetricKey,
    data_key: &SymmetricKey,
) -> Result<KeySlot> {
    Ok(KeySlot {
        kind,
        salt,
        wrapped_key: encrypt(data_key.as_bytes(), wrap_key)?,
    })
}

fn unwrap_data_key(slot: &KeySlot, wrap_key: &SymmetricKey) -> Result<SymmetricKey> {
    let bytes = decrypt(&slot.wrapped_key, wrap_key)?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Decryption("Unwrapped data key has wrong length".to_string()))?;
    Ok(SymmetricKey::from_bytes(key))
}

fn check_key_owner(container: &SdcFile, key: &PrivateKey) -> Result<()> {
    if !hash_key_matches(key.as_bytes(), &container.private_key_hash) {
        return Err(Error::Decryption(
            "Private key does not belong to this container".to_string(),
        ));
    }
    Ok(())
}

/// Run the read pipeline on a container without touching any store.
///
/// Checks access restrictions as of `now`, verifies the signature, unwraps
/// the data key with `credentials`, decrypts and verifies the checksum.
/// Returns the plaintext. Recording the view is up to the caller.
pub async fn open_container(
    container: &SdcFile,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    check_access(&container.metadata.access, now).into_result()?;

    if !verify_container(container) {
        return Err(Error::SignatureInvalid);
    }

    let security = &container.metadata.security;
    if (security.encrypted || container.metadata.access.requires_key)
        && matches!(credentials, Credentials::None)
    {
        return Err(Error::AuthenticationRequired(
            "Container requires a private key or password".to_string(),
        ));
    }

    let plaintext = if security.encrypted {
        let (slot, secret) = match credentials {
            Credentials::None => {
                return Err(Error::AuthenticationRequired(
                    "Container is encrypted; a private key or password is required".to_string(),
                ))
            }
            Credentials::PrivateKey(key) => {
                check_key_owner(container, key)?;
                let slot = security.key_slot(KeySlotKind::PrivateKey).ok_or_else(|| {
                    Error::Format("Container has no private key slot".to_string())
                })?;
                (slot, SlotSecret::PrivateKey(key.clone()))
            }
            Credentials::Password(password) => {
                let slot = security.key_slot(KeySlotKind::Password).ok_or_else(|| {
                    Error::AuthenticationRequired(
                        "Container is not password protected; use the private key".to_string(),
                    )
                })?;
                (slot, SlotSecret::Password(password.clone()))
            }
        };

        let wrap_key = derive_blocking(secret, security.key_derivation_rounds, slot.salt).await?;
        let data_key = unwrap_data_key(slot, &wrap_key)?;
        decrypt(&container.encrypted_data, &data_key)?
    } else {
        // Signed-only payload; `requires_key` still gates it on the owner key.
        if container.metadata.access.requires_key {
            match credentials {
                Credentials::PrivateKey(key) => check_key_owner(container, key)?,
                _ => {
                    return Err(Error::AuthenticationRequired(
                        "Container requires its private key".to_string(),
                    ))
                }
            }
        }
        container.encrypted_data.clone()
    };

    let actual = checksum(&plaintext);
    if actual != security.checksum {
        return Err(Error::ChecksumMismatch {
            expected: security.checksum.clone(),
            actual,
        });
    }

    Ok(plaintext)
}

/// Creates, reads, and moves containers through a [`ContainerStore`].
pub struct ContainerService<S> {
    store: Arc<S>,
    events: EventBus,
    config: SdcConfig,
}

impl<S> Clone for ContainerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: ContainerStore> ContainerService<S> {
    pub fn new(store: S, config: SdcConfig) -> Self {
        let events = EventBus::new(config.event_bus_capacity);
        Self::with_event_bus(store, config, events)
    }

    /// Use an existing event bus, e.g. one shared with other services.
    pub fn with_event_bus(store: S, config: SdcConfig, events: EventBus) -> Self {
        Self {
            store: Arc::new(store),
            events,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &SdcConfig {
        &self.config
    }

    /// Encrypt, sign and store a new container.
    #[instrument(
        skip_all,
        fields(subsystem = "sdc", op = "create", actor_id = %actor, filename = %filename)
    )]
    pub async fn create_container(
        &self,
        actor: &str,
        plaintext: &[u8],
        filename: &str,
        details: MetadataFields,
        options: CreateOptions,
    ) -> Result<CreatedContainer> {
        let start = Instant::now();
        let now = Utc::now();
        let rounds = options
            .key_derivation_rounds
            .unwrap_or(self.config.kdf_rounds);
        validate_create(plaintext, &details, &options, rounds, now)?;

        let keypair = Keypair::generate()?;

        let (encrypted_data, key_slots) = if options.encryption_enabled {
            let pk_salt: [u8; 32] = try_generate_random()?;
            let pk_wrap_key = derive_blocking(
                SlotSecret::PrivateKey(keypair.private.clone()),
                rounds,
                pk_salt,
            )
            .await?;

            let password_wrap = match (options.requires_password, options.password.clone()) {
                (true, Some(password)) => {
                    let salt: [u8; 32] = try_generate_random()?;
                    let key = derive_blocking(SlotSecret::Password(password), rounds, salt).await?;
                    Some((salt, key))
                }
                _ => None,
            };

            let data_key = SymmetricKey::generate()?;
            let encrypted = encrypt(plaintext, &data_key)?;

            let mut slots = vec![wrap_data_key(
                KeySlotKind::PrivateKey,
                pk_salt,
                &pk_wrap_key,
                &data_key,
            )?];
            if let Some((salt, key)) = password_wrap {
                slots.push(wrap_data_key(KeySlotKind::Password, salt, &key, &data_key)?);
            }
            (encrypted, slots)
        } else {
            (plaintext.to_vec(), Vec::new())
        };

        let (name, original_format) = container_name(filename);
        let title = if details.title.trim().is_empty() {
            filename
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(filename)
                .to_string()
        } else {
            details.title
        };

        let metadata = Metadata {
            title,
            description: details.description,
            author: details.author,
            format_version: defaults::FORMAT_VERSION.to_string(),
            tags: details.tags,
            custom_properties: details.custom_properties,
            security: SecurityInfo {
                encrypted: options.encryption_enabled,
                compression_algorithm: CompressionAlgorithm::None,
                compression_level: options.compression_level,
                encryption_algorithm: EncryptionAlgorithm::Aes256Gcm,
                key_derivation: KeyDerivationAlgorithm::Pbkdf2HmacSha256,
                key_derivation_rounds: rounds,
                checksum: checksum(plaintext),
                key_slots,
            },
            access: AccessRestrictions {
                requires_key: options.encryption_enabled,
                expires_at: options.expires_at,
                max_views: options.max_views,
                view_count: 0,
            },
        };

        let signature = sign_container(&encrypted_data, &metadata, &keypair.private)?;

        let container = SdcFile {
            id: Uuid::now_v7(),
            name,
            original_format,
            encrypted_data,
            public_key: keypair.public.clone(),
            private_key_hash: hash_key(keypair.private.as_bytes()),
            metadata,
            signature,
            created_at: now,
            last_modified: now,
        };

        self.store.insert(&container).await?;

        self.events.emit(
            actor,
            ContainerEvent::ContainerCreated {
                container_id: container.id,
                name: container.name.clone(),
                encrypted: container.is_encrypted(),
                data_size: container.data_size(),
            },
        );

        let share_locator = options
            .generate_share_locator
            .then(|| ShareLocator::new(container.id, &container.public_key));

        info!(
            container_id = %container.id,
            encrypted = container.is_encrypted(),
            data_size = container.data_size(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Container created"
        );

        Ok(CreatedContainer {
            container,
            private_key: keypair.private,
            share_locator,
        })
    }

    /// Decrypt a stored container and record the view.
    ///
    /// Only a fully successful read counts as a view.
    #[instrument(
        skip_all,
        fields(subsystem = "sdc", op = "read", actor_id = %actor, container_id = %id)
    )]
    pub async fn read_container(
        &self,
        actor: &str,
        id: Uuid,
        credentials: Credentials,
    ) -> Result<ReadOutcome> {
        let start = Instant::now();
        let container = self.store.fetch(id).await?;
        let now = Utc::now();

        let plaintext = match open_container(&container, &credentials, now).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                self.report_read_failure(actor, id, &e);
                warn!(
                    credentials = credentials.kind(),
                    error_kind = e.kind(),
                    error = %e,
                    "Container read refused"
                );
                return Err(e);
            }
        };

        let updated = self
            .record_view(actor, id, container.metadata.access.view_count, now)
            .await?;
        let views_remaining = updated.views_remaining();

        self.events.emit(
            actor,
            ContainerEvent::ContainerViewed {
                container_id: id,
                view_count: updated.metadata.access.view_count,
                views_remaining,
            },
        );

        info!(
            view_count = updated.metadata.access.view_count,
            views_remaining = ?views_remaining,
            duration_ms = start.elapsed().as_millis() as u64,
            "Container read"
        );

        Ok(ReadOutcome {
            plaintext,
            metadata: updated.metadata,
            views_remaining,
        })
    }

    /// Compare-and-swap the view count, re-checking the policy on contention.
    async fn record_view(
        &self,
        actor: &str,
        id: Uuid,
        mut expected_view_count: u32,
        now: DateTime<Utc>,
    ) -> Result<SdcFile> {
        for attempt in 1..=RECORD_VIEW_ATTEMPTS {
            match self.store.record_view(id, expected_view_count, now).await {
                Ok(updated) => return Ok(updated),
                Err(Error::Conflict(msg)) if attempt < RECORD_VIEW_ATTEMPTS => {
                    warn!(attempt, reason = %msg, "View count changed concurrently, retrying");
                    let latest = self.store.fetch(id).await?;
                    if let Err(e) = check_access(&latest.metadata.access, now).into_result() {
                        self.report_read_failure(actor, id, &e);
                        return Err(e);
                    }
                    expected_view_count = latest.metadata.access.view_count;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Conflict(format!(
            "Could not record view for {} after {} attempts",
            id, RECORD_VIEW_ATTEMPTS
        )))
    }

    fn report_read_failure(&self, actor: &str, id: Uuid, error: &Error) {
        let event = match error {
            Error::AccessDenied(reason) => ContainerEvent::AccessDenied {
                container_id: id,
                reason: reason.to_string(),
            },
            Error::SignatureInvalid | Error::ChecksumMismatch { .. } => {
                ContainerEvent::TamperDetected {
                    container_id: id,
                    reason: error.to_string(),
                }
            }
            _ => return,
        };
        self.events.emit(actor, event);
    }

    /// Serialize a stored container to its wire form.
    #[instrument(
        skip_all,
        fields(subsystem = "sdc", op = "export", actor_id = %actor, container_id = %id)
    )]
    pub async fn export_container(&self, actor: &str, id: Uuid) -> Result<Vec<u8>> {
        let container = self.store.fetch(id).await?;
        let bytes = codec::encode(&container)?;

        self.events.emit(
            actor,
            ContainerEvent::ContainerExported {
                container_id: id,
                size: bytes.len(),
            },
        );
        info!(size = bytes.len(), "Container exported");
        Ok(bytes)
    }

    /// Decode, verify and store an exported container.
    #[instrument(skip_all, fields(subsystem = "sdc", op = "import", actor_id = %actor))]
    pub async fn import_container(&self, actor: &str, bytes: &[u8]) -> Result<SdcFile> {
        let container = codec::decode(bytes)?;

        if !verify_container(&container) {
            let error = Error::SignatureInvalid;
            self.report_read_failure(actor, container.id, &error);
            warn!(container_id = %container.id, "Rejected import with invalid signature");
            return Err(error);
        }

        self.store.insert(&container).await?;

        self.events.emit(
            actor,
            ContainerEvent::ContainerImported {
                container_id: container.id,
                name: container.name.clone(),
            },
        );
        info!(container_id = %container.id, "Container imported");
        Ok(container)
    }

    #[instrument(
        skip_all,
        fields(subsystem = "sdc", op = "delete", actor_id = %actor, container_id = %id)
    )]
    pub async fn delete_container(&self, actor: &str, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        self.events
            .emit(actor, ContainerEvent::ContainerDeleted { container_id: id });
        info!("Container deleted");
        Ok(())
    }

    /// Locator for sharing a container.
    pub fn share_locator(&self, file_id: Uuid, public_key: &PublicKey) -> ShareLocator {
        ShareLocator::new(file_id, public_key)
    }

    /// Share link under the configured base URL.
    pub fn share_url(&self, locator: &ShareLocator) -> String {
        locator.url(self.config.share_base_url.as_deref())
    }
}

fn validate_create(
    plaintext: &[u8],
    details: &MetadataFields,
    options: &CreateOptions,
    rounds: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    if plaintext.len() > MAX_PLAINTEXT_BYTES {
        return Err(Error::InvalidInput(format!(
            "Plaintext exceeds {} bytes",
            MAX_PLAINTEXT_BYTES
        )));
    }
    if options.compression_level > MAX_COMPRESSION_LEVEL {
        return Err(Error::InvalidInput(format!(
            "Compression level must be between 0 and {}",
            MAX_COMPRESSION_LEVEL
        )));
    }
    if rounds < MIN_KDF_ROUNDS {
        return Err(Error::InvalidInput(format!(
            "Key derivation rounds must be at least {}",
            MIN_KDF_ROUNDS
        )));
    }
    if options.max_views == Some(0) {
        return Err(Error::InvalidInput(
            "max_views must be at least 1".to_string(),
        ));
    }
    if let Some(expires_at) = options.expires_at {
        if expires_at <= now {
            return Err(Error::InvalidInput(
                "expires_at must be in the future".to_string(),
            ));
        }
    }
    match (options.requires_password, options.password.as_deref()) {
        (true, None) => {
            return Err(Error::InvalidInput(
                "requires_password is set but no password was given".to_string(),
            ))
        }
        (true, Some(password)) => {
            if !options.encryption_enabled {
                return Err(Error::InvalidInput(
                    "Password protection requires encryption".to_string(),
                ));
            }
            validate_password(password)?;
        }
        (false, Some(_)) => {
            return Err(Error::InvalidInput(
                "A password was given but requires_password is not set".to_string(),
            ))
        }
        (false, None) => {}
    }
    for (key, value) in &details.custom_properties {
        value.validate().map_err(|e| match e {
            Error::InvalidInput(msg) => Error::InvalidInput(format!("{}: {}", key, msg)),
            other => other,
        })?;
    }
    Ok(())
}

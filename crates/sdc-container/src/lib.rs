//! # sdc-container
//!
//! Secure document containers: the wire codec, access policy, signing, and
//! the [`ContainerService`] that ties them to a [`sdc_core::ContainerStore`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use sdc_container::{ContainerService, MemoryStore};
//! use sdc_core::{CreateOptions, Credentials, MetadataFields, SdcConfig};
//!
//! # async fn demo() -> sdc_core::Result<()> {
//! let service = ContainerService::new(MemoryStore::new(), SdcConfig::default());
//!
//! let options = CreateOptions {
//!     max_views: Some(2),
//!     requires_password: true,
//!     password: Some("correct-horse".to_string()),
//!     ..Default::default()
//! };
//! let created = service
//!     .create_container("user-42", b"quarterly numbers", "report.pdf", MetadataFields::default(), options)
//!     .await?;
//!
//! let outcome = service
//!     .read_container(
//!         "user-42",
//!         created.container.id,
//!         Credentials::Password("correct-horse".to_string()),
//!     )
//!     .await?;
//! assert_eq!(outcome.views_remaining, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod codec;
pub mod locator;
pub mod service;
pub mod signing;
pub mod store;

pub use access::{check_access, AccessDecision, AccessState};
pub use codec::{decode, encode, looks_like_container};
pub use locator::ShareLocator;
pub use service::{open_container, ContainerService, CreatedContainer, ReadOutcome};
pub use signing::{canonical_metadata, sign_container, verify_container};
pub use store::{DirStore, MemoryStore};

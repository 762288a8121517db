//! Federation connector core
//!
//! Ties the three lower layers together into the surface the federation
//! framework calls:
//!
//! 1. `translate`: abstract match criteria → native search requests
//! 2. `materialize`: native search hits → federation instances, under a
//!    global page-size budget
//! 3. `relationships`: relationship identity → resolved relationship
//! 4. `collection`: the exposed find/get operations
//!
//! Every failure is a `FederationError` value carrying the operation name
//! and the identifying parameters; identity decode failures and registry
//! misses are converted here, at the query boundary, into the caller-facing
//! kinds and never surface as internal errors.

pub mod collection;
pub mod materialize;
pub mod relationships;
pub mod translate;

pub use collection::{MetadataCollection, Neighborhood};
pub use materialize::Materializer;
pub use relationships::RelationshipResolver;
pub use translate::{
    match_kind, translate_query, MatchKind, QualifiedNameFilter, TranslatedSearch,
};

use metabridge_catalog::CatalogError;
use metabridge_model::IdentityError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FederationError {
    #[error("`{operation}`: abstract type `{type_name}` is not mapped")]
    TypeNotMapped {
        operation: &'static str,
        type_name: String,
    },
    #[error("`{operation}`: abstract type `{type_name}` is known but not supported")]
    TypeNotSupported {
        operation: &'static str,
        type_name: String,
    },
    #[error("`{operation}`: entity `{guid}` is not known to home collection `{home_id}`")]
    EntityNotKnown {
        operation: &'static str,
        guid: String,
        home_id: String,
    },
    #[error("`{operation}`: relationship `{guid}` is not known to home collection `{home_id}`")]
    RelationshipNotKnown {
        operation: &'static str,
        guid: String,
        home_id: String,
    },
    #[error("`{operation}`: malformed identity `{guid}`")]
    MalformedIdentity {
        operation: &'static str,
        guid: String,
        #[source]
        source: IdentityError,
    },
    #[error("`{operation}`: {function} is not supported by this connector")]
    FunctionNotSupported {
        operation: &'static str,
        function: &'static str,
    },
    #[error("`{operation}`: backend communication failed")]
    Backend {
        operation: &'static str,
        #[source]
        source: CatalogError,
    },
    #[error("`{operation}` was cancelled before completion")]
    Cancelled { operation: &'static str },
}

impl FederationError {
    pub(crate) fn from_mapping(
        operation: &'static str,
        err: metabridge_mapping::MappingError,
    ) -> Self {
        match err {
            metabridge_mapping::MappingError::TypeNotMapped(type_name) => {
                Self::TypeNotMapped {
                    operation,
                    type_name,
                }
            }
            metabridge_mapping::MappingError::TypeNotSupported(type_name) => {
                Self::TypeNotSupported {
                    operation,
                    type_name,
                }
            }
        }
    }

    pub(crate) fn backend(operation: &'static str, source: CatalogError) -> Self {
        Self::Backend { operation, source }
    }
}

/// Cooperative cancellation handle, checked before every transport round
/// trip. A cancelled call surfaces `FederationError::Cancelled`; partial
/// results accumulated so far are never returned as if complete.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn guard(&self, operation: &'static str) -> Result<(), FederationError> {
        if self.is_cancelled() {
            Err(FederationError::Cancelled { operation })
        } else {
            Ok(())
        }
    }
}

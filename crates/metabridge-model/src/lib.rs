//! Federation-side metadata model
//!
//! This crate defines the types the federation framework speaks: typed
//! entity/relationship/classification instances, find-request criteria
//! (property matches, paging, sequencing), and the stable identity codec
//! that ties every instance back to the backend record it was derived from.
//!
//! Everything here is pure data: no transport, no mapping logic. The
//! backend-side model lives in `metabridge-catalog`, and the translation
//! between the two lives in `metabridge-mapping` / `metabridge-connector`.

pub mod guid;
pub mod instances;
pub mod query;

pub use guid::{EndpointRef, EntityRef, IdentityError, RelationshipRef};
pub use instances::{
    ClassificationInstance, EntityDetail, EntityProxy, EntitySummary, RelationshipInstance,
};
pub use query::{
    ClassificationFilter, EntityFindRequest, MatchCriteria, Paging, PropertyMatch, Sequencing,
    SequencingOrder, QUALIFIED_NAME,
};

pub mod backend;
pub mod collaborators;
pub mod statement;

pub use backend::{drain, Capabilities, RecordBackend, RecordIter, VecRecordIter, WriteStatus};
pub use collaborators::{CredentialResolver, RequiredFieldsValidator, StatementValidator};
pub use statement::StatementBackend;

//! Service layer for business logic.

pub mod chat;
pub mod context;
pub mod documents;
pub mod knowledge;

pub use chat::{ChatReply, ChatService};
pub use context::{
    document_references, strip_document_markers, AssembledContext, ContextAssembler,
    ContextConfig, ContextSource,
};
pub use documents::DocumentService;
pub use knowledge::KnowledgeService;

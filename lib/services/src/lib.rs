//! Service integrations for conduit.
//!
//! Each service wraps one [`Integration`](conduit_integration::Integration)
//! and turns its methods into proxied calls whose results come back as
//! [`ApiResponse`](conduit_integration::ApiResponse) envelopes.

mod common;
pub mod gmail;
pub mod linkedin;
pub mod openai;
pub mod sheets;

pub use common::ServiceIntegration;
pub use gmail::{
    EmailMessage, GmailIntegration, GmailProfile, InvalidHeader, ListMessagesQuery, MessageList,
    MessageRef, SentMessage,
};
pub use linkedin::{LinkedInIntegration, LinkedInProfile, PostCreated, PostRequest, PostVisibility};
pub use openai::{ChatCompletion, ChatMessage, ChatRequest, ChatRole, Model, OpenAiIntegration};
pub use sheets::{AppendResult, CreatedSpreadsheet, SheetsIntegration, UpdateResult, ValueRange};

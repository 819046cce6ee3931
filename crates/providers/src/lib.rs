//! Capability traits and HTTP clients for every external system the
//! orchestrator provisions against.
//!
//! Every capability exposes create-or-fetch semantics so a provisioning step
//! can be re-run safely after a crash or a failed attempt.

pub mod elevenlabs;
pub mod error;
mod http;
pub mod notify;
pub mod stripe;
pub mod supabase;
pub mod traits;
pub mod types;
pub mod vercel;

pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use error::{ProviderError, Result};
pub use notify::{EmailClient, EmailConfig, EmailMessage, EmailSender, NotifyError, WebhookNotifier, ChatNotifier};
pub use stripe::{StripeClient, StripeConfig};
pub use supabase::{SupabaseClient, SupabaseConfig};
pub use traits::{DatabaseProvider, HostingProvider, PaymentProvider, SourceControl, VoiceAgentProvider};
pub use types::*;
pub use vercel::{VercelClient, VercelConfig};
